//! Source-level exclusion markers.
//!
//! Lines are excluded by `GCOV_EXCL_LINE`, or by a `GCOV_EXCL_START` ..
//! `GCOV_EXCL_STOP` block (the `LCOV_`/`GRCOV_` spellings work as well).
//! START and LINE may be limited to some builds with a tag list, e.g.
//! `GCOV_EXCL_START[win32,msvc]`. Markers are found by plain text search, so
//! the comment syntax of the source language does not matter.
//!
//! Broken nesting never stops the run: it is reported as a warning and the
//! affected block is dropped.

use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static MATCHES_TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:G|L|GR)COV_EXCL_(?:START|LINE)\[([^\]]+)\]").unwrap());
static MATCHES_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:G|L|GR)COV_EXCL_LINE").unwrap());
static MATCHES_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:G|L|GR)COV_EXCL_START").unwrap());
static MATCHES_STOP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:G|L|GR)COV_EXCL_STOP").unwrap());
static MATCHES_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:G|L|GR)COV_EXCL_END").unwrap());

/// Inclusive range of excluded lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ExclBlock {
    pub start: u32,
    pub end: u32,
}

impl ExclBlock {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn lines(&self) -> std::ops::RangeInclusive<u32> {
        self.start..=self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Note,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Note => write!(f, "note"),
        }
    }
}

/// A compiler-style message about marker misuse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub path: PathBuf,
    pub line: u32,
    /// 1-based
    pub column: usize,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}: {}",
            self.path.display(),
            self.line,
            self.column,
            self.severity,
            self.message
        )
    }
}

/// Result of scanning one source file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Exclusions {
    /// Coalesced, ascending excluded ranges
    pub blocks: Vec<ExclBlock>,
    /// Lines that are empty or whitespace only
    pub blank_lines: BTreeSet<u32>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Exclusions {
    pub fn is_excluded(&self, line: u32) -> bool {
        self.blocks.iter().any(|block| block.lines().contains(&line))
    }
}

#[derive(Debug, Clone, Default)]
struct StartRef {
    line: u32,
    column: usize,
    text: String,
}

/// Line-by-line state machine for one source file
#[derive(Debug)]
pub struct ExclusionScanner {
    path: PathBuf,
    tags: BTreeSet<String>,
    inside_exclude: bool,
    last_start: StartRef,
    single_lines: Vec<u32>,
    result: Exclusions,
}

impl ExclusionScanner {
    pub fn new(path: &Path, tags: &[String]) -> Self {
        Self {
            path: path.to_path_buf(),
            tags: tags.iter().map(|tag| tag.trim().to_lowercase()).collect(),
            inside_exclude: false,
            last_start: StartRef::default(),
            single_lines: Vec::new(),
            result: Exclusions::default(),
        }
    }

    /// A tag-qualified marker only counts when one of its tags is active
    fn markers_apply(&self, text: &str) -> bool {
        let Some(captures) = MATCHES_TAGS.captures(text) else {
            return true;
        };
        captures[1]
            .split(',')
            .map(|tag| tag.trim().to_lowercase())
            .any(|tag| self.tags.contains(&tag))
    }

    pub fn on_line(&mut self, line_no: u32, text: &str) {
        if text.trim().is_empty() {
            self.result.blank_lines.insert(line_no);
            return;
        }

        let mut switch_off = false;
        let mut is_matching_line = false;

        if self.markers_apply(text) {
            if MATCHES_STOP.is_match(text) {
                switch_off = true;
            } else if let Some(end) = MATCHES_END.find(text) {
                if self.inside_exclude {
                    let marker = end.as_str();
                    let stop = format!("{}_STOP", marker.trim_end_matches("_END"));
                    self.warn(
                        line_no,
                        end.start() + 1,
                        format!("found {marker}; did you mean {stop}?"),
                    );
                }
            } else if let Some(start) = MATCHES_START.find(text) {
                if self.inside_exclude {
                    self.warn(
                        line_no,
                        start.start() + 1,
                        format!("double start: found {}", start.as_str()),
                    );
                    let previous = self.last_start.clone();
                    self.note(previous.line, previous.column, "see previous start".to_string());
                    self.include_back(previous.line);
                }
                self.last_start = StartRef {
                    line: line_no,
                    column: start.start() + 1,
                    text: start.as_str().to_string(),
                };
                self.inside_exclude = true;
            } else if MATCHES_LINE.is_match(text) {
                is_matching_line = true;
                self.single_lines.push(line_no);
            }
        }

        if self.inside_exclude || is_matching_line {
            self.exclude(line_no);
        }

        if switch_off {
            self.inside_exclude = false;
        }
    }

    /// Closes the scan; an open block at end of file is dropped with a warning
    pub fn finish(mut self) -> Exclusions {
        if self.inside_exclude {
            let start = self.last_start.clone();
            let stop = format!("{}_STOP", start.text.trim_end_matches("_START"));
            self.warn(
                start.line,
                start.column,
                format!("{} not matched with {}", start.text, stop),
            );
            self.include_back(start.line);
            self.inside_exclude = false;
        }
        self.result
    }

    fn exclude(&mut self, line_no: u32) {
        if let Some(last) = self.result.blocks.last_mut() {
            if last.end >= line_no {
                return;
            }
            if last.end + 1 == line_no {
                last.end = line_no;
                return;
            }
        }
        self.result.blocks.push(ExclBlock::new(line_no, line_no));
    }

    /// Forgets everything excluded from `line_no` on, then restores the
    /// single-line markers found in that range
    fn include_back(&mut self, line_no: u32) {
        while let Some(last) = self.result.blocks.last_mut() {
            if last.start >= line_no {
                self.result.blocks.pop();
            } else {
                if last.end >= line_no {
                    last.end = line_no - 1;
                }
                break;
            }
        }

        let restored: Vec<u32> = self
            .single_lines
            .iter()
            .copied()
            .filter(|line| *line >= line_no)
            .collect();
        for line in restored {
            self.exclude(line);
        }
    }

    fn warn(&mut self, line: u32, column: usize, message: String) {
        self.emit(Severity::Warning, line, column, message);
    }

    fn note(&mut self, line: u32, column: usize, message: String) {
        self.emit(Severity::Note, line, column, message);
    }

    fn emit(&mut self, severity: Severity, line: u32, column: usize, message: String) {
        let diagnostic = Diagnostic {
            severity,
            path: self.path.clone(),
            line,
            column,
            message,
        };
        log::warn!("{}", diagnostic);
        self.result.diagnostics.push(diagnostic);
    }
}

/// Scans source text, numbering lines from 1
pub fn scan_source(path: &Path, text: &str, tags: &[String]) -> Exclusions {
    let mut scanner = ExclusionScanner::new(path, tags);
    for (index, line) in text.split('\n').enumerate() {
        scanner.on_line(index as u32 + 1, line);
    }
    scanner.finish()
}

/// Scans `src_dir/name`; a missing or unreadable file has no exclusions
pub fn find_excl_blocks(tags: &[String], name: &str, src_dir: &Path) -> Exclusions {
    let full_path = src_dir.join(name);
    match std::fs::read(&full_path) {
        Ok(bytes) => scan_source(&full_path, &String::from_utf8_lossy(&bytes), tags),
        Err(e) => {
            log::debug!("No exclusions for '{}': {}", full_path.display(), e);
            Exclusions::default()
        }
    }
}
