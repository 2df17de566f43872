use crate::coverage::excludes::Exclusions;
use crate::types::{FunctionRecord, SourceFileReport};
use std::collections::BTreeMap;

/// Relevant/covered/excluded counters for lines or functions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub relevant: u64,
    pub covered: u64,
    pub excluded: u64,
}

impl Stats {
    /// Coverage in percent, rounded half up to two decimals; 0 when nothing is relevant
    pub fn percent(&self) -> f64 {
        if self.relevant == 0 {
            return 0.0;
        }
        let hundredths = (self.covered * 20_000 + self.relevant) / (2 * self.relevant);
        hundredths as f64 / 100.0
    }
}

impl std::fmt::Display for Stats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} ({}%)", self.covered, self.relevant, self.percent())?;
        if self.excluded > 0 {
            write!(f, " excluded: {}", self.excluded)?;
        }
        Ok(())
    }
}

/// Running totals over every reported file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoverageStats {
    pub lines: Stats,
    pub functions: Stats,
}

impl CoverageStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes excluded and blank lines from `lines`.
    ///
    /// Every line of an excluded block that is present is removed and counted.
    /// Blank lines are only counted when a tool reported them.
    pub fn erase_lines(&mut self, lines: &mut BTreeMap<u32, u64>, exclusions: &Exclusions) {
        for block in &exclusions.blocks {
            for line_no in block.lines() {
                if lines.remove(&line_no).is_some() {
                    self.lines.excluded += 1;
                }
            }
        }

        for line_no in &exclusions.blank_lines {
            if lines.remove(line_no).is_some() {
                self.lines.excluded += 1;
            }
        }
    }

    /// Builds the report record of one file from its already-erased lines,
    /// dropping every function none of whose lines survived
    pub fn clean_file_report(
        &mut self,
        name: &str,
        digest: &str,
        line_count: usize,
        lines: &BTreeMap<u32, u64>,
        functions: BTreeMap<String, FunctionRecord>,
    ) -> SourceFileReport {
        let (functions, excluded_functions) = clean_functions(lines, functions);
        self.functions.excluded += excluded_functions;
        self.functions.relevant += functions.len() as u64;
        self.functions.covered += functions
            .iter()
            .filter(|function| function.count > 0)
            .count() as u64;

        self.lines.relevant += lines.len() as u64;
        self.lines.covered += lines.values().filter(|count| **count > 0).count() as u64;

        let highest = lines.keys().next_back().map_or(0, |line| *line as usize);
        let mut coverage = vec![None; line_count.max(highest)];
        for (line, count) in lines {
            coverage[*line as usize - 1] = Some(*count);
        }

        SourceFileReport {
            name: name.to_string(),
            source_digest: digest.to_string(),
            coverage,
            functions,
        }
    }

    pub fn report(&self) {
        println!("-- Line coverage:      {}", self.lines);
        println!("-- Function coverage:  {}", self.functions);
    }
}

/// Keeps the functions with at least one remaining line in their span, sorted by name.
/// Returns the kept functions and the number dropped.
pub fn clean_functions(
    lines: &BTreeMap<u32, u64>,
    functions: BTreeMap<String, FunctionRecord>,
) -> (Vec<FunctionRecord>, u64) {
    let mut excluded = 0;
    let mut cleaned = Vec::with_capacity(functions.len());
    for function in functions.into_values() {
        if lines.range(function.span()).next().is_some() {
            cleaned.push(function);
        } else {
            excluded += 1;
        }
    }
    (cleaned, excluded)
}
