use crate::tools::CoverageTool;
use crate::types::{FileInfo, FileMap, FunctionRecord};
use crate::utils::paths::{find_files_with_ext, normalize, to_posix};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Summed coverage of one source file over all intermediate files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAccumulator {
    /// First concrete path this file was seen under; used for digesting
    pub path: PathBuf,
    pub lines: BTreeMap<u32, u64>,
    pub functions: BTreeMap<String, FunctionRecord>,
}

impl FileAccumulator {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            lines: BTreeMap::new(),
            functions: BTreeMap::new(),
        }
    }
}

/// Per-file accumulators keyed by the posix path relative to the source root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Accumulated {
    pub files: BTreeMap<String, FileAccumulator>,
}

impl Accumulated {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one intermediate file's view of `name` to the running sums.
    ///
    /// Hit counts are summed per line, execution counts per function name.
    /// Position fields of a function take the latest reported values.
    pub fn append(&mut self, name: &str, full_path: &Path, info: &FileInfo) {
        for line in info.lines.iter().filter(|line| line.number > 0) {
            let file = self
                .files
                .entry(name.to_string())
                .or_insert_with(|| FileAccumulator::new(full_path));
            *file.lines.entry(line.number).or_insert(0) += line.count;
        }

        for function in &info.functions {
            let (Some(function_name), Some(start_line), Some(count)) = (
                function.name.as_ref(),
                function.start_line,
                function.execution_count,
            ) else {
                continue;
            };

            let file = self
                .files
                .entry(name.to_string())
                .or_insert_with(|| FileAccumulator::new(full_path));
            let record = file
                .functions
                .entry(function_name.clone())
                .or_insert_with(|| FunctionRecord {
                    name: function_name.clone(),
                    count: 0,
                    start_line,
                    end_line: None,
                    start_column: None,
                    end_column: None,
                    demangled: None,
                });

            record.count += count;
            record.start_line = start_line;
            if function.end_line.is_some() {
                record.end_line = function.end_line;
            }
            if function.start_column.is_some() {
                record.start_column = function.start_column;
            }
            if function.end_column.is_some() {
                record.end_column = function.end_column;
            }
            if function.demangled_name.is_some() {
                record.demangled = function.demangled_name.clone();
            }
        }
    }

    /// Folds one adapter result in, keeping only files below `src_dir` and
    /// inside one of the relevant `dirs` (given relative to `src_dir`)
    pub fn append_all(&mut self, data: &FileMap, src_dir: &Path, dirs: &[PathBuf]) {
        for (src, info) in data {
            let Some(name) = relevant_name(src, src_dir, dirs) else {
                continue;
            };
            self.append(&name, src, info);
        }
    }
}

/// Posix path of `src` relative to `src_dir`, when it is in a relevant directory
pub fn relevant_name(src: &Path, src_dir: &Path, dirs: &[PathBuf]) -> Option<String> {
    let relative = src.strip_prefix(src_dir).ok()?;
    dirs.iter()
        .any(|dirname| relative.starts_with(normalize(dirname)))
        .then(|| to_posix(relative))
}

/// Parses every intermediate file below `int_dir` and sums the relevant results.
///
/// Files are parsed in parallel and folded in discovery order, so the outcome
/// does not depend on scheduling.
pub fn aggregate<T>(tool: &T, int_dir: &Path, src_dir: &Path, dirs: &[PathBuf]) -> Accumulated
where
    T: CoverageTool + Sync,
{
    let intermediate_files = find_files_with_ext(int_dir, tool.extension());
    log::info!(
        "Found {} intermediate file(s) in {}",
        intermediate_files.len(),
        int_dir.display()
    );

    let parsed: Vec<FileMap> = intermediate_files
        .par_iter()
        .map(|intermediate_file| tool.parse(intermediate_file))
        .collect();

    let mut coverage = Accumulated::new();
    for data in &parsed {
        coverage.append_all(data, src_dir, dirs);
    }
    coverage
}
