use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Intermediate results of one adapter call, keyed by absolute source path
pub type FileMap = BTreeMap<PathBuf, FileInfo>;

/// A function as reported by one intermediate file.
///
/// Every field is optional because the tools disagree on what they report.
/// A declaration missing its start line, name or execution count is inert:
/// aggregation skips it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FunctionDecl {
    pub start_line: Option<u32>,
    pub end_line: Option<u32>,
    pub start_column: Option<u32>,
    pub end_column: Option<u32>,
    pub execution_count: Option<u64>,
    pub name: Option<String>,
    pub demangled_name: Option<String>,
}

impl FunctionDecl {
    /// True when the declaration carries enough data to be aggregated
    pub fn is_complete(&self) -> bool {
        self.start_line.is_some() && self.name.is_some() && self.execution_count.is_some()
    }
}

/// A single instrumented line (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
pub struct LineDecl {
    #[serde(rename = "line_number")]
    pub number: u32,
    pub count: u64,
    /// Informational only; never used for exclusion or totals
    #[serde(default)]
    pub unexecuted_block: Option<bool>,
}

impl LineDecl {
    pub fn new(number: u32, count: u64, unexecuted_block: Option<bool>) -> Self {
        Self {
            number,
            count,
            unexecuted_block,
        }
    }
}

/// Function and line declarations for one source file, as seen by one intermediate file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileInfo {
    pub functions: Vec<FunctionDecl>,
    pub lines: Vec<LineDecl>,
}

impl FileInfo {
    pub fn new(functions: Vec<FunctionDecl>, lines: Vec<LineDecl>) -> Self {
        Self { functions, lines }
    }
}

/// Accumulated function entry, as it appears in the final report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionRecord {
    pub name: String,
    pub count: u64,
    pub start_line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_column: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_column: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub demangled: Option<String>,
}

impl FunctionRecord {
    /// Inclusive line span of the function; the end defaults to the start
    pub fn span(&self) -> std::ops::RangeInclusive<u32> {
        let end = self.end_line.unwrap_or(self.start_line);
        self.start_line..=end.max(self.start_line)
    }
}

/// Per-file record handed to the report writer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFileReport {
    /// Path relative to the source root, with forward slashes
    pub name: String,
    pub source_digest: String,
    /// Indexed by line number minus one; `None` for lines that are not relevant
    pub coverage: Vec<Option<u64>>,
    pub functions: Vec<FunctionRecord>,
}

/// Tool family detected from a version banner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolFamily {
    Gcc,
    Llvm,
}

impl std::fmt::Display for ToolFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolFamily::Gcc => write!(f, "gcov"),
            ToolFamily::Llvm => write!(f, "llvm"),
        }
    }
}
