use crate::utils::paths::absolute;
use std::path::{Path, PathBuf};

/// Everything a gathering run needs, resolved once and passed down explicitly
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Path to gcov or llvm-cov; `None` when reading Cobertura XML
    pub gcov: Option<PathBuf>,
    pub cobertura: bool,
    /// Path to llvm-profdata (LLVM only)
    pub merge: Option<PathBuf>,
    /// Name of the tested application
    pub target: String,
    /// Absolute source root; report paths are relative to it
    pub src_dir: PathBuf,
    pub bin_dir: PathBuf,
    pub int_dir: PathBuf,
    /// Subdirectories of `src_dir` whose files are reported
    pub dirs: Vec<PathBuf>,
    /// Extra tags enabling `*COV_EXCL_START[tag]` markers
    pub tags: Vec<String>,
    pub git: PathBuf,
}

impl RunConfig {
    pub fn new(src_dir: &Path, bin_dir: &Path, int_dir: &Path, dirs: Vec<PathBuf>) -> Self {
        Self {
            gcov: None,
            cobertura: false,
            merge: None,
            target: String::new(),
            src_dir: absolute(src_dir),
            bin_dir: bin_dir.to_path_buf(),
            int_dir: int_dir.to_path_buf(),
            dirs,
            tags: Vec::new(),
            git: find_git(),
        }
    }
}

/// Locates the git executable on PATH, falling back to a bare `git`
pub fn find_git() -> PathBuf {
    which::which("git").unwrap_or_else(|_| PathBuf::from("git"))
}
