use crate::tools::CoverageTool;
use crate::tools::segments::{Segment, function_encompassing_region, line_coverage};
use crate::types::{Error, FileInfo, FileMap, FunctionDecl, LineDecl};
use crate::utils::paths::{absolute, find_files_with_ext, resolve_against};
use crate::utils::process::run_captured;
use regex::Regex;
use serde::Deserialize;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

const SUPPORTED_EXPORT_VERSION: u32 = 2;

#[derive(Debug, Deserialize)]
struct Export {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    data: Vec<ExportData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExportData {
    files: Vec<serde_json::Value>,
    functions: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ExportFile {
    filename: String,
    #[serde(default)]
    segments: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ExportFunction {
    name: String,
    count: u64,
    #[serde(default)]
    filenames: Vec<String>,
    #[serde(default)]
    regions: Vec<Vec<serde_json::Value>>,
}

/// `llvm-cov export -format text` documents (`*.profjson`)
#[derive(Debug, Clone)]
pub struct LlvmExport {
    cov_tool: PathBuf,
    merge_tool: PathBuf,
    target: String,
    bin_dir: PathBuf,
    int_dir: PathBuf,
}

impl LlvmExport {
    pub fn new(
        cov_tool: &Path,
        merge_tool: &Path,
        target: &str,
        bin_dir: &Path,
        int_dir: &Path,
    ) -> Self {
        Self {
            cov_tool: cov_tool.to_path_buf(),
            merge_tool: merge_tool.to_path_buf(),
            target: target.to_string(),
            bin_dir: bin_dir.to_path_buf(),
            int_dir: int_dir.to_path_buf(),
        }
    }

    /// Matches the target executable, optionally versioned (`app-1.2.3`)
    pub fn target_pattern(&self) -> Result<Regex, Error> {
        let exe_re = if cfg!(windows) { r"\.exe" } else { "" };
        Ok(Regex::new(&format!(
            r"^{}(-[0-9.]+)?{}$",
            regex::escape(&self.target),
            exe_re
        ))?)
    }

    fn export(&self, profile_data: &Path, exe: &Path) -> Result<Vec<u8>, Error> {
        let output = run_captured(
            &self.cov_tool,
            [
                OsStr::new("export"),
                OsStr::new("-format"),
                OsStr::new("text"),
                OsStr::new("-skip-expansions"),
                OsStr::new("-instr-profile"),
                profile_data.as_os_str(),
                exe.as_os_str(),
            ],
            None,
        )?;
        Ok(output.stdout)
    }

    /// Maps one export document onto the intermediate model.
    ///
    /// Documents with an export version other than 2 yield nothing.
    pub fn parse_export(&self, json: &str) -> Result<FileMap, Error> {
        let export: Export = serde_json::from_str(json)?;
        let version = export.version.as_deref().unwrap_or("0.0.0");
        let major = version.split('.').next().and_then(|major| major.parse::<u32>().ok());
        if major != Some(SUPPORTED_EXPORT_VERSION) {
            log::debug!("Unsupported llvm-cov export version {}", version);
            return Ok(FileMap::new());
        }

        let mut result = FileMap::new();
        for data in &export.data {
            for value in &data.files {
                let Ok(file) = ExportFile::deserialize(value) else {
                    continue;
                };
                let segments: Vec<Segment> = file
                    .segments
                    .iter()
                    .filter_map(|segment| Segment::deserialize(segment).ok())
                    .collect();
                let lines = line_coverage(&segments)
                    .into_iter()
                    .filter_map(|stats| {
                        stats
                            .execution_count
                            .map(|count| LineDecl::new(stats.line, count, None))
                    })
                    .collect();

                let filename = resolve_against(&self.bin_dir, Path::new(&file.filename));
                result.insert(filename, FileInfo::new(Vec::new(), lines));
            }
        }

        for data in &export.data {
            for value in &data.functions {
                let Ok(function) = ExportFunction::deserialize(value) else {
                    continue;
                };
                let Some(region) = function_encompassing_region(&function.regions) else {
                    continue;
                };
                let Some(filename) = function.filenames.first() else {
                    continue;
                };

                let decl = FunctionDecl {
                    start_line: Some(region.start.line),
                    end_line: Some(region.end.line),
                    start_column: Some(region.start.column),
                    end_column: Some(region.end.column),
                    execution_count: Some(function.count),
                    name: Some(function.name),
                    demangled_name: None,
                };

                let filename = resolve_against(&self.bin_dir, Path::new(filename));
                result.entry(filename).or_default().functions.push(decl);
            }
        }

        Ok(result)
    }
}

impl CoverageTool for LlvmExport {
    fn extension(&self) -> &str {
        ".profjson"
    }

    /// Merges all raw profiles into one indexed profile, then exports the
    /// coverage of every instrumented executable in `<bin_dir>/bin`
    fn preprocess(&self) -> Result<(), Error> {
        let bin_dir = absolute(&self.bin_dir);
        let int_dir = absolute(&self.int_dir);

        let raw = find_files_with_ext(&bin_dir, ".profraw");
        if raw.is_empty() {
            log::info!("No .profraw files found in {}", bin_dir.display());
            return Ok(());
        }

        std::fs::create_dir_all(&int_dir)?;
        let profile_data = int_dir.join("coverage.profdata");

        let mut args: Vec<OsString> = vec!["merge".into(), "-sparse".into()];
        args.extend(raw.iter().map(|path| path.clone().into_os_string()));
        args.push("-o".into());
        args.push(profile_data.clone().into_os_string());
        run_captured(&self.merge_tool, &args, None)?;

        let versioned_target = self.target_pattern()?;
        let test_suffix = format!("-test{}", std::env::consts::EXE_SUFFIX);
        let mut execs = Vec::new();
        if let Ok(entries) = std::fs::read_dir(bin_dir.join("bin")) {
            for entry in entries.filter_map(Result::ok) {
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                let filename = entry.file_name().to_string_lossy().into_owned();
                if versioned_target.is_match(&filename) || filename.ends_with(&test_suffix) {
                    execs.push(path);
                }
            }
        }
        execs.sort();

        for exe in execs {
            let relative = exe.strip_prefix(&bin_dir).unwrap_or(&exe);
            let mut local = int_dir.join(relative).into_os_string();
            local.push(".profjson");
            let local = PathBuf::from(local);
            if let Some(parent) = local.parent() {
                std::fs::create_dir_all(parent)?;
            }

            log::debug!("Exporting coverage of {}", exe.display());
            let blob = self.export(&profile_data, &exe)?;
            std::fs::write(&local, blob)?;
        }

        Ok(())
    }

    fn read(&self, intermediate_file: &Path) -> Result<FileMap, Error> {
        let json = std::fs::read_to_string(intermediate_file)?;
        self.parse_export(&json)
    }

    fn family_tags(&self) -> &'static [&'static str] {
        &["clang", "llvm"]
    }
}
