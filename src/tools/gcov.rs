use crate::tools::CoverageTool;
use crate::types::{Error, FileInfo, FileMap, FunctionDecl, LineDecl};
use crate::utils::paths::{absolute, find_files_with_ext, flatten_dir_name, resolve_against};
use crate::utils::process::run_captured;
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Runs gcov once per build directory containing `.gcno` notes.
///
/// Output of each run lands in its own directory under `int_dir`, named after
/// the build directory with path separators replaced by `#`.
fn run_gcov(gcov: &Path, bin_dir: &Path, int_dir: &Path) -> Result<(), Error> {
    let bin_dir = absolute(bin_dir);
    let int_dir = absolute(int_dir);

    let mut gcno_dirs: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
    for gcno in find_files_with_ext(&bin_dir, ".gcno") {
        if let Some(dirname) = gcno.parent() {
            gcno_dirs.entry(dirname.to_path_buf()).or_default().push(gcno.clone());
        }
    }

    for (dirname, files) in &gcno_dirs {
        let relative = dirname.strip_prefix(&bin_dir).unwrap_or(dirname);
        let output_dir = int_dir.join(flatten_dir_name(relative));
        std::fs::create_dir_all(&output_dir)?;

        log::debug!(
            "Running gcov for {} note file(s) in {}",
            files.len(),
            dirname.display()
        );
        let mut args: Vec<OsString> = vec![
            "-l".into(),
            "-b".into(),
            "-c".into(),
            "-i".into(),
            "-p".into(),
            "-o".into(),
            dirname.clone().into_os_string(),
        ];
        args.extend(files.iter().map(|file| file.clone().into_os_string()));
        run_captured(gcov, &args, Some(&output_dir))?;
    }

    Ok(())
}

/// Text intermediate format written by gcov 8 and older (`*.gcov`)
#[derive(Debug, Clone)]
pub struct GcovText {
    gcov: PathBuf,
    bin_dir: PathBuf,
    int_dir: PathBuf,
}

impl GcovText {
    pub fn new(gcov: &Path, bin_dir: &Path, int_dir: &Path) -> Self {
        Self {
            gcov: gcov.to_path_buf(),
            bin_dir: bin_dir.to_path_buf(),
            int_dir: int_dir.to_path_buf(),
        }
    }

    /// Parses the `key:value` records of one intermediate text file
    pub fn parse_text(&self, text: &str) -> FileMap {
        let mut result = FileMap::new();
        let mut current: Option<(PathBuf, FileInfo)> = None;

        for line in text.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };

            match key {
                "file" => {
                    if let Some((filename, file)) = current.take() {
                        result.insert(filename, file);
                    }
                    let filename = resolve_against(&self.bin_dir, Path::new(value.trim()));
                    current = Some((filename, FileInfo::default()));
                }
                "function" => {
                    if let (Some((_, file)), Some(function)) =
                        (current.as_mut(), parse_function(value))
                    {
                        file.functions.push(function);
                    }
                }
                "lcount" => {
                    if let (Some((_, file)), Some(line)) =
                        (current.as_mut(), parse_lcount(value))
                    {
                        file.lines.push(line);
                    }
                }
                _ => {}
            }
        }

        if let Some((filename, file)) = current {
            result.insert(filename, file);
        }
        result
    }
}

// function:<start>,<end>,<count>,<name>
fn parse_function(value: &str) -> Option<FunctionDecl> {
    let mut fields = value.splitn(4, ',');
    let start_line = fields.next()?.trim().parse().ok()?;
    let end_line = fields.next()?.trim().parse().ok()?;
    let execution_count = fields.next()?.trim().parse().ok()?;
    let name = fields.next()?.trim().to_string();
    Some(FunctionDecl {
        start_line: Some(start_line),
        end_line: Some(end_line),
        execution_count: Some(execution_count),
        name: Some(name),
        ..Default::default()
    })
}

// lcount:<line>,<count>,<has_unexecuted_block>
fn parse_lcount(value: &str) -> Option<LineDecl> {
    let mut fields = value.splitn(3, ',');
    let number: u32 = fields.next()?.trim().parse().ok()?;
    let count = fields.next()?.trim().parse().ok()?;
    let unexecuted: i64 = fields.next()?.trim().parse().ok()?;
    if number == 0 {
        return None;
    }
    Some(LineDecl::new(number, count, Some(unexecuted != 0)))
}

impl CoverageTool for GcovText {
    fn extension(&self) -> &str {
        ".gcov"
    }

    fn preprocess(&self) -> Result<(), Error> {
        run_gcov(&self.gcov, &self.bin_dir, &self.int_dir)
    }

    fn read(&self, intermediate_file: &Path) -> Result<FileMap, Error> {
        let bytes = std::fs::read(intermediate_file)?;
        Ok(self.parse_text(&String::from_utf8_lossy(&bytes)))
    }

    fn family_tags(&self) -> &'static [&'static str] {
        &["gcc"]
    }
}

#[derive(Debug, Deserialize)]
struct JsonReport {
    #[serde(default)]
    files: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct JsonFile {
    file: String,
    #[serde(default)]
    functions: Vec<serde_json::Value>,
    #[serde(default)]
    lines: Vec<serde_json::Value>,
}

/// Gzipped JSON intermediate format written by gcov 9 and newer (`*.gcov.json.gz`)
#[derive(Debug, Clone)]
pub struct GcovJson {
    gcov: PathBuf,
    bin_dir: PathBuf,
    int_dir: PathBuf,
}

impl GcovJson {
    pub fn new(gcov: &Path, bin_dir: &Path, int_dir: &Path) -> Self {
        Self {
            gcov: gcov.to_path_buf(),
            bin_dir: bin_dir.to_path_buf(),
            int_dir: int_dir.to_path_buf(),
        }
    }

    /// Maps an uncompressed gcov JSON document onto the intermediate model.
    /// Function or line entries that do not fit the schema are dropped one by one.
    pub fn parse_json(&self, json: &str) -> Result<FileMap, Error> {
        let report: JsonReport = serde_json::from_str(json)?;
        let mut result = FileMap::new();

        for value in report.files {
            let Ok(file) = serde_json::from_value::<JsonFile>(value) else {
                continue;
            };
            let filename = resolve_against(&self.bin_dir, Path::new(&file.file));
            let functions = file
                .functions
                .into_iter()
                .filter_map(|value| serde_json::from_value::<FunctionDecl>(value).ok())
                .collect();
            let lines = file
                .lines
                .into_iter()
                .filter_map(|value| serde_json::from_value::<LineDecl>(value).ok())
                .filter(|line| line.number > 0)
                .collect();
            result.insert(filename, FileInfo::new(functions, lines));
        }

        Ok(result)
    }
}

impl CoverageTool for GcovJson {
    fn extension(&self) -> &str {
        ".gcov.json.gz"
    }

    fn preprocess(&self) -> Result<(), Error> {
        run_gcov(&self.gcov, &self.bin_dir, &self.int_dir)
    }

    fn read(&self, intermediate_file: &Path) -> Result<FileMap, Error> {
        let compressed = std::fs::File::open(intermediate_file)?;
        let mut json = String::new();
        GzDecoder::new(compressed).read_to_string(&mut json)?;
        self.parse_json(&json)
    }

    fn family_tags(&self) -> &'static [&'static str] {
        &["gcc"]
    }
}
