//! Format adapters: one per coverage tool family.
//!
//! Every adapter turns its tool's native intermediate files into the shared
//! [`FileInfo`](crate::types::FileInfo) representation. [`guess_tool`] picks the
//! adapter by looking at the version banner of the configured tool.

pub mod cobertura;
pub mod gcov;
pub mod llvm;
pub mod segments;
pub mod version;

pub use cobertura::CoberturaXml;
pub use gcov::{GcovJson, GcovText};
pub use llvm::LlvmExport;
pub use version::{ToolVersion, detect_version, parse_version_banner};

use crate::config::RunConfig;
use crate::types::{Error, FileMap, ToolFamily};
use std::path::Path;

/// Common contract of all format adapters
pub trait CoverageTool {
    /// File name suffix of the intermediate files this adapter reads
    fn extension(&self) -> &str;

    /// Materializes intermediate files from raw profiling data.
    /// A failing external tool aborts the whole run.
    fn preprocess(&self) -> Result<(), Error>;

    /// Parses one intermediate file, failing on unreadable input
    fn read(&self, intermediate_file: &Path) -> Result<FileMap, Error>;

    /// Tool family labels for tag-qualified exclusion markers
    fn family_tags(&self) -> &'static [&'static str];

    /// Parses one intermediate file; anything unreadable contributes nothing
    fn parse(&self, intermediate_file: &Path) -> FileMap {
        self.read(intermediate_file).unwrap_or_else(|e| {
            log::debug!("Skipping '{}': {}", intermediate_file.display(), e);
            FileMap::new()
        })
    }

    /// Family labels plus the host OS labels
    fn default_exclusion_tags(&self) -> Vec<String> {
        self.family_tags()
            .iter()
            .chain(host_tags())
            .map(|tag| tag.to_string())
            .collect()
    }
}

/// Exclusion tags describing the operating system we run on
pub fn host_tags() -> &'static [&'static str] {
    if cfg!(windows) {
        &["win32"]
    } else if cfg!(target_os = "linux") {
        &["linux", "posix"]
    } else {
        &[]
    }
}

/// The adapter selected for a run
#[derive(Debug, Clone)]
pub enum Tool {
    GcovText(GcovText),
    GcovJson(GcovJson),
    Llvm(LlvmExport),
    Cobertura(CoberturaXml),
}

impl Tool {
    fn inner(&self) -> &dyn CoverageTool {
        match self {
            Tool::GcovText(tool) => tool,
            Tool::GcovJson(tool) => tool,
            Tool::Llvm(tool) => tool,
            Tool::Cobertura(tool) => tool,
        }
    }
}

impl CoverageTool for Tool {
    fn extension(&self) -> &str {
        self.inner().extension()
    }

    fn preprocess(&self) -> Result<(), Error> {
        self.inner().preprocess()
    }

    fn read(&self, intermediate_file: &Path) -> Result<FileMap, Error> {
        self.inner().read(intermediate_file)
    }

    fn family_tags(&self) -> &'static [&'static str] {
        self.inner().family_tags()
    }
}

/// Chooses the adapter for this run.
///
/// Cobertura input needs no tool. Otherwise the configured gcov/llvm-cov binary
/// is asked for its version: gcov before 9 writes the text format, later
/// versions write gzipped JSON, and llvm-cov exports segments.
pub fn guess_tool(config: &RunConfig) -> Result<Tool, Error> {
    if config.cobertura {
        return Ok(Tool::Cobertura(CoberturaXml::new()));
    }

    let Some(gcov) = config.gcov.as_deref() else {
        return Err(Error::Config(
            "either a gcov/llvm-cov path or cobertura input is required".to_string(),
        ));
    };

    let Some(detected) = detect_version(gcov) else {
        return Err(Error::UnrecognizedTool(format!(
            "could not identify '{}' from its --version output",
            gcov.display()
        )));
    };
    log::info!("Detected {}", detected);

    match detected.family {
        ToolFamily::Gcc if detected.major() < 9 => Ok(Tool::GcovText(GcovText::new(
            gcov,
            &config.bin_dir,
            &config.int_dir,
        ))),
        ToolFamily::Gcc => Ok(Tool::GcovJson(GcovJson::new(
            gcov,
            &config.bin_dir,
            &config.int_dir,
        ))),
        ToolFamily::Llvm => {
            let Some(merge) = config.merge.as_deref() else {
                return Err(Error::Config(
                    "llvm-cov requires --merge pointing at llvm-profdata".to_string(),
                ));
            };
            Ok(Tool::Llvm(LlvmExport::new(
                gcov,
                merge,
                &config.target,
                &config.bin_dir,
                &config.int_dir,
            )))
        }
    }
}
