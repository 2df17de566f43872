pub mod ci;
pub mod git;
pub mod props;

pub use ci::{ServiceHeader, detect_service, repo_token, service_from_env};
pub use git::{GitCommit, GitHash, GitHeader, git_hash, git_header};
pub use props::{PropValue, Props, build_job_flag_name, read_props};

use crate::types::SourceFileReport;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// The report uploaded to Coveralls
#[derive(Debug, Clone, Serialize)]
pub struct CoverallsReport {
    #[serde(flatten)]
    pub service: ServiceHeader,
    pub repo_token: String,
    pub run_at: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub parallel: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag_name: Option<String>,
    pub git: GitHeader,
    pub source_files: Vec<SourceFileReport>,
}

impl CoverallsReport {
    pub fn new(
        service: ServiceHeader,
        repo_token: String,
        run_at: DateTime<Utc>,
        flag_name: &str,
        git: GitHeader,
    ) -> Self {
        Self {
            service,
            repo_token,
            run_at: format_run_at(run_at),
            parallel: true,
            flag_name: (!flag_name.is_empty()).then(|| flag_name.to_string()),
            git,
            source_files: Vec::new(),
        }
    }
}

/// Report kept for a later merge with other jobs
#[derive(Debug, Clone, Serialize)]
pub struct PartialReport {
    pub git: GitHash,
    pub source_files: Vec<SourceFileReport>,
}

impl PartialReport {
    pub fn new(git: GitHash) -> Self {
        Self {
            git,
            source_files: Vec::new(),
        }
    }
}

/// UTC timestamp to the second, `Z`-suffixed
pub fn format_run_at(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}
