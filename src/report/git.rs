use crate::types::Error;
use crate::utils::process::output_of;
use serde::Serialize;
use std::path::Path;

/// The last commit, as Coveralls expects it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GitCommit {
    pub id: String,
    pub author_name: String,
    pub author_email: String,
    pub committer_name: String,
    pub committer_email: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GitRemote {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GitHeader {
    pub branch: String,
    pub head: GitCommit,
    pub remotes: Vec<GitRemote>,
}

/// Git header of a partial report: the branch and the bare commit hash
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GitHash {
    pub branch: String,
    pub head: String,
}

fn pretty(git: &Path, src_dir: &Path, format: &str) -> Result<String, Error> {
    let pretty = format!("--pretty=format:{format}");
    output_of(git, ["log", "-1", pretty.as_str()], Some(src_dir))
}

/// Splits the output of `--pretty=format:%H%n%aN%n%aE%n%cN%n%cE`
pub fn parse_commit_fields(text: &str, message: String) -> GitCommit {
    let mut fields = text.lines().map(str::to_string);
    let mut next = || fields.next().unwrap_or_default();
    GitCommit {
        id: next(),
        author_name: next(),
        author_email: next(),
        committer_name: next(),
        committer_email: next(),
        message,
    }
}

/// Reads the branch and last commit of the repository containing `src_dir`
pub fn git_header(git: &Path, src_dir: &Path) -> Result<GitHeader, Error> {
    let branch = output_of(git, ["rev-parse", "--abbrev-ref", "HEAD"], Some(src_dir))?;
    let fields = pretty(git, src_dir, "%H%n%aN%n%aE%n%cN%n%cE")?;
    let message = pretty(git, src_dir, "%B")?;

    Ok(GitHeader {
        branch,
        head: parse_commit_fields(&fields, message),
        remotes: Vec::new(),
    })
}

pub fn git_hash(git: &Path, src_dir: &Path) -> Result<GitHash, Error> {
    let branch = output_of(git, ["rev-parse", "--abbrev-ref", "HEAD"], Some(src_dir))?;
    let head = pretty(git, src_dir, "%H")?;
    Ok(GitHash { branch, head })
}
