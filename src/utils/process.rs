use crate::types::errors::Error;
use std::ffi::OsStr;
use std::path::Path;
use std::process::{Command, Output};

/// Runs an external program to completion with both streams captured.
///
/// A non-zero exit status is reported as [`Error::ToolFailed`] carrying the
/// captured stderr; callers are expected to abort the run on it.
pub fn run_captured<I, S>(program: &Path, args: I, cwd: Option<&Path>) -> Result<Output, Error>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command.args(args);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    log::debug!("Running {:?}", command);
    let output = command.output().map_err(|e| {
        Error::CommandFailed(format!(
            "Failed to execute '{}': {}",
            program.display(),
            e
        ))
    })?;

    if !output.status.success() {
        return Err(Error::ToolFailed {
            tool: program.display().to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    Ok(output)
}

/// Runs a program and returns its trimmed stdout
pub fn output_of<I, S>(program: &Path, args: I, cwd: Option<&Path>) -> Result<String, Error>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = run_captured(program, args, cwd)?;
    let stdout = String::from_utf8(output.stdout)?;
    Ok(stdout.trim().to_string())
}
