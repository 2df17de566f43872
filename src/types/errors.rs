use std::process::ExitStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("{tool} failed with {status}\nStderr: {stderr}")]
    ToolFailed {
        tool: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Unrecognized coverage tool: {0}")]
    UnrecognizedTool(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}
