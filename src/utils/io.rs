use crate::types::errors::Error;
use md5::{Digest, Md5};
use serde::Serialize;
use std::path::Path;

/// Save a report to a pretty-printed JSON file, creating parent directories
pub fn save_report<T: Serialize>(report: &T, output_path: &Path) -> Result<(), Error> {
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut json = serde_json::to_string_pretty(report)?;
    if !json.ends_with('\n') {
        json.push('\n');
    }
    std::fs::write(output_path, json)?;
    Ok(())
}

/// MD5 of the file contents with CRLF line endings hashed as LF, plus its line count
pub fn file_digest(path: &Path) -> Result<(String, usize), Error> {
    let bytes = std::fs::read(path)?;
    Ok(digest_bytes(&bytes))
}

pub fn digest_bytes(bytes: &[u8]) -> (String, usize) {
    let mut hasher = Md5::new();
    let mut lines = 0;
    for line in bytes.split_inclusive(|byte| *byte == b'\n') {
        match line.strip_suffix(b"\r\n") {
            Some(stripped) => {
                hasher.update(stripped);
                hasher.update(b"\n");
            }
            None => hasher.update(line),
        }
        lines += 1;
    }
    (format!("{:x}", hasher.finalize()), lines)
}
