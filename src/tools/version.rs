use crate::types::ToolFamily;
use std::path::Path;
use std::process::Command;

/// Family and dotted version of a coverage tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolVersion {
    pub family: ToolFamily,
    pub version: Vec<u32>,
}

impl ToolVersion {
    pub fn major(&self) -> u32 {
        self.version.first().copied().unwrap_or(0)
    }
}

impl std::fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let dotted: Vec<String> = self.version.iter().map(u32::to_string).collect();
        write!(f, "{} {}", self.family, dotted.join("."))
    }
}

/// Asks `tool --version` who it is.
///
/// A tool that cannot be started or exits with an error is simply unknown.
pub fn detect_version(tool: &Path) -> Option<ToolVersion> {
    let output = Command::new(tool).arg("--version").output().ok()?;
    if !output.status.success() {
        log::debug!("'{} --version' exited with {}", tool.display(), output.status);
        return None;
    }
    parse_version_banner(&String::from_utf8_lossy(&output.stdout))
}

/// Recognizes the two banners we understand:
///
/// ```text
/// gcov (Ubuntu 11.4.0-1ubuntu1~22.04) 11.4.0
/// Ubuntu LLVM version 14.0.0
/// ```
pub fn parse_version_banner(banner: &str) -> Option<ToolVersion> {
    let first = banner.lines().next()?;
    if first.split_whitespace().next() == Some("gcov") {
        let (_, rest) = first.split_once(')')?;
        let version = parse_dotted(rest.split_whitespace().next()?)?;
        return Some(ToolVersion {
            family: ToolFamily::Gcc,
            version,
        });
    }

    for line in banner.lines() {
        if let Some((_, rest)) = line.split_once("LLVM version") {
            let version = parse_dotted(rest.split_whitespace().next()?)?;
            return Some(ToolVersion {
                family: ToolFamily::Llvm,
                version,
            });
        }
    }

    None
}

// "14.0.0-1ubuntu1" -> [14, 0, 0]
fn parse_dotted(text: &str) -> Option<Vec<u32>> {
    let mut version = Vec::new();
    for chunk in text.split('.') {
        let digits: String = chunk.chars().take_while(char::is_ascii_digit).collect();
        if digits.is_empty() {
            break;
        }
        version.push(digits.parse().ok()?);
    }
    if version.is_empty() { None } else { Some(version) }
}
