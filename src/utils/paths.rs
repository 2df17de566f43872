use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Recursively collects every file below `root` whose name ends with `ext`.
///
/// The result is sorted so that discovery order is stable across platforms.
/// Unreadable entries and a missing root are skipped silently.
pub fn find_files_with_ext(root: &Path, ext: &str) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(ext))
        .map(|entry| entry.into_path())
        .collect()
}

/// Makes `path` absolute against the current directory and removes `.`/`..` lexically
pub fn absolute(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    normalize(&joined)
}

/// Resolves a path reported by a tool: absolute paths are kept, relative ones
/// are taken relative to `base` (usually the build directory)
pub fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize(path)
    } else {
        absolute(&base.join(path))
    }
}

/// Lexical normalization: drops `.` and folds `..` into its parent
pub fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !result.pop() {
                    result.push(component);
                }
            }
            other => result.push(other),
        }
    }
    result
}

/// Joins the components of a relative path with forward slashes
pub fn to_posix(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Flattens a directory below the build dir into a single intermediate dir name
/// Example: "src/lib/core" -> "src#lib#core"
pub fn flatten_dir_name(relative: &Path) -> String {
    let flat = to_posix(relative).replace('/', "#");
    if flat.is_empty() { ".".to_string() } else { flat }
}

/// Drive and root of an absolute path: "/" on Unix, "C:\" on Windows
pub fn filesystem_root(path: &Path) -> PathBuf {
    path.components()
        .take_while(|component| matches!(component, Component::Prefix(_) | Component::RootDir))
        .collect()
}
