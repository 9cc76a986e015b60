use dirs::home_dir;
use std::path::{Path, PathBuf};

/// HDL home directory: `home_override` (the value of `$HDL_HOME`) when set
/// and non-empty, else `~/.hdl`. None if the user's home cannot be resolved.
pub fn hdl_home(home_override: Option<String>) -> Option<PathBuf> {
    match home_override.filter(|v| !v.is_empty()) {
        Some(home) => Some(PathBuf::from(home)),
        None => home_dir().map(|h| h.join(".hdl")),
    }
}

/// Engine base directory inside an HDL home.
pub fn base_dir_in(home: &Path) -> PathBuf {
    home.join("dependencies")
}

/// Directory owned by one phase type under an engine's base directory.
pub fn namespace_dir(base: &Path, namespace: &str) -> PathBuf {
    base.join(namespace)
}

/// Join a `/`-separated relative path onto `root` segment by segment.
pub fn join_layout(root: &Path, layout: &str) -> PathBuf {
    layout
        .split('/')
        .filter(|s| !s.is_empty())
        .fold(root.to_path_buf(), |acc, seg| acc.join(seg))
}
