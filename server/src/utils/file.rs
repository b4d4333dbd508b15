//! Path helpers for config file discovery

use std::path::PathBuf;

/// Resolve a user-supplied config path to an absolute path.
///
/// `~` and `~/…` resolve against the home directory; relative paths resolve
/// against the current directory. An empty string yields the current
/// directory.
pub fn expand_path(path: &str) -> PathBuf {
    let path = path.trim();
    if path.is_empty() {
        return std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    }

    let expanded = match (path, dirs::home_dir()) {
        ("~", Some(home)) => home,
        (p, Some(home)) if p.starts_with("~/") => home.join(&p[2..]),
        (p, _) => PathBuf::from(p),
    };

    if expanded.is_relative()
        && let Ok(cwd) = std::env::current_dir()
    {
        return cwd.join(expanded);
    }
    expanded
}
