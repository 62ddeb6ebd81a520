//! Configuration file locations and workdir-relative path resolution

use std::path::{Path, PathBuf};

/// Application name used for the per-user config directory
const APP_NAME: &str = "fsbench";

/// Name of the project-local configuration file
pub const LOCAL_CONFIG_FILE: &str = "fsbench.toml";

/// Get the per-user configuration directory path
///
/// Uses the directories crate for platform-appropriate locations:
/// - Linux: `~/.config/fsbench/`
/// - macOS: `~/Library/Application Support/fsbench/`
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the per-user configuration file
pub fn user_config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Candidate config files in lookup order, excluding an explicit `--config`
pub fn config_candidates() -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
    candidates.extend(user_config_path());
    candidates
}

/// Resolve `path` against `workdir` unless it is already absolute
pub fn resolve(workdir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workdir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_is_valid() {
        let dir = config_dir();
        assert!(dir.is_some());
    }

    #[test]
    fn local_config_is_checked_first() {
        let candidates = config_candidates();
        assert_eq!(candidates[0], PathBuf::from("fsbench.toml"));
    }

    #[test]
    fn resolve_keeps_absolute_paths() {
        assert_eq!(
            resolve(Path::new("/work"), Path::new("/tmp/mountdir")),
            PathBuf::from("/tmp/mountdir")
        );
        assert_eq!(
            resolve(Path::new("/work"), Path::new("mountdir")),
            PathBuf::from("/work/mountdir")
        );
    }
}
