//! Where threadline keeps its files.

use std::path::PathBuf;

/// `~/.threadline`, or a `.threadline` folder in the temp dir when no home
/// directory is set.
pub fn threadline_dir() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
        .join(".threadline")
}

/// User-level config file
pub fn config_json_path() -> PathBuf {
    threadline_dir().join("config.json")
}

pub fn default_store_dir() -> PathBuf {
    threadline_dir().join("threads")
}
