use std::{
    path::{Path, PathBuf},
    process::exit,
};

pub fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|e| {
        eprintln!("Failed to get current dir: {}", e);
        exit(1);
    })
}

/// Interpret `path` relative to the current dir, not the project root.
pub fn from_current_dir(path: impl AsRef<Path>) -> PathBuf {
    fsutil::normalize_path(self::current_dir().join(path))
}
