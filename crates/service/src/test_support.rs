#![cfg(test)]
use std::path::{Path, PathBuf};

/// Unique directory under the system temp dir, removed on drop.
/// The directory itself is not created; stores create what they need.
pub struct TempDataDir {
    path: PathBuf,
}

impl TempDataDir {
    pub fn new(prefix: &str) -> Self {
        let path = std::env::temp_dir().join(format!("{prefix}_{}", uuid::Uuid::new_v4()));
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDataDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}
