//! Directory operations

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::errors::RouterError;
use crate::filesys::file::File;

/// A directory wrapper with path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dir {
    path: PathBuf,
}

impl Dir {
    /// Create a new directory reference
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the directory path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the directory exists
    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// List immediate subdirectories, following symlinks
    pub async fn list_dirs(&self) -> Result<Vec<PathBuf>, RouterError> {
        let mut dirs = Vec::new();
        let mut entries = fs::read_dir(&self.path).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_dir = fs::metadata(&path)
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false);
            if is_dir {
                dirs.push(path);
            }
        }

        Ok(dirs)
    }

    /// Get a file within this directory
    pub fn file(&self, name: &str) -> File {
        File::new(self.path.join(name))
    }
}
