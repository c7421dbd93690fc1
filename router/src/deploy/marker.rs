//! Last-known-good revision markers
//!
//! One file per project holding the revision the project was at when the most
//! recent deployment attempt started. It is overwritten at the start of every
//! attempt and never deleted.

use std::path::PathBuf;

use crate::errors::RouterError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// Marker file store
#[derive(Debug, Clone)]
pub struct MarkerStore {
    dir: Dir,
}

impl MarkerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: Dir::new(dir) }
    }

    /// Marker file for a project
    pub fn marker_file(&self, project: &str) -> File {
        self.dir.file(&format!("last_working_commit_{project}.txt"))
    }

    /// Overwrite the project's marker with `revision`
    pub async fn record(&self, project: &str, revision: &str) -> Result<(), RouterError> {
        self.marker_file(project)
            .write_string(&format!("{revision}\n"))
            .await
            .map_err(|e| RouterError::MarkerError(format!("Failed to record marker for {project}: {e}")))
    }

    /// Read the project's marker, `None` if absent or empty
    pub async fn read(&self, project: &str) -> Result<Option<String>, RouterError> {
        let file = self.marker_file(project);
        if !file.exists().await {
            return Ok(None);
        }
        let revision = file.read_string().await?.trim().to_string();
        Ok(Some(revision).filter(|r| !r.is_empty()))
    }
}
