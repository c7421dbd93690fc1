//! Interfaces to the host collaborators driven during a deployment

use std::path::Path;

use async_trait::async_trait;

use crate::errors::RouterError;
use crate::models::deployment::ServiceHealth;

/// Version control operations on a project's working tree
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Revision currently checked out
    async fn current_revision(&self, repo: &Path) -> Result<String, RouterError>;

    /// Fetch from the tracked remote
    async fn fetch(&self, repo: &Path) -> Result<(), RouterError>;

    /// Force the working tree to `revision`, discarding local changes
    async fn reset_hard(&self, repo: &Path, revision: &str) -> Result<(), RouterError>;
}

/// Host service supervisor
#[async_trait]
pub trait ServiceSupervisor: Send + Sync {
    /// Restart a service by name
    async fn restart(&self, service: &str) -> Result<(), RouterError>;

    /// Raw status word reported by the supervisor, e.g. `active` or `failed`
    async fn status(&self, service: &str) -> Result<String, RouterError>;

    /// Sample service health; never cached
    async fn health(&self, service: &str) -> ServiceHealth {
        match self.status(service).await {
            Ok(status) => ServiceHealth::from_status(&status),
            Err(_) => ServiceHealth::Unknown,
        }
    }
}

/// Result of one build step invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    /// Exit code, `None` if the process did not exit normally
    pub exit_code: Option<i32>,

    /// Combined diagnostic output
    pub output: String,
}

impl BuildReport {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            exit_code: None,
            output: output.into(),
        }
    }
}

/// Project-specific install/migrate/self-check sequence
#[async_trait]
pub trait BuildStep: Send + Sync {
    async fn run(&self, project_dir: &Path, branch: &str) -> Result<BuildReport, RouterError>;
}
