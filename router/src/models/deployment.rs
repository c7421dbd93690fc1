//! Deployment models

use serde::{Deserialize, Serialize};

use crate::utils::{short_hash, truncate_chars};

/// Longest commit message carried into logs and notifications
pub const COMMIT_MESSAGE_MAX_CHARS: usize = 100;

/// Commit metadata extracted from a push
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    /// Full head commit hash, `unknown` when the payload has none
    pub hash: String,

    /// Head commit message, truncated
    pub message: String,

    /// Branch the commit was pushed to
    pub branch: String,
}

impl CommitInfo {
    pub fn new(hash: &str, message: &str, branch: &str) -> Self {
        Self {
            hash: hash.to_string(),
            message: truncate_chars(message, COMMIT_MESSAGE_MAX_CHARS).to_string(),
            branch: branch.to_string(),
        }
    }

    /// First 8 characters of the hash
    pub fn short_hash(&self) -> &str {
        short_hash(&self.hash)
    }
}

/// A validated request to deploy one project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRequest {
    /// Target project name
    pub project: String,

    /// Pushed branch
    pub branch: String,

    /// Head commit
    pub commit: CommitInfo,
}

impl DeploymentRequest {
    pub fn new(project: &str, branch: &str, commit_hash: &str, commit_message: &str) -> Self {
        Self {
            project: project.to_string(),
            branch: branch.to_string(),
            commit: CommitInfo::new(commit_hash, commit_message, branch),
        }
    }
}

/// Terminal result of one executor run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentOutcome {
    /// Build passed and the service reported active after restart
    Success,

    /// Build step exited unsuccessfully
    BuildFailed {
        exit_code: Option<i32>,
        output: String,
    },

    /// Service did not report active after restart
    ServiceUnhealthy(ServiceHealth),

    /// Build step exceeded its time budget
    TimedOut,

    /// Any other failure during the run
    Error(String),
}

impl DeploymentOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DeploymentOutcome::Success)
    }

    /// One-line description for logs and notifications
    pub fn describe(&self) -> String {
        match self {
            DeploymentOutcome::Success => "deployment successful".to_string(),
            DeploymentOutcome::BuildFailed { exit_code: Some(code), .. } => {
                format!("build failed with exit code {code}")
            }
            DeploymentOutcome::BuildFailed { exit_code: None, .. } => "build failed".to_string(),
            DeploymentOutcome::ServiceUnhealthy(health) => {
                format!("service {} after restart", health.as_str())
            }
            DeploymentOutcome::TimedOut => "deployment timed out".to_string(),
            DeploymentOutcome::Error(e) => format!("deployment error: {e}"),
        }
    }
}

/// Service state as sampled from the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceHealth {
    Active,
    Inactive,
    Unknown,
}

impl ServiceHealth {
    /// Map a supervisor status word (`active`, `failed`, ...) to a health value
    pub fn from_status(status: &str) -> Self {
        match status.trim() {
            "active" => ServiceHealth::Active,
            "" | "unknown" => ServiceHealth::Unknown,
            _ => ServiceHealth::Inactive,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceHealth::Active => "active",
            ServiceHealth::Inactive => "inactive",
            ServiceHealth::Unknown => "unknown",
        }
    }
}
