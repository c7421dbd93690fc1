//! Git working tree operations

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::deploy::adapters::VersionControl;
use crate::errors::RouterError;

/// Remote that deployments track
pub const REMOTE: &str = "origin";

/// `git` command line adapter
#[derive(Debug, Clone, Default)]
pub struct GitCli {
    /// Owner of the working trees; mutating commands run as this user
    run_as_user: Option<String>,
}

impl GitCli {
    pub fn new(run_as_user: Option<String>) -> Self {
        Self { run_as_user }
    }

    fn command(&self, repo: &Path, args: &[&str], mutates: bool) -> Command {
        let mut cmd = match (&self.run_as_user, mutates) {
            (Some(user), true) => {
                let mut cmd = Command::new("sudo");
                cmd.args(["-u", user.as_str(), "git"]);
                cmd
            }
            _ => Command::new("git"),
        };
        cmd.current_dir(repo).args(args).kill_on_drop(true);
        cmd
    }

    async fn run(&self, repo: &Path, args: &[&str], mutates: bool) -> Result<String, RouterError> {
        debug!("git {} in {}", args.join(" "), repo.display());
        let output = self
            .command(repo, args, mutates)
            .output()
            .await
            .map_err(|e| RouterError::VcsError(format!("Failed to run git {}: {}", args[0], e)))?;

        if !output.status.success() {
            return Err(RouterError::VcsError(format!(
                "git {} failed in {}: {}",
                args.join(" "),
                repo.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl VersionControl for GitCli {
    async fn current_revision(&self, repo: &Path) -> Result<String, RouterError> {
        let revision = self.run(repo, &["rev-parse", "HEAD"], false).await?;
        if revision.is_empty() {
            return Err(RouterError::VcsError(format!(
                "No revision checked out in {}",
                repo.display()
            )));
        }
        Ok(revision)
    }

    async fn fetch(&self, repo: &Path) -> Result<(), RouterError> {
        self.run(repo, &["fetch", REMOTE], true).await.map(|_| ())
    }

    async fn reset_hard(&self, repo: &Path, revision: &str) -> Result<(), RouterError> {
        self.run(repo, &["reset", "--hard", revision], true)
            .await
            .map(|_| ())
    }
}
