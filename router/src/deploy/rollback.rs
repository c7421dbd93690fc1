//! Rollback to the last known good revision
//!
//! Rollback succeeds when the reset and restart commands complete. The
//! service's health afterwards is not probed, so a previous revision that is
//! itself broken still reports a completed rollback.

use std::sync::Arc;

use tracing::{error, info};

use crate::deploy::adapters::{ServiceSupervisor, VersionControl};
use crate::deploy::marker::MarkerStore;
use crate::errors::RouterError;
use crate::notify::{Notification, Notifier, Severity};
use crate::registry::Project;

/// State of one deployment attempt, owned by the executor for the attempt's duration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub project: String,

    /// Revision checked out before the attempt mutated anything
    pub previous_revision: String,
}

/// Reverts a project and restarts its service
pub struct RollbackController {
    vcs: Arc<dyn VersionControl>,
    supervisor: Arc<dyn ServiceSupervisor>,
    markers: MarkerStore,
    notifier: Notifier,
}

impl RollbackController {
    pub fn new(
        vcs: Arc<dyn VersionControl>,
        supervisor: Arc<dyn ServiceSupervisor>,
        markers: MarkerStore,
        notifier: Notifier,
    ) -> Self {
        Self {
            vcs,
            supervisor,
            markers,
            notifier,
        }
    }

    /// Roll `project` back. Uses the attempt's in-memory record when given,
    /// otherwise the persisted marker. Returns whether the revert and restart
    /// both completed.
    pub async fn rollback(&self, project: &Project, attempt: Option<&AttemptRecord>) -> bool {
        info!(project = %project.name, "Rolling back to previous commit...");

        let target = match attempt {
            Some(record) => Some(record.previous_revision.clone()),
            None => match self.markers.read(&project.name).await {
                Ok(revision) => revision,
                Err(e) => {
                    error!(project = %project.name, "Failed to read rollback marker: {}", e);
                    None
                }
            },
        };

        let Some(revision) = target else {
            error!(project = %project.name, "No previous commit found for rollback");
            return false;
        };

        match self.revert(project, &revision).await {
            Ok(()) => {
                info!(project = %project.name, revision = %revision, "Rollback completed");
                self.notifier
                    .notify(
                        Notification::new(
                            format!("{}: Rolled back due to deployment failure", project.name),
                            Severity::Warning,
                        )
                        .project(&project.name),
                    )
                    .await;
                true
            }
            Err(e) => {
                error!(project = %project.name, "Rollback failed: {}", e);
                false
            }
        }
    }

    async fn revert(&self, project: &Project, revision: &str) -> Result<(), RouterError> {
        self.vcs.reset_hard(&project.path, revision).await?;
        self.supervisor.restart(&project.service).await
    }
}
