//! Deployment executor
//!
//! One run: snapshot the current revision, fetch and reset to the pushed
//! branch, run the build step under a timeout, restart the service, probe its
//! health once after a settle interval. Every failure after the snapshot goes
//! through rollback, including a panic in one of the adapters.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tracing::{error, info, warn};

use crate::deploy::adapters::{BuildReport, BuildStep, ServiceSupervisor, VersionControl};
use crate::deploy::fsm::DeploymentEvent;
use crate::deploy::git::REMOTE;
use crate::deploy::marker::MarkerStore;
use crate::deploy::rollback::{AttemptRecord, RollbackController};
use crate::errors::RouterError;
use crate::models::deployment::{DeploymentOutcome, DeploymentRequest, ServiceHealth};
use crate::notify::{Notification, Notifier, Severity};
use crate::registry::Project;

/// Longest build output tail kept in logs and outcomes
const OUTPUT_TAIL_CHARS: usize = 4000;

/// Executor timing
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Budget for fetch, reset and build step together
    pub build_timeout: Duration,

    /// Wait between restart and the health probe
    pub settle_interval: Duration,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            build_timeout: Duration::from_secs(300),
            settle_interval: Duration::from_secs(3),
        }
    }
}

/// Collaborators driven by the executor
#[derive(Clone)]
pub struct Adapters {
    pub vcs: Arc<dyn VersionControl>,
    pub supervisor: Arc<dyn ServiceSupervisor>,
    pub build: Arc<dyn BuildStep>,
}

/// Receives FSM events as a run progresses
pub type ProgressFn<'a> = dyn Fn(DeploymentEvent) + Send + Sync + 'a;

/// Runs deployments for one host
pub struct DeploymentExecutor {
    options: ExecutorOptions,
    adapters: Adapters,
    markers: MarkerStore,
    rollback: RollbackController,
    notifier: Notifier,
}

impl DeploymentExecutor {
    pub fn new(
        options: ExecutorOptions,
        adapters: Adapters,
        markers: MarkerStore,
        notifier: Notifier,
    ) -> Self {
        let rollback = RollbackController::new(
            adapters.vcs.clone(),
            adapters.supervisor.clone(),
            markers.clone(),
            notifier.clone(),
        );
        Self {
            options,
            adapters,
            markers,
            rollback,
            notifier,
        }
    }

    /// Run one deployment to completion, including rollback on failure
    pub async fn execute(
        &self,
        project: &Project,
        request: &DeploymentRequest,
        progress: &ProgressFn<'_>,
    ) -> DeploymentOutcome {
        info!(project = %project.name, "Starting deployment...");
        progress(DeploymentEvent::Start {
            commit: request.commit.short_hash().to_string(),
        });
        self.notifier
            .notify(
                Notification::new(
                    format!("{}: Deployment started", project.name),
                    Severity::Info,
                )
                .project(&project.name)
                .commit(&request.commit),
            )
            .await;

        // Nothing has been touched yet, so a failed snapshot ends the run without rollback
        let attempt = match self.snapshot(project).await {
            Ok(attempt) => attempt,
            Err(e) => {
                error!(project = %project.name, "Failed to record current revision: {}", e);
                let outcome = DeploymentOutcome::Error(e.to_string());
                progress(DeploymentEvent::Abort(outcome.describe()));
                self.notify_failure(project, &outcome, false).await;
                return outcome;
            }
        };

        // The tree may already be on the new revision when a panic unwinds
        let attempt_run = AssertUnwindSafe(self.attempt(project, request, progress));
        let outcome = match attempt_run.catch_unwind().await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!(project = %project.name, "Deployment error: {}", e);
                DeploymentOutcome::Error(e.to_string())
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!(project = %project.name, "Deployment panicked: {}", reason);
                DeploymentOutcome::Error(format!("panicked: {reason}"))
            }
        };

        if outcome.is_success() {
            info!(project = %project.name, "Deployment successful!");
            progress(DeploymentEvent::Healthy);
            self.notifier
                .notify(
                    Notification::new(
                        format!("{}: Deployment successful!", project.name),
                        Severity::Success,
                    )
                    .project(&project.name)
                    .commit(&request.commit),
                )
                .await;
            return outcome;
        }

        error!(project = %project.name, "{}", outcome.describe());
        progress(DeploymentEvent::Failed(outcome.describe()));
        let restored = self.rollback.rollback(project, Some(&attempt)).await;
        progress(DeploymentEvent::RollbackFinished { restored });
        self.notify_failure(project, &outcome, restored).await;
        outcome
    }

    /// Record the pre-attempt revision on disk and in the attempt record
    async fn snapshot(&self, project: &Project) -> Result<AttemptRecord, RouterError> {
        let revision = self.adapters.vcs.current_revision(&project.path).await?;
        self.markers.record(&project.name, &revision).await?;
        info!(project = %project.name, revision = %revision, "Recorded last known good revision");
        Ok(AttemptRecord {
            project: project.name.clone(),
            previous_revision: revision,
        })
    }

    async fn attempt(
        &self,
        project: &Project,
        request: &DeploymentRequest,
        progress: &ProgressFn<'_>,
    ) -> Result<DeploymentOutcome, RouterError> {
        let build = tokio::time::timeout(
            self.options.build_timeout,
            self.update_and_build(&project.path, &request.branch),
        )
        .await;

        let report = match build {
            Err(_) => {
                error!(
                    project = %project.name,
                    "Deployment timed out after {:?}", self.options.build_timeout
                );
                return Ok(DeploymentOutcome::TimedOut);
            }
            Ok(report) => report?,
        };

        if !report.success() {
            let output = tail(&report.output, OUTPUT_TAIL_CHARS).to_string();
            error!(
                project = %project.name,
                exit_code = ?report.exit_code,
                "Deployment failed: {}", output
            );
            return Ok(DeploymentOutcome::BuildFailed {
                exit_code: report.exit_code,
                output,
            });
        }

        progress(DeploymentEvent::BuildPassed);
        self.adapters.supervisor.restart(&project.service).await?;
        tokio::time::sleep(self.options.settle_interval).await;

        match self.adapters.supervisor.health(&project.service).await {
            ServiceHealth::Active => Ok(DeploymentOutcome::Success),
            health => {
                warn!(project = %project.name, "Service failed to start: {}", health.as_str());
                Ok(DeploymentOutcome::ServiceUnhealthy(health))
            }
        }
    }

    /// Fetch, force the tree to the pushed branch and build. Git failures are
    /// build failures.
    async fn update_and_build(&self, path: &Path, branch: &str) -> Result<BuildReport, RouterError> {
        let vcs = &self.adapters.vcs;
        if let Err(e) = vcs.fetch(path).await {
            return Ok(BuildReport::failed(e.to_string()));
        }
        if let Err(e) = vcs.reset_hard(path, &format!("{REMOTE}/{branch}")).await {
            return Ok(BuildReport::failed(e.to_string()));
        }
        self.adapters.build.run(path, branch).await
    }

    async fn notify_failure(&self, project: &Project, outcome: &DeploymentOutcome, restored: bool) {
        let suffix = if restored {
            "rolled back"
        } else {
            "not rolled back, manual intervention required"
        };
        self.notifier
            .notify(
                Notification::new(
                    format!("{}: {} ({})", project.name, outcome.describe(), suffix),
                    Severity::Error,
                )
                .project(&project.name),
            )
            .await;
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

fn tail(output: &str, max_chars: usize) -> &str {
    let count = output.chars().count();
    if count <= max_chars {
        return output;
    }
    match output.char_indices().nth(count - max_chars) {
        Some((idx, _)) => &output[idx..],
        None => output,
    }
}
