//! Deployment workers
//!
//! Each accepted push gets its own task. Tasks for the same project serialize
//! on that project's lock in arrival order; different projects never contend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::deploy::executor::DeploymentExecutor;
use crate::deploy::fsm::{DeploymentEvent, DeploymentFsm, DeploymentStatus};
use crate::models::deployment::{DeploymentOutcome, DeploymentRequest};
use crate::registry::Project;

/// Per-project lock and progress
#[derive(Default)]
struct ProjectSlot {
    lock: tokio::sync::Mutex<()>,
    fsm: Mutex<DeploymentFsm>,
}

impl ProjectSlot {
    fn fsm(&self) -> MutexGuard<'_, DeploymentFsm> {
        self.fsm.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, project: &str, event: DeploymentEvent) {
        if let Err(e) = self.fsm().process(event) {
            warn!(project, "Ignoring deployment event: {}", e);
        }
    }
}

/// Counts running tasks; decremented on drop so panics are counted too
struct ActiveGuard(Arc<AtomicUsize>);

impl ActiveGuard {
    fn new(active: Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        Self(active)
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Launches and tracks deployment tasks
pub struct Deployer {
    executor: Arc<DeploymentExecutor>,
    slots: Mutex<HashMap<String, Arc<ProjectSlot>>>,
    active: Arc<AtomicUsize>,
}

impl Deployer {
    pub fn new(executor: Arc<DeploymentExecutor>) -> Self {
        Self {
            executor,
            slots: Mutex::new(HashMap::new()),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn slot(&self, project: &str) -> Arc<ProjectSlot> {
        let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        slots.entry(project.to_string()).or_default().clone()
    }

    /// Start a deployment task and return immediately. The handle resolves to
    /// the outcome, or `None` if the task panicked.
    pub fn launch(
        &self,
        project: Project,
        request: DeploymentRequest,
    ) -> JoinHandle<Option<DeploymentOutcome>> {
        let slot = self.slot(&project.name);
        slot.record(&project.name, DeploymentEvent::Enqueue);
        let active = ActiveGuard::new(self.active.clone());
        let executor = self.executor.clone();

        tokio::spawn(async move {
            let _active = active;
            let name = project.name.clone();
            let run_slot = slot.clone();

            // Inner task so a panic is observed here instead of vanishing
            let run = tokio::spawn(async move {
                let _lock = run_slot.lock.lock().await;
                debug!(project = %project.name, "Acquired project lock");
                let progress = |event: DeploymentEvent| run_slot.record(&project.name, event);
                executor.execute(&project, &request, &progress).await
            });

            match run.await {
                Ok(outcome) => {
                    info!(project = %name, "Deployment finished: {}", outcome.describe());
                    Some(outcome)
                }
                Err(e) => {
                    error!(project = %name, "Deployment worker crashed: {}", e);
                    slot.record(&name, DeploymentEvent::Abort(format!("worker crashed: {e}")));
                    None
                }
            }
        })
    }

    /// Progress of a project's latest deployment, `None` if never deployed
    pub fn status(&self, project: &str) -> Option<DeploymentStatus> {
        let slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        slots.get(project).map(|slot| slot.fsm().status())
    }

    /// Number of deployment tasks queued or running
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Wait until no deployment task is queued or running
    pub async fn wait_idle(&self, poll_interval: Duration) {
        while self.active() > 0 {
            tokio::time::sleep(poll_interval).await;
        }
    }
}
