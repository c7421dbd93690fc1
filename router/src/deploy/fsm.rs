//! Finite State Machine for per-project deployment progress

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Deployment state of one project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentState {
    /// No deployment since startup
    Idle,

    /// Accepted, waiting for the project lock
    Queued,

    /// Fetching and running the build step
    Building,

    /// Restarting the service and probing health
    Restarting,

    /// Reverting to the last known good revision
    RollingBack,

    /// Last run deployed and the service is active
    Succeeded,

    /// Last run failed and the project was reverted
    RolledBack,

    /// Last run failed and could not be reverted
    Failed,
}

impl DeploymentState {
    /// True while a worker owns the project
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            DeploymentState::Building | DeploymentState::Restarting | DeploymentState::RollingBack
        )
    }

    fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeploymentState::Idle
                | DeploymentState::Succeeded
                | DeploymentState::RolledBack
                | DeploymentState::Failed
        )
    }
}

/// Deployment event
#[derive(Debug, Clone)]
pub enum DeploymentEvent {
    /// A push was accepted for this project
    Enqueue,

    /// A worker acquired the project and started a run
    Start { commit: String },

    /// Build step passed
    BuildPassed,

    /// Service reported active after restart
    Healthy,

    /// Build failed, timed out, service unhealthy or an unexpected error
    Failed(String),

    /// Rollback finished; `restored` is false when nothing could be reverted
    RollbackFinished { restored: bool },

    /// Run ended without reaching the rollback path
    Abort(String),
}

/// Serializable view of a project's deployment progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentStatus {
    pub state: DeploymentState,
    pub queued: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Deployment FSM
#[derive(Debug, Clone)]
pub struct DeploymentFsm {
    state: DeploymentState,
    queued: u32,
    commit: Option<String>,
    error: Option<String>,
    updated_at: DateTime<Utc>,
}

impl DeploymentFsm {
    /// Create a new FSM in idle state
    pub fn new() -> Self {
        Self {
            state: DeploymentState::Idle,
            queued: 0,
            commit: None,
            error: None,
            updated_at: Utc::now(),
        }
    }

    /// Get current state
    pub fn state(&self) -> DeploymentState {
        self.state
    }

    /// Get error message of the last failed run, if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Number of accepted runs that have not started yet
    pub fn queued(&self) -> u32 {
        self.queued
    }

    pub fn status(&self) -> DeploymentStatus {
        DeploymentStatus {
            state: self.state,
            queued: self.queued,
            commit: self.commit.clone(),
            error: self.error.clone(),
            updated_at: self.updated_at,
        }
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: DeploymentEvent) -> Result<(), String> {
        let new_state = match (&self.state, &event) {
            // Queueing never interrupts a run in progress
            (state, DeploymentEvent::Enqueue) => {
                self.queued += 1;
                if state.is_terminal() {
                    DeploymentState::Queued
                } else {
                    *state
                }
            }

            (state, DeploymentEvent::Start { commit })
                if self.queued > 0 && (*state == DeploymentState::Queued || state.is_terminal()) =>
            {
                self.queued -= 1;
                self.commit = Some(commit.clone());
                self.error = None;
                DeploymentState::Building
            }

            (DeploymentState::Building, DeploymentEvent::BuildPassed) => DeploymentState::Restarting,

            (DeploymentState::Restarting, DeploymentEvent::Healthy) => DeploymentState::Succeeded,

            (DeploymentState::Building | DeploymentState::Restarting, DeploymentEvent::Failed(err)) => {
                self.error = Some(err.clone());
                DeploymentState::RollingBack
            }

            (DeploymentState::RollingBack, DeploymentEvent::RollbackFinished { restored }) => {
                if *restored {
                    DeploymentState::RolledBack
                } else {
                    DeploymentState::Failed
                }
            }

            (state, DeploymentEvent::Abort(err)) if state.is_active() => {
                self.error = Some(err.clone());
                DeploymentState::Failed
            }

            // A run that panicked before starting still consumed its queue slot
            (DeploymentState::Queued, DeploymentEvent::Abort(err)) if self.queued > 0 => {
                self.queued -= 1;
                self.error = Some(err.clone());
                if self.queued > 0 {
                    DeploymentState::Queued
                } else {
                    DeploymentState::Failed
                }
            }

            // Invalid transitions
            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        self.updated_at = Utc::now();
        Ok(())
    }
}

impl Default for DeploymentFsm {
    fn default() -> Self {
        Self::new()
    }
}
