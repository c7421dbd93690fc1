//! Deployment notifications
//!
//! The executor and rollback controller talk to a [`Notifier`], which fans a
//! notification out to every configured sink. Sink failures are logged and
//! never reach the caller.

pub mod log;
pub mod webhook;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::errors::RouterError;
use crate::models::deployment::CommitInfo;

/// Notification severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// A single status message
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<CommitInfo>,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            severity,
            project: None,
            commit: None,
            timestamp: Utc::now(),
        }
    }

    pub fn project(mut self, project: &str) -> Self {
        self.project = Some(project.to_string());
        self
    }

    pub fn commit(mut self, commit: &CommitInfo) -> Self {
        self.commit = Some(commit.clone());
        self
    }
}

/// A destination for notifications
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Sink name used in logs
    fn name(&self) -> &str;

    async fn send(&self, notification: &Notification) -> Result<(), RouterError>;
}

/// Fans notifications out to sinks
#[derive(Clone, Default)]
pub struct Notifier {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl Notifier {
    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Deliver to every sink. Never fails.
    pub async fn notify(&self, notification: Notification) {
        for sink in &self.sinks {
            if let Err(e) = sink.send(&notification).await {
                warn!("Notification sink {} failed: {}", sink.name(), e);
            }
        }
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field(
                "sinks",
                &self.sinks.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
