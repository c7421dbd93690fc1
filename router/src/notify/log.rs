//! Log sink

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::errors::RouterError;
use crate::notify::{Notification, NotificationSink, Severity};

/// Writes notifications to the tracing log
#[derive(Debug, Clone, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, notification: &Notification) -> Result<(), RouterError> {
        let project = notification.project.as_deref().unwrap_or("-");
        match notification.severity {
            Severity::Info | Severity::Success => {
                info!(project, "Notification: {}", notification.message)
            }
            Severity::Warning => warn!(project, "Notification: {}", notification.message),
            Severity::Error => error!(project, "Notification: {}", notification.message),
        }
        Ok(())
    }
}
