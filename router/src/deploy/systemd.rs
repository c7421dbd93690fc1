//! systemd service supervisor

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::deploy::adapters::ServiceSupervisor;
use crate::errors::RouterError;

/// `systemctl` adapter
#[derive(Debug, Clone, Default)]
pub struct Systemctl;

#[async_trait]
impl ServiceSupervisor for Systemctl {
    async fn restart(&self, service: &str) -> Result<(), RouterError> {
        debug!("systemctl restart {}", service);
        let output = Command::new("systemctl")
            .args(["restart", service])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| RouterError::ServiceError(format!("Failed to run systemctl: {}", e)))?;

        if !output.status.success() {
            return Err(RouterError::ServiceError(format!(
                "systemctl restart {} failed: {}",
                service,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    async fn status(&self, service: &str) -> Result<String, RouterError> {
        // is-active exits non-zero for anything but active; the word on stdout is what matters
        let output = Command::new("systemctl")
            .args(["is-active", service])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| RouterError::ServiceError(format!("Failed to run systemctl: {}", e)))?;

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
