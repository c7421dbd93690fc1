//! Shell script build step

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::deploy::adapters::{BuildReport, BuildStep};
use crate::errors::RouterError;

/// Environment variable holding the pushed branch inside the script
pub const BRANCH_ENV: &str = "DEPLOY_BRANCH";

/// Time an abandoned build gets between SIGTERM and SIGKILL
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Signals a build's process group when the build future is dropped before
/// the script exits. SIGTERM goes first so `sudo` can relay it to the command
/// it started, SIGKILL follows after [`KILL_GRACE`].
struct ProcessGroupGuard {
    pgid: Option<libc::pid_t>,
}

impl ProcessGroupGuard {
    fn new(pid: Option<u32>) -> Self {
        Self {
            pgid: pid.and_then(|pid| libc::pid_t::try_from(pid).ok()),
        }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        let Some(pgid) = self.pgid.take() else {
            return;
        };
        warn!(pgid, "Terminating abandoned build process group");
        signal_group(pgid, libc::SIGTERM);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(KILL_GRACE).await;
                    signal_group(pgid, libc::SIGKILL);
                });
            }
            Err(_) => signal_group(pgid, libc::SIGKILL),
        }
    }
}

fn signal_group(pgid: libc::pid_t, signal: libc::c_int) {
    // SAFETY: killpg takes no pointers
    if unsafe { libc::killpg(pgid, signal) } != 0 {
        debug!(pgid, signal, "Process group already gone");
    }
}

/// Runs the configured script with `bash -c` in the project directory.
///
/// The script runs in its own process group. Dropping the returned future,
/// which is how the executor's timeout ends a hung build, terminates every
/// process the script started and not only the direct child.
#[derive(Debug, Clone)]
pub struct ScriptBuildStep {
    script: String,
    run_as_user: Option<String>,
}

impl ScriptBuildStep {
    pub fn new(script: impl Into<String>, run_as_user: Option<String>) -> Self {
        Self {
            script: script.into(),
            run_as_user,
        }
    }

    fn command(&self, project_dir: &Path, branch: &str) -> Command {
        // `env` survives sudo's environment reset
        let mut cmd = match &self.run_as_user {
            Some(user) => {
                let mut cmd = Command::new("sudo");
                cmd.args(["-u", user.as_str(), "env"]);
                cmd
            }
            None => Command::new("env"),
        };
        cmd.arg(format!("{BRANCH_ENV}={branch}"))
            .args(["bash", "-c", self.script.as_str()])
            .current_dir(project_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0);
        cmd
    }
}

#[async_trait]
impl BuildStep for ScriptBuildStep {
    async fn run(&self, project_dir: &Path, branch: &str) -> Result<BuildReport, RouterError> {
        debug!("Running build script in {}", project_dir.display());
        let child = self
            .command(project_dir, branch)
            .spawn()
            .map_err(|e| RouterError::BuildError(format!("Failed to run build script: {}", e)))?;
        let mut group = ProcessGroupGuard::new(child.id());

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| RouterError::BuildError(format!("Failed to run build script: {}", e)))?;
        group.disarm();

        let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&stderr);
        }

        Ok(BuildReport {
            exit_code: output.status.code(),
            output: combined,
        })
    }
}
