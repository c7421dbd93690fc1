//! Settings file management

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::logs::LogLevel;

/// Environment variable overriding the configured webhook secret
pub const WEBHOOK_SECRET_ENV: &str = "WEBHOOK_SECRET";

/// Router settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file sink
    #[serde(default = "default_log_file")]
    pub log_file: Option<PathBuf>,

    /// Emit JSON logs on stdout
    #[serde(default)]
    pub log_json: bool,

    /// Shared secret for payload signatures. `WEBHOOK_SECRET` takes precedence.
    #[serde(default, skip_serializing)]
    pub webhook_secret: Option<String>,

    /// Directory scanned for deployable projects
    #[serde(default = "default_projects_base_path")]
    pub projects_base_path: PathBuf,

    /// File whose presence marks a directory as a project
    #[serde(default = "default_project_marker")]
    pub project_marker: String,

    /// Directory names never treated as projects (dot-directories always are)
    #[serde(default = "default_excluded_dirs")]
    pub excluded_dirs: Vec<String>,

    /// Service unit name template, `{project}` is substituted
    #[serde(default = "default_service_template")]
    pub service_template: String,

    /// Branches whose pushes trigger a deployment
    #[serde(default = "default_allowed_branches")]
    pub allowed_branches: Vec<String>,

    /// Directory holding the last-known-good marker files
    #[serde(default = "default_marker_dir")]
    pub marker_dir: PathBuf,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Deployment configuration
    #[serde(default)]
    pub deploy: DeploySettings,

    /// External notification channels
    #[serde(default)]
    pub notifications: NotificationSettings,
}

fn default_log_file() -> Option<PathBuf> {
    Some(PathBuf::from("/var/log/django/webhook-router.log"))
}

fn default_projects_base_path() -> PathBuf {
    PathBuf::from("/var/www")
}

fn default_project_marker() -> String {
    "manage.py".to_string()
}

fn default_excluded_dirs() -> Vec<String> {
    vec!["html".to_string()]
}

fn default_service_template() -> String {
    "gunicorn-{project}.service".to_string()
}

fn default_allowed_branches() -> Vec<String> {
    vec!["main".to_string(), "master".to_string()]
}

fn default_marker_dir() -> PathBuf {
    std::env::temp_dir()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_file: default_log_file(),
            log_json: false,
            webhook_secret: None,
            projects_base_path: default_projects_base_path(),
            project_marker: default_project_marker(),
            excluded_dirs: default_excluded_dirs(),
            service_template: default_service_template(),
            allowed_branches: default_allowed_branches(),
            marker_dir: default_marker_dir(),
            server: ServerSettings::default(),
            deploy: DeploySettings::default(),
            notifications: NotificationSettings::default(),
        }
    }
}

impl Settings {
    /// Resolve the webhook secret, preferring the environment
    pub fn resolve_secret(&self) -> Option<String> {
        self.secret_with_override(std::env::var(WEBHOOK_SECRET_ENV).ok())
    }

    /// An empty value on either side counts as unset
    fn secret_with_override(&self, env_value: Option<String>) -> Option<String> {
        env_value
            .filter(|s| !s.is_empty())
            .or_else(|| self.webhook_secret.clone().filter(|s| !s.is_empty()))
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8001
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Deployment settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploySettings {
    /// Upper bound for fetch, reset and build script together
    #[serde(default = "default_build_timeout_secs")]
    pub build_timeout_secs: u64,

    /// Wait between service restart and the health probe
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,

    /// Unix user that owns the working trees; commands that mutate them run as this user
    #[serde(default = "default_run_as_user")]
    pub run_as_user: Option<String>,

    /// Project build script, run with `bash -c` inside the project directory
    #[serde(default = "default_build_script")]
    pub build_script: String,
}

fn default_build_timeout_secs() -> u64 {
    300
}

fn default_settle_secs() -> u64 {
    3
}

fn default_run_as_user() -> Option<String> {
    Some("django".to_string())
}

fn default_build_script() -> String {
    [
        "set -e",
        "source venv/bin/activate",
        "pip install -r requirements.txt",
        "python manage.py migrate",
        "python manage.py collectstatic --noinput",
        "python manage.py check --deploy",
    ]
    .join("\n")
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            build_timeout_secs: default_build_timeout_secs(),
            settle_secs: default_settle_secs(),
            run_as_user: default_run_as_user(),
            build_script: default_build_script(),
        }
    }
}

/// Notification channel settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationSettings {
    /// Slack/Discord-compatible incoming webhook URL
    #[serde(default)]
    pub webhook_url: Option<String>,
}
