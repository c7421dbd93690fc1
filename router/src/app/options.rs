//! Application configuration options

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;

use crate::deploy::executor::ExecutorOptions;
use crate::registry::RegistryOptions;
use crate::storage::settings::Settings;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Server configuration
    pub server: ServerOptions,

    /// Project discovery
    pub registry: RegistryOptions,

    /// Build timeout and settle interval
    pub executor: ExecutorOptions,

    /// Branches whose pushes trigger a deployment
    pub allowed_branches: Vec<String>,

    /// Directory holding last-known-good marker files
    pub marker_dir: PathBuf,

    /// User that owns the working trees
    pub run_as_user: Option<String>,

    /// Build script run inside each project
    pub build_script: String,

    /// Chat webhook for notifications
    pub notification_webhook_url: Option<String>,

    /// Shared secret for payload signatures
    pub webhook_secret: Arc<SecretString>,
}

impl AppOptions {
    pub fn from_settings(settings: &Settings, webhook_secret: Arc<SecretString>) -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
            },
            registry: registry_options(settings),
            executor: ExecutorOptions {
                build_timeout: Duration::from_secs(settings.deploy.build_timeout_secs),
                settle_interval: Duration::from_secs(settings.deploy.settle_secs),
            },
            allowed_branches: settings.allowed_branches.clone(),
            marker_dir: settings.marker_dir.clone(),
            run_as_user: settings.deploy.run_as_user.clone(),
            build_script: settings.deploy.build_script.clone(),
            notification_webhook_url: settings
                .notifications
                .webhook_url
                .clone()
                .filter(|url| !url.is_empty()),
            webhook_secret,
        }
    }
}

/// Project discovery options from the settings file
pub fn registry_options(settings: &Settings) -> RegistryOptions {
    RegistryOptions {
        base_path: settings.projects_base_path.clone(),
        project_marker: settings.project_marker.clone(),
        excluded_dirs: settings.excluded_dirs.clone(),
        service_template: settings.service_template.clone(),
    }
}

/// Lifecycle options for the router
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown, in-flight deployments included
    pub max_shutdown_delay: Duration,

    /// Interval at which shutdown checks for running deployments
    pub idle_poll_interval: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
            idle_poll_interval: Duration::from_millis(250),
        }
    }
}

/// Local HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8001,
        }
    }
}
