//! Application state management

use std::sync::Arc;

use tracing::info;

use crate::app::options::AppOptions;
use crate::authn::signature::SignatureVerifier;
use crate::deploy::executor::{Adapters, DeploymentExecutor};
use crate::deploy::git::GitCli;
use crate::deploy::marker::MarkerStore;
use crate::deploy::script::ScriptBuildStep;
use crate::deploy::systemd::Systemctl;
use crate::errors::RouterError;
use crate::notify::log::LogSink;
use crate::notify::webhook::WebhookSink;
use crate::notify::Notifier;
use crate::registry::ProjectRegistry;
use crate::server::state::ServerState;
use crate::workers::deployer::Deployer;

/// Main application state
pub struct AppState {
    /// Payload signature verifier
    pub verifier: Arc<SignatureVerifier>,

    /// Project discovery
    pub registry: Arc<ProjectRegistry>,

    /// Version control, supervisor and build step
    pub adapters: Adapters,

    /// Deployment tasks
    pub deployer: Arc<Deployer>,

    /// Branches whose pushes trigger a deployment
    pub allowed_branches: Vec<String>,
}

impl AppState {
    /// Initialize application state with the host adapters (git, systemctl, bash)
    pub fn init(options: &AppOptions) -> Result<Self, RouterError> {
        info!("Initializing application state...");

        let adapters = Adapters {
            vcs: Arc::new(GitCli::new(options.run_as_user.clone())),
            supervisor: Arc::new(Systemctl),
            build: Arc::new(ScriptBuildStep::new(
                options.build_script.clone(),
                options.run_as_user.clone(),
            )),
        };

        let mut notifier = Notifier::default().with_sink(Arc::new(LogSink));
        if let Some(url) = &options.notification_webhook_url {
            notifier = notifier.with_sink(Arc::new(WebhookSink::new(url)?));
        }

        Ok(Self::with_adapters(options, adapters, notifier))
    }

    /// Initialize application state around the given adapters
    pub fn with_adapters(options: &AppOptions, adapters: Adapters, notifier: Notifier) -> Self {
        let executor = Arc::new(DeploymentExecutor::new(
            options.executor.clone(),
            adapters.clone(),
            MarkerStore::new(&options.marker_dir),
            notifier,
        ));

        Self {
            verifier: Arc::new(SignatureVerifier::new(options.webhook_secret.clone())),
            registry: Arc::new(ProjectRegistry::new(options.registry.clone())),
            adapters,
            deployer: Arc::new(Deployer::new(executor)),
            allowed_branches: options.allowed_branches.clone(),
        }
    }

    /// State handed to the HTTP handlers
    pub fn server_state(&self) -> ServerState {
        ServerState::new(
            self.verifier.clone(),
            self.registry.clone(),
            self.deployer.clone(),
            self.adapters.vcs.clone(),
            self.adapters.supervisor.clone(),
            self.allowed_branches.clone(),
        )
    }
}
