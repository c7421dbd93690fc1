//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::app::state::AppState;
use crate::errors::RouterError;
use crate::registry::ProjectRegistry;
use crate::server::serve::serve;
use crate::workers::deployer::Deployer;

/// Run the webhook router until `shutdown_signal` resolves
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), RouterError> {
    info!("Initializing webhook router...");

    // Create shutdown channel
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), options.lifecycle.clone());

    let app_state = AppState::init(&options)?;
    if let Err(e) = init(&options, &app_state, &shutdown_tx, &mut shutdown_manager).await {
        error!("Failed to start the webhook router: {}", e);
        shutdown_manager.shutdown().await?;
        return Err(e);
    }

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

// =============================== INITIALIZATION ================================== //
async fn init(
    options: &AppOptions,
    app_state: &AppState,
    shutdown_tx: &broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<(), RouterError> {
    log_projects(&app_state.registry).await?;
    shutdown_manager.with_deployer(app_state.deployer.clone())?;
    init_socket_server(options, app_state, shutdown_manager, shutdown_tx.subscribe()).await
}

async fn log_projects(registry: &ProjectRegistry) -> Result<(), RouterError> {
    let projects = registry.discover().await?;
    if projects.is_empty() {
        warn!(
            "No projects found under {}",
            registry.options().base_path.display()
        );
    }
    for project in projects.values() {
        info!("  {}: {} ({})", project.name, project.path.display(), project.service);
    }
    Ok(())
}

async fn init_socket_server(
    options: &AppOptions,
    app_state: &AppState,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), RouterError> {
    info!("Initializing HTTP server...");
    let server_handle = serve(
        &options.server,
        Arc::new(app_state.server_state()),
        async move {
            let _ = shutdown_rx.recv().await;
        },
    )
    .await?;
    shutdown_manager.with_socket_server_handle(server_handle)?;
    Ok(())
}

// ================================= SHUTDOWN ===================================== //
struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    socket_server_handle: Option<JoinHandle<Result<(), RouterError>>>,
    deployer: Option<Arc<Deployer>>,
}

impl ShutdownManager {
    pub fn new(shutdown_tx: broadcast::Sender<()>, lifecycle_options: LifecycleOptions) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            socket_server_handle: None,
            deployer: None,
        }
    }

    pub fn with_deployer(&mut self, deployer: Arc<Deployer>) -> Result<(), RouterError> {
        if self.deployer.is_some() {
            return Err(RouterError::ShutdownError("deployer already set".to_string()));
        }
        self.deployer = Some(deployer);
        Ok(())
    }

    pub fn with_socket_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), RouterError>>,
    ) -> Result<(), RouterError> {
        if self.socket_server_handle.is_some() {
            return Err(RouterError::ShutdownError("server_handle already set".to_string()));
        }
        self.socket_server_handle = Some(handle);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), RouterError> {
        let _ = self.shutdown_tx.send(());

        match tokio::time::timeout(
            self.lifecycle_options.max_shutdown_delay,
            self.shutdown_impl(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                let running = self.deployer.as_ref().map_or(0, |d| d.active());
                error!(
                    "Shutdown timed out after {:?} with {} deployments still running",
                    self.lifecycle_options.max_shutdown_delay, running
                );
                Err(RouterError::ShutdownError(format!(
                    "{running} deployments still running"
                )))
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), RouterError> {
        info!("Shutting down webhook router...");

        // 1. Socket server, stops accepting pushes
        if let Some(handle) = self.socket_server_handle.take() {
            handle
                .await
                .map_err(|e| RouterError::ShutdownError(e.to_string()))??;
        }

        // 2. In-flight deployments
        if let Some(deployer) = self.deployer.take() {
            let running = deployer.active();
            if running > 0 {
                info!("Waiting for {} deployments to finish...", running);
            }
            deployer
                .wait_idle(self.lifecycle_options.idle_poll_interval)
                .await;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
