//! Webhook Router - Entry Point
//!
//! Receives push notifications for every project hosted under one directory
//! and redeploys the matching project, rolling back when the deployment fails.

use std::collections::HashMap;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use hookrouter::app::options::{registry_options, AppOptions};
use hookrouter::app::run::run;
use hookrouter::errors::RouterError;
use hookrouter::filesys::file::File;
use hookrouter::logs::{init_logging, LogOptions};
use hookrouter::registry::ProjectRegistry;
use hookrouter::storage::layout::StorageLayout;
use hookrouter::storage::settings::{Settings, WEBHOOK_SECRET_ENV};
use hookrouter::utils::version_info;

use secrecy::SecretString;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Failed to serialize version info: {e}"),
        }
        return ExitCode::SUCCESS;
    }

    // Retrieve the settings file
    let settings_file = match cli_args.get("config") {
        Some(path) => File::new(path),
        None => StorageLayout::default().settings_file(),
    };
    let (settings, settings_found) = match load_settings(&settings_file).await {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!(
                "Unable to read settings file {}: {e}",
                settings_file.path().display()
            );
            return ExitCode::FAILURE;
        }
    };

    // Print discovered projects and exit
    if cli_args.contains_key("discover") {
        return discover(&settings).await;
    }

    // Initialize logging, the guard flushes the log file on exit
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        log_file: settings.log_file.clone(),
        json_format: settings.log_json,
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            println!("Failed to initialize logging: {e}");
            None
        }
    };
    if !settings_found {
        warn!(
            "Settings file {} not found, using defaults",
            settings_file.path().display()
        );
    }

    // Refuse to start without a secret
    let Some(secret) = settings.resolve_secret() else {
        error!(
            "No webhook secret configured: set {} or webhook_secret in the settings file",
            WEBHOOK_SECRET_ENV
        );
        return ExitCode::FAILURE;
    };

    let options = AppOptions::from_settings(&settings, Arc::new(SecretString::from(secret)));
    info!(
        "Running webhook router {} ({}) with options: {:?}",
        version.version, version.git_hash, options
    );
    match run(options, await_shutdown_signal()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Failed to run the webhook router: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Read the settings file. A missing file yields the defaults.
async fn load_settings(file: &File) -> Result<(Settings, bool), RouterError> {
    if !file.exists().await {
        return Ok((Settings::default(), false));
    }
    Ok((file.read_json::<Settings>().await?, true))
}

async fn discover(settings: &Settings) -> ExitCode {
    let registry = ProjectRegistry::new(registry_options(settings));
    let projects = match registry.discover().await {
        Ok(projects) => projects,
        Err(e) => {
            eprintln!("Project discovery failed: {e}");
            return ExitCode::FAILURE;
        }
    };
    match serde_json::to_string_pretty(&projects) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to serialize projects: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                _ => {
                    warn!("Unable to install signal handlers, falling back to Ctrl+C");
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Ctrl+C received, shutting down...");
    }
}
