//! Error types for the webhook router

use thiserror::Error;

/// Main error type for the router
#[derive(Error, Debug)]
pub enum RouterError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Version control error: {0}")]
    VcsError(String),

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Build error: {0}")]
    BuildError(String),

    #[error("Marker error: {0}")]
    MarkerError(String),

    #[error("Notification error: {0}")]
    NotifyError(String),
}
