//! HTTP request handlers

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::future::join_all;
use serde::Serialize;
use tracing::error;

use crate::deploy::fsm::DeploymentStatus;
use crate::registry::Project;
use crate::server::dispatch::{authenticate, dispatch, project_from_payload, ErrorResponse};
use crate::server::state::ServerState;
use crate::utils::{short_hash, timestamp_now, version_info};

const UNKNOWN: &str = "unknown";

/// Project-qualified push handler
pub async fn project_webhook_handler(
    State(state): State<Arc<ServerState>>,
    Path(project): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let payload = match authenticate(&state, &headers, &body) {
        Ok(payload) => payload,
        Err(reply) => return reply.into_response(),
    };
    dispatch(&state, &headers, &project, &payload)
        .await
        .into_response()
}

/// Generic push handler, routes by repository URL
pub async fn generic_webhook_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let payload = match authenticate(&state, &headers, &body) {
        Ok(payload) => payload,
        Err(reply) => return reply.into_response(),
    };
    let project = match project_from_payload(&payload) {
        Ok(project) => project,
        Err(reply) => return reply.into_response(),
    };
    dispatch(&state, &headers, &project, &payload)
        .await
        .into_response()
}

fn internal_error(e: impl std::fmt::Display) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub projects_count: usize,
    pub projects: Vec<String>,
}

/// Health check handler
pub async fn health_handler(State(state): State<Arc<ServerState>>) -> Response {
    match state.registry.discover().await {
        Ok(projects) => Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: timestamp_now(),
            projects_count: projects.len(),
            projects: projects.into_keys().collect(),
        })
        .into_response(),
        Err(e) => {
            error!("Project discovery failed: {}", e);
            internal_error(e)
        }
    }
}

/// Status of one project
#[derive(Debug, Serialize)]
pub struct ProjectStatus {
    pub service_status: String,
    pub current_commit: String,
    pub path: PathBuf,
    pub service: String,

    /// Present once the project has been deployed since startup
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment: Option<DeploymentStatus>,
}

/// Status response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub timestamp: String,
    pub projects: BTreeMap<String, ProjectStatus>,
}

async fn project_status(state: &ServerState, project: Project) -> (String, ProjectStatus) {
    let (service_status, revision) = tokio::join!(
        state.supervisor.status(&project.service),
        state.vcs.current_revision(&project.path),
    );
    let status = ProjectStatus {
        service_status: service_status.unwrap_or_else(|_| UNKNOWN.to_string()),
        current_commit: revision
            .map(|r| short_hash(&r).to_string())
            .unwrap_or_else(|_| UNKNOWN.to_string()),
        deployment: state.deployer.status(&project.name),
        path: project.path,
        service: project.service,
    };
    (project.name, status)
}

/// Status handler. A failure probing one project degrades that entry only.
pub async fn status_handler(State(state): State<Arc<ServerState>>) -> Response {
    let projects = match state.registry.discover().await {
        Ok(projects) => projects,
        Err(e) => {
            error!("Project discovery failed: {}", e);
            return internal_error(e);
        }
    };

    let statuses = join_all(
        projects
            .into_values()
            .map(|project| project_status(&state, project)),
    )
    .await;

    Json(StatusResponse {
        timestamp: timestamp_now(),
        projects: statuses.into_iter().collect(),
    })
    .into_response()
}

/// Version response
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}
