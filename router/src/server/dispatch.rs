//! Push dispatch
//!
//! Checks run in a fixed order and stop at the first failure: signature,
//! payload, event type, branch, project lookup. Only a push that passes all of
//! them launches a deployment, and the reply never waits for it.

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::authn::signature::SIGNATURE_HEADER;
use crate::models::deployment::DeploymentRequest;
use crate::models::push::{project_name_from_repo_url, PushPayload, EVENT_HEADER, PUSH_EVENT};
use crate::server::state::ServerState;

/// Reply to one push notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchReply {
    /// A deployment was launched
    Accepted {
        project: String,
        branch: String,
        commit: String,
    },
    /// Not an error, nothing to do
    Ignored(String),
    /// Refused before anything was launched
    Rejected(StatusCode, String),
}

#[derive(Debug, Serialize)]
struct AcceptedResponse<'a> {
    message: &'static str,
    project: &'a str,
    branch: &'a str,
    commit: &'a str,
}

#[derive(Debug, Serialize)]
struct MessageResponse<'a> {
    message: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for DispatchReply {
    fn into_response(self) -> Response {
        match self {
            DispatchReply::Accepted {
                project,
                branch,
                commit,
            } => Json(AcceptedResponse {
                message: "Deployment started",
                project: &project,
                branch: &branch,
                commit: &commit,
            })
            .into_response(),
            DispatchReply::Ignored(message) => {
                Json(MessageResponse { message: &message }).into_response()
            }
            DispatchReply::Rejected(status, error) => {
                (status, Json(ErrorResponse { error })).into_response()
            }
        }
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Verify the signature over the raw body, then parse it
pub fn authenticate(
    state: &ServerState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<PushPayload, DispatchReply> {
    if !state.verifier.verify(body, header(headers, SIGNATURE_HEADER)) {
        warn!("Invalid webhook signature");
        return Err(DispatchReply::Rejected(
            StatusCode::FORBIDDEN,
            "Invalid signature".to_string(),
        ));
    }

    serde_json::from_slice::<PushPayload>(body).map_err(|e| {
        warn!("Invalid JSON payload: {}", e);
        DispatchReply::Rejected(StatusCode::BAD_REQUEST, "Invalid JSON".to_string())
    })
}

/// Project name for the generic endpoint, taken from the repository URL
pub fn project_from_payload(payload: &PushPayload) -> Result<String, DispatchReply> {
    let no_url = || {
        warn!("No repository URL found in payload");
        DispatchReply::Rejected(
            StatusCode::BAD_REQUEST,
            "No repository URL found".to_string(),
        )
    };
    let url = payload.repository_url().ok_or_else(no_url)?;
    let name = project_name_from_repo_url(url).ok_or_else(no_url)?;
    info!("Extracted project name: {} from URL: {}", name, url);
    Ok(name)
}

/// Route an authenticated push for `project_name`
pub async fn dispatch(
    state: &ServerState,
    headers: &HeaderMap,
    project_name: &str,
    payload: &PushPayload,
) -> DispatchReply {
    let event = header(headers, EVENT_HEADER);
    if event != Some(PUSH_EVENT) {
        info!(
            "Ignoring non-push event for {}: {}",
            project_name,
            event.unwrap_or("none")
        );
        return DispatchReply::Ignored("Not a push event".to_string());
    }

    let branch = payload.branch();
    if !state.is_branch_allowed(branch) {
        info!("Ignoring push to branch {} for {}", branch, project_name);
        return DispatchReply::Ignored(format!("Ignoring branch {branch}"));
    }

    let project = match state.registry.resolve(project_name).await {
        Ok(Some(project)) => project,
        Ok(None) => {
            warn!("Project not found: {}", project_name);
            return DispatchReply::Rejected(
                StatusCode::NOT_FOUND,
                format!("Project {project_name} not found"),
            );
        }
        Err(e) => {
            error!("Project discovery failed: {}", e);
            return DispatchReply::Rejected(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };

    let request = DeploymentRequest::new(
        &project.name,
        branch,
        payload.commit_hash(),
        payload.commit_message(),
    );
    info!("Deployment triggered for {}", project.name);
    info!(
        "Branch: {}, Commit: {} - {}",
        branch,
        request.commit.short_hash(),
        request.commit.message
    );

    let reply = DispatchReply::Accepted {
        project: project.name.clone(),
        branch: branch.to_string(),
        commit: request.commit.short_hash().to_string(),
    };

    // Detached; the deployer tracks the task
    let _ = state.deployer.launch(project, request);
    reply
}
