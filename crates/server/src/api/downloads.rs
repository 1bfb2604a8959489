//! Download run API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use beeb_core::{parse_programme_url, validate_pid, DownloadRequest, WorkflowError};

use crate::metrics::DOWNLOADS_STARTED_TOTAL;
use crate::runs::{CancelOutcome, RunStatus};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for starting a download. Exactly one field must be set.
#[derive(Debug, Deserialize)]
pub struct StartDownloadBody {
    /// iPlayer or Sounds page URL
    pub url: Option<String>,
    /// Bare programme identifier
    pub programme_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartDownloadResponse {
    pub workflow_id: String,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub workflow_id: String,
    pub cancelled: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Builds `download-pid-<pid>-<6 hex>`.
pub fn new_workflow_id(pid: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("download-pid-{}-{}", pid, &suffix[..6])
}

fn resolve_pid(body: &StartDownloadBody) -> Result<String, String> {
    match (&body.url, &body.programme_id) {
        (Some(url), None) => parse_programme_url(url).map_err(|e| e.to_string()),
        (None, Some(pid)) => validate_pid(pid.trim())
            .map(str::to_string)
            .map_err(|e| e.to_string()),
        (Some(_), Some(_)) => Err("Provide either url or programme_id, not both".to_string()),
        (None, None) => Err("Either url or programme_id is required".to_string()),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Start a download run in the background
pub async fn start_download(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StartDownloadBody>,
) -> Response {
    let pid = match resolve_pid(&body) {
        Ok(pid) => pid,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, message),
    };

    let workflow_id = new_workflow_id(&pid);
    let runs = state.runs().clone();
    if !runs.begin(&workflow_id, &pid) {
        return error_response(
            StatusCode::CONFLICT,
            format!("Workflow {} already exists", workflow_id),
        );
    }

    let handle = match state
        .workflow()
        .start(workflow_id.clone(), DownloadRequest::new(pid.clone()))
    {
        Ok(handle) => handle,
        Err(e @ WorkflowError::AlreadyStarted(_)) => {
            runs.discard(&workflow_id);
            return error_response(StatusCode::CONFLICT, e.to_string());
        }
        Err(e) => {
            runs.discard(&workflow_id);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };

    runs.attach(&workflow_id, handle.abort_handle());
    let id = workflow_id.clone();
    tokio::spawn(async move {
        let outcome = handle.result().await;
        if let Err(e) = &outcome {
            warn!(workflow_id = %id, error = %e, "Download run ended with an error");
        }
        runs.finish(&id, outcome);
    });

    DOWNLOADS_STARTED_TOTAL.inc();
    info!(workflow_id = %workflow_id, pid = %pid, "Started download workflow");

    (
        StatusCode::CREATED,
        Json(StartDownloadResponse { workflow_id }),
    )
        .into_response()
}

/// Get the status of a run
pub async fn get_download(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RunStatus>, Response> {
    state
        .runs()
        .get(&id)
        .map(Json)
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, format!("Run not found: {}", id)))
}

/// Cancel a live run
pub async fn cancel_download(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.runs().cancel(&id).await {
        CancelOutcome::Cancelled => {
            info!(workflow_id = %id, "Cancelled download workflow");
            (
                StatusCode::ACCEPTED,
                Json(CancelResponse {
                    workflow_id: id,
                    cancelled: true,
                }),
            )
                .into_response()
        }
        CancelOutcome::AlreadyFinished(phase) => error_response(
            StatusCode::CONFLICT,
            format!("Run {} already finished ({})", id, phase),
        ),
        CancelOutcome::NotFound => {
            error_response(StatusCode::NOT_FOUND, format!("Run not found: {}", id))
        }
    }
}
