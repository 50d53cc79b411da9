//! `POST /api/orchestrate`: run one agent request to completion.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use tokio_util::sync::CancellationToken;

use maestro_domain::OrchestrationRequest;

use crate::runtime::run_orchestration;
use crate::state::AppState;

/// The orchestrator itself never errors at the transport level; the HTTP
/// status is derived from `metadata.error_code` per the failure taxonomy
/// (200 for non-fatal outcomes, 400 for validation, 502 for terminal
/// provider failures, 504 for the request deadline).
pub async fn orchestrate(
    State(state): State<AppState>,
    Json(body): Json<OrchestrationRequest>,
) -> Response {
    // The token is scoped to this request; the orchestrator, the backoff
    // sleeps, and tool executors all observe it.
    let cancel = CancellationToken::new();
    let response = run_orchestration(&state, body, cancel).await;

    let status = match response.metadata.error_code {
        Some(kind) => StatusCode::from_u16(kind.http_status()).unwrap_or(StatusCode::BAD_GATEWAY),
        None => StatusCode::OK,
    };
    (status, Json(response)).into_response()
}
