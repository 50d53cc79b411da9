//! Session API endpoints.
//!
//! - `POST /api/sessions`: create a session
//! - `GET  /api/sessions`: list sessions
//! - `GET  /api/sessions/:id`: full session including trace
//! - `GET  /api/sessions/:id/history`: paginated messages plus summary
//! - `GET  /api/sessions/:id/metrics`: per-session counts and totals

use std::collections::BTreeSet;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;

use maestro_domain::trace::TraceEvent;

use crate::state::AppState;

/// Build a standardized JSON error response: `{ "error": "<message>" }`.
fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

fn not_found(id: &str) -> Response {
    api_error(StatusCode::NOT_FOUND, format!("unknown session '{id}'"))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /api/sessions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub agent_id: String,
    /// Accepted for forward compatibility; not persisted.
    #[serde(default)]
    #[allow(dead_code)]
    pub metadata: Option<serde_json::Value>,
}

pub async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionRequest>,
) -> impl IntoResponse {
    let session = state.sessions.create(&body.agent_id);
    let tracer = crate::runtime::Tracer::new(
        session.session_id.clone(),
        state.sessions.clone(),
        state.metrics.clone(),
    );
    tracer.log(
        "api",
        TraceEvent::SessionCreated,
        serde_json::json!({ "agent_name": body.agent_id }),
    );
    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "session_id": session.session_id,
            "created_at": session.created_at,
        })),
    )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /api/sessions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    let sessions = state.sessions.list();
    Json(serde_json::json!({
        "count": sessions.len(),
        "sessions": sessions,
    }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /api/sessions/:id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match state.sessions.get(&id) {
        Some(session) => Json(session).into_response(),
        None => not_found(&id),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /api/sessions/:id/history?limit&offset
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "d_limit")]
    pub limit: usize,
}

fn d_limit() -> usize {
    100
}

pub async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let Some(session) = state.sessions.get(&id) else {
        return not_found(&id);
    };

    let start = query.offset.min(session.messages.len());
    let end = start.saturating_add(query.limit).min(session.messages.len());

    Json(serde_json::json!({
        "session_id": session.session_id,
        "summary": session.summary,
        "summary_covered": session.summary_covered,
        "message_count": session.message_count,
        "total": session.messages.len(),
        "offset": start,
        "messages": &session.messages[start..end],
    }))
    .into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /api/sessions/:id/metrics
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-session counts, derived from the trace.
pub async fn get_session_metrics(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let Some(session) = state.sessions.get(&id) else {
        return not_found(&id);
    };

    let mut llm_calls: u64 = 0;
    let mut llm_errors: u64 = 0;
    let mut tool_successes: u64 = 0;
    let mut tool_errors: u64 = 0;
    let mut retries: u64 = 0;
    let mut summarizations: u64 = 0;
    let mut prompt_tokens: u64 = 0;
    let mut completion_tokens: u64 = 0;
    let mut providers: BTreeSet<String> = BTreeSet::new();

    for step in &session.trace {
        match step.event {
            TraceEvent::LlmCallSuccess => {
                llm_calls += 1;
                if let Some(p) = step.details.get("provider").and_then(|v| v.as_str()) {
                    providers.insert(p.to_owned());
                }
                prompt_tokens += step
                    .details
                    .get("prompt_tokens")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0);
                completion_tokens += step
                    .details
                    .get("completion_tokens")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0);
            }
            TraceEvent::LlmCallError => llm_errors += 1,
            TraceEvent::ToolExecutionSuccess => tool_successes += 1,
            TraceEvent::ToolExecutionError => tool_errors += 1,
            TraceEvent::RetryAttemptFailed => retries += 1,
            TraceEvent::SummarizationSuccess => summarizations += 1,
            _ => {}
        }
    }

    Json(serde_json::json!({
        "session_id": session.session_id,
        "agent_id": session.agent_id,
        "message_count": session.message_count,
        "trace_steps": session.trace.len(),
        "trace_truncated": session.trace_truncated,
        "llm_calls": llm_calls,
        "llm_errors": llm_errors,
        "tool_successes": tool_successes,
        "tool_errors": tool_errors,
        "retries": retries,
        "summarizations": summarizations,
        "prompt_tokens": prompt_tokens,
        "completion_tokens": completion_tokens,
        "providers_used": providers,
    }))
    .into_response()
}
