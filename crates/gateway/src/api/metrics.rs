//! `GET /api/metrics`: exposition-format rendering of the process
//! metrics registry.

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

pub async fn render_metrics(State(state): State<AppState>) -> Response {
    let body = state.metrics.render();
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response()
}
