pub mod health;
pub mod metrics;
pub mod orchestrate;
pub mod providers;
pub mod sessions;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
pub fn router() -> Router<AppState> {
    Router::new()
        // Sessions
        .route(
            "/api/sessions",
            post(sessions::create_session).get(sessions::list_sessions),
        )
        .route("/api/sessions/:id", get(sessions::get_session))
        .route("/api/sessions/:id/history", get(sessions::get_history))
        .route("/api/sessions/:id/metrics", get(sessions::get_session_metrics))
        // Orchestration (core runtime)
        .route("/api/orchestrate", post(orchestrate::orchestrate))
        // Providers
        .route("/api/providers", get(providers::list_providers))
        // Health + metrics
        .route("/api/health", get(health::health))
        .route("/api/metrics", get(metrics::render_metrics))
}
