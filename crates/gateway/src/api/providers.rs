//! `GET /api/providers`: the factory's provider enumeration.

use axum::extract::State;
use axum::response::{IntoResponse, Json};

use crate::state::AppState;

pub async fn list_providers(State(state): State<AppState>) -> impl IntoResponse {
    let providers = state.providers.list();
    Json(serde_json::json!({
        "count": providers.len(),
        "providers": providers,
    }))
}
