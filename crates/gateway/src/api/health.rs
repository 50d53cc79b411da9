//! `GET /api/health`: aggregated health across configured adapters and
//! the core.

use std::time::Duration;

use axum::extract::State;
use axum::response::{IntoResponse, Json};
use serde::Serialize;

use crate::state::AppState;

/// Bound on each adapter probe so one slow vendor cannot stall the
/// endpoint.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize)]
struct ProviderHealth {
    provider: String,
    ok: bool,
    latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let tags = state.providers.configured_tags();

    let probes = tags.iter().map(|tag| {
        let state = state.clone();
        let tag = *tag;
        async move {
            let adapter = match state.providers.get(tag, None) {
                Ok(a) => a,
                Err(e) => {
                    return ProviderHealth {
                        provider: tag.as_str().to_owned(),
                        ok: false,
                        latency_ms: 0,
                        error: Some(e.kind().code().to_owned()),
                    }
                }
            };
            match tokio::time::timeout(PROBE_TIMEOUT, adapter.health()).await {
                Ok(report) => ProviderHealth {
                    provider: tag.as_str().to_owned(),
                    ok: report.ok,
                    latency_ms: report.latency.as_millis() as u64,
                    error: report.error,
                },
                Err(_) => ProviderHealth {
                    provider: tag.as_str().to_owned(),
                    ok: false,
                    latency_ms: PROBE_TIMEOUT.as_millis() as u64,
                    error: Some("health probe timed out".into()),
                },
            }
        }
    });

    let providers: Vec<ProviderHealth> = futures_util::future::join_all(probes).await;
    let all_ok = providers.iter().all(|p| p.ok);

    Json(serde_json::json!({
        "status": if all_ok { "ok" } else { "degraded" },
        "version": env!("CARGO_PKG_VERSION"),
        "active_sessions": state.sessions.len(),
        "providers": providers,
    }))
}
