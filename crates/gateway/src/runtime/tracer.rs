//! Per-session event recorder.
//!
//! Every runtime component reports through a [`Tracer`]: each `log` call
//! appends a trace step to the session and mirrors the event into the
//! metrics collector via a fixed event→metric mapping. A failure to
//! append never propagates to the caller.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use maestro_domain::session::TraceStep;
use maestro_domain::trace::TraceEvent;
use maestro_domain::Usage;
use maestro_metrics::Metrics;
use maestro_sessions::SessionStore;

pub struct Tracer {
    session_id: String,
    started: Instant,
    store: Arc<SessionStore>,
    metrics: Arc<Metrics>,
}

impl Tracer {
    pub fn new(session_id: String, store: Arc<SessionStore>, metrics: Arc<Metrics>) -> Self {
        Self {
            session_id,
            started: Instant::now(),
            store,
            metrics,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Record one event: append the trace step, then apply the event's
    /// metric effect. Append failures are logged locally and counted as
    /// `TRACE_APPEND_FAILURE`, never surfaced.
    pub fn log(&self, component: &str, event: TraceEvent, details: Value) {
        let step = TraceStep {
            timestamp: chrono::Utc::now(),
            elapsed_ms: self.started.elapsed().as_millis() as u64,
            component: component.to_owned(),
            event,
            details: details.clone(),
        };

        if let Err(e) = self.store.append_trace_step(&self.session_id, step) {
            tracing::warn!(
                session_id = %self.session_id,
                event = %event,
                error = %e,
                "trace append failed"
            );
            self.metrics
                .record_orchestrator_error("TRACE_APPEND_FAILURE", component);
        }

        self.mirror(component, event, &details);
    }

    // ── Event → metric mapping ─────────────────────────────────────

    fn mirror(&self, component: &str, event: TraceEvent, details: &Value) {
        match event {
            TraceEvent::LlmCallSuccess => {
                let usage = match (
                    detail_u64(details, "prompt_tokens"),
                    detail_u64(details, "completion_tokens"),
                ) {
                    (Some(prompt), Some(completion)) => Some(Usage {
                        prompt_tokens: prompt as u32,
                        completion_tokens: completion as u32,
                    }),
                    _ => None,
                };
                self.metrics.record_llm_success(
                    detail_str(details, "provider"),
                    detail_str(details, "model"),
                    detail_f64(details, "duration_seconds"),
                    usage,
                );
            }
            TraceEvent::LlmCallError => {
                self.metrics.record_llm_error(
                    detail_str(details, "provider"),
                    detail_str(details, "model"),
                    detail_str(details, "error_type"),
                    component,
                );
            }
            TraceEvent::ToolExecutionSuccess => {
                self.metrics.record_tool_success(
                    detail_str(details, "tool_name"),
                    detail_f64(details, "duration_seconds"),
                );
            }
            TraceEvent::ToolExecutionError => {
                self.metrics.record_tool_error(
                    detail_str(details, "tool_name"),
                    detail_str(details, "error_type"),
                    component,
                );
            }
            TraceEvent::RetryAttemptFailed => {
                self.metrics
                    .record_retry_attempt(component, detail_str(details, "error_type"));
            }
            TraceEvent::SessionCreated => {
                self.metrics
                    .record_session_created(detail_str(details, "agent_name"));
            }
            TraceEvent::SessionCompleted => {
                self.metrics.record_session_completed(
                    detail_str(details, "agent_name"),
                    detail_f64(details, "duration_seconds"),
                );
            }
            // Everything else produces a trace row only.
            _ => {}
        }
    }
}

fn detail_str<'a>(details: &'a Value, key: &str) -> &'a str {
    details.get(key).and_then(Value::as_str).unwrap_or("unknown")
}

fn detail_f64(details: &Value, key: &str) -> f64 {
    details.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

fn detail_u64(details: &Value, key: &str) -> Option<u64> {
    details.get(key).and_then(Value::as_u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (Arc<SessionStore>, Arc<Metrics>, Tracer, String) {
        let store = Arc::new(SessionStore::new());
        let metrics = Arc::new(Metrics::new());
        let session = store.create("agent");
        let tracer = Tracer::new(session.session_id.clone(), store.clone(), metrics.clone());
        (store, metrics, tracer, session.session_id)
    }

    #[test]
    fn llm_success_appends_step_and_mirrors_metrics() {
        let (store, metrics, tracer, session_id) = fixture();
        tracer.log(
            "resilient_caller",
            TraceEvent::LlmCallSuccess,
            serde_json::json!({
                "provider": "openai",
                "model": "gpt-4",
                "duration_seconds": 0.42,
                "prompt_tokens": 11,
                "completion_tokens": 5,
            }),
        );

        let session = store.get(&session_id).unwrap();
        assert_eq!(session.trace.len(), 1);
        assert_eq!(session.trace[0].event, TraceEvent::LlmCallSuccess);

        assert_eq!(
            metrics.counter_value(
                "llm_call_count_total",
                &[("provider", "openai"), ("status", "success")],
            ),
            1
        );
        assert_eq!(
            metrics.histogram_count(
                "llm_latency_seconds",
                &[("provider", "openai"), ("model", "gpt-4")],
            ),
            1
        );
        assert_eq!(
            metrics.counter_value("llm_tokens_consumed_total", &[("token_type", "prompt")]),
            11
        );
    }

    #[test]
    fn retry_failed_counts_with_component_and_reason() {
        let (_store, metrics, tracer, _id) = fixture();
        tracer.log(
            "resilient_caller",
            TraceEvent::RetryAttemptFailed,
            serde_json::json!({ "attempt": 1, "error_type": "TRANSIENT_NETWORK" }),
        );
        assert_eq!(
            metrics.counter_value(
                "retry_attempts_count_total",
                &[
                    ("component", "resilient_caller"),
                    ("retry_reason", "TRANSIENT_NETWORK"),
                ],
            ),
            1
        );
    }

    #[test]
    fn trace_only_events_touch_no_counters() {
        let (store, metrics, tracer, session_id) = fixture();
        tracer.log(
            "orchestrator",
            TraceEvent::OrchestrationStart,
            serde_json::json!({}),
        );
        tracer.log(
            "resilient_caller",
            TraceEvent::RetryBackoffDelay,
            serde_json::json!({ "delay_seconds": 1.0 }),
        );

        assert_eq!(store.get(&session_id).unwrap().trace.len(), 2);
        assert_eq!(metrics.counter_value("llm_call_count_total", &[]), 0);
        assert_eq!(metrics.counter_value("retry_attempts_count_total", &[]), 0);
    }

    #[test]
    fn append_failure_is_swallowed_and_counted() {
        let store = Arc::new(SessionStore::new());
        let metrics = Arc::new(Metrics::new());
        // Tracer pointed at a session that does not exist.
        let tracer = Tracer::new("ghost".into(), store, metrics.clone());
        tracer.log(
            "orchestrator",
            TraceEvent::FinalResponse,
            serde_json::json!({}),
        );
        assert_eq!(
            metrics.counter_value(
                "orchestrator_errors_count_total",
                &[("error_type", "TRACE_APPEND_FAILURE")],
            ),
            1
        );
    }

    #[test]
    fn session_lifecycle_events_move_the_gauge() {
        let (_store, metrics, tracer, _id) = fixture();
        tracer.log(
            "orchestrator",
            TraceEvent::SessionCreated,
            serde_json::json!({ "agent_name": "assistant" }),
        );
        assert_eq!(metrics.active_sessions(), 1);
        tracer.log(
            "orchestrator",
            TraceEvent::SessionCompleted,
            serde_json::json!({ "agent_name": "assistant", "duration_seconds": 2.0 }),
        );
        assert_eq!(metrics.active_sessions(), 0);
    }
}
