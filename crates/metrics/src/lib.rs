//! Process-wide metrics collector.
//!
//! All counters, histograms, and gauges live behind a [`Metrics`] handle
//! that owns its own `prometheus::Registry`, so the gateway constructs
//! one instance at startup and tests build isolated instances. Series
//! names and label keys are part of the external contract and must not
//! change.

use maestro_domain::Usage;
use prometheus::{
    HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};

/// Latency histogram buckets, seconds.
pub const LATENCY_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// The metrics handle. Cheap to share via `Arc`; all update methods take
/// `&self`.
pub struct Metrics {
    registry: Registry,

    llm_call_count: IntCounterVec,
    llm_latency: HistogramVec,
    llm_tokens_consumed: IntCounterVec,
    tool_execution_count: IntCounterVec,
    tool_latency: HistogramVec,
    orchestrator_errors: IntCounterVec,
    retry_attempts: IntCounterVec,
    session_count: IntCounterVec,
    active_sessions: IntGauge,
    session_duration: HistogramVec,
    application_info: IntGaugeVec,
}

impl Metrics {
    /// Build a fresh handle with every required series registered.
    ///
    /// Registration cannot fail on a new registry with these fixed names,
    /// so construction is infallible.
    pub fn new() -> Self {
        let registry = Registry::new();

        let llm_call_count = IntCounterVec::new(
            Opts::new("llm_call_count_total", "LLM calls by provider, model, and status"),
            &["provider", "model", "status"],
        )
        .expect("llm_call_count_total opts");

        let llm_latency = HistogramVec::new(
            HistogramOpts::new("llm_latency_seconds", "LLM call latency in seconds")
                .buckets(LATENCY_BUCKETS.to_vec()),
            &["provider", "model"],
        )
        .expect("llm_latency_seconds opts");

        let llm_tokens_consumed = IntCounterVec::new(
            Opts::new(
                "llm_tokens_consumed_total",
                "Tokens consumed by provider, model, and token type",
            ),
            &["provider", "model", "token_type"],
        )
        .expect("llm_tokens_consumed_total opts");

        let tool_execution_count = IntCounterVec::new(
            Opts::new("tool_execution_count_total", "Tool executions by name and status"),
            &["tool_name", "status"],
        )
        .expect("tool_execution_count_total opts");

        let tool_latency = HistogramVec::new(
            HistogramOpts::new("tool_latency_seconds", "Tool execution latency in seconds")
                .buckets(LATENCY_BUCKETS.to_vec()),
            &["tool_name"],
        )
        .expect("tool_latency_seconds opts");

        let orchestrator_errors = IntCounterVec::new(
            Opts::new(
                "orchestrator_errors_count_total",
                "Errors by type and emitting component",
            ),
            &["error_type", "component"],
        )
        .expect("orchestrator_errors_count_total opts");

        let retry_attempts = IntCounterVec::new(
            Opts::new(
                "retry_attempts_count_total",
                "Failed attempts that triggered a retry",
            ),
            &["component", "retry_reason"],
        )
        .expect("retry_attempts_count_total opts");

        let session_count = IntCounterVec::new(
            Opts::new("session_count_total", "Session lifecycle events by agent"),
            &["agent_name", "event"],
        )
        .expect("session_count_total opts");

        let active_sessions = IntGauge::new(
            "active_sessions_current",
            "Sessions created but not yet completed",
        )
        .expect("active_sessions_current opts");

        let session_duration = HistogramVec::new(
            HistogramOpts::new(
                "session_duration_seconds",
                "Session lifetime from creation to completion",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
            &["agent_name"],
        )
        .expect("session_duration_seconds opts");

        let application_info = IntGaugeVec::new(
            Opts::new("application_info", "Build information"),
            &["version"],
        )
        .expect("application_info opts");
        application_info
            .with_label_values(&[env!("CARGO_PKG_VERSION")])
            .set(1);

        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(llm_call_count.clone()),
            Box::new(llm_latency.clone()),
            Box::new(llm_tokens_consumed.clone()),
            Box::new(tool_execution_count.clone()),
            Box::new(tool_latency.clone()),
            Box::new(orchestrator_errors.clone()),
            Box::new(retry_attempts.clone()),
            Box::new(session_count.clone()),
            Box::new(active_sessions.clone()),
            Box::new(session_duration.clone()),
            Box::new(application_info.clone()),
        ];
        for collector in collectors {
            registry.register(collector).expect("register collector");
        }

        Self {
            registry,
            llm_call_count,
            llm_latency,
            llm_tokens_consumed,
            tool_execution_count,
            tool_latency,
            orchestrator_errors,
            retry_attempts,
            session_count,
            active_sessions,
            session_duration,
            application_info,
        }
    }

    // ── Recording helpers ──────────────────────────────────────────

    pub fn record_llm_success(
        &self,
        provider: &str,
        model: &str,
        duration_secs: f64,
        usage: Option<Usage>,
    ) {
        self.llm_call_count
            .with_label_values(&[provider, model, "success"])
            .inc();
        self.llm_latency
            .with_label_values(&[provider, model])
            .observe(duration_secs);
        if let Some(usage) = usage {
            self.llm_tokens_consumed
                .with_label_values(&[provider, model, "prompt"])
                .inc_by(u64::from(usage.prompt_tokens));
            self.llm_tokens_consumed
                .with_label_values(&[provider, model, "completion"])
                .inc_by(u64::from(usage.completion_tokens));
        }
    }

    pub fn record_llm_error(&self, provider: &str, model: &str, error_type: &str, component: &str) {
        self.llm_call_count
            .with_label_values(&[provider, model, "error"])
            .inc();
        self.record_orchestrator_error(error_type, component);
    }

    pub fn record_tool_success(&self, tool_name: &str, duration_secs: f64) {
        self.tool_execution_count
            .with_label_values(&[tool_name, "success"])
            .inc();
        self.tool_latency
            .with_label_values(&[tool_name])
            .observe(duration_secs);
    }

    pub fn record_tool_error(&self, tool_name: &str, error_type: &str, component: &str) {
        self.tool_execution_count
            .with_label_values(&[tool_name, "error"])
            .inc();
        self.record_orchestrator_error(error_type, component);
    }

    pub fn record_orchestrator_error(&self, error_type: &str, component: &str) {
        self.orchestrator_errors
            .with_label_values(&[error_type, component])
            .inc();
    }

    pub fn record_retry_attempt(&self, component: &str, retry_reason: &str) {
        self.retry_attempts
            .with_label_values(&[component, retry_reason])
            .inc();
    }

    pub fn record_session_created(&self, agent_name: &str) {
        self.session_count
            .with_label_values(&[agent_name, "created"])
            .inc();
        self.active_sessions.inc();
    }

    pub fn record_session_completed(&self, agent_name: &str, duration_secs: f64) {
        self.session_count
            .with_label_values(&[agent_name, "completed"])
            .inc();
        self.active_sessions.dec();
        self.session_duration
            .with_label_values(&[agent_name])
            .observe(duration_secs);
    }

    // ── Rendering ──────────────────────────────────────────────────

    /// Render the exposition text. A render failure never blocks serving:
    /// the fallback payload carries only `application_info`, and the
    /// failure itself is counted.
    pub fn render(&self) -> String {
        let families = self.registry.gather();
        let mut buf = String::new();
        match TextEncoder::new().encode_utf8(&families, &mut buf) {
            Ok(()) => buf,
            Err(e) => {
                tracing::error!(error = %e, "metrics render failed");
                self.record_orchestrator_error("METRICS_RENDER_FAILURE", "metrics");
                format!(
                    "# TYPE application_info gauge\napplication_info{{version=\"{}\"}} 1\n",
                    env!("CARGO_PKG_VERSION"),
                )
            }
        }
    }

    /// Current value of the active-sessions gauge (test support).
    pub fn active_sessions(&self) -> i64 {
        self.active_sessions.get()
    }

    /// Sum a counter series across a label match (test support). Returns
    /// the counter value for the exact label set, 0 when unobserved.
    pub fn counter_value(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        let families = self.registry.gather();
        for family in families {
            if family.get_name() != name {
                continue;
            }
            'metric: for metric in family.get_metric() {
                for (key, value) in labels {
                    let found = metric
                        .get_label()
                        .iter()
                        .any(|l| l.get_name() == *key && l.get_value() == *value);
                    if !found {
                        continue 'metric;
                    }
                }
                return metric.get_counter().get_value() as u64;
            }
        }
        0
    }

    /// Sample count of a histogram series for the exact label set (test
    /// support).
    pub fn histogram_count(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        let families = self.registry.gather();
        for family in families {
            if family.get_name() != name {
                continue;
            }
            'metric: for metric in family.get_metric() {
                for (key, value) in labels {
                    let found = metric
                        .get_label()
                        .iter()
                        .any(|l| l.get_name() == *key && l.get_value() == *value);
                    if !found {
                        continue 'metric;
                    }
                }
                return metric.get_histogram().get_sample_count();
            }
        }
        0
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
