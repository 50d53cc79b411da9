use serde::{Deserialize, Serialize};

/// Categorized error kinds. Only these cross component boundaries; the
/// resilient caller decides retry eligibility from the kind, never from
/// the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    // ── Configuration-time ────────────────────────────────────────
    #[serde(rename = "UNKNOWN_PROVIDER")]
    UnknownProvider,
    #[serde(rename = "MISSING_API_KEY")]
    MissingApiKey,
    #[serde(rename = "INVALID_API_KEY")]
    InvalidApiKey,
    #[serde(rename = "MISSING_CORS_ORIGINS_IN_PRODUCTION")]
    MissingCorsOriginsInProduction,
    #[serde(rename = "NO_VALID_KEYS_IN_PRODUCTION")]
    NoValidKeysInProduction,

    // ── Request validation ────────────────────────────────────────
    #[serde(rename = "MALFORMED_REQUEST")]
    MalformedRequest,
    #[serde(rename = "UNKNOWN_TOOL")]
    UnknownTool,
    #[serde(rename = "INVALID_ARGUMENTS")]
    InvalidArguments,

    // ── Provider call ─────────────────────────────────────────────
    #[serde(rename = "TRANSIENT_NETWORK")]
    TransientNetwork,
    #[serde(rename = "RATE_LIMITED")]
    RateLimited,
    #[serde(rename = "PROVIDER_5XX")]
    Provider5xx,
    #[serde(rename = "PROVIDER_4XX_NON_RATE_LIMIT")]
    Provider4xxNonRateLimit,
    #[serde(rename = "TIMEOUT")]
    Timeout,

    // ── Orchestration ─────────────────────────────────────────────
    #[serde(rename = "MAX_ITERATIONS_REACHED")]
    MaxIterationsReached,
    #[serde(rename = "TOOL_TIMEOUT")]
    ToolTimeout,
    #[serde(rename = "RESILIENT_LLM_FAILURE")]
    ResilientLlmFailure,
    #[serde(rename = "REQUEST_TIMEOUT")]
    RequestTimeout,
    #[serde(rename = "CANCELED")]
    Canceled,

    // ── Infrastructure ────────────────────────────────────────────
    #[serde(rename = "TRACE_APPEND_FAILURE")]
    TraceAppendFailure,
    #[serde(rename = "METRICS_RENDER_FAILURE")]
    MetricsRenderFailure,
    #[serde(rename = "SUMMARIZATION_ERROR")]
    SummarizationError,
}

impl ErrorKind {
    /// The wire spelling, used as `metadata.error_code` and in metric labels.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::UnknownProvider => "UNKNOWN_PROVIDER",
            ErrorKind::MissingApiKey => "MISSING_API_KEY",
            ErrorKind::InvalidApiKey => "INVALID_API_KEY",
            ErrorKind::MissingCorsOriginsInProduction => "MISSING_CORS_ORIGINS_IN_PRODUCTION",
            ErrorKind::NoValidKeysInProduction => "NO_VALID_KEYS_IN_PRODUCTION",
            ErrorKind::MalformedRequest => "MALFORMED_REQUEST",
            ErrorKind::UnknownTool => "UNKNOWN_TOOL",
            ErrorKind::InvalidArguments => "INVALID_ARGUMENTS",
            ErrorKind::TransientNetwork => "TRANSIENT_NETWORK",
            ErrorKind::RateLimited => "RATE_LIMITED",
            ErrorKind::Provider5xx => "PROVIDER_5XX",
            ErrorKind::Provider4xxNonRateLimit => "PROVIDER_4XX_NON_RATE_LIMIT",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::MaxIterationsReached => "MAX_ITERATIONS_REACHED",
            ErrorKind::ToolTimeout => "TOOL_TIMEOUT",
            ErrorKind::ResilientLlmFailure => "RESILIENT_LLM_FAILURE",
            ErrorKind::RequestTimeout => "REQUEST_TIMEOUT",
            ErrorKind::Canceled => "CANCELED",
            ErrorKind::TraceAppendFailure => "TRACE_APPEND_FAILURE",
            ErrorKind::MetricsRenderFailure => "METRICS_RENDER_FAILURE",
            ErrorKind::SummarizationError => "SUMMARIZATION_ERROR",
        }
    }

    /// Whether the resilient caller may retry a provider call that failed
    /// with this kind.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::TransientNetwork
                | ErrorKind::RateLimited
                | ErrorKind::Provider5xx
                | ErrorKind::Timeout
        )
    }

    /// Kinds that produce a failure response but still complete the
    /// request with usable content.
    pub fn is_non_fatal(&self) -> bool {
        matches!(
            self,
            ErrorKind::MaxIterationsReached | ErrorKind::SummarizationError
        )
    }

    /// HTTP status the gateway maps this kind to on a failure response.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::MaxIterationsReached | ErrorKind::SummarizationError => 200,
            ErrorKind::MalformedRequest
            | ErrorKind::UnknownTool
            | ErrorKind::InvalidArguments
            | ErrorKind::UnknownProvider => 400,
            ErrorKind::RequestTimeout => 504,
            ErrorKind::TraceAppendFailure | ErrorKind::MetricsRenderFailure => 500,
            _ => 502,
        }
    }

    /// Sanitized, user-facing text for a failure response. Never contains
    /// keys, vendor bodies, or internal identifiers.
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::UnknownProvider => "The requested provider is not supported.",
            ErrorKind::MissingApiKey | ErrorKind::InvalidApiKey => {
                "The provider is not configured correctly. Please contact the operator."
            }
            ErrorKind::MalformedRequest => "The request was malformed. Please check the agent configuration and try again.",
            ErrorKind::UnknownTool | ErrorKind::InvalidArguments => {
                "A requested tool could not be executed. Please try again."
            }
            ErrorKind::ResilientLlmFailure
            | ErrorKind::TransientNetwork
            | ErrorKind::RateLimited
            | ErrorKind::Provider5xx
            | ErrorKind::Provider4xxNonRateLimit
            | ErrorKind::Timeout => {
                "I'm having trouble reaching the language model right now. Please try again in a moment."
            }
            ErrorKind::MaxIterationsReached => {
                "I reached my reasoning limit before finishing. The answer above may be incomplete."
            }
            ErrorKind::ToolTimeout => "A tool took too long to respond. Please try again.",
            ErrorKind::RequestTimeout => "The request took too long and was aborted. Please try again.",
            ErrorKind::Canceled => "The request was canceled.",
            _ => "An internal error occurred. Please try again.",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Shared error type used across all maestro crates. Carries a taxonomy
/// kind plus an internal message; the message never reaches end users
/// (responses go through [`ErrorKind::user_message`]).
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    /// Attempt count, set by the resilient caller on retry exhaustion.
    attempts: Option<u32>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            attempts: None,
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = Some(attempts);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn attempts(&self) -> Option<u32> {
        self.attempts
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds_match_taxonomy() {
        for kind in [
            ErrorKind::TransientNetwork,
            ErrorKind::RateLimited,
            ErrorKind::Provider5xx,
            ErrorKind::Timeout,
        ] {
            assert!(kind.is_retryable(), "{kind} should be retryable");
        }
        for kind in [
            ErrorKind::InvalidApiKey,
            ErrorKind::MissingApiKey,
            ErrorKind::UnknownProvider,
            ErrorKind::MalformedRequest,
            ErrorKind::Provider4xxNonRateLimit,
            ErrorKind::Canceled,
        ] {
            assert!(!kind.is_retryable(), "{kind} should not be retryable");
        }
    }

    #[test]
    fn codes_use_wire_spelling() {
        assert_eq!(ErrorKind::Provider5xx.code(), "PROVIDER_5XX");
        assert_eq!(
            ErrorKind::Provider4xxNonRateLimit.code(),
            "PROVIDER_4XX_NON_RATE_LIMIT"
        );
        assert_eq!(
            serde_json::to_value(ErrorKind::ResilientLlmFailure).unwrap(),
            serde_json::json!("RESILIENT_LLM_FAILURE")
        );
    }

    #[test]
    fn http_status_mapping() {
        assert_eq!(ErrorKind::MalformedRequest.http_status(), 400);
        assert_eq!(ErrorKind::ResilientLlmFailure.http_status(), 502);
        assert_eq!(ErrorKind::RequestTimeout.http_status(), 504);
        assert_eq!(ErrorKind::MaxIterationsReached.http_status(), 200);
        assert_eq!(ErrorKind::TraceAppendFailure.http_status(), 500);
    }

    #[test]
    fn error_carries_attempts() {
        let err = Error::new(ErrorKind::ResilientLlmFailure, "exhausted").with_attempts(3);
        assert_eq!(err.attempts(), Some(3));
        assert_eq!(err.kind(), ErrorKind::ResilientLlmFailure);
    }

    #[test]
    fn user_messages_never_echo_internals() {
        let err = Error::new(ErrorKind::Provider5xx, "HTTP 503 from upstream: sk-secret");
        assert!(!err.kind().user_message().contains("sk-secret"));
        assert!(!err.kind().user_message().contains("503"));
    }
}
