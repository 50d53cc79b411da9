use serde::{Deserialize, Serialize};

/// The enumerated catalogue of trace event names.
///
/// The tracer maps a fixed subset of these to metric updates; the rest
/// produce trace rows only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceEvent {
    OrchestrationStart,
    LlmCallSuccess,
    LlmCallError,
    ToolExecutionSuccess,
    ToolExecutionError,
    RetryAttemptStart,
    RetryAttemptFailed,
    RetryBackoffDelay,
    MaxRetriesExceeded,
    SessionCreated,
    SessionCompleted,
    SummarizationSuccess,
    SummarizationError,
    FinalResponse,
    TraceTruncated,
}

impl TraceEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceEvent::OrchestrationStart => "orchestration_start",
            TraceEvent::LlmCallSuccess => "llm_call_success",
            TraceEvent::LlmCallError => "llm_call_error",
            TraceEvent::ToolExecutionSuccess => "tool_execution_success",
            TraceEvent::ToolExecutionError => "tool_execution_error",
            TraceEvent::RetryAttemptStart => "retry_attempt_start",
            TraceEvent::RetryAttemptFailed => "retry_attempt_failed",
            TraceEvent::RetryBackoffDelay => "retry_backoff_delay",
            TraceEvent::MaxRetriesExceeded => "max_retries_exceeded",
            TraceEvent::SessionCreated => "session_created",
            TraceEvent::SessionCompleted => "session_completed",
            TraceEvent::SummarizationSuccess => "summarization_success",
            TraceEvent::SummarizationError => "summarization_error",
            TraceEvent::FinalResponse => "final_response",
            TraceEvent::TraceTruncated => "trace_truncated",
        }
    }
}

impl std::fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_matches_as_str() {
        for event in [
            TraceEvent::LlmCallSuccess,
            TraceEvent::RetryBackoffDelay,
            TraceEvent::SessionCompleted,
            TraceEvent::TraceTruncated,
        ] {
            let json = serde_json::to_value(event).unwrap();
            assert_eq!(json, serde_json::json!(event.as_str()));
        }
    }
}
