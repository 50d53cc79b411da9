use serde::{Deserialize, Serialize};

use crate::agent::AgentConfig;
use crate::error::ErrorKind;

/// One orchestration request: an agent configuration, the user's turn,
/// and optionally the session to continue.
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestrationRequest {
    pub message: String,
    pub agent_config: AgentConfig,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// The final result of one orchestration run.
///
/// On failure `content` carries a sanitized user-facing string and
/// `metadata.error_code` identifies the kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationResponse {
    pub content: String,
    pub session_id: String,
    pub provider: String,
    pub model: String,
    pub duration_seconds: f64,
    pub metadata: ResponseMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u32>,
    pub summarization_fired: bool,
    pub retries_happened: bool,
    /// Retry count, present when retries were exhausted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    /// Loop iterations consumed.
    pub iterations: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorKind>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_parses_with_minimal_body() {
        let req: OrchestrationRequest = serde_json::from_value(serde_json::json!({
            "message": "Say hello.",
            "agent_config": { "provider": "openai", "model": "gpt-4" },
        }))
        .unwrap();
        assert!(req.session_id.is_none());
        assert_eq!(req.agent_config.model, "gpt-4");
    }

    #[test]
    fn error_code_serializes_as_wire_code() {
        let resp = OrchestrationResponse {
            content: "sorry".into(),
            session_id: "s1".into(),
            provider: "openai".into(),
            model: "gpt-4".into(),
            duration_seconds: 0.5,
            metadata: ResponseMetadata {
                attempts: Some(3),
                error_code: Some(ErrorKind::ResilientLlmFailure),
                ..Default::default()
            },
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["metadata"]["error_code"], "RESILIENT_LLM_FAILURE");
        assert_eq!(json["metadata"]["attempts"], 3);
    }
}
