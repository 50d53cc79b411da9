use std::collections::BTreeSet;
use std::time::Duration;

use maestro_domain::error::Result;
use maestro_domain::{AgentConfig, Message, ProviderTag, ToolSchema, Usage};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / Response types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A provider-agnostic chat completion request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Model identifier to invoke.
    pub model: String,
    /// The conversation, including any leading system messages.
    pub messages: Vec<Message>,
    /// Tool schemas the model may invoke.
    pub tools: Vec<ToolSchema>,
    /// Sampling temperature (0.0 – 2.0).
    pub temperature: f32,
    /// Maximum tokens in the response.
    pub max_tokens: u32,
}

impl ChatRequest {
    /// Assemble a request from an agent configuration and a prepared
    /// history (the caller owns system-prompt and summary placement).
    pub fn from_agent(config: &AgentConfig, history: &[Message], tools: &[ToolSchema]) -> Self {
        Self {
            model: config.model.clone(),
            messages: history.to_vec(),
            tools: tools.to_vec(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// The adapter's translation of one vendor reply: a single assistant
/// message (tool calls included) plus token usage when reported.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub message: Message,
    pub usage: Option<Usage>,
}

/// Result of an adapter health probe.
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub ok: bool,
    pub latency: Duration,
    pub error: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core adapter trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The uniform capability surface every backend must satisfy.
///
/// `chat_completion` executes exactly one vendor request. It must never
/// retry internally and must never mutate the history it receives; it
/// raises a categorized error on any failure.
#[async_trait::async_trait]
pub trait ProviderAdapter: Send + Sync + std::fmt::Debug {
    fn provider_tag(&self) -> ProviderTag;

    fn model_name(&self) -> &str;

    /// Whether this adapter can surface tool schemas to its vendor.
    fn supports_tool_calls(&self) -> bool;

    /// The subset of registered tool names this adapter can surface.
    /// Adapters without tool-calling support return the empty set.
    fn supported_tools(&self, registered: &[String]) -> BTreeSet<String> {
        if self.supports_tool_calls() {
            registered.iter().cloned().collect()
        } else {
            BTreeSet::new()
        }
    }

    async fn chat_completion(&self, request: &ChatRequest) -> Result<ChatOutcome>;

    async fn health(&self) -> HealthReport;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct NoTools;

    #[async_trait::async_trait]
    impl ProviderAdapter for NoTools {
        fn provider_tag(&self) -> ProviderTag {
            ProviderTag::Mistral
        }
        fn model_name(&self) -> &str {
            "stub"
        }
        fn supports_tool_calls(&self) -> bool {
            false
        }
        async fn chat_completion(&self, _request: &ChatRequest) -> Result<ChatOutcome> {
            unreachable!("not called in this test")
        }
        async fn health(&self) -> HealthReport {
            HealthReport {
                ok: true,
                latency: Duration::ZERO,
                error: None,
            }
        }
    }

    #[test]
    fn tool_less_adapter_supports_no_tools() {
        let adapter = NoTools;
        let registered = vec!["get_current_time".to_string()];
        assert!(adapter.supported_tools(&registered).is_empty());
    }
}
