//! Anthropic-native adapter.
//!
//! Implements the Anthropic Messages API including tool use and the
//! Anthropic-specific message structure where system messages go in a
//! separate top-level `system` field and tool results travel as user
//! messages with `tool_result` content blocks.

use std::time::{Duration, Instant};

use serde_json::Value;

use maestro_domain::error::{Error, ErrorKind, Result};
use maestro_domain::keys::{self, ApiKey};
use maestro_domain::{Message, ProviderTag, Role, ToolCall, ToolSchema, Usage};

use crate::http::{build_client, categorize_status, from_reqwest};
use crate::traits::{ChatOutcome, ChatRequest, HealthReport, ProviderAdapter};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug)]
pub struct AnthropicAdapter {
    model: String,
    base_url: String,
    key: Option<ApiKey>,
    client: reqwest::Client,
}

impl AnthropicAdapter {
    pub fn new(model: &str, key: Option<&str>, call_timeout: Duration) -> Result<Self> {
        let key = key
            .map(|k| keys::validate(ProviderTag::Anthropic, k))
            .transpose()?;
        Ok(Self {
            model: model.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            key,
            client: build_client(call_timeout)?,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn require_key(&self) -> Result<&ApiKey> {
        self.key.as_ref().ok_or_else(|| {
            Error::new(
                ErrorKind::MissingApiKey,
                "no API key configured for provider 'anthropic'",
            )
        })
    }

    fn build_body(&self, req: &ChatRequest) -> Value {
        // Separate out system messages.
        let mut system_parts: Vec<&str> = Vec::new();
        let mut api_messages: Vec<Value> = Vec::new();

        for msg in &req.messages {
            match msg.role {
                Role::System => system_parts.push(&msg.content),
                Role::User => api_messages.push(serde_json::json!({
                    "role": "user",
                    "content": msg.content,
                })),
                Role::Assistant => api_messages.push(assistant_to_anthropic(msg)),
                // Tool results are user messages with tool_result blocks.
                Role::Tool => api_messages.push(tool_result_to_anthropic(msg)),
            }
        }

        let mut body = serde_json::json!({
            "model": req.model,
            "messages": api_messages,
            "max_tokens": req.max_tokens,
            "temperature": req.temperature,
        });

        if !system_parts.is_empty() {
            body["system"] = Value::String(system_parts.join("\n\n"));
        }

        if !req.tools.is_empty() {
            let tools: Vec<Value> = req.tools.iter().map(tool_to_anthropic).collect();
            body["tools"] = Value::Array(tools);
        }

        body
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message serialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn assistant_to_anthropic(msg: &Message) -> Value {
    let mut content: Vec<Value> = Vec::new();
    if !msg.content.is_empty() {
        content.push(serde_json::json!({ "type": "text", "text": msg.content }));
    }
    for tc in &msg.tool_calls {
        content.push(serde_json::json!({
            "type": "tool_use",
            "id": tc.id,
            "name": tc.name,
            "input": tc.arguments,
        }));
    }
    if content.is_empty() {
        // Anthropic rejects empty content arrays.
        content.push(serde_json::json!({ "type": "text", "text": "" }));
    }
    serde_json::json!({ "role": "assistant", "content": content })
}

fn tool_result_to_anthropic(msg: &Message) -> Value {
    serde_json::json!({
        "role": "user",
        "content": [{
            "type": "tool_result",
            "tool_use_id": msg.tool_call_id.as_deref().unwrap_or(""),
            "content": msg.content,
        }],
    })
}

fn tool_to_anthropic(tool: &ToolSchema) -> Value {
    serde_json::json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": tool.parameters,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response deserialization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_anthropic_response(body: &Value) -> Result<ChatOutcome> {
    let empty = Vec::new();
    let content_arr = body
        .get("content")
        .and_then(|v| v.as_array())
        .unwrap_or(&empty);

    let mut text_parts: Vec<&str> = Vec::new();
    let mut tool_calls: Vec<ToolCall> = Vec::new();

    for block in content_arr {
        match block.get("type").and_then(|v| v.as_str()).unwrap_or("") {
            "text" => {
                if let Some(t) = block.get("text").and_then(|v| v.as_str()) {
                    text_parts.push(t);
                }
            }
            "tool_use" => {
                tool_calls.push(ToolCall {
                    id: block
                        .get("id")
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string(),
                    name: block
                        .get("name")
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string(),
                    arguments: block
                        .get("input")
                        .cloned()
                        .unwrap_or(Value::Object(Default::default())),
                });
            }
            _ => {}
        }
    }

    let usage = body.get("usage").and_then(parse_anthropic_usage);

    Ok(ChatOutcome {
        message: Message::assistant_with_tools(text_parts.concat(), tool_calls),
        usage,
    })
}

fn parse_anthropic_usage(v: &Value) -> Option<Usage> {
    Some(Usage {
        prompt_tokens: v.get("input_tokens")?.as_u64()? as u32,
        completion_tokens: v.get("output_tokens")?.as_u64()? as u32,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn provider_tag(&self) -> ProviderTag {
        ProviderTag::Anthropic
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn supports_tool_calls(&self) -> bool {
        true
    }

    async fn chat_completion(&self, request: &ChatRequest) -> Result<ChatOutcome> {
        let key = self.require_key()?;
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_body(request);

        tracing::debug!(provider = "anthropic", url = %url, "chat completion request");

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", key.expose())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| from_reqwest(ProviderTag::Anthropic, e))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| from_reqwest(ProviderTag::Anthropic, e))?;

        if !status.is_success() {
            return Err(categorize_status(
                ProviderTag::Anthropic,
                status.as_u16(),
                &text,
            ));
        }

        let json: Value = serde_json::from_str(&text).map_err(|e| {
            Error::new(
                ErrorKind::Provider5xx,
                format!("anthropic: malformed response body: {e}"),
            )
        })?;
        parse_anthropic_response(&json)
    }

    async fn health(&self) -> HealthReport {
        let start = Instant::now();
        let key = match self.require_key() {
            Ok(k) => k,
            Err(e) => {
                return HealthReport {
                    ok: false,
                    latency: start.elapsed(),
                    error: Some(e.to_string()),
                }
            }
        };

        let url = format!("{}/v1/models?limit=1", self.base_url);
        match self
            .client
            .get(&url)
            .header("x-api-key", key.expose())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => HealthReport {
                ok: true,
                latency: start.elapsed(),
                error: None,
            },
            Ok(resp) => HealthReport {
                ok: false,
                latency: start.elapsed(),
                error: Some(format!("HTTP {}", resp.status().as_u16())),
            },
            Err(e) => HealthReport {
                ok: false,
                latency: start.elapsed(),
                error: Some(from_reqwest(ProviderTag::Anthropic, e).to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_key() -> String {
        format!("sk-ant-api03-{}", "A".repeat(95))
    }

    fn adapter() -> AnthropicAdapter {
        AnthropicAdapter::new(
            "claude-sonnet-4-20250514",
            Some(&valid_key()),
            Duration::from_secs(60),
        )
        .unwrap()
    }

    #[test]
    fn system_messages_move_to_top_level_field() {
        let req = ChatRequest {
            model: "claude-sonnet-4-20250514".into(),
            messages: vec![Message::system("be terse"), Message::user("hi")],
            tools: vec![],
            temperature: 0.5,
            max_tokens: 512,
        };
        let body = adapter().build_body(&req);
        assert_eq!(body["system"], "be terse");
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
    }

    #[test]
    fn tool_results_become_user_messages() {
        let req = ChatRequest {
            model: "claude-sonnet-4-20250514".into(),
            messages: vec![Message::tool_result("toolu_1", "42")],
            tools: vec![],
            temperature: 0.5,
            max_tokens: 512,
        };
        let body = adapter().build_body(&req);
        let msg = &body["messages"][0];
        assert_eq!(msg["role"], "user");
        assert_eq!(msg["content"][0]["type"], "tool_result");
        assert_eq!(msg["content"][0]["tool_use_id"], "toolu_1");
    }

    #[test]
    fn assistant_tool_calls_become_tool_use_blocks() {
        let msg = Message::assistant_with_tools(
            "checking",
            vec![ToolCall {
                id: "toolu_1".into(),
                name: "get_current_time".into(),
                arguments: serde_json::json!({}),
            }],
        );
        let v = assistant_to_anthropic(&msg);
        let content = v["content"].as_array().unwrap();
        assert_eq!(content.len(), 2);
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[1]["type"], "tool_use");
        assert_eq!(content[1]["name"], "get_current_time");
    }

    #[test]
    fn tools_use_input_schema_key() {
        let v = tool_to_anthropic(&ToolSchema {
            name: "t".into(),
            description: "d".into(),
            parameters: serde_json::json!({"type": "object"}),
        });
        assert!(v.get("input_schema").is_some());
    }

    #[test]
    fn parses_text_and_tool_use_blocks() {
        let body = serde_json::json!({
            "content": [
                { "type": "text", "text": "Let me check. " },
                { "type": "tool_use", "id": "toolu_1", "name": "get_current_time", "input": {} },
            ],
            "stop_reason": "tool_use",
            "usage": { "input_tokens": 20, "output_tokens": 9 },
        });
        let outcome = parse_anthropic_response(&body).unwrap();
        assert_eq!(outcome.message.content, "Let me check. ");
        assert_eq!(outcome.message.tool_calls.len(), 1);
        assert_eq!(outcome.usage.unwrap().completion_tokens, 9);
    }

    #[tokio::test]
    async fn missing_key_is_unhealthy_and_unusable() {
        let adapter =
            AnthropicAdapter::new("claude-sonnet-4-20250514", None, Duration::from_secs(60))
                .unwrap();
        let req = ChatRequest {
            model: "claude-sonnet-4-20250514".into(),
            messages: vec![Message::user("hi")],
            tools: vec![],
            temperature: 0.5,
            max_tokens: 16,
        };
        let err = adapter.chat_completion(&req).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingApiKey);
        let health = adapter.health().await;
        assert!(!health.ok);
    }
}
