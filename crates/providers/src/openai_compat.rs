//! OpenAI-compatible adapter.
//!
//! Covers every backend speaking the `/chat/completions` wire format:
//! openai, mistral, grok, qwen, deepseek, and kimi. Only the base URL and
//! key format differ per vendor.

use std::time::{Duration, Instant};

use serde_json::Value;

use maestro_domain::error::{Error, ErrorKind, Result};
use maestro_domain::keys::{self, ApiKey};
use maestro_domain::{Message, ProviderTag, Role, ToolCall, ToolSchema, Usage};

use crate::http::{build_client, categorize_status, from_reqwest};
use crate::traits::{ChatOutcome, ChatRequest, HealthReport, ProviderAdapter};

/// Base chat-completions URL per vendor.
fn default_base_url(tag: ProviderTag) -> &'static str {
    match tag {
        ProviderTag::OpenAi => "https://api.openai.com/v1",
        ProviderTag::Mistral => "https://api.mistral.ai/v1",
        ProviderTag::Grok => "https://api.x.ai/v1",
        ProviderTag::Qwen => "https://dashscope.aliyuncs.com/compatible-mode/v1",
        ProviderTag::DeepSeek => "https://api.deepseek.com/v1",
        ProviderTag::Kimi => "https://api.moonshot.ai/v1",
        // Anthropic and Gemini have dedicated adapters.
        ProviderTag::Anthropic | ProviderTag::Gemini => unreachable!("not openai-compatible"),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug)]
pub struct OpenAiCompatAdapter {
    tag: ProviderTag,
    base_url: String,
    model: String,
    /// `None` when no key was configured; the adapter exists but is
    /// unhealthy and every call fails with `MISSING_API_KEY`.
    key: Option<ApiKey>,
    client: reqwest::Client,
}

impl OpenAiCompatAdapter {
    /// Construct for one of the OpenAI-wire vendors. A provided key is
    /// format-validated immediately (failure carries only the masked
    /// rendering); an absent key yields an unhealthy adapter.
    pub fn new(
        tag: ProviderTag,
        model: &str,
        key: Option<&str>,
        call_timeout: Duration,
    ) -> Result<Self> {
        let key = key.map(|k| keys::validate(tag, k)).transpose()?;
        Ok(Self {
            tag,
            base_url: default_base_url(tag).to_string(),
            model: model.to_string(),
            key,
            client: build_client(call_timeout)?,
        })
    }

    /// Point the adapter at a different endpoint (tests, proxies).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn require_key(&self) -> Result<&ApiKey> {
        self.key.as_ref().ok_or_else(|| {
            Error::new(
                ErrorKind::MissingApiKey,
                format!("no API key configured for provider '{}'", self.tag),
            )
        })
    }

    fn build_body(&self, req: &ChatRequest) -> Value {
        let messages: Vec<Value> = req.messages.iter().map(message_to_openai).collect();

        let mut body = serde_json::json!({
            "model": req.model,
            "messages": messages,
            "temperature": req.temperature,
            "max_tokens": req.max_tokens,
        });

        if !req.tools.is_empty() {
            let tools: Vec<Value> = req.tools.iter().map(tool_to_openai).collect();
            body["tools"] = Value::Array(tools);
        }

        body
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message serialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn message_to_openai(msg: &Message) -> Value {
    match msg.role {
        Role::System => serde_json::json!({
            "role": "system",
            "content": msg.content,
        }),
        Role::User => serde_json::json!({
            "role": "user",
            "content": msg.content,
        }),
        Role::Assistant => {
            let mut m = serde_json::json!({
                "role": "assistant",
                "content": msg.content,
            });
            if msg.has_tool_calls() {
                let calls: Vec<Value> = msg
                    .tool_calls
                    .iter()
                    .map(|tc| {
                        serde_json::json!({
                            "id": tc.id,
                            "type": "function",
                            "function": {
                                "name": tc.name,
                                "arguments": tc.arguments.to_string(),
                            }
                        })
                    })
                    .collect();
                m["tool_calls"] = Value::Array(calls);
            }
            m
        }
        Role::Tool => serde_json::json!({
            "role": "tool",
            "tool_call_id": msg.tool_call_id.as_deref().unwrap_or(""),
            "content": msg.content,
        }),
    }
}

fn tool_to_openai(tool: &ToolSchema) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response deserialization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_openai_response(tag: ProviderTag, body: &Value) -> Result<ChatOutcome> {
    let message = body
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .ok_or_else(|| {
            Error::new(
                ErrorKind::Provider5xx,
                format!("{tag}: response missing choices[0].message"),
            )
        })?;

    let content = message
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let mut tool_calls: Vec<ToolCall> = Vec::new();
    if let Some(calls) = message.get("tool_calls").and_then(|v| v.as_array()) {
        for call in calls {
            let id = call
                .get("id")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            let function = call.get("function").cloned().unwrap_or_default();
            let name = function
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            let arguments = parse_arguments(tag, &name, function.get("arguments"));
            tool_calls.push(ToolCall {
                id,
                name,
                arguments,
            });
        }
    }

    let usage = body.get("usage").and_then(parse_openai_usage);

    Ok(ChatOutcome {
        message: Message::assistant_with_tools(content, tool_calls),
        usage,
    })
}

/// Tool-call arguments arrive as a JSON-encoded string. Empty or invalid
/// JSON defaults to an empty object rather than failing the whole turn.
fn parse_arguments(tag: ProviderTag, tool: &str, raw: Option<&Value>) -> Value {
    let Some(raw) = raw.and_then(|v| v.as_str()) else {
        return Value::Object(Default::default());
    };
    if raw.trim().is_empty() {
        return Value::Object(Default::default());
    }
    match serde_json::from_str(raw) {
        Ok(v @ Value::Object(_)) => v,
        Ok(_) | Err(_) => {
            tracing::warn!(
                provider = %tag,
                tool,
                "tool call arguments are not a JSON object; defaulting to empty"
            );
            Value::Object(Default::default())
        }
    }
}

fn parse_openai_usage(v: &Value) -> Option<Usage> {
    Some(Usage {
        prompt_tokens: v.get("prompt_tokens")?.as_u64()? as u32,
        completion_tokens: v.get("completion_tokens")?.as_u64()? as u32,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl ProviderAdapter for OpenAiCompatAdapter {
    fn provider_tag(&self) -> ProviderTag {
        self.tag
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn supports_tool_calls(&self) -> bool {
        true
    }

    async fn chat_completion(&self, request: &ChatRequest) -> Result<ChatOutcome> {
        let key = self.require_key()?;
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_body(request);

        tracing::debug!(provider = %self.tag, url = %url, "chat completion request");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| from_reqwest(self.tag, e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| from_reqwest(self.tag, e))?;

        if !status.is_success() {
            return Err(categorize_status(self.tag, status.as_u16(), &text));
        }

        let json: Value = serde_json::from_str(&text).map_err(|e| {
            Error::new(
                ErrorKind::Provider5xx,
                format!("{}: malformed response body: {e}", self.tag),
            )
        })?;
        parse_openai_response(self.tag, &json)
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

        let url = format!("{}/models", self.base_url);
        match self
            .client
            .get(&url)
            .bearer_auth(key.expose())
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
                error: Some(from_reqwest(self.tag, e).to_string()),
            },
        }
    }
}
