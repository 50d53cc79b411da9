//! Google Gemini adapter.
//!
//! Implements the Gemini `generateContent` API. Auth is an API key passed
//! as a query parameter, so every error path is scrubbed before it can
//! carry the request URL.
//!
//! Gemini does not assign tool-call ids; this adapter synthesizes
//! `<name>:<seq>` ids so the orchestrator's call/result pairing works,
//! and recovers the function name from the id when translating tool
//! results back.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde_json::Value;

use maestro_domain::error::{Error, ErrorKind, Result};
use maestro_domain::keys::{self, ApiKey};
use maestro_domain::{Message, ProviderTag, Role, ToolCall, ToolSchema, Usage};

use crate::http::{build_client, categorize_status, from_reqwest};
use crate::traits::{ChatOutcome, ChatRequest, HealthReport, ProviderAdapter};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug)]
pub struct GeminiAdapter {
    model: String,
    base_url: String,
    key: Option<ApiKey>,
    client: reqwest::Client,
    call_seq: AtomicU64,
}

impl GeminiAdapter {
    pub fn new(model: &str, key: Option<&str>, call_timeout: Duration) -> Result<Self> {
        let key = key
            .map(|k| keys::validate(ProviderTag::Gemini, k))
            .transpose()?;
        Ok(Self {
            model: model.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            key,
            client: build_client(call_timeout)?,
            call_seq: AtomicU64::new(0),
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
                "no API key configured for provider 'gemini'",
            )
        })
    }

    fn generate_url(&self, model: &str, api_key: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, model, api_key
        )
    }

    fn build_body(&self, req: &ChatRequest) -> Value {
        let mut contents: Vec<Value> = Vec::new();
        let mut system_parts: Vec<&str> = Vec::new();

        for msg in &req.messages {
            match msg.role {
                Role::System => system_parts.push(&msg.content),
                Role::User => contents.push(serde_json::json!({
                    "role": "user",
                    "parts": [{ "text": msg.content }],
                })),
                Role::Assistant => contents.push(assistant_to_gemini(msg)),
                Role::Tool => contents.push(tool_result_to_gemini(msg)),
            }
        }

        let mut body = serde_json::json!({ "contents": contents });

        if !system_parts.is_empty() {
            body["systemInstruction"] = serde_json::json!({
                "parts": [{ "text": system_parts.join("\n\n") }],
            });
        }

        if !req.tools.is_empty() {
            let declarations: Vec<Value> = req
                .tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    })
                })
                .collect();
            body["tools"] = serde_json::json!([{ "functionDeclarations": declarations }]);
        }

        body["generationConfig"] = serde_json::json!({
            "temperature": req.temperature,
            "maxOutputTokens": req.max_tokens,
        });

        body
    }

    /// Replace the raw key with its masked form anywhere it appears in an
    /// error message. The key rides in the URL, so transport errors can
    /// echo it.
    fn scrub(&self, e: Error) -> Error {
        match &self.key {
            Some(key) => {
                let text = e.to_string().replace(key.expose(), &key.masked());
                Error::new(e.kind(), text)
            }
            None => e,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message serialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn assistant_to_gemini(msg: &Message) -> Value {
    let mut parts: Vec<Value> = Vec::new();
    if !msg.content.is_empty() {
        parts.push(serde_json::json!({ "text": msg.content }));
    }
    for tc in &msg.tool_calls {
        parts.push(serde_json::json!({
            "functionCall": { "name": tc.name, "args": tc.arguments },
        }));
    }
    serde_json::json!({ "role": "model", "parts": parts })
}

fn tool_result_to_gemini(msg: &Message) -> Value {
    let call_id = msg.tool_call_id.as_deref().unwrap_or("");
    let name = function_name_from_call_id(call_id);
    serde_json::json!({
        "role": "user",
        "parts": [{
            "functionResponse": {
                "name": name,
                "response": { "content": msg.content },
            },
        }],
    })
}

/// Synthesized call ids are `<name>:<seq>`; everything before the last
/// `:` is the function name.
fn function_name_from_call_id(call_id: &str) -> &str {
    match call_id.rsplit_once(':') {
        Some((name, _)) => name,
        None => call_id,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response deserialization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_gemini_response(body: &Value, call_seq: &AtomicU64) -> Result<ChatOutcome> {
    let parts = body
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .ok_or_else(|| {
            Error::new(
                ErrorKind::Provider5xx,
                "gemini: response missing candidates[0].content.parts",
            )
        })?;

    let mut text_parts: Vec<&str> = Vec::new();
    let mut tool_calls: Vec<ToolCall> = Vec::new();

    for part in parts {
        if let Some(t) = part.get("text").and_then(|v| v.as_str()) {
            text_parts.push(t);
        }
        if let Some(fc) = part.get("functionCall") {
            let name = fc
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            let seq = call_seq.fetch_add(1, Ordering::Relaxed);
            tool_calls.push(ToolCall {
                id: format!("{name}:{seq}"),
                name,
                arguments: fc
                    .get("args")
                    .cloned()
                    .unwrap_or(Value::Object(Default::default())),
            });
        }
    }

    let usage = body.get("usageMetadata").and_then(parse_gemini_usage);

    Ok(ChatOutcome {
        message: Message::assistant_with_tools(text_parts.concat(), tool_calls),
        usage,
    })
}

fn parse_gemini_usage(v: &Value) -> Option<Usage> {
    Some(Usage {
        prompt_tokens: v.get("promptTokenCount")?.as_u64()? as u32,
        completion_tokens: v
            .get("candidatesTokenCount")
            .and_then(|c| c.as_u64())
            .unwrap_or(0) as u32,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn provider_tag(&self) -> ProviderTag {
        ProviderTag::Gemini
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn supports_tool_calls(&self) -> bool {
        true
    }

    async fn chat_completion(&self, request: &ChatRequest) -> Result<ChatOutcome> {
        let key = self.require_key()?;
        let url = self.generate_url(&request.model, key.expose());
        let body = self.build_body(request);

        tracing::debug!(provider = "gemini", model = %request.model, "chat completion request");

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.scrub(from_reqwest(ProviderTag::Gemini, e)))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| self.scrub(from_reqwest(ProviderTag::Gemini, e)))?;

        if !status.is_success() {
            return Err(self.scrub(categorize_status(
                ProviderTag::Gemini,
                status.as_u16(),
                &text,
            )));
        }

        let json: Value = serde_json::from_str(&text).map_err(|e| {
            Error::new(
                ErrorKind::Provider5xx,
                format!("gemini: malformed response body: {e}"),
            )
        })?;
        parse_gemini_response(&json, &self.call_seq)
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

        let url = format!(
            "{}/v1beta/models?pageSize=1&key={}",
            self.base_url,
            key.expose()
        );
        match self.client.get(&url).send().await {
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
                error: Some(
                    self.scrub(from_reqwest(ProviderTag::Gemini, e)).to_string(),
                ),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_key() -> String {
        format!("AIza{}", "x".repeat(35))
    }

    fn adapter() -> GeminiAdapter {
        GeminiAdapter::new("gemini-2.0-flash", Some(&valid_key()), Duration::from_secs(60))
            .unwrap()
    }

    #[test]
    fn system_prompt_becomes_system_instruction() {
        let req = ChatRequest {
            model: "gemini-2.0-flash".into(),
            messages: vec![Message::system("be brief"), Message::user("hello")],
            tools: vec![],
            temperature: 0.3,
            max_tokens: 100,
        };
        let body = adapter().build_body(&req);
        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            "be brief"
        );
        assert_eq!(body["contents"].as_array().unwrap().len(), 1);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 100);
    }

    #[test]
    fn tools_become_function_declarations() {
        let req = ChatRequest {
            model: "gemini-2.0-flash".into(),
            messages: vec![Message::user("time?")],
            tools: vec![ToolSchema {
                name: "get_current_time".into(),
                description: "time".into(),
                parameters: serde_json::json!({"type": "object", "properties": {}}),
            }],
            temperature: 0.3,
            max_tokens: 100,
        };
        let body = adapter().build_body(&req);
        assert_eq!(
            body["tools"][0]["functionDeclarations"][0]["name"],
            "get_current_time"
        );
    }

    #[test]
    fn tool_result_recovers_function_name_from_synthesized_id() {
        let msg = Message::tool_result("get_current_time:3", "2026-01-01T00:00:00Z");
        let v = tool_result_to_gemini(&msg);
        assert_eq!(
            v["parts"][0]["functionResponse"]["name"],
            "get_current_time"
        );
    }

    #[test]
    fn parses_function_call_with_synthesized_ids() {
        let seq = AtomicU64::new(0);
        let body = serde_json::json!({
            "candidates": [{ "content": { "parts": [
                { "text": "One sec. " },
                { "functionCall": { "name": "get_current_time", "args": {} } },
                { "functionCall": { "name": "get_current_time", "args": {} } },
            ]}}],
            "usageMetadata": { "promptTokenCount": 7, "candidatesTokenCount": 4 },
        });
        let outcome = parse_gemini_response(&body, &seq).unwrap();
        assert_eq!(outcome.message.content, "One sec. ");
        assert_eq!(outcome.message.tool_calls[0].id, "get_current_time:0");
        assert_eq!(outcome.message.tool_calls[1].id, "get_current_time:1");
        assert_eq!(outcome.usage.unwrap().prompt_tokens, 7);
    }

    #[test]
    fn scrub_masks_the_raw_key() {
        let adapter = adapter();
        let raw = adapter.key.as_ref().unwrap().expose().to_string();
        let err = adapter.scrub(Error::new(
            ErrorKind::TransientNetwork,
            format!("failed url https://x/y?key={raw}"),
        ));
        assert!(!err.to_string().contains(&raw));
    }

    #[test]
    fn missing_candidates_is_provider_error() {
        let seq = AtomicU64::new(0);
        let err = parse_gemini_response(&serde_json::json!({}), &seq).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Provider5xx);
    }
}
