//! History summarization collapses the oldest messages into a single
//! summary entry once a session's history crosses the threshold, so the
//! context window stays healthy after many turns.
//!
//! Summarization is never fatal: a failure emits `summarization_error`
//! and the loop proceeds with the unsummarized history.

use std::sync::Arc;
use std::time::Instant;

use maestro_domain::error::{Error, ErrorKind, Result};
use maestro_domain::trace::TraceEvent;
use maestro_domain::{AgentConfig, Message, Role};
use maestro_providers::{ChatRequest, ProviderAdapter};

use crate::state::AppState;

use super::tracer::Tracer;

pub const COMPONENT: &str = "summarizer";

/// Fixed meta-prompt sent to the summarization model.
pub const SUMMARY_PROMPT: &str = "Produce a dense factual summary of the following dialogue; \
     preserve decisions, constraints, and open questions; respond in 500 tokens or fewer.";

/// Check the threshold and, if crossed, summarize. Returns whether a
/// summarization actually fired.
pub async fn maybe_summarize(
    state: &AppState,
    agent: &AgentConfig,
    agent_adapter: &Arc<dyn ProviderAdapter>,
    session_id: &str,
    tracer: &Tracer,
) -> bool {
    let threshold = state.config.summarizer.threshold;
    let count = match state.sessions.active_message_count(session_id) {
        Ok(c) => c,
        Err(_) => return false,
    };
    if count < threshold {
        return false;
    }

    let started = Instant::now();
    match run_summarization(state, agent, agent_adapter, session_id).await {
        Ok((before, after)) => {
            tracer.log(
                COMPONENT,
                TraceEvent::SummarizationSuccess,
                serde_json::json!({
                    "messages_before": before,
                    "messages_after": after,
                    "duration_seconds": started.elapsed().as_secs_f64(),
                }),
            );
            true
        }
        Err(e) => {
            tracing::warn!(session_id, error = %e, "summarization failed, continuing with full history");
            tracer.log(
                COMPONENT,
                TraceEvent::SummarizationError,
                serde_json::json!({ "error_type": ErrorKind::SummarizationError.code() }),
            );
            false
        }
    }
}

/// Summarize the oldest prefix, keeping at least `keep_recent` messages,
/// and atomically swap it for the new summary. Returns the message
/// counts before and after.
async fn run_summarization(
    state: &AppState,
    agent: &AgentConfig,
    agent_adapter: &Arc<dyn ProviderAdapter>,
    session_id: &str,
) -> Result<(usize, usize)> {
    let cfg = &state.config.summarizer;
    let session = state
        .sessions
        .get(session_id)
        .ok_or_else(|| Error::new(ErrorKind::SummarizationError, "session disappeared"))?;

    let before = session.messages.len();
    let keep = cfg.keep_recent.min(before);
    let prefix_len = before - keep;
    if prefix_len == 0 {
        return Ok((before, before));
    }

    // The history is append-only, so the snapshot prefix stays stable
    // even if a concurrent request appends to the tail.
    let conversation =
        build_conversation_text(session.summary.as_deref(), &session.messages[..prefix_len]);

    let summarizer = resolve_summarizer(state, agent, agent_adapter)?;
    let request = ChatRequest {
        model: summarizer.model_name().to_string(),
        messages: vec![Message::system(SUMMARY_PROMPT), Message::user(conversation)],
        tools: Vec::new(),
        temperature: 0.1,
        max_tokens: 1024,
    };

    let outcome = summarizer
        .chat_completion(&request)
        .await
        .map_err(|e| Error::new(ErrorKind::SummarizationError, e.to_string()))?;

    let summary = outcome.message.content.trim().to_string();
    if summary.is_empty() {
        return Err(Error::new(
            ErrorKind::SummarizationError,
            "summarization model returned empty content",
        ));
    }

    state
        .sessions
        .replace_summary(session_id, summary, prefix_len)
        .map_err(|e| Error::new(ErrorKind::SummarizationError, e.to_string()))?;

    tracing::info!(
        session_id,
        messages_summarized = prefix_len,
        "history summarized"
    );

    Ok((before, before - prefix_len))
}

/// Pick the summarization adapter: the dedicated summarizer model when
/// configured, otherwise the agent's own.
fn resolve_summarizer(
    state: &AppState,
    agent: &AgentConfig,
    agent_adapter: &Arc<dyn ProviderAdapter>,
) -> Result<Arc<dyn ProviderAdapter>> {
    let cfg = &state.config.summarizer;
    match (cfg.provider, cfg.model.as_deref()) {
        (Some(tag), model) => state.providers.get(tag, model),
        (None, Some(model)) => state.providers.get(agent.provider_tag()?, Some(model)),
        (None, None) => Ok(agent_adapter.clone()),
    }
}

/// Flatten messages into a labeled transcript for the summary prompt.
/// Very long entries (tool results) are trimmed to keep the prompt
/// manageable.
fn build_conversation_text(previous_summary: Option<&str>, messages: &[Message]) -> String {
    let mut buf = String::new();
    if let Some(summary) = previous_summary {
        buf.push_str("Summary of even earlier conversation: ");
        buf.push_str(summary);
        buf.push_str("\n\n");
    }
    for msg in messages {
        let label = match msg.role {
            Role::System => "System",
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::Tool => "Tool",
        };
        buf.push_str(label);
        buf.push_str(": ");
        if msg.content.len() > 2000 {
            let head_end = floor_char_boundary(&msg.content, 1000);
            let tail_start = ceil_char_boundary(&msg.content, msg.content.len() - 500);
            buf.push_str(&msg.content[..head_end]);
            buf.push_str(" [...] ");
            buf.push_str(&msg.content[tail_start..]);
        } else {
            buf.push_str(&msg.content);
        }
        if !msg.tool_calls.is_empty() {
            let names: Vec<&str> = msg.tool_calls.iter().map(|tc| tc.name.as_str()).collect();
            buf.push_str(&format!(" [requested tools: {}]", names.join(", ")));
        }
        buf.push('\n');
    }
    buf
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}
