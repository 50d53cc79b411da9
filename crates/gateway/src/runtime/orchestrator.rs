//! The agent orchestration loop.
//!
//! A bounded think/act state machine per request: `Summarizing` →
//! `CallingModel` → (`ExecutingTools` → `CallingModel`)* → `Finalizing`,
//! with any state able to drop to `Failed` on a non-recoverable error.
//! Tool calls within one assistant turn run sequentially in the order the
//! model emitted them; that ordering is a contract.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use maestro_domain::error::{Error, ErrorKind, Result};
use maestro_domain::trace::TraceEvent;
use maestro_domain::{
    AgentConfig, Message, OrchestrationRequest, OrchestrationResponse, ResponseMetadata, ToolCall,
};
use maestro_providers::ProviderAdapter;
use maestro_tools::validate_arguments;

use crate::state::AppState;

use super::retry::resilient_chat_completion;
use super::summarize::maybe_summarize;
use super::tracer::Tracer;

pub const COMPONENT: &str = "orchestrator";

/// Synthesized final content when the iteration cap fires with nothing
/// usable from the model.
const ITERATION_CAP_APOLOGY: &str = "I wasn't able to finish working on your request within my \
     step limit. Please try again, or split the request into smaller parts.";

/// Run one orchestration request to completion. Never panics and never
/// returns a transport error: every failure becomes a sanitized response
/// with `metadata.error_code` set.
pub async fn run_orchestration(
    state: &AppState,
    request: OrchestrationRequest,
    cancel: CancellationToken,
) -> OrchestrationResponse {
    let started = Instant::now();
    let agent = request.agent_config.clone();

    // ── Request validation ────────────────────────────────────────
    let adapter = match validate_request(state, &agent) {
        Ok(adapter) => adapter,
        Err(err) => {
            tracing::debug!(error = %err, "request validation failed");
            return failure_response(
                &agent,
                request.session_id.clone().unwrap_or_default(),
                started,
                0,
                &err,
            );
        }
    };

    // ── Session resolution ────────────────────────────────────────
    // Unknown or absent session ids mint a fresh session.
    let (session_id, created) = match request.session_id.as_deref() {
        Some(id) if state.sessions.contains(id) => (id.to_owned(), false),
        _ => (state.sessions.create(&agent.agent_id).session_id, true),
    };

    let tracer = Tracer::new(
        session_id.clone(),
        state.sessions.clone(),
        state.metrics.clone(),
    );
    if created {
        tracer.log(
            COMPONENT,
            TraceEvent::SessionCreated,
            serde_json::json!({ "agent_name": agent.agent_id }),
        );
    }
    tracer.log(
        COMPONENT,
        TraceEvent::OrchestrationStart,
        serde_json::json!({
            "agent_id": agent.agent_id,
            "provider": agent.provider,
            "model": agent.model,
            "session_reused": !created,
        }),
    );

    if let Err(e) = state
        .sessions
        .append_message(&session_id, Message::user(request.message.clone()))
    {
        let err = Error::new(ErrorKind::MalformedRequest, e.to_string());
        return failure_response(&agent, session_id, started, 0, &err);
    }

    // ── The loop, under the end-to-end deadline ───────────────────
    let deadline = Duration::from_secs(state.config.orchestrator.request_timeout_secs);
    let outcome = match tokio::time::timeout(
        deadline,
        run_loop(state, &agent, adapter, &session_id, &tracer, &cancel),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(Error::new(
            ErrorKind::RequestTimeout,
            format!("request exceeded {}s deadline", deadline.as_secs()),
        )),
    };

    match outcome {
        Ok(success) => finalize(state, &agent, &session_id, &tracer, started, success),
        Err(err) => {
            tracing::warn!(session_id = %session_id, error = %err, "orchestration failed");
            complete_session(state, &agent, &session_id, &tracer);
            failure_response(&agent, session_id, started, 0, &err)
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Range-check the agent config, resolve the adapter, and verify the
/// requested tools can actually be mounted. A provider without tool-call
/// support refuses mounted tools here rather than silently dropping them.
fn validate_request(state: &AppState, agent: &AgentConfig) -> Result<Arc<dyn ProviderAdapter>> {
    agent.validate()?;
    let tag = agent.provider_tag()?;

    for tool in &agent.tools {
        if !state.tools.contains(tool) {
            return Err(Error::new(
                ErrorKind::MalformedRequest,
                format!("agent config enables unregistered tool '{tool}'"),
            ));
        }
    }

    let adapter = state.providers.get(tag, Some(&agent.model))?;

    if !agent.tools.is_empty() {
        let registered = state.tools.names();
        let supported = adapter.supported_tools(&registered);
        if let Some(missing) = agent.tools.iter().find(|t| !supported.contains(*t)) {
            return Err(Error::new(
                ErrorKind::MalformedRequest,
                format!(
                    "provider '{}' cannot surface tool '{missing}'",
                    agent.provider
                ),
            ));
        }
    }

    Ok(adapter)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// The loop
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct LoopOutcome {
    content: String,
    iterations: u32,
    summarization_fired: bool,
    retries_happened: bool,
    prompt_tokens: u32,
    completion_tokens: u32,
    have_usage: bool,
    capped: bool,
}

async fn run_loop(
    state: &AppState,
    agent: &AgentConfig,
    adapter: Arc<dyn ProviderAdapter>,
    session_id: &str,
    tracer: &Tracer,
    cancel: &CancellationToken,
) -> Result<LoopOutcome> {
    let max_iterations = state.config.orchestrator.max_iterations;
    let tool_schemas = state.tools.schemas_for(&agent.tools);

    let mut summarization_fired = false;
    let mut retries_happened = false;
    let mut prompt_tokens: u32 = 0;
    let mut completion_tokens: u32 = 0;
    let mut have_usage = false;
    let mut last_content = String::new();
    let mut iterations: u32 = 0;

    for iteration in 1..=max_iterations {
        iterations = iteration;

        // ── Summarizing (conditional no-op below threshold) ────────
        if maybe_summarize(state, agent, &adapter, session_id, tracer).await {
            summarization_fired = true;
        }

        // ── CallingModel ───────────────────────────────────────────
        let history = build_model_history(state, agent, session_id)?;
        let (outcome, attempts) = resilient_chat_completion(
            adapter.as_ref(),
            agent,
            &history,
            &tool_schemas,
            tracer,
            cancel,
        )
        .await?;
        if attempts > 1 {
            retries_happened = true;
        }
        if let Some(usage) = outcome.usage {
            have_usage = true;
            prompt_tokens += usage.prompt_tokens;
            completion_tokens += usage.completion_tokens;
        }

        let assistant = outcome.message;
        if !assistant.content.is_empty() {
            last_content = assistant.content.clone();
        }
        append(state, session_id, assistant.clone())?;

        if !assistant.has_tool_calls() {
            return Ok(LoopOutcome {
                content: assistant.content,
                iterations,
                summarization_fired,
                retries_happened,
                prompt_tokens,
                completion_tokens,
                have_usage,
                capped: false,
            });
        }

        // ── ExecutingTools: sequential, in model-emitted order ─────
        for tool_call in &assistant.tool_calls {
            execute_tool_call(state, tool_call, session_id, tracer, cancel).await?;
        }
    }

    // Iteration cap reached with tools still pending.
    Ok(LoopOutcome {
        content: last_content,
        iterations,
        summarization_fired,
        retries_happened,
        prompt_tokens,
        completion_tokens,
        have_usage,
        capped: true,
    })
}

/// Assemble the model-visible history: the agent's system prompt, the
/// session summary (when present), then the live messages.
fn build_model_history(
    state: &AppState,
    agent: &AgentConfig,
    session_id: &str,
) -> Result<Vec<Message>> {
    let session = state
        .sessions
        .get(session_id)
        .ok_or_else(|| Error::new(ErrorKind::MalformedRequest, "session vanished"))?;

    let mut history =
        Vec::with_capacity(session.messages.len() + 2);
    if let Some(prompt) = &agent.system_prompt {
        history.push(Message::system(prompt.as_str()));
    }
    if let Some(summary) = &session.summary {
        history.push(Message::system(format!(
            "Summary of the earlier conversation:\n{summary}"
        )));
    }
    history.extend(session.messages);
    Ok(history)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool execution
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Execute one model-issued tool call and append its result message.
///
/// Per-call failures (unknown tool, invalid arguments, timeout, executor
/// error) append an error-shaped tool result and let the loop continue;
/// only cancellation and store failures abort the request.
async fn execute_tool_call(
    state: &AppState,
    tool_call: &ToolCall,
    session_id: &str,
    tracer: &Tracer,
    cancel: &CancellationToken,
) -> Result<()> {
    let started = Instant::now();
    let name = tool_call.name.as_str();

    let Some(tool) = state.tools.get(name) else {
        let body = serde_json::json!({ "error": "unknown_tool", "name": name }).to_string();
        append(state, session_id, Message::tool_result(tool_call.id.as_str(), body))?;
        tracer.log(
            COMPONENT,
            TraceEvent::ToolExecutionError,
            serde_json::json!({ "tool_name": name, "error_type": ErrorKind::UnknownTool.code() }),
        );
        return Ok(());
    };

    let arguments = match validate_arguments(tool.schema(), &tool_call.arguments) {
        Ok(args) => args,
        Err(err) => {
            tracing::debug!(tool = name, error = %err, "tool arguments rejected");
            let body =
                serde_json::json!({ "error": "invalid_arguments", "name": name }).to_string();
            append(state, session_id, Message::tool_result(tool_call.id.as_str(), body))?;
            tracer.log(
                COMPONENT,
                TraceEvent::ToolExecutionError,
                serde_json::json!({
                    "tool_name": name,
                    "error_type": ErrorKind::InvalidArguments.code(),
                }),
            );
            return Ok(());
        }
    };

    let timeout = Duration::from_secs(state.config.orchestrator.tool_timeout_secs);
    let result = tokio::select! {
        result = tokio::time::timeout(timeout, tool.execute(&arguments)) => result,
        _ = cancel.cancelled() => {
            tracer.log(
                COMPONENT,
                TraceEvent::ToolExecutionError,
                serde_json::json!({
                    "tool_name": name,
                    "error_type": ErrorKind::Canceled.code(),
                }),
            );
            return Err(Error::new(ErrorKind::Canceled, "canceled during tool execution"));
        }
    };

    match result {
        Err(_elapsed) => {
            let body = serde_json::json!({ "error": "tool_timeout", "name": name }).to_string();
            append(state, session_id, Message::tool_result(tool_call.id.as_str(), body))?;
            tracer.log(
                COMPONENT,
                TraceEvent::ToolExecutionError,
                serde_json::json!({
                    "tool_name": name,
                    "error_type": ErrorKind::ToolTimeout.code(),
                }),
            );
        }
        Ok(Err(err)) => {
            tracing::warn!(tool = name, error = %err, "tool execution failed");
            let body =
                serde_json::json!({ "error": "execution_failed", "name": name }).to_string();
            append(state, session_id, Message::tool_result(tool_call.id.as_str(), body))?;
            tracer.log(
                COMPONENT,
                TraceEvent::ToolExecutionError,
                serde_json::json!({ "tool_name": name, "error_type": err.kind().code() }),
            );
        }
        Ok(Ok(value)) => {
            append(
                state,
                session_id,
                Message::tool_result(tool_call.id.as_str(), value.to_string()),
            )?;
            tracer.log(
                COMPONENT,
                TraceEvent::ToolExecutionSuccess,
                serde_json::json!({
                    "tool_name": name,
                    "duration_seconds": started.elapsed().as_secs_f64(),
                }),
            );
        }
    }

    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Finalization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn finalize(
    state: &AppState,
    agent: &AgentConfig,
    session_id: &str,
    tracer: &Tracer,
    started: Instant,
    mut outcome: LoopOutcome,
) -> OrchestrationResponse {
    if outcome.capped && outcome.content.is_empty() {
        outcome.content = ITERATION_CAP_APOLOGY.to_string();
    }

    tracer.log(
        COMPONENT,
        TraceEvent::FinalResponse,
        serde_json::json!({
            "response_length": outcome.content.len(),
            "total_iterations": outcome.iterations,
            "summarization_fired": outcome.summarization_fired,
        }),
    );
    complete_session(state, agent, session_id, tracer);

    OrchestrationResponse {
        content: outcome.content,
        session_id: session_id.to_owned(),
        provider: agent.provider.clone(),
        model: agent.model.clone(),
        duration_seconds: started.elapsed().as_secs_f64(),
        metadata: ResponseMetadata {
            prompt_tokens: outcome.have_usage.then_some(outcome.prompt_tokens),
            completion_tokens: outcome.have_usage.then_some(outcome.completion_tokens),
            summarization_fired: outcome.summarization_fired,
            retries_happened: outcome.retries_happened,
            attempts: None,
            iterations: outcome.iterations,
            error_code: outcome.capped.then_some(ErrorKind::MaxIterationsReached),
        },
    }
}

/// Emit `session_completed` on the session's first finalization only, so
/// the active-sessions gauge pairs with `session_created`.
fn complete_session(state: &AppState, agent: &AgentConfig, session_id: &str, tracer: &Tracer) {
    if state.sessions.mark_completed(session_id).unwrap_or(false) {
        let duration = state
            .sessions
            .with_session(session_id, |s| {
                (chrono::Utc::now() - s.created_at).num_milliseconds().max(0) as f64 / 1000.0
            })
            .unwrap_or(0.0);
        tracer.log(
            COMPONENT,
            TraceEvent::SessionCompleted,
            serde_json::json!({
                "agent_name": agent.agent_id,
                "duration_seconds": duration,
            }),
        );
    }
}

fn failure_response(
    agent: &AgentConfig,
    session_id: String,
    started: Instant,
    iterations: u32,
    err: &Error,
) -> OrchestrationResponse {
    OrchestrationResponse {
        content: err.kind().user_message().to_owned(),
        session_id,
        provider: agent.provider.clone(),
        model: agent.model.clone(),
        duration_seconds: started.elapsed().as_secs_f64(),
        metadata: ResponseMetadata {
            prompt_tokens: None,
            completion_tokens: None,
            summarization_fired: false,
            retries_happened: false,
            attempts: err.attempts(),
            iterations,
            error_code: Some(err.kind()),
        },
    }
}

fn append(state: &AppState, session_id: &str, message: Message) -> Result<()> {
    state
        .sessions
        .append_message(session_id, message)
        .map_err(|e| Error::new(ErrorKind::MalformedRequest, e.to_string()))
}
