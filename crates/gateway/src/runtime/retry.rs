//! Resilient model-call layer.
//!
//! Wraps any adapter's `chat_completion` with bounded retries and
//! exponential backoff. Retry eligibility is decided from the error
//! category alone; the backoff sleep is raced against the request's
//! cancellation token so a cancel aborts even mid-sleep.

use std::time::Instant;

use tokio_util::sync::CancellationToken;

use maestro_domain::error::{Error, ErrorKind, Result};
use maestro_domain::trace::TraceEvent;
use maestro_domain::{AgentConfig, Message, ToolSchema};
use maestro_providers::{ChatOutcome, ChatRequest, ProviderAdapter};

use super::tracer::Tracer;

pub const COMPONENT: &str = "resilient_caller";

/// Run one chat completion with the agent's retry policy. Returns the
/// outcome plus the number of attempts actually made.
pub async fn resilient_chat_completion(
    adapter: &dyn ProviderAdapter,
    config: &AgentConfig,
    history: &[Message],
    tools: &[ToolSchema],
    tracer: &Tracer,
    cancel: &CancellationToken,
) -> Result<(ChatOutcome, u32)> {
    let request = ChatRequest::from_agent(config, history, tools);
    let retry = config.retry;
    let provider = adapter.provider_tag().as_str();
    let model = request.model.clone();
    let mut final_kind = ErrorKind::ResilientLlmFailure;

    for attempt in 1..=retry.max_attempts {
        if cancel.is_cancelled() {
            tracer.log(
                COMPONENT,
                TraceEvent::LlmCallError,
                serde_json::json!({
                    "provider": provider,
                    "model": model,
                    "error_type": ErrorKind::Canceled.code(),
                }),
            );
            return Err(Error::new(ErrorKind::Canceled, "request canceled"));
        }

        tracer.log(
            COMPONENT,
            TraceEvent::RetryAttemptStart,
            serde_json::json!({ "attempt": attempt, "max_attempts": retry.max_attempts }),
        );

        let started = Instant::now();
        match adapter.chat_completion(&request).await {
            Ok(outcome) => {
                let mut details = serde_json::json!({
                    "provider": provider,
                    "model": model,
                    "duration_seconds": started.elapsed().as_secs_f64(),
                });
                if let Some(usage) = outcome.usage {
                    details["prompt_tokens"] = serde_json::json!(usage.prompt_tokens);
                    details["completion_tokens"] = serde_json::json!(usage.completion_tokens);
                }
                tracer.log(COMPONENT, TraceEvent::LlmCallSuccess, details);
                return Ok((outcome, attempt));
            }

            Err(err) if err.kind().is_retryable() => {
                final_kind = err.kind();
                tracing::warn!(
                    provider,
                    model = %model,
                    attempt,
                    error = %err,
                    "provider call failed, will retry"
                );
                tracer.log(
                    COMPONENT,
                    TraceEvent::RetryAttemptFailed,
                    serde_json::json!({ "attempt": attempt, "error_type": err.kind().code() }),
                );

                if attempt < retry.max_attempts {
                    let delay = retry.backoff_delay(attempt);
                    tracer.log(
                        COMPONENT,
                        TraceEvent::RetryBackoffDelay,
                        serde_json::json!({
                            "delay_seconds": delay.as_secs_f64(),
                            "backoff_formula": "delay_base * 2^(attempt - 1)",
                        }),
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => {
                            tracer.log(
                                COMPONENT,
                                TraceEvent::LlmCallError,
                                serde_json::json!({
                                    "provider": provider,
                                    "model": model,
                                    "error_type": ErrorKind::Canceled.code(),
                                }),
                            );
                            return Err(Error::new(
                                ErrorKind::Canceled,
                                "request canceled during backoff",
                            ));
                        }
                    }
                }
            }

            Err(err) => {
                tracer.log(
                    COMPONENT,
                    TraceEvent::LlmCallError,
                    serde_json::json!({
                        "provider": provider,
                        "model": model,
                        "error_type": err.kind().code(),
                    }),
                );
                return Err(err);
            }
        }
    }

    tracer.log(
        COMPONENT,
        TraceEvent::MaxRetriesExceeded,
        serde_json::json!({
            "max_attempts": retry.max_attempts,
            "final_error_type": final_kind.code(),
            "safe_error_message": ErrorKind::ResilientLlmFailure.user_message(),
        }),
    );
    Err(Error::new(
        ErrorKind::ResilientLlmFailure,
        format!(
            "provider call failed after {} attempts (last: {})",
            retry.max_attempts,
            final_kind.code()
        ),
    )
    .with_attempts(retry.max_attempts))
}
