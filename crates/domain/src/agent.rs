use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, Result};
use crate::provider::ProviderTag;

/// Per-request agent configuration: which backend to talk to, how to
/// decode, which tools may be mounted, and how hard to retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "d_agent_id")]
    pub agent_id: String,
    /// Provider tag as sent on the wire; parsed via [`AgentConfig::provider_tag`]
    /// so an unknown tag surfaces as `UNKNOWN_PROVIDER` rather than a
    /// deserialization failure.
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default = "d_temperature")]
    pub temperature: f32,
    #[serde(default = "d_max_tokens")]
    pub max_tokens: u32,
    /// Enabled tool names. Must be a subset of the tool registry.
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl AgentConfig {
    pub fn provider_tag(&self) -> Result<ProviderTag> {
        self.provider.parse()
    }

    /// Range-check the decoding parameters and retry config.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::new(
                ErrorKind::MalformedRequest,
                format!("temperature {} out of range [0, 2]", self.temperature),
            ));
        }
        if !(1..=32_768).contains(&self.max_tokens) {
            return Err(Error::new(
                ErrorKind::MalformedRequest,
                format!("max_tokens {} out of range [1, 32768]", self.max_tokens),
            ));
        }
        self.retry.validate()
    }
}

/// Retry policy for provider calls: `max_attempts` tries with
/// exponentially growing sleeps of `delay_base · 2^(attempt − 1)` seconds
/// between them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "d_max_attempts")]
    pub max_attempts: u32,
    /// Base delay in seconds.
    #[serde(default = "d_delay_base")]
    pub delay_base: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: d_max_attempts(),
            delay_base: d_delay_base(),
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<()> {
        if !(1..=10).contains(&self.max_attempts) {
            return Err(Error::new(
                ErrorKind::MalformedRequest,
                format!("retry.max_attempts {} out of range [1, 10]", self.max_attempts),
            ));
        }
        if !(0.1..=60.0).contains(&self.delay_base) {
            return Err(Error::new(
                ErrorKind::MalformedRequest,
                format!("retry.delay_base {} out of range [0.1, 60]", self.delay_base),
            ));
        }
        Ok(())
    }

    /// Sleep before attempt `attempt + 1`, where `attempt` is 1-indexed.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(30);
        Duration::from_secs_f64(self.delay_base * f64::from(1u32 << exp))
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_agent_id() -> String {
    "default".into()
}
fn d_temperature() -> f32 {
    0.7
}
fn d_max_tokens() -> u32 {
    4096
}
fn d_max_attempts() -> u32 {
    3
}
fn d_delay_base() -> f64 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AgentConfig {
        serde_json::from_value(serde_json::json!({
            "provider": "openai",
            "model": "gpt-4",
        }))
        .unwrap()
    }

    #[test]
    fn defaults_applied_on_deserialize() {
        let cfg = config();
        assert_eq!(cfg.agent_id, "default");
        assert_eq!(cfg.max_tokens, 4096);
        assert_eq!(cfg.retry.max_attempts, 3);
        assert!((cfg.retry.delay_base - 1.0).abs() < f64::EPSILON);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn temperature_range_is_enforced() {
        let mut cfg = config();
        cfg.temperature = 2.5;
        assert_eq!(
            cfg.validate().unwrap_err().kind(),
            ErrorKind::MalformedRequest
        );
        cfg.temperature = 2.0;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn max_tokens_range_is_enforced() {
        let mut cfg = config();
        cfg.max_tokens = 0;
        assert!(cfg.validate().is_err());
        cfg.max_tokens = 32_769;
        assert!(cfg.validate().is_err());
        cfg.max_tokens = 32_768;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn retry_ranges_are_enforced() {
        let mut cfg = config();
        cfg.retry.max_attempts = 11;
        assert!(cfg.validate().is_err());
        cfg.retry = RetryConfig {
            max_attempts: 1,
            delay_base: 0.05,
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let retry = RetryConfig {
            max_attempts: 5,
            delay_base: 0.5,
        };
        assert_eq!(retry.backoff_delay(1), Duration::from_millis(500));
        assert_eq!(retry.backoff_delay(2), Duration::from_millis(1000));
        assert_eq!(retry.backoff_delay(3), Duration::from_millis(2000));
        assert_eq!(retry.backoff_delay(4), Duration::from_millis(4000));
    }

    #[test]
    fn unknown_provider_surfaces_as_taxonomy_error() {
        let mut cfg = config();
        cfg.provider = "watson".into();
        assert_eq!(
            cfg.provider_tag().unwrap_err().kind(),
            ErrorKind::UnknownProvider
        );
    }
}
