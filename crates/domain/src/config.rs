use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, Result};
use crate::keys;
use crate::provider::ProviderTag;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Environment
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Deployment environment. Selects CORS and key-validation strictness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Development
    }
}

impl std::str::FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(Error::new(
                ErrorKind::MalformedRequest,
                format!("unknown environment '{other}'"),
            )),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_port")]
    pub port: u16,
    #[serde(default = "d_host")]
    pub host: String,
    /// Origins allowed for CORS. Required (non-empty) in production.
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
    /// Cap on concurrently processed requests (backpressure, not rate limiting).
    #[serde(default = "d_max_concurrent")]
    pub max_concurrent_requests: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: d_port(),
            host: d_host(),
            cors_allowed_origins: Vec::new(),
            max_concurrent_requests: d_max_concurrent(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Summarizer
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// History summarization policy. `provider`/`model` select a dedicated
/// (usually cheaper) summarization model; when unset the agent's own
/// provider and model are used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    #[serde(default = "d_threshold")]
    pub threshold: usize,
    #[serde(default = "d_keep_recent")]
    pub keep_recent: usize,
    #[serde(default)]
    pub provider: Option<ProviderTag>,
    #[serde(default)]
    pub model: Option<String>,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            threshold: d_threshold(),
            keep_recent: d_keep_recent(),
            provider: None,
            model: None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Orchestrator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "d_max_iterations")]
    pub max_iterations: u32,
    /// Per-tool-execution timeout, seconds.
    #[serde(default = "d_tool_timeout")]
    pub tool_timeout_secs: u64,
    /// End-to-end per-request timeout, seconds.
    #[serde(default = "d_request_timeout")]
    pub request_timeout_secs: u64,
    /// Per-provider-call timeout, seconds (applied at client construction).
    #[serde(default = "d_provider_timeout")]
    pub provider_timeout_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: d_max_iterations(),
            tool_timeout_secs: d_tool_timeout(),
            request_timeout_secs: d_request_timeout(),
            provider_timeout_secs: d_provider_timeout(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Assembled gateway configuration. Built from the environment by the
/// gateway binary; pure data here so tests construct it directly.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub environment: Environment,
    pub server: ServerConfig,
    pub summarizer: SummarizerConfig,
    pub orchestrator: OrchestratorConfig,
    /// Raw provider keys as sourced from the environment, keyed by tag.
    /// Format validation happens in [`Config::validate`] (production) and
    /// at adapter construction (always).
    pub provider_keys: HashMap<ProviderTag, String>,
}

impl Config {
    /// Startup validation. In production mode this enforces the CORS and
    /// key requirements; key format errors are reported masked.
    pub fn validate(&self) -> Result<()> {
        if self.environment != Environment::Production {
            return Ok(());
        }

        if self.server.cors_allowed_origins.is_empty() {
            return Err(Error::new(
                ErrorKind::MissingCorsOriginsInProduction,
                "CORS_ALLOWED_ORIGINS must be set in production",
            ));
        }

        let mut valid = 0usize;
        for (tag, key) in &self.provider_keys {
            match keys::validate(*tag, key) {
                Ok(_) => valid += 1,
                Err(e) => return Err(e),
            }
        }
        if valid == 0 {
            return Err(Error::new(
                ErrorKind::NoValidKeysInProduction,
                "no valid provider API keys configured in production",
            ));
        }

        Ok(())
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_port() -> u16 {
    8080
}
fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_max_concurrent() -> usize {
    256
}
fn d_threshold() -> usize {
    20
}
fn d_keep_recent() -> usize {
    6
}
fn d_max_iterations() -> u32 {
    10
}
fn d_tool_timeout() -> u64 {
    30
}
fn d_request_timeout() -> u64 {
    300
}
fn d_provider_timeout() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_openai_key() -> String {
        format!("sk-{}", "a".repeat(45))
    }

    #[test]
    fn development_config_validates_without_keys() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn production_requires_cors_origins() {
        let config = Config {
            environment: Environment::Production,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingCorsOriginsInProduction);
    }

    #[test]
    fn production_requires_a_valid_key() {
        let config = Config {
            environment: Environment::Production,
            server: ServerConfig {
                cors_allowed_origins: vec!["https://app.example.com".into()],
                ..Default::default()
            },
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoValidKeysInProduction);
    }

    #[test]
    fn production_rejects_malformed_key_with_masked_message() {
        let mut provider_keys = HashMap::new();
        provider_keys.insert(ProviderTag::OpenAi, "sk-invalid".to_string());
        let config = Config {
            environment: Environment::Production,
            server: ServerConfig {
                cors_allowed_origins: vec!["https://app.example.com".into()],
                ..Default::default()
            },
            provider_keys,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidApiKey);
        assert!(!err.to_string().contains("sk-invalid"));
    }

    #[test]
    fn production_accepts_one_valid_key() {
        let mut provider_keys = HashMap::new();
        provider_keys.insert(ProviderTag::OpenAi, valid_openai_key());
        let config = Config {
            environment: Environment::Production,
            server: ServerConfig {
                cors_allowed_origins: vec!["https://app.example.com".into()],
                ..Default::default()
            },
            provider_keys,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn environment_parses_aliases() {
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("development".parse::<Environment>().unwrap(), Environment::Development);
        assert!("qa".parse::<Environment>().is_err());
    }
}
