//! Environment-based configuration loading.
//!
//! The gateway is configured entirely through environment variables:
//! `ENVIRONMENT`, `CORS_ALLOWED_ORIGINS`, one `*_API_KEY` variable per
//! provider, and `MAESTRO_*` tunables for the orchestrator and
//! summarizer. Anything unset falls back to the documented defaults.

use std::collections::HashMap;
use std::str::FromStr;

use maestro_domain::config::{
    Config, Environment, OrchestratorConfig, ServerConfig, SummarizerConfig,
};
use maestro_domain::error::{Error, ErrorKind, Result};
use maestro_domain::ProviderTag;

pub fn load_from_env() -> Result<Config> {
    let environment = match non_empty_env("ENVIRONMENT") {
        Some(raw) => raw.parse::<Environment>()?,
        None => Environment::default(),
    };

    let server = ServerConfig {
        host: non_empty_env("MAESTRO_HOST").unwrap_or_else(|| "127.0.0.1".into()),
        port: parsed_env("MAESTRO_PORT", 8080)?,
        cors_allowed_origins: non_empty_env("CORS_ALLOWED_ORIGINS")
            .map(|raw| parse_origins(&raw))
            .unwrap_or_default(),
        max_concurrent_requests: parsed_env("MAESTRO_MAX_CONCURRENT_REQUESTS", 256)?,
    };

    let summarizer = SummarizerConfig {
        threshold: parsed_env("MAESTRO_SUMMARIZATION_THRESHOLD", 20)?,
        keep_recent: parsed_env("MAESTRO_KEEP_RECENT", 6)?,
        provider: non_empty_env("MAESTRO_SUMMARIZER_PROVIDER")
            .map(|raw| ProviderTag::from_str(&raw))
            .transpose()?,
        model: non_empty_env("MAESTRO_SUMMARIZER_MODEL"),
    };

    let orchestrator = OrchestratorConfig {
        max_iterations: parsed_env("MAESTRO_MAX_ITERATIONS", 10)?,
        tool_timeout_secs: parsed_env("MAESTRO_TOOL_TIMEOUT_SECS", 30)?,
        request_timeout_secs: parsed_env("MAESTRO_REQUEST_TIMEOUT_SECS", 300)?,
        provider_timeout_secs: parsed_env("MAESTRO_PROVIDER_TIMEOUT_SECS", 60)?,
    };

    let mut provider_keys = HashMap::new();
    for tag in ProviderTag::ALL {
        if let Some(key) = non_empty_env(tag.key_env_var()) {
            provider_keys.insert(tag, key);
        }
    }

    Ok(Config {
        environment,
        server,
        summarizer,
        orchestrator,
        provider_keys,
    })
}

/// Split a comma-separated origin list, trimming blanks.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_env<T: FromStr>(name: &str, default: T) -> Result<T> {
    match non_empty_env(name) {
        Some(raw) => raw.parse::<T>().map_err(|_| {
            Error::new(
                ErrorKind::MalformedRequest,
                format!("environment variable {name} has an unparseable value"),
            )
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origins_split_and_trim() {
        assert_eq!(
            parse_origins("https://a.example.com, https://b.example.com ,"),
            vec![
                "https://a.example.com".to_string(),
                "https://b.example.com".to_string(),
            ]
        );
        assert!(parse_origins("  ").is_empty());
    }
}
