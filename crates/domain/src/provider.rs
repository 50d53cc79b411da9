use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, Result};

/// The enumerated set of supported provider backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderTag {
    OpenAi,
    Anthropic,
    Gemini,
    Mistral,
    Grok,
    Qwen,
    DeepSeek,
    Kimi,
}

impl ProviderTag {
    pub const ALL: [ProviderTag; 8] = [
        ProviderTag::OpenAi,
        ProviderTag::Anthropic,
        ProviderTag::Gemini,
        ProviderTag::Mistral,
        ProviderTag::Grok,
        ProviderTag::Qwen,
        ProviderTag::DeepSeek,
        ProviderTag::Kimi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderTag::OpenAi => "openai",
            ProviderTag::Anthropic => "anthropic",
            ProviderTag::Gemini => "gemini",
            ProviderTag::Mistral => "mistral",
            ProviderTag::Grok => "grok",
            ProviderTag::Qwen => "qwen",
            ProviderTag::DeepSeek => "deepseek",
            ProviderTag::Kimi => "kimi",
        }
    }

    /// The environment variable the gateway reads this provider's key from.
    pub fn key_env_var(&self) -> &'static str {
        match self {
            ProviderTag::OpenAi => "OPENAI_API_KEY",
            ProviderTag::Anthropic => "ANTHROPIC_API_KEY",
            ProviderTag::Gemini => "GEMINI_API_KEY",
            ProviderTag::Mistral => "MISTRAL_API_KEY",
            ProviderTag::Grok => "GROK_API_KEY",
            ProviderTag::Qwen => "QWEN_API_KEY",
            ProviderTag::DeepSeek => "DEEPSEEK_API_KEY",
            ProviderTag::Kimi => "KIMI_K2_API_KEY",
        }
    }

    /// Model used when a request does not name one.
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderTag::OpenAi => "gpt-4o",
            ProviderTag::Anthropic => "claude-sonnet-4-20250514",
            ProviderTag::Gemini => "gemini-2.0-flash",
            ProviderTag::Mistral => "mistral-large-latest",
            ProviderTag::Grok => "grok-3",
            ProviderTag::Qwen => "qwen-max",
            ProviderTag::DeepSeek => "deepseek-chat",
            ProviderTag::Kimi => "kimi-k2",
        }
    }
}

impl std::fmt::Display for ProviderTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderTag::OpenAi),
            "anthropic" => Ok(ProviderTag::Anthropic),
            "gemini" => Ok(ProviderTag::Gemini),
            "mistral" => Ok(ProviderTag::Mistral),
            "grok" => Ok(ProviderTag::Grok),
            "qwen" => Ok(ProviderTag::Qwen),
            "deepseek" => Ok(ProviderTag::DeepSeek),
            "kimi" => Ok(ProviderTag::Kimi),
            other => Err(Error::new(
                ErrorKind::UnknownProvider,
                format!("unknown provider tag '{other}'"),
            )),
        }
    }
}
