//! Provider API key validation and masking.
//!
//! Every error path anywhere in the system that mentions a key must
//! render it through [`mask`]; raw keys never reach logs or responses.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, ErrorKind, Result};
use crate::provider::ProviderTag;

const ELLIPSIS: &str = "…";

/// Minimum length for which mask keeps the prefix and suffix. Shorter
/// keys render as the ellipsis alone.
const MASK_MIN_LEN: usize = 12;

static OPENAI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^sk-[A-Za-z0-9\-_]{40,}$").expect("openai key regex"));
static ANTHROPIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^sk-ant-api03-[A-Za-z0-9\-_]{95}$").expect("anthropic key regex"));
static GEMINI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^AIza[A-Za-z0-9_\-]{33,}$").expect("gemini key regex"));
static MISTRAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]{32}$").expect("mistral key regex"));
static GROK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^xai-[A-Za-z0-9]{40}$").expect("grok key regex"));
static SK_HEX40_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^sk-[A-Za-z0-9]{40,}$").expect("sk key regex"));

fn format_regex(tag: ProviderTag) -> &'static Regex {
    match tag {
        ProviderTag::OpenAi => &OPENAI_RE,
        ProviderTag::Anthropic => &ANTHROPIC_RE,
        ProviderTag::Gemini => &GEMINI_RE,
        ProviderTag::Mistral => &MISTRAL_RE,
        ProviderTag::Grok => &GROK_RE,
        ProviderTag::Qwen | ProviderTag::DeepSeek | ProviderTag::Kimi => &SK_HEX40_RE,
    }
}

/// A format-validated provider key. `Debug` renders the masked form so
/// the raw secret cannot leak through derived logging.
#[derive(Clone)]
pub struct ApiKey {
    raw: String,
    tag: ProviderTag,
}

impl ApiKey {
    /// The raw secret, for building an authenticated request only.
    pub fn expose(&self) -> &str {
        &self.raw
    }

    pub fn masked(&self) -> String {
        mask(&self.raw)
    }

    pub fn provider(&self) -> ProviderTag {
        self.tag
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKey({}, {})", self.tag, self.masked())
    }
}

/// Validate `key` against the provider's key-format table.
///
/// On mismatch the error message carries only the masked rendering.
pub fn validate(tag: ProviderTag, key: &str) -> Result<ApiKey> {
    if format_regex(tag).is_match(key) {
        Ok(ApiKey {
            raw: key.to_owned(),
            tag,
        })
    } else {
        Err(Error::new(
            ErrorKind::InvalidApiKey,
            format!("{} key {} does not match the expected format", tag, mask(key)),
        ))
    }
}

/// Mask a key for logging: first 4 and last 4 characters around a fixed
/// ellipsis. Keys shorter than 12 characters render as the ellipsis alone.
pub fn mask(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() < MASK_MIN_LEN {
        return ELLIPSIS.to_owned();
    }
    let prefix: String = chars[..4].iter().collect();
    let suffix: String = chars[chars.len() - 4..].iter().collect();
    format!("{prefix}{ELLIPSIS}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_of(prefix: &str, fill: char, total: usize) -> String {
        let mut k = prefix.to_owned();
        while k.len() < total {
            k.push(fill);
        }
        k
    }

    #[test]
    fn openai_key_format() {
        let good = key_of("sk-", 'a', 48);
        assert!(validate(ProviderTag::OpenAi, &good).is_ok());
        assert!(validate(ProviderTag::OpenAi, "sk-short").is_err());
        assert!(validate(ProviderTag::OpenAi, &key_of("pk-", 'a', 48)).is_err());
    }

    #[test]
    fn anthropic_key_is_exact_length() {
        let good = format!("sk-ant-api03-{}", "A".repeat(95));
        assert!(validate(ProviderTag::Anthropic, &good).is_ok());
        let short = format!("sk-ant-api03-{}", "A".repeat(94));
        assert!(validate(ProviderTag::Anthropic, &short).is_err());
    }

    #[test]
    fn gemini_key_format() {
        let good = key_of("AIza", 'x', 40);
        assert!(validate(ProviderTag::Gemini, &good).is_ok());
        assert!(validate(ProviderTag::Gemini, "AIza-too-short").is_err());
    }

    #[test]
    fn mistral_key_is_32_alnum() {
        assert!(validate(ProviderTag::Mistral, &"a".repeat(32)).is_ok());
        assert!(validate(ProviderTag::Mistral, &"a".repeat(31)).is_err());
        assert!(validate(ProviderTag::Mistral, &"a".repeat(33)).is_err());
    }

    #[test]
    fn grok_key_format() {
        let good = key_of("xai-", 'b', 44);
        assert!(validate(ProviderTag::Grok, &good).is_ok());
        assert!(validate(ProviderTag::Grok, &key_of("xai-", 'b', 43)).is_err());
    }

    #[test]
    fn sk_family_shares_the_format() {
        let good = key_of("sk-", 'c', 43);
        for tag in [ProviderTag::Qwen, ProviderTag::DeepSeek, ProviderTag::Kimi] {
            assert!(validate(tag, &good).is_ok());
            // Underscores are allowed for openai but not the sk- family.
            assert!(validate(tag, &key_of("sk-a_", 'c', 43)).is_err());
        }
    }

    #[test]
    fn mask_keeps_at_most_eight_chars() {
        let key = key_of("sk-", 'z', 48);
        let masked = mask(&key);
        assert_eq!(masked, format!("sk-z{ELLIPSIS}zzzz"));
        // No substring of the key longer than 4 chars survives.
        let visible = masked.replace(ELLIPSIS, "");
        assert_eq!(visible.chars().count(), 8);
        for window in key.as_bytes().windows(5) {
            let w = std::str::from_utf8(window).unwrap();
            assert!(!masked.contains(w), "masked form leaks '{w}'");
        }
    }

    #[test]
    fn mask_short_key_is_ellipsis_only() {
        assert_eq!(mask("sk-invalid"), ELLIPSIS);
        assert_eq!(mask(""), ELLIPSIS);
        assert_eq!(mask(&"a".repeat(11)), ELLIPSIS);
        assert_eq!(mask(&"a".repeat(12)), format!("aaaa{ELLIPSIS}aaaa"));
    }

    #[test]
    fn invalid_key_error_is_masked() {
        let raw = key_of("sk-", '!', 48); // '!' breaks the charset
        let err = validate(ProviderTag::OpenAi, &raw).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidApiKey);
        assert!(!err.to_string().contains(&raw));
        assert!(err.to_string().contains(ELLIPSIS));
    }

    #[test]
    fn api_key_debug_is_masked() {
        let key = validate(ProviderTag::OpenAi, &key_of("sk-", 'a', 48)).unwrap();
        let dbg = format!("{key:?}");
        assert!(!dbg.contains(key.expose()));
        assert!(dbg.contains(ELLIPSIS));
    }
}
