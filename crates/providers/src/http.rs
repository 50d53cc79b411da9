//! Shared HTTP plumbing for provider adapters: client construction,
//! transport error mapping, and the HTTP-status error categorization of
//! the failure taxonomy.

use std::time::Duration;

use maestro_domain::error::{Error, ErrorKind};
use maestro_domain::ProviderTag;

/// Build the reqwest client an adapter uses, with the per-provider-call
/// timeout applied at construction.
pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::new(ErrorKind::TransientNetwork, format!("client build: {e}")))
}

/// Map a transport-level [`reqwest::Error`] into the taxonomy: client
/// timeouts become `TIMEOUT`, everything else (connect, DNS, broken
/// pipe) is `TRANSIENT_NETWORK`.
pub(crate) fn from_reqwest(tag: ProviderTag, e: reqwest::Error) -> Error {
    // reqwest error text can embed the request URL; strip any query so a
    // key passed as a query parameter never reaches logs.
    let text = redact_query(&e.to_string());
    if e.is_timeout() {
        Error::new(ErrorKind::Timeout, format!("{tag}: request timed out: {text}"))
    } else {
        Error::new(ErrorKind::TransientNetwork, format!("{tag}: {text}"))
    }
}

/// Categorize a non-success HTTP status per the taxonomy:
/// 429 → `RATE_LIMITED`, 5xx → `PROVIDER_5XX`, any other 4xx →
/// `PROVIDER_4XX_NON_RATE_LIMIT`.
///
/// The vendor body is truncated into the internal message for logs; the
/// orchestrator renders user-facing text from the kind alone.
pub(crate) fn categorize_status(tag: ProviderTag, status: u16, body: &str) -> Error {
    let kind = if status == 429 {
        ErrorKind::RateLimited
    } else if (500..600).contains(&status) {
        ErrorKind::Provider5xx
    } else {
        ErrorKind::Provider4xxNonRateLimit
    };
    Error::new(
        kind,
        format!("{tag}: HTTP {status} - {}", truncate(body, 200)),
    )
}

/// Strip query strings from any URL embedded in an error message.
pub(crate) fn redact_query(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_query = false;
    for c in text.chars() {
        match c {
            '?' => {
                in_query = true;
                out.push_str("?<redacted>");
            }
            ' ' | ')' | '"' if in_query => {
                in_query = false;
                out.push(c);
            }
            _ if in_query => {}
            _ => out.push(c),
        }
    }
    out
}

pub(crate) fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_categorization_follows_the_table() {
        assert_eq!(
            categorize_status(ProviderTag::OpenAi, 429, "slow down").kind(),
            ErrorKind::RateLimited
        );
        assert_eq!(
            categorize_status(ProviderTag::OpenAi, 503, "oops").kind(),
            ErrorKind::Provider5xx
        );
        assert_eq!(
            categorize_status(ProviderTag::OpenAi, 404, "missing").kind(),
            ErrorKind::Provider4xxNonRateLimit
        );
        assert_eq!(
            categorize_status(ProviderTag::OpenAi, 400, "bad").kind(),
            ErrorKind::Provider4xxNonRateLimit
        );
    }

    #[test]
    fn redact_query_strips_key_material() {
        let text = "error sending request for url (https://api.example.com/v1/models?key=AIzaSecret123)";
        let redacted = redact_query(text);
        assert!(!redacted.contains("AIzaSecret123"));
        assert!(redacted.contains("?<redacted>"));
        assert!(redacted.ends_with(')'));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "héllo wörld";
        let t = truncate(s, 2);
        assert!(t.len() <= 2);
        assert!(s.starts_with(t));
    }
}
