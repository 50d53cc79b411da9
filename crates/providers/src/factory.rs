//! Provider factory.
//!
//! Maps a provider tag to an adapter instance. Instances are cached per
//! `(tag, model)` pair for the process lifetime, so repeated requests
//! reuse the same HTTP client and key validation work.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;

use maestro_domain::error::Result;
use maestro_domain::{keys, ProviderTag};

use crate::anthropic::AnthropicAdapter;
use crate::gemini::GeminiAdapter;
use crate::openai_compat::OpenAiCompatAdapter;
use crate::traits::ProviderAdapter;

/// One row of the provider listing.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderListing {
    pub provider: String,
    /// Whether a format-valid key is configured for this provider.
    pub healthy: bool,
    pub models: Vec<String>,
    pub has_tool_support: bool,
}

/// Holds per-provider credentials and the process-lifetime adapter cache.
pub struct ProviderFactory {
    keys: HashMap<ProviderTag, String>,
    call_timeout: Duration,
    cache: RwLock<HashMap<(ProviderTag, String), Arc<dyn ProviderAdapter>>>,
}

impl ProviderFactory {
    pub fn new(keys: HashMap<ProviderTag, String>, call_timeout: Duration) -> Self {
        Self {
            keys,
            call_timeout,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Get (or construct and cache) the adapter for `(tag, model)`. The
    /// model defaults per provider when not named.
    ///
    /// A provider with no configured key still constructs; the adapter
    /// reports `MISSING_API_KEY` at call time. A key that fails format
    /// validation fails construction here with a masked message.
    pub fn get(&self, tag: ProviderTag, model: Option<&str>) -> Result<Arc<dyn ProviderAdapter>> {
        let model = model.unwrap_or_else(|| tag.default_model()).to_string();
        let cache_key = (tag, model.clone());

        if let Some(adapter) = self.cache.read().get(&cache_key) {
            return Ok(adapter.clone());
        }

        let key = self.keys.get(&tag).map(String::as_str);
        let adapter: Arc<dyn ProviderAdapter> = match tag {
            ProviderTag::Anthropic => {
                Arc::new(AnthropicAdapter::new(&model, key, self.call_timeout)?)
            }
            ProviderTag::Gemini => Arc::new(GeminiAdapter::new(&model, key, self.call_timeout)?),
            _ => Arc::new(OpenAiCompatAdapter::new(tag, &model, key, self.call_timeout)?),
        };

        let mut cache = self.cache.write();
        let entry = cache.entry(cache_key).or_insert(adapter);
        Ok(entry.clone())
    }

    /// Seed the cache with a prebuilt adapter, keyed by its tag and model
    /// name. Later `get` calls for that pair return this instance; the
    /// orchestration test suites install their stub adapters this way.
    pub fn register(&self, adapter: Arc<dyn ProviderAdapter>) {
        let key = (adapter.provider_tag(), adapter.model_name().to_string());
        self.cache.write().insert(key, adapter);
    }

    /// Enumerate all supported providers with their configuration state.
    pub fn list(&self) -> Vec<ProviderListing> {
        ProviderTag::ALL
            .iter()
            .map(|tag| {
                let healthy = self
                    .keys
                    .get(tag)
                    .is_some_and(|k| keys::validate(*tag, k).is_ok());
                ProviderListing {
                    provider: tag.as_str().to_string(),
                    healthy,
                    models: vec![tag.default_model().to_string()],
                    has_tool_support: true,
                }
            })
            .collect()
    }

    /// Tags that have a configured (not necessarily valid) key.
    pub fn configured_tags(&self) -> Vec<ProviderTag> {
        let mut tags: Vec<ProviderTag> = self.keys.keys().copied().collect();
        tags.sort_by_key(|t| t.as_str());
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maestro_domain::ErrorKind;

    fn factory_with(tag: ProviderTag, key: &str) -> ProviderFactory {
        let mut keys = HashMap::new();
        keys.insert(tag, key.to_string());
        ProviderFactory::new(keys, Duration::from_secs(60))
    }

    #[test]
    fn cache_returns_the_same_instance() {
        let factory = factory_with(ProviderTag::OpenAi, &format!("sk-{}", "a".repeat(45)));
        let a = factory.get(ProviderTag::OpenAi, Some("gpt-4")).unwrap();
        let b = factory.get(ProviderTag::OpenAi, Some("gpt-4")).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let c = factory.get(ProviderTag::OpenAi, Some("gpt-4o-mini")).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn default_model_fills_in() {
        let factory = factory_with(ProviderTag::DeepSeek, &format!("sk-{}", "b".repeat(42)));
        let adapter = factory.get(ProviderTag::DeepSeek, None).unwrap();
        assert_eq!(adapter.model_name(), ProviderTag::DeepSeek.default_model());
    }

    #[test]
    fn invalid_key_fails_get_with_masked_error() {
        let raw = "definitely-not-a-valid-key-shape";
        let factory = factory_with(ProviderTag::OpenAi, raw);
        let err = factory.get(ProviderTag::OpenAi, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidApiKey);
        assert!(!err.to_string().contains(raw));
    }

    #[test]
    fn missing_key_still_constructs() {
        let factory = ProviderFactory::new(HashMap::new(), Duration::from_secs(60));
        assert!(factory.get(ProviderTag::Anthropic, None).is_ok());
        assert!(factory.get(ProviderTag::Gemini, None).is_ok());
        assert!(factory.get(ProviderTag::Kimi, None).is_ok());
    }

    #[test]
    fn listing_reports_key_state_per_provider() {
        let factory = factory_with(ProviderTag::Mistral, &"m".repeat(32));
        let listing = factory.list();
        assert_eq!(listing.len(), ProviderTag::ALL.len());

        let mistral = listing.iter().find(|l| l.provider == "mistral").unwrap();
        assert!(mistral.healthy);
        assert!(mistral.has_tool_support);
        assert_eq!(mistral.models, vec!["mistral-large-latest".to_string()]);

        let openai = listing.iter().find(|l| l.provider == "openai").unwrap();
        assert!(!openai.healthy);
    }
}
