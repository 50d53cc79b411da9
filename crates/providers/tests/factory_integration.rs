//! Integration tests for the provider factory: full round-trip without
//! any network. A scripted stub adapter is registered into the factory
//! cache the way the gateway test suite does it, then resolved and driven
//! through the adapter contract.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use maestro_domain::{Message, ProviderTag};
use maestro_providers::{ChatOutcome, ChatRequest, HealthReport, ProviderAdapter, ProviderFactory};

#[derive(Debug)]
struct CannedAdapter {
    reply: String,
}

#[async_trait::async_trait]
impl ProviderAdapter for CannedAdapter {
    fn provider_tag(&self) -> ProviderTag {
        ProviderTag::OpenAi
    }

    fn model_name(&self) -> &str {
        "canned-model"
    }

    fn supports_tool_calls(&self) -> bool {
        true
    }

    async fn chat_completion(
        &self,
        request: &ChatRequest,
    ) -> maestro_domain::Result<ChatOutcome> {
        assert!(!request.messages.is_empty());
        Ok(ChatOutcome {
            message: Message::assistant(self.reply.clone()),
            usage: None,
        })
    }

    async fn health(&self) -> HealthReport {
        HealthReport {
            ok: true,
            latency: Duration::ZERO,
            error: None,
        }
    }
}

fn empty_factory() -> ProviderFactory {
    ProviderFactory::new(HashMap::new(), Duration::from_secs(60))
}

#[tokio::test]
async fn registered_adapter_is_resolved_and_called() {
    let factory = empty_factory();
    factory.register(Arc::new(CannedAdapter {
        reply: "stubbed hello".into(),
    }));

    let adapter = factory
        .get(ProviderTag::OpenAi, Some("canned-model"))
        .unwrap();
    let outcome = adapter
        .chat_completion(&ChatRequest {
            model: "canned-model".into(),
            messages: vec![Message::user("hi")],
            tools: vec![],
            temperature: 0.7,
            max_tokens: 64,
        })
        .await
        .unwrap();

    assert_eq!(outcome.message.content, "stubbed hello");
}

#[tokio::test]
async fn registration_shadows_construction_for_that_model_only() {
    let factory = empty_factory();
    factory.register(Arc::new(CannedAdapter {
        reply: "canned".into(),
    }));

    // The registered pair resolves to the stub...
    let stub = factory
        .get(ProviderTag::OpenAi, Some("canned-model"))
        .unwrap();
    assert!(stub.health().await.ok);

    // ...while another model constructs a real (keyless) adapter.
    let real = factory.get(ProviderTag::OpenAi, Some("gpt-4")).unwrap();
    assert!(!real.health().await.ok);
}

#[test]
fn supported_tools_follow_tool_call_capability() {
    let adapter = CannedAdapter {
        reply: String::new(),
    };
    let registered = vec!["get_current_time".to_string(), "lookup".to_string()];
    let supported = adapter.supported_tools(&registered);
    assert_eq!(supported.len(), 2);
    assert!(supported.contains("get_current_time"));
}
