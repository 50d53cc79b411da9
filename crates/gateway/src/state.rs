use std::sync::Arc;

use maestro_domain::config::Config;
use maestro_metrics::Metrics;
use maestro_providers::ProviderFactory;
use maestro_sessions::SessionStore;
use maestro_tools::ToolRegistry;

/// Shared application state passed to all API handlers.
///
/// The provider cache, the metrics registry, and the session store are
/// the only process-wide mutable states; each hides behind its own
/// handle so tests substitute isolated instances.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub providers: Arc<ProviderFactory>,
    pub sessions: Arc<SessionStore>,
    pub tools: Arc<ToolRegistry>,
    pub metrics: Arc<Metrics>,
}
