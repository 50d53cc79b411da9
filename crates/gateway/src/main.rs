use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use clap::Parser;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::EnvFilter;

use maestro_domain::config::{Config, Environment};
use maestro_gateway::api;
use maestro_gateway::state::AppState;
use maestro_metrics::Metrics;
use maestro_providers::ProviderFactory;
use maestro_sessions::SessionStore;
use maestro_tools::ToolRegistry;

#[derive(Parser)]
#[command(name = "maestro", version, about = "Multi-provider LLM orchestration gateway")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the gateway server (default).
    Serve,
    /// Print the version and exit.
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Default to serve when no subcommand is given.
        None | Some(Command::Serve) => {
            init_tracing();
            let config = maestro_gateway::config::load_from_env()
                .context("loading configuration from environment")?;
            config.validate().context("validating configuration")?;
            run_server(Arc::new(config)).await
        }
        Some(Command::Version) => {
            println!("maestro {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Structured JSON tracing for the server path.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,maestro_gateway=debug")),
        )
        .json()
        .init();
}

async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!(environment = ?config.environment, "maestro starting");

    // ── Metrics registry ─────────────────────────────────────────────
    let metrics = Arc::new(Metrics::new());
    tracing::info!("metrics registry ready");

    // ── Session store ────────────────────────────────────────────────
    let sessions = Arc::new(SessionStore::new());
    tracing::info!("session store ready (in-memory)");

    // ── Tool registry ────────────────────────────────────────────────
    let tools = Arc::new(ToolRegistry::with_builtins());
    tracing::info!(tools = tools.len(), "tool registry ready");

    // ── Provider factory ─────────────────────────────────────────────
    let providers = Arc::new(ProviderFactory::new(
        config.provider_keys.clone(),
        Duration::from_secs(config.orchestrator.provider_timeout_secs),
    ));
    let configured = providers.configured_tags();
    if configured.is_empty() {
        tracing::warn!(
            "no provider API keys configured; orchestration requests will fail \
             until at least one *_API_KEY variable is set"
        );
    } else {
        tracing::info!(providers = ?configured, "provider factory ready");
    }

    let state = AppState {
        config: config.clone(),
        providers,
        sessions,
        tools,
        metrics,
    };

    // ── CORS + backpressure layers ───────────────────────────────────
    let cors_layer = build_cors_layer(&config);
    let max_concurrent = config.server.max_concurrent_requests;
    tracing::info!(max_concurrent, "concurrency limit set");

    let app = api::router()
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(cors_layer)
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_concurrent))
        .with_state(state);

    // ── Bind ─────────────────────────────────────────────────────────
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;

    tracing::info!(addr = %addr, "maestro listening");

    axum::serve(listener, app)
        .await
        .context("axum server error")?;

    Ok(())
}

/// Build a [`CorsLayer`] from the configured allowed origins.
///
/// Origins may carry a trailing `*` wildcard for the port segment
/// (e.g. `http://localhost:*`); these expand into a predicate that
/// matches any numeric port on that host. With no origins configured
/// (development only; production validation requires them) all origins
/// are allowed.
fn build_cors_layer(config: &Config) -> CorsLayer {
    use axum::http::header;

    let origins = &config.server.cors_allowed_origins;

    if origins.is_empty() {
        debug_assert!(config.environment != Environment::Production);
        tracing::warn!("CORS_ALLOWED_ORIGINS not set; all origins allowed (development)");
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE]);
    }

    // Partition into exact origins and wildcard-port patterns.
    let mut exact: Vec<HeaderValue> = Vec::new();
    let mut wildcard_prefixes: Vec<String> = Vec::new();

    for origin in origins {
        if origin.ends_with(":*") {
            wildcard_prefixes.push(origin.trim_end_matches('*').to_owned());
        } else if let Ok(hv) = origin.parse::<HeaderValue>() {
            exact.push(hv);
        } else {
            tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
        }
    }

    let allow_origin = if wildcard_prefixes.is_empty() {
        AllowOrigin::list(exact)
    } else {
        AllowOrigin::predicate(move |origin, _| {
            if exact.iter().any(|e| e.as_bytes() == origin.as_bytes()) {
                return true;
            }
            let origin_str = origin.to_str().unwrap_or("");
            // Remainder after the prefix must be digits only, so
            // "http://localhost:3000.evil.com" cannot slip through.
            wildcard_prefixes.iter().any(|prefix| {
                origin_str
                    .strip_prefix(prefix.as_str())
                    .map(|port| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
                    .unwrap_or(false)
            })
        })
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}
