//! Server wiring and run loop
//!
//! Builds the store, provider, orchestrator and axum router, then serves
//! until ctrl-c.

use crate::api::api_router;
use crate::config::AppConfig;
use crate::middleware::correlation_middleware;
use crate::store::SqliteStore;
use anyhow::{Context, Result};
use axum::{middleware, Extension};
use std::sync::Arc;
use tollgate_llm::{
    Accountant, ChatOrchestrator, ChatProvider, OpenAiCompatConfig, OpenAiCompatProvider,
    ResiliencePolicy, Router as ModelRouter,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    /// The orchestration pipeline
    pub orchestrator: Arc<ChatOrchestrator>,
    /// The upstream provider (health probes)
    pub provider: Arc<dyn ChatProvider>,
}

/// Build the configured upstream provider
pub fn build_provider(config: &AppConfig) -> Result<Arc<dyn ChatProvider>> {
    let provider = OpenAiCompatProvider::new(
        OpenAiCompatConfig::new(config.upstream.clone())
            .with_provider_name(config.provider_name.clone()),
    )
    .context("Failed to build upstream provider")?;
    Ok(Arc::new(provider))
}

/// Assemble the orchestration pipeline over a store and provider
pub fn build_orchestrator(
    config: &AppConfig,
    store: Arc<SqliteStore>,
    provider: Arc<dyn ChatProvider>,
) -> Arc<ChatOrchestrator> {
    let resilience = Arc::new(ResiliencePolicy::new(
        config.upstream.retry_config(),
        config.upstream.breaker_config(),
    ));
    let accountant = Arc::new(Accountant::new(store.clone(), store));

    Arc::new(ChatOrchestrator::new(
        provider,
        ModelRouter::new(config.routing.clone()),
        resilience,
        accountant,
    ))
}

/// Build the axum application around shared state
pub fn build_app(state: AppState) -> axum::Router {
    api_router()
        .layer(middleware::from_fn(correlation_middleware))
        .layer(Extension(state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Run the server until shutdown
pub async fn run(config: AppConfig) -> Result<()> {
    info!("Starting Tollgate v{}", env!("CARGO_PKG_VERSION"));

    let store = Arc::new(
        SqliteStore::from_path(&config.db_path)
            .await
            .context("Failed to initialize store")?,
    );
    store
        .seed_pricing(&config.routing)
        .await
        .context("Failed to seed pricing")?;
    info!(db = %config.db_path.display(), "Store ready");

    let provider = build_provider(&config)?;
    let orchestrator = build_orchestrator(&config, store, provider.clone());
    let app = build_app(AppState {
        orchestrator,
        provider,
    });

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for ctrl-c");
    }
}
