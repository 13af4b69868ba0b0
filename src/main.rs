use anyhow::{Context, Result};
use fixture_bridge::{
    cache::{CacheSubstitutionGate, ResultCache},
    config::BridgeConfig,
    server::{CacheServerHandle, WebSocketCacheServer},
};
use sentry::integrations::tracing::EventFilter;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

/// Installs the fmt subscriber with Sentry event and breadcrumb forwarding
fn init_observability(config: &BridgeConfig) -> sentry::ClientInitGuard {
    let guard = config.init_sentry();

    let sentry_layer = sentry::integrations::tracing::layer().event_filter(|md| match *md.level() {
        tracing::Level::ERROR | tracing::Level::WARN => EventFilter::Event,
        tracing::Level::TRACE => EventFilter::Ignore,
        _ => EventFilter::Breadcrumb,
    });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fixture_bridge=debug,info".into()),
        )
        .with(sentry_layer)
        .init();

    guard
}

/// Writes the coin definitions rewritten for the running cache server
fn rewrite_coins(config: &BridgeConfig, handle: &CacheServerHandle) -> Result<()> {
    let (Some(source), Some(target)) = (config.cache_server.coins.as_ref(), config.cache_server.coins_target()) else {
        return Ok(());
    };

    let content = std::fs::read_to_string(source)
        .with_context(|| format!("Failed to read coins definitions {:?}", source))?;
    let rewritten = handle
        .preprocess_coins(&content)
        .with_context(|| format!("Failed to rewrite coins definitions {:?}", source))?;
    std::fs::write(&target, rewritten)
        .with_context(|| format!("Failed to write coins definitions {:?}", target))?;

    info!("Coins definitions written to {:?}", target);
    Ok(())
}

fn load_cache(config: &BridgeConfig) -> Result<Arc<ResultCache>> {
    match config.cache_server.dataset {
        Some(ref path) => {
            let cache = ResultCache::load(path)
                .with_context(|| format!("Failed to load cache dataset {:?}", path))?;
            Ok(Arc::new(cache))
        }
        None => Ok(ResultCache::bundled()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = BridgeConfig::load()?;
    let _guard = init_observability(&config);
    config.validate()?;

    info!("Starting {}", fixture_bridge::version_info());
    info!("Configuration loaded successfully");
    info!("FW: {}", config.firmware);
    info!(
        "Methods: {}",
        if config.included_methods.is_empty() { "All" } else { config.included_methods.as_str() }
    );

    let cache = load_cache(&config)?;
    let gate = Arc::new(CacheSubstitutionGate::new(cache, config.use_tx_cache).with_monitoring(true));

    let server = WebSocketCacheServer::new(config.effective_cache_server(), gate.clone());
    let mut handle = server
        .start()
        .await
        .context("Failed to start websocket cache server")?;

    rewrite_coins(&config, &handle)?;

    match handle.endpoint() {
        Some(endpoint) => info!("Server started... {}", endpoint),
        None => warn!("Websocket cache disabled (TESTS_USE_WS_CACHE is not set), nothing to serve"),
    }

    if handle.is_listening() {
        signal::ctrl_c().await.context("Failed to listen for shutdown signal")?;
        info!("Received shutdown signal");
    }

    handle.close().await;
    let stats = gate.stats();
    info!(
        "Cache stats: {} hits, {} misses, hit rate {:.2}",
        stats.hits, stats.misses, stats.hit_rate
    );
    Ok(())
}
