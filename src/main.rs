//! Gaza deal tracker: binary entrypoint.
//! Loads config, wires the ingest pipeline and boots the Axum HTTP server.

use std::path::PathBuf;
use std::sync::Arc;

use shuttle_axum::ShuttleAxum;

use gaza_deal_tracker::config::AppConfig;
use gaza_deal_tracker::ingest::config::load_registry_default;
use gaza_deal_tracker::ingest::scheduler::{spawn_refresh_scheduler, RefreshSchedulerCfg};
use gaza_deal_tracker::metrics::Metrics;
use gaza_deal_tracker::relevance::{
    start_hot_reload_thread, RelevanceEngine, RelevanceHandle, DEFAULT_RELEVANCE_CONFIG_PATH,
    ENV_RELEVANCE_CONFIG_PATH,
};
use gaza_deal_tracker::{build_pipeline, create_router, init_tracing, AppState};

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::from_env();
    tracing::info!(?cfg, "starting gaza-deal-tracker");

    // --- Relevance gate ---
    let engine = RelevanceEngine::from_toml()?;
    let handle = RelevanceHandle::new(engine);
    let path = std::env::var(ENV_RELEVANCE_CONFIG_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_RELEVANCE_CONFIG_PATH));
    start_hot_reload_thread(handle.clone(), path);

    // --- Pipeline ---
    let registry = load_registry_default()?;
    tracing::info!(target: "ingest", feeds = registry.feeds.len(), "source registry loaded");
    let pipeline = Arc::new(build_pipeline(&cfg, &registry, handle)?);

    // Recorder first: the scheduler's first tick fires immediately.
    let metrics = if cfg.metrics_enabled {
        Some(Metrics::init(cfg.max_items)?)
    } else {
        None
    };

    if let Some(interval) = cfg.refresh_interval {
        spawn_refresh_scheduler(Arc::clone(&pipeline), RefreshSchedulerCfg { interval });
    }

    let router = create_router(AppState::new(pipeline), metrics.as_ref());
    Ok(router.into())
}
