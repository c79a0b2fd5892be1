// src/lib.rs
// Public library surface for the service binary and integration tests.

pub mod api;
pub mod config;
pub mod dedup;
pub mod ingest;
pub mod metrics;
pub mod news;
pub mod relevance;
pub mod store;

use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::AppConfig;
use crate::dedup::DedupParams;
use crate::ingest::config::SourceRegistry;
use crate::ingest::providers::{http_client, rss::FeedProvider};
use crate::ingest::toggles::FeedToggles;
use crate::ingest::types::SourceProvider;
use crate::ingest::{Pipeline, PipelineSettings};
use crate::relevance::RelevanceHandle;
use crate::store::{FileStore, ResultStore};

pub use crate::api::{create_router, AppState};

/// Install the global subscriber. Filter comes from `RUST_LOG`, falling back to
/// `gaza_deal_tracker=info,warn`; `LOG_FORMAT=json` switches to JSON lines.
/// A subscriber that is already installed (e.g. by the hosting runtime) wins.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("gaza_deal_tracker=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Wire one HTTP feed provider per registered URL, the file store and the feed toggles.
pub fn build_pipeline(
    cfg: &AppConfig,
    registry: &SourceRegistry,
    relevance: RelevanceHandle,
) -> anyhow::Result<Pipeline> {
    let client = http_client(&cfg.user_agent, cfg.fetch_timeout)?;
    let sources: Vec<Arc<dyn SourceProvider>> = registry
        .feeds
        .iter()
        .map(|f| Arc::new(FeedProvider::from_url(f.url.clone(), client.clone())) as Arc<dyn SourceProvider>)
        .collect();

    let store: Arc<dyn ResultStore> = Arc::new(FileStore::new(&cfg.store_path));
    let settings = PipelineSettings {
        fetch_timeout: cfg.fetch_timeout,
        max_items: cfg.max_items,
        max_concurrent_fetches: cfg.max_concurrent_fetches,
        dedup: DedupParams {
            near_dup_threshold: cfg.near_dup_threshold,
        },
    };

    Ok(Pipeline::new(sources, relevance, store, settings)
        .with_toggles(FeedToggles::from_registry(registry)))
}
