// tests/common/mod.rs
//
// Shared mock providers and pipeline builders for the integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use gaza_deal_tracker::ingest::types::{FetchError, RawItem, SourceProvider};
use gaza_deal_tracker::ingest::{Pipeline, PipelineSettings};
use gaza_deal_tracker::news::ResultSet;
use gaza_deal_tracker::relevance::{RelevanceEngine, RelevanceHandle, SEED_RELEVANCE_TOML};
use gaza_deal_tracker::store::ResultStore;

pub fn seed_engine() -> RelevanceEngine {
    RelevanceEngine::from_toml_str(SEED_RELEVANCE_TOML).expect("seed policy parses")
}

pub fn seed_handle() -> RelevanceHandle {
    RelevanceHandle::new(seed_engine())
}

pub fn ts(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 6, h, m, 0).unwrap()
}

/// RSS-style raw item with an RFC 2822 date.
pub fn raw(title: &str, link: &str, at: Option<DateTime<Utc>>) -> RawItem {
    RawItem {
        title: title.to_string(),
        link: link.to_string(),
        published: at.map(|t| t.to_rfc2822()),
        summary: None,
    }
}

/// Returns a fixed list of items.
pub struct StaticProvider {
    pub name: String,
    pub items: Vec<RawItem>,
}

impl StaticProvider {
    pub fn new(name: &str, items: Vec<RawItem>) -> Arc<dyn SourceProvider> {
        Arc::new(Self {
            name: name.to_string(),
            items,
        })
    }
}

#[async_trait]
impl SourceProvider for StaticProvider {
    async fn fetch_latest(&self) -> Result<Vec<RawItem>, FetchError> {
        Ok(self.items.clone())
    }
    fn name(&self) -> &str {
        &self.name
    }
}

/// Always fails with an HTTP status error.
pub struct FailingProvider {
    pub name: String,
    pub status: u16,
}

impl FailingProvider {
    pub fn new(name: &str, status: u16) -> Arc<dyn SourceProvider> {
        Arc::new(Self {
            name: name.to_string(),
            status,
        })
    }
}

#[async_trait]
impl SourceProvider for FailingProvider {
    async fn fetch_latest(&self) -> Result<Vec<RawItem>, FetchError> {
        Err(FetchError::Status(self.status))
    }
    fn name(&self) -> &str {
        &self.name
    }
}

/// Sleeps before answering; used to trip the per-source timeout.
pub struct SlowProvider {
    pub name: String,
    pub delay: Duration,
    pub items: Vec<RawItem>,
}

impl SlowProvider {
    pub fn new(name: &str, delay: Duration, items: Vec<RawItem>) -> Arc<dyn SourceProvider> {
        Arc::new(Self {
            name: name.to_string(),
            delay,
            items,
        })
    }
}

#[async_trait]
impl SourceProvider for SlowProvider {
    async fn fetch_latest(&self) -> Result<Vec<RawItem>, FetchError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.items.clone())
    }
    fn name(&self) -> &str {
        &self.name
    }
}

/// Store that rejects every write.
pub struct BrokenStore;

#[async_trait]
impl ResultStore for BrokenStore {
    async fn latest(&self) -> anyhow::Result<ResultSet> {
        Ok(ResultSet::default())
    }
    async fn replace(&self, _result: &ResultSet) -> anyhow::Result<()> {
        anyhow::bail!("disk full")
    }
}

pub fn pipeline_with(
    sources: Vec<Arc<dyn SourceProvider>>,
    store: Arc<dyn ResultStore>,
    settings: PipelineSettings,
) -> Pipeline {
    Pipeline::new(sources, seed_handle(), store, settings)
}
