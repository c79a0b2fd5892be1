// src/config/app.rs
use std::path::PathBuf;
use std::time::Duration;

use crate::dedup::DEFAULT_NEAR_DUP_THRESHOLD;
use crate::ingest::{DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_CONCURRENT_FETCHES};
use crate::news::DEFAULT_MAX_ITEMS;
use crate::store::DEFAULT_STORE_PATH;

pub const DEFAULT_USER_AGENT: &str = concat!("gaza-deal-tracker/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 300;

/// Process-level settings, read once at startup from the environment (and `.env`).
/// Unparseable values fall back to defaults instead of failing boot.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store_path: PathBuf,
    pub fetch_timeout: Duration,
    pub max_items: usize,
    pub near_dup_threshold: usize,
    pub max_concurrent_fetches: usize,
    /// `None` disables the built-in scheduler (runs only via POST /api/refresh).
    pub refresh_interval: Option<Duration>,
    pub user_agent: String,
    pub metrics_enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            max_items: DEFAULT_MAX_ITEMS,
            near_dup_threshold: DEFAULT_NEAR_DUP_THRESHOLD,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            refresh_interval: Some(Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS)),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            metrics_enabled: false,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl AppConfig {
    pub fn from_env() -> Self {
        let d = Self::default();

        let refresh_interval = match env_parse::<u64>("REFRESH_INTERVAL_SECS") {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => d.refresh_interval,
        };

        Self {
            store_path: std::env::var("NEWS_STORE_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(d.store_path),
            fetch_timeout: env_parse::<u64>("FETCH_TIMEOUT_SECS")
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(d.fetch_timeout),
            max_items: env_parse("MAX_ITEMS")
                .filter(|n| *n > 0)
                .unwrap_or(d.max_items),
            near_dup_threshold: env_parse("NEAR_DUP_THRESHOLD").unwrap_or(d.near_dup_threshold),
            max_concurrent_fetches: env_parse("MAX_CONCURRENT_FETCHES")
                .filter(|n| *n > 0)
                .unwrap_or(d.max_concurrent_fetches),
            refresh_interval,
            user_agent: std::env::var("FETCH_USER_AGENT")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(d.user_agent),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(d.metrics_enabled),
        }
    }
}
