// src/ingest/providers/mod.rs
pub mod rss;

use std::time::Duration;

use anyhow::{Context, Result};

/// Shared HTTP client for all feed fetches: fixed user agent, per-request timeout.
pub fn http_client(user_agent: &str, timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .context("building feed http client")
}
