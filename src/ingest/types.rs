// src/ingest/types.rs
use std::time::Duration;

/// One entry exactly as a feed emitted it. Lives only for the duration of a run.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct RawItem {
    pub title: String,             // untrimmed
    pub link: String,              // may be relative, empty or garbage
    pub published: Option<String>, // RFC 2822 (RSS) or RFC 3339 (Atom), unparsed
    pub summary: Option<String>,   // plain-text snippet
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected http status {0}")]
    Status(u16),

    #[error("feed parse error: {0}")]
    Parse(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("fetch task aborted: {0}")]
    Aborted(String),
}

/// A single feed endpoint. Implementations must be cheap to share across tasks.
#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<RawItem>, FetchError>;

    /// Stable identifier used in diagnostics and feed toggles (the endpoint URL).
    fn name(&self) -> &str;
}
