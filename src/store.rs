//! Storage for the latest result set.
//!
//! A run replaces the stored value wholesale. Reading before anything was written is
//! not an error: `latest()` then returns `ResultSet::default()`.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tokio::fs;

use crate::news::ResultSet;

pub const DEFAULT_STORE_PATH: &str = "/tmp/news.json";

#[async_trait::async_trait]
pub trait ResultStore: Send + Sync {
    async fn latest(&self) -> Result<ResultSet>;
    /// Whole-value replacement; readers see either the old or the new set.
    async fn replace(&self, result: &ResultSet) -> Result<()>;
}

/// JSON file on disk. Writes go to a sibling temp file and are renamed into place.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "news.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait::async_trait]
impl ResultStore for FileStore {
    async fn latest(&self) -> Result<ResultSet> {
        let bytes = match fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ResultSet::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.path.display()));
            }
        };
        serde_json::from_slice(&bytes)
            .with_context(|| format!("decoding stored result set {}", self.path.display()))
    }

    async fn replace(&self, result: &ResultSet) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        let body = serde_json::to_vec(result).context("encoding result set")?;
        let tmp = self.tmp_path();
        fs::write(&tmp, body)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("renaming into {}", self.path.display()))?;
        tracing::debug!(
            target: "store",
            path = %self.path.display(),
            items = result.items.len(),
            "result set stored"
        );
        Ok(())
    }
}

/// In-process store for tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Option<ResultSet>>,
    writes: std::sync::atomic::AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Successful `replace` calls so far.
    pub fn writes(&self) -> usize {
        self.writes.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ResultStore for MemoryStore {
    async fn latest(&self) -> Result<ResultSet> {
        let g = self
            .inner
            .read()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        Ok(g.clone().unwrap_or_default())
    }

    async fn replace(&self, result: &ResultSet) -> Result<()> {
        let mut g = self
            .inner
            .write()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        *g = Some(result.clone());
        self.writes
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }
}
