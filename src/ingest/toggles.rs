// src/ingest/toggles.rs
//! Runtime enable/disable switches for registered feeds.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::ingest::config::SourceRegistry;

#[derive(Clone, Debug, Default)]
pub struct FeedToggles {
    // Registry order is kept; lookups are linear but the list is tiny.
    inner: Arc<RwLock<Vec<(String, bool)>>>,
}

impl FeedToggles {
    pub fn from_registry(reg: &SourceRegistry) -> Self {
        let v = reg
            .feeds
            .iter()
            .map(|f| (f.url.clone(), f.enabled))
            .collect();
        Self {
            inner: Arc::new(RwLock::new(v)),
        }
    }

    /// Unregistered names count as enabled.
    pub fn is_enabled(&self, url: &str) -> bool {
        self.read()
            .iter()
            .find(|(u, _)| u == url)
            .map(|(_, on)| *on)
            .unwrap_or(true)
    }

    pub fn snapshot(&self) -> Vec<(String, bool)> {
        self.read().clone()
    }

    pub fn as_map(&self) -> BTreeMap<String, bool> {
        self.read().iter().cloned().collect()
    }

    pub fn total(&self) -> usize {
        self.read().len()
    }

    pub fn enabled_count(&self) -> usize {
        self.read().iter().filter(|(_, on)| *on).count()
    }

    /// Apply a partial update. Unknown feeds reject the whole update and are returned.
    pub fn apply(&self, updates: &BTreeMap<String, bool>) -> Result<(), Vec<String>> {
        let mut g = match self.inner.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let unknown: Vec<String> = updates
            .keys()
            .filter(|k| !g.iter().any(|(u, _)| u == *k))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(unknown);
        }
        for (url, on) in g.iter_mut() {
            if let Some(v) = updates.get(url) {
                *on = *v;
            }
        }
        Ok(())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<(String, bool)>> {
        match self.inner.read() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
