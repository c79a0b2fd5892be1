// src/ingest/config.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

const ENV_PATH: &str = "SOURCES_CONFIG_PATH";

/// Built-in registry, identical to the shipped `config/sources.toml`.
pub const SEED_SOURCES_TOML: &str = include_str!("../../config/sources.toml");

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedSpec {
    pub url: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl FeedSpec {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: None,
            enabled: true,
        }
    }
}

/// Ordered list of feed endpoints. Order is the merge order of a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceRegistry {
    pub feeds: Vec<FeedSpec>,
}

impl SourceRegistry {
    pub fn seed() -> Result<Self> {
        parse_toml(SEED_SOURCES_TOML).context("parsing built-in sources")
    }

    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.feeds.iter().map(|f| f.url.as_str())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.feeds.iter().any(|f| f.url == url)
    }
}

/// Load the registry from an explicit path. Supports TOML or JSON formats.
pub fn load_registry_from(path: &Path) -> Result<SourceRegistry> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading sources from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_registry(&content, ext.as_str())
        .with_context(|| format!("parsing sources from {}", path.display()))
}

/// Load the registry using env var + fallbacks:
/// 1) $SOURCES_CONFIG_PATH
/// 2) config/sources.toml
/// 3) config/sources.json
/// 4) built-in seed
pub fn load_registry_default() -> Result<SourceRegistry> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_registry_from(&pb);
        } else {
            return Err(anyhow!("SOURCES_CONFIG_PATH points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/sources.toml");
    if toml_p.exists() {
        return load_registry_from(&toml_p);
    }
    let json_p = PathBuf::from("config/sources.json");
    if json_p.exists() {
        return load_registry_from(&json_p);
    }
    SourceRegistry::seed()
}

fn parse_registry(s: &str, hint_ext: &str) -> Result<SourceRegistry> {
    match hint_ext {
        "toml" => parse_toml(s),
        "json" => parse_json(s),
        _ => parse_toml(s).or_else(|_| parse_json(s)),
    }
}

fn parse_toml(s: &str) -> Result<SourceRegistry> {
    let v: SourceRegistry = toml::from_str(s)?;
    clean_registry(v.feeds)
}

/// JSON accepts either `{"feeds": [...]}` or a bare array of URLs.
fn parse_json(s: &str) -> Result<SourceRegistry> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum JsonRegistry {
        Full(SourceRegistry),
        Urls(Vec<String>),
    }
    let feeds = match serde_json::from_str::<JsonRegistry>(s)? {
        JsonRegistry::Full(r) => r.feeds,
        JsonRegistry::Urls(urls) => urls.into_iter().map(FeedSpec::new).collect(),
    };
    clean_registry(feeds)
}

/// Trim, drop blanks, drop repeated URLs (first occurrence wins), validate.
fn clean_registry(items: Vec<FeedSpec>) -> Result<SourceRegistry> {
    let mut seen = HashSet::new();
    let mut feeds = Vec::with_capacity(items.len());
    for mut f in items {
        f.url = f.url.trim().to_string();
        if f.url.is_empty() || !seen.insert(f.url.clone()) {
            continue;
        }
        match url::Url::parse(&f.url) {
            Ok(u) if matches!(u.scheme(), "http" | "https") => {}
            _ => bail!("invalid feed url `{}`", f.url),
        }
        feeds.push(f);
    }
    Ok(SourceRegistry { feeds })
}
