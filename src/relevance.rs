// src/relevance.rs
//! Relevance gate: publisher allow-list, exclusion terms, keyword phrases, and the
//! entity+context fallback.
//!
//! Evaluation order for one item:
//! 1. link → host (lowercase, leading `www.` removed) must be on the allow-list
//! 2. lowercase(title + " " + summary) must not contain any exclusion term
//! 3. accept on any keyword phrase; otherwise require one entity AND one context term
//!
//! All matching is substring containment on the lowercased text, so `negotiat`
//! matches "negotiations" and "negotiators" alike.

use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, SystemTime};
use tracing::info;
use url::Url;

use crate::ingest::types::RawItem;

// --- env defaults & names ---
pub const DEFAULT_RELEVANCE_CONFIG_PATH: &str = "config/relevance.toml";
pub const ENV_RELEVANCE_CONFIG_PATH: &str = "RELEVANCE_CONFIG_PATH";

/// Built-in policy, identical to the shipped `config/relevance.toml`.
pub const SEED_RELEVANCE_TOML: &str = include_str!("../config/relevance.toml");

// Dev logging gate: RELEVANCE_DEV_LOG=1 AND dev env (debug or SHUTTLE_ENV in {local,development,dev})
pub(crate) fn dev_logging_enabled() -> bool {
    let on = std::env::var("RELEVANCE_DEV_LOG").ok().as_deref() == Some("1");
    if !on {
        return false;
    }
    is_dev_env()
}

pub(crate) fn is_dev_env() -> bool {
    if cfg!(debug_assertions) {
        return true;
    }
    matches!(
        std::env::var("SHUTTLE_ENV")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str(),
        "local" | "development" | "dev"
    )
}

pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Minimal, anonymized dev logger for relevance verdicts. Never logs raw text.
fn dev_log_verdict(text: &str, verdict: &Verdict) {
    if !dev_logging_enabled() {
        return;
    }
    let id = anon_hash(text);
    info!(target: "relevance", %id, verdict = ?verdict, "relevance verdict");
}

/* ----------------------------
Config schema (from TOML)
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
pub struct RelevanceConfig {
    pub domains: DomainsCfg,
    pub vocabulary: VocabularyCfg,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DomainsCfg {
    /// Bare publisher hostnames, no scheme or path.
    pub allow: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VocabularyCfg {
    /// High-precision phrases; any hit accepts.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Any hit rejects, regardless of keywords.
    #[serde(default)]
    pub exclusions: Vec<String>,
    /// Core geographic/political terms for the fallback path.
    #[serde(default)]
    pub entities: Vec<String>,
    /// Deal/conflict vocabulary for the fallback path.
    #[serde(default)]
    pub contexts: Vec<String>,
}

/* ----------------------------
Verdicts
---------------------------- */

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted { domain: String, matched: MatchRule },
    Rejected(Rejection),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchRule {
    Keyword(String),
    EntityContext { entity: String, context: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Link missing, unparseable, or hostless.
    BadLink,
    DomainNotAllowed(String),
    Excluded(String),
    OffTopic,
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted { .. })
    }
}

/// Normalized publisher host for a link: lowercase, one leading `www.` removed.
pub fn publisher_domain(link: &str) -> Option<String> {
    let url = Url::parse(link.trim()).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

/// Typographic quotes to ASCII so `trump's` matches `Trump’s`.
pub fn fold_quotes(s: &str) -> String {
    s.replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
}

/* ----------------------------
Compiled engine
---------------------------- */

/// Lowercased, deduplicated term list. Surrounding spaces are significant (`" ai "`
/// must not match "said"), so terms are not trimmed. Sorted so the reported match
/// is stable across reloads.
fn clean_terms(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|t| t.to_lowercase())
        .filter(|t| !t.trim().is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn first_hit<'a>(text: &str, terms: &'a [String]) -> Option<&'a str> {
    terms.iter().find(|t| text.contains(t.as_str())).map(String::as_str)
}

#[derive(Debug)]
pub struct RelevanceEngine {
    allow: BTreeSet<String>,
    keywords: Vec<String>,
    exclusions: Vec<String>,
    entities: Vec<String>,
    contexts: Vec<String>,
}

impl RelevanceEngine {
    pub fn new(cfg: &RelevanceConfig) -> Self {
        let allow = cfg
            .domains
            .allow
            .iter()
            .map(|d| d.trim().to_ascii_lowercase())
            .map(|d| d.strip_prefix("www.").map(str::to_string).unwrap_or(d))
            .filter(|d| !d.is_empty())
            .collect();
        Self {
            allow,
            keywords: clean_terms(&cfg.vocabulary.keywords),
            exclusions: clean_terms(&cfg.vocabulary.exclusions),
            entities: clean_terms(&cfg.vocabulary.entities),
            contexts: clean_terms(&cfg.vocabulary.contexts),
        }
    }

    /// Load from `$RELEVANCE_CONFIG_PATH` or `config/relevance.toml`.
    /// A missing file falls back to the built-in seed; an invalid one is an error.
    pub fn from_toml() -> anyhow::Result<Self> {
        let path = std::env::var(ENV_RELEVANCE_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_RELEVANCE_CONFIG_PATH));

        if !path.exists() {
            tracing::warn!(
                target: "relevance",
                path = %path.display(),
                "relevance config not found, using built-in policy"
            );
            return Self::from_toml_str(SEED_RELEVANCE_TOML);
        }
        Self::from_path(&path)
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!(
                "Failed to read relevance config at {}: {}",
                path.display(),
                e
            )
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        let cfg: RelevanceConfig = toml::from_str(toml_str)?;
        if cfg.domains.allow.is_empty() {
            anyhow::bail!("relevance config: [domains].allow must not be empty");
        }
        Ok(Self::new(&cfg))
    }

    pub fn allowed_domains(&self) -> impl Iterator<Item = &str> {
        self.allow.iter().map(String::as_str)
    }

    pub fn is_allowed_domain(&self, domain: &str) -> bool {
        self.allow.contains(domain)
    }

    /// Topical part of the gate on already-lowercased text.
    pub fn classify_text(&self, lower: &str) -> Result<MatchRule, Rejection> {
        if let Some(term) = first_hit(lower, &self.exclusions) {
            return Err(Rejection::Excluded(term.to_string()));
        }
        if let Some(kw) = first_hit(lower, &self.keywords) {
            return Ok(MatchRule::Keyword(kw.to_string()));
        }
        match (
            first_hit(lower, &self.entities),
            first_hit(lower, &self.contexts),
        ) {
            (Some(entity), Some(context)) => Ok(MatchRule::EntityContext {
                entity: entity.to_string(),
                context: context.to_string(),
            }),
            _ => Err(Rejection::OffTopic),
        }
    }

    pub fn evaluate_parts(&self, title: &str, summary: &str, link: &str) -> Verdict {
        let domain = match publisher_domain(link) {
            Some(d) => d,
            None => return Verdict::Rejected(Rejection::BadLink),
        };
        if !self.is_allowed_domain(&domain) {
            return Verdict::Rejected(Rejection::DomainNotAllowed(domain));
        }

        let text = fold_quotes(&format!("{} {}", title.trim(), summary.trim()).to_lowercase());
        let verdict = match self.classify_text(&text) {
            Ok(matched) => Verdict::Accepted { domain, matched },
            Err(r) => Verdict::Rejected(r),
        };
        dev_log_verdict(&text, &verdict);
        verdict
    }

    pub fn evaluate(&self, raw: &RawItem) -> Verdict {
        self.evaluate_parts(
            &raw.title,
            raw.summary.as_deref().unwrap_or_default(),
            &raw.link,
        )
    }

    pub fn accepts(&self, raw: &RawItem) -> bool {
        self.evaluate(raw).is_accepted()
    }
}

/* ----------------------------
Thread-safe handle + hot reload
---------------------------- */

/// Shared handle to the current engine. A run takes one `snapshot()` and uses it
/// throughout, so a reload never splits a run across two policies.
#[derive(Clone)]
pub struct RelevanceHandle {
    inner: Arc<RwLock<Arc<RelevanceEngine>>>,
}

impl RelevanceHandle {
    pub fn new(engine: RelevanceEngine) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(engine))),
        }
    }

    pub fn snapshot(&self) -> Arc<RelevanceEngine> {
        match self.inner.read() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn replace(&self, engine: RelevanceEngine) {
        match self.inner.write() {
            Ok(mut g) => *g = Arc::new(engine),
            Err(poisoned) => *poisoned.into_inner() = Arc::new(engine),
        }
    }

    pub fn evaluate(&self, raw: &RawItem) -> Verdict {
        self.snapshot().evaluate(raw)
    }
}

/// Returns true if we should enable hot reload (dev/local only).
fn hot_reload_enabled() -> bool {
    let want = std::env::var("RELEVANCE_HOT_RELOAD")
        .ok()
        .map(|v| v == "1")
        .unwrap_or(false);
    want && is_dev_env()
}

/// Start a simple polling watcher on `path` that swaps the engine on mtime change.
/// Polls every 2s. Invalid files are logged and ignored.
pub fn start_hot_reload_thread(handle: RelevanceHandle, path: PathBuf) {
    if !hot_reload_enabled() {
        return;
    }

    thread::spawn(move || {
        let poll = Duration::from_secs(2);
        let mut last_mtime: Option<SystemTime> = None;

        loop {
            if let Ok(mtime) = fs::metadata(&path).and_then(|m| m.modified()) {
                let changed = match last_mtime {
                    None => false,
                    Some(prev) => mtime > prev,
                };
                if changed {
                    match RelevanceEngine::from_path(&path) {
                        Ok(engine) => {
                            handle.replace(engine);
                            info!(target: "relevance", path = %path.display(), "relevance config reloaded");
                        }
                        Err(e) => {
                            tracing::warn!(target: "relevance", error = %e, "relevance reload rejected");
                        }
                    }
                }
                last_mtime = Some(mtime);
            }
            thread::sleep(poll);
        }
    });
}

/* ----------------------------
Tests
---------------------------- */

#[cfg(test)]
mod tests {
    use super::*;

    // Deliberately small policy: "hamas" and "gaza" are NOT keywords here, so the
    // fallback path is observable.
    const TEST_TOML: &str = r#"
[domains]
allow = ["reuters.com", "WWW.apnews.com", " axios.com "]

[vocabulary]
keywords = ["gaza ceasefire", "hostage deal", "negotiat"]
exclusions = ["football", "box office"]
entities = ["Israel", "hamas", "gaza", "qatar"]
contexts = ["ceasefire", "hostage", "attack", "proposal"]
"#;

    fn eng() -> RelevanceEngine {
        RelevanceEngine::from_toml_str(TEST_TOML).expect("test toml")
    }

    fn raw(title: &str, summary: Option<&str>, link: &str) -> RawItem {
        RawItem {
            title: title.into(),
            link: link.into(),
            published: None,
            summary: summary.map(str::to_string),
        }
    }

    #[test]
    fn domain_normalization() {
        assert_eq!(
            publisher_domain("https://www.Reuters.com/world/x").as_deref(),
            Some("reuters.com")
        );
        assert_eq!(
            publisher_domain("https://edition.cnn.com/a").as_deref(),
            Some("edition.cnn.com")
        );
        assert_eq!(publisher_domain("/relative/path"), None);
        assert_eq!(publisher_domain(""), None);
    }

    #[test]
    fn allow_list_entries_are_normalized() {
        let e = eng();
        let domains: Vec<_> = e.allowed_domains().collect();
        assert_eq!(domains, vec!["apnews.com", "axios.com", "reuters.com"]);
    }

    #[test]
    fn bad_link_is_rejected_before_text() {
        let e = eng();
        let v = e.evaluate(&raw("Gaza ceasefire holds", None, "not a url"));
        assert_eq!(v, Verdict::Rejected(Rejection::BadLink));
    }

    #[test]
    fn keyword_stem_matches_inside_words() {
        let e = eng();
        let v = e.evaluate(&raw(
            "Negotiators return to Cairo",
            None,
            "https://apnews.com/article/1",
        ));
        assert_eq!(
            v,
            Verdict::Accepted {
                domain: "apnews.com".into(),
                matched: MatchRule::Keyword("negotiat".into())
            }
        );
    }

    #[test]
    fn summary_participates_in_matching() {
        let e = eng();
        let v = e.evaluate(&raw(
            "Talks resume",
            Some("  Officials discuss a hostage deal.  "),
            "https://www.axios.com/x",
        ));
        assert!(v.is_accepted());
    }

    #[test]
    fn entity_without_context_is_off_topic() {
        let e = eng();
        let v = e.evaluate(&raw(
            "Qatar hosts trade fair",
            None,
            "https://www.reuters.com/business/x",
        ));
        assert_eq!(v, Verdict::Rejected(Rejection::OffTopic));
    }

    #[test]
    fn padded_terms_keep_their_spaces() {
        let e = RelevanceEngine::from_toml_str(
            r#"
[domains]
allow = ["reuters.com"]
[vocabulary]
keywords = ["gaza"]
exclusions = [" ai "]
"#,
        )
        .unwrap();
        let link = "https://www.reuters.com/world/x";
        assert!(e.evaluate_parts("Gaza official said talks resume", "", link).is_accepted());
        assert_eq!(
            e.evaluate_parts("Gaza drone footage analysed by AI tools", "", link),
            Verdict::Rejected(Rejection::Excluded(" ai ".into()))
        );
    }

    #[test]
    fn curly_apostrophe_in_title_matches_ascii_keyword() {
        let e = RelevanceEngine::from_toml_str(SEED_RELEVANCE_TOML).unwrap();
        let v = e.evaluate_parts("Trump\u{2019}s Gaza proposal", "", "https://www.axios.com/a");
        assert_eq!(
            v,
            Verdict::Accepted {
                domain: "axios.com".into(),
                matched: MatchRule::Keyword("trump's gaza".into())
            }
        );
    }

    #[test]
    fn exclusion_beats_keyword() {
        let e = eng();
        let v = e.evaluate(&raw(
            "Gaza ceasefire celebrated at football final",
            None,
            "https://www.reuters.com/sports/x",
        ));
        assert_eq!(v, Verdict::Rejected(Rejection::Excluded("football".into())));
    }

    #[test]
    fn handle_snapshot_survives_replace() {
        let h = RelevanceHandle::new(eng());
        let before = h.snapshot();
        h.replace(
            RelevanceEngine::from_toml_str(
                r#"
[domains]
allow = ["bbc.com"]
[vocabulary]
keywords = ["gaza"]
"#,
            )
            .unwrap(),
        );
        assert!(before.is_allowed_domain("reuters.com"));
        assert!(!h.snapshot().is_allowed_domain("reuters.com"));
        assert!(h.snapshot().is_allowed_domain("bbc.com"));
    }

    #[test]
    fn empty_allow_list_is_a_config_error() {
        let err = RelevanceEngine::from_toml_str(
            r#"
[domains]
allow = []
[vocabulary]
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("allow"));
    }

    #[test]
    fn seed_policy_parses() {
        let e = RelevanceEngine::from_toml_str(SEED_RELEVANCE_TOML).expect("seed");
        assert!(e.is_allowed_domain("reuters.com"));
        assert!(e.is_allowed_domain("timesofisrael.com"));
    }
}
