// src/ingest/mod.rs
//! Run orchestration: fetch every enabled source concurrently, gate items through the
//! relevance engine, rank + deduplicate, finalize, persist.
//!
//! A run never reads the previously stored result; it is a pure function of the
//! current feed contents and the configured policy.

pub mod config;
pub mod diagnostics;
pub mod providers;
pub mod scheduler;
pub mod toggles;
pub mod types;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;
use tokio::sync::{Mutex, Semaphore};

use crate::dedup::{rank_and_dedup, DedupParams};
use crate::ingest::diagnostics::{PersistError, RunDiagnostics, RunReport, SourceOutcome, SourceReport};
use crate::ingest::toggles::FeedToggles;
use crate::ingest::types::{FetchError, RawItem, SourceProvider};
use crate::news::{build_result_set, CanonicalItem, DEFAULT_MAX_ITEMS};
use crate::relevance::{fold_quotes, RelevanceEngine, RelevanceHandle, Verdict};
use crate::store::ResultStore;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 8;

/// Register help text for the ingest series. Must run after the recorder is
/// installed; descriptions sent to the no-op recorder are lost.
pub fn describe_ingest_metrics() {
    describe_counter!("ingest_runs_total", "Completed pipeline runs.");
    describe_counter!(
        "ingest_raw_items_total",
        "Items parsed from feeds before filtering."
    );
    describe_counter!(
        "ingest_filtered_total",
        "Items rejected by the relevance gate."
    );
    describe_counter!(
        "ingest_dedup_total",
        "Items removed as exact-link or near-title duplicates."
    );
    describe_counter!(
        "ingest_source_errors_total",
        "Per-source fetch/parse failures, timeouts included."
    );
    describe_histogram!("ingest_fetch_ms", "Per-source fetch time in milliseconds.");
    describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
    describe_gauge!("ingest_last_run_ts", "Unix ts when the pipeline last completed.");
    describe_gauge!("ingest_result_items", "Items in the last stored result set.");
}

/// Plain-text snippet from feed markup: decode entities, strip tags, collapse whitespace.
pub fn snippet(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = fold_quotes(&out);

    // 4) Collapse whitespace (no length cap: the gate must see the whole text)
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    re_ws.replace_all(&out, " ").trim().to_string()
}

/// Parse a feed timestamp (RFC 2822 for RSS, RFC 3339 for Atom). Unparseable → `None`.
pub fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    let parsed = OffsetDateTime::parse(s, &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(s, &Rfc3339))
        .ok()
        .and_then(|dt| DateTime::from_timestamp(dt.unix_timestamp(), dt.nanosecond()));
    // chrono is more lenient with legacy zone names ("EST", "PDT").
    parsed
        .or_else(|| DateTime::parse_from_rfc2822(s).ok().map(|d| d.with_timezone(&Utc)))
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|d| d.with_timezone(&Utc)))
}

/// Build the canonical form of an item that passed the gate.
pub fn canonicalize(raw: RawItem, domain: String) -> CanonicalItem {
    CanonicalItem {
        title: raw.title.trim().to_string(),
        link: raw.link.trim().to_string(),
        domain,
        published: raw.published.as_deref().and_then(parse_published),
        summary: raw
            .summary
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
    }
}

/// Gate one source's raw items. Returns the survivors and the rejected count.
pub fn filter_items(engine: &RelevanceEngine, raw: Vec<RawItem>) -> (Vec<CanonicalItem>, usize) {
    let mut kept = Vec::with_capacity(raw.len());
    let mut rejected = 0usize;
    for item in raw {
        match engine.evaluate(&item) {
            Verdict::Accepted { domain, .. } => kept.push(canonicalize(item, domain)),
            Verdict::Rejected(_) => rejected += 1,
        }
    }
    (kept, rejected)
}

#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub fetch_timeout: Duration,
    pub max_items: usize,
    pub max_concurrent_fetches: usize,
    pub dedup: DedupParams,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            max_items: DEFAULT_MAX_ITEMS,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            dedup: DedupParams::default(),
        }
    }
}

enum Fetched {
    Items(Vec<RawItem>),
    Failed(FetchError),
    Disabled,
}

struct SourceFetch {
    source: String,
    fetched: Fetched,
    elapsed: Duration,
}

pub struct Pipeline {
    sources: Vec<Arc<dyn SourceProvider>>,
    relevance: RelevanceHandle,
    store: Arc<dyn ResultStore>,
    toggles: FeedToggles,
    settings: PipelineSettings,
    run_lock: Mutex<()>,
}

impl Pipeline {
    pub fn new(
        sources: Vec<Arc<dyn SourceProvider>>,
        relevance: RelevanceHandle,
        store: Arc<dyn ResultStore>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            sources,
            relevance,
            store,
            toggles: FeedToggles::default(),
            settings,
            run_lock: Mutex::new(()),
        }
    }

    pub fn with_toggles(mut self, toggles: FeedToggles) -> Self {
        self.toggles = toggles;
        self
    }

    pub fn toggles(&self) -> &FeedToggles {
        &self.toggles
    }

    pub fn store(&self) -> Arc<dyn ResultStore> {
        Arc::clone(&self.store)
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Execute one full run. Overlapping calls are serialized.
    ///
    /// Source failures never fail the run; only the store can.
    pub async fn run(&self) -> Result<RunReport, PersistError> {
        let _guard = self.run_lock.lock().await;
        let started = Instant::now();
        let engine = self.relevance.snapshot();

        // Fetching
        let fetched = self.fetch_all().await;

        // Filtering (merge keeps registry order)
        let mut reports = Vec::with_capacity(fetched.len());
        let mut merged = Vec::new();
        let mut raw_count = 0usize;
        let mut filtered_out = 0usize;
        for f in fetched {
            let outcome = match f.fetched {
                Fetched::Disabled => SourceOutcome::Disabled,
                Fetched::Failed(e) => {
                    tracing::warn!(target: "ingest", source = %f.source, error = %e, "source failed");
                    counter!("ingest_source_errors_total").increment(1);
                    SourceOutcome::Failed {
                        error: e.to_string(),
                    }
                }
                Fetched::Items(items) => {
                    let n = items.len();
                    raw_count += n;
                    let (kept, rejected) = filter_items(&engine, items);
                    filtered_out += rejected;
                    tracing::debug!(target: "ingest", source = %f.source, fetched = n, kept = kept.len(), "source ok");
                    let outcome = SourceOutcome::Ok {
                        fetched: n,
                        kept: kept.len(),
                    };
                    merged.extend(kept);
                    outcome
                }
            };
            reports.push(SourceReport {
                source: f.source,
                outcome,
                elapsed_ms: f.elapsed.as_millis() as u64,
            });
        }

        // Merging / deduplicating
        let relevant = merged.len();
        let dedup = rank_and_dedup(merged, &self.settings.dedup);
        let unique_count = dedup.unique.len();

        // Finalizing
        let now = Utc::now();
        let result = build_result_set(dedup.unique, self.settings.max_items, now);
        let diagnostics = RunDiagnostics {
            sources: reports,
            raw_count,
            filtered_out,
            duplicates_removed: relevant - unique_count,
            unique_count,
            returned_count: result.items.len(),
            placeholder: unique_count == 0,
            generated_at: now,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        counter!("ingest_runs_total").increment(1);
        counter!("ingest_filtered_total").increment(filtered_out as u64);
        counter!("ingest_dedup_total").increment(diagnostics.duplicates_removed as u64);

        let report = RunReport {
            result,
            diagnostics,
        };

        if let Err(e) = self.store.replace(&report.result).await {
            tracing::error!(target: "ingest", error = %format!("{e:#}"), "persisting result set failed");
            return Err(PersistError {
                message: format!("{e:#}"),
                report: Box::new(report),
            });
        }

        gauge!("ingest_last_run_ts").set(now.timestamp() as f64);
        gauge!("ingest_result_items").set(report.result.items.len() as f64);

        let d = &report.diagnostics;
        tracing::info!(
            target: "ingest",
            sources = d.sources.len(),
            failed = d.failures(),
            raw = d.raw_count,
            filtered = d.filtered_out,
            unique = d.unique_count,
            returned = d.returned_count,
            placeholder = d.placeholder,
            elapsed_ms = d.elapsed_ms,
            "pipeline run complete"
        );

        Ok(report)
    }

    /// One task per enabled source, bounded by a semaphore. Results come back in
    /// registry order regardless of completion order.
    async fn fetch_all(&self) -> Vec<SourceFetch> {
        let permits = Arc::new(Semaphore::new(self.settings.max_concurrent_fetches.max(1)));
        let timeout = self.settings.fetch_timeout;

        let mut pending = Vec::with_capacity(self.sources.len());
        for src in &self.sources {
            let name = src.name().to_string();
            if !self.toggles.is_enabled(&name) {
                pending.push((name, None));
                continue;
            }
            let src = Arc::clone(src);
            let permits = Arc::clone(&permits);
            let handle = tokio::spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                let t0 = Instant::now();
                let res = match tokio::time::timeout(timeout, src.fetch_latest()).await {
                    Ok(r) => r,
                    Err(_) => Err(FetchError::Timeout(timeout)),
                };
                let elapsed = t0.elapsed();
                histogram!("ingest_fetch_ms").record(elapsed.as_secs_f64() * 1_000.0);
                (res, elapsed)
            });
            pending.push((name, Some(handle)));
        }

        let mut out = Vec::with_capacity(pending.len());
        for (source, handle) in pending {
            let (fetched, elapsed) = match handle {
                None => (Fetched::Disabled, Duration::ZERO),
                Some(h) => match h.await {
                    Ok((Ok(items), el)) => (Fetched::Items(items), el),
                    Ok((Err(e), el)) => (Fetched::Failed(e), el),
                    Err(join) => (
                        Fetched::Failed(FetchError::Aborted(join.to_string())),
                        Duration::ZERO,
                    ),
                },
            };
            out.push(SourceFetch {
                source,
                fetched,
                elapsed,
            });
        }
        out
    }
}
