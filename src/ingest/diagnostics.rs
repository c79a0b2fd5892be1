// src/ingest/diagnostics.rs
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::news::ResultSet;

/// What happened to one source during a run.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceOutcome {
    Ok { fetched: usize, kept: usize },
    Failed { error: String },
    Disabled,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SourceReport {
    pub source: String,
    #[serde(flatten)]
    pub outcome: SourceOutcome,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunDiagnostics {
    /// One entry per registered source, in registry order.
    pub sources: Vec<SourceReport>,
    /// Items parsed from all sources before filtering.
    pub raw_count: usize,
    /// Items rejected by the relevance gate.
    pub filtered_out: usize,
    pub duplicates_removed: usize,
    /// Deduplicated count before truncation.
    pub unique_count: usize,
    /// Items in the stored result set (the placeholder counts as one).
    pub returned_count: usize,
    pub placeholder: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub generated_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl RunDiagnostics {
    pub fn failures(&self) -> usize {
        self.count(|o| matches!(o, SourceOutcome::Failed { .. }))
    }

    pub fn successes(&self) -> usize {
        self.count(|o| matches!(o, SourceOutcome::Ok { .. }))
    }

    pub fn disabled(&self) -> usize {
        self.count(|o| matches!(o, SourceOutcome::Disabled))
    }

    /// Sources that were actually fetched (successfully or not).
    pub fn attempted(&self) -> usize {
        self.sources.len() - self.disabled()
    }

    fn count(&self, pred: impl Fn(&SourceOutcome) -> bool) -> usize {
        self.sources.iter().filter(|s| pred(&s.outcome)).count()
    }
}

/// Outcome of a run handed back to the trigger.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub result: ResultSet,
    pub diagnostics: RunDiagnostics,
}

/// The run computed a result but the store rejected it. The computed report is
/// carried along so callers can still show what happened.
#[derive(Debug, thiserror::Error)]
#[error("run completed but the result could not be persisted: {message}")]
pub struct PersistError {
    pub message: String,
    pub report: Box<RunReport>,
}
