//! Cross-source deduplication and recency ranking.
//!
//! Items from all sources are stably sorted newest-first (undated items rank as the
//! epoch), then walked once. Each candidate is compared only against items already
//! accepted, so when several outlets carry the same story the newest copy is the one
//! that survives.
//!
//! A candidate is dropped when:
//! - its link equals an accepted item's link, or
//! - its title is within `near_dup_threshold` Levenshtein edits of an accepted title
//!   (raw, case-sensitive, strictly less than the threshold).

use crate::news::CanonicalItem;

/// Edit distance below which two titles are treated as the same story.
/// Empirical; calibrate against real headline data before changing.
pub const DEFAULT_NEAR_DUP_THRESHOLD: usize = 10;

#[derive(Clone, Debug)]
pub struct DedupParams {
    pub near_dup_threshold: usize,
}

impl Default for DedupParams {
    fn default() -> Self {
        Self {
            near_dup_threshold: DEFAULT_NEAR_DUP_THRESHOLD,
        }
    }
}

/// Why a candidate was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DupKind {
    SameLink,
    NearTitle,
}

#[derive(Debug, Default)]
pub struct DedupOutcome {
    /// Newest-first, duplicate-free.
    pub unique: Vec<CanonicalItem>,
    pub same_link: usize,
    pub near_title: usize,
}

impl DedupOutcome {
    pub fn dropped(&self) -> usize {
        self.same_link + self.near_title
    }
}

/// Sort newest-first. Stable, so equal keys keep merge order.
pub fn rank_by_recency(items: &mut [CanonicalItem]) {
    items.sort_by_key(|it| std::cmp::Reverse(it.sort_key()));
}

/// Check a candidate against the accepted accumulator.
fn duplicate_of(accepted: &[CanonicalItem], cand: &CanonicalItem, threshold: usize) -> Option<DupKind> {
    if accepted.iter().any(|u| u.link == cand.link) {
        return Some(DupKind::SameLink);
    }
    if accepted
        .iter()
        .any(|u| strsim::levenshtein(&u.title, &cand.title) < threshold)
    {
        return Some(DupKind::NearTitle);
    }
    None
}

/// Greedy single pass over already-ranked input.
pub fn dedup_ranked(ranked: Vec<CanonicalItem>, params: &DedupParams) -> DedupOutcome {
    let mut out = DedupOutcome {
        unique: Vec::with_capacity(ranked.len()),
        ..Default::default()
    };
    for cand in ranked {
        match duplicate_of(&out.unique, &cand, params.near_dup_threshold) {
            Some(DupKind::SameLink) => out.same_link += 1,
            Some(DupKind::NearTitle) => out.near_title += 1,
            None => out.unique.push(cand),
        }
    }
    out
}

/// Rank then deduplicate merged multi-source items.
pub fn rank_and_dedup(mut merged: Vec<CanonicalItem>, params: &DedupParams) -> DedupOutcome {
    rank_by_recency(&mut merged);
    dedup_ranked(merged, params)
}
