//! Run summary

use serde::Serialize;

use crate::config::Granularity;
use crate::error::DiffError;
use crate::locate::{ChangeKind, Region, SpanMiss};

/// Where a page ended up in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PageState {
    Pending,
    /// Handed to a worker. A finished report only keeps this for pages whose
    /// result was discarded by cancellation.
    Diffing,
    Located,
    Applied,
    Failed,
    /// Never dispatched because the run was cancelled
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageOutcome {
    pub page: usize,
    pub state: PageState,
    pub regions: usize,
    pub misses: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageFailure {
    pub page: usize,
    pub error: String,
}

impl PageFailure {
    pub fn new(page: usize, error: &DiffError) -> Self {
        Self {
            page,
            error: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ComparisonReport {
    pub granularity: Granularity,
    pub pages_compared: usize,
    pub pages: Vec<PageOutcome>,
    /// All regions, ordered by page then production order
    pub regions: Vec<Region>,
    pub failures: Vec<PageFailure>,
    pub span_misses: Vec<SpanMiss>,
    /// Master pages with no edited counterpart
    pub unmatched_master_pages: Vec<usize>,
    pub cancelled: bool,
    pub elapsed_ms: u64,
}

impl ComparisonReport {
    pub fn count(&self, kind: ChangeKind) -> usize {
        self.regions.iter().filter(|r| r.kind == kind).count()
    }

    pub fn failed_pages(&self) -> Vec<usize> {
        self.failures.iter().map(|f| f.page).collect()
    }

    /// No differences and nothing went wrong
    pub fn is_clean(&self) -> bool {
        self.regions.is_empty()
            && self.failures.is_empty()
            && self.span_misses.is_empty()
            && self.unmatched_master_pages.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
