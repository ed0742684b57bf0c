//! Page-parallel comparison
//!
//! Page pairs are diffed and located on the tokio blocking pool, at most
//! `worker_count` at a time. Results come back in completion order and are
//! handed one page at a time to a single [`RegionSink`], the only thing that
//! touches the output document.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{DiffConfig, Granularity};
use crate::diff::diff_text;
use crate::error::DiffError;
use crate::extract::{page_text, PageText};
use crate::layout::PageLayout;
use crate::locate::{locate_matches, locate_ops, Located, Region};
use crate::paragraph::match_paragraphs;
use crate::report::{ComparisonReport, PageFailure, PageOutcome, PageState};

/// Receiver of located regions, called once per completed page
pub trait RegionSink {
    fn apply_page(&mut self, page: usize, regions: &[Region]) -> Result<(), DiffError>;
}

/// Shared stop signal for a running comparison
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

type Comparer = fn(&PageLayout, &PageLayout, Granularity) -> Located;

/// Diff and locate one page pair
#[instrument(skip_all, fields(page = edited.index))]
pub fn compare_page(master: &PageLayout, edited: &PageLayout, granularity: Granularity) -> Located {
    match (
        page_text(master, granularity),
        page_text(edited, granularity),
    ) {
        (PageText::Blocks(master_blocks), PageText::Blocks(edited_blocks)) => {
            let matches = match_paragraphs(&master_blocks, &edited_blocks);
            Located {
                regions: locate_matches(edited.index, &matches),
                misses: Vec::new(),
            }
        }
        (master_text, edited_text) => {
            let ops = diff_text(&master_text.text(), &edited_text.text());
            locate_ops(master, edited, &ops)
        }
    }
}

struct PageJob {
    index: usize,
    master: PageLayout,
    edited: PageLayout,
}

pub struct Orchestrator {
    granularity: Granularity,
    worker_count: usize,
    cancel: CancellationFlag,
    compare: Comparer,
}

impl Orchestrator {
    pub fn new(config: &DiffConfig) -> Self {
        Self {
            granularity: config.granularity,
            worker_count: config.worker_count.max(1),
            cancel: CancellationFlag::new(),
            compare: compare_page,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    #[cfg(test)]
    fn with_comparer(mut self, compare: Comparer) -> Self {
        self.compare = compare;
        self
    }

    /// Compare paired pages and feed each page's regions to `sink`.
    ///
    /// Pages are paired by index. Edited pages without a master counterpart
    /// are compared against an empty page; master pages without an edited
    /// counterpart are reported as unmatched.
    #[instrument(skip_all, fields(master_pages = master.len(), edited_pages = edited.len()))]
    pub async fn run<S: RegionSink>(
        &self,
        master: Vec<Result<PageLayout, DiffError>>,
        edited: Vec<Result<PageLayout, DiffError>>,
        sink: &mut S,
    ) -> ComparisonReport {
        let started = Instant::now();
        let mut report = ComparisonReport {
            granularity: self.granularity,
            ..Default::default()
        };

        if master.len() > edited.len() {
            report.unmatched_master_pages = (edited.len()..master.len()).collect();
            warn!(
                pages = ?report.unmatched_master_pages,
                "master pages without an edited counterpart"
            );
        }

        let mut outcomes: BTreeMap<usize, PageOutcome> = BTreeMap::new();
        let mut jobs = Vec::new();
        let mut master = master.into_iter();
        for (index, edited_page) in edited.into_iter().enumerate() {
            let master_page = master.next().unwrap_or_else(|| {
                debug!(page = index, "no master page, comparing against an empty page");
                Ok(PageLayout::empty(index))
            });
            match (master_page, edited_page) {
                (Ok(master), Ok(edited)) => {
                    outcomes.insert(index, outcome(index, PageState::Pending));
                    jobs.push(PageJob {
                        index,
                        master,
                        edited,
                    });
                }
                (Err(e), _) | (_, Err(e)) => {
                    error!(page = index, error = %e, "page skipped");
                    outcomes.insert(index, outcome(index, PageState::Failed));
                    report.failures.push(PageFailure::new(index, &e));
                }
            }
        }

        info!(
            pages = jobs.len(),
            workers = self.worker_count,
            granularity = ?self.granularity,
            "comparing pages"
        );

        let granularity = self.granularity;
        let compare = self.compare;
        let (dispatch_tx, mut dispatch_rx) = mpsc::unbounded_channel();
        let mut results = stream::iter(jobs.into_iter().map(|job| {
            let cancel = self.cancel.clone();
            let dispatched = dispatch_tx.clone();
            async move {
                let index = job.index;
                if cancel.is_cancelled() {
                    return (index, None);
                }
                let _ = dispatched.send(index);
                debug!(page = index, "page dispatched");
                let handle = tokio::task::spawn_blocking(move || {
                    compare(&job.master, &job.edited, granularity)
                });
                (index, Some(handle.await))
            }
        }))
        .buffer_unordered(self.worker_count);

        let mut regions: BTreeMap<usize, Vec<Region>> = BTreeMap::new();
        while let Some((index, result)) = results.next().await {
            mark_dispatched(&mut outcomes, &mut dispatch_rx);
            if self.cancel.is_cancelled() {
                debug!(page = index, "result discarded after cancellation");
                break;
            }
            let Some(result) = result else {
                continue;
            };

            match result {
                Ok(located) => {
                    set_state(&mut outcomes, index, PageState::Located);
                    debug!(
                        page = index,
                        regions = located.regions.len(),
                        misses = located.misses.len(),
                        "page located"
                    );
                    match sink.apply_page(index, &located.regions) {
                        Ok(()) => {
                            if let Some(o) = outcomes.get_mut(&index) {
                                o.state = PageState::Applied;
                                o.regions = located.regions.len();
                                o.misses = located.misses.len();
                            }
                            report.pages_compared += 1;
                            report.span_misses.extend(located.misses);
                            regions.insert(index, located.regions);
                        }
                        Err(e) => {
                            error!(page = index, error = %e, "applying regions failed");
                            set_state(&mut outcomes, index, PageState::Failed);
                            report.failures.push(PageFailure::new(index, &e));
                        }
                    }
                }
                Err(join_error) => {
                    let e = DiffError::DiffComputation {
                        page: index,
                        message: join_error.to_string(),
                    };
                    error!(page = index, error = %e, "page worker failed");
                    set_state(&mut outcomes, index, PageState::Failed);
                    report.failures.push(PageFailure::new(index, &e));
                }
            }
        }
        drop(results);
        mark_dispatched(&mut outcomes, &mut dispatch_rx);

        if self.cancel.is_cancelled() {
            report.cancelled = true;
            // Pages still `Diffing` were running when the flag went up
            for o in outcomes.values_mut() {
                if matches!(o.state, PageState::Pending | PageState::Located) {
                    o.state = PageState::Cancelled;
                }
            }
            warn!(applied = report.pages_compared, "comparison cancelled");
        }

        report.pages = outcomes.into_values().collect();
        report.regions = regions.into_values().flatten().collect();
        report.failures.sort_by_key(|f| f.page);
        report.span_misses.sort_by_key(|m| m.page);
        report.elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            pages = report.pages_compared,
            regions = report.regions.len(),
            failures = report.failures.len(),
            misses = report.span_misses.len(),
            elapsed_ms = report.elapsed_ms,
            "comparison finished"
        );
        report
    }
}

fn outcome(page: usize, state: PageState) -> PageOutcome {
    PageOutcome {
        page,
        state,
        regions: 0,
        misses: 0,
    }
}

fn mark_dispatched(
    outcomes: &mut BTreeMap<usize, PageOutcome>,
    dispatched: &mut mpsc::UnboundedReceiver<usize>,
) {
    while let Ok(page) = dispatched.try_recv() {
        set_state(outcomes, page, PageState::Diffing);
    }
}

fn set_state(outcomes: &mut BTreeMap<usize, PageOutcome>, page: usize, state: PageState) {
    if let Some(o) = outcomes.get_mut(&page) {
        o.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locate::ChangeKind;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Recorder {
        applied: Vec<(usize, Vec<Region>)>,
        cancel_after_first: Option<CancellationFlag>,
    }

    impl RegionSink for Recorder {
        fn apply_page(&mut self, page: usize, regions: &[Region]) -> Result<(), DiffError> {
            self.applied.push((page, regions.to_vec()));
            if let Some(flag) = &self.cancel_after_first {
                flag.cancel();
            }
            Ok(())
        }
    }

    fn config(workers: usize, granularity: Granularity) -> DiffConfig {
        DiffConfig {
            granularity,
            worker_count: workers,
            ..DiffConfig::default()
        }
    }

    fn pages(texts: &[&[&str]]) -> Vec<Result<PageLayout, DiffError>> {
        texts
            .iter()
            .enumerate()
            .map(|(i, paragraphs)| Ok(PageLayout::from_paragraphs(i, paragraphs)))
            .collect()
    }

    fn sample() -> (
        Vec<Result<PageLayout, DiffError>>,
        Vec<Result<PageLayout, DiffError>>,
    ) {
        let master = pages(&[
            &["The rent is $500."],
            &["Tenant pays water.", "Landlord pays gas."],
            &["Unchanged page"],
            &["cat sat here"],
            &["Term: 12 months", "Deposit: one month"],
            &["Notice period 30 days"],
        ]);
        let edited = pages(&[
            &["The rent is $600 due monthly."],
            &["Tenant pays water and power.", "Landlord pays gas."],
            &["Unchanged page"],
            &["cat cat sat here"],
            &["Term: 24 months", "Deposit: two months"],
            &["Notice period 60 days"],
        ]);
        (master, edited)
    }

    fn panicking(_: &PageLayout, edited: &PageLayout, _: Granularity) -> Located {
        if edited.index == 1 {
            panic!("worker blew up");
        }
        Located::default()
    }

    #[tokio::test]
    async fn test_worker_count_does_not_change_regions() {
        for granularity in [Granularity::Char, Granularity::Paragraph] {
            let (master, edited) = sample();
            let mut one = Recorder::default();
            let serial = Orchestrator::new(&config(1, granularity))
                .run(master, edited, &mut one)
                .await;

            let (master, edited) = sample();
            let mut many = Recorder::default();
            let parallel = Orchestrator::new(&config(16, granularity))
                .run(master, edited, &mut many)
                .await;

            assert_eq!(serial.regions, parallel.regions);
            assert_eq!(serial.pages, parallel.pages);
            assert!(!serial.regions.is_empty());
            assert_eq!(serial.pages_compared, 6);
        }
    }

    #[tokio::test]
    async fn test_each_page_applied_once() {
        let (master, edited) = sample();
        let mut sink = Recorder::default();
        let report = Orchestrator::new(&config(4, Granularity::Char))
            .run(master, edited, &mut sink)
            .await;

        let mut applied: Vec<usize> = sink.applied.iter().map(|(p, _)| *p).collect();
        applied.sort();
        assert_eq!(applied, vec![0, 1, 2, 3, 4, 5]);
        assert!(report.pages.iter().all(|o| o.state == PageState::Applied));
        // Regions only ever annotate their own page
        for (page, regions) in &sink.applied {
            assert!(regions.iter().all(|r| r.page == *page));
        }
        // The unchanged page produces nothing
        assert_eq!(report.pages[2].regions, 0);
    }

    #[tokio::test]
    async fn test_extra_edited_page_compared_to_empty() {
        let master = pages(&[&["Same"]]);
        let edited = pages(&[&["Same"], &["Brand new page"]]);
        let mut sink = Recorder::default();
        let report = Orchestrator::new(&config(2, Granularity::Char))
            .run(master, edited, &mut sink)
            .await;

        assert_eq!(report.pages_compared, 2);
        assert_eq!(report.regions.len(), 1);
        assert_eq!(report.regions[0].page, 1);
        assert_eq!(report.regions[0].kind, ChangeKind::Insertion);
        assert_eq!(report.regions[0].text, "Brand new page");
    }

    #[tokio::test]
    async fn test_extra_master_pages_reported_unmatched() {
        let master = pages(&[&["Same"], &["Dropped"], &["Also dropped"]]);
        let edited = pages(&[&["Same"]]);
        let mut sink = Recorder::default();
        let report = Orchestrator::new(&config(2, Granularity::Char))
            .run(master, edited, &mut sink)
            .await;

        assert_eq!(report.unmatched_master_pages, vec![1, 2]);
        assert_eq!(report.pages_compared, 1);
        assert!(report.regions.is_empty());
    }

    #[tokio::test]
    async fn test_extraction_failure_isolated() {
        let master = pages(&[&["One"], &["Two"], &["Three"]]);
        let mut edited = pages(&[&["One!"], &["Two"], &["Three!"]]);
        edited[1] = Err(DiffError::Extraction {
            page: 1,
            message: "broken content stream".into(),
        });

        let mut sink = Recorder::default();
        let report = Orchestrator::new(&config(2, Granularity::Char))
            .run(master, edited, &mut sink)
            .await;

        assert_eq!(report.failed_pages(), vec![1]);
        assert_eq!(report.pages[1].state, PageState::Failed);
        assert_eq!(report.pages_compared, 2);
        assert!(sink.applied.iter().all(|(p, _)| *p != 1));
    }

    #[tokio::test]
    async fn test_worker_panic_isolated() {
        let (master, edited) = sample();
        let mut sink = Recorder::default();
        let report = Orchestrator::new(&config(3, Granularity::Char))
            .with_comparer(panicking)
            .run(master, edited, &mut sink)
            .await;

        assert_eq!(report.failed_pages(), vec![1]);
        assert!(report.failures[0].error.contains("page 1"));
        assert_eq!(report.pages_compared, 5);
    }

    #[tokio::test]
    async fn test_cancellation_stops_dispatch() {
        let (master, edited) = sample();
        let flag = CancellationFlag::new();
        let mut sink = Recorder {
            cancel_after_first: Some(flag.clone()),
            ..Default::default()
        };
        let report = Orchestrator::new(&config(1, Granularity::Char))
            .with_cancellation(flag)
            .run(master, edited, &mut sink)
            .await;

        assert!(report.cancelled);
        assert_eq!(sink.applied.len(), 1);
        assert_eq!(report.pages_compared, 1);
        let cancelled = report
            .pages
            .iter()
            .filter(|o| o.state == PageState::Cancelled)
            .count();
        assert_eq!(cancelled, 5);
    }

    fn slow(master: &PageLayout, edited: &PageLayout, granularity: Granularity) -> Located {
        std::thread::sleep(std::time::Duration::from_millis(20));
        compare_page(master, edited, granularity)
    }

    #[tokio::test]
    async fn test_in_flight_page_reported_as_diffing() {
        let (master, edited) = sample();
        let flag = CancellationFlag::new();
        let mut sink = Recorder {
            cancel_after_first: Some(flag.clone()),
            ..Default::default()
        };
        let report = Orchestrator::new(&config(2, Granularity::Char))
            .with_cancellation(flag)
            .with_comparer(slow)
            .run(master, edited, &mut sink)
            .await;

        let count = |state: PageState| report.pages.iter().filter(|o| o.state == state).count();
        assert!(report.cancelled);
        assert_eq!(count(PageState::Applied), 1);
        // The second worker's page had started; its result was discarded
        assert_eq!(count(PageState::Diffing), 1);
        assert_eq!(count(PageState::Cancelled), 4);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let (master, edited) = sample();
        let orchestrator = Orchestrator::new(&config(4, Granularity::Char));
        orchestrator.cancellation().cancel();
        let mut sink = Recorder::default();
        let report = orchestrator.run(master, edited, &mut sink).await;

        assert!(report.cancelled);
        assert!(sink.applied.is_empty());
        assert!(report.regions.is_empty());
    }

    #[tokio::test]
    async fn test_empty_documents() {
        let mut sink = Recorder::default();
        let report = Orchestrator::new(&config(2, Granularity::Paragraph))
            .run(Vec::new(), Vec::new(), &mut sink)
            .await;
        assert!(report.is_clean());
        assert_eq!(report.pages_compared, 0);
    }

    #[test]
    fn test_compare_page_char_mode() {
        let master = PageLayout::from_paragraphs(0, &["The rent is $500."]);
        let edited = PageLayout::from_paragraphs(0, &["The rent is $600 due monthly."]);
        let located = compare_page(&master, &edited, Granularity::Char);
        let found: Vec<(ChangeKind, &str)> = located
            .regions
            .iter()
            .map(|r| (r.kind, r.text.as_str()))
            .collect();
        assert_eq!(
            found,
            vec![
                (ChangeKind::Deletion, "500"),
                (ChangeKind::Insertion, "600 due monthly"),
            ]
        );
    }

    #[test]
    fn test_compare_page_paragraph_mode() {
        let master = PageLayout::from_paragraphs(0, &["Alpha", "Beta"]);
        let edited = PageLayout::from_paragraphs(0, &["Alpha", "Beta two"]);
        let located = compare_page(&master, &edited, Granularity::Paragraph);
        assert_eq!(located.regions.len(), 1);
        assert_eq!(located.regions[0].kind, ChangeKind::Modified);
        assert!(located.misses.is_empty());
    }
}
