//! Bounded-concurrency collection of per-page accessibility reports.

mod retry;

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, error, info, info_span, warn};

use crate::cancel::CancellationToken;
use crate::checker::{AccessibilityChecker, PageRange};
use crate::error::FetchError;
use crate::report::AccessibilityReport;

pub use retry::{fetch_with_retry, RetryPolicy};

/// Result of collecting a page range. Pages that were never attempted
/// because of cancellation appear in neither map.
#[derive(Debug, Default)]
pub struct CollectionOutcome {
    pub reports: BTreeMap<u32, AccessibilityReport>,
    pub failed_pages: BTreeMap<u32, FetchError>,
    pub cancelled: bool,
}

impl CollectionOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed_pages.is_empty() && !self.cancelled
    }

    pub fn failed_page_numbers(&self) -> Vec<u32> {
        self.failed_pages.keys().copied().collect()
    }
}

pub struct PageReportCollector {
    checker: Arc<dyn AccessibilityChecker>,
    worker_count: usize,
    retry: RetryPolicy,
}

impl PageReportCollector {
    /// # Panics
    /// Panics if `worker_count` is 0.
    pub fn new(checker: Arc<dyn AccessibilityChecker>, worker_count: usize, retry: RetryPolicy) -> Self {
        assert!(worker_count > 0, "worker_count must be > 0");
        Self {
            checker,
            worker_count,
            retry,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Fetches one report per page in `range` using up to `worker_count`
    /// threads. Individual page failures never abort the collection.
    pub fn collect(
        &self,
        pdf_path: &Path,
        range: PageRange,
        cancel: &CancellationToken,
    ) -> CollectionOutcome {
        let workers = self.worker_count.min(range.len()).max(1);
        let _span = info_span!("collect_pages", range = %range, workers).entered();

        let cursor = AtomicU64::new(u64::from(range.start));
        let (result_tx, result_rx) = unbounded::<(u32, Result<AccessibilityReport, FetchError>)>();

        let mut outcome = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(workers);
            for worker_id in 0..workers {
                let result_tx = result_tx.clone();
                let cursor = &cursor;
                let spawned = thread::Builder::new()
                    .name(format!("page-collector-{}", worker_id))
                    .spawn_scoped(scope, move || {
                        self.run_worker(worker_id, pdf_path, range, cursor, cancel, result_tx)
                    });
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(e) => error!("Failed to spawn page collector {}: {}", worker_id, e),
                }
            }
            if handles.is_empty() {
                warn!("No page collector thread could be started, collecting on the calling thread");
                self.run_worker(0, pdf_path, range, &cursor, cancel, result_tx.clone());
            }
            drop(result_tx);

            let outcome = drain(result_rx, cancel);

            for (i, handle) in handles.into_iter().enumerate() {
                if let Err(e) = handle.join() {
                    error!("Page collector {} panicked: {:?}", i, e);
                }
            }
            outcome
        });

        mark_unattempted(&mut outcome, range);
        log_outcome(&outcome, range);
        outcome
    }

    fn run_worker(
        &self,
        worker_id: usize,
        pdf_path: &Path,
        range: PageRange,
        cursor: &AtomicU64,
        cancel: &CancellationToken,
        results: Sender<(u32, Result<AccessibilityReport, FetchError>)>,
    ) {
        debug!("Page collector {} started", worker_id);
        loop {
            if cancel.is_cancelled() {
                debug!("Page collector {} observed cancellation", worker_id);
                break;
            }
            // 64-bit cursor: overshooting past `u32::MAX` never wraps.
            let next = cursor.fetch_add(1, Ordering::SeqCst);
            let page = match u32::try_from(next) {
                Ok(page) if page <= range.end => page,
                _ => break,
            };

            let what = format!("page {}", page);
            let result = fetch_with_retry(&self.retry, cancel, &what, || self.check_page(pdf_path, page));
            if results.send((page, result)).is_err() {
                break;
            }
        }
        debug!("Page collector {} stopped", worker_id);
    }

    fn check_page(&self, pdf_path: &Path, page: u32) -> Result<AccessibilityReport, FetchError> {
        let range = PageRange::single(page)
            .ok_or_else(|| FetchError::Permanent(format!("invalid page number {}", page)))?;
        panic::catch_unwind(AssertUnwindSafe(|| self.checker.check(pdf_path, Some(range))))
            .unwrap_or_else(|_| Err(FetchError::Permanent(format!("checker panicked on page {}", page))))
    }
}

/// Unless the pass was cancelled, every page in the range ends up either
/// collected or failed; pages no worker reached are recorded as failed.
fn mark_unattempted(outcome: &mut CollectionOutcome, range: PageRange) {
    if outcome.cancelled {
        return;
    }
    for page in range.pages() {
        if !outcome.reports.contains_key(&page) && !outcome.failed_pages.contains_key(&page) {
            outcome
                .failed_pages
                .insert(page, FetchError::Permanent("page was not attempted".to_string()));
        }
    }
}

fn log_outcome(outcome: &CollectionOutcome, range: PageRange) {
    if outcome.cancelled {
        info!(
            collected = outcome.reports.len(),
            failed = outcome.failed_pages.len(),
            not_started = range.len() - outcome.reports.len() - outcome.failed_pages.len(),
            "Page collection cancelled"
        );
    } else {
        info!(
            collected = outcome.reports.len(),
            failed = outcome.failed_pages.len(),
            "Page collection finished"
        );
    }
}

fn drain(
    results: Receiver<(u32, Result<AccessibilityReport, FetchError>)>,
    cancel: &CancellationToken,
) -> CollectionOutcome {
    let mut outcome = CollectionOutcome::default();
    for (page, result) in results.iter() {
        match result {
            Ok(report) => {
                debug!(page, "Collected page report");
                outcome.reports.insert(page, report);
            }
            Err(e) => {
                warn!(page, error = %e, "Page report failed");
                outcome.failed_pages.insert(page, e);
            }
        }
    }
    outcome.cancelled = cancel.is_cancelled();
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{RuleEvaluation, RuleStatus};
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    fn page_report(page: u32) -> AccessibilityReport {
        AccessibilityReport::from_evaluations(vec![RuleEvaluation {
            section: "Page Content".to_string(),
            rule_id: format!("rule-{}", page),
            description: "Tagged content".to_string(),
            status: RuleStatus::Failed,
        }])
    }

    /// Scripted checker: pages listed in `script` fail with the given errors
    /// in order; afterwards (and for all other pages) they succeed.
    #[derive(Default)]
    struct ScriptedChecker {
        script: Mutex<HashMap<u32, Vec<FetchError>>>,
        calls: Mutex<HashMap<u32, usize>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        delay: Duration,
    }

    impl ScriptedChecker {
        fn with_script(script: Vec<(u32, Vec<FetchError>)>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().collect()),
                ..Default::default()
            }
        }

        fn calls_for(&self, page: u32) -> usize {
            self.calls.lock().unwrap().get(&page).copied().unwrap_or(0)
        }
    }

    impl AccessibilityChecker for ScriptedChecker {
        fn check(&self, _pdf: &Path, pages: Option<PageRange>) -> Result<AccessibilityReport, FetchError> {
            let page = pages.expect("per-page check").start;
            *self.calls.lock().unwrap().entry(page).or_default() += 1;

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let mut script = self.script.lock().unwrap();
            if let Some(errors) = script.get_mut(&page) {
                if !errors.is_empty() {
                    return Err(errors.remove(0));
                }
            }
            Ok(page_report(page))
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            multiplier: 2.0,
        }
    }

    #[test]
    fn test_collects_every_page_keyed_by_number() {
        let checker = Arc::new(ScriptedChecker::default());
        let collector = PageReportCollector::new(checker, 3, fast_retry());
        let range = PageRange::new(1, 7).unwrap();

        let outcome = collector.collect(Path::new("doc.pdf"), range, &CancellationToken::new());

        assert!(outcome.is_complete());
        assert_eq!(outcome.reports.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5, 6, 7]);
        let ids: Vec<String> = outcome.reports[&4].evaluations().map(|e| e.rule_id.clone()).collect();
        assert_eq!(ids, vec!["rule-4".to_string()]);
    }

    #[test]
    fn test_parallelism_is_bounded() {
        let checker = Arc::new(ScriptedChecker {
            delay: Duration::from_millis(20),
            ..Default::default()
        });
        let collector = PageReportCollector::new(checker.clone(), 2, fast_retry());

        let outcome = collector.collect(
            Path::new("doc.pdf"),
            PageRange::new(1, 8).unwrap(),
            &CancellationToken::new(),
        );

        assert_eq!(outcome.reports.len(), 8);
        assert!(checker.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn test_failed_page_does_not_abort_collection() {
        let checker = Arc::new(ScriptedChecker::with_script(vec![(
            3,
            vec![FetchError::Permanent("malformed page".into())],
        )]));
        let collector = PageReportCollector::new(checker.clone(), 2, fast_retry());

        let outcome = collector.collect(
            Path::new("doc.pdf"),
            PageRange::new(1, 5).unwrap(),
            &CancellationToken::new(),
        );

        assert_eq!(outcome.reports.keys().copied().collect::<Vec<_>>(), vec![1, 2, 4, 5]);
        assert_eq!(outcome.failed_page_numbers(), vec![3]);
        assert!(!outcome.cancelled);
        assert_eq!(checker.calls_for(3), 1);
    }

    #[test]
    fn test_transient_failure_recovers_within_retries() {
        let checker = Arc::new(ScriptedChecker::with_script(vec![(
            2,
            vec![
                FetchError::Transient("timeout".into()),
                FetchError::Transient("timeout".into()),
            ],
        )]));
        let collector = PageReportCollector::new(checker.clone(), 4, fast_retry());

        let outcome = collector.collect(
            Path::new("doc.pdf"),
            PageRange::new(1, 3).unwrap(),
            &CancellationToken::new(),
        );

        assert!(outcome.is_complete());
        assert_eq!(checker.calls_for(2), 3);
    }

    #[test]
    fn test_transient_failure_exhausts_retries() {
        let checker = Arc::new(ScriptedChecker::with_script(vec![(
            1,
            vec![FetchError::Transient("timeout".into()); 5],
        )]));
        let collector = PageReportCollector::new(checker.clone(), 1, fast_retry());

        let outcome = collector.collect(
            Path::new("doc.pdf"),
            PageRange::single(1).unwrap(),
            &CancellationToken::new(),
        );

        assert_eq!(outcome.failed_page_numbers(), vec![1]);
        assert_eq!(checker.calls_for(1), 3);
    }

    #[test]
    fn test_cancelled_before_start_fetches_nothing() {
        let checker = Arc::new(ScriptedChecker::default());
        let collector = PageReportCollector::new(checker.clone(), 2, fast_retry());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = collector.collect(Path::new("doc.pdf"), PageRange::new(1, 4).unwrap(), &cancel);

        assert!(outcome.cancelled);
        assert!(outcome.reports.is_empty());
        assert!(outcome.failed_pages.is_empty());
        assert_eq!(checker.calls.lock().unwrap().len(), 0);
    }

    /// Cancels the pass from inside the first page fetch.
    struct CancellingChecker {
        cancel: CancellationToken,
        calls: AtomicUsize,
    }

    impl AccessibilityChecker for CancellingChecker {
        fn check(&self, _pdf: &Path, pages: Option<PageRange>) -> Result<AccessibilityReport, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.cancel.cancel();
            Ok(page_report(pages.map(|r| r.start).unwrap_or(0)))
        }
    }

    #[test]
    fn test_in_flight_fetch_completes_after_cancellation() {
        let cancel = CancellationToken::new();
        let checker = Arc::new(CancellingChecker {
            cancel: cancel.clone(),
            calls: AtomicUsize::new(0),
        });
        let collector = PageReportCollector::new(checker.clone(), 1, fast_retry());

        let outcome = collector.collect(Path::new("doc.pdf"), PageRange::new(1, 10).unwrap(), &cancel);

        assert!(outcome.cancelled);
        assert_eq!(checker.calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.reports.keys().copied().collect::<Vec<_>>(), vec![1]);
    }

    struct PanickingChecker;

    impl AccessibilityChecker for PanickingChecker {
        fn check(&self, _pdf: &Path, pages: Option<PageRange>) -> Result<AccessibilityReport, FetchError> {
            if pages.map(|r| r.start) == Some(2) {
                panic!("checker bug");
            }
            Ok(AccessibilityReport::empty())
        }
    }

    #[test]
    fn test_checker_panic_becomes_failed_page() {
        let collector = PageReportCollector::new(Arc::new(PanickingChecker), 2, fast_retry());
        let outcome = collector.collect(
            Path::new("doc.pdf"),
            PageRange::new(1, 3).unwrap(),
            &CancellationToken::new(),
        );
        assert_eq!(outcome.failed_page_numbers(), vec![2]);
        assert_eq!(outcome.reports.len(), 2);
    }

    #[test]
    fn test_range_ending_at_last_page_number_terminates() {
        let checker = Arc::new(ScriptedChecker::default());
        let collector = PageReportCollector::new(checker.clone(), 1, RetryPolicy::none());
        let range = PageRange::new(u32::MAX - 1, u32::MAX).unwrap();

        let outcome = collector.collect(Path::new("doc.pdf"), range, &CancellationToken::new());

        assert!(outcome.is_complete());
        assert_eq!(
            outcome.reports.keys().copied().collect::<Vec<_>>(),
            vec![u32::MAX - 1, u32::MAX]
        );
        assert_eq!(checker.calls.lock().unwrap().values().sum::<usize>(), 2);
    }

    #[test]
    fn test_high_range_with_many_workers_terminates() {
        let checker = Arc::new(ScriptedChecker::default());
        let collector = PageReportCollector::new(checker.clone(), 4, RetryPolicy::none());
        let range = PageRange::new(u32::MAX - 2, u32::MAX).unwrap();

        let outcome = collector.collect(Path::new("doc.pdf"), range, &CancellationToken::new());

        assert_eq!(outcome.reports.len(), 3);
        assert_eq!(checker.calls.lock().unwrap().values().sum::<usize>(), 3);
    }

    #[test]
    fn test_unattempted_pages_are_recorded_as_failed() {
        let mut outcome = CollectionOutcome::default();
        outcome.reports.insert(1, AccessibilityReport::empty());
        mark_unattempted(&mut outcome, PageRange::new(1, 3).unwrap());

        assert!(!outcome.is_complete());
        assert_eq!(outcome.failed_page_numbers(), vec![2, 3]);
        assert!(matches!(outcome.failed_pages[&2], FetchError::Permanent(_)));
    }

    #[test]
    fn test_cancelled_outcome_keeps_unattempted_pages_out() {
        let mut outcome = CollectionOutcome {
            cancelled: true,
            ..Default::default()
        };
        mark_unattempted(&mut outcome, PageRange::new(1, 3).unwrap());
        assert!(outcome.failed_pages.is_empty());
    }
}
