//! A processing pass: document report, page collection, then every pipeline.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, info_span, warn};

use crate::cancel::CancellationToken;
use crate::checker::{AccessibilityChecker, PageRange};
use crate::collector::{fetch_with_retry, CollectionOutcome, PageReportCollector, RetryPolicy};
use crate::config::Config;
use crate::db::{page_repo, Database};
use crate::error::{FetchError, ProcessError};
use crate::pdf;
use crate::pipeline::{
    HeadingCheck, NoopProgress, PassInfo, PipelineContext, PipelineManager, PipelineRun,
    ProgressEvent, ProgressReporter,
};
use crate::report::ReportSummary;

/// Input of one processing pass.
#[derive(Debug, Clone)]
pub struct PassRequest {
    pub document_id: i64,
    pub pdf_path: PathBuf,
    /// Auto-tagged variant of the PDF; checked instead of the source when set.
    pub tagged_pdf_path: Option<PathBuf>,
    /// Pages to check. `None` means every page of the PDF.
    pub page_range: Option<PageRange>,
    /// Fetch one report per page in addition to the document report.
    pub collect_pages: bool,
    pub resolve_enabled: bool,
    pub heading: HeadingCheck,
    /// Restricts the pass to these pipelines. `None` runs all of them.
    pub pipelines: Option<Vec<String>>,
}

impl PassRequest {
    pub fn new(document_id: i64, pdf_path: impl Into<PathBuf>) -> Self {
        Self {
            document_id,
            pdf_path: pdf_path.into(),
            tagged_pdf_path: None,
            page_range: None,
            collect_pages: true,
            resolve_enabled: false,
            heading: HeadingCheck::NotChecked,
            pipelines: None,
        }
    }

    fn checked_pdf(&self) -> &Path {
        self.tagged_pdf_path.as_deref().unwrap_or(&self.pdf_path)
    }
}

/// Everything a pass produced.
#[derive(Debug, Clone, Serialize)]
pub struct PassOutcome {
    pub pass_id: String,
    pub document_id: i64,
    pub page_range: PageRange,
    pub document_summary: ReportSummary,
    pub collected_pages: Vec<u32>,
    pub failed_pages: BTreeMap<u32, FetchError>,
    pub cancelled: bool,
    pub runs: Vec<PipelineRun>,
}

/// Chains the checker, the page collector and the pipeline manager.
pub struct DocumentProcessor {
    checker: Arc<dyn AccessibilityChecker>,
    collector: PageReportCollector,
    manager: PipelineManager,
    db: Database,
    retry: RetryPolicy,
    config: Config,
}

impl DocumentProcessor {
    pub fn new(
        config: &Config,
        checker: Arc<dyn AccessibilityChecker>,
        manager: PipelineManager,
        db: Database,
    ) -> Self {
        let retry = RetryPolicy::from_config(&config.retry);
        let collector =
            PageReportCollector::new(Arc::clone(&checker), config.worker_count.max(1), retry.clone());
        Self {
            checker,
            collector,
            manager,
            db,
            retry,
            config: config.clone(),
        }
    }

    pub fn manager(&self) -> &PipelineManager {
        &self.manager
    }

    pub fn process(
        &self,
        request: &PassRequest,
        cancel: &CancellationToken,
    ) -> Result<PassOutcome, ProcessError> {
        self.process_with_progress(request, cancel, &NoopProgress)
    }

    /// Runs a full pass. Fails only when the document report cannot be
    /// obtained, the page range is unusable, or storage fails; page and
    /// analyzer failures are part of the outcome.
    pub fn process_with_progress(
        &self,
        request: &PassRequest,
        cancel: &CancellationToken,
        progress: &dyn ProgressReporter,
    ) -> Result<PassOutcome, ProcessError> {
        let pass_id = uuid::Uuid::new_v4().to_string();
        let _span = info_span!("processing_pass",
            document_id = request.document_id,
            pass_id = %pass_id,
        )
        .entered();
        let started = Instant::now();
        let checked_pdf = request.checked_pdf();

        let selected = match &request.pipelines {
            Some(names) => Some(self.manager.registry().select(names)?),
            None => None,
        };
        let registry = selected.as_ref().unwrap_or_else(|| self.manager.registry());

        let document_report = fetch_with_retry(&self.retry, cancel, "document report", || {
            self.checker.check(checked_pdf, None)
        })
        .map_err(ProcessError::DocumentReport)?;

        let page_range = self.resolve_range(request)?;
        progress.report(ProgressEvent::PassStarted {
            pass_id: pass_id.clone(),
            document_id: request.document_id,
            pages: page_range.len(),
        });

        let collection = if request.collect_pages {
            Some(self.collector.collect(checked_pdf, page_range, cancel))
        } else {
            None
        };
        if let Some(outcome) = &collection {
            page_repo::upsert_pages(&self.db, &pass_id, request.document_id, &outcome.reports)?;
            progress.report(ProgressEvent::PagesCollected {
                pass_id: pass_id.clone(),
                collected: outcome.reports.len(),
                failed: outcome.failed_pages.len(),
                cancelled: outcome.cancelled,
            });
        }
        let CollectionOutcome {
            reports,
            failed_pages,
            cancelled,
        } = collection.unwrap_or_default();

        let output_dir = self.config.document_output_dir(request.document_id);
        if request.resolve_enabled {
            std::fs::create_dir_all(&output_dir).map_err(|e| ProcessError::Io {
                path: output_dir.clone(),
                source: e,
            })?;
        }

        let collected_pages: Vec<u32> = reports.keys().copied().collect();
        let mut ctx = PipelineContext::new(
            request.document_id,
            request.pdf_path.clone(),
            page_range,
            document_report,
            output_dir,
        )
        .with_heading(request.heading.clone());
        if let Some(tagged) = &request.tagged_pdf_path {
            ctx = ctx.with_tagged_pdf(tagged.clone());
        }
        if request.collect_pages {
            ctx = ctx.with_page_reports(reports);
        }

        let pass = PassInfo {
            pass_id: pass_id.clone(),
            attempt_resolve: request.resolve_enabled,
            failed_pages: failed_pages.keys().copied().collect(),
            pages_cancelled: cancelled,
        };
        let runs = self.manager.run_with(registry, &ctx, &pass, cancel, progress)?;

        let cancelled = cancelled || cancel.is_cancelled();
        if !failed_pages.is_empty() {
            warn!(failed = ?pass.failed_pages, "Pass completed with failed pages");
        }
        info!(
            runs = runs.len(),
            collected = collected_pages.len(),
            failed = failed_pages.len(),
            cancelled,
            duration_ms = started.elapsed().as_millis() as u64,
            "Processing pass finished"
        );
        progress.report(ProgressEvent::PassFinished {
            pass_id: pass_id.clone(),
            runs: runs.len(),
            cancelled,
        });

        Ok(PassOutcome {
            pass_id,
            document_id: request.document_id,
            page_range,
            document_summary: ctx.document_report.summary(),
            collected_pages,
            failed_pages,
            cancelled,
            runs,
        })
    }

    fn resolve_range(&self, request: &PassRequest) -> Result<PageRange, ProcessError> {
        match request.page_range {
            Some(range) => {
                let range = PageRange::new(range.start, range.end).ok_or(
                    ProcessError::InvalidPageRange {
                        start: range.start,
                        end: range.end,
                    },
                )?;
                let pages = pdf::page_count(&request.pdf_path)?;
                if range.end > pages {
                    return Err(ProcessError::PageRangeBeyondDocument {
                        end: range.end,
                        pages,
                    });
                }
                Ok(range)
            }
            None => {
                let count = pdf::page_count(&request.pdf_path)?;
                PageRange::new(1, count).ok_or(ProcessError::InvalidPageRange { start: 1, end: count })
            }
        }
    }
}
