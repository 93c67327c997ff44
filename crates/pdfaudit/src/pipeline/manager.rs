use std::panic::{self, AssertUnwindSafe};
use std::path::Component;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use tracing::{debug, info, info_span, warn};

use crate::cancel::CancellationToken;
use crate::db::{run_repo, Database, DatabaseError};

use super::analyzer::Analyzer;
use super::context::PipelineContext;
use super::error::AnalyzerError;
use super::guard::InFlightRuns;
use super::progress::{ProgressEvent, ProgressReporter};
use super::registry::PipelineRegistry;
use super::result::{IdentifyResult, ResolveResult};
use super::run::{PipelineRun, ResolveOutcome};

pub(crate) const SKIP_CANCELLED: &str = "pass cancelled";
pub(crate) const SKIP_IN_FLIGHT: &str = "another run of this pipeline is in progress for the document";

/// How long an unfinished run keeps its claim before it is treated as
/// abandoned by a crashed process.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(60 * 60);

/// Pass-level facts copied onto every run record.
#[derive(Debug, Clone, Default)]
pub struct PassInfo {
    pub pass_id: String,
    pub attempt_resolve: bool,
    pub failed_pages: Vec<u32>,
    pub pages_cancelled: bool,
}

/// Runs every registered analyzer against a context, isolating failures
/// and persisting one run record per analyzer.
///
/// Clones share the in-flight set, so concurrent passes over the same
/// document never execute the same analyzer twice at once. Managers in
/// other processes are kept out by the open run row each execution holds
/// in the database.
#[derive(Clone)]
pub struct PipelineManager {
    registry: Arc<PipelineRegistry>,
    db: Database,
    in_flight: InFlightRuns,
    stale_after: Duration,
}

impl PipelineManager {
    pub fn new(registry: Arc<PipelineRegistry>, db: Database) -> Self {
        Self {
            registry,
            db,
            in_flight: InFlightRuns::new(),
            stale_after: DEFAULT_STALE_AFTER,
        }
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn registry(&self) -> &PipelineRegistry {
        &self.registry
    }

    pub fn in_flight(&self) -> &InFlightRuns {
        &self.in_flight
    }

    /// Executes all analyzers in registry order.
    ///
    /// Analyzer failures end up in the returned runs; only storage
    /// failures surface as `Err`.
    pub fn run(
        &self,
        ctx: &PipelineContext,
        pass: &PassInfo,
        cancel: &CancellationToken,
        progress: &dyn ProgressReporter,
    ) -> Result<Vec<PipelineRun>, DatabaseError> {
        self.run_with(&self.registry, ctx, pass, cancel, progress)
    }

    /// Like [`run`](Self::run), over a subset such as one produced by
    /// [`PipelineRegistry::select`].
    pub fn run_with(
        &self,
        registry: &PipelineRegistry,
        ctx: &PipelineContext,
        pass: &PassInfo,
        cancel: &CancellationToken,
        progress: &dyn ProgressReporter,
    ) -> Result<Vec<PipelineRun>, DatabaseError> {
        let _span = info_span!("pipelines",
            document_id = ctx.document_id,
            pass_id = %pass.pass_id,
        )
        .entered();

        let mut runs = Vec::with_capacity(registry.len());
        for pipeline in registry.all_pipelines() {
            let name = pipeline.name();
            let run = if cancel.is_cancelled() {
                debug!(pipeline = name, "Skipping pipeline, pass cancelled");
                self.record_skipped(name, ctx, pass, SKIP_CANCELLED)?
            } else {
                match self.in_flight.try_acquire(ctx.document_id, name) {
                    Some(_guard) => {
                        let run = self.new_run(name, ctx, pass);
                        if run_repo::claim(&self.db, &run, self.stale_before())? {
                            self.execute(pipeline.as_ref(), run, ctx, pass, progress)?
                        } else {
                            warn!(pipeline = name, "Pipeline has an open run elsewhere, skipping");
                            self.record_skipped(name, ctx, pass, SKIP_IN_FLIGHT)?
                        }
                    }
                    None => {
                        warn!(pipeline = name, "Pipeline already running for document, skipping");
                        self.record_skipped(name, ctx, pass, SKIP_IN_FLIGHT)?
                    }
                }
            };
            runs.push(run);
        }
        Ok(runs)
    }

    fn stale_before(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.stale_after)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    fn new_run(&self, name: &str, ctx: &PipelineContext, pass: &PassInfo) -> PipelineRun {
        let mut run = PipelineRun::start(&pass.pass_id, ctx.document_id, name, pass.attempt_resolve);
        run.failed_pages = pass.failed_pages.clone();
        run.pages_cancelled = pass.pages_cancelled;
        run
    }

    fn record_skipped(
        &self,
        name: &str,
        ctx: &PipelineContext,
        pass: &PassInfo,
        reason: &str,
    ) -> Result<PipelineRun, DatabaseError> {
        let mut run = self.new_run(name, ctx, pass);
        run.skip(reason);
        run_repo::insert(&self.db, &run)?;
        Ok(run)
    }

    /// Runs a pipeline whose `running` row is already claimed.
    fn execute(
        &self,
        pipeline: &dyn Analyzer,
        mut run: PipelineRun,
        ctx: &PipelineContext,
        pass: &PassInfo,
        progress: &dyn ProgressReporter,
    ) -> Result<PipelineRun, DatabaseError> {
        let name = pipeline.name();
        let _span = info_span!("pipeline", pipeline = name).entered();
        let started = Instant::now();

        progress.report(ProgressEvent::PipelineStarted {
            pass_id: pass.pass_id.clone(),
            pipeline: name.to_string(),
        });

        let identified = guarded(|| pipeline.identify(ctx)).and_then(|r| validate_identify(ctx, r));
        let findings = match identified {
            Ok(result) => {
                let resolved = (pass.attempt_resolve
                    && pipeline.supports_resolve()
                    && result.has_findings())
                .then(|| resolve(pipeline, ctx, &result));
                let findings = result.findings.clone();
                run.succeed(result, resolved);
                findings
            }
            Err(e) => {
                warn!(pipeline = name, error = %e, "Identify failed");
                run.fail(e.to_string());
                Vec::new()
            }
        };

        run_repo::finalize(&self.db, &run, &findings)?;

        let issues: usize = findings.iter().map(|f| f.pages.len()).sum();
        info!(
            pipeline = name,
            status = %run.status,
            findings = findings.len(),
            issues,
            duration_ms = started.elapsed().as_millis() as u64,
            "Pipeline run finished"
        );
        progress.report(ProgressEvent::PipelineFinished {
            pass_id: pass.pass_id.clone(),
            pipeline: name.to_string(),
            status: run.status,
            issues,
        });
        Ok(run)
    }
}

fn resolve(
    pipeline: &dyn Analyzer,
    ctx: &PipelineContext,
    identified: &IdentifyResult,
) -> ResolveOutcome {
    let result = guarded(|| pipeline.resolve(ctx, identified)).and_then(|r| validate_resolve(ctx, r));
    match result {
        Ok(result) => {
            debug!(applied = result.is_applied(), "Resolve finished");
            ResolveOutcome::Completed(result)
        }
        Err(e) => {
            warn!(pipeline = pipeline.name(), error = %e, "Resolve failed");
            ResolveOutcome::Failed {
                error: e.to_string(),
            }
        }
    }
}

/// Runs an analyzer phase, turning a panic into an error.
fn guarded<T>(
    phase: impl FnOnce() -> Result<T, AnalyzerError>,
) -> Result<T, AnalyzerError> {
    panic::catch_unwind(AssertUnwindSafe(phase)).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(AnalyzerError::Panicked(message))
    })
}

fn validate_identify(
    ctx: &PipelineContext,
    result: IdentifyResult,
) -> Result<IdentifyResult, AnalyzerError> {
    for finding in &result.findings {
        if finding.issue_code.trim().is_empty() || finding.section.trim().is_empty() {
            return Err(AnalyzerError::InvalidFinding(format!(
                "finding '{}' lacks an issue code or section",
                finding.summary
            )));
        }
        if finding.pages.is_empty() {
            return Err(AnalyzerError::InvalidFinding(format!(
                "finding {} is not attributed to any page",
                finding.issue_code
            )));
        }
        if let Some(page) = finding.pages.iter().find(|p| !ctx.is_available_page(**p)) {
            return Err(AnalyzerError::InvalidFinding(format!(
                "finding {} references page {} which was not checked",
                finding.issue_code, page
            )));
        }
    }
    Ok(result)
}

fn validate_resolve(
    ctx: &PipelineContext,
    result: ResolveResult,
) -> Result<ResolveResult, AnalyzerError> {
    if !result.is_consistent() {
        return Err(AnalyzerError::InvalidResolve(
            "an artifact path must be present exactly when a remediation was applied".to_string(),
        ));
    }
    if let Some(path) = result.remediated_artifact_path() {
        let escapes = path.components().any(|c| matches!(c, Component::ParentDir));
        if escapes || path == ctx.pdf_path || !path.starts_with(&ctx.output_dir) {
            return Err(AnalyzerError::InvalidResolve(format!(
                "artifact {} is outside the output directory",
                path.display()
            )));
        }
    }
    Ok(result)
}
