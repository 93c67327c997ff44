use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::result::{IdentifyResult, ResolveResult};

/// Lifecycle of a pipeline run.
///
/// A run is stored as `running` when it starts and moves exactly once to a
/// terminal status. Runs that never start are stored directly as `skipped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
            RunStatus::Skipped => "skipped",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(RunStatus::Running),
            "succeeded" => Some(RunStatus::Succeeded),
            "failed" => Some(RunStatus::Failed),
            "skipped" => Some(RunStatus::Skipped),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened in the resolve phase of a run that attempted one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResolveOutcome {
    Completed(ResolveResult),
    Failed { error: String },
}

/// Audit record of one pipeline's execution for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: String,
    /// Identifier of the processing pass that started this run.
    pub pass_id: String,
    pub document_id: i64,
    pub pipeline_name: String,
    pub status: RunStatus,
    pub attempt_resolve: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub identify: Option<IdentifyResult>,
    pub resolve: Option<ResolveOutcome>,
    pub error: Option<String>,
    /// Pages whose reports could not be fetched for this pass.
    pub failed_pages: Vec<u32>,
    /// Whether per-page collection was cut short by cancellation.
    pub pages_cancelled: bool,
}

impl PipelineRun {
    /// A fresh run in the `running` state.
    pub fn start(
        pass_id: &str,
        document_id: i64,
        pipeline_name: &str,
        attempt_resolve: bool,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            pass_id: pass_id.to_string(),
            document_id,
            pipeline_name: pipeline_name.to_string(),
            status: RunStatus::Running,
            attempt_resolve,
            started_at: Utc::now(),
            finished_at: None,
            identify: None,
            resolve: None,
            error: None,
            failed_pages: Vec::new(),
            pages_cancelled: false,
        }
    }

    pub fn succeed(&mut self, identify: IdentifyResult, resolve: Option<ResolveOutcome>) {
        self.status = RunStatus::Succeeded;
        self.identify = Some(identify);
        self.resolve = resolve;
        self.finished_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = RunStatus::Failed;
        self.error = Some(error.into());
        self.finished_at = Some(Utc::now());
    }

    pub fn skip(&mut self, reason: impl Into<String>) {
        self.status = RunStatus::Skipped;
        self.error = Some(reason.into());
        self.finished_at = Some(Utc::now());
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
}
