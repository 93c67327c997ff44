pub mod analyzers;
pub mod cancel;
pub mod checker;
pub mod collector;
pub mod config;
pub mod db;
pub mod error;
pub mod findings;
pub mod pdf;
pub mod pipeline;
pub mod processing;
pub mod report;
pub mod telemetry;

pub use cancel::CancellationToken;
pub use checker::{AccessibilityChecker, DirectoryChecker, PageRange};
pub use collector::{CollectionOutcome, PageReportCollector, RetryPolicy};
pub use config::{load_config, load_config_or_default, Config};
pub use db::{Database, DatabaseError};
pub use error::{
    ConfigError, FetchError, PdfauditError, ProcessError, RegistryError, Result,
};
pub use findings::{findings_for_document, FindingsView, IssueKey};
pub use pipeline::{
    Analyzer, AnalyzerError, HeadingCheck, IdentifyFinding, IdentifyResult, PipelineContext,
    PipelineManager, PipelineRegistry, PipelineRun, ResolveResult, RunStatus,
};
pub use processing::{DocumentProcessor, PassOutcome, PassRequest};
pub use report::{AccessibilityReport, RuleEvaluation, RuleStatus};
