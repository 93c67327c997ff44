//! Analyzer contract, registry and the manager that runs them.

mod analyzer;
mod context;
mod error;
mod guard;
mod manager;
mod progress;
mod registry;
mod result;
mod run;

pub use analyzer::Analyzer;
pub use context::{HeadingCheck, PipelineContext};
pub use error::AnalyzerError;
pub use guard::{InFlightGuard, InFlightRuns};
pub use manager::{PassInfo, PipelineManager, DEFAULT_STALE_AFTER};
pub use progress::{BroadcastProgress, NoopProgress, ProgressEvent, ProgressReporter};
pub use registry::PipelineRegistry;
pub use result::{IdentifyFinding, IdentifyResult, ResolveResult};
pub use run::{PipelineRun, ResolveOutcome, RunStatus};
