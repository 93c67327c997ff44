use super::context::PipelineContext;
use super::error::AnalyzerError;
use super::result::{IdentifyResult, ResolveResult};

/// A named unit of accessibility analysis over one document.
///
/// `identify` must not modify anything outside the analyzer's own scratch
/// state. `resolve` may write under [`PipelineContext::output_dir`] but
/// never touches the source PDF, and must be safe to repeat.
pub trait Analyzer: Send + Sync {
    /// Unique, stable name used for registration and in run records.
    fn name(&self) -> &str;

    fn title(&self) -> &str;

    fn description(&self) -> &str;

    fn identify(&self, ctx: &PipelineContext) -> Result<IdentifyResult, AnalyzerError>;

    /// Whether this analyzer has a remediation phase.
    fn supports_resolve(&self) -> bool {
        false
    }

    fn resolve(
        &self,
        _ctx: &PipelineContext,
        _identified: &IdentifyResult,
    ) -> Result<ResolveResult, AnalyzerError> {
        Ok(ResolveResult::not_applied(format!(
            "{} has no remediation step",
            self.name()
        )))
    }
}
