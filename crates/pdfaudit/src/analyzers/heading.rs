use crate::pipeline::{
    Analyzer, AnalyzerError, HeadingCheck, IdentifyFinding, IdentifyResult, PipelineContext,
};
use crate::report::RuleStatus;

use super::{truncate, DOCUMENT_SECTION};

pub const MISSING_H1_CODE: &str = "document.missing_h1";

/// Flags documents without a top-level heading.
pub struct HeadingPresence;

impl Analyzer for HeadingPresence {
    fn name(&self) -> &str {
        "h1-heading-presence"
    }

    fn title(&self) -> &str {
        "H1 Heading Presence"
    }

    fn description(&self) -> &str {
        "Detects whether the document structure yields a top-level heading."
    }

    fn identify(&self, ctx: &PipelineContext) -> Result<IdentifyResult, AnalyzerError> {
        match &ctx.heading {
            HeadingCheck::NotChecked => Ok(IdentifyResult::clean(
                "Heading structure was not checked for this pass.",
            )),
            HeadingCheck::Found(text) => Ok(IdentifyResult::clean(format!(
                "Found top-level heading: {}",
                truncate(text, 120)
            ))),
            HeadingCheck::Missing => {
                let pages = ctx.available_pages();
                if pages.is_empty() {
                    return Ok(IdentifyResult::clean(
                        "No H1 heading detected, but no page was checked to attribute it to.",
                    ));
                }
                let finding = IdentifyFinding::new(
                    DOCUMENT_SECTION,
                    MISSING_H1_CODE,
                    "Document lacks a top-level H1 heading",
                    RuleStatus::Failed,
                )
                .with_detail(
                    "Structural extraction could not locate an H1/Title element. \
                     Manual remediation is required to add a logical document heading (WCAG 2.4.6).",
                )
                .on_pages(pages);
                Ok(IdentifyResult::with_findings(
                    vec![finding],
                    "No H1 heading detected in the document structure.",
                ))
            }
        }
    }
}
