use std::collections::{BTreeSet, HashMap};

use crate::pipeline::{Analyzer, AnalyzerError, IdentifyFinding, IdentifyResult, PipelineContext};
use crate::report::{AccessibilityReport, RuleStatus};

/// Reports every checker rule with a given status as a finding on the
/// pages where the checker reported it.
pub struct RuleStatusAnalyzer {
    name: &'static str,
    title: &'static str,
    description: &'static str,
    status: RuleStatus,
    noun: &'static str,
}

impl RuleStatusAnalyzer {
    pub fn failed_rules() -> Self {
        Self {
            name: "failed-rules",
            title: "Failed Checker Rules",
            description: "Lists accessibility rules the checker reported as failed, per page.",
            status: RuleStatus::Failed,
            noun: "failing rule(s)",
        }
    }

    pub fn manual_checks() -> Self {
        Self {
            name: "manual-checks",
            title: "Rules Needing Manual Review",
            description: "Lists accessibility rules the checker could not decide automatically.",
            status: RuleStatus::NeedsManualCheck,
            noun: "rule(s) needing manual check",
        }
    }

    pub fn status(&self) -> RuleStatus {
        self.status
    }

    fn collect<'r>(
        &self,
        sources: impl IntoIterator<Item = (Vec<u32>, &'r AccessibilityReport)>,
    ) -> Vec<IdentifyFinding> {
        let mut findings: Vec<IdentifyFinding> = Vec::new();
        let mut index: HashMap<(String, String, String), usize> = HashMap::new();

        for (pages, report) in sources {
            for evaluation in report.with_status(self.status) {
                let key = (
                    evaluation.section.clone(),
                    evaluation.rule_id.clone(),
                    evaluation.description.clone(),
                );
                let slot = *index.entry(key).or_insert_with(|| {
                    findings.push(IdentifyFinding::from_evaluation(evaluation));
                    findings.len() - 1
                });
                findings[slot].pages.extend(pages.iter().copied());
            }
        }
        findings
    }
}

impl Analyzer for RuleStatusAnalyzer {
    fn name(&self) -> &str {
        self.name
    }

    fn title(&self) -> &str {
        self.title
    }

    fn description(&self) -> &str {
        self.description
    }

    fn identify(&self, ctx: &PipelineContext) -> Result<IdentifyResult, AnalyzerError> {
        let checked_pages = ctx.available_pages();
        let mut findings = match &ctx.page_reports {
            Some(reports) => self.collect(
                reports
                    .iter()
                    .filter(|(page, _)| ctx.page_range.contains(**page))
                    .map(|(page, report)| (vec![*page], report)),
            ),
            None => self.collect([(checked_pages.clone(), &ctx.document_report)]),
        };

        if findings.is_empty() {
            return Ok(IdentifyResult::clean(format!(
                "No {} on {} checked page(s)",
                self.noun,
                checked_pages.len()
            )));
        }

        let mut affected = BTreeSet::new();
        for finding in &mut findings {
            finding.detail = Some(format!(
                "Reported as {} on {} of {} checked page(s)",
                finding.status,
                finding.pages.len(),
                checked_pages.len()
            ));
            affected.extend(finding.pages.iter().copied());
        }

        let summary = format!(
            "{} {} across {} page(s)",
            findings.len(),
            self.noun,
            affected.len()
        );
        Ok(IdentifyResult::with_findings(findings, summary))
    }
}
