//! Partitioning of per-page issues into document-wide and page-specific groups.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::db::issue_repo::{self, IssueRow};
use crate::db::{Database, DatabaseError};
use crate::pipeline::IdentifyFinding;
use crate::report::{AccessibilityReport, RuleEvaluation, RuleStatus};

/// Identity of an issue independent of the page or pipeline reporting it.
///
/// Field order defines the sort order of aggregated output.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IssueKey {
    pub section: String,
    pub rule_id: String,
    pub description: String,
    pub status: RuleStatus,
}

impl IssueKey {
    pub fn new(
        section: impl Into<String>,
        rule_id: impl Into<String>,
        description: impl Into<String>,
        status: RuleStatus,
    ) -> Self {
        Self {
            section: section.into(),
            rule_id: rule_id.into(),
            description: description.into(),
            status,
        }
    }

    pub fn from_evaluation(evaluation: &RuleEvaluation) -> Self {
        Self::new(
            evaluation.section.clone(),
            evaluation.rule_id.clone(),
            evaluation.description.clone(),
            evaluation.status,
        )
    }

    pub fn from_finding(finding: &IdentifyFinding) -> Self {
        Self::new(
            finding.section.clone(),
            finding.issue_code.clone(),
            finding.summary.clone(),
            finding.status,
        )
    }

    /// `None` when the stored status is not a known rule status.
    pub fn from_issue_row(row: &IssueRow) -> Option<Self> {
        Some(Self::new(
            row.section.clone(),
            row.issue_code.clone(),
            row.summary.clone(),
            row.rule_status()?,
        ))
    }
}

/// Issues present on every page that has any issue, and the rest per page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FindingsView {
    pub shared: Vec<IssueKey>,
    /// Page-specific issues; pages without any are omitted.
    pub per_page: BTreeMap<u32, Vec<IssueKey>>,
}

impl FindingsView {
    pub fn is_empty(&self) -> bool {
        self.shared.is_empty() && self.per_page.is_empty()
    }
}

/// Partitions `(page, key)` pairs.
///
/// Shared issues exist only when at least two pages carry issues, and are
/// the keys found on all of them. Duplicate pairs collapse.
pub fn aggregate<I>(issues: I) -> FindingsView
where
    I: IntoIterator<Item = (u32, IssueKey)>,
{
    let mut by_page: BTreeMap<u32, BTreeSet<IssueKey>> = BTreeMap::new();
    for (page, key) in issues {
        by_page.entry(page).or_default().insert(key);
    }

    let shared: BTreeSet<IssueKey> = if by_page.len() < 2 {
        BTreeSet::new()
    } else {
        let mut pages = by_page.values();
        let first = pages.next().cloned().unwrap_or_default();
        pages.fold(first, |acc, keys| acc.intersection(keys).cloned().collect())
    };

    let per_page = by_page
        .into_iter()
        .filter_map(|(page, keys)| {
            let specific: Vec<IssueKey> = keys.difference(&shared).cloned().collect();
            (!specific.is_empty()).then_some((page, specific))
        })
        .collect();

    FindingsView {
        shared: shared.into_iter().collect(),
        per_page,
    }
}

/// Aggregates the failing and manual-check evaluations of per-page reports.
pub fn aggregate_reports(reports: &BTreeMap<u32, AccessibilityReport>) -> FindingsView {
    aggregate(reports.iter().flat_map(|(page, report)| {
        report
            .failing_and_manual()
            .into_iter()
            .map(move |e| (*page, IssueKey::from_evaluation(e)))
    }))
}

/// Current shared/page-specific findings for a document, computed from the
/// issues of each pipeline's latest succeeded run.
pub fn findings_for_document(db: &Database, document_id: i64) -> Result<FindingsView, DatabaseError> {
    let rows = issue_repo::current_for_document(db, document_id)?;
    let pairs = rows.iter().filter_map(|row| match IssueKey::from_issue_row(row) {
        Some(key) => Some((row.page_number, key)),
        None => {
            warn!(issue_id = row.id, status = %row.status, "Ignoring issue with unknown status");
            None
        }
    });
    Ok(aggregate(pairs))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contrast() -> IssueKey {
        IssueKey::new("Text", "Rule-508-1", "Insufficient contrast", RuleStatus::Failed)
    }

    fn alt_text() -> IssueKey {
        IssueKey::new("Image", "Rule-508-7", "Missing alt text", RuleStatus::Failed)
    }

    #[test]
    fn test_shared_and_specific_partition() {
        let view = aggregate(vec![
            (1, contrast()),
            (2, contrast()),
            (2, alt_text()),
            (3, contrast()),
        ]);
        assert_eq!(view.shared, vec![contrast()]);
        assert_eq!(view.per_page.len(), 1);
        assert_eq!(view.per_page[&2], vec![alt_text()]);
    }

    #[test]
    fn test_single_page_has_no_shared_issues() {
        let view = aggregate(vec![(1, contrast())]);
        assert!(view.shared.is_empty());
        assert_eq!(view.per_page[&1], vec![contrast()]);
    }

    #[test]
    fn test_no_issues() {
        let view = aggregate(Vec::new());
        assert!(view.is_empty());
    }

    #[test]
    fn test_status_is_part_of_identity() {
        let manual = IssueKey {
            status: RuleStatus::NeedsManualCheck,
            ..contrast()
        };
        let view = aggregate(vec![(1, contrast()), (2, manual.clone())]);
        assert!(view.shared.is_empty());
        assert_eq!(view.per_page[&1], vec![contrast()]);
        assert_eq!(view.per_page[&2], vec![manual]);
    }

    #[test]
    fn test_output_is_sorted_and_deduplicated() {
        let view = aggregate(vec![
            (4, alt_text()),
            (4, contrast()),
            (4, alt_text()),
            (2, contrast()),
        ]);
        assert_eq!(view.shared, vec![contrast()]);
        assert_eq!(view.per_page.keys().copied().collect::<Vec<_>>(), vec![4]);
        assert_eq!(view.per_page[&4], vec![alt_text()]);

        let reordered = aggregate(vec![(2, contrast()), (4, alt_text()), (4, contrast())]);
        assert_eq!(view, reordered);
    }

    #[test]
    fn test_every_issue_shared() {
        let view = aggregate(vec![(1, contrast()), (2, contrast())]);
        assert_eq!(view.shared, vec![contrast()]);
        assert!(view.per_page.is_empty());
    }

    #[test]
    fn test_aggregate_reports_ignores_passed_rules() {
        let page = |extra: Option<RuleEvaluation>| {
            let mut evaluations = vec![
                RuleEvaluation {
                    section: "Text".into(),
                    rule_id: "Rule-508-1".into(),
                    description: "Insufficient contrast".into(),
                    status: RuleStatus::Failed,
                },
                RuleEvaluation {
                    section: "Text".into(),
                    rule_id: "Rule-508-2".into(),
                    description: "Fonts embedded".into(),
                    status: RuleStatus::Passed,
                },
            ];
            evaluations.extend(extra);
            AccessibilityReport::from_evaluations(evaluations)
        };
        let reports: BTreeMap<u32, AccessibilityReport> = [
            (1, page(None)),
            (
                2,
                page(Some(RuleEvaluation {
                    section: "Image".into(),
                    rule_id: "Rule-508-7".into(),
                    description: "Missing alt text".into(),
                    status: RuleStatus::Failed,
                })),
            ),
        ]
        .into_iter()
        .collect();

        let view = aggregate_reports(&reports);
        assert_eq!(view.shared, vec![contrast()]);
        assert_eq!(view.per_page[&2], vec![alt_text()]);
    }

    #[test]
    fn test_finding_key_matches_evaluation_key() {
        let evaluation = RuleEvaluation {
            section: "Text".into(),
            rule_id: "Rule-508-1".into(),
            description: "Insufficient contrast".into(),
            status: RuleStatus::Failed,
        };
        let finding = IdentifyFinding::from_evaluation(&evaluation).on_pages([9]);
        assert_eq!(IssueKey::from_finding(&finding), IssueKey::from_evaluation(&evaluation));
    }
}
