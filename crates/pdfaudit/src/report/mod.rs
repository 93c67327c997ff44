//! Typed view over the external checker's accessibility report.
//!
//! The checker returns a nested JSON document. Only the `Summary` counts and
//! the `Detailed Report` sections are interpreted; everything else is kept
//! verbatim in [`AccessibilityReport::raw`] for persistence.

mod parse;

use serde::{Deserialize, Serialize};

pub use parse::{parse_status, DETAILED_REPORT_KEY, SUMMARY_KEY};

/// Outcome of a single rule for a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    Passed,
    Failed,
    NeedsManualCheck,
}

impl RuleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleStatus::Passed => "passed",
            RuleStatus::Failed => "failed",
            RuleStatus::NeedsManualCheck => "needs_manual_check",
        }
    }

    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "passed" => Some(RuleStatus::Passed),
            "failed" => Some(RuleStatus::Failed),
            "needs_manual_check" => Some(RuleStatus::NeedsManualCheck),
            _ => None,
        }
    }
}

impl std::fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleStatus::Passed => write!(f, "Passed"),
            RuleStatus::Failed => write!(f, "Failed"),
            RuleStatus::NeedsManualCheck => write!(f, "Needs manual check"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleEvaluation {
    pub section: String,
    pub rule_id: String,
    pub description: String,
    pub status: RuleStatus,
}

/// A named section of the detailed report, in report order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub evaluations: Vec<RuleEvaluation>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub passed: u32,
    pub failed: u32,
    pub needs_manual_check: u32,
}

/// Immutable, parsed accessibility report.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessibilityReport {
    sections: Vec<Section>,
    declared_summary: Option<ReportSummary>,
    raw: serde_json::Value,
}

impl AccessibilityReport {
    /// Parses the checker's JSON. Malformed or missing detailed sections
    /// produce a report with no evaluations instead of an error.
    pub fn from_json(value: serde_json::Value) -> Self {
        let sections = parse::sections(&value);
        let declared_summary = parse::summary(&value);
        Self {
            sections,
            declared_summary,
            raw: value,
        }
    }

    /// Parses raw bytes; invalid JSON yields an empty report.
    pub fn from_slice(bytes: &[u8]) -> Self {
        match serde_json::from_slice::<serde_json::Value>(bytes) {
            Ok(value) => Self::from_json(value),
            Err(e) => {
                tracing::warn!("Accessibility report is not valid JSON: {}", e);
                Self::empty()
            }
        }
    }

    pub fn empty() -> Self {
        Self {
            sections: Vec::new(),
            declared_summary: None,
            raw: serde_json::Value::Null,
        }
    }

    /// Builds a report directly from evaluations, grouping by section in
    /// first-seen order. The raw JSON is synthesized in the checker's shape.
    pub fn from_evaluations(evaluations: Vec<RuleEvaluation>) -> Self {
        let mut sections: Vec<Section> = Vec::new();
        for evaluation in evaluations {
            match sections.iter_mut().find(|s| s.name == evaluation.section) {
                Some(section) => section.evaluations.push(evaluation),
                None => sections.push(Section {
                    name: evaluation.section.clone(),
                    evaluations: vec![evaluation],
                }),
            }
        }
        let raw = parse::to_wire(&sections);
        Self {
            sections,
            declared_summary: None,
            raw,
        }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn evaluations(&self) -> impl Iterator<Item = &RuleEvaluation> {
        self.sections.iter().flat_map(|s| s.evaluations.iter())
    }

    /// Every evaluation that is not `Passed`, in report order.
    pub fn failing_and_manual(&self) -> Vec<&RuleEvaluation> {
        self.evaluations()
            .filter(|e| e.status != RuleStatus::Passed)
            .collect()
    }

    pub fn with_status(&self, status: RuleStatus) -> impl Iterator<Item = &RuleEvaluation> {
        self.evaluations().filter(move |e| e.status == status)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(|s| s.evaluations.is_empty())
    }

    /// Summary counts as declared by the checker, or counted from the
    /// evaluations when the report carries no summary.
    pub fn summary(&self) -> ReportSummary {
        if let Some(summary) = self.declared_summary {
            return summary;
        }
        let mut summary = ReportSummary::default();
        for evaluation in self.evaluations() {
            match evaluation.status {
                RuleStatus::Passed => summary.passed += 1,
                RuleStatus::Failed => summary.failed += 1,
                RuleStatus::NeedsManualCheck => summary.needs_manual_check += 1,
            }
        }
        summary
    }

    pub fn raw(&self) -> &serde_json::Value {
        &self.raw
    }
}
