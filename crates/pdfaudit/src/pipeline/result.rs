use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::report::{RuleEvaluation, RuleStatus};

/// One accessibility issue found by an analyzer, attributed to one or more pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyFinding {
    pub section: String,
    /// Stable identifier of the rule or check, e.g. a checker rule id.
    pub issue_code: String,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub status: RuleStatus,
    pub pages: BTreeSet<u32>,
}

impl IdentifyFinding {
    pub fn new(
        section: impl Into<String>,
        issue_code: impl Into<String>,
        summary: impl Into<String>,
        status: RuleStatus,
    ) -> Self {
        Self {
            section: section.into(),
            issue_code: issue_code.into(),
            summary: summary.into(),
            detail: None,
            status,
            pages: BTreeSet::new(),
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

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn on_pages(mut self, pages: impl IntoIterator<Item = u32>) -> Self {
        self.pages.extend(pages);
        self
    }
}

/// Output of an analyzer's identify phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyResult {
    pub findings: Vec<IdentifyFinding>,
    pub summary: String,
}

impl IdentifyResult {
    pub fn clean(summary: impl Into<String>) -> Self {
        Self {
            findings: Vec::new(),
            summary: summary.into(),
        }
    }

    pub fn with_findings(findings: Vec<IdentifyFinding>, summary: impl Into<String>) -> Self {
        Self {
            findings,
            summary: summary.into(),
        }
    }

    pub fn has_findings(&self) -> bool {
        !self.findings.is_empty()
    }

    /// Number of per-page issue records these findings expand to.
    pub fn issue_count(&self) -> usize {
        self.findings.iter().map(|f| f.pages.len()).sum()
    }
}

/// Output of an analyzer's resolve phase.
///
/// An artifact path is present exactly when a remediation was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveResult {
    applied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    remediated_artifact_path: Option<PathBuf>,
    description: String,
}

impl ResolveResult {
    pub fn applied(artifact: impl Into<PathBuf>, description: impl Into<String>) -> Self {
        Self {
            applied: true,
            remediated_artifact_path: Some(artifact.into()),
            description: description.into(),
        }
    }

    pub fn not_applied(description: impl Into<String>) -> Self {
        Self {
            applied: false,
            remediated_artifact_path: None,
            description: description.into(),
        }
    }

    pub fn is_applied(&self) -> bool {
        self.applied
    }

    pub fn remediated_artifact_path(&self) -> Option<&Path> {
        self.remediated_artifact_path.as_deref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub(crate) fn is_consistent(&self) -> bool {
        self.applied == self.remediated_artifact_path.is_some()
    }
}
