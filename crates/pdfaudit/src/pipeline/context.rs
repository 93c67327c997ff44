use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::checker::PageRange;
use crate::report::AccessibilityReport;

/// Result of looking for the document's top-level heading.
///
/// Heading extraction happens outside this crate; callers pass its outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "text", rename_all = "snake_case")]
pub enum HeadingCheck {
    #[default]
    NotChecked,
    Missing,
    Found(String),
}

/// Everything an analyzer may look at for one document in one pass.
///
/// Read-only once built. Analyzers that need scratch state keep it local.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub document_id: i64,
    pub pdf_path: PathBuf,
    pub tagged_pdf_path: Option<PathBuf>,
    pub page_range: PageRange,
    pub document_report: AccessibilityReport,
    /// Per-page reports keyed by page number, when per-page collection ran.
    /// Pages whose fetch failed are absent.
    pub page_reports: Option<BTreeMap<u32, AccessibilityReport>>,
    pub heading: HeadingCheck,
    /// Directory where resolve phases stage their artifacts.
    pub output_dir: PathBuf,
}

impl PipelineContext {
    pub fn new(
        document_id: i64,
        pdf_path: impl Into<PathBuf>,
        page_range: PageRange,
        document_report: AccessibilityReport,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            document_id,
            pdf_path: pdf_path.into(),
            tagged_pdf_path: None,
            page_range,
            document_report,
            page_reports: None,
            heading: HeadingCheck::NotChecked,
            output_dir: output_dir.into(),
        }
    }

    pub fn with_page_reports(mut self, reports: BTreeMap<u32, AccessibilityReport>) -> Self {
        self.page_reports = Some(reports);
        self
    }

    pub fn with_tagged_pdf(mut self, path: impl Into<PathBuf>) -> Self {
        self.tagged_pdf_path = Some(path.into());
        self
    }

    pub fn with_heading(mut self, heading: HeadingCheck) -> Self {
        self.heading = heading;
        self
    }

    /// The PDF analyzers should inspect: the tagged variant when one exists.
    pub fn effective_pdf(&self) -> &Path {
        self.tagged_pdf_path.as_deref().unwrap_or(&self.pdf_path)
    }

    /// Pages findings may be attributed to.
    ///
    /// With per-page reports these are the pages that were actually checked;
    /// otherwise every page of the range.
    pub fn available_pages(&self) -> Vec<u32> {
        match &self.page_reports {
            Some(reports) => reports
                .keys()
                .copied()
                .filter(|p| self.page_range.contains(*p))
                .collect(),
            None => self.page_range.pages().collect(),
        }
    }

    pub fn is_available_page(&self, page: u32) -> bool {
        match &self.page_reports {
            Some(reports) => self.page_range.contains(page) && reports.contains_key(&page),
            None => self.page_range.contains(page),
        }
    }

    /// Heading text when the check found one.
    pub fn heading_text(&self) -> Option<&str> {
        match &self.heading {
            HeadingCheck::Found(text) => Some(text.as_str()),
            _ => None,
        }
    }
}
