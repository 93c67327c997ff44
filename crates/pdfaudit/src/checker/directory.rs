use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::FetchError;
use crate::report::AccessibilityReport;

use super::{AccessibilityChecker, PageRange};

/// Serves reports previously produced by the checking service and saved
/// as JSON: `document.json` for the whole document and `page-<n>.json`
/// per page.
pub struct DirectoryChecker {
    directory: PathBuf,
}

impl DirectoryChecker {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    pub fn document_report_path(&self) -> PathBuf {
        self.directory.join("document.json")
    }

    pub fn page_report_path(&self, page: u32) -> PathBuf {
        self.directory.join(format!("page-{}.json", page))
    }

    fn load(&self, path: &Path) -> Result<AccessibilityReport, FetchError> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(AccessibilityReport::from_slice(&bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(FetchError::Permanent(format!(
                "report not found: {}",
                path.display()
            ))),
            Err(e) => Err(FetchError::Transient(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

impl AccessibilityChecker for DirectoryChecker {
    fn check(
        &self,
        pdf_path: &Path,
        pages: Option<PageRange>,
    ) -> Result<AccessibilityReport, FetchError> {
        if !pdf_path.exists() {
            return Err(FetchError::Permanent(format!(
                "PDF file not found: {}",
                pdf_path.display()
            )));
        }

        match pages {
            None => self.load(&self.document_report_path()),
            Some(range) if range.start == range.end => self.load(&self.page_report_path(range.start)),
            Some(range) => Err(FetchError::Permanent(format!(
                "only single-page reports are stored, requested {}",
                range
            ))),
        }
    }
}
