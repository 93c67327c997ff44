//! Test harness for isolated processing passes.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tempfile::TempDir;

use pdfaudit::config::RetryConfig;

use super::builders::write_blank_pdf;
use pdfaudit::{
    AccessibilityChecker, Config, Database, DirectoryChecker, DocumentProcessor, PageRange,
    PassRequest, PipelineManager, PipelineRegistry,
};

/// Page count of the sample PDF every harness starts with.
pub const SAMPLE_PAGES: u32 = 5;

pub struct TestHarness {
    temp_dir: TempDir,
    /// Directory the `DirectoryChecker` reads reports from.
    pub reports_dir: PathBuf,
    pub output_root: PathBuf,
    pub pdf_path: PathBuf,
    pub db: Database,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_pdf_name("scan_0042.pdf")
    }

    pub fn with_pdf_name(name: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();

        let reports_dir = base.join("reports");
        let output_root = base.join("output");
        std::fs::create_dir_all(&reports_dir).expect("Failed to create reports dir");

        let pdf_path = base.join(name);
        write_blank_pdf(&pdf_path, SAMPLE_PAGES);

        let db = Database::open(&base.join("db").join("pdfaudit.db"))
            .expect("Failed to open database");

        Self {
            temp_dir,
            reports_dir,
            output_root,
            pdf_path,
            db,
        }
    }

    pub fn base(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn db_path(&self) -> PathBuf {
        self.base().join("db").join("pdfaudit.db")
    }

    /// A second, independent connection to the same database file, as a
    /// separate process would have.
    pub fn reopen_db(&self) -> Database {
        Database::open(&self.db_path()).expect("Failed to reopen database")
    }

    pub fn write_document_report(&self, report: &Value) {
        std::fs::write(self.reports_dir.join("document.json"), report.to_string())
            .expect("Failed to write document report");
    }

    pub fn write_page_report(&self, page: u32, report: &Value) {
        std::fs::write(
            self.reports_dir.join(format!("page-{}.json", page)),
            report.to_string(),
        )
        .expect("Failed to write page report");
    }

    pub fn remove_page_report(&self, page: u32) {
        let _ = std::fs::remove_file(self.reports_dir.join(format!("page-{}.json", page)));
    }

    pub fn config(&self) -> Config {
        Config {
            worker_count: 2,
            retry: RetryConfig {
                max_retries: 2,
                initial_backoff_ms: 1,
                max_backoff_ms: 2,
                multiplier: 2.0,
            },
            output_root: self.output_root.clone(),
            database_path: None,
            ..Config::default()
        }
    }

    pub fn checker(&self) -> Arc<dyn AccessibilityChecker> {
        Arc::new(DirectoryChecker::new(&self.reports_dir))
    }

    /// Processor with every built-in analyzer over the report directory.
    pub fn processor(&self) -> DocumentProcessor {
        let registry = PipelineRegistry::builtin().expect("builtin registry");
        self.processor_with(self.checker(), registry)
    }

    pub fn processor_with(
        &self,
        checker: Arc<dyn AccessibilityChecker>,
        registry: PipelineRegistry,
    ) -> DocumentProcessor {
        self.processor_on(self.db.clone(), checker, registry)
    }

    pub fn processor_on(
        &self,
        db: Database,
        checker: Arc<dyn AccessibilityChecker>,
        registry: PipelineRegistry,
    ) -> DocumentProcessor {
        let manager = PipelineManager::new(Arc::new(registry), db.clone());
        DocumentProcessor::new(&self.config(), checker, manager, db)
    }

    pub fn request(&self, document_id: i64, start: u32, end: u32) -> PassRequest {
        let mut request = PassRequest::new(document_id, &self.pdf_path);
        request.page_range = PageRange::new(start, end);
        request
    }
}
