//! Shared test utilities for pdfaudit integration tests.
//!
//! - `TestHarness` owns a temp directory with checker reports, a PDF,
//!   an output root and a file-backed database.
//! - `ReportBuilder` writes checker reports in the wire format.

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
