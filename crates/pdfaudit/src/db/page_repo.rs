//! Page result repository: the latest checker report per page in `page_results`.

use std::collections::BTreeMap;

use rusqlite::{params, Row};

use crate::report::AccessibilityReport;

use super::{timestamp, Database, DatabaseError};

/// A stored per-page checker report.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResultRow {
    pub document_id: i64,
    pub page_number: u32,
    /// Pass that last wrote this page.
    pub pass_id: String,
    pub passed: u32,
    pub failed: u32,
    pub needs_manual_check: u32,
    pub report_json: String,
    pub updated_at: String,
}

impl PageResultRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            document_id: row.get("document_id")?,
            page_number: row.get("page_number")?,
            pass_id: row.get("pass_id")?,
            passed: row.get("passed")?,
            failed: row.get("failed")?,
            needs_manual_check: row.get("needs_manual_check")?,
            report_json: row.get("report_json")?,
            updated_at: row.get("updated_at")?,
        })
    }

    pub fn report(&self) -> AccessibilityReport {
        AccessibilityReport::from_slice(self.report_json.as_bytes())
    }
}

/// Stores collected page reports, replacing earlier rows for the same pages.
///
/// Pages absent from `reports` keep whatever an earlier pass stored.
pub fn upsert_pages(
    db: &Database,
    pass_id: &str,
    document_id: i64,
    reports: &BTreeMap<u32, AccessibilityReport>,
) -> Result<(), DatabaseError> {
    let updated_at = timestamp(chrono::Utc::now());
    let encoded = reports
        .iter()
        .map(|(page, report)| Ok((*page, report.summary(), serde_json::to_string(report.raw())?)))
        .collect::<Result<Vec<_>, DatabaseError>>()?;

    db.with_transaction(|tx| {
        let mut stmt = tx.prepare(
            "INSERT INTO page_results (document_id, page_number, pass_id, passed, failed,
             needs_manual_check, report_json, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(document_id, page_number) DO UPDATE SET
                 pass_id = excluded.pass_id,
                 passed = excluded.passed,
                 failed = excluded.failed,
                 needs_manual_check = excluded.needs_manual_check,
                 report_json = excluded.report_json,
                 updated_at = excluded.updated_at",
        )?;
        for (page, summary, json) in &encoded {
            stmt.execute(params![
                document_id,
                page,
                pass_id,
                summary.passed,
                summary.failed,
                summary.needs_manual_check,
                json,
                updated_at,
            ])?;
        }
        Ok(())
    })
}

pub fn list_for_document(db: &Database, document_id: i64) -> Result<Vec<PageResultRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM page_results WHERE document_id = ?1 ORDER BY page_number",
        )?;
        let rows = stmt
            .query_map(params![document_id], PageResultRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
