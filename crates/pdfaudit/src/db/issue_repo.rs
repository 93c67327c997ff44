//! Issue repository: per-page findings in the `pipeline_issues` table.

use rusqlite::{params, Row, Transaction};

use crate::pipeline::{IdentifyFinding, PipelineRun};
use crate::report::RuleStatus;

use super::{Database, DatabaseError};

/// One stored issue: a finding expanded onto a single page.
#[derive(Debug, Clone, PartialEq)]
pub struct IssueRow {
    pub id: i64,
    pub run_id: String,
    pub document_id: i64,
    pub pipeline_name: String,
    pub page_number: u32,
    pub section: String,
    pub issue_code: String,
    pub summary: String,
    pub detail: Option<String>,
    pub status: String,
}

impl IssueRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            run_id: row.get("run_id")?,
            document_id: row.get("document_id")?,
            pipeline_name: row.get("pipeline_name")?,
            page_number: row.get("page_number")?,
            section: row.get("section")?,
            issue_code: row.get("issue_code")?,
            summary: row.get("summary")?,
            detail: row.get("detail")?,
            status: row.get("status")?,
        })
    }

    pub fn rule_status(&self) -> Option<RuleStatus> {
        RuleStatus::from_db(&self.status)
    }
}

/// Writes one row per (finding, page) for the given run.
pub(crate) fn insert_findings(
    tx: &Transaction<'_>,
    run: &PipelineRun,
    findings: &[IdentifyFinding],
) -> Result<(), DatabaseError> {
    let mut stmt = tx.prepare(
        "INSERT INTO pipeline_issues (run_id, document_id, pipeline_name, page_number,
         section, issue_code, summary, detail, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;
    for finding in findings {
        for page in &finding.pages {
            stmt.execute(params![
                run.id,
                run.document_id,
                run.pipeline_name,
                page,
                finding.section,
                finding.issue_code,
                finding.summary,
                finding.detail,
                finding.status.as_str(),
            ])?;
        }
    }
    Ok(())
}

pub fn list_for_run(db: &Database, run_id: &str) -> Result<Vec<IssueRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM pipeline_issues WHERE run_id = ?1 ORDER BY id")?;
        let rows = stmt
            .query_map(params![run_id], IssueRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Issues describing the document's current state.
///
/// For each pipeline only the most recent succeeded run counts; older runs,
/// failed runs and skipped runs contribute nothing.
pub fn current_for_document(db: &Database, document_id: i64) -> Result<Vec<IssueRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT i.* FROM pipeline_issues i
             WHERE i.document_id = ?1 AND i.run_id IN (
                 SELECT r.id FROM pipeline_runs r
                 WHERE r.document_id = ?1 AND r.status = 'succeeded'
                   AND r.rowid = (
                       SELECT MAX(r2.rowid) FROM pipeline_runs r2
                       WHERE r2.document_id = r.document_id
                         AND r2.pipeline_name = r.pipeline_name
                         AND r2.status = 'succeeded'
                   )
             )
             ORDER BY i.page_number, i.id",
        )?;
        let rows = stmt
            .query_map(params![document_id], IssueRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
