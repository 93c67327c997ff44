//! Pipeline run repository: audit records in the `pipeline_runs` table.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use crate::pipeline::{IdentifyFinding, PipelineRun, RunStatus};

use super::{issue_repo, parse_timestamp, timestamp, Database, DatabaseError};

/// A raw run row from the database.
#[derive(Debug, Clone)]
struct RunRow {
    id: String,
    pass_id: String,
    document_id: i64,
    pipeline_name: String,
    status: String,
    attempt_resolve: bool,
    started_at: String,
    finished_at: Option<String>,
    identify_payload: Option<String>,
    resolve_payload: Option<String>,
    error: Option<String>,
    failed_pages: String,
    pages_cancelled: bool,
}

impl RunRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            pass_id: row.get("pass_id")?,
            document_id: row.get("document_id")?,
            pipeline_name: row.get("pipeline_name")?,
            status: row.get("status")?,
            attempt_resolve: row.get("attempt_resolve")?,
            started_at: row.get("started_at")?,
            finished_at: row.get("finished_at")?,
            identify_payload: row.get("identify_payload")?,
            resolve_payload: row.get("resolve_payload")?,
            error: row.get("error")?,
            failed_pages: row.get("failed_pages")?,
            pages_cancelled: row.get("pages_cancelled")?,
        })
    }

    fn into_run(self) -> Result<PipelineRun, DatabaseError> {
        let status = RunStatus::parse(&self.status).ok_or(DatabaseError::InvalidValue {
            column: "status",
            value: self.status.clone(),
        })?;
        Ok(PipelineRun {
            started_at: parse_timestamp("started_at", &self.started_at)?,
            finished_at: self
                .finished_at
                .as_deref()
                .map(|t| parse_timestamp("finished_at", t))
                .transpose()?,
            identify: self
                .identify_payload
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            resolve: self
                .resolve_payload
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            failed_pages: serde_json::from_str(&self.failed_pages)?,
            id: self.id,
            pass_id: self.pass_id,
            document_id: self.document_id,
            pipeline_name: self.pipeline_name,
            status,
            attempt_resolve: self.attempt_resolve,
            error: self.error,
            pages_cancelled: self.pages_cancelled,
        })
    }
}

fn collect_runs(conn: &Connection, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<PipelineRun>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, RunRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(RunRow::into_run).collect()
}

const INSERT_RUN: &str = "INSERT INTO pipeline_runs (id, pass_id, document_id, pipeline_name, status,
     attempt_resolve, started_at, finished_at, identify_payload, resolve_payload,
     error, failed_pages, pages_cancelled)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)";

const ABANDONED: &str = "abandoned: no result was recorded before the run went stale";

fn insert_row(conn: &Connection, run: &PipelineRun) -> Result<(), DatabaseError> {
    let identify = run.identify.as_ref().map(serde_json::to_string).transpose()?;
    let resolve = run.resolve.as_ref().map(serde_json::to_string).transpose()?;
    let failed_pages = serde_json::to_string(&run.failed_pages)?;
    conn.execute(
        INSERT_RUN,
        params![
            run.id,
            run.pass_id,
            run.document_id,
            run.pipeline_name,
            run.status.as_str(),
            run.attempt_resolve,
            timestamp(run.started_at),
            run.finished_at.map(timestamp),
            identify,
            resolve,
            run.error,
            failed_pages,
            run.pages_cancelled,
        ],
    )?;
    Ok(())
}

/// Inserts a run record as it currently stands.
///
/// Used for runs stored directly as `skipped`; running runs go through
/// [`claim`].
pub fn insert(db: &Database, run: &PipelineRun) -> Result<(), DatabaseError> {
    db.with_conn(|conn| insert_row(conn, run))
}

/// Inserts an unfinished run unless the document already has an open run
/// of the same pipeline, from this process or any other sharing the
/// database file. Returns `false` when the claim is held elsewhere.
///
/// Open runs started before `stale_before` belong to a process that died
/// mid-run; they are closed as failed and the claim proceeds.
pub fn claim(
    db: &Database,
    run: &PipelineRun,
    stale_before: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    db.with_transaction(|tx| {
        let abandoned = tx.execute(
            "UPDATE pipeline_runs SET status = ?4, finished_at = ?5, error = ?6
             WHERE document_id = ?1 AND pipeline_name = ?2 AND finished_at IS NULL
               AND started_at < ?3",
            params![
                run.document_id,
                run.pipeline_name,
                timestamp(stale_before),
                RunStatus::Failed.as_str(),
                timestamp(Utc::now()),
                ABANDONED,
            ],
        )?;
        if abandoned > 0 {
            log::warn!(
                "Closed {} abandoned run(s) of {} for document {}",
                abandoned,
                run.pipeline_name,
                run.document_id
            );
        }

        match insert_row(tx, run) {
            Ok(()) => Ok(true),
            Err(DatabaseError::Sqlite(rusqlite::Error::SqliteFailure(e, _)))
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    })
}

/// Writes the terminal state of a running run together with its issues.
///
/// Fails with [`DatabaseError::RunAlreadyFinalized`] when the stored run
/// is no longer open. Nothing is written in that case.
pub fn finalize(
    db: &Database,
    run: &PipelineRun,
    findings: &[IdentifyFinding],
) -> Result<(), DatabaseError> {
    let finished_at = run.finished_at.ok_or(DatabaseError::InvalidValue {
        column: "finished_at",
        value: "NULL".to_string(),
    })?;
    let identify = run.identify.as_ref().map(serde_json::to_string).transpose()?;
    let resolve = run.resolve.as_ref().map(serde_json::to_string).transpose()?;

    db.with_transaction(|tx| {
        let changed = tx.execute(
            "UPDATE pipeline_runs SET status = ?2, finished_at = ?3, identify_payload = ?4,
             resolve_payload = ?5, error = ?6
             WHERE id = ?1 AND finished_at IS NULL",
            params![
                run.id,
                run.status.as_str(),
                timestamp(finished_at),
                identify,
                resolve,
                run.error,
            ],
        )?;
        if changed == 0 {
            return Err(DatabaseError::RunAlreadyFinalized { id: run.id.clone() });
        }
        issue_repo::insert_findings(tx, run, findings)
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<PipelineRun>, DatabaseError> {
    db.with_conn(|conn| {
        let mut runs = collect_runs(conn, "SELECT * FROM pipeline_runs WHERE id = ?1", &[&id])?;
        Ok(runs.pop())
    })
}

/// All runs for a document, oldest first. Optionally narrowed to one pipeline.
pub fn list_for_document(
    db: &Database,
    document_id: i64,
    pipeline: Option<&str>,
) -> Result<Vec<PipelineRun>, DatabaseError> {
    db.with_conn(|conn| match pipeline {
        Some(name) => collect_runs(
            conn,
            "SELECT * FROM pipeline_runs WHERE document_id = ?1 AND pipeline_name = ?2
             ORDER BY rowid",
            &[&document_id, &name],
        ),
        None => collect_runs(
            conn,
            "SELECT * FROM pipeline_runs WHERE document_id = ?1 ORDER BY rowid",
            &[&document_id],
        ),
    })
}

pub fn list_for_pass(db: &Database, pass_id: &str) -> Result<Vec<PipelineRun>, DatabaseError> {
    db.with_conn(|conn| {
        collect_runs(
            conn,
            "SELECT * FROM pipeline_runs WHERE pass_id = ?1 ORDER BY rowid",
            &[&pass_id],
        )
    })
}
