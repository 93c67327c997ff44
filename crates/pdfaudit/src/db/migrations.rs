//! Database migration system.
//!
//! Tracks applied migrations in a `_migrations` table and applies
//! pending ones in order.

use rusqlite::Connection;

use super::error::DatabaseError;

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

/// All migrations in order. Each is applied at most once.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_page_results_table",
        sql: include_str!("sql/001_create_page_results.sql"),
    },
    Migration {
        version: 2,
        description: "create_pipeline_runs_table",
        sql: include_str!("sql/002_create_pipeline_runs.sql"),
    },
    Migration {
        version: 3,
        description: "create_pipeline_issues_table",
        sql: include_str!("sql/003_create_pipeline_issues.sql"),
    },
    Migration {
        version: 4,
        description: "guard_open_pipeline_runs",
        sql: include_str!("sql/004_guard_open_runs.sql"),
    },
];

/// Runs all pending migrations on the given connection.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current_version: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?;

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        log::info!(
            "Running migration v{}: {}",
            migration.version,
            migration.description
        );

        conn.execute_batch(migration.sql)
            .map_err(|e| DatabaseError::Migration {
                version: migration.version,
                reason: e.to_string(),
            })?;

        conn.execute(
            "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
            rusqlite::params![migration.version, migration.description],
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |r| r.get::<_, u32>(0),
        )
        .unwrap()
            == 1
    }

    #[test]
    fn test_migrations_run_on_fresh_db() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        run_all(&conn).unwrap();

        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as u32);
        for table in ["page_results", "pipeline_runs", "pipeline_issues"] {
            assert!(table_exists(&conn, table), "missing table {}", table);
        }
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();
        run_all(&conn).unwrap();

        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_finished_runs_reject_updates() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();
        conn.execute(
            "INSERT INTO pipeline_runs (id, pass_id, document_id, pipeline_name, status, started_at, finished_at)
             VALUES ('r1', 'p1', 1, 'failed-rules', 'succeeded', '2026-01-01T00:00:00Z', '2026-01-01T00:00:01Z')",
            [],
        )
        .unwrap();

        let result = conn.execute("UPDATE pipeline_runs SET status = 'failed' WHERE id = 'r1'", []);
        assert!(result.is_err());
    }

    #[test]
    fn test_one_open_run_per_document_pipeline() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();
        let insert = |id: &str, finished: Option<&str>| {
            conn.execute(
                "INSERT INTO pipeline_runs (id, pass_id, document_id, pipeline_name, status, started_at, finished_at)
                 VALUES (?1, 'p1', 1, 'failed-rules', 'running', '2026-01-01T00:00:00Z', ?2)",
                rusqlite::params![id, finished],
            )
        };

        insert("done", Some("2026-01-01T00:00:01Z")).unwrap();
        insert("open", None).unwrap();
        assert!(insert("second-open", None).is_err());
        insert("another-done", Some("2026-01-01T00:00:02Z")).unwrap();
    }
}
