//! Versioned schema migrations.
//!
//! Applied versions are recorded in `_migrations`. Every pending step runs
//! in its own transaction together with its bookkeeping row, so a failing
//! step leaves the schema at the previous version.

use chrono::Utc;
use rusqlite::{params, Connection};

use super::error::DatabaseError;
use super::values::format_timestamp;

struct Step {
    version: u32,
    name: &'static str,
    sql: &'static str,
    /// Column the step adds; the SQL is not run when the column is present.
    adds_column: Option<(&'static str, &'static str)>,
}

const STEPS: &[Step] = &[
    Step {
        version: 1,
        name: "production_jobs",
        sql: include_str!("sql/001_create_production_jobs.sql"),
        adds_column: None,
    },
    Step {
        version: 2,
        name: "production_stages",
        sql: include_str!("sql/002_create_production_stages.sql"),
        adds_column: None,
    },
    Step {
        version: 3,
        name: "worker_ledger_entries",
        sql: include_str!("sql/003_create_worker_ledger_entries.sql"),
        adds_column: None,
    },
    Step {
        version: 4,
        name: "workers",
        sql: include_str!("sql/004_create_workers.sql"),
        adds_column: None,
    },
    Step {
        version: 5,
        name: "production_logs",
        sql: include_str!("sql/005_create_production_logs.sql"),
        adds_column: None,
    },
    Step {
        version: 6,
        name: "worker_ledger_entries.payment_ref",
        sql: include_str!("sql/006_add_payment_ref.sql"),
        adds_column: Some(("worker_ledger_entries", "payment_ref")),
    },
];

pub fn latest_version() -> u32 {
    STEPS.last().map(|s| s.version).unwrap_or(0)
}

/// Highest version recorded in `_migrations`, 0 on a blank database.
pub fn current_version(conn: &Connection) -> Result<u32, DatabaseError> {
    Ok(conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?)
}

/// Brings the schema up to [`latest_version`].
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        );",
    )?;

    let current = current_version(conn)?;
    for step in STEPS.iter().filter(|s| s.version > current) {
        apply(conn, step).map_err(|e| match e {
            DatabaseError::Sqlite(inner) => DatabaseError::Migration {
                version: step.version,
                reason: inner.to_string(),
            },
            other => other,
        })?;
    }
    Ok(())
}

fn apply(conn: &Connection, step: &Step) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let skip = match step.adds_column {
        Some((table, column)) => has_column(&tx, table, column)?,
        None => false,
    };
    if skip {
        log::debug!("Migration v{} ({}) already in place", step.version, step.name);
    } else {
        log::info!("Applying migration v{} ({})", step.version, step.name);
        tx.execute_batch(step.sql)?;
    }
    tx.execute(
        "INSERT INTO _migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
        params![step.version, step.name, format_timestamp(Utc::now())],
    )?;
    tx.commit()?;
    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool, DatabaseError> {
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
        params![table, column],
        |r| r.get(0),
    )?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", true).unwrap();
        conn
    }

    fn recorded(conn: &Connection) -> u32 {
        conn.query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_blank_database_reaches_latest() {
        let conn = blank();
        run_all(&conn).unwrap();

        assert_eq!(current_version(&conn).unwrap(), latest_version());
        assert_eq!(recorded(&conn), STEPS.len() as u32);
        assert!(has_column(&conn, "worker_ledger_entries", "payment_ref").unwrap());
    }

    #[test]
    fn test_rerun_applies_nothing() {
        let conn = blank();
        run_all(&conn).unwrap();
        run_all(&conn).unwrap();
        assert_eq!(recorded(&conn), STEPS.len() as u32);
    }

    #[test]
    fn test_versions_strictly_increase() {
        assert!(STEPS.windows(2).all(|w| w[0].version < w[1].version));
    }

    #[test]
    fn test_existing_column_is_not_added_twice() {
        let conn = blank();
        // A ledger table that already carries payment_ref.
        conn.execute_batch(include_str!("sql/003_create_worker_ledger_entries.sql"))
            .unwrap();
        conn.execute_batch(include_str!("sql/006_add_payment_ref.sql"))
            .unwrap();

        run_all(&conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), latest_version());
    }

    #[test]
    fn test_has_column() {
        let conn = blank();
        conn.execute_batch("CREATE TABLE sample (id TEXT, label TEXT);")
            .unwrap();
        assert!(has_column(&conn, "sample", "label").unwrap());
        assert!(!has_column(&conn, "sample", "missing").unwrap());
        assert!(!has_column(&conn, "no_such_table", "id").unwrap());
    }
}
