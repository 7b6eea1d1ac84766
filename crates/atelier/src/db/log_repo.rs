//! Production log repository: append-only audit trail per job.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw production log row.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductionLogRow {
    pub id: String,
    pub job_id: String,
    pub action: String,
    /// JSON snapshot before the action.
    pub old_value: Option<String>,
    /// JSON snapshot after the action.
    pub new_value: Option<String>,
    pub performed_at: String,
}

impl ProductionLogRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            job_id: row.get("job_id")?,
            action: row.get("action")?,
            old_value: row.get("old_value")?,
            new_value: row.get("new_value")?,
            performed_at: row.get("performed_at")?,
        })
    }
}

pub fn insert(db: &Database, entry: &ProductionLogRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO production_logs (id, job_id, action, old_value, new_value, performed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.id,
                entry.job_id,
                entry.action,
                entry.old_value,
                entry.new_value,
                entry.performed_at,
            ],
        )?;
        Ok(())
    })
}

/// Lists a job's log, newest first.
pub fn list_by_job(db: &Database, job_id: &str) -> Result<Vec<ProductionLogRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM production_logs WHERE job_id = ?1
             ORDER BY performed_at DESC, rowid DESC",
        )?;
        let rows = stmt
            .query_map(params![job_id], ProductionLogRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
