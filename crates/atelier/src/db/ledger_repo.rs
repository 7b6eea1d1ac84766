//! Worker ledger repository: rows of `worker_ledger_entries`.
//!
//! Entries are never deleted. Reversal sets `voided_at`; "active" queries
//! only see entries where it is still NULL.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// A raw ledger entry row from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRow {
    pub id: String,
    pub job_id: String,
    pub stage_id: String,
    pub worker_id: String,
    pub amount: String,
    pub status: String,
    pub payment_ref: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub paid_at: Option<String>,
    pub voided_at: Option<String>,
}

impl LedgerRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            job_id: row.get("job_id")?,
            stage_id: row.get("stage_id")?,
            worker_id: row.get("worker_id")?,
            amount: row.get("amount")?,
            status: row.get("status")?,
            payment_ref: row.get("payment_ref")?,
            notes: row.get("notes")?,
            created_at: row.get("created_at")?,
            paid_at: row.get("paid_at")?,
            voided_at: row.get("voided_at")?,
        })
    }
}

/// Inserts a new ledger entry.
pub fn insert(db: &Database, entry: &LedgerRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO worker_ledger_entries (id, job_id, stage_id, worker_id, amount, status,
             payment_ref, notes, created_at, paid_at, voided_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                entry.id,
                entry.job_id,
                entry.stage_id,
                entry.worker_id,
                entry.amount,
                entry.status,
                entry.payment_ref,
                entry.notes,
                entry.created_at,
                entry.paid_at,
                entry.voided_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds the active (non-voided) entry for a stage, newest first if
/// more than one slipped in.
pub fn find_active_by_stage(
    db: &Database,
    stage_id: &str,
) -> Result<Option<LedgerRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM worker_ledger_entries
                 WHERE stage_id = ?1 AND voided_at IS NULL
                 ORDER BY created_at DESC LIMIT 1",
                params![stage_id],
                LedgerRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Lists the active entries for a job.
pub fn list_active_by_job(db: &Database, job_id: &str) -> Result<Vec<LedgerRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM worker_ledger_entries
             WHERE job_id = ?1 AND voided_at IS NULL
             ORDER BY created_at ASC",
        )?;
        let rows = stmt
            .query_map(params![job_id], LedgerRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Lists every entry (voided included) for a worker, newest first.
pub fn list_by_worker(db: &Database, worker_id: &str) -> Result<Vec<LedgerRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM worker_ledger_entries WHERE worker_id = ?1
             ORDER BY created_at DESC",
        )?;
        let rows = stmt
            .query_map(params![worker_id], LedgerRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Overwrites the amount of an entry.
pub fn update_amount(db: &Database, id: &str, amount: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE worker_ledger_entries SET amount = ?2 WHERE id = ?1",
            params![id, amount],
        )?;
        Ok(())
    })
}

/// Updates the payment state of an entry.
pub fn update_status(
    db: &Database,
    id: &str,
    status: &str,
    payment_ref: Option<&str>,
    paid_at: Option<&str>,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE worker_ledger_entries SET status = ?2, payment_ref = ?3, paid_at = ?4
             WHERE id = ?1",
            params![id, status, payment_ref, paid_at],
        )?;
        Ok(())
    })
}

/// Marks an entry voided. Already-voided entries keep their original timestamp.
pub fn void(db: &Database, id: &str, voided_at: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE worker_ledger_entries SET voided_at = ?2 WHERE id = ?1 AND voided_at IS NULL",
            params![id, voided_at],
        )?;
        Ok(())
    })
}
