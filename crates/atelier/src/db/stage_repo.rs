//! Stage repository: CRUD operations for the `production_stages` table.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// A raw stage row from the database.
///
/// Values are stored as written; decoding into a
/// [`ProductionStage`](crate::stage::ProductionStage) happens in
/// [`normalize`](crate::workflow::normalize::normalize).
#[derive(Debug, Clone, PartialEq)]
pub struct StageRow {
    pub id: String,
    pub job_id: String,
    pub category: String,
    pub stage_order: i64,
    pub assigned_worker_id: Option<String>,
    /// JSON array of worker allocations.
    pub allocations: Option<String>,
    pub expected_cost: String,
    pub actual_cost: String,
    pub status: String,
    pub expected_completion_date: Option<String>,
    pub completed_at: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl StageRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            job_id: row.get("job_id")?,
            category: row.get("category")?,
            stage_order: row.get("stage_order")?,
            assigned_worker_id: row.get("assigned_worker_id")?,
            allocations: row.get("allocations")?,
            expected_cost: row.get("expected_cost")?,
            actual_cost: row.get("actual_cost")?,
            status: row.get("status")?,
            expected_completion_date: row.get("expected_completion_date")?,
            completed_at: row.get("completed_at")?,
            notes: row.get("notes")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Inserts a new stage row.
pub fn insert(db: &Database, stage: &StageRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO production_stages (id, job_id, category, stage_order, assigned_worker_id,
             allocations, expected_cost, actual_cost, status, expected_completion_date,
             completed_at, notes, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                stage.id,
                stage.job_id,
                stage.category,
                stage.stage_order,
                stage.assigned_worker_id,
                stage.allocations,
                stage.expected_cost,
                stage.actual_cost,
                stage.status,
                stage.expected_completion_date,
                stage.completed_at,
                stage.notes,
                stage.created_at,
                stage.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Updates an existing stage row. All fields except `id`, `job_id` and
/// `created_at` are overwritten. Returns the number of rows touched.
pub fn update(db: &Database, stage: &StageRow) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE production_stages SET category=?2, stage_order=?3, assigned_worker_id=?4,
             allocations=?5, expected_cost=?6, actual_cost=?7, status=?8,
             expected_completion_date=?9, completed_at=?10, notes=?11, updated_at=?12
             WHERE id=?1",
            params![
                stage.id,
                stage.category,
                stage.stage_order,
                stage.assigned_worker_id,
                stage.allocations,
                stage.expected_cost,
                stage.actual_cost,
                stage.status,
                stage.expected_completion_date,
                stage.completed_at,
                stage.notes,
                stage.updated_at,
            ],
        )?;
        Ok(changed)
    })
}

/// Finds a stage by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<StageRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM production_stages WHERE id = ?1",
                params![id],
                StageRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Lists all stages of a job in pipeline order.
pub fn list_by_job(db: &Database, job_id: &str) -> Result<Vec<StageRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM production_stages WHERE job_id = ?1
             ORDER BY stage_order ASC, created_at ASC",
        )?;
        let rows = stmt
            .query_map(params![job_id], StageRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Lists every stage assigned to a worker, newest first.
pub fn list_by_worker(db: &Database, worker_id: &str) -> Result<Vec<StageRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM production_stages WHERE assigned_worker_id = ?1
             ORDER BY created_at DESC",
        )?;
        let rows = stmt
            .query_map(params![worker_id], StageRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Highest `stage_order` in a job, 0 when the job has no stages.
pub fn max_order(db: &Database, job_id: &str) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        let max: i64 = conn.query_row(
            "SELECT COALESCE(MAX(stage_order), 0) FROM production_stages WHERE job_id = ?1",
            params![job_id],
            |r| r.get(0),
        )?;
        Ok(max)
    })
}

/// Deletes a stage row. Returns the number of rows removed.
pub fn delete(db: &Database, id: &str) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let removed = conn.execute("DELETE FROM production_stages WHERE id = ?1", params![id])?;
        Ok(removed)
    })
}
