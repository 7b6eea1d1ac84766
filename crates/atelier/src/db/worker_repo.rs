//! Worker repository: the studio's worker roster.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// A raw worker row from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerRow {
    pub id: String,
    pub company_id: String,
    pub name: String,
    pub role: String,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: String,
}

impl WorkerRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            company_id: row.get("company_id")?,
            name: row.get("name")?,
            role: row.get("role")?,
            phone: row.get("phone")?,
            is_active: row.get("is_active")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Inserts a new worker row.
pub fn insert(db: &Database, worker: &WorkerRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO workers (id, company_id, name, role, phone, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                worker.id,
                worker.company_id,
                worker.name,
                worker.role,
                worker.phone,
                worker.is_active,
                worker.created_at,
            ],
        )?;
        Ok(())
    })
}

/// Lists a company's workers (active and inactive) by name.
pub fn list_by_company(db: &Database, company_id: &str) -> Result<Vec<WorkerRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM workers WHERE company_id = ?1 ORDER BY name ASC")?;
        let rows = stmt
            .query_map(params![company_id], WorkerRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Finds a worker by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<WorkerRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM workers WHERE id = ?1",
                params![id],
                WorkerRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}
