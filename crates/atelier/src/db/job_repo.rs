//! Job repository: CRUD operations for the `production_jobs` table.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// A raw production job row from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRow {
    pub id: String,
    pub sale_id: String,
    pub company_id: String,
    pub branch_id: String,
    pub production_no: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
    pub finalized_at: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            sale_id: row.get("sale_id")?,
            company_id: row.get("company_id")?,
            branch_id: row.get("branch_id")?,
            production_no: row.get("production_no")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            finalized_at: row.get("finalized_at")?,
        })
    }

    #[cfg(test)]
    pub(crate) fn sample(id: &str, sale_id: &str) -> Self {
        Self {
            id: id.to_string(),
            sale_id: sale_id.to_string(),
            company_id: "co-1".to_string(),
            branch_id: "br-1".to_string(),
            production_no: format!("PRD-{}", sale_id),
            status: "open".to_string(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
            finalized_at: None,
        }
    }
}

/// Inserts a new job row.
pub fn insert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO production_jobs (id, sale_id, company_id, branch_id, production_no,
             status, created_at, updated_at, finalized_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                job.id,
                job.sale_id,
                job.company_id,
                job.branch_id,
                job.production_no,
                job.status,
                job.created_at,
                job.updated_at,
                job.finalized_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM production_jobs WHERE id = ?1",
                params![id],
                JobRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Finds the job belonging to a sale.
pub fn find_by_sale(db: &Database, sale_id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM production_jobs WHERE sale_id = ?1",
                params![sale_id],
                JobRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Lists a company's jobs, newest first.
pub fn list_by_company(db: &Database, company_id: &str) -> Result<Vec<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM production_jobs WHERE company_id = ?1 ORDER BY created_at DESC",
        )?;
        let rows = stmt
            .query_map(params![company_id], JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Updates only the status, updated_at and finalized_at of a job.
pub fn update_status(
    db: &Database,
    id: &str,
    status: &str,
    updated_at: &str,
    finalized_at: Option<&str>,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE production_jobs SET status = ?2, updated_at = ?3, finalized_at = ?4 WHERE id = ?1",
            params![id, status, updated_at, finalized_at],
        )?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        insert(&db, &JobRow::sample("job-1", "sale-1")).unwrap();

        let found = find_by_id(&db, "job-1").unwrap().unwrap();
        assert_eq!(found.sale_id, "sale-1");
        assert_eq!(found.status, "open");

        let by_sale = find_by_sale(&db, "sale-1").unwrap().unwrap();
        assert_eq!(by_sale.id, "job-1");
    }

    #[test]
    fn test_find_nonexistent() {
        let db = test_db();
        assert!(find_by_id(&db, "nope").unwrap().is_none());
        assert!(find_by_sale(&db, "nope").unwrap().is_none());
    }

    #[test]
    fn test_one_job_per_sale() {
        let db = test_db();
        insert(&db, &JobRow::sample("job-1", "sale-1")).unwrap();
        assert!(insert(&db, &JobRow::sample("job-2", "sale-1")).is_err());
    }

    #[test]
    fn test_update_status() {
        let db = test_db();
        insert(&db, &JobRow::sample("job-1", "sale-1")).unwrap();

        update_status(
            &db,
            "job-1",
            "finalized",
            "2026-01-02T00:00:00Z",
            Some("2026-01-02T00:00:00Z"),
        )
        .unwrap();

        let found = find_by_id(&db, "job-1").unwrap().unwrap();
        assert_eq!(found.status, "finalized");
        assert!(found.finalized_at.is_some());
    }

    #[test]
    fn test_list_by_company() {
        let db = test_db();
        insert(&db, &JobRow::sample("job-1", "sale-1")).unwrap();
        let mut other = JobRow::sample("job-2", "sale-2");
        other.created_at = "2026-02-01T00:00:00Z".to_string();
        insert(&db, &other).unwrap();

        let rows = list_by_company(&db, "co-1").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, "job-2");
        assert!(list_by_company(&db, "co-2").unwrap().is_empty());
    }
}
