//! Per-job audit trail of workflow actions.
//!
//! Writing the trail never fails an operation: errors are logged and dropped.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::db::log_repo::{self, ProductionLogRow};
use crate::db::values::{format_timestamp, parse_timestamp};
use crate::db::{Database, DatabaseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    JobCreated,
    Assigned,
    Received,
    Reopened,
    Configured,
    Finalized,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::JobCreated => "job_created",
            AuditAction::Assigned => "assigned",
            AuditAction::Received => "received",
            AuditAction::Reopened => "reopened",
            AuditAction::Configured => "configured",
            AuditAction::Finalized => "finalized",
        }
    }
}

/// One recorded action, values as stored JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub action: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub performed_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct ProductionLog {
    db: Database,
}

impl ProductionLog {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Appends an action to the job's trail.
    pub fn record<O: Serialize, N: Serialize>(
        &self,
        job_id: &str,
        action: AuditAction,
        old_value: Option<&O>,
        new_value: Option<&N>,
    ) {
        let row = ProductionLogRow {
            id: uuid::Uuid::new_v4().to_string(),
            job_id: job_id.to_string(),
            action: action.as_str().to_string(),
            old_value: old_value.and_then(encode),
            new_value: new_value.and_then(encode),
            performed_at: format_timestamp(Utc::now()),
        };
        if let Err(e) = log_repo::insert(&self.db, &row) {
            log::warn!(
                "Failed to write production log '{}' for job {}: {}",
                row.action,
                job_id,
                e
            );
        }
    }

    /// The job's trail, newest first.
    pub fn entries(&self, job_id: &str) -> Result<Vec<AuditRecord>, DatabaseError> {
        let rows = log_repo::list_by_job(&self.db, job_id)?;
        Ok(rows
            .into_iter()
            .map(|row| AuditRecord {
                old_value: row.old_value.as_deref().and_then(decode),
                new_value: row.new_value.as_deref().and_then(decode),
                performed_at: parse_timestamp(&row.performed_at),
                action: row.action,
            })
            .collect())
    }
}

fn encode<T: Serialize>(value: &T) -> Option<String> {
    serde_json::to_string(value)
        .map_err(|e| log::warn!("Failed to encode production log value: {}", e))
        .ok()
}

fn decode(raw: &str) -> Option<Value> {
    serde_json::from_str(raw)
        .map_err(|e| log::warn!("Unreadable production log value: {}", e))
        .ok()
}
