use std::path::PathBuf;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::stage::{StageId, StageStatus};

#[derive(Error, Debug)]
pub enum AtelierError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

/// Rejections and failures raised by the production workflow.
///
/// Guard violations are raised before any persistence call is made.
/// Persistence failures are passed through unchanged so the caller can retry.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Stage '{local_id}' has not been saved yet; save the stage configuration first, then retry")]
    StageNotPersisted { local_id: String },

    #[error("No worker selected; choose at least one worker for this stage")]
    NoWorkerSelected,

    #[error("Stage {stage_id} is locked until stage #{previous_order} is completed")]
    StageLocked { stage_id: StageId, previous_order: u32 },

    #[error("Stage {stage_id} cannot be reopened: later stage(s) {} already completed", .completed_after.join(", "))]
    CannotReopenDependentsCompleted {
        stage_id: StageId,
        completed_after: Vec<String>,
    },

    #[error("Stage {stage_id} cannot be reopened: worker payment is already {payment}")]
    CannotReopenPaid { stage_id: StageId, payment: String },

    #[error("Stage {stage_id} cannot be deleted: {reason}")]
    StageNotDeletable { stage_id: StageId, reason: String },

    #[error("Production job {job_id} is finalized; its stages can no longer change")]
    JobFinalized { job_id: String },

    #[error("No branch/location could be resolved for sale {sale_id}; production job not created")]
    MissingLocationContext { sale_id: String },

    #[error("Stage update for job {job_id} was saved but the worker ledger could not be synchronized: {source}")]
    LedgerSync {
        job_id: String,
        #[source]
        source: Box<WorkflowError>,
    },

    #[error("Cannot {action} stage {stage_id} while it is {from}")]
    InvalidTransition {
        stage_id: StageId,
        from: StageStatus,
        action: &'static str,
    },

    #[error("Invalid cost {amount}: costs must not be negative")]
    InvalidCost { amount: Decimal },

    #[error("Category '{0}' appears more than once in the stage configuration")]
    DuplicateCategory(String),

    #[error("Stage not found: {0}")]
    StageNotFound(StageId),

    #[error("Production job not found: {0}")]
    JobNotFound(String),

    #[error("No ledger entry exists for stage {0}")]
    LedgerEntryNotFound(StageId),

    #[error("Production job {job_id} cannot be finalized: {reason}")]
    NotFinalizable { job_id: String, reason: String },

    #[error("Sale {sale_id} could not be finalized: {reason}")]
    SaleFinalization { sale_id: String, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

impl WorkflowError {
    /// True for rejections the user can act on (as opposed to storage failures).
    pub fn is_guard_violation(&self) -> bool {
        matches!(
            self,
            WorkflowError::StageNotPersisted { .. }
                | WorkflowError::NoWorkerSelected
                | WorkflowError::StageLocked { .. }
                | WorkflowError::CannotReopenDependentsCompleted { .. }
                | WorkflowError::CannotReopenPaid { .. }
                | WorkflowError::JobFinalized { .. }
                | WorkflowError::InvalidTransition { .. }
                | WorkflowError::InvalidCost { .. }
                | WorkflowError::DuplicateCategory(_)
        )
    }
}

impl From<rusqlite::Error> for WorkflowError {
    fn from(e: rusqlite::Error) -> Self {
        WorkflowError::Database(crate::db::DatabaseError::Sqlite(e))
    }
}

pub type Result<T> = std::result::Result<T, AtelierError>;
