//! Stage store: persistence contract for production stages.
//!
//! The store holds no business rules beyond refusing to delete stages that
//! already carry work. Every read is normalized (see
//! [`normalize`](crate::workflow::normalize::normalize)).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::db::job_repo;
use crate::db::stage_repo::{self, StageRow};
use crate::db::values::{format_decimal, format_timestamp};
use crate::db::{Database, DatabaseError};
use crate::error::WorkflowError;
use crate::jobs::{JobState, ProductionJob};
use crate::stage::{ProductionStage, StageCategory, StageId, StageStatus, WorkerAllocation};
use crate::workflow::normalize::normalize;

/// Partial update of a stage. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StagePatch {
    pub order: Option<u32>,
    pub assigned_worker_id: Option<Option<String>>,
    pub allocations: Option<Vec<WorkerAllocation>>,
    pub expected_cost: Option<Decimal>,
    pub actual_cost: Option<Decimal>,
    pub status: Option<StageStatus>,
    pub expected_completion_date: Option<Option<DateTime<Utc>>>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
    pub notes: Option<String>,
}

impl StagePatch {
    pub fn is_empty(&self) -> bool {
        *self == StagePatch::default()
    }

    fn apply(self, row: &mut StageRow) -> Result<(), DatabaseError> {
        if let Some(order) = self.order {
            row.stage_order = i64::from(order);
        }
        if let Some(worker) = self.assigned_worker_id {
            row.assigned_worker_id = worker;
        }
        if let Some(allocations) = self.allocations {
            row.allocations = if allocations.is_empty() {
                None
            } else {
                Some(serde_json::to_string(&allocations).map_err(|e| {
                    DatabaseError::Encode {
                        column: "allocations",
                        source: e,
                    }
                })?)
            };
        }
        if let Some(cost) = self.expected_cost {
            row.expected_cost = format_decimal(cost);
        }
        if let Some(cost) = self.actual_cost {
            row.actual_cost = format_decimal(cost);
        }
        if let Some(status) = self.status {
            row.status = status.as_str().to_string();
        }
        if let Some(date) = self.expected_completion_date {
            row.expected_completion_date = date.map(format_timestamp);
        }
        if let Some(at) = self.completed_at {
            row.completed_at = at.map(format_timestamp);
        }
        if let Some(notes) = self.notes {
            row.notes = Some(notes);
        }
        Ok(())
    }
}

#[async_trait]
pub trait StageStore: Send + Sync {
    /// All stages of a job in pipeline order.
    async fn list_stages(&self, job_id: &str) -> Result<Vec<ProductionStage>, WorkflowError>;

    async fn get_stage(&self, id: &StageId) -> Result<ProductionStage, WorkflowError>;

    /// State of the job owning the stages. `JobNotFound` when it is missing.
    async fn job_state(&self, job_id: &str) -> Result<JobState, WorkflowError>;

    /// Creates a pending stage appended after the job's current last stage.
    async fn create_stage(
        &self,
        job_id: &str,
        category: &StageCategory,
    ) -> Result<ProductionStage, WorkflowError>;

    async fn update_stage(
        &self,
        id: &StageId,
        patch: StagePatch,
    ) -> Result<ProductionStage, WorkflowError>;

    /// Deletes a stage. Fails with `StageNotDeletable` once a worker is
    /// assigned or the stage is completed.
    async fn delete_stage(&self, id: &StageId) -> Result<(), WorkflowError>;

    /// Every stage assigned to a worker, across jobs.
    async fn stages_for_worker(
        &self,
        worker_id: &str,
    ) -> Result<Vec<ProductionStage>, WorkflowError>;
}

/// [`StageStore`] backed by the SQLite `production_stages` table.
#[derive(Clone)]
pub struct SqliteStageStore {
    db: Database,
}

impl SqliteStageStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn load_row(&self, id: &StageId) -> Result<StageRow, WorkflowError> {
        stage_repo::find_by_id(&self.db, id.as_str())?
            .ok_or_else(|| WorkflowError::StageNotFound(id.clone()))
    }
}

#[async_trait]
impl StageStore for SqliteStageStore {
    async fn list_stages(&self, job_id: &str) -> Result<Vec<ProductionStage>, WorkflowError> {
        let rows = stage_repo::list_by_job(&self.db, job_id)?;
        Ok(rows.iter().map(normalize).collect())
    }

    async fn get_stage(&self, id: &StageId) -> Result<ProductionStage, WorkflowError> {
        Ok(normalize(&self.load_row(id)?))
    }

    async fn job_state(&self, job_id: &str) -> Result<JobState, WorkflowError> {
        job_repo::find_by_id(&self.db, job_id)?
            .map(|row| ProductionJob::from(row).state)
            .ok_or_else(|| WorkflowError::JobNotFound(job_id.to_string()))
    }

    async fn create_stage(
        &self,
        job_id: &str,
        category: &StageCategory,
    ) -> Result<ProductionStage, WorkflowError> {
        let now = format_timestamp(Utc::now());
        let order = stage_repo::max_order(&self.db, job_id)? + 1;
        let row = StageRow {
            id: StageId::generate().to_string(),
            job_id: job_id.to_string(),
            category: category.key(),
            stage_order: order,
            assigned_worker_id: None,
            allocations: None,
            expected_cost: "0".to_string(),
            actual_cost: "0".to_string(),
            status: StageStatus::Pending.as_str().to_string(),
            expected_completion_date: None,
            completed_at: None,
            notes: None,
            created_at: now.clone(),
            updated_at: now,
        };
        stage_repo::insert(&self.db, &row)?;
        log::debug!(
            "Created stage {} ({}) at order {} for job {}",
            row.id,
            row.category,
            order,
            job_id
        );
        Ok(normalize(&row))
    }

    async fn update_stage(
        &self,
        id: &StageId,
        patch: StagePatch,
    ) -> Result<ProductionStage, WorkflowError> {
        let mut row = self.load_row(id)?;
        if patch.is_empty() {
            return Ok(normalize(&row));
        }
        patch.apply(&mut row)?;
        row.updated_at = format_timestamp(Utc::now());
        if stage_repo::update(&self.db, &row)? == 0 {
            return Err(WorkflowError::StageNotFound(id.clone()));
        }
        Ok(normalize(&row))
    }

    async fn delete_stage(&self, id: &StageId) -> Result<(), WorkflowError> {
        let stage = normalize(&self.load_row(id)?);
        if stage.is_completed() {
            return Err(WorkflowError::StageNotDeletable {
                stage_id: id.clone(),
                reason: "stage is already completed".to_string(),
            });
        }
        if stage.assigned_worker_id.is_some() {
            return Err(WorkflowError::StageNotDeletable {
                stage_id: id.clone(),
                reason: "a worker is assigned".to_string(),
            });
        }
        stage_repo::delete(&self.db, id.as_str())?;
        log::debug!("Deleted stage {} from job {}", id, stage.job_id);
        Ok(())
    }

    async fn stages_for_worker(
        &self,
        worker_id: &str,
    ) -> Result<Vec<ProductionStage>, WorkflowError> {
        let rows = stage_repo::list_by_worker(&self.db, worker_id)?;
        Ok(rows.iter().map(normalize).collect())
    }
}
