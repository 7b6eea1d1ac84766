//! Stage lifecycle: assign, receive and reopen.
//!
//! Each operation reads the job's stages fresh, checks its guards, writes
//! the stage, then synchronizes the worker ledger and re-reads the job.
//! The stage write is the primary fact: a failing ledger sync is reported
//! as [`WorkflowError::LedgerSync`] without undoing it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{field, info_span, Instrument, Span};

use super::guards;
use super::progress::{CostReconciliation, JobProgress};
use crate::audit::{AuditAction, ProductionLog};
use crate::error::WorkflowError;
use crate::events::StudioEvents;
use crate::jobs::JobState;
use crate::ledger::{DerivedPaymentStatus, LedgerSynchronizer, SyncReport};
use crate::stage::{ProductionStage, StageId, StageRef, StageStatus, WorkerAllocation};
use crate::store::{StagePatch, StageStore};

const MAIN_ROLE: &str = "Main";

/// Input of an assignment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignRequest {
    /// First entry is the main worker.
    pub allocations: Vec<WorkerAllocation>,
    pub expected_completion_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl AssignRequest {
    pub fn single(worker_id: &str, cost: Decimal) -> Self {
        Self {
            allocations: vec![WorkerAllocation::new(worker_id, cost)],
            ..Default::default()
        }
    }

    pub fn with_helper(mut self, worker_id: &str, cost: Decimal, role: &str) -> Self {
        self.allocations
            .push(WorkerAllocation::new(worker_id, cost).with_role(role));
        self
    }

    pub fn due(mut self, date: DateTime<Utc>) -> Self {
        self.expected_completion_date = Some(date);
        self
    }

    pub fn notes(mut self, notes: &str) -> Self {
        self.notes = Some(notes.to_string());
        self
    }
}

/// Input of a receipt from the worker.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiveRequest {
    pub actual_cost: Decimal,
    pub notes: Option<String>,
}

impl ReceiveRequest {
    pub fn new(actual_cost: Decimal) -> Self {
        Self {
            actual_cost,
            notes: None,
        }
    }
}

/// Authoritative state of a job after a read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub job_id: String,
    /// Stages in pipeline order.
    pub stages: Vec<ProductionStage>,
    pub payments: HashMap<StageId, DerivedPaymentStatus>,
}

impl JobSnapshot {
    pub fn stage(&self, id: &StageId) -> Option<&ProductionStage> {
        self.stages.iter().find(|s| &s.id == id)
    }

    pub fn stage_at(&self, order: u32) -> Option<&ProductionStage> {
        self.stages.iter().find(|s| s.order == order)
    }

    pub fn payment_status(&self, id: &StageId) -> DerivedPaymentStatus {
        self.payments
            .get(id)
            .copied()
            .unwrap_or(DerivedPaymentStatus::Pending)
    }

    pub fn is_locked(&self, id: &StageId) -> bool {
        self.stage(id)
            .map(|s| guards::is_locked(s, &self.stages))
            .unwrap_or(false)
    }

    pub fn progress(&self) -> JobProgress {
        JobProgress::from_stages(&self.stages)
    }

    pub fn costs(&self) -> CostReconciliation {
        CostReconciliation::from_stages(&self.stages)
    }
}

#[derive(Clone)]
pub struct WorkflowEngine {
    store: Arc<dyn StageStore>,
    sync: LedgerSynchronizer,
    events: StudioEvents,
    audit: ProductionLog,
}

impl WorkflowEngine {
    pub fn new(
        store: Arc<dyn StageStore>,
        sync: LedgerSynchronizer,
        events: StudioEvents,
        audit: ProductionLog,
    ) -> Self {
        Self {
            store,
            sync,
            events,
            audit,
        }
    }

    pub fn synchronizer(&self) -> &LedgerSynchronizer {
        &self.sync
    }

    /// Reads a job's stages and their payment status.
    pub async fn load(&self, job_id: &str) -> Result<JobSnapshot, WorkflowError> {
        let stages = self.store.list_stages(job_id).await?;
        let payments = self.sync.payment_statuses(job_id, &stages).await?;
        Ok(JobSnapshot {
            job_id: job_id.to_string(),
            stages,
            payments,
        })
    }

    /// Runs a ledger sync on its own, outside any transition.
    pub async fn sync(&self, job_id: &str) -> Result<SyncReport, WorkflowError> {
        self.sync.sync_for_job(job_id).await
    }

    /// Assigns one or more workers to a stage (`Pending|Assigned -> Assigned`).
    pub async fn assign(
        &self,
        stage: &StageRef,
        request: AssignRequest,
    ) -> Result<JobSnapshot, WorkflowError> {
        guards::validate_allocations(&request.allocations)?;
        let stage_id = stage.persisted()?.clone();
        let span = info_span!("assign", stage_id = %stage_id, job_id = field::Empty);
        self.assign_persisted(&stage_id, request)
            .instrument(span)
            .await
    }

    async fn assign_persisted(
        &self,
        stage_id: &StageId,
        request: AssignRequest,
    ) -> Result<JobSnapshot, WorkflowError> {
        let (stage, stages) = self.fresh(stage_id).await?;
        guards::check_assignable(&stage, &stages)?;

        let mut allocations = request.allocations;
        for allocation in &mut allocations {
            allocation.worker_id = allocation.worker_id.trim().to_string();
        }
        allocations[0].role = MAIN_ROLE.to_string();
        let expected_cost: Decimal = allocations.iter().map(|a| a.cost).sum();
        let main_worker = allocations[0].worker_id.clone();

        let updated = self
            .store
            .update_stage(
                stage_id,
                StagePatch {
                    assigned_worker_id: Some(Some(main_worker.clone())),
                    allocations: Some(allocations),
                    expected_cost: Some(expected_cost),
                    status: Some(StageStatus::Assigned),
                    expected_completion_date: Some(request.expected_completion_date),
                    notes: request.notes,
                    ..Default::default()
                },
            )
            .await?;
        log::info!(
            "Stage {} ({}) assigned to {} with expected cost {}",
            updated.id,
            updated.category,
            main_worker,
            expected_cost
        );
        self.audit
            .record(&updated.job_id, AuditAction::Assigned, Some(&stage), Some(&updated));

        self.after_mutation(&updated.job_id).await
    }

    /// Receives finished work from the worker (`Assigned -> Completed`).
    ///
    /// The ledger entry for the worker is created only after the stage
    /// update succeeded.
    pub async fn receive(
        &self,
        stage: &StageRef,
        request: ReceiveRequest,
    ) -> Result<JobSnapshot, WorkflowError> {
        let stage_id = stage.persisted()?.clone();
        guards::check_actual_cost(request.actual_cost)?;
        let span = info_span!("receive", stage_id = %stage_id, job_id = field::Empty);
        self.receive_persisted(&stage_id, request)
            .instrument(span)
            .await
    }

    async fn receive_persisted(
        &self,
        stage_id: &StageId,
        request: ReceiveRequest,
    ) -> Result<JobSnapshot, WorkflowError> {
        let (stage, stages) = self.fresh(stage_id).await?;
        guards::check_receivable(&stage, &stages)?;

        let updated = self
            .store
            .update_stage(
                stage_id,
                StagePatch {
                    actual_cost: Some(request.actual_cost),
                    status: Some(StageStatus::Completed),
                    completed_at: Some(Some(Utc::now())),
                    notes: request.notes,
                    ..Default::default()
                },
            )
            .await?;
        log::info!(
            "Stage {} ({}) received, actual cost {} (expected {})",
            updated.id,
            updated.category,
            updated.actual_cost,
            updated.expected_cost
        );
        self.audit
            .record(&updated.job_id, AuditAction::Received, Some(&stage), Some(&updated));

        self.after_mutation(&updated.job_id).await
    }

    /// Reopens a completed stage (`Completed -> Assigned`) and voids its
    /// unpaid ledger entry.
    pub async fn reopen(&self, stage: &StageRef) -> Result<JobSnapshot, WorkflowError> {
        let stage_id = stage.persisted()?.clone();
        let span = info_span!("reopen", stage_id = %stage_id, job_id = field::Empty);
        self.reopen_persisted(&stage_id).instrument(span).await
    }

    async fn reopen_persisted(&self, stage_id: &StageId) -> Result<JobSnapshot, WorkflowError> {
        let (stage, stages) = self.fresh(stage_id).await?;
        guards::check_reopenable(&stage, &stages)?;
        let entry = self.sync.ledger().active_entry(stage_id).await?;
        guards::check_reopen_payment(&stage, entry.as_ref())?;

        let status = if stage.assigned_worker_id.is_some() {
            StageStatus::Assigned
        } else {
            StageStatus::Pending
        };
        let updated = self
            .store
            .update_stage(
                stage_id,
                StagePatch {
                    status: Some(status),
                    completed_at: Some(None),
                    ..Default::default()
                },
            )
            .await?;
        log::info!("Stage {} ({}) reopened", updated.id, updated.category);
        self.audit
            .record(&updated.job_id, AuditAction::Reopened, Some(&stage), Some(&updated));

        self.after_mutation(&updated.job_id).await
    }

    /// Reads a stage and its job's stages from the store. Stages of a
    /// finalized job are read-only.
    async fn fresh(
        &self,
        stage_id: &StageId,
    ) -> Result<(ProductionStage, Vec<ProductionStage>), WorkflowError> {
        let stage = self.store.get_stage(stage_id).await?;
        Span::current().record("job_id", stage.job_id.as_str());
        if self.store.job_state(&stage.job_id).await? == JobState::Finalized {
            return Err(WorkflowError::JobFinalized {
                job_id: stage.job_id,
            });
        }
        let stages = self.store.list_stages(&stage.job_id).await?;
        let stage = stages
            .iter()
            .find(|s| &s.id == stage_id)
            .cloned()
            .ok_or_else(|| WorkflowError::StageNotFound(stage_id.clone()))?;
        Ok((stage, stages))
    }

    async fn after_mutation(&self, job_id: &str) -> Result<JobSnapshot, WorkflowError> {
        self.events.stage_data_changed(job_id);
        self.sync
            .sync_for_job(job_id)
            .await
            .map_err(|e| WorkflowError::LedgerSync {
                job_id: job_id.to_string(),
                source: Box::new(e),
            })?;
        self.load(job_id).await
    }
}
