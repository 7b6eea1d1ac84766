//! Production completion gate.

use std::sync::Arc;

use tracing::{info_span, Instrument};

use crate::audit::{AuditAction, ProductionLog};
use crate::error::WorkflowError;
use crate::events::StudioEvents;
use crate::jobs::{JobService, ProductionJob};
use crate::sale::{FinalizeRequest, SaleGateway};
use crate::stage::ProductionStage;
use crate::workflow::WorkflowEngine;

/// True when the job has stages and all of them are completed.
pub fn all_stages_completed(stages: &[ProductionStage]) -> bool {
    !stages.is_empty() && stages.iter().all(ProductionStage::is_completed)
}

#[derive(Clone)]
pub struct CompletionGate {
    engine: WorkflowEngine,
    jobs: JobService,
    gateway: Arc<dyn SaleGateway>,
    events: StudioEvents,
    audit: ProductionLog,
}

impl CompletionGate {
    pub fn new(
        engine: WorkflowEngine,
        jobs: JobService,
        gateway: Arc<dyn SaleGateway>,
        events: StudioEvents,
        audit: ProductionLog,
    ) -> Self {
        Self {
            engine,
            jobs,
            gateway,
            events,
            audit,
        }
    }

    pub async fn can_finalize(&self, job_id: &str) -> Result<bool, WorkflowError> {
        let snapshot = self.engine.load(job_id).await?;
        Ok(all_stages_completed(&snapshot.stages))
    }

    /// Finalizes the job's sale and moves the job to its terminal state.
    ///
    /// When the sale cannot be finalized the job stays open and the error is
    /// returned; nothing is retried.
    pub async fn finalize(&self, job_id: &str) -> Result<ProductionJob, WorkflowError> {
        self.finalize_job(job_id)
            .instrument(info_span!("finalize", job_id = %job_id))
            .await
    }

    async fn finalize_job(&self, job_id: &str) -> Result<ProductionJob, WorkflowError> {
        let job = self.jobs.get(job_id)?;
        if job.is_finalized() {
            log::info!("Production job {} is already finalized", job_id);
            return Ok(job);
        }

        let snapshot = self.engine.load(job_id).await?;
        if !all_stages_completed(&snapshot.stages) {
            let reason = if snapshot.stages.is_empty() {
                "no stages are configured".to_string()
            } else {
                let progress = snapshot.progress();
                format!(
                    "only {} of {} stages are completed",
                    progress.completed, progress.total
                )
            };
            return Err(WorkflowError::NotFinalizable {
                job_id: job_id.to_string(),
                reason,
            });
        }

        self.engine
            .sync(job_id)
            .await
            .map_err(|e| WorkflowError::LedgerSync {
                job_id: job_id.to_string(),
                source: Box::new(e),
            })?;

        let request = FinalizeRequest {
            sale_id: job.sale_id.clone(),
            job_id: job.id.clone(),
            production_no: job.production_no.clone(),
            studio_charges: snapshot.costs().studio_charges,
        };
        if let Err(e) = self.gateway.finalize_sale(&request).await {
            log::error!("Finalizing sale {} failed: {}", job.sale_id, e);
            return Err(match e {
                err @ WorkflowError::SaleFinalization { .. } => err,
                other => WorkflowError::SaleFinalization {
                    sale_id: job.sale_id.clone(),
                    reason: other.to_string(),
                },
            });
        }

        let finalized = self.jobs.mark_finalized(job_id)?;
        log::info!(
            "Production job {} finalized, studio charges {}",
            finalized.production_no,
            request.studio_charges
        );
        self.audit
            .record(job_id, AuditAction::Finalized, Some(&job), Some(&finalized));
        self.events.stage_data_changed(job_id);
        Ok(finalized)
    }
}
