//! Stage configuration: which stages a job has and in what order.
//!
//! Reconfiguration keeps the data of stages whose category stays selected.
//! Removals that the store refuses are reported as warnings; the rest of the
//! configuration still applies.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info_span, Instrument};

use crate::audit::{AuditAction, ProductionLog};
use crate::error::WorkflowError;
use crate::events::StudioEvents;
use crate::jobs::JobState;
use crate::stage::{
    LocalStage, LocalStageId, ProductionStage, StageCategory, StageId, StageRef, StageStatus,
};
use crate::store::{StagePatch, StageStore};

/// A stage that could not be removed during reconfiguration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationWarning {
    pub stage_id: StageId,
    pub category: StageCategory,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationOutcome {
    /// Stages after reconfiguration, re-read from the store.
    pub stages: Vec<ProductionStage>,
    pub warnings: Vec<ConfigurationWarning>,
    /// True when all stages were recreated from scratch.
    pub reset: bool,
}

impl ConfigurationOutcome {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Binds a locally picked stage to its persisted identity.
    pub fn resolve(&self, local: &LocalStage) -> Option<StageRef> {
        self.stages
            .iter()
            .find(|s| s.category == local.category)
            .map(ProductionStage::stage_ref)
    }
}

#[derive(Clone)]
pub struct StageConfigurator {
    store: Arc<dyn StageStore>,
    events: StudioEvents,
    audit: ProductionLog,
}

impl StageConfigurator {
    pub fn new(store: Arc<dyn StageStore>, events: StudioEvents, audit: ProductionLog) -> Self {
        Self {
            store,
            events,
            audit,
        }
    }

    /// Makes the job's stages match `categories`, in that order.
    pub async fn apply_configuration(
        &self,
        job_id: &str,
        categories: &[StageCategory],
    ) -> Result<ConfigurationOutcome, WorkflowError> {
        check_unique(categories)?;
        if self.store.job_state(job_id).await? == JobState::Finalized {
            return Err(WorkflowError::JobFinalized {
                job_id: job_id.to_string(),
            });
        }
        self.apply(job_id, categories)
            .instrument(info_span!("configure", job_id = %job_id, stages = categories.len()))
            .await
    }

    /// Saves locally picked stages and returns each one's persisted reference.
    pub async fn materialize(
        &self,
        job_id: &str,
        locals: &[LocalStage],
    ) -> Result<(ConfigurationOutcome, Vec<(LocalStageId, StageRef)>), WorkflowError> {
        let categories: Vec<StageCategory> = locals.iter().map(|l| l.category.clone()).collect();
        let outcome = self.apply_configuration(job_id, &categories).await?;
        let bound = locals
            .iter()
            .map(|local| {
                let stage_ref = outcome.resolve(local).unwrap_or_else(|| local.stage_ref());
                (local.local_id.clone(), stage_ref)
            })
            .collect();
        Ok((outcome, bound))
    }

    async fn apply(
        &self,
        job_id: &str,
        categories: &[StageCategory],
    ) -> Result<ConfigurationOutcome, WorkflowError> {
        let existing = self.store.list_stages(job_id).await?;
        let reset = existing
            .iter()
            .all(|s| s.status == StageStatus::Pending && s.assigned_worker_id.is_none());

        let warnings = if reset {
            self.reset(job_id, &existing, categories).await?;
            Vec::new()
        } else {
            self.reconcile(job_id, &existing, categories).await?
        };

        let stages = self.store.list_stages(job_id).await?;
        self.events.stage_data_changed(job_id);

        let before: Vec<String> = existing.iter().map(|s| s.category.key()).collect();
        let after: Vec<String> = stages.iter().map(|s| s.category.key()).collect();
        self.audit
            .record(job_id, AuditAction::Configured, Some(&before), Some(&after));
        log::info!(
            "Configured job {}: {} stage(s){}, {} warning(s)",
            job_id,
            stages.len(),
            if reset { " (reset)" } else { "" },
            warnings.len()
        );

        Ok(ConfigurationOutcome {
            stages,
            warnings,
            reset,
        })
    }

    /// Deletes every stage and recreates them in list order.
    async fn reset(
        &self,
        job_id: &str,
        existing: &[ProductionStage],
        categories: &[StageCategory],
    ) -> Result<(), WorkflowError> {
        for stage in existing {
            self.store.delete_stage(&stage.id).await?;
        }
        for category in categories {
            self.store.create_stage(job_id, category).await?;
        }
        Ok(())
    }

    /// Diffs by category, keeping retained stages untouched apart from order.
    async fn reconcile(
        &self,
        job_id: &str,
        existing: &[ProductionStage],
        categories: &[StageCategory],
    ) -> Result<Vec<ConfigurationWarning>, WorkflowError> {
        let mut warnings = Vec::new();
        let mut claimed: HashSet<&StageId> = HashSet::new();
        let mut listed: Vec<Option<StageId>> = Vec::with_capacity(categories.len());

        for category in categories {
            let kept = existing
                .iter()
                .find(|s| &s.category == category && !claimed.contains(&s.id));
            if let Some(stage) = kept {
                claimed.insert(&stage.id);
            }
            listed.push(kept.map(|s| s.id.clone()));
        }

        let mut leftovers = Vec::new();
        for stage in existing.iter().filter(|s| !claimed.contains(&s.id)) {
            match self.store.delete_stage(&stage.id).await {
                Ok(()) => {}
                Err(WorkflowError::StageNotDeletable { reason, .. }) => {
                    log::warn!(
                        "Keeping stage {} ({}) in job {}: {}",
                        stage.id,
                        stage.category,
                        job_id,
                        reason
                    );
                    warnings.push(ConfigurationWarning {
                        stage_id: stage.id.clone(),
                        category: stage.category.clone(),
                        reason,
                    });
                    leftovers.push(stage);
                }
                Err(e) => return Err(e),
            }
        }

        let mut ordered = Vec::with_capacity(listed.len() + leftovers.len());
        for (category, kept) in categories.iter().zip(listed) {
            let id = match kept {
                Some(id) => id,
                None => self.store.create_stage(job_id, category).await?.id,
            };
            ordered.push(id);
        }
        leftovers.sort_by_key(|s| s.order);
        ordered.extend(leftovers.into_iter().map(|s| s.id.clone()));

        self.renumber(job_id, &ordered).await?;
        Ok(warnings)
    }

    /// Writes dense orders 1..N following `ordered`.
    async fn renumber(&self, job_id: &str, ordered: &[StageId]) -> Result<(), WorkflowError> {
        let current = self.store.list_stages(job_id).await?;
        for (index, id) in ordered.iter().enumerate() {
            let order = index as u32 + 1;
            let unchanged = current.iter().any(|s| &s.id == id && s.order == order);
            if unchanged {
                continue;
            }
            self.store
                .update_stage(
                    id,
                    StagePatch {
                        order: Some(order),
                        ..Default::default()
                    },
                )
                .await?;
        }
        Ok(())
    }
}

fn check_unique(categories: &[StageCategory]) -> Result<(), WorkflowError> {
    let mut seen = HashSet::new();
    for category in categories {
        if !seen.insert(category.key()) {
            return Err(WorkflowError::DuplicateCategory(
                category.display_name().to_string(),
            ));
        }
    }
    Ok(())
}
