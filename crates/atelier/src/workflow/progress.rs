//! Job-level views derived from a stage snapshot.

use rust_decimal::Decimal;
use serde::Serialize;

use super::guards;
use crate::stage::{ProductionStage, StageId, StageStatus};

/// Header status of a production job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobHeaderStatus {
    /// No stages configured yet.
    Draft,
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    pub status: JobHeaderStatus,
    pub completed: usize,
    pub total: usize,
    /// First stage that may currently be assigned, if any.
    pub next_assignable: Option<StageId>,
}

impl JobProgress {
    pub fn from_stages(stages: &[ProductionStage]) -> Self {
        let total = stages.len();
        let completed = stages.iter().filter(|s| s.is_completed()).count();
        let status = if total == 0 {
            JobHeaderStatus::Draft
        } else if completed == total {
            JobHeaderStatus::Completed
        } else if stages.iter().any(|s| s.status != StageStatus::Pending) {
            JobHeaderStatus::InProgress
        } else {
            JobHeaderStatus::Pending
        };

        let mut ordered: Vec<&ProductionStage> = stages.iter().collect();
        ordered.sort_by_key(|s| s.order);
        let next_assignable = ordered
            .into_iter()
            .find(|s| !s.is_completed() && !guards::is_locked(s, stages))
            .map(|s| s.id.clone());

        Self {
            status,
            completed,
            total,
            next_assignable,
        }
    }

    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.completed * 100) / self.total) as u8
    }
}

/// Expected against actual cost of one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageCost {
    pub stage_id: StageId,
    pub label: String,
    pub expected: Decimal,
    /// Set once the stage is completed.
    pub actual: Option<Decimal>,
    pub variance: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostReconciliation {
    pub stages: Vec<StageCost>,
    pub total_expected: Decimal,
    /// Sum of actual costs of completed stages, charged to the sale.
    pub studio_charges: Decimal,
    /// Studio charges minus the expected cost of the completed stages.
    pub variance: Decimal,
}

impl CostReconciliation {
    pub fn from_stages(stages: &[ProductionStage]) -> Self {
        let mut total_expected = Decimal::ZERO;
        let mut studio_charges = Decimal::ZERO;
        let mut completed_expected = Decimal::ZERO;
        let mut lines = Vec::with_capacity(stages.len());

        for stage in stages {
            total_expected += stage.expected_cost;
            if stage.is_completed() {
                studio_charges += stage.actual_cost;
                completed_expected += stage.expected_cost;
            }
            lines.push(StageCost {
                stage_id: stage.id.clone(),
                label: stage.label(),
                expected: stage.expected_cost,
                actual: stage.is_completed().then_some(stage.actual_cost),
                variance: stage.cost_variance(),
            });
        }

        Self {
            stages: lines,
            total_expected,
            studio_charges,
            variance: studio_charges - completed_expected,
        }
    }
}
