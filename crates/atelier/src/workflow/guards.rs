//! Transition guards over a stage snapshot.
//!
//! Everything here is pure: guards see the freshly read stages of one job
//! and decide before anything is written.

use rust_decimal::Decimal;

use crate::error::WorkflowError;
use crate::ledger::LedgerEntry;
use crate::stage::{ProductionStage, StageStatus, WorkerAllocation};

/// The stage that gates `stage`: the closest one with a lower order.
pub fn predecessor<'a>(
    stage: &ProductionStage,
    stages: &'a [ProductionStage],
) -> Option<&'a ProductionStage> {
    stages
        .iter()
        .filter(|s| s.id != stage.id && s.order < stage.order)
        .max_by_key(|s| s.order)
}

/// Whether a stage is locked for assignment because its predecessor is not
/// completed. Returns the predecessor's order when locked.
pub fn locked_by(stage: &ProductionStage, stages: &[ProductionStage]) -> Option<u32> {
    match predecessor(stage, stages) {
        Some(prev) if !prev.is_completed() => Some(prev.order),
        _ => None,
    }
}

pub fn is_locked(stage: &ProductionStage, stages: &[ProductionStage]) -> bool {
    locked_by(stage, stages).is_some()
}

/// Allocations must name at least one worker and carry non-negative costs.
pub fn validate_allocations(allocations: &[WorkerAllocation]) -> Result<(), WorkflowError> {
    if allocations.is_empty() || allocations.iter().any(|a| a.worker_id.trim().is_empty()) {
        return Err(WorkflowError::NoWorkerSelected);
    }
    if let Some(bad) = allocations.iter().find(|a| a.cost < Decimal::ZERO) {
        return Err(WorkflowError::InvalidCost { amount: bad.cost });
    }
    Ok(())
}

pub fn check_assignable(
    stage: &ProductionStage,
    stages: &[ProductionStage],
) -> Result<(), WorkflowError> {
    if stage.is_completed() {
        return Err(WorkflowError::InvalidTransition {
            stage_id: stage.id.clone(),
            from: stage.status,
            action: "assign",
        });
    }
    if let Some(previous_order) = locked_by(stage, stages) {
        return Err(WorkflowError::StageLocked {
            stage_id: stage.id.clone(),
            previous_order,
        });
    }
    Ok(())
}

pub fn check_actual_cost(actual_cost: Decimal) -> Result<(), WorkflowError> {
    if actual_cost < Decimal::ZERO {
        return Err(WorkflowError::InvalidCost {
            amount: actual_cost,
        });
    }
    Ok(())
}

/// Only assigned work can be received, and only once the predecessor is
/// completed again.
pub fn check_receivable(
    stage: &ProductionStage,
    stages: &[ProductionStage],
) -> Result<(), WorkflowError> {
    if stage.status != StageStatus::Assigned {
        return Err(WorkflowError::InvalidTransition {
            stage_id: stage.id.clone(),
            from: stage.status,
            action: "receive",
        });
    }
    if let Some(previous_order) = locked_by(stage, stages) {
        return Err(WorkflowError::StageLocked {
            stage_id: stage.id.clone(),
            previous_order,
        });
    }
    Ok(())
}

/// A completed stage may be reopened only while no later stage is completed.
pub fn check_reopenable(
    stage: &ProductionStage,
    stages: &[ProductionStage],
) -> Result<(), WorkflowError> {
    if !stage.is_completed() {
        return Err(WorkflowError::InvalidTransition {
            stage_id: stage.id.clone(),
            from: stage.status,
            action: "reopen",
        });
    }
    let completed_after: Vec<String> = stages
        .iter()
        .filter(|s| s.id != stage.id && s.order > stage.order && s.is_completed())
        .map(ProductionStage::label)
        .collect();
    if !completed_after.is_empty() {
        return Err(WorkflowError::CannotReopenDependentsCompleted {
            stage_id: stage.id.clone(),
            completed_after,
        });
    }
    Ok(())
}

/// Reopening is refused once money moved for the stage.
pub fn check_reopen_payment(
    stage: &ProductionStage,
    entry: Option<&LedgerEntry>,
) -> Result<(), WorkflowError> {
    match entry {
        Some(entry) if !entry.is_void() && entry.status.has_payment() => {
            Err(WorkflowError::CannotReopenPaid {
                stage_id: stage.id.clone(),
                payment: entry.status.to_string(),
            })
        }
        _ => Ok(()),
    }
}
