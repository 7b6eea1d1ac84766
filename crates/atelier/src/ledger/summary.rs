use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{LedgerEntry, PaymentState, WorkerLedger};
use crate::directory::{Worker, WorkerDirectory};
use crate::error::WorkflowError;
use crate::stage::{ProductionStage, StageStatus};
use crate::store::StageStore;

/// Workload and earnings overview of one worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerSummary {
    pub worker: Worker,
    pub pending_stages: usize,
    pub active_stages: usize,
    pub completed_stages: usize,
    /// Sum of all active ledger entries.
    pub total_earnings: Decimal,
    /// Sum of active ledger entries not yet fully paid.
    pub due_balance: Decimal,
}

/// Builds a summary from a worker's stages and ledger history.
///
/// Voided entries are skipped.
pub fn summarize_worker(
    worker: Worker,
    stages: &[ProductionStage],
    entries: &[LedgerEntry],
) -> WorkerSummary {
    let mine = stages
        .iter()
        .filter(|s| s.assigned_worker_id.as_deref() == Some(worker.id.as_str()));
    let (mut pending, mut active, mut completed) = (0, 0, 0);
    for stage in mine {
        match stage.status {
            StageStatus::Pending => pending += 1,
            StageStatus::Assigned => active += 1,
            StageStatus::Completed => completed += 1,
        }
    }

    let live = entries
        .iter()
        .filter(|e| e.worker_id == worker.id && !e.is_void());
    let mut total_earnings = Decimal::ZERO;
    let mut due_balance = Decimal::ZERO;
    for entry in live {
        total_earnings += entry.amount;
        if entry.status != PaymentState::Paid {
            due_balance += entry.amount;
        }
    }

    WorkerSummary {
        worker,
        pending_stages: pending,
        active_stages: active,
        completed_stages: completed,
        total_earnings,
        due_balance,
    }
}

/// Summaries for every worker in a company roster.
pub async fn worker_summaries(
    directory: &WorkerDirectory,
    store: &dyn StageStore,
    ledger: &dyn WorkerLedger,
    company_id: &str,
) -> Result<Vec<WorkerSummary>, WorkflowError> {
    let workers = directory.workers(company_id).await?;
    let mut summaries = Vec::with_capacity(workers.len());
    for worker in workers {
        let stages = store.stages_for_worker(&worker.id).await?;
        let entries = ledger.entries_for_worker(&worker.id).await?;
        summaries.push(summarize_worker(worker, &stages, &entries));
    }
    Ok(summaries)
}
