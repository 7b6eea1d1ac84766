use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info_span, Instrument};

use super::{
    derive_payment_status, DerivedPaymentStatus, LedgerEntry, NewLedgerEntry, PaymentState,
    WorkerLedger,
};
use crate::error::WorkflowError;
use crate::events::StudioEvents;
use crate::stage::{ProductionStage, StageId};
use crate::store::StageStore;

/// What a sync pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub voided: usize,
    /// Workers whose ledger changed.
    pub workers: BTreeSet<String>,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.voided == 0
    }
}

/// Keeps ledger entries in line with stage completion.
///
/// Rules applied per stage of a job:
/// - a completed stage with a positive actual cost and a worker has exactly
///   one active entry, for that worker and that amount;
/// - any other stage has no active entry;
/// - entries whose stage no longer exists are voided.
///
/// Entries that already carry a payment are never rewritten; mismatches on
/// them are logged for the operator.
#[derive(Clone)]
pub struct LedgerSynchronizer {
    store: Arc<dyn StageStore>,
    ledger: Arc<dyn WorkerLedger>,
    events: StudioEvents,
}

impl LedgerSynchronizer {
    pub fn new(store: Arc<dyn StageStore>, ledger: Arc<dyn WorkerLedger>, events: StudioEvents) -> Self {
        Self {
            store,
            ledger,
            events,
        }
    }

    pub fn ledger(&self) -> &Arc<dyn WorkerLedger> {
        &self.ledger
    }

    /// Brings the job's ledger entries in line with its stages. Running it
    /// twice in a row changes nothing the second time.
    pub async fn sync_for_job(&self, job_id: &str) -> Result<SyncReport, WorkflowError> {
        self.sync_job(job_id)
            .instrument(info_span!("ledger_sync", job_id = %job_id))
            .await
    }

    async fn sync_job(&self, job_id: &str) -> Result<SyncReport, WorkflowError> {
        let stages = self.store.list_stages(job_id).await?;
        let entries = self.ledger.entries_for_job(job_id).await?;

        let mut by_stage: HashMap<StageId, Vec<LedgerEntry>> = HashMap::new();
        for entry in entries {
            by_stage.entry(entry.stage_id.clone()).or_default().push(entry);
        }

        let mut report = SyncReport::default();
        for stage in &stages {
            let mut existing = by_stage.remove(&stage.id).unwrap_or_default();
            // Newest first; extras beyond the first are duplicates.
            existing.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            let mut iter = existing.into_iter();
            let current = iter.next();
            for duplicate in iter {
                self.void(&duplicate, "duplicate entry", &mut report).await?;
            }
            self.sync_stage(stage, current, &mut report).await?;
        }

        for orphan in by_stage.into_values().flatten() {
            self.void(&orphan, "stage no longer exists", &mut report).await?;
        }

        for worker_id in &report.workers {
            self.events.worker_ledger_changed(worker_id);
        }
        if !report.is_noop() {
            log::info!(
                "Ledger sync for job {}: {} created, {} updated, {} voided",
                job_id,
                report.created,
                report.updated,
                report.voided
            );
        }
        Ok(report)
    }

    async fn sync_stage(
        &self,
        stage: &ProductionStage,
        current: Option<LedgerEntry>,
        report: &mut SyncReport,
    ) -> Result<(), WorkflowError> {
        let owed_to = match stage.assigned_worker_id.as_deref() {
            Some(worker) if stage.is_completed() && stage.actual_cost > Decimal::ZERO => {
                Some(worker)
            }
            None if stage.is_completed() && stage.actual_cost > Decimal::ZERO => {
                log::warn!(
                    "Stage {} is completed with cost {} but has no worker, no ledger entry kept",
                    stage.id,
                    stage.actual_cost
                );
                None
            }
            _ => None,
        };

        match (owed_to, current) {
            (None, None) => {}
            (None, Some(entry)) => {
                self.void(&entry, "stage is not payable", report).await?;
            }
            (Some(worker), None) => {
                self.create(stage, worker, report).await?;
            }
            (Some(worker), Some(entry)) if entry.worker_id != worker => {
                if entry.status.has_payment() {
                    log::warn!(
                        "Stage {} now belongs to worker {} but entry {} for {} is {}, leaving it",
                        stage.id,
                        worker,
                        entry.id,
                        entry.worker_id,
                        entry.status
                    );
                } else {
                    self.void(&entry, "worker changed", report).await?;
                    self.create(stage, worker, report).await?;
                }
            }
            (Some(_), Some(entry)) if entry.amount != stage.actual_cost => {
                if entry.status.has_payment() {
                    log::warn!(
                        "Stage {} cost is {} but {} entry {} records {}, leaving it",
                        stage.id,
                        stage.actual_cost,
                        entry.status,
                        entry.id,
                        entry.amount
                    );
                } else {
                    self.ledger.set_amount(&entry.id, stage.actual_cost).await?;
                    report.updated += 1;
                    report.workers.insert(entry.worker_id);
                }
            }
            (Some(_), Some(_)) => {}
        }
        Ok(())
    }

    async fn create(
        &self,
        stage: &ProductionStage,
        worker_id: &str,
        report: &mut SyncReport,
    ) -> Result<(), WorkflowError> {
        self.ledger
            .create_entry(NewLedgerEntry {
                job_id: stage.job_id.clone(),
                stage_id: stage.id.clone(),
                worker_id: worker_id.to_string(),
                amount: stage.actual_cost,
                notes: Some(stage.label()),
            })
            .await?;
        report.created += 1;
        report.workers.insert(worker_id.to_string());
        Ok(())
    }

    async fn void(
        &self,
        entry: &LedgerEntry,
        reason: &str,
        report: &mut SyncReport,
    ) -> Result<(), WorkflowError> {
        if entry.status.has_payment() {
            log::warn!(
                "Voiding {} ledger entry {} for stage {} ({})",
                entry.status,
                entry.id,
                entry.stage_id,
                reason
            );
        } else {
            log::debug!("Voiding ledger entry {} ({})", entry.id, reason);
        }
        self.ledger.void_entry(&entry.id).await?;
        report.voided += 1;
        report.workers.insert(entry.worker_id.clone());
        Ok(())
    }

    /// Payment status of one stage.
    pub async fn payment_status(
        &self,
        stage: &ProductionStage,
    ) -> Result<DerivedPaymentStatus, WorkflowError> {
        let entry = self.ledger.active_entry(&stage.id).await?;
        Ok(derive_payment_status(stage, entry.as_ref()))
    }

    /// Payment status of every given stage of a job.
    pub async fn payment_statuses(
        &self,
        job_id: &str,
        stages: &[ProductionStage],
    ) -> Result<HashMap<StageId, DerivedPaymentStatus>, WorkflowError> {
        let entries = self.ledger.entries_for_job(job_id).await?;
        let mut newest: HashMap<&StageId, &LedgerEntry> = HashMap::new();
        for entry in &entries {
            match newest.get(&entry.stage_id) {
                Some(seen) if seen.created_at >= entry.created_at => {}
                _ => {
                    newest.insert(&entry.stage_id, entry);
                }
            }
        }
        Ok(stages
            .iter()
            .map(|stage| {
                let entry = newest.get(&stage.id).copied();
                (stage.id.clone(), derive_payment_status(stage, entry))
            })
            .collect())
    }

    /// Records a payment reported by the host's payment flow.
    pub async fn mark_payment(
        &self,
        stage_id: &StageId,
        status: PaymentState,
        payment_ref: Option<&str>,
    ) -> Result<LedgerEntry, WorkflowError> {
        let entry = self
            .ledger
            .mark_status(stage_id, status, payment_ref)
            .instrument(info_span!("mark_payment", stage_id = %stage_id, status = %status))
            .await?;
        log::info!(
            "Ledger entry {} for worker {} marked {}",
            entry.id,
            entry.worker_id,
            status
        );
        self.events.worker_ledger_changed(&entry.worker_id);
        Ok(entry)
    }

    /// A worker's ledger history, newest first.
    pub async fn worker_ledger(&self, worker_id: &str) -> Result<Vec<LedgerEntry>, WorkflowError> {
        self.ledger.entries_for_worker(worker_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::job_repo::{self, JobRow};
    use crate::db::Database;
    use crate::events::StudioEvent;
    use crate::ledger::SqliteWorkerLedger;
    use crate::stage::{StageCategory, StageStatus};
    use crate::store::{SqliteStageStore, StagePatch};
    use chrono::Utc;

    struct Fixture {
        store: Arc<SqliteStageStore>,
        sync: LedgerSynchronizer,
        events: StudioEvents,
    }

    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        job_repo::insert(&db, &JobRow::sample("job-1", "sale-1")).unwrap();
        let store = Arc::new(SqliteStageStore::new(db.clone()));
        let ledger = Arc::new(SqliteWorkerLedger::new(db));
        let events = StudioEvents::new(16);
        let sync = LedgerSynchronizer::new(store.clone(), ledger, events.clone());
        Fixture { store, sync, events }
    }

    async fn completed_stage(store: &SqliteStageStore, worker: &str, cost: i64) -> ProductionStage {
        let stage = store.create_stage("job-1", &StageCategory::Dyeing).await.unwrap();
        store
            .update_stage(
                &stage.id,
                StagePatch {
                    assigned_worker_id: Some(Some(worker.to_string())),
                    actual_cost: Some(Decimal::from(cost)),
                    status: Some(StageStatus::Completed),
                    completed_at: Some(Some(Utc::now())),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_creates_entry_for_completed_stage() {
        let f = fixture();
        let mut rx = f.events.subscribe();
        let stage = completed_stage(&f.store, "w-1", 550).await;

        let report = f.sync.sync_for_job("job-1").await.unwrap();
        assert_eq!(report.created, 1);

        let entry = f.sync.ledger().active_entry(&stage.id).await.unwrap().unwrap();
        assert_eq!(entry.amount, Decimal::from(550));
        assert_eq!(entry.worker_id, "w-1");
        assert_eq!(entry.status, PaymentState::Unpaid);
        assert_eq!(
            rx.try_recv().unwrap(),
            StudioEvent::WorkerLedgerChanged {
                worker_id: "w-1".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_sync_is_idempotent() {
        let f = fixture();
        completed_stage(&f.store, "w-1", 550).await;

        f.sync.sync_for_job("job-1").await.unwrap();
        let second = f.sync.sync_for_job("job-1").await.unwrap();
        assert!(second.is_noop());
        assert_eq!(f.sync.ledger().entries_for_job("job-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_cost_stage_gets_no_entry() {
        let f = fixture();
        let stage = completed_stage(&f.store, "w-1", 0).await;

        let report = f.sync.sync_for_job("job-1").await.unwrap();
        assert!(report.is_noop());
        assert_eq!(
            f.sync.payment_status(&stage).await.unwrap(),
            DerivedPaymentStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_reopened_stage_entry_is_voided() {
        let f = fixture();
        let stage = completed_stage(&f.store, "w-1", 550).await;
        f.sync.sync_for_job("job-1").await.unwrap();

        f.store
            .update_stage(
                &stage.id,
                StagePatch {
                    status: Some(StageStatus::Assigned),
                    completed_at: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let report = f.sync.sync_for_job("job-1").await.unwrap();
        assert_eq!(report.voided, 1);
        assert!(f.sync.ledger().active_entry(&stage.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cost_change_updates_unpaid_entry_only() {
        let f = fixture();
        let stage = completed_stage(&f.store, "w-1", 550).await;
        f.sync.sync_for_job("job-1").await.unwrap();

        f.store
            .update_stage(
                &stage.id,
                StagePatch {
                    actual_cost: Some(Decimal::from(600)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let report = f.sync.sync_for_job("job-1").await.unwrap();
        assert_eq!(report.updated, 1);

        f.sync
            .mark_payment(&stage.id, PaymentState::Paid, Some("PAY-9"))
            .await
            .unwrap();
        f.store
            .update_stage(
                &stage.id,
                StagePatch {
                    actual_cost: Some(Decimal::from(700)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let report = f.sync.sync_for_job("job-1").await.unwrap();
        assert!(report.is_noop());

        let entry = f.sync.ledger().active_entry(&stage.id).await.unwrap().unwrap();
        assert_eq!(entry.amount, Decimal::from(600));
        assert_eq!(entry.status, PaymentState::Paid);
    }

    #[tokio::test]
    async fn test_orphan_entries_voided() {
        let f = fixture();
        f.sync
            .ledger()
            .create_entry(NewLedgerEntry {
                job_id: "job-1".to_string(),
                stage_id: StageId::from("deleted-stage"),
                worker_id: "w-2".to_string(),
                amount: Decimal::from(10),
                notes: None,
            })
            .await
            .unwrap();

        let report = f.sync.sync_for_job("job-1").await.unwrap();
        assert_eq!(report.voided, 1);
        assert!(report.workers.contains("w-2"));
    }

    #[tokio::test]
    async fn test_payment_statuses_for_job() {
        let f = fixture();
        let paid = completed_stage(&f.store, "w-1", 100).await;
        let payable = completed_stage(&f.store, "w-2", 200).await;
        let pending = f
            .store
            .create_stage("job-1", &StageCategory::Handwork)
            .await
            .unwrap();
        f.sync.sync_for_job("job-1").await.unwrap();
        f.sync
            .mark_payment(&paid.id, PaymentState::Paid, None)
            .await
            .unwrap();

        let stages = f.store.list_stages("job-1").await.unwrap();
        let statuses = f.sync.payment_statuses("job-1", &stages).await.unwrap();
        assert_eq!(statuses[&paid.id], DerivedPaymentStatus::Paid);
        assert_eq!(statuses[&payable.id], DerivedPaymentStatus::Payable);
        assert_eq!(statuses[&pending.id], DerivedPaymentStatus::Pending);
    }
}
