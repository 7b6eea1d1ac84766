use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use super::{LedgerEntry, NewLedgerEntry, PaymentState, WorkerLedger};
use crate::db::ledger_repo::{self, LedgerRow};
use crate::db::values::{
    format_decimal, format_timestamp, parse_decimal, parse_optional_timestamp, parse_timestamp,
};
use crate::db::Database;
use crate::error::WorkflowError;
use crate::stage::StageId;

/// [`WorkerLedger`] backed by the `worker_ledger_entries` table.
#[derive(Clone)]
pub struct SqliteWorkerLedger {
    db: Database,
}

impl SqliteWorkerLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn entry_from_row(row: LedgerRow) -> LedgerEntry {
    let status = PaymentState::parse(&row.status).unwrap_or_else(|| {
        log::warn!(
            "Unknown ledger status '{}' on entry {}, treating as unpaid",
            row.status,
            row.id
        );
        PaymentState::Unpaid
    });
    LedgerEntry {
        amount: parse_decimal(&row.amount, "amount", &row.id),
        created_at: parse_timestamp(&row.created_at),
        paid_at: parse_optional_timestamp(row.paid_at.as_deref()),
        voided_at: parse_optional_timestamp(row.voided_at.as_deref()),
        id: row.id,
        job_id: row.job_id,
        stage_id: StageId::from(row.stage_id),
        worker_id: row.worker_id,
        status,
        payment_ref: row.payment_ref,
        notes: row.notes,
    }
}

#[async_trait]
impl WorkerLedger for SqliteWorkerLedger {
    async fn create_entry(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, WorkflowError> {
        if entry.amount < Decimal::ZERO {
            return Err(WorkflowError::InvalidCost {
                amount: entry.amount,
            });
        }
        let row = LedgerRow {
            id: uuid::Uuid::new_v4().to_string(),
            job_id: entry.job_id,
            stage_id: entry.stage_id.to_string(),
            worker_id: entry.worker_id,
            amount: format_decimal(entry.amount),
            status: PaymentState::Unpaid.as_str().to_string(),
            payment_ref: None,
            notes: entry.notes,
            created_at: format_timestamp(Utc::now()),
            paid_at: None,
            voided_at: None,
        };
        ledger_repo::insert(&self.db, &row)?;
        log::info!(
            "Ledger entry {} created for worker {} (stage {}, amount {})",
            row.id,
            row.worker_id,
            row.stage_id,
            row.amount
        );
        Ok(entry_from_row(row))
    }

    async fn active_entry(&self, stage_id: &StageId) -> Result<Option<LedgerEntry>, WorkflowError> {
        Ok(ledger_repo::find_active_by_stage(&self.db, stage_id.as_str())?.map(entry_from_row))
    }

    async fn entries_for_job(&self, job_id: &str) -> Result<Vec<LedgerEntry>, WorkflowError> {
        let rows = ledger_repo::list_active_by_job(&self.db, job_id)?;
        Ok(rows.into_iter().map(entry_from_row).collect())
    }

    async fn set_amount(&self, entry_id: &str, amount: Decimal) -> Result<(), WorkflowError> {
        if amount < Decimal::ZERO {
            return Err(WorkflowError::InvalidCost { amount });
        }
        ledger_repo::update_amount(&self.db, entry_id, &format_decimal(amount))?;
        Ok(())
    }

    async fn void_entry(&self, entry_id: &str) -> Result<(), WorkflowError> {
        ledger_repo::void(&self.db, entry_id, &format_timestamp(Utc::now()))?;
        log::info!("Ledger entry {} voided", entry_id);
        Ok(())
    }

    async fn mark_status(
        &self,
        stage_id: &StageId,
        status: PaymentState,
        payment_ref: Option<&str>,
    ) -> Result<LedgerEntry, WorkflowError> {
        let row = ledger_repo::find_active_by_stage(&self.db, stage_id.as_str())?
            .ok_or_else(|| WorkflowError::LedgerEntryNotFound(stage_id.clone()))?;

        let paid_at = match status {
            PaymentState::Paid => Some(format_timestamp(Utc::now())),
            _ => None,
        };
        let payment_ref = payment_ref.or(row.payment_ref.as_deref()).map(str::to_string);
        ledger_repo::update_status(
            &self.db,
            &row.id,
            status.as_str(),
            payment_ref.as_deref(),
            paid_at.as_deref(),
        )?;

        Ok(entry_from_row(LedgerRow {
            status: status.as_str().to_string(),
            payment_ref,
            paid_at,
            ..row
        }))
    }

    async fn entries_for_worker(&self, worker_id: &str) -> Result<Vec<LedgerEntry>, WorkflowError> {
        let rows = ledger_repo::list_by_worker(&self.db, worker_id)?;
        Ok(rows.into_iter().map(entry_from_row).collect())
    }
}
