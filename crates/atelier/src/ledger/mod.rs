//! Worker payment ledger.
//!
//! One ledger entry records what a worker is owed for one completed stage.
//! Entries are voided rather than deleted; only active (non-voided) entries
//! count toward payment state and balances.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;
use crate::stage::StageId;

mod sqlite;
mod status;
mod summary;
mod sync;

pub use sqlite::SqliteWorkerLedger;
pub use status::{derive_payment_status, DerivedPaymentStatus};
pub use summary::{summarize_worker, worker_summaries, WorkerSummary};
pub use sync::{LedgerSynchronizer, SyncReport};

/// Stored payment state of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Unpaid,
    Partial,
    Paid,
}

impl PaymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentState::Unpaid => "unpaid",
            PaymentState::Partial => "partial",
            PaymentState::Paid => "paid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unpaid" => Some(PaymentState::Unpaid),
            "partial" => Some(PaymentState::Partial),
            "paid" => Some(PaymentState::Paid),
            _ => None,
        }
    }

    /// Whether money has already moved for the entry.
    pub fn has_payment(&self) -> bool {
        !matches!(self, PaymentState::Unpaid)
    }
}

impl fmt::Display for PaymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: String,
    pub job_id: String,
    pub stage_id: StageId,
    pub worker_id: String,
    pub amount: Decimal,
    pub status: PaymentState,
    pub payment_ref: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub voided_at: Option<DateTime<Utc>>,
}

impl LedgerEntry {
    pub fn is_void(&self) -> bool {
        self.voided_at.is_some()
    }
}

/// Fields of an entry about to be created. New entries start `Unpaid`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLedgerEntry {
    pub job_id: String,
    pub stage_id: StageId,
    pub worker_id: String,
    pub amount: Decimal,
    pub notes: Option<String>,
}

/// Ledger persistence contract.
#[async_trait]
pub trait WorkerLedger: Send + Sync {
    async fn create_entry(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, WorkflowError>;

    /// The active entry of a stage, if any.
    async fn active_entry(&self, stage_id: &StageId) -> Result<Option<LedgerEntry>, WorkflowError>;

    /// Active entries of a job.
    async fn entries_for_job(&self, job_id: &str) -> Result<Vec<LedgerEntry>, WorkflowError>;

    async fn set_amount(&self, entry_id: &str, amount: Decimal) -> Result<(), WorkflowError>;

    /// Voids one entry. Voiding an already-voided entry is a no-op.
    async fn void_entry(&self, entry_id: &str) -> Result<(), WorkflowError>;

    /// Records a payment state change on the active entry of a stage.
    async fn mark_status(
        &self,
        stage_id: &StageId,
        status: PaymentState,
        payment_ref: Option<&str>,
    ) -> Result<LedgerEntry, WorkflowError>;

    /// Every entry of a worker, voided ones included, newest first.
    async fn entries_for_worker(&self, worker_id: &str) -> Result<Vec<LedgerEntry>, WorkflowError>;
}
