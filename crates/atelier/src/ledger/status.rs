use std::fmt;

use serde::{Deserialize, Serialize};

use super::{LedgerEntry, PaymentState};
use crate::stage::ProductionStage;

/// Payment status of a stage as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedPaymentStatus {
    /// Not completed yet, or completed with nothing owed.
    Pending,
    /// Completed and owed, no payment recorded.
    Payable,
    Partial,
    Paid,
}

impl fmt::Display for DerivedPaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DerivedPaymentStatus::Pending => "Pending",
            DerivedPaymentStatus::Payable => "Payable",
            DerivedPaymentStatus::Partial => "Partial",
            DerivedPaymentStatus::Paid => "Paid",
        };
        f.write_str(label)
    }
}

/// Derives the payment status of a stage from its active ledger entry.
pub fn derive_payment_status(
    stage: &ProductionStage,
    entry: Option<&LedgerEntry>,
) -> DerivedPaymentStatus {
    match entry.filter(|e| !e.is_void()).map(|e| e.status) {
        Some(PaymentState::Paid) => DerivedPaymentStatus::Paid,
        Some(PaymentState::Partial) => DerivedPaymentStatus::Partial,
        Some(PaymentState::Unpaid) if stage.is_completed() => DerivedPaymentStatus::Payable,
        _ => DerivedPaymentStatus::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::{StageCategory, StageId, StageStatus};
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn stage(status: StageStatus) -> ProductionStage {
        ProductionStage {
            id: StageId::from("s-1"),
            job_id: "job-1".to_string(),
            category: StageCategory::Dyeing,
            order: 1,
            assigned_worker_id: Some("w-1".to_string()),
            allocations: Vec::new(),
            expected_cost: Decimal::from(500),
            actual_cost: Decimal::from(550),
            status,
            expected_completion_date: None,
            completed_at: None,
            notes: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn entry(status: PaymentState) -> LedgerEntry {
        LedgerEntry {
            id: "e-1".to_string(),
            job_id: "job-1".to_string(),
            stage_id: StageId::from("s-1"),
            worker_id: "w-1".to_string(),
            amount: Decimal::from(550),
            status,
            payment_ref: None,
            notes: None,
            created_at: Utc::now(),
            paid_at: None,
            voided_at: None,
        }
    }

    #[test]
    fn test_payable_only_when_completed_and_unpaid() {
        let completed = stage(StageStatus::Completed);
        let unpaid = entry(PaymentState::Unpaid);
        assert_eq!(
            derive_payment_status(&completed, Some(&unpaid)),
            DerivedPaymentStatus::Payable
        );
        assert_eq!(
            derive_payment_status(&stage(StageStatus::Assigned), Some(&unpaid)),
            DerivedPaymentStatus::Pending
        );
        assert_eq!(
            derive_payment_status(&completed, None),
            DerivedPaymentStatus::Pending
        );
    }

    #[test]
    fn test_recorded_payments_win() {
        let completed = stage(StageStatus::Completed);
        assert_eq!(
            derive_payment_status(&completed, Some(&entry(PaymentState::Paid))),
            DerivedPaymentStatus::Paid
        );
        assert_eq!(
            derive_payment_status(&completed, Some(&entry(PaymentState::Partial))),
            DerivedPaymentStatus::Partial
        );
    }

    #[test]
    fn test_voided_entry_is_ignored() {
        let mut voided = entry(PaymentState::Paid);
        voided.voided_at = Some(Utc::now());
        assert_eq!(
            derive_payment_status(&stage(StageStatus::Completed), Some(&voided)),
            DerivedPaymentStatus::Pending
        );
    }
}
