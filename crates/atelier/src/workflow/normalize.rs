//! Read-repair for persisted stage rows.
//!
//! Every stage handed to callers passes through [`normalize`]. Rows that
//! break the "assigned stages have a worker" invariant come back as
//! `Pending`; the stored row is left untouched and the anomaly is logged.

use crate::db::stage_repo::StageRow;
use crate::db::values::{parse_decimal, parse_optional_timestamp, parse_timestamp};
use crate::stage::{ProductionStage, StageCategory, StageId, StageStatus, WorkerAllocation};

/// Decodes a stored stage row into a well-formed stage.
pub fn normalize(row: &StageRow) -> ProductionStage {
    let category = StageCategory::parse(&row.category).unwrap_or_else(|| {
        log::warn!(
            "Unknown category '{}' on stage {}, treating as custom stage",
            row.category,
            row.id
        );
        StageCategory::custom(&row.category)
    });

    let mut status = StageStatus::parse(&row.status).unwrap_or_else(|| {
        log::warn!(
            "Unknown status '{}' on stage {}, defaulting to pending",
            row.status,
            row.id
        );
        StageStatus::Pending
    });

    let assigned_worker_id = row
        .assigned_worker_id
        .as_deref()
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .map(str::to_string);

    if status == StageStatus::Assigned && assigned_worker_id.is_none() {
        log::warn!(
            "Stage {} (job {}) is '{}' without an assigned worker, showing it as pending",
            row.id,
            row.job_id,
            row.status
        );
        status = StageStatus::Pending;
    }

    let allocations: Vec<WorkerAllocation> = row
        .allocations
        .as_deref()
        .and_then(|json| match serde_json::from_str(json) {
            Ok(list) => Some(list),
            Err(e) => {
                log::warn!("Invalid allocations JSON on stage {}: {}", row.id, e);
                None
            }
        })
        .unwrap_or_default();

    let order = u32::try_from(row.stage_order).unwrap_or_else(|_| {
        log::warn!("Invalid order {} on stage {}", row.stage_order, row.id);
        0
    });

    ProductionStage {
        id: StageId::from(row.id.as_str()),
        job_id: row.job_id.clone(),
        category,
        order,
        assigned_worker_id,
        allocations,
        expected_cost: parse_decimal(&row.expected_cost, "expected_cost", &row.id),
        actual_cost: parse_decimal(&row.actual_cost, "actual_cost", &row.id),
        status,
        expected_completion_date: parse_optional_timestamp(row.expected_completion_date.as_deref()),
        completed_at: if status == StageStatus::Completed {
            parse_optional_timestamp(row.completed_at.as_deref())
        } else {
            None
        },
        notes: row.notes.clone().unwrap_or_default(),
        created_at: parse_timestamp(&row.created_at),
        updated_at: parse_timestamp(&row.updated_at),
    }
}
