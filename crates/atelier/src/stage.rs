//! Production stage model.
//!
//! A stage is one ordered step of a production job (dyeing, stitching, ...)
//! carried out by an external worker. Stages are identified either by a
//! client-side placeholder ([`StageRef::Local`]) or by their persisted id
//! ([`StageRef::Persisted`]); only persisted stages can be mutated.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;

/// Category of work a stage represents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageCategory {
    Dyeing,
    Stitching,
    Handwork,
    /// Manager-defined stage, identified by its name.
    Custom(String),
}

/// Built-in category table: key, display name, eligible worker roles.
pub(crate) const BUILTIN_CATEGORIES: &[(&str, &str, &[&str])] = &[
    ("dyeing", "Dyeing", &["dyer", "dyeing"]),
    (
        "stitching",
        "Stitching",
        &["tailor", "stitching-master", "cutter", "stitching"],
    ),
    (
        "handwork",
        "Handwork / Embroidery",
        &["hand-worker", "helper", "embroidery", "handwork"],
    ),
];

const CUSTOM_PREFIX: &str = "custom:";

impl StageCategory {
    pub fn custom(name: &str) -> Self {
        StageCategory::Custom(name.trim().to_string())
    }

    /// Stable storage key (`dyeing`, `stitching`, `handwork`, `custom:<name>`).
    pub fn key(&self) -> String {
        match self {
            StageCategory::Dyeing => "dyeing".to_string(),
            StageCategory::Stitching => "stitching".to_string(),
            StageCategory::Handwork => "handwork".to_string(),
            StageCategory::Custom(name) => format!("{}{}", CUSTOM_PREFIX, name),
        }
    }

    /// Parses a storage key. Accepts the legacy `dyer` key for dyeing.
    pub fn parse(key: &str) -> Option<Self> {
        let key = key.trim();
        match key.to_ascii_lowercase().as_str() {
            "dyeing" | "dyer" => Some(StageCategory::Dyeing),
            "stitching" => Some(StageCategory::Stitching),
            "handwork" => Some(StageCategory::Handwork),
            _ => key
                .strip_prefix(CUSTOM_PREFIX)
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(StageCategory::custom),
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            StageCategory::Custom(name) => name,
            builtin => BUILTIN_CATEGORIES
                .iter()
                .find(|(key, _, _)| *key == builtin.key())
                .map(|(_, display, _)| *display)
                .unwrap_or("Stage"),
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, StageCategory::Custom(_))
    }
}

impl fmt::Display for StageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Lifecycle state of a stage.
///
/// `Assigned` covers both "worker assigned, not started" and "in progress".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Assigned,
    Completed,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Pending => "pending",
            StageStatus::Assigned => "assigned",
            StageStatus::Completed => "completed",
        }
    }

    /// Parses a stored status. `in_progress` is the legacy spelling of `assigned`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(StageStatus::Pending),
            "assigned" | "in_progress" | "in progress" => Some(StageStatus::Assigned),
            "completed" => Some(StageStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageStatus::Pending => write!(f, "Pending"),
            StageStatus::Assigned => write!(f, "Assigned"),
            StageStatus::Completed => write!(f, "Completed"),
        }
    }
}

/// Persisted stage identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageId(String);

impl StageId {
    pub fn generate() -> Self {
        StageId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StageId {
    fn from(s: &str) -> Self {
        StageId(s.to_string())
    }
}

impl From<String> for StageId {
    fn from(s: String) -> Self {
        StageId(s)
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Client-generated placeholder for a stage that has not been saved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalStageId(String);

impl LocalStageId {
    pub fn new(id: impl Into<String>) -> Self {
        LocalStageId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocalStageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a stage held by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum StageRef {
    Local(LocalStageId),
    Persisted(StageId),
}

impl StageRef {
    /// Returns the persisted id, or `StageNotPersisted` for placeholders.
    pub fn persisted(&self) -> Result<&StageId, WorkflowError> {
        match self {
            StageRef::Persisted(id) => Ok(id),
            StageRef::Local(local) => Err(WorkflowError::StageNotPersisted {
                local_id: local.to_string(),
            }),
        }
    }

    pub fn is_persisted(&self) -> bool {
        matches!(self, StageRef::Persisted(_))
    }
}

impl From<StageId> for StageRef {
    fn from(id: StageId) -> Self {
        StageRef::Persisted(id)
    }
}

impl From<&ProductionStage> for StageRef {
    fn from(stage: &ProductionStage) -> Self {
        StageRef::Persisted(stage.id.clone())
    }
}

/// A stage the manager has picked locally but not yet saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalStage {
    pub local_id: LocalStageId,
    pub category: StageCategory,
}

impl LocalStage {
    pub fn new(local_id: impl Into<String>, category: StageCategory) -> Self {
        Self {
            local_id: LocalStageId::new(local_id),
            category,
        }
    }

    pub fn stage_ref(&self) -> StageRef {
        StageRef::Local(self.local_id.clone())
    }
}

/// One worker's share of a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerAllocation {
    pub worker_id: String,
    pub cost: Decimal,
    /// Free-form role label; the first allocation is the `Main` worker.
    #[serde(default = "default_allocation_role")]
    pub role: String,
}

fn default_allocation_role() -> String {
    "Main".to_string()
}

impl WorkerAllocation {
    pub fn new(worker_id: &str, cost: Decimal) -> Self {
        Self {
            worker_id: worker_id.to_string(),
            cost,
            role: default_allocation_role(),
        }
    }

    pub fn with_role(mut self, role: &str) -> Self {
        self.role = role.to_string();
        self
    }
}

/// A production stage as seen by the workflow (always normalized).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionStage {
    pub id: StageId,
    pub job_id: String,
    pub category: StageCategory,
    /// Position in the pipeline, 1-based and dense within a job.
    pub order: u32,
    pub assigned_worker_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allocations: Vec<WorkerAllocation>,
    pub expected_cost: Decimal,
    pub actual_cost: Decimal,
    pub status: StageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_completion_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductionStage {
    pub fn stage_ref(&self) -> StageRef {
        StageRef::from(self)
    }

    pub fn is_completed(&self) -> bool {
        self.status == StageStatus::Completed
    }

    /// Actual minus expected cost; `None` until the stage is completed.
    pub fn cost_variance(&self) -> Option<Decimal> {
        self.is_completed()
            .then(|| self.actual_cost - self.expected_cost)
    }

    /// Short label used in messages, e.g. `#2 Stitching`.
    pub fn label(&self) -> String {
        format!("#{} {}", self.order, self.category)
    }
}
