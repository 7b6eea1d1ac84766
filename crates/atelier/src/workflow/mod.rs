//! Production workflow: the stage state machine and its read-side views.

pub mod engine;
pub mod guards;
pub mod normalize;
pub mod progress;

pub use engine::{AssignRequest, JobSnapshot, ReceiveRequest, WorkflowEngine};
pub use progress::{CostReconciliation, JobHeaderStatus, JobProgress, StageCost};
