//! Production stage workflow for made-to-order garment studios.
//!
//! A sale's production job runs through ordered stages (dyeing, stitching,
//! handwork, custom steps), each carried out by an external worker. The
//! crate gates stage transitions, reconciles expected against actual cost
//! and keeps the worker payment ledger in line with stage completion.

pub mod audit;
pub mod completion;
pub mod config;
pub mod configure;
pub mod db;
pub mod directory;
pub mod error;
pub mod events;
pub mod jobs;
pub mod ledger;
pub mod sale;
pub mod stage;
pub mod store;
pub mod studio;
pub mod telemetry;
pub mod workflow;

pub use audit::{AuditAction, AuditRecord, ProductionLog};
pub use completion::CompletionGate;
pub use config::{load_config, load_config_from_str, AtelierConfig, LoggingConfig};
pub use configure::{ConfigurationOutcome, ConfigurationWarning, StageConfigurator};
pub use db::Database;
pub use directory::{
    resolve_worker_name, RoleMap, SqliteWorkerRoster, Worker, WorkerDirectory, WorkerFilter,
    WorkerRoster,
};
pub use error::{AtelierError, ConfigError, Result, WorkflowError};
pub use events::{StudioEvent, StudioEvents};
pub use jobs::{JobService, JobState, ProductionJob};
pub use ledger::{
    DerivedPaymentStatus, LedgerEntry, LedgerSynchronizer, NewLedgerEntry, PaymentState,
    SqliteWorkerLedger, SyncReport, WorkerLedger, WorkerSummary,
};
pub use sale::{FinalizeRequest, SaleContext, SaleGateway};
pub use stage::{
    LocalStage, LocalStageId, ProductionStage, StageCategory, StageId, StageRef, StageStatus,
    WorkerAllocation,
};
pub use store::{SqliteStageStore, StagePatch, StageStore};
pub use studio::Studio;
pub use telemetry::init_logging;
pub use workflow::{
    AssignRequest, CostReconciliation, JobHeaderStatus, JobProgress, JobSnapshot, ReceiveRequest,
    WorkflowEngine,
};
