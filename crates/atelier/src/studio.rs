//! Composition root wiring the workflow components to one database.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::audit::{AuditRecord, ProductionLog};
use crate::completion::CompletionGate;
use crate::config::AtelierConfig;
use crate::configure::StageConfigurator;
use crate::db::Database;
use crate::directory::{RoleMap, SqliteWorkerRoster, WorkerDirectory};
use crate::error::{ConfigError, Result, WorkflowError};
use crate::events::{StudioEvent, StudioEvents};
use crate::jobs::JobService;
use crate::ledger::{
    worker_summaries, LedgerEntry, LedgerSynchronizer, PaymentState, SqliteWorkerLedger,
    WorkerSummary,
};
use crate::sale::SaleGateway;
use crate::stage::StageId;
use crate::store::{SqliteStageStore, StageStore};
use crate::workflow::WorkflowEngine;

#[derive(Clone)]
pub struct Studio {
    config: AtelierConfig,
    db: Database,
    events: StudioEvents,
    store: Arc<dyn StageStore>,
    directory: WorkerDirectory,
    engine: WorkflowEngine,
    configurator: StageConfigurator,
    jobs: JobService,
    gate: CompletionGate,
    audit: ProductionLog,
}

impl Studio {
    /// Opens the configured database and wires every component to it.
    pub fn open(config: AtelierConfig, gateway: Arc<dyn SaleGateway>) -> Result<Self> {
        let path = config
            .resolved_database_path()
            .ok_or_else(|| ConfigError::Validation {
                message: "No database path configured and no home directory found".to_string(),
            })?;
        log::info!("Opening studio database at {}", path.display());
        let db = Database::open(&path)?;
        Ok(Self::with_database(config, db, gateway))
    }

    pub fn open_in_memory(config: AtelierConfig, gateway: Arc<dyn SaleGateway>) -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self::with_database(config, db, gateway))
    }

    pub fn with_database(
        config: AtelierConfig,
        db: Database,
        gateway: Arc<dyn SaleGateway>,
    ) -> Self {
        let events = StudioEvents::new(config.event_capacity);
        let audit = ProductionLog::new(db.clone());
        let store: Arc<dyn StageStore> = Arc::new(SqliteStageStore::new(db.clone()));
        let ledger = Arc::new(SqliteWorkerLedger::new(db.clone()));
        let directory = WorkerDirectory::new(
            Arc::new(SqliteWorkerRoster::new(db.clone())),
            RoleMap::with_overrides(&config.roles),
        );

        let sync = LedgerSynchronizer::new(store.clone(), ledger, events.clone());
        let engine = WorkflowEngine::new(store.clone(), sync, events.clone(), audit.clone());
        let configurator = StageConfigurator::new(store.clone(), events.clone(), audit.clone());
        let jobs = JobService::new(
            db.clone(),
            gateway.clone(),
            audit.clone(),
            &config.production_number_prefix,
        );
        let gate = CompletionGate::new(
            engine.clone(),
            jobs.clone(),
            gateway,
            events.clone(),
            audit.clone(),
        );

        Self {
            config,
            db,
            events,
            store,
            directory,
            engine,
            configurator,
            jobs,
            gate,
            audit,
        }
    }

    pub fn config(&self) -> &AtelierConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn events(&self) -> &StudioEvents {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StudioEvent> {
        self.events.subscribe()
    }

    pub fn store(&self) -> &Arc<dyn StageStore> {
        &self.store
    }

    pub fn directory(&self) -> &WorkerDirectory {
        &self.directory
    }

    pub fn engine(&self) -> &WorkflowEngine {
        &self.engine
    }

    pub fn configurator(&self) -> &StageConfigurator {
        &self.configurator
    }

    pub fn jobs(&self) -> &JobService {
        &self.jobs
    }

    pub fn completion(&self) -> &CompletionGate {
        &self.gate
    }

    pub fn synchronizer(&self) -> &LedgerSynchronizer {
        self.engine.synchronizer()
    }

    /// Records a payment reported by the host's payment flow.
    pub async fn mark_payment(
        &self,
        stage_id: &StageId,
        status: PaymentState,
        payment_ref: Option<&str>,
    ) -> std::result::Result<LedgerEntry, WorkflowError> {
        self.synchronizer()
            .mark_payment(stage_id, status, payment_ref)
            .await
    }

    pub async fn worker_summaries(
        &self,
        company_id: &str,
    ) -> std::result::Result<Vec<WorkerSummary>, WorkflowError> {
        worker_summaries(
            &self.directory,
            self.store.as_ref(),
            self.synchronizer().ledger().as_ref(),
            company_id,
        )
        .await
    }

    pub async fn worker_ledger(
        &self,
        worker_id: &str,
    ) -> std::result::Result<Vec<LedgerEntry>, WorkflowError> {
        self.synchronizer().worker_ledger(worker_id).await
    }

    pub fn audit_trail(&self, job_id: &str) -> Result<Vec<AuditRecord>> {
        Ok(self.audit.entries(job_id)?)
    }
}
