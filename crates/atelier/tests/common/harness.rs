//! Test harness for isolated workflow tests.
//!
//! The `TestHarness` provides:
//! - A `Studio` on an in-memory (or temp-dir) database
//! - A seeded worker roster
//! - A `RecordingGateway` standing in for the sales subsystem

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::broadcast;

use atelier::db::stage_repo::{self, StageRow};
use atelier::db::worker_repo;
use atelier::{
    AtelierConfig, FinalizeRequest, ProductionJob, ProductionStage, SaleGateway, StageCategory,
    StageRef, Studio, StudioEvent, WorkflowError,
};

use super::builders::{default_roster, SaleBuilder, BRANCH};

/// Sale gateway that records finalize calls and can be told to fail.
#[derive(Default)]
pub struct RecordingGateway {
    fallback: Mutex<Option<String>>,
    failure: Mutex<Option<String>>,
    finalized: Mutex<Vec<FinalizeRequest>>,
}

impl RecordingGateway {
    pub fn set_fallback_branch(&self, branch: Option<&str>) {
        *self.fallback.lock().unwrap() = branch.map(str::to_string);
    }

    pub fn fail_with(&self, reason: Option<&str>) {
        *self.failure.lock().unwrap() = reason.map(str::to_string);
    }

    pub fn finalized(&self) -> Vec<FinalizeRequest> {
        self.finalized.lock().unwrap().clone()
    }
}

#[async_trait]
impl SaleGateway for RecordingGateway {
    async fn fallback_branch(&self, _company_id: &str) -> Result<Option<String>, WorkflowError> {
        Ok(self.fallback.lock().unwrap().clone())
    }

    async fn finalize_sale(&self, request: &FinalizeRequest) -> Result<(), WorkflowError> {
        if let Some(reason) = self.failure.lock().unwrap().clone() {
            return Err(WorkflowError::SaleFinalization {
                sale_id: request.sale_id.clone(),
                reason,
            });
        }
        self.finalized.lock().unwrap().push(request.clone());
        Ok(())
    }
}

/// Isolated studio with a seeded roster.
pub struct TestHarness {
    temp_dir: TempDir,
    pub studio: Studio,
    pub gateway: Arc<RecordingGateway>,
}

impl TestHarness {
    /// In-memory database, default configuration, seeded roster.
    pub fn new() -> Self {
        Self::with_config(AtelierConfig::default())
    }

    pub fn with_config(config: AtelierConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let gateway = Arc::new(RecordingGateway::default());
        let studio = Studio::open_in_memory(config, gateway.clone())
            .expect("Failed to open in-memory studio");
        let harness = Self {
            temp_dir,
            studio,
            gateway,
        };
        harness.seed_roster();
        harness
    }

    /// Database file inside the harness temp directory.
    pub fn on_disk() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = AtelierConfig {
            database_path: Some(temp_dir.path().join("data").join("atelier.db")),
            ..Default::default()
        };
        let gateway = Arc::new(RecordingGateway::default());
        let studio = Studio::open(config, gateway.clone()).expect("Failed to open studio");
        let harness = Self {
            temp_dir,
            studio,
            gateway,
        };
        harness.seed_roster();
        harness
    }

    pub fn temp_path(&self) -> &std::path::Path {
        self.temp_dir.path()
    }

    fn seed_roster(&self) {
        for worker in default_roster() {
            worker_repo::insert(self.studio.database(), &worker).expect("Failed to seed worker");
        }
    }

    /// Gets or creates the job of a sale in the default branch.
    pub async fn job(&self, sale_id: &str) -> ProductionJob {
        self.studio
            .jobs()
            .get_or_create(&SaleBuilder::new(sale_id).build())
            .await
            .expect("Failed to create job")
    }

    /// Creates a job and configures its stages in the given order.
    pub async fn configured_job(
        &self,
        sale_id: &str,
        categories: &[StageCategory],
    ) -> (ProductionJob, Vec<ProductionStage>) {
        let job = self.job(sale_id).await;
        let outcome = self
            .studio
            .configurator()
            .apply_configuration(&job.id, categories)
            .await
            .expect("Failed to configure stages");
        assert_eq!(job.branch_id, BRANCH);
        (job, outcome.stages)
    }

    /// Persisted reference of the stage at `order`.
    pub async fn stage_ref(&self, job_id: &str, order: u32) -> StageRef {
        self.stage(job_id, order).await.stage_ref()
    }

    pub async fn stage(&self, job_id: &str, order: u32) -> ProductionStage {
        let snapshot = self
            .studio
            .engine()
            .load(job_id)
            .await
            .expect("Failed to load job");
        snapshot
            .stage_at(order)
            .cloned()
            .unwrap_or_else(|| panic!("no stage at order {}", order))
    }

    /// Writes a raw stage row, bypassing every check.
    pub fn insert_raw_stage(&self, row: StageRow) {
        stage_repo::insert(self.studio.database(), &row).expect("Failed to insert raw stage");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StudioEvent> {
        self.studio.subscribe()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Collects every event currently queued on a receiver.
pub fn drain(rx: &mut broadcast::Receiver<StudioEvent>) -> Vec<StudioEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
