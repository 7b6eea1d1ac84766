//! Studio event bus for cross-view refresh notifications.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Notification published after a persisted change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StudioEvent {
    /// Stages of a production job were created, updated or deleted.
    StageDataChanged { job_id: String },
    /// Ledger entries of a worker were created, updated or voided.
    WorkerLedgerChanged { worker_id: String },
}

/// Broadcasts studio events to any number of subscribers.
///
/// Publishing is fire-and-forget: there is no acknowledgment and a bus
/// without subscribers silently drops events.
#[derive(Clone)]
pub struct StudioEvents {
    sender: Arc<broadcast::Sender<StudioEvent>>,
}

impl StudioEvents {
    /// Creates a new event bus with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn send(&self, event: StudioEvent) {
        // No active receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StudioEvent> {
        self.sender.subscribe()
    }

    pub fn stage_data_changed(&self, job_id: &str) {
        self.send(StudioEvent::StageDataChanged {
            job_id: job_id.to_string(),
        });
    }

    pub fn worker_ledger_changed(&self, worker_id: &str) {
        self.send(StudioEvent::WorkerLedgerChanged {
            worker_id: worker_id.to_string(),
        });
    }
}

impl Default for StudioEvents {
    fn default() -> Self {
        Self::new(100)
    }
}
