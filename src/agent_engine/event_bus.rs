use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};

use crate::agent_engine::state::LoopState;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LoopEvent {
    StateChanged { state: LoopState },
    CycleFinished { action: String, success: bool, fallback: bool },
    /// Latest decision reports an obstructing panel while the screen is stuck.
    PanelObstruction { reason: String, same_frame_count: u32 },
}

/// Fan-out of loop events plus the latest operator-facing status line.
///
/// Only the loop publishes; any number of foreground readers may subscribe
/// or read the status concurrently.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LoopEvent>,
    status_tx: Arc<watch::Sender<String>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(100);
        let (status_tx, _) = watch::channel("idle".to_string());
        Self {
            tx,
            status_tx: Arc::new(status_tx),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LoopEvent> {
        self.tx.subscribe()
    }

    /// Publishing with no subscribers is not an error.
    pub fn publish(&self, event: LoopEvent) {
        let _ = self.tx.send(event);
    }

    pub fn set_status(&self, text: impl Into<String>) {
        self.status_tx.send_replace(text.into());
    }

    pub fn status(&self) -> String {
        self.status_tx.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<String> {
        self.status_tx.subscribe()
    }
}
