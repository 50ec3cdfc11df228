use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::executor::traits::GestureExecutor;

/// Shared capability to the current gesture executor.
///
/// Connect and disconnect are explicit transitions on the handle. Clones
/// share state, so a foreground caller can read readiness or fire a test
/// gesture while the loop holds its own clone.
#[derive(Clone, Default)]
pub struct ExecutorHandle {
    slot: Arc<RwLock<Option<Arc<dyn GestureExecutor>>>>,
    connected: Arc<AtomicBool>,
}

impl ExecutorHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connected(executor: Arc<dyn GestureExecutor>) -> Self {
        let handle = Self::new();
        handle.connect(executor);
        handle
    }

    pub fn connect(&self, executor: Arc<dyn GestureExecutor>) {
        let name = executor.name().to_string();
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(executor);
        self.connected.store(true, Ordering::SeqCst);
        tracing::info!(executor = %name, "executor connected");
    }

    /// Marks the executor unavailable without dropping it, e.g. on a
    /// transient service interruption.
    pub fn interrupt(&self) {
        self.connected.store(false, Ordering::SeqCst);
        tracing::warn!("executor interrupted");
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = None;
        tracing::info!("executor disconnected");
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// The executor, only while connected.
    pub fn current(&self) -> Option<Arc<dyn GestureExecutor>> {
        if !self.is_connected() {
            return None;
        }
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_ready(&self) -> bool {
        self.current().is_some_and(|e| e.is_ready())
    }

    /// Human-readable readiness summary for status output.
    pub fn diagnose(&self) -> String {
        let executor = self
            .slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match (executor, self.is_connected()) {
            (None, _) => "executor not attached".to_string(),
            (Some(e), false) => format!("executor {} attached but not connected", e.name()),
            (Some(e), true) if !e.is_ready() => format!("executor {} connected, service not ready", e.name()),
            (Some(e), true) => {
                let b = e.display_bounds();
                format!("executor {} ready ({}x{})", e.name(), b.width, b.height)
            }
        }
    }
}
