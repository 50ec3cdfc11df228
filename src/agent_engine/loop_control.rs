// Loop-level policy: wait-deadlock fallback and backoff delays.
use std::time::Duration;

use crate::config::{FallbackConfig, LoopConfig};
use crate::decision::types::{DecisionAction, DecisionResponse};

pub struct LoopController {
    config: LoopConfig,
    fallback: FallbackConfig,
    consecutive_waits: u32,
    consecutive_failures: u32,
}

impl LoopController {
    pub fn new(config: LoopConfig, fallback: FallbackConfig) -> Self {
        Self {
            config,
            fallback,
            consecutive_waits: 0,
            consecutive_failures: 0,
        }
    }

    /// Counts consecutive `wait` decisions. When the count reaches the
    /// threshold the decision is replaced by the configured fallback tap and
    /// the count resets. Any other action also resets it.
    ///
    /// Returns the decision to execute and whether it was substituted.
    pub fn apply_fallback(&mut self, decision: DecisionResponse) -> (DecisionResponse, bool) {
        if decision.action != DecisionAction::Wait {
            self.consecutive_waits = 0;
            return (decision, false);
        }

        self.consecutive_waits += 1;
        if self.consecutive_waits < self.config.wait_fallback_threshold {
            return (decision, false);
        }

        self.consecutive_waits = 0;
        tracing::info!(
            threshold = self.config.wait_fallback_threshold,
            x = self.fallback.x_norm,
            y = self.fallback.y_norm,
            "wait deadlock: substituting fallback tap"
        );
        let fallback = DecisionResponse {
            action: DecisionAction::Tap,
            x_norm: self.fallback.x_norm,
            y_norm: self.fallback.y_norm,
            swipe_to_x_norm: 0.0,
            swipe_to_y_norm: 0.0,
            duration_ms: self.fallback.duration_ms,
            next_capture_ms: self.fallback.next_capture_ms,
            goal_id: decision.goal_id,
            confidence: self.fallback.confidence,
            reason: self.fallback.reason.clone(),
        };
        (fallback, true)
    }

    pub fn consecutive_waits(&self) -> u32 {
        self.consecutive_waits
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Failed cycles since the last executed one. Informational only; the
    /// loop never gives up on failures.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.config.error_backoff_ms)
    }

    pub fn standby(&self) -> Duration {
        Duration::from_millis(self.config.standby_ms)
    }
}
