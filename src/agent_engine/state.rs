use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::decision::types::DecisionAction;
use crate::errors::CycleError;
use crate::perception::frame::FrameHash;
use crate::perception::stability::{FrameChangeDetector, FrameEffect};

/// Lifecycle states of the control loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoopState {
    Idle,
    Capturing,
    Deciding,
    Validating,
    Executing,
    Cooling { delay_ms: u64 },
    ErrorBackoff { code: String, delay_ms: u64 },
    Stopped,
}

/// Per-session frame tracking. Owned by the loop and mutated only inside a cycle.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// Frame seen when the last action was executed.
    pub last_frame_hash: Option<FrameHash>,
    /// Most recently captured frame.
    pub latest_frame_hash: Option<FrameHash>,
    pub detector: FrameChangeDetector,
    pub mock_mode: bool,
}

impl SessionState {
    pub fn new(stuck_threshold: u32) -> Self {
        Self {
            detector: FrameChangeDetector::new(stuck_threshold),
            ..Self::default()
        }
    }

    pub fn same_frame_count(&self) -> u32 {
        self.detector.same_frame_count()
    }

    pub fn stuck_signal(&self) -> bool {
        self.detector.stuck_signal()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// Action actually executed, after fallback substitution.
    pub action: DecisionAction,
    pub success: bool,
    pub fallback_applied: bool,
    /// Effect of the previous action, observed at this cycle's capture.
    pub effect: FrameEffect,
    pub same_frame_count: u32,
    pub stuck_signal: bool,
    pub panel_recovery_suggested: bool,
    pub next_capture: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Executed(CycleReport),
    Backoff { error: CycleError, delay: Duration },
    /// `report` is `None` when the loop had already stopped.
    Stopped { report: Option<CycleReport> },
    Cancelled,
}

impl CycleOutcome {
    /// Delay before the next cycle.
    pub fn delay(&self) -> Duration {
        match self {
            CycleOutcome::Executed(r) => r.next_capture,
            CycleOutcome::Backoff { delay, .. } => *delay,
            CycleOutcome::Stopped { .. } | CycleOutcome::Cancelled => Duration::ZERO,
        }
    }
}

/// Why `ControlLoop::run` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopExit {
    Stopped,
    Cancelled,
}
