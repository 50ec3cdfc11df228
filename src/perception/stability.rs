use serde::{Deserialize, Serialize};

use crate::perception::frame::FrameHash;

/// Default number of consecutive unchanged frames that raises the stuck signal.
pub const DEFAULT_STUCK_THRESHOLD: u32 = 2;

/// Observed effect of the last executed action on the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameEffect {
    /// No previous frame to compare against.
    Unknown,
    NoChange,
    Changed,
    /// Action issued, next frame not yet seen.
    Pending,
}

impl FrameEffect {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameEffect::Unknown => "unknown",
            FrameEffect::NoChange => "no_change",
            FrameEffect::Changed => "changed",
            FrameEffect::Pending => "pending",
        }
    }
}

/// Classifies frame transitions by exact content hash and counts how many
/// cycles in a row the screen has stayed the same.
#[derive(Debug, Clone)]
pub struct FrameChangeDetector {
    stuck_threshold: u32,
    same_frame_count: u32,
}

impl Default for FrameChangeDetector {
    fn default() -> Self {
        Self::new(DEFAULT_STUCK_THRESHOLD)
    }
}

impl FrameChangeDetector {
    pub fn new(stuck_threshold: u32) -> Self {
        Self {
            stuck_threshold,
            same_frame_count: 0,
        }
    }

    pub fn classify(previous: Option<&FrameHash>, current: &FrameHash) -> FrameEffect {
        match previous {
            None => FrameEffect::Unknown,
            Some(prev) if prev == current => FrameEffect::NoChange,
            Some(_) => FrameEffect::Changed,
        }
    }

    /// Classifies the transition and updates the same-frame counter:
    /// incremented on `NoChange`, reset on anything else.
    pub fn observe(&mut self, previous: Option<&FrameHash>, current: &FrameHash) -> FrameEffect {
        let effect = Self::classify(previous, current);
        if effect == FrameEffect::NoChange {
            self.same_frame_count = self.same_frame_count.saturating_add(1);
        } else {
            self.same_frame_count = 0;
        }
        tracing::debug!(
            effect = effect.as_str(),
            same_frame_count = self.same_frame_count,
            "frame transition classified"
        );
        effect
    }

    pub fn same_frame_count(&self) -> u32 {
        self.same_frame_count
    }

    pub fn stuck_signal(&self) -> bool {
        self.same_frame_count >= self.stuck_threshold
    }
}
