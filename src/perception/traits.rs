use async_trait::async_trait;

use crate::errors::PilotResult;

/// Supplies still images of the current screen on demand.
#[async_trait]
pub trait FrameSource: Send + Sync {
    fn name(&self) -> &str;

    /// Prepares the capture pipeline if needed. `false` means no frame can
    /// be taken this cycle.
    async fn ensure_ready(&self) -> bool;

    /// Encoded image of the current screen. An empty buffer counts as a
    /// failed capture.
    async fn capture_frame(&self) -> PilotResult<Vec<u8>>;
}
