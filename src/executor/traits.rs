use async_trait::async_trait;

use crate::device::DisplayBounds;
use crate::errors::PilotResult;

/// Gesture-capable executor. Coordinates are absolute pixels inside
/// [`GestureExecutor::display_bounds`].
#[async_trait]
pub trait GestureExecutor: Send + Sync {
    fn name(&self) -> &str;

    /// Readiness of the underlying platform service.
    fn is_ready(&self) -> bool;

    fn display_bounds(&self) -> DisplayBounds;

    /// Re-reads the current display bounds, e.g. after a rotation. Called
    /// before every mapped gesture; executors with fixed bounds keep the default.
    async fn refresh_bounds(&self) -> PilotResult<()> {
        Ok(())
    }

    async fn tap(&self, x: i32, y: i32, duration_ms: u64) -> PilotResult<()>;

    async fn swipe(&self, x1: i32, y1: i32, x2: i32, y2: i32, duration_ms: u64) -> PilotResult<()>;

    /// Global "navigate back".
    async fn back(&self) -> PilotResult<()>;
}
