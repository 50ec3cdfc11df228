use async_trait::async_trait;

use crate::device::AdbBridge;
use crate::errors::{PilotError, PilotResult};
use crate::perception::traits::FrameSource;

/// Frame source backed by `adb exec-out screencap -p`.
pub struct AdbFrameSource {
    bridge: AdbBridge,
}

impl AdbFrameSource {
    pub fn new(bridge: AdbBridge) -> Self {
        Self { bridge }
    }
}

#[async_trait]
impl FrameSource for AdbFrameSource {
    fn name(&self) -> &str {
        "adb-screencap"
    }

    async fn ensure_ready(&self) -> bool {
        self.bridge.device_online().await
    }

    async fn capture_frame(&self) -> PilotResult<Vec<u8>> {
        let png = self.bridge.run(&["exec-out", "screencap", "-p"]).await?;
        if !png.starts_with(b"\x89PNG") {
            return Err(PilotError::Perception(format!(
                "screencap returned {} bytes that are not a PNG",
                png.len()
            )));
        }
        tracing::debug!(bytes = png.len(), "screen captured");
        Ok(png)
    }
}
