// Gesture injection through `adb shell input`.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::device::{AdbBridge, DisplayBounds};
use crate::errors::{PilotError, PilotResult};
use crate::executor::traits::GestureExecutor;

const KEYCODE_BACK: &str = "4";

pub struct AdbExecutor {
    bridge: AdbBridge,
    /// `wm size` at rotation 0; fixed for the device.
    natural: DisplayBounds,
    /// `natural` rotated to the last observed surface orientation.
    bounds: RwLock<DisplayBounds>,
    online: AtomicBool,
}

impl AdbExecutor {
    /// Probes the device for its state, natural size and current orientation.
    pub async fn connect(bridge: AdbBridge) -> PilotResult<Self> {
        if !bridge.device_online().await {
            return Err(PilotError::Executor("no adb device online".into()));
        }
        let natural = bridge.natural_size().await?;
        let bounds = bridge.display_bounds().await?;
        tracing::info!(width = bounds.width, height = bounds.height, "adb executor attached");
        Ok(Self {
            bridge,
            natural,
            bounds: RwLock::new(bounds),
            online: AtomicBool::new(true),
        })
    }

    async fn input(&self, args: &[&str]) -> PilotResult<()> {
        let mut full = vec!["shell", "input"];
        full.extend_from_slice(args);
        match self.bridge.run(&full).await {
            Ok(_) => Ok(()),
            Err(e) => {
                let online = self.bridge.device_online().await;
                self.online.store(online, Ordering::SeqCst);
                Err(PilotError::Executor(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl GestureExecutor for AdbExecutor {
    fn name(&self) -> &str {
        "adb-input"
    }

    fn is_ready(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn display_bounds(&self) -> DisplayBounds {
        *self.bounds.read().unwrap_or_else(PoisonError::into_inner)
    }

    async fn refresh_bounds(&self) -> PilotResult<()> {
        let turns = self.bridge.surface_orientation().await?;
        let bounds = self.natural.rotated(turns);
        let previous = std::mem::replace(
            &mut *self.bounds.write().unwrap_or_else(PoisonError::into_inner),
            bounds,
        );
        if previous != bounds {
            tracing::info!(width = bounds.width, height = bounds.height, "display rotated");
        }
        Ok(())
    }

    // A zero-length swipe is a press held for `duration_ms`.
    async fn tap(&self, x: i32, y: i32, duration_ms: u64) -> PilotResult<()> {
        let (x, y, d) = (x.to_string(), y.to_string(), duration_ms.to_string());
        self.input(&["swipe", &x, &y, &x, &y, &d]).await
    }

    async fn swipe(&self, x1: i32, y1: i32, x2: i32, y2: i32, duration_ms: u64) -> PilotResult<()> {
        let args = [
            x1.to_string(),
            y1.to_string(),
            x2.to_string(),
            y2.to_string(),
            duration_ms.to_string(),
        ];
        self.input(&["swipe", &args[0], &args[1], &args[2], &args[3], &args[4]])
            .await
    }

    async fn back(&self) -> PilotResult<()> {
        self.input(&["keyevent", KEYCODE_BACK]).await
    }
}
