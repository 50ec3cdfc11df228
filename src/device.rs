//! Thin wrapper over the `adb` command line used by the concrete frame
//! source and gesture executor.
use std::time::Duration;

use tokio::process::Command;

use crate::config::DeviceConfig;
use crate::errors::{PilotError, PilotResult};

const ADB_TIMEOUT_SECS: u64 = 10;

/// Screen size in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DisplayBounds {
    pub width: u32,
    pub height: u32,
}

impl DisplayBounds {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Bounds as seen by `input` for a surface rotation of 0-3 quarter turns.
    /// Quarter turns 1 and 3 swap width and height.
    pub fn rotated(self, quarter_turns: u8) -> Self {
        if quarter_turns % 2 == 1 {
            Self::new(self.height, self.width)
        } else {
            self
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdbBridge {
    adb_path: String,
    serial: Option<String>,
}

impl AdbBridge {
    pub fn new(adb_path: impl Into<String>, serial: Option<String>) -> Self {
        Self {
            adb_path: adb_path.into(),
            serial,
        }
    }

    pub fn from_config(cfg: &DeviceConfig) -> Self {
        Self::new(cfg.adb_path.clone(), cfg.serial.clone())
    }

    /// Runs `adb [-s serial] <args>` and returns stdout. Non-zero exit is an error.
    pub async fn run(&self, args: &[&str]) -> PilotResult<Vec<u8>> {
        let mut cmd = Command::new(&self.adb_path);
        if let Some(serial) = &self.serial {
            cmd.args(["-s", serial.as_str()]);
        }
        cmd.args(args).kill_on_drop(true);

        tracing::debug!(adb = %self.adb_path, args = ?args, "running adb");
        let output = tokio::time::timeout(Duration::from_secs(ADB_TIMEOUT_SECS), cmd.output())
            .await
            .map_err(|_| PilotError::Device(format!("adb {} timed out", args.join(" "))))??;

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PilotError::Device(format!(
                "adb {} exited with {code}: {}",
                args.join(" "),
                stderr.trim()
            )));
        }
        Ok(output.stdout)
    }

    pub async fn run_text(&self, args: &[&str]) -> PilotResult<String> {
        let stdout = self.run(args).await?;
        Ok(String::from_utf8_lossy(&stdout).trim().to_string())
    }

    /// True when `adb get-state` reports an attached, authorised device.
    pub async fn device_online(&self) -> bool {
        match self.run_text(&["get-state"]).await {
            Ok(state) => state == "device",
            Err(e) => {
                tracing::debug!(error = %e, "adb get-state failed");
                false
            }
        }
    }

    /// Natural (rotation 0) screen size from `wm size`.
    pub async fn natural_size(&self) -> PilotResult<DisplayBounds> {
        let text = self.run_text(&["shell", "wm", "size"]).await?;
        parse_wm_size(&text)
            .ok_or_else(|| PilotError::Device(format!("unrecognised `wm size` output: {text}")))
    }

    /// Current surface rotation in quarter turns, from `dumpsys input`.
    pub async fn surface_orientation(&self) -> PilotResult<u8> {
        let text = self.run_text(&["shell", "dumpsys", "input"]).await?;
        parse_surface_orientation(&text)
            .ok_or_else(|| PilotError::Device("no SurfaceOrientation in `dumpsys input`".into()))
    }

    /// Screen size in the current orientation. An unreadable orientation
    /// counts as rotation 0.
    pub async fn display_bounds(&self) -> PilotResult<DisplayBounds> {
        let natural = self.natural_size().await?;
        let turns = match self.surface_orientation().await {
            Ok(turns) => turns,
            Err(e) => {
                tracing::debug!(error = %e, "orientation unknown, assuming portrait");
                0
            }
        };
        Ok(natural.rotated(turns))
    }
}

/// Parses `wm size` output. An override size wins over the physical size.
pub fn parse_wm_size(text: &str) -> Option<DisplayBounds> {
    let mut physical = None;
    let mut overridden = None;
    for line in text.lines() {
        let Some((label, value)) = line.split_once(':') else {
            continue;
        };
        let Some((w, h)) = value.trim().split_once('x') else {
            continue;
        };
        let (Ok(width), Ok(height)) = (w.trim().parse::<u32>(), h.trim().parse::<u32>()) else {
            continue;
        };
        let bounds = DisplayBounds::new(width, height);
        if label.trim().starts_with("Override") {
            overridden = Some(bounds);
        } else {
            physical = Some(bounds);
        }
    }
    overridden.or(physical)
}

/// First `SurfaceOrientation: N` line of `dumpsys input` output.
pub fn parse_surface_orientation(text: &str) -> Option<u8> {
    text.lines().find_map(|line| {
        let value = line.trim().strip_prefix("SurfaceOrientation:")?;
        value.trim().parse::<u8>().ok().filter(|turns| *turns < 4)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_physical_size() {
        assert_eq!(
            parse_wm_size("Physical size: 1080x2400"),
            Some(DisplayBounds::new(1080, 2400))
        );
    }

    #[test]
    fn override_size_wins() {
        let out = "Physical size: 1440x3200\nOverride size: 1080x2400\n";
        assert_eq!(parse_wm_size(out), Some(DisplayBounds::new(1080, 2400)));
    }

    #[test]
    fn garbage_is_none() {
        assert_eq!(parse_wm_size("error: no devices/emulators found"), None);
        assert_eq!(parse_wm_size(""), None);
    }

    #[test]
    fn reads_surface_orientation() {
        let out = "Viewport INTERNAL: displayId=0\n    Viewport: displayId=0\n    SurfaceOrientation: 1\n    SurfaceOrientation: 0\n";
        assert_eq!(parse_surface_orientation(out), Some(1));
        assert_eq!(parse_surface_orientation("SurfaceOrientation: 7"), None);
        assert_eq!(parse_surface_orientation("Input Dispatcher State:"), None);
    }

    #[test]
    fn landscape_swaps_dimensions() {
        let portrait = DisplayBounds::new(1080, 2400);
        assert_eq!(portrait.rotated(0), portrait);
        assert_eq!(portrait.rotated(1), DisplayBounds::new(2400, 1080));
        assert_eq!(portrait.rotated(2), portrait);
        assert_eq!(portrait.rotated(3), DisplayBounds::new(2400, 1080));
    }

    #[tokio::test]
    async fn missing_binary_is_an_error() {
        let bridge = AdbBridge::new("/nonexistent/adb-binary", None);
        assert!(bridge.run(&["devices"]).await.is_err());
        assert!(!bridge.device_online().await);
    }
}
