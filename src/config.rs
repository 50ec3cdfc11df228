use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::agent_engine::goals::{ensure_unique_ids, Goal};
use crate::errors::{PilotError, PilotResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default, rename = "loop")]
    pub loop_cfg: LoopConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub journal: JournalConfig,
    #[serde(default = "default_goals")]
    pub goals: Vec<Goal>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            loop_cfg: LoopConfig::default(),
            fallback: FallbackConfig::default(),
            recovery: RecoveryConfig::default(),
            device: DeviceConfig::default(),
            journal: JournalConfig::default(),
            goals: default_goals(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RequestEncoding {
    /// Single JSON document with a base64 screenshot.
    #[default]
    Json,
    /// multipart/form-data with a binary PNG part.
    Multipart,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Upper bound for the whole request, response body included.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub encoding: RequestEncoding,
    /// Start in mock mode (`/decide/mock`).
    #[serde(default)]
    pub mock: bool,
    /// Fixed session id; a random one is generated when absent.
    #[serde(default)]
    pub session_id: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            encoding: RequestEncoding::default(),
            mock: false,
            session_id: None,
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8787".into()
}

fn default_connect_timeout_ms() -> u64 {
    2_000
}

fn default_request_timeout_ms() -> u64 {
    25_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Consecutive unchanged frames that raise the stuck signal.
    #[serde(default = "default_stuck_threshold")]
    pub stuck_threshold: u32,
    /// Consecutive `wait` decisions that trigger the fallback tap.
    #[serde(default = "default_wait_fallback_threshold")]
    pub wait_fallback_threshold: u32,
    /// Delay after any failed cycle, independent of `next_capture_ms`.
    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,
    /// Delay while the executor is not ready.
    #[serde(default = "default_standby_ms")]
    pub standby_ms: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            stuck_threshold: default_stuck_threshold(),
            wait_fallback_threshold: default_wait_fallback_threshold(),
            error_backoff_ms: default_error_backoff_ms(),
            standby_ms: default_standby_ms(),
        }
    }
}

fn default_stuck_threshold() -> u32 {
    2
}

fn default_wait_fallback_threshold() -> u32 {
    3
}

fn default_error_backoff_ms() -> u64 {
    1_500
}

fn default_standby_ms() -> u64 {
    1_000
}

/// Synthetic tap substituted when the decision service keeps answering `wait`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    #[serde(default = "default_fallback_x")]
    pub x_norm: f64,
    #[serde(default = "default_fallback_y")]
    pub y_norm: f64,
    #[serde(default = "default_fallback_duration_ms")]
    pub duration_ms: i64,
    #[serde(default = "default_fallback_next_capture_ms")]
    pub next_capture_ms: i64,
    #[serde(default = "default_fallback_confidence")]
    pub confidence: f64,
    #[serde(default = "default_fallback_reason")]
    pub reason: String,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            x_norm: default_fallback_x(),
            y_norm: default_fallback_y(),
            duration_ms: default_fallback_duration_ms(),
            next_capture_ms: default_fallback_next_capture_ms(),
            confidence: default_fallback_confidence(),
            reason: default_fallback_reason(),
        }
    }
}

fn default_fallback_x() -> f64 {
    0.88
}

fn default_fallback_y() -> f64 {
    0.32
}

fn default_fallback_duration_ms() -> i64 {
    120
}

fn default_fallback_next_capture_ms() -> i64 {
    1_200
}

fn default_fallback_confidence() -> f64 {
    0.8
}

fn default_fallback_reason() -> String {
    "wait_fallback_task_tap".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Substrings of a decision `reason` that indicate an obstructing panel.
    #[serde(default = "default_panel_keywords")]
    pub panel_keywords: Vec<String>,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            panel_keywords: default_panel_keywords(),
        }
    }
}

fn default_panel_keywords() -> Vec<String> {
    vec![
        "角色属性".into(),
        "属性面板".into(),
        "弹窗遮挡".into(),
        "role panel".into(),
        "modal obstruct".into(),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_adb_path")]
    pub adb_path: String,
    #[serde(default)]
    pub serial: Option<String>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            adb_path: default_adb_path(),
            serial: None,
        }
    }
}

fn default_adb_path() -> String {
    "adb".into()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JournalConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Defaults to the platform data directory.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_goals() -> Vec<Goal> {
    vec![
        Goal::new("mainline_unlock", "Advance the main storyline until the daily entry unlocks", 1),
        Goal::new("level_gate_45", "Level up to the stage gate", 2),
        Goal::new("one_click_build", "Apply the one-click attribute and skill build", 3),
        Goal::new("gear_baseline", "Upgrade gear to the minimum clear baseline", 4),
        Goal::new("daily_loop", "Complete sect and daily quest loops", 5),
        Goal::new("trade_loop", "Run the listing and inventory clearing routine", 6),
    ]
}

impl AppConfig {
    /// Applies `SCREENPILOT_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("SCREENPILOT_GATEWAY_URL") {
            self.gateway.base_url = url;
        }
        if let Ok(mock) = std::env::var("SCREENPILOT_MOCK") {
            self.gateway.mock = matches!(mock.trim(), "1" | "true" | "yes");
        }
        if let Ok(serial) = std::env::var("SCREENPILOT_ADB_SERIAL") {
            self.device.serial = Some(serial);
        }
    }

    pub fn validate(&self) -> PilotResult<()> {
        ensure_unique_ids(&self.goals)?;
        if self.loop_cfg.wait_fallback_threshold == 0 {
            return Err(PilotError::Config("loop.wait_fallback_threshold must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.fallback.x_norm) || !(0.0..=1.0).contains(&self.fallback.y_norm) {
            return Err(PilotError::Config("fallback coordinates must be within [0, 1]".into()));
        }
        Ok(())
    }
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Some(candidate);
            }
        }
    }

    let candidate = std::env::current_dir().ok()?.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Some(candidate);
    }
    None
}

pub fn load_config_from(path: &Path) -> PilotResult<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let mut config: AppConfig = toml::from_str(&content)?;
    config.apply_env_overrides();
    config.validate()?;
    tracing::info!(path = %path.display(), gateway = %config.gateway.base_url, "config loaded");
    Ok(config)
}

/// Loads `config.toml` from an explicit path, next to the executable, or the
/// working directory, in that order. Falls back to defaults when none exists.
pub fn load_config(explicit: Option<&Path>) -> PilotResult<AppConfig> {
    if let Some(path) = explicit {
        return load_config_from(path);
    }
    match resolve_config_path() {
        Some(path) => load_config_from(&path),
        None => {
            tracing::warn!("config.toml not found; using built-in defaults");
            let mut config = AppConfig::default();
            config.apply_env_overrides();
            config.validate()?;
            Ok(config)
        }
    }
}

pub fn save_config(config: &AppConfig, path: &Path) -> PilotResult<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg: AppConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.gateway.base_url, "http://127.0.0.1:8787");
        assert_eq!(cfg.gateway.encoding, RequestEncoding::Json);
        assert_eq!(cfg.loop_cfg.stuck_threshold, 2);
        assert_eq!(cfg.loop_cfg.wait_fallback_threshold, 3);
        assert_eq!(cfg.fallback.x_norm, 0.88);
        assert_eq!(cfg.fallback.reason, "wait_fallback_task_tap");
        assert_eq!(cfg.goals.len(), 6);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn sections_override_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [gateway]
            base_url = "http://10.0.0.2:9000"
            encoding = "multipart"
            mock = true

            [loop]
            wait_fallback_threshold = 5

            [[goals]]
            id = "only"
            desc = "single goal"
            priority = 1
            "#,
        )
        .unwrap();
        assert_eq!(cfg.gateway.base_url, "http://10.0.0.2:9000");
        assert_eq!(cfg.gateway.encoding, RequestEncoding::Multipart);
        assert!(cfg.gateway.mock);
        assert_eq!(cfg.loop_cfg.wait_fallback_threshold, 5);
        assert_eq!(cfg.loop_cfg.error_backoff_ms, 1500);
        assert_eq!(cfg.goals.len(), 1);
        assert!(!cfg.goals[0].done);
    }

    #[test]
    fn duplicate_goals_fail_validation() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [[goals]]
            id = "a"
            desc = "x"
            [[goals]]
            id = "a"
            desc = "y"
            "#,
        )
        .unwrap();
        assert!(matches!(cfg.validate(), Err(PilotError::Config(_))));
    }

    #[test]
    fn config_and_goal_board_reject_duplicates_alike() {
        let mut cfg = AppConfig::default();
        cfg.goals.push(Goal::new("daily_loop", "again", 9));
        let from_config = cfg.validate().unwrap_err().to_string();
        let from_board = crate::agent_engine::goals::GoalBoard::new(cfg.goals.clone())
            .unwrap_err()
            .to_string();
        assert_eq!(from_config, from_board);
        assert!(from_config.contains("daily_loop"));
    }

    #[test]
    fn save_then_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut cfg = AppConfig::default();
        cfg.fallback.x_norm = 0.5;
        save_config(&cfg, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.fallback.x_norm, 0.5);
        assert_eq!(loaded.goals.len(), 6);
    }
}
