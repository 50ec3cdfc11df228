use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::agent_engine::engine::{ControlLoop, LoopReport};
use crate::agent_engine::goals::GoalBoard;
use crate::agent_engine::history::SessionJournal;
use crate::config::AppConfig;
use crate::decision::http::HttpDecisionClient;
use crate::decision::types::{DecisionAction, DecisionResponse};
use crate::device::AdbBridge;
use crate::errors::{PilotError, PilotResult};
use crate::executor::dispatcher::dispatch;
use crate::executor::handle::ExecutorHandle;
use crate::executor::input::AdbExecutor;
use crate::perception::screenshot::AdbFrameSource;
use crate::perception::traits::FrameSource;

const TEST_TAP_X: f64 = 0.5;
const TEST_TAP_Y: f64 = 0.6;
const TEST_TAP_MS: i64 = 120;

fn session_id(cfg: &AppConfig) -> String {
    cfg.gateway
        .session_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Attaches the adb executor if a device answers; otherwise returns an
/// unattached handle so the loop can start and wait for one.
async fn attach_executor(bridge: &AdbBridge) -> ExecutorHandle {
    let handle = ExecutorHandle::new();
    match AdbExecutor::connect(bridge.clone()).await {
        Ok(executor) => handle.connect(Arc::new(executor)),
        Err(e) => tracing::warn!(error = %e, "executor not attached"),
    }
    handle
}

/// Re-attaches the executor whenever it drops out, until `cancel` fires.
fn spawn_reconnect(
    bridge: AdbBridge,
    handle: ExecutorHandle,
    every: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(every) => {}
            }
            if handle.is_ready() {
                continue;
            }
            match AdbExecutor::connect(bridge.clone()).await {
                Ok(executor) => handle.connect(Arc::new(executor)),
                Err(e) => tracing::debug!(error = %e, "executor still unavailable"),
            }
        }
    })
}

/// Builds the adb-backed loop and runs it until `stop` or Ctrl-C.
pub async fn run_agent(cfg: AppConfig) -> PilotResult<LoopReport> {
    let session_id = session_id(&cfg);
    let bridge = AdbBridge::from_config(&cfg.device);
    let goals = GoalBoard::new(cfg.goals.clone())?;
    let frames = Arc::new(AdbFrameSource::new(bridge.clone()));
    let decider = Arc::new(HttpDecisionClient::new(&cfg.gateway, session_id.clone())?);
    let executor = attach_executor(&bridge).await;

    let mut control = ControlLoop::new(&cfg, goals, frames, decider, executor.clone());
    if cfg.journal.enabled {
        let journal = SessionJournal::new(&session_id, cfg.journal.dir.as_deref())?;
        tracing::info!(path = %journal.path().display(), "journal enabled");
        control = control.with_journal(journal);
    }

    tracing::info!(
        session = %session_id,
        gateway = %cfg.gateway.base_url,
        mock = cfg.gateway.mock,
        "starting session"
    );

    let handle = control.spawn();
    let cancel = handle.cancellation_token();

    let mut status = handle.event_bus().watch_status();
    let status_task = tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let text = status.borrow_and_update().clone();
            tracing::info!(status = %text, "status");
        }
    });

    let reconnect = spawn_reconnect(
        bridge,
        executor,
        Duration::from_millis(cfg.loop_cfg.standby_ms),
        cancel.clone(),
    );

    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, stopping loop");
            ctrl_c_cancel.cancel();
        }
    });

    let report = handle.join().await;
    cancel.cancel();
    let _ = reconnect.await;
    status_task.abort();
    report
}

/// Frame source and executor readiness plus gateway health, one line each.
pub async fn diagnose(cfg: &AppConfig) -> String {
    let bridge = AdbBridge::from_config(&cfg.device);
    let frames = AdbFrameSource::new(bridge.clone());
    let executor = attach_executor(&bridge).await;

    let capture = if frames.ensure_ready().await {
        format!("frame source {}: ready", frames.name())
    } else {
        format!("frame source {}: not ready", frames.name())
    };

    let gateway = match HttpDecisionClient::new(&cfg.gateway, session_id(cfg)) {
        Ok(client) => match client.health().await {
            Ok(body) => format!("gateway {}: healthy {body}", cfg.gateway.base_url),
            Err(e) => format!("gateway {}: unreachable ({e})", cfg.gateway.base_url),
        },
        Err(e) => format!("gateway {}: client error ({e})", cfg.gateway.base_url),
    };

    format!("{capture}\n{}\n{gateway}", executor.diagnose())
}

/// One tap at (0.5, 0.6) through the executor handle.
pub async fn test_tap(cfg: &AppConfig) -> PilotResult<()> {
    let bridge = AdbBridge::from_config(&cfg.device);
    let handle = attach_executor(&bridge).await;
    if !handle.is_ready() {
        return Err(PilotError::Executor(handle.diagnose()));
    }

    let tap = DecisionResponse {
        action: DecisionAction::Tap,
        x_norm: TEST_TAP_X,
        y_norm: TEST_TAP_Y,
        duration_ms: TEST_TAP_MS,
        reason: "manual_test_tap".into(),
        ..DecisionResponse::default()
    };
    let report = dispatch(&tap, &handle).await;
    tracing::info!(x = report.x, y = report.y, success = report.success, "test tap");
    match report.error {
        None => Ok(()),
        Some(e) => Err(PilotError::Executor(e)),
    }
}
