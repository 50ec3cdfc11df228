use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::agent_engine::event_bus::{EventBus, LoopEvent};
use crate::agent_engine::goals::GoalBoard;
use crate::agent_engine::history::{ExecutionResult, HistoryEntry, HistoryLog, SessionJournal};
use crate::agent_engine::loop_control::LoopController;
use crate::agent_engine::state::{CycleOutcome, CycleReport, LoopExit, LoopState, SessionState};
use crate::config::AppConfig;
use crate::decision::client::DecisionClient;
use crate::decision::types::{DecisionAction, DecisionOutcome};
use crate::errors::{CycleError, PilotError, PilotResult};
use crate::executor::dispatcher::dispatch;
use crate::executor::handle::ExecutorHandle;
use crate::executor::safety::validate;
use crate::perception::frame::Frame;
use crate::perception::stability::FrameEffect;
use crate::perception::traits::FrameSource;

/// Final state handed back when the loop ends.
#[derive(Debug, Clone)]
pub struct LoopReport {
    pub exit: LoopExit,
    pub cycles: u64,
    pub history: Vec<HistoryEntry>,
}

/// The capture → decide → validate → execute → record loop.
///
/// The loop is the only writer of its [`SessionState`] and [`HistoryLog`].
/// Other tasks observe it through the [`EventBus`], flip mock mode through
/// [`ControlLoop::mock_switch`], and share the [`ExecutorHandle`].
pub struct ControlLoop {
    state: LoopState,
    session: SessionState,
    history: HistoryLog,
    loop_ctrl: LoopController,
    goals: GoalBoard,
    frames: Arc<dyn FrameSource>,
    decider: Arc<dyn DecisionClient>,
    executor: ExecutorHandle,
    bus: EventBus,
    mock_mode: Arc<AtomicBool>,
    panel_keywords: Vec<String>,
    journal: Option<SessionJournal>,
    /// Newest history entry not yet written to the journal.
    journal_pending: bool,
    cycles: u64,
}

impl ControlLoop {
    pub fn new(
        config: &AppConfig,
        goals: GoalBoard,
        frames: Arc<dyn FrameSource>,
        decider: Arc<dyn DecisionClient>,
        executor: ExecutorHandle,
    ) -> Self {
        Self {
            state: LoopState::Idle,
            session: SessionState::new(config.loop_cfg.stuck_threshold),
            history: HistoryLog::new(),
            loop_ctrl: LoopController::new(config.loop_cfg.clone(), config.fallback.clone()),
            goals,
            frames,
            decider,
            executor,
            bus: EventBus::new(),
            mock_mode: Arc::new(AtomicBool::new(config.gateway.mock)),
            panel_keywords: config.recovery.panel_keywords.clone(),
            journal: None,
            journal_pending: false,
            cycles: 0,
        }
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.bus = bus;
        self
    }

    pub fn with_journal(mut self, journal: SessionJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn event_bus(&self) -> EventBus {
        self.bus.clone()
    }

    /// Shared switch selecting the mock decision endpoint; sampled once per cycle.
    pub fn mock_switch(&self) -> Arc<AtomicBool> {
        self.mock_mode.clone()
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn consecutive_waits(&self) -> u32 {
        self.loop_ctrl.consecutive_waits()
    }

    /// True when `reason` names an obstructing panel and the screen has been
    /// static long enough to raise the stuck signal. The loop only exposes
    /// this; recovery gestures belong to the caller.
    pub fn should_trigger_role_panel_sequence(&self, reason: &str) -> bool {
        let hit = self
            .panel_keywords
            .iter()
            .any(|k| !k.is_empty() && reason.contains(k.as_str()));
        hit && self.session.stuck_signal()
    }

    fn transition(&mut self, next: LoopState) {
        if self.state != next {
            tracing::debug!(from = ?self.state, to = ?next, "loop state transition");
            self.state = next;
            self.bus.publish(LoopEvent::StateChanged {
                state: self.state.clone(),
            });
        }
    }

    fn backoff(&mut self, error: CycleError, delay: Duration) -> CycleOutcome {
        self.loop_ctrl.record_failure();
        tracing::warn!(
            code = error.code(),
            error = %error,
            delay_ms = delay.as_millis() as u64,
            failures = self.loop_ctrl.consecutive_failures(),
            "cycle failed → ErrorBackoff"
        );
        if error != CycleError::ExecutorNotReady {
            self.bus.set_status(format!("{}: {error}, retrying", error.code()));
        }
        self.transition(LoopState::ErrorBackoff {
            code: error.code().to_string(),
            delay_ms: delay.as_millis() as u64,
        });
        CycleOutcome::Backoff { error, delay }
    }

    fn journal_resolved(&mut self) {
        if !self.journal_pending {
            return;
        }
        if let (Some(journal), Some(entry)) = (&self.journal, self.history.last()) {
            if let Err(e) = journal.record(entry) {
                tracing::warn!(error = %e, "journal write failed");
            }
        }
        self.journal_pending = false;
    }

    /// Runs one cycle and reports what happened plus the delay before the next.
    pub async fn run_cycle(&mut self, cancel: &CancellationToken) -> CycleOutcome {
        if self.state == LoopState::Stopped {
            return CycleOutcome::Stopped { report: None };
        }
        if cancel.is_cancelled() {
            return CycleOutcome::Cancelled;
        }
        self.cycles += 1;

        if !self.executor.is_ready() {
            let diagnosis = self.executor.diagnose();
            self.bus.set_status(diagnosis);
            let delay = self.loop_ctrl.standby();
            return self.backoff(CycleError::ExecutorNotReady, delay);
        }

        // Capture
        self.transition(LoopState::Capturing);
        if !self.frames.ensure_ready().await {
            let delay = self.loop_ctrl.error_backoff();
            return self.backoff(CycleError::CaptureNotReady, delay);
        }
        let bytes = match self.frames.capture_frame().await {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => {
                let delay = self.loop_ctrl.error_backoff();
                return self.backoff(CycleError::CaptureEmpty, delay);
            }
            Err(e) => {
                tracing::warn!(source = self.frames.name(), error = %e, "frame capture failed");
                let delay = self.loop_ctrl.error_backoff();
                return self.backoff(CycleError::CaptureEmpty, delay);
            }
        };
        if cancel.is_cancelled() {
            return CycleOutcome::Cancelled;
        }

        // Detect change, resolve the previous action's effect
        let frame = Frame::new(bytes);
        let effect = self
            .session
            .detector
            .observe(self.session.last_frame_hash.as_ref(), &frame.hash);
        self.session.latest_frame_hash = Some(frame.hash.clone());
        let stuck_signal = self.session.stuck_signal();
        if self.history.resolve_last(effect, stuck_signal).is_some() {
            self.journal_resolved();
        }
        if cancel.is_cancelled() {
            return CycleOutcome::Cancelled;
        }

        // Decide
        self.transition(LoopState::Deciding);
        let use_mock = self.mock_mode.load(Ordering::SeqCst);
        self.session.mock_mode = use_mock;
        let goals = self.goals.snapshot().await;
        let snapshot = self.history.snapshot();
        let decision = match self.decider.decide(&goals, &snapshot, &frame, use_mock).await {
            DecisionOutcome::Success(d) => d,
            DecisionOutcome::Failure { code, message, .. } => {
                let delay = self.loop_ctrl.error_backoff();
                return self.backoff(CycleError::DecisionTransport { code, message }, delay);
            }
        };
        if cancel.is_cancelled() {
            return CycleOutcome::Cancelled;
        }

        // Fallback escalation, then validation
        let (decision, fallback_applied) = self.loop_ctrl.apply_fallback(decision);
        self.transition(LoopState::Validating);
        let safe = validate(&decision);
        if cancel.is_cancelled() {
            return CycleOutcome::Cancelled;
        }

        // Execute
        self.transition(LoopState::Executing);
        let report = dispatch(&safe, &self.executor).await;

        // Record
        self.history.append(HistoryEntry {
            action: safe.action.clone(),
            x: report.x,
            y: report.y,
            result: ExecutionResult::from_success(report.success),
            reason: safe.reason.clone(),
            confidence: safe.confidence,
            goal_id: safe.goal_id.clone(),
            effect: FrameEffect::Pending,
            stuck_signal,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        });
        self.journal_pending = true;
        self.session.last_frame_hash = self.session.latest_frame_hash.clone();
        self.loop_ctrl.record_success();

        let panel_recovery_suggested = self.should_trigger_role_panel_sequence(&safe.reason);
        if panel_recovery_suggested {
            tracing::info!(reason = %safe.reason, "obstructing panel reported while stuck");
            self.bus.publish(LoopEvent::PanelObstruction {
                reason: safe.reason.clone(),
                same_frame_count: self.session.same_frame_count(),
            });
        }
        self.bus.publish(LoopEvent::CycleFinished {
            action: safe.action.to_string(),
            success: report.success,
            fallback: fallback_applied,
        });

        let next_capture = Duration::from_millis(safe.next_capture_ms.max(0) as u64);
        let cycle = CycleReport {
            action: safe.action.clone(),
            success: report.success,
            fallback_applied,
            effect,
            same_frame_count: self.session.same_frame_count(),
            stuck_signal,
            panel_recovery_suggested,
            next_capture,
        };

        // Stop check
        if safe.action == DecisionAction::Stop {
            tracing::info!(reason = %safe.reason, "stop decision executed → Stopped");
            self.bus.set_status("stopped");
            self.transition(LoopState::Stopped);
            return CycleOutcome::Stopped { report: Some(cycle) };
        }

        if report.success {
            self.bus
                .set_status(format!("{} ({}ms)", safe.action, safe.next_capture_ms));
        } else {
            self.bus.set_status(format!(
                "{} failed: {}",
                safe.action,
                report.error.as_deref().unwrap_or("unknown error")
            ));
        }
        self.transition(LoopState::Cooling {
            delay_ms: next_capture.as_millis() as u64,
        });
        CycleOutcome::Executed(cycle)
    }

    /// Runs cycles until a `stop` decision or cancellation. Sleeps race the
    /// cancellation token, so cancelling never waits out a cool-down.
    pub async fn run(mut self, cancel: CancellationToken) -> LoopReport {
        tracing::info!(mock = self.mock_mode.load(Ordering::SeqCst), "control loop started");
        self.bus.set_status("running");

        let exit = loop {
            let outcome = self.run_cycle(&cancel).await;
            match outcome {
                CycleOutcome::Stopped { .. } => break LoopExit::Stopped,
                CycleOutcome::Cancelled => break LoopExit::Cancelled,
                other => {
                    let delay = other.delay();
                    let cancelled = tokio::select! {
                        _ = cancel.cancelled() => true,
                        _ = tokio::time::sleep(delay) => false,
                    };
                    if cancelled {
                        break LoopExit::Cancelled;
                    }
                }
            }
        };

        self.journal_resolved();
        if exit == LoopExit::Cancelled {
            self.bus.set_status("paused");
            self.transition(LoopState::Idle);
        }
        tracing::info!(exit = ?exit, cycles = self.cycles, "control loop ended");
        LoopReport {
            exit,
            cycles: self.cycles,
            history: self.history.snapshot(),
        }
    }

    /// Moves the loop onto its own task.
    pub fn spawn(self) -> LoopHandle {
        let cancel = CancellationToken::new();
        let bus = self.bus.clone();
        let mock_mode = self.mock_mode.clone();
        let join = tokio::spawn(self.run(cancel.clone()));
        LoopHandle {
            cancel,
            join,
            bus,
            mock_mode,
        }
    }
}

/// Foreground handle to a spawned loop.
pub struct LoopHandle {
    cancel: CancellationToken,
    join: JoinHandle<LoopReport>,
    bus: EventBus,
    mock_mode: Arc<AtomicBool>,
}

impl LoopHandle {
    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn status(&self) -> String {
        self.bus.status()
    }

    pub fn set_mock_mode(&self, enabled: bool) {
        self.mock_mode.store(enabled, Ordering::SeqCst);
        tracing::info!(mock = enabled, "decision mode switched");
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Waits for the loop to end on its own (`stop` decision or external cancel).
    pub async fn join(self) -> PilotResult<LoopReport> {
        self.join
            .await
            .map_err(|e| PilotError::Agent(format!("control loop task failed: {e}")))
    }

    /// Cancels the loop and waits for it to wind down.
    pub async fn stop(self) -> PilotResult<LoopReport> {
        self.cancel.cancel();
        self.join().await
    }
}
