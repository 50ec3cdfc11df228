// Routes a validated decision to the gesture executor.
use crate::decision::types::{DecisionAction, DecisionResponse};
use crate::errors::CycleError;
use crate::executor::coordinator::to_physical;
use crate::executor::handle::ExecutorHandle;

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    pub success: bool,
    /// Absolute pixel position of the gesture start (0,0 when unknown).
    pub x: i32,
    pub y: i32,
    pub error: Option<String>,
}

impl ExecutionReport {
    fn failed(x: i32, y: i32, error: String) -> Self {
        Self {
            success: false,
            x,
            y,
            error: Some(error),
        }
    }
}

/// Executes `safe` (already validated) through the handle's executor.
///
/// `wait`, `stop` and unknown actions make no executor call and succeed.
/// A missing or disconnected executor fails the action without escalating.
pub async fn dispatch(safe: &DecisionResponse, handle: &ExecutorHandle) -> ExecutionReport {
    let Some(executor) = handle.current() else {
        tracing::warn!(action = %safe.action, "executor unavailable; action recorded as failed");
        return ExecutionReport::failed(0, 0, CycleError::ExecutorUnavailable.to_string());
    };

    if let Err(e) = executor.refresh_bounds().await {
        tracing::warn!(error = %e, "display bounds refresh failed; using last known bounds");
    }
    let bounds = executor.display_bounds();
    let (x, y) = to_physical(safe.x_norm, safe.y_norm, bounds);
    let duration_ms = safe.duration_ms.max(0) as u64;

    let result = match &safe.action {
        DecisionAction::Tap => executor.tap(x, y, duration_ms).await,
        DecisionAction::Swipe => {
            let (to_x, to_y) = to_physical(safe.swipe_to_x_norm, safe.swipe_to_y_norm, bounds);
            executor.swipe(x, y, to_x, to_y, duration_ms).await
        }
        DecisionAction::Back => executor.back().await,
        DecisionAction::Wait | DecisionAction::Stop => Ok(()),
        DecisionAction::Other(verb) => {
            tracing::debug!(action = %verb, "unrecognised action treated as wait");
            Ok(())
        }
    };

    match result {
        Ok(()) => {
            tracing::info!(action = %safe.action, x, y, duration_ms, "action executed");
            ExecutionReport {
                success: true,
                x,
                y,
                error: None,
            }
        }
        Err(e) => {
            tracing::warn!(action = %safe.action, x, y, error = %e, "action failed");
            ExecutionReport::failed(x, y, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DisplayBounds;
    use crate::errors::{PilotError, PilotResult};
    use crate::executor::traits::GestureExecutor;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl GestureExecutor for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }
        fn is_ready(&self) -> bool {
            true
        }
        fn display_bounds(&self) -> DisplayBounds {
            DisplayBounds::new(1000, 2000)
        }
        async fn tap(&self, x: i32, y: i32, d: u64) -> PilotResult<()> {
            self.calls.lock().unwrap().push(format!("tap {x} {y} {d}"));
            if self.fail {
                return Err(PilotError::Executor("gesture rejected".into()));
            }
            Ok(())
        }
        async fn swipe(&self, x1: i32, y1: i32, x2: i32, y2: i32, d: u64) -> PilotResult<()> {
            self.calls.lock().unwrap().push(format!("swipe {x1} {y1} {x2} {y2} {d}"));
            Ok(())
        }
        async fn back(&self) -> PilotResult<()> {
            self.calls.lock().unwrap().push("back".into());
            Ok(())
        }
    }

    fn decision(action: &str) -> DecisionResponse {
        DecisionResponse {
            action: DecisionAction::from(action),
            x_norm: 0.5,
            y_norm: 0.25,
            swipe_to_x_norm: 0.1,
            swipe_to_y_norm: 1.0,
            duration_ms: 300,
            ..DecisionResponse::default()
        }
    }

    #[tokio::test]
    async fn routes_each_action() {
        let rec = Arc::new(Recorder::default());
        let handle = ExecutorHandle::connected(rec.clone());

        for action in ["tap", "swipe", "back", "wait", "stop", "pinch"] {
            let report = dispatch(&decision(action), &handle).await;
            assert!(report.success, "{action}");
        }

        let calls = rec.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                "tap 500 500 300".to_string(),
                "swipe 500 500 100 1999 300".to_string(),
                "back".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn executor_error_marks_failure() {
        let rec = Arc::new(Recorder {
            fail: true,
            ..Recorder::default()
        });
        let handle = ExecutorHandle::connected(rec);
        let report = dispatch(&decision("tap"), &handle).await;
        assert!(!report.success);
        assert_eq!((report.x, report.y), (500, 500));
        assert!(report.error.unwrap().contains("rejected"));
    }

    #[tokio::test]
    async fn disconnected_handle_fails_without_panicking() {
        let handle = ExecutorHandle::new();
        let report = dispatch(&decision("wait"), &handle).await;
        assert!(!report.success);
        assert_eq!(report.error.as_deref(), Some("gesture executor unavailable"));
    }
}
