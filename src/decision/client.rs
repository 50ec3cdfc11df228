use async_trait::async_trait;

use crate::agent_engine::goals::Goal;
use crate::agent_engine::history::HistoryEntry;
use crate::decision::types::DecisionOutcome;
use crate::perception::frame::Frame;

/// Boundary to the remote decision service.
///
/// `decide` never returns an error: transport, timeout and parse problems
/// come back as [`DecisionOutcome::Failure`]. There is no retry inside a
/// call; the loop's backoff handles failures.
#[async_trait]
pub trait DecisionClient: Send + Sync {
    fn name(&self) -> &str;

    async fn decide(
        &self,
        goals: &[Goal],
        history: &[HistoryEntry],
        frame: &Frame,
        use_mock_endpoint: bool,
    ) -> DecisionOutcome;
}
