use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::decision::types::default_goal_id;
use crate::errors::{PilotError, PilotResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    #[serde(rename = "desc", alias = "description")]
    pub description: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default = "default_priority")]
    pub priority: i32,
}

fn default_priority() -> i32 {
    99
}

impl Goal {
    pub fn new(id: impl Into<String>, description: impl Into<String>, priority: i32) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            done: false,
            priority,
        }
    }
}

/// Ordered goal set fixed at session start. Only `done` changes afterwards,
/// and only from outside the loop; the loop reads a snapshot every cycle.
#[derive(Debug, Clone)]
pub struct GoalBoard {
    goals: Arc<RwLock<Vec<Goal>>>,
}

impl GoalBoard {
    pub fn new(goals: Vec<Goal>) -> PilotResult<Self> {
        ensure_unique_ids(&goals)?;
        Ok(Self {
            goals: Arc::new(RwLock::new(goals)),
        })
    }

    pub async fn snapshot(&self) -> Vec<Goal> {
        self.goals.read().await.clone()
    }

    /// Returns false when no goal has this id.
    pub async fn set_done(&self, id: &str, done: bool) -> bool {
        let mut goals = self.goals.write().await;
        match goals.iter_mut().find(|g| g.id == id) {
            Some(goal) => {
                goal.done = done;
                tracing::info!(goal = %id, done, "goal status updated");
                true
            }
            None => false,
        }
    }
}

/// Rejects a goal list in which two goals share an id.
pub fn ensure_unique_ids(goals: &[Goal]) -> PilotResult<()> {
    let mut seen = HashSet::new();
    for goal in goals {
        if !seen.insert(goal.id.as_str()) {
            return Err(PilotError::Config(format!("duplicate goal id '{}'", goal.id)));
        }
    }
    Ok(())
}

/// First goal in list order that is not done, or `"idle"`.
pub fn current_goal_id(goals: &[Goal]) -> String {
    goals
        .iter()
        .find(|g| !g.done)
        .map(|g| g.id.clone())
        .unwrap_or_else(default_goal_id)
}
