use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::decision::types::DecisionAction;
use crate::errors::PilotResult;
use crate::perception::stability::FrameEffect;

/// Number of executed actions kept for the decision service.
pub const HISTORY_CAPACITY: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionResult {
    Ok,
    Failed,
}

impl ExecutionResult {
    pub fn from_success(ok: bool) -> Self {
        if ok {
            ExecutionResult::Ok
        } else {
            ExecutionResult::Failed
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub action: DecisionAction,
    pub x: i32,
    pub y: i32,
    pub result: ExecutionResult,
    pub reason: String,
    pub confidence: f64,
    pub goal_id: String,
    pub effect: FrameEffect,
    pub stuck_signal: bool,
    pub timestamp_ms: i64,
}

/// Bounded, chronological record of executed actions.
///
/// Writes are two-phase: an entry is appended with `effect = pending` when
/// the action is issued, then [`HistoryLog::resolve_last`] fills in the
/// observed effect once the following frame has been compared.
#[derive(Debug, Clone, Default)]
pub struct HistoryLog {
    entries: VecDeque<HistoryEntry>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(HISTORY_CAPACITY),
        }
    }

    /// Appends `entry`, evicting the oldest one when full. Returns the
    /// evicted entry, if any.
    pub fn append(&mut self, entry: HistoryEntry) -> Option<HistoryEntry> {
        let evicted = if self.entries.len() >= HISTORY_CAPACITY {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        evicted
    }

    /// Rewrites `effect` and `stuck_signal` of the most recent entry.
    /// No-op on an empty log.
    pub fn resolve_last(&mut self, effect: FrameEffect, stuck_signal: bool) -> Option<&HistoryEntry> {
        let last = self.entries.back_mut()?;
        last.effect = effect;
        last.stuck_signal = stuck_signal;
        Some(last)
    }

    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Append-only JSONL journal of resolved history entries, one file per session.
pub struct SessionJournal {
    file_path: PathBuf,
}

impl SessionJournal {
    pub fn new(session_id: &str, dir: Option<&Path>) -> PilotResult<Self> {
        let dir = match dir {
            Some(d) => d.to_path_buf(),
            None => data_dir_or_cwd(),
        };
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            file_path: dir.join(format!("session_{session_id}.jsonl")),
        })
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub fn record(&self, entry: &HistoryEntry) -> PilotResult<()> {
        let line = serde_json::to_string(entry)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;
        writeln!(file, "{}", line)?;
        tracing::debug!(path = %self.file_path.display(), "journal entry flushed");
        Ok(())
    }
}

/// `<platform data dir>/ScreenPilot/sessions`, falling back to the working directory.
fn data_dir_or_cwd() -> PathBuf {
    if let Some(data_dir) = dirs::data_local_dir() {
        return data_dir.join("ScreenPilot").join("sessions");
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}
