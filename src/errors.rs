use thiserror::Error;

#[derive(Debug, Error)]
pub enum PilotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Perception error: {0}")]
    Perception(String),

    #[error("Executor error: {0}")]
    Executor(String),

    #[error("Device bridge error: {0}")]
    Device(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Agent error: {0}")]
    Agent(String),
}

impl serde::Serialize for PilotError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

pub type PilotResult<T> = Result<T, PilotError>;

/// Per-cycle failures. None of these terminate the loop; each one maps to a
/// backoff or to a failed history entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CycleError {
    #[error("screen capture not initialized")]
    CaptureNotReady,

    #[error("failed to capture latest frame")]
    CaptureEmpty,

    #[error("decision request failed ({code}): {message}")]
    DecisionTransport { code: String, message: String },

    #[error("gesture executor not ready")]
    ExecutorNotReady,

    #[error("gesture executor unavailable")]
    ExecutorUnavailable,
}

impl CycleError {
    /// Stable diagnostic code surfaced in status text and events.
    pub fn code(&self) -> &str {
        match self {
            CycleError::CaptureNotReady => "capture_not_ready",
            CycleError::CaptureEmpty => "capture_frame_empty",
            CycleError::DecisionTransport { code, .. } => code,
            CycleError::ExecutorNotReady => "executor_not_ready",
            CycleError::ExecutorUnavailable => "executor_unavailable",
        }
    }
}
