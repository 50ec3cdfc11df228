use serde::{Deserialize, Deserializer, Serialize};

use crate::agent_engine::goals::Goal;
use crate::agent_engine::history::HistoryEntry;

/// Action proposed by the decision service. Unknown verbs are kept verbatim
/// in `Other` and executed as a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DecisionAction {
    Tap,
    Swipe,
    Back,
    Wait,
    Stop,
    Other(String),
}

impl DecisionAction {
    pub fn as_str(&self) -> &str {
        match self {
            DecisionAction::Tap => "tap",
            DecisionAction::Swipe => "swipe",
            DecisionAction::Back => "back",
            DecisionAction::Wait => "wait",
            DecisionAction::Stop => "stop",
            DecisionAction::Other(s) => s,
        }
    }
}

impl From<String> for DecisionAction {
    fn from(value: String) -> Self {
        match value.as_str() {
            "tap" => DecisionAction::Tap,
            "swipe" => DecisionAction::Swipe,
            "back" => DecisionAction::Back,
            "wait" => DecisionAction::Wait,
            "stop" => DecisionAction::Stop,
            _ => DecisionAction::Other(value),
        }
    }
}

impl From<&str> for DecisionAction {
    fn from(value: &str) -> Self {
        DecisionAction::from(value.to_string())
    }
}

impl From<DecisionAction> for String {
    fn from(value: DecisionAction) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for DecisionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decision returned by `/decide`. Every field has a default so a sparse
/// body still yields a complete response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionResponse {
    #[serde(default = "default_action")]
    pub action: DecisionAction,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub x_norm: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub y_norm: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub swipe_to_x_norm: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub swipe_to_y_norm: f64,
    #[serde(default = "default_duration_ms", deserialize_with = "lenient_i64")]
    pub duration_ms: i64,
    #[serde(default = "default_next_capture_ms", deserialize_with = "lenient_i64")]
    pub next_capture_ms: i64,
    #[serde(default = "default_goal_id")]
    pub goal_id: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub confidence: f64,
    #[serde(default)]
    pub reason: String,
}

impl Default for DecisionResponse {
    fn default() -> Self {
        Self {
            action: default_action(),
            x_norm: 0.0,
            y_norm: 0.0,
            swipe_to_x_norm: 0.0,
            swipe_to_y_norm: 0.0,
            duration_ms: default_duration_ms(),
            next_capture_ms: default_next_capture_ms(),
            goal_id: default_goal_id(),
            confidence: 0.0,
            reason: String::new(),
        }
    }
}

fn default_action() -> DecisionAction {
    DecisionAction::Wait
}

fn default_duration_ms() -> i64 {
    120
}

fn default_next_capture_ms() -> i64 {
    1200
}

pub(crate) fn default_goal_id() -> String {
    "idle".to_string()
}

/// Result of one `decide` call. Transport and parse errors are values, not
/// panics or `Err`s, so the loop can route them to backoff.
#[derive(Debug, Clone, PartialEq)]
pub enum DecisionOutcome {
    Success(DecisionResponse),
    Failure {
        code: String,
        message: String,
        http_status: Option<u16>,
    },
}

impl DecisionOutcome {
    pub fn failure(code: impl Into<String>, message: impl Into<String>) -> Self {
        DecisionOutcome::Failure {
            code: code.into(),
            message: message.into(),
            http_status: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DecisionOutcome::Success(_))
    }
}

/// JSON-encoded request body for `/decide`.
#[derive(Debug, Clone, Serialize)]
pub struct DecideRequest<'a> {
    pub session_id: &'a str,
    pub timestamp_ms: i64,
    pub current_goal_id: &'a str,
    pub goal_list: &'a [Goal],
    pub history: &'a [HistoryEntry],
    pub screenshot_base64: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LenientNumber {
    Int(i64),
    Float(f64),
    Text(String),
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match LenientNumber::deserialize(deserializer)? {
        LenientNumber::Int(v) => Ok(v as f64),
        LenientNumber::Float(v) => Ok(v),
        LenientNumber::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("not a number: {s}"))),
    }
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match LenientNumber::deserialize(deserializer)? {
        LenientNumber::Int(v) => Ok(v),
        LenientNumber::Float(v) => Ok(v as i64),
        LenientNumber::Text(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .or_else(|_| trimmed.parse::<f64>().map(|f| f as i64))
                .map_err(|_| serde::de::Error::custom(format!("not an integer: {s}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_takes_all_defaults() {
        let resp: DecisionResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(resp, DecisionResponse::default());
        assert_eq!(resp.action, DecisionAction::Wait);
        assert_eq!(resp.duration_ms, 120);
        assert_eq!(resp.next_capture_ms, 1200);
        assert_eq!(resp.goal_id, "idle");
        assert_eq!(resp.reason, "");
    }

    #[test]
    fn numbers_are_read_leniently() {
        let resp: DecisionResponse = serde_json::from_str(
            r#"{"action":"tap","x_norm":1,"y_norm":"0.25","duration_ms":99.7,"next_capture_ms":"800"}"#,
        )
        .unwrap();
        assert_eq!(resp.action, DecisionAction::Tap);
        assert_eq!(resp.x_norm, 1.0);
        assert_eq!(resp.y_norm, 0.25);
        assert_eq!(resp.duration_ms, 99);
        assert_eq!(resp.next_capture_ms, 800);
    }

    #[test]
    fn unknown_action_is_preserved() {
        let resp: DecisionResponse = serde_json::from_str(r#"{"action":"long_press"}"#).unwrap();
        assert_eq!(resp.action, DecisionAction::Other("long_press".into()));
        assert_eq!(resp.action.as_str(), "long_press");
    }

    #[test]
    fn garbage_number_is_a_parse_error() {
        let parsed = serde_json::from_str::<DecisionResponse>(r#"{"x_norm":"left"}"#);
        assert!(parsed.is_err());
    }
}
