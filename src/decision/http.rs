use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::multipart::{Form, Part};

use crate::agent_engine::goals::{current_goal_id, Goal};
use crate::agent_engine::history::HistoryEntry;
use crate::config::{GatewayConfig, RequestEncoding};
use crate::decision::client::DecisionClient;
use crate::decision::types::{DecideRequest, DecisionOutcome, DecisionResponse};
use crate::errors::{PilotError, PilotResult};
use crate::perception::frame::Frame;

const DECIDE_PATH: &str = "/decide";
const DECIDE_MOCK_PATH: &str = "/decide/mock";
const MAX_ERROR_BODY: usize = 240;

/// HTTP client for the decision gateway.
pub struct HttpDecisionClient {
    base_url: String,
    session_id: String,
    encoding: RequestEncoding,
    client: reqwest::Client,
}

impl HttpDecisionClient {
    pub fn new(cfg: &GatewayConfig, session_id: impl Into<String>) -> PilotResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(cfg.connect_timeout_ms))
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()?;
        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            session_id: session_id.into(),
            encoding: cfg.encoding,
            client,
        })
    }

    pub fn endpoint(&self, use_mock_endpoint: bool) -> String {
        let path = if use_mock_endpoint { DECIDE_MOCK_PATH } else { DECIDE_PATH };
        format!("{}{}", self.base_url, path)
    }

    /// `GET /health` on the gateway.
    pub async fn health(&self) -> PilotResult<serde_json::Value> {
        let value = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json::<serde_json::Value>()
            .await?;
        Ok(value)
    }

    async fn post(
        &self,
        goals: &[Goal],
        history: &[HistoryEntry],
        frame: &Frame,
        url: &str,
    ) -> PilotResult<reqwest::Response> {
        let timestamp_ms = chrono::Utc::now().timestamp_millis();
        let current_goal = current_goal_id(goals);

        let request = match self.encoding {
            RequestEncoding::Json => {
                let body = DecideRequest {
                    session_id: &self.session_id,
                    timestamp_ms,
                    current_goal_id: &current_goal,
                    goal_list: goals,
                    history,
                    screenshot_base64: base64::engine::general_purpose::STANDARD.encode(&frame.bytes),
                };
                tracing::debug!(
                    url = %url,
                    current_goal = %current_goal,
                    history = history.len(),
                    image_bytes = frame.bytes.len(),
                    "sending JSON decide request (image omitted from log)"
                );
                self.client.post(url).json(&body)
            }
            RequestEncoding::Multipart => {
                let image = Part::bytes(frame.bytes.clone())
                    .file_name("frame.png")
                    .mime_str("image/png")?;
                let form = Form::new()
                    .text("session_id", self.session_id.clone())
                    .text("timestamp_ms", timestamp_ms.to_string())
                    .text("current_goal_id", current_goal.clone())
                    .text("goal_list_json", serde_json::to_string(goals)?)
                    .text("history_json", serde_json::to_string(history)?)
                    .part("screenshot_file", image);
                tracing::debug!(
                    url = %url,
                    current_goal = %current_goal,
                    history = history.len(),
                    image_bytes = frame.bytes.len(),
                    "sending multipart decide request"
                );
                self.client.post(url).multipart(form)
            }
        };

        Ok(request.send().await?)
    }
}

fn transport_failure(err: &PilotError) -> DecisionOutcome {
    let code = match err {
        PilotError::Http(e) if e.is_timeout() => "timeout",
        PilotError::Http(e) if e.is_connect() => "connect",
        PilotError::Http(_) => "transport",
        _ => "request_build",
    };
    DecisionOutcome::failure(code, err.to_string())
}

fn truncate(text: &str) -> String {
    text.chars().take(MAX_ERROR_BODY).collect()
}

#[async_trait]
impl DecisionClient for HttpDecisionClient {
    fn name(&self) -> &str {
        "http-gateway"
    }

    async fn decide(
        &self,
        goals: &[Goal],
        history: &[HistoryEntry],
        frame: &Frame,
        use_mock_endpoint: bool,
    ) -> DecisionOutcome {
        let url = self.endpoint(use_mock_endpoint);
        let response = match self.post(goals, history, frame, &url).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "decide request failed");
                return transport_failure(&e);
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "reading decide response failed");
                let err: PilotError = e.into();
                return transport_failure(&err);
            }
        };

        if !status.is_success() {
            tracing::warn!(url = %url, status = %status, "decide returned non-success status");
            return DecisionOutcome::Failure {
                code: "http_status".into(),
                message: format!("{}: {}", status, truncate(&body)),
                http_status: Some(status.as_u16()),
            };
        }

        match serde_json::from_str::<DecisionResponse>(&body) {
            Ok(decision) => {
                tracing::debug!(
                    action = %decision.action,
                    goal = %decision.goal_id,
                    confidence = decision.confidence,
                    "decision received"
                );
                DecisionOutcome::Success(decision)
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "decide response not parsable");
                DecisionOutcome::Failure {
                    code: "parse".into(),
                    message: format!("{e}: {}", truncate(&body)),
                    http_status: Some(status.as_u16()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::types::DecisionAction;
    use crate::perception::stability::FrameEffect;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    async fn read_request(sock: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 8192];
        loop {
            let n = sock.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = find(&buf, b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..pos]).to_lowercase();
                if head.contains("transfer-encoding: chunked") {
                    if buf.ends_with(b"0\r\n\r\n") {
                        break;
                    }
                    continue;
                }
                let len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= pos + 4 + len {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Serves one canned response and hands back the raw request text.
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let request = read_request(&mut sock).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            sock.write_all(response.as_bytes()).await.unwrap();
            let _ = sock.shutdown().await;
            request
        });
        (format!("http://{addr}"), handle)
    }

    fn client(base_url: String, encoding: RequestEncoding) -> HttpDecisionClient {
        let cfg = GatewayConfig {
            base_url,
            encoding,
            request_timeout_ms: 2_000,
            ..GatewayConfig::default()
        };
        HttpDecisionClient::new(&cfg, "test-session").unwrap()
    }

    fn history() -> Vec<HistoryEntry> {
        vec![HistoryEntry {
            action: DecisionAction::Tap,
            x: 10,
            y: 20,
            result: crate::agent_engine::history::ExecutionResult::Ok,
            reason: "open map".into(),
            confidence: 0.9,
            goal_id: "daily_loop".into(),
            effect: FrameEffect::Changed,
            stuck_signal: false,
            timestamp_ms: 1,
        }]
    }

    fn goals() -> Vec<Goal> {
        let mut done = Goal::new("mainline_unlock", "main story", 1);
        done.done = true;
        vec![done, Goal::new("daily_loop", "dailies", 2)]
    }

    #[test]
    fn endpoint_selection() {
        let c = client("http://gw:8787/".into(), RequestEncoding::Json);
        assert_eq!(c.endpoint(false), "http://gw:8787/decide");
        assert_eq!(c.endpoint(true), "http://gw:8787/decide/mock");
    }

    #[tokio::test]
    async fn json_request_and_success_response() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"action":"swipe","x_norm":0.1,"y_norm":0.2,"swipe_to_x_norm":0.9,"goal_id":"daily_loop","confidence":0.88,"reason":"scroll list"}"#,
        )
        .await;
        let c = client(url, RequestEncoding::Json);
        let outcome = c.decide(&goals(), &history(), &Frame::new(b"png".to_vec()), false).await;

        let DecisionOutcome::Success(resp) = outcome else {
            panic!("expected success, got {outcome:?}");
        };
        assert_eq!(resp.action, DecisionAction::Swipe);
        assert_eq!(resp.swipe_to_x_norm, 0.9);
        assert_eq!(resp.swipe_to_y_norm, 0.0);
        assert_eq!(resp.duration_ms, 120);
        assert_eq!(resp.next_capture_ms, 1200);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /decide HTTP/1.1"));
        let body = &request[request.find("\r\n\r\n").unwrap() + 4..];
        let json: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(json["session_id"], "test-session");
        assert_eq!(json["current_goal_id"], "daily_loop");
        assert_eq!(json["goal_list"][0]["desc"], "main story");
        assert_eq!(json["history"][0]["effect"], "changed");
        assert_eq!(json["history"][0]["reason"], "open map");
        assert_eq!(json["screenshot_base64"], "cG5n");
    }

    #[tokio::test]
    async fn mock_mode_uses_mock_path() {
        let (url, server) = serve_once("200 OK", r#"{"action":"tap","reason":"mock_decision"}"#).await;
        let c = client(url, RequestEncoding::Json);
        let outcome = c.decide(&goals(), &[], &Frame::new(b"png".to_vec()), true).await;
        assert!(outcome.is_success());
        let request = server.await.unwrap();
        assert!(request.starts_with("POST /decide/mock HTTP/1.1"));
    }

    #[tokio::test]
    async fn multipart_request_carries_image_part() {
        let (url, server) = serve_once("200 OK", "{}").await;
        let c = client(url, RequestEncoding::Multipart);
        let outcome = c.decide(&goals(), &history(), &Frame::new(b"PNGDATA".to_vec()), false).await;
        assert_eq!(outcome, DecisionOutcome::Success(DecisionResponse::default()));

        let request = server.await.unwrap();
        assert!(request.to_lowercase().contains("content-type: multipart/form-data"));
        assert!(request.contains("name=\"goal_list_json\""));
        assert!(request.contains("name=\"history_json\""));
        assert!(request.contains("name=\"screenshot_file\"; filename=\"frame.png\""));
        assert!(request.contains("PNGDATA"));
    }

    #[tokio::test]
    async fn server_error_is_failure() {
        let (url, _server) = serve_once("500 Internal Server Error", r#"{"detail":"boom"}"#).await;
        let c = client(url, RequestEncoding::Json);
        let outcome = c.decide(&goals(), &[], &Frame::new(vec![1]), false).await;
        match outcome {
            DecisionOutcome::Failure { code, http_status, message } => {
                assert_eq!(code, "http_status");
                assert_eq!(http_status, Some(500));
                assert!(message.contains("boom"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unparsable_body_is_failure() {
        let (url, _server) = serve_once("200 OK", "not json at all").await;
        let c = client(url, RequestEncoding::Json);
        let outcome = c.decide(&goals(), &[], &Frame::new(vec![1]), false).await;
        assert!(matches!(outcome, DecisionOutcome::Failure { ref code, .. } if code == "parse"));
    }

    #[tokio::test]
    async fn refused_connection_is_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let c = client(format!("http://{addr}"), RequestEncoding::Json);
        let outcome = c.decide(&goals(), &[], &Frame::new(vec![1]), false).await;
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let (sock, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(sock);
        });
        let cfg = GatewayConfig {
            base_url: format!("http://{addr}"),
            request_timeout_ms: 200,
            ..GatewayConfig::default()
        };
        let c = HttpDecisionClient::new(&cfg, "s").unwrap();
        let outcome = c.decide(&goals(), &[], &Frame::new(vec![1]), false).await;
        assert!(matches!(outcome, DecisionOutcome::Failure { ref code, .. } if code == "timeout"));
    }
}
