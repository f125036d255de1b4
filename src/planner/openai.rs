use super::{ChatMessage, ChatModel};
use crate::config::PlannerConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Chat client for any OpenAI-compatible `/chat/completions` endpoint
/// (OpenAI, vLLM, Ollama, LM Studio, ...).
pub struct OpenAiChat {
    http: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    top_p: f32,
    max_retries: u32,
    backoff: Duration,
}

impl OpenAiChat {
    pub fn new(config: &PlannerConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key(),
            model: config.model.clone(),
            temperature: config.temperature,
            top_p: config.top_p,
            max_retries: config.max_retries,
            backoff: Duration::from_secs(2),
        })
    }

    /// Base delay between retries; attempt `n` waits `n * backoff`.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_body(&self, messages: &[ChatMessage]) -> Value {
        json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "top_p": self.top_p,
            "stream": false,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let body = self.request_body(messages);
        let start = Instant::now();
        let mut attempt = 0;

        loop {
            let resp = self
                .http
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await?;

            let status = resp.status();
            if is_retryable(status) && attempt < self.max_retries {
                attempt += 1;
                let wait = self.backoff * attempt;
                warn!(
                    "planner returned {}, retry {}/{} in {:?}",
                    status, attempt, self.max_retries, wait
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            if !status.is_success() {
                // Error bodies are often plain text or HTML, not JSON.
                let body = resp.text().await.unwrap_or_default();
                return Err(Error::Planner(format!(
                    "HTTP {}: {}",
                    status,
                    error_message(&body)
                )));
            }

            let json: Value = resp.json().await?;

            debug!(
                "planner replied in {}ms ({} retries)",
                start.elapsed().as_millis(),
                attempt
            );
            return message_content(&json);
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// `error.message` from a JSON error body, else the body itself.
fn error_message(body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return "(empty body)".into();
    }
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| json["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| crate::decode::snippet(body))
}

/// Text of the first choice.
fn message_content(json: &Value) -> Result<String> {
    json["choices"][0]["message"]["content"]
        .as_str()
        .map(String::from)
        .ok_or_else(|| {
            Error::Planner(format!(
                "response has no message content: {}",
                crate::decode::snippet(&json.to_string())
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_and_body() {
        let config = PlannerConfig {
            base_url: "https://api.example.test/v1/".into(),
            model: "m".into(),
            api_key_env: None,
            ..Default::default()
        };
        let chat = OpenAiChat::new(&config).unwrap();
        assert_eq!(chat.endpoint(), "https://api.example.test/v1/chat/completions");
        assert_eq!(chat.api_key, "EMPTY");

        let body = chat.request_body(&[ChatMessage::system("s"), ChatMessage::user("u")]);
        assert_eq!(body["model"], "m");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "u");
        assert!((body["temperature"].as_f64().unwrap() - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_message_content() {
        let json = json!({"choices": [{"message": {"role": "assistant", "content": "{\"action\": \"stop\"}"}}]});
        assert_eq!(message_content(&json).unwrap(), "{\"action\": \"stop\"}");

        let err = message_content(&json!({"choices": []})).unwrap_err();
        assert!(matches!(err, Error::Planner(_)));
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable(StatusCode::UNAUTHORIZED));
        assert!(!is_retryable(StatusCode::OK));
    }

    #[test]
    fn test_error_message() {
        let body = json!({"error": {"message": "model not found", "type": "invalid_request_error"}});
        assert_eq!(error_message(&body.to_string()), "model not found");
        assert_eq!(error_message("{\"detail\":\"x\"}"), "{\"detail\":\"x\"}");
        assert_eq!(error_message("Unauthorized\n"), "Unauthorized");
        assert_eq!(error_message(""), "(empty body)");
        assert!(error_message(&"<html>".repeat(100)).ends_with("..."));
    }

    /// Serve one canned HTTP response on a local port.
    async fn serve_once(response: String) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|l| {
                            let (k, v) = l.split_once(':')?;
                            k.eq_ignore_ascii_case("content-length")
                                .then(|| v.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{}/v1", addr)
    }

    #[tokio::test]
    async fn test_non_json_error_keeps_status() {
        let body = "invalid api key";
        let base_url = serve_once(format!(
            "HTTP/1.1 401 Unauthorized\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        ))
        .await;

        let config = PlannerConfig {
            base_url,
            api_key_env: None,
            max_retries: 0,
            ..Default::default()
        };
        let chat = OpenAiChat::new(&config).unwrap();
        let err = chat.complete(&[ChatMessage::user("hi")]).await.unwrap_err();

        assert!(matches!(err, Error::Planner(_)), "{:?}", err);
        let msg = err.to_string();
        assert!(msg.contains("401"), "{}", msg);
        assert!(msg.contains("invalid api key"), "{}", msg);
    }
}
