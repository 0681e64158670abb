//! Generation service interaction with exponential backoff retry logic.
//!
//! # Architecture
//!
//! - [`AskAsync`]: core trait for sending a primed prompt and getting text back
//! - [`ChatClient`]: OpenAI-compatible chat-completions implementation
//! - [`RetryAsk`]: decorator that adds [`Backoff`] retries to any `AskAsync`
//!
//! Rate limiting (429), server errors and transport failures are retried;
//! other HTTP errors fail fast.

use crate::config::{AppConfig, require};
use crate::error::{ConfigError, GenerationError};
use crate::retry::Backoff;
use crate::utils::truncate_for_log;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Trait for async text generation.
///
/// Implementors send a system priming message plus a user prompt and return
/// the generated text verbatim.
pub trait AskAsync {
    async fn ask(&self, system: &str, user: &str) -> Result<String, GenerationError>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat-completions client.
pub struct ChatClient {
    http: Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl ChatClient {
    pub fn new(config: &AppConfig) -> Result<Self, ConfigError> {
        let api_key = require(&config.generation.api_key, "generation.api_key")?.to_string();
        let http = Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(ConfigError::HttpClient)?;
        Ok(Self {
            http,
            endpoint: config.generation.endpoint.clone(),
            api_key,
            model: config.generation.model.clone(),
            max_tokens: config.generation.max_tokens,
            temperature: config.generation.temperature,
        })
    }

    fn request_body<'a>(&'a self, system: &'a str, user: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

impl AskAsync for ChatClient {
    #[instrument(level = "info", skip_all)]
    async fn ask(&self, system: &str, user: &str) -> Result<String, GenerationError> {
        let t0 = Instant::now();
        let res = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(system, user))
            .send()
            .await;

        let resp = match res {
            Ok(resp) => resp,
            Err(e) => {
                let dt = t0.elapsed();
                warn!(elapsed_ms = dt.as_millis() as u64, error = %e, "API call failed");
                return Err(if e.is_timeout() {
                    GenerationError::Timeout
                } else {
                    GenerationError::Transport(e.to_string())
                });
            }
        };

        let status = resp.status();
        let body = resp.text().await.map_err(|e| {
            if e.is_timeout() {
                GenerationError::Timeout
            } else {
                GenerationError::Transport(e.to_string())
            }
        })?;
        if !status.is_success() {
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: truncate_for_log(&body, 200),
            });
        }
        parse_chat_response(&body)
    }
}

/// Pull the first choice's message content out of a chat-completions body.
///
/// A missing or null content is returned as an empty string; deciding
/// whether empty output is acceptable is the caller's business.
pub fn parse_chat_response(body: &str) -> Result<String, GenerationError> {
    let resp: ChatResponse =
        serde_json::from_str(body).map_err(|e| GenerationError::Decode(e.to_string()))?;
    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| GenerationError::Decode("response has no choices".to_string()))?;
    Ok(choice.message.content.unwrap_or_default())
}

/// Wrapper that adds exponential backoff retry logic to any [`AskAsync`].
pub struct RetryAsk<T> {
    inner: T,
    backoff: Backoff,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    pub fn new(inner: T, backoff: Backoff) -> Self {
        Self { inner, backoff }
    }
}

impl<T: fmt::Debug> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("inner", &self.inner)
            .field("backoff", &self.backoff)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync,
{
    #[instrument(level = "info", skip_all)]
    async fn ask(&self, system: &str, user: &str) -> Result<String, GenerationError> {
        let t0 = Instant::now();
        let res = self
            .backoff
            .retry("generation", || self.inner.ask(system, user))
            .await;
        if res.is_ok() {
            info!(
                elapsed_ms_total = t0.elapsed().as_millis() as u64,
                "ask succeeded"
            );
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Replays scripted results in order.
    struct Scripted(RefCell<VecDeque<Result<String, GenerationError>>>);

    impl AskAsync for Scripted {
        async fn ask(&self, _system: &str, _user: &str) -> Result<String, GenerationError> {
            self.0
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(GenerationError::Decode("script exhausted".into())))
        }
    }

    fn quick() -> Backoff {
        Backoff {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            max_jitter: Duration::ZERO,
        }
    }

    fn chat_client() -> ChatClient {
        let mut config = AppConfig::default();
        config.generation.api_key = Some("sk-test".into());
        ChatClient::new(&config).unwrap()
    }

    #[test]
    fn test_request_body_shape() {
        let client = chat_client();
        let body = serde_json::to_value(client.request_body("sys", "usr")).unwrap();
        assert_eq!(body["model"], "gpt-3.5-turbo");
        assert_eq!(body["max_tokens"], 300);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "sys");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "usr");
        assert!((body["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_debug_hides_key() {
        assert!(!format!("{:?}", chat_client()).contains("sk-test"));
    }

    #[test]
    fn test_parse_chat_response() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"- 一行目\n- 二行目"}}]}"#;
        assert_eq!(parse_chat_response(body).unwrap(), "- 一行目\n- 二行目");
    }

    #[test]
    fn test_parse_chat_response_null_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        assert_eq!(parse_chat_response(body).unwrap(), "");
    }

    #[test]
    fn test_parse_chat_response_no_choices() {
        assert!(matches!(
            parse_chat_response(r#"{"choices":[]}"#),
            Err(GenerationError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_retry_ask_recovers_from_rate_limit() {
        let inner = Scripted(RefCell::new(VecDeque::from(vec![
            Err(GenerationError::Status {
                status: 429,
                body: String::new(),
            }),
            Ok("要約".to_string()),
        ])));
        let api = RetryAsk::new(inner, quick());
        assert_eq!(api.ask("s", "u").await.unwrap(), "要約");
    }

    #[tokio::test]
    async fn test_retry_ask_fails_fast_on_auth_error() {
        let inner = Scripted(RefCell::new(VecDeque::from(vec![
            Err(GenerationError::Status {
                status: 401,
                body: "invalid_api_key".into(),
            }),
            Ok("never".to_string()),
        ])));
        let api = RetryAsk::new(inner, quick());
        assert!(matches!(
            api.ask("s", "u").await,
            Err(GenerationError::Status { status: 401, .. })
        ));
    }
}
