//! Report delivery to the notification channel.
//!
//! Delivery happens once, after the report has been persisted, and never
//! touches the stored artifact. [`DeliveryDispatcher`] adds the shared
//! backoff to any [`Notifier`]; [`LineNotifier`] pushes the report through
//! the LINE Messaging API, split into as many text messages as one push
//! request allows.

use crate::config::{AppConfig, require};
use crate::error::{ConfigError, DeliveryError};
use crate::retry::Backoff;
use crate::utils::truncate_for_log;
use itertools::Itertools;
use reqwest::Client;
use serde_json::json;
use std::fmt;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// LINE rejects text messages longer than this many characters.
pub const LINE_MAX_CHARS: usize = 5000;
/// Message objects allowed in one push request.
pub const LINE_MAX_MESSAGES: usize = 5;

/// A black-box notification channel.
pub trait Notifier {
    async fn push(&self, text: &str) -> Result<(), DeliveryError>;
}

/// LINE Messaging API push client for a single recipient.
pub struct LineNotifier {
    http: Client,
    endpoint: String,
    access_token: String,
    user_id: String,
}

impl fmt::Debug for LineNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineNotifier")
            .field("endpoint", &self.endpoint)
            .field("user_id", &self.user_id)
            .finish()
    }
}

impl LineNotifier {
    pub fn new(config: &AppConfig) -> Result<Self, ConfigError> {
        let access_token = require(&config.line.access_token, "line.access_token")?.to_string();
        let user_id = require(&config.line.user_id, "line.user_id")?.to_string();
        let http = Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(ConfigError::HttpClient)?;
        Ok(Self {
            http,
            endpoint: config.line.endpoint.clone(),
            access_token,
            user_id,
        })
    }

    /// Push-message payload carrying `text` as up to [`LINE_MAX_MESSAGES`]
    /// text messages.
    pub fn payload(&self, text: &str) -> serde_json::Value {
        let messages = split_message(text, LINE_MAX_CHARS, LINE_MAX_MESSAGES)
            .into_iter()
            .map(|part| json!({ "type": "text", "text": part }))
            .collect::<Vec<_>>();
        json!({
            "to": self.user_id,
            "messages": messages,
        })
    }
}

/// Split `text` into at most `max_parts` pieces of at most `max_chars`
/// characters each.
///
/// Pieces break after a blank line (`"\n\n"`), which is where report entries
/// end. A block longer than `max_chars` on its own is cut at character
/// boundaries. Text that still does not fit is truncated and the last piece
/// ends with `…`.
pub fn split_message(text: &str, max_chars: usize, max_parts: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let max_parts = max_parts.max(1);

    let mut parts: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for block in text.split_inclusive("\n\n") {
        let len = block.chars().count();
        if current_len + len > max_chars && !current.is_empty() {
            parts.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if len > max_chars {
            for chunk in &block.chars().chunks(max_chars) {
                parts.push(chunk.collect());
            }
        } else {
            current.push_str(block);
            current_len += len;
        }
    }
    if !current.is_empty() || parts.is_empty() {
        parts.push(current);
    }

    if parts.len() > max_parts {
        warn!(
            parts = parts.len(),
            max_parts, "Report does not fit in one push request; truncating"
        );
        parts.truncate(max_parts);
        if let Some(last) = parts.last_mut() {
            let kept: String = last.chars().take(max_chars - 1).collect();
            *last = kept + "…";
        }
    }
    parts
}

impl Notifier for LineNotifier {
    #[instrument(level = "info", skip_all, fields(bytes = text.len()))]
    async fn push(&self, text: &str) -> Result<(), DeliveryError> {
        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.access_token)
            .json(&self.payload(text))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout
                } else {
                    DeliveryError::Transport(e.to_string())
                }
            })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(DeliveryError::Status {
            status: status.as_u16(),
            body: truncate_for_log(&body, 200),
        })
    }
}

/// Sends a finished report through a [`Notifier`] with bounded retries.
pub struct DeliveryDispatcher<N> {
    notifier: N,
    backoff: Backoff,
}

impl<N: Notifier> DeliveryDispatcher<N> {
    pub fn new(notifier: N, backoff: Backoff) -> Self {
        Self { notifier, backoff }
    }

    #[instrument(level = "info", skip_all, fields(bytes = text.len()))]
    pub async fn deliver(&self, text: &str) -> Result<(), DeliveryError> {
        let t0 = Instant::now();
        let res = self
            .backoff
            .retry("delivery", || self.notifier.push(text))
            .await;
        let elapsed_ms = t0.elapsed().as_millis() as u64;
        match &res {
            Ok(()) => info!(elapsed_ms, "Report delivered"),
            Err(e) => error!(elapsed_ms, error = %e, "Report delivery failed"),
        }
        res
    }
}
