//! News search client resolving one trend term to at most one article.
//!
//! Queries an Everything-style search endpoint with the term as an exact
//! phrase, restricted to the trusted domain allow-list, sorted by relevancy
//! and limited to a single result. The first (most relevant) article is the
//! candidate; articles are not deduplicated across terms.

use crate::config::{AppConfig, require};
use crate::error::{ConfigError, FetchError};
use crate::models::{ArticleResult, TrendTerm};
use crate::retry::Backoff;
use crate::utils::{html_to_text, source_domain, truncate_for_log};
use reqwest::Client;
use serde::Deserialize;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Resolve a term to its best article.
///
/// `Ok(None)` means the search succeeded but nothing qualified; that is an
/// expected outcome, not an error.
pub trait FetchArticle {
    async fn fetch(&self, term: &TrendTerm) -> Result<Option<ArticleResult>, FetchError>;
}

#[derive(Debug, Deserialize)]
struct EverythingResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    articles: Vec<RawArticle>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawArticle {
    title: Option<String>,
    url: Option<String>,
    description: Option<String>,
}

/// Search client bound to one endpoint, key and allow-list.
pub struct NewsApiClient {
    http: Client,
    endpoint: String,
    api_key: String,
    domains: String,
    backoff: Backoff,
}

impl std::fmt::Debug for NewsApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewsApiClient")
            .field("endpoint", &self.endpoint)
            .field("domains", &self.domains)
            .field("backoff", &self.backoff)
            .finish()
    }
}

impl NewsApiClient {
    pub fn new(config: &AppConfig) -> Result<Self, ConfigError> {
        let api_key = require(&config.news_api.api_key, "news_api.api_key")?.to_string();
        let http = Client::builder()
            .timeout(config.http_timeout())
            .user_agent(concat!("trend_digest/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ConfigError::HttpClient)?;
        Ok(Self {
            http,
            endpoint: config.news_api.endpoint.clone(),
            api_key,
            domains: config.news_api.domains.join(","),
            backoff: config.retry.backoff(),
        })
    }

    /// Query parameters for one term.
    pub fn query_params(&self, term: &TrendTerm) -> Vec<(&'static str, String)> {
        vec![
            ("q", exact_phrase(&term.text)),
            ("domains", self.domains.clone()),
            ("sortBy", "relevancy".to_string()),
            ("pageSize", "1".to_string()),
        ]
    }

    #[instrument(level = "debug", skip_all, fields(rank = term.rank))]
    async fn request_once(&self, term: &TrendTerm) -> Result<String, FetchError> {
        let resp = self
            .http
            .get(&self.endpoint)
            .header("X-Api-Key", &self.api_key)
            .query(&self.query_params(term))
            .send()
            .await
            .map_err(map_reqwest)?;

        let status = resp.status();
        let body = resp.text().await.map_err(map_reqwest)?;
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: truncate_for_log(&body, 200),
            });
        }
        Ok(body)
    }
}

impl FetchArticle for NewsApiClient {
    #[instrument(level = "info", skip_all, fields(rank = term.rank, term = %term.text))]
    async fn fetch(&self, term: &TrendTerm) -> Result<Option<ArticleResult>, FetchError> {
        let t0 = Instant::now();
        let body = self
            .backoff
            .retry("news_search", || self.request_once(term))
            .await?;
        debug!(body = %truncate_for_log(&body, 300), "Search response");

        let result = parse_response(term, &body)?;
        info!(
            found = result.is_some(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Search completed"
        );
        Ok(result)
    }
}

/// Wrap a term in double quotes so the service matches it verbatim.
pub fn exact_phrase(text: &str) -> String {
    format!("\"{}\"", text.trim().replace('"', ""))
}

/// Turn a search response body into the term's candidate article.
pub fn parse_response(term: &TrendTerm, body: &str) -> Result<Option<ArticleResult>, FetchError> {
    let resp: EverythingResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;
    if resp.status != "ok" {
        return Err(FetchError::Decode(
            resp.message
                .unwrap_or_else(|| format!("unexpected status `{}`", resp.status)),
        ));
    }

    let Some(first) = resp.articles.into_iter().next() else {
        return Ok(None);
    };
    let url = first
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| FetchError::Decode("article without url".to_string()))?;

    Ok(Some(ArticleResult {
        term: term.clone(),
        title: first.title.map(|t| html_to_text(&t)).unwrap_or_default(),
        source_domain: source_domain(&url).unwrap_or_default(),
        url,
        description: first
            .description
            .map(|d| html_to_text(&d))
            .unwrap_or_default(),
    }))
}

fn map_reqwest(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Transport(e.to_string())
    }
}
