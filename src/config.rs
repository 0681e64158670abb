//! Application configuration.
//!
//! Settings come from a YAML file (see `config.example.yaml`), then CLI flags
//! and environment variables override individual values. The resulting
//! [`AppConfig`] is validated once, before any network call, and handed by
//! reference to every component constructor.

use crate::cli::Cli;
use crate::error::ConfigError;
use crate::retry::Backoff;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};

/// Config file used when `--config` is not given. Missing is fine.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Trusted Japanese news domains searched for each term.
pub const DEFAULT_DOMAINS: &[&str] = &[
    // newspapers
    "asahi.com",
    "yomiuri.co.jp",
    "mainichi.jp",
    "nikkei.com",
    "sankei.com",
    "tokyo-np.co.jp",
    "nikkansports.com",
    "hochi.news",
    // broadcasters
    "news.tbs.co.jp",
    "fujitv.co.jp",
    "ntv.co.jp",
    "tv-asahi.co.jp",
    "tv-tokyo.co.jp",
    "nhk.or.jp",
    // online media
    "reallive.jp",
    "j-cast.com",
    "itmedia.co.jp",
    "japanese.engadget.com",
    "buzzfeed.com",
    "prtimes.jp",
    // business
    "toyokeizai.net",
    "business-journal.jp",
    "diamond.jp",
    "forbesjapan.com",
    "japan.cnet.com",
    "meti.go.jp",
    "keidanren.or.jp",
    // portals
    "news.yahoo.co.jp",
    "finance.yahoo.co.jp",
    "news.livedoor.com",
    "livedoor.com",
    "news.mynavi.jp",
    "infoseek.co.jp",
    "news.nifty.com",
    "news.goo.ne.jp",
    "goo.ne.jp",
    "news.biglobe.ne.jp",
    "bloomberg.co.jp",
    "sankei.news.msn.com",
    "oricon.co.jp",
];

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct NewsApiConfig {
    pub api_key: Option<String>,
    pub endpoint: String,
    pub domains: Vec<String>,
}

impl Default for NewsApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: "https://newsapi.org/v2/everything".to_string(),
            domains: DEFAULT_DOMAINS.iter().map(|d| d.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    pub api_key: Option<String>,
    /// OpenAI-compatible chat completions URL.
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            max_tokens: 300,
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LineConfig {
    pub access_token: Option<String>,
    pub user_id: Option<String>,
    pub endpoint: String,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            user_id: None,
            endpoint: "https://api.line.me/v2/bot/message/push".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Units of work in flight at once.
    pub concurrency: usize,
    pub unit_timeout_secs: u64,
    pub deadline_secs: u64,
    pub http_timeout_secs: u64,
    /// Only the top N terms are processed.
    pub top_n: usize,
    /// Fewer included entries than this is a total failure.
    pub min_entries: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            unit_timeout_secs: 60,
            deadline_secs: 600,
            http_timeout_secs: 30,
            top_n: 10,
            min_entries: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let b = Backoff::default();
        Self {
            max_retries: b.max_retries,
            base_delay_ms: b.base_delay.as_millis() as u64,
            max_delay_ms: b.max_delay.as_millis() as u64,
            max_jitter_ms: b.max_jitter.as_millis() as u64,
        }
    }
}

impl RetryConfig {
    pub fn backoff(&self) -> Backoff {
        Backoff {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            max_jitter: Duration::from_millis(self.max_jitter_ms),
        }
    }
}

/// Everything the pipeline needs, built once per process.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub news_api: NewsApiConfig,
    pub generation: GenerationConfig,
    pub line: LineConfig,
    pub pipeline: PipelineConfig,
    pub retry: RetryConfig,
    pub output_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            news_api: NewsApiConfig::default(),
            generation: GenerationConfig::default(),
            line: LineConfig::default(),
            pipeline: PipelineConfig::default(),
            retry: RetryConfig::default(),
            output_dir: PathBuf::from("news_report"),
        }
    }
}

impl AppConfig {
    /// Parse a YAML document into a config, filling gaps with defaults.
    pub fn from_yaml(path: &Path, yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the config file. An explicit path must exist; the default path
    /// may be absent, in which case built-in defaults are used.
    #[instrument(level = "info", skip_all)]
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = explicit.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
        match std::fs::read_to_string(path) {
            Ok(yaml) => {
                info!(path = %path.display(), "Loaded configuration");
                Self::from_yaml(path, &yaml)
            }
            Err(e) if explicit.is_none() && e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No config file; using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Apply CLI flags and environment values on top of the file settings.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(ref key) = cli.news_api_key {
            self.news_api.api_key = Some(key.clone());
        }
        if let Some(ref key) = cli.openai_api_key {
            self.generation.api_key = Some(key.clone());
        }
        if let Some(ref token) = cli.line_access_token {
            self.line.access_token = Some(token.clone());
        }
        if let Some(ref user) = cli.line_user_id {
            self.line.user_id = Some(user.clone());
        }
        if let Some(ref dir) = cli.output_dir {
            self.output_dir = dir.clone();
        }
        if let Some(n) = cli.concurrency {
            self.pipeline.concurrency = n;
        }
    }

    /// Pre-flight checks. `pipeline` and `delivery` select which credentials
    /// the current invocation needs.
    pub fn validate(&self, pipeline: bool, delivery: bool) -> Result<(), ConfigError> {
        if pipeline {
            require(&self.news_api.api_key, "news_api.api_key")?;
            require(&self.generation.api_key, "generation.api_key")?;
            if self.pipeline.concurrency == 0 {
                return Err(invalid("pipeline.concurrency", "must be at least 1"));
            }
            if self.pipeline.unit_timeout_secs == 0 {
                return Err(invalid("pipeline.unit_timeout_secs", "must be positive"));
            }
            if self.pipeline.deadline_secs == 0 {
                return Err(invalid("pipeline.deadline_secs", "must be positive"));
            }
            if self.pipeline.top_n == 0 {
                return Err(invalid("pipeline.top_n", "must be at least 1"));
            }
            if self.news_api.domains.is_empty() {
                return Err(invalid("news_api.domains", "allow-list is empty"));
            }
            if !(0.0..=2.0).contains(&self.generation.temperature) {
                return Err(invalid("generation.temperature", "must be within 0.0..=2.0"));
            }
        }
        if delivery {
            require(&self.line.access_token, "line.access_token")?;
            require(&self.line.user_id, "line.user_id")?;
        }
        if self.pipeline.http_timeout_secs == 0 {
            return Err(invalid("pipeline.http_timeout_secs", "must be positive"));
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline.http_timeout_secs)
    }
}

/// Borrow a credential that validation requires to be present and non-blank.
pub fn require<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str, ConfigError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::MissingCredential(name)),
    }
}

fn invalid(name: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        name,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn with_keys() -> AppConfig {
        let mut c = AppConfig::default();
        c.news_api.api_key = Some("news".into());
        c.generation.api_key = Some("gen".into());
        c
    }

    #[test]
    fn test_defaults_from_empty_yaml() {
        let c = AppConfig::from_yaml(Path::new("c.yaml"), "").unwrap();
        assert_eq!(c, AppConfig::default());
        assert_eq!(c.pipeline.concurrency, 4);
        assert_eq!(c.pipeline.top_n, 10);
        assert_eq!(c.generation.model, "gpt-3.5-turbo");
        assert_eq!(c.news_api.domains.len(), DEFAULT_DOMAINS.len());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
news_api:
  api_key: abc
pipeline:
  concurrency: 2
output_dir: /tmp/reports
"#;
        let c = AppConfig::from_yaml(Path::new("c.yaml"), yaml).unwrap();
        assert_eq!(c.news_api.api_key.as_deref(), Some("abc"));
        assert_eq!(c.news_api.endpoint, "https://newsapi.org/v2/everything");
        assert_eq!(c.pipeline.concurrency, 2);
        assert_eq!(c.pipeline.deadline_secs, 600);
        assert_eq!(c.output_dir, PathBuf::from("/tmp/reports"));
    }

    #[test]
    fn test_bad_yaml_is_parse_error() {
        let err = AppConfig::from_yaml(Path::new("c.yaml"), "pipeline: [1, 2").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_missing_explicit_file_is_read_error() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/trend_digest.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_validate_requires_pipeline_credentials() {
        let c = AppConfig::default();
        assert!(matches!(
            c.validate(true, false),
            Err(ConfigError::MissingCredential("news_api.api_key"))
        ));
        assert!(with_keys().validate(true, false).is_ok());
    }

    #[test]
    fn test_validate_requires_line_credentials_only_for_delivery() {
        let c = with_keys();
        assert!(matches!(
            c.validate(true, true),
            Err(ConfigError::MissingCredential("line.access_token"))
        ));
        assert!(c.validate(false, false).is_ok());
    }

    #[test]
    fn test_blank_credential_is_missing() {
        let mut c = with_keys();
        c.generation.api_key = Some("   ".into());
        assert!(matches!(
            c.validate(true, false),
            Err(ConfigError::MissingCredential("generation.api_key"))
        ));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut c = with_keys();
        c.pipeline.concurrency = 0;
        assert!(matches!(
            c.validate(true, false),
            Err(ConfigError::Invalid {
                name: "pipeline.concurrency",
                ..
            })
        ));
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut c = AppConfig::default();
        let cli = Cli::parse_from([
            "trend_digest",
            "--news-api-key",
            "from-cli",
            "--output-dir",
            "/tmp/out",
            "--concurrency",
            "8",
        ]);
        c.apply_cli(&cli);
        assert_eq!(c.news_api.api_key.as_deref(), Some("from-cli"));
        assert_eq!(c.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(c.pipeline.concurrency, 8);
    }

    #[test]
    fn test_retry_config_to_backoff() {
        let r = RetryConfig {
            max_retries: 2,
            base_delay_ms: 500,
            max_delay_ms: 4000,
            max_jitter_ms: 0,
        };
        let b = r.backoff();
        assert_eq!(b.max_retries, 2);
        assert_eq!(b.base_delay, Duration::from_millis(500));
        assert_eq!(b.max_jitter, Duration::ZERO);
    }
}
