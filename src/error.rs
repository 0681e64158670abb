//! Error taxonomy for the digest pipeline.
//!
//! Per-term errors ([`FetchError`], [`SummarizeError`]) never leave a unit of
//! work: the orchestrator folds them into a [`SkipReason`]. Only
//! [`ConfigError`], [`TermSourceError`], [`StoreError`] and [`DeliveryError`]
//! reach `main`, wrapped in [`AppError`].

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Classifies an error as worth retrying or not.
///
/// The shared backoff in [`crate::retry`] only retries errors that report
/// themselves as transient.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Fatal, pre-flight configuration problems. Raised before any network call.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("missing credential `{0}` (set it in the config file or the environment)")]
    MissingCredential(&'static str),

    #[error("invalid setting `{name}`: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("output directory {path} is not writable: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// The ranked term list could not be loaded or violates its contract.
#[derive(Debug, Error)]
pub enum TermSourceError {
    #[error("failed to read terms from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: invalid rank `{raw}`")]
    BadRank { line: usize, raw: String },

    #[error("rank {rank} is not strictly ascending after rank {previous}")]
    OutOfOrder { rank: u32, previous: u32 },

    #[error("rank {rank} has an empty term")]
    EmptyTerm { rank: u32 },
}

/// Search service failure for a single term.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("search request timed out")]
    Timeout,

    #[error("search transport error: {0}")]
    Transport(String),

    #[error("search service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed search response: {0}")]
    Decode(String),

    #[error("unit timed out after {0:?} while fetching")]
    UnitTimeout(Duration),

    #[error("run deadline elapsed while fetching")]
    Cancelled,
}

impl Transient for FetchError {
    fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::Transport(_) => true,
            FetchError::Status { status, .. } => is_transient_status(*status),
            FetchError::Decode(_) | FetchError::UnitTimeout(_) | FetchError::Cancelled => false,
        }
    }
}

/// Generation service failure, before summary normalization.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation request timed out")]
    Timeout,

    #[error("generation transport error: {0}")]
    Transport(String),

    #[error("generation service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed generation response: {0}")]
    Decode(String),
}

impl Transient for GenerationError {
    fn is_transient(&self) -> bool {
        match self {
            GenerationError::Timeout | GenerationError::Transport(_) => true,
            GenerationError::Status { status, .. } => is_transient_status(*status),
            GenerationError::Decode(_) => false,
        }
    }
}

/// Summarization failure for a single term.
#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("generation service returned empty output")]
    Empty,

    #[error("unit timed out after {0:?} while summarizing")]
    UnitTimeout(Duration),

    #[error("run deadline elapsed while summarizing")]
    Cancelled,
}

/// Why a term produced no report entry. Diagnostic only, never fatal.
#[derive(Debug, Error)]
pub enum SkipReason {
    #[error("no matching article")]
    NotFound,

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("summarize failed: {0}")]
    Summarize(#[from] SummarizeError),
}

impl SkipReason {
    /// Short stable label used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            SkipReason::NotFound => "not_found",
            SkipReason::Fetch(_) => "fetch_error",
            SkipReason::Summarize(_) => "summarize_error",
        }
    }
}

/// Persisting or loading a report artifact failed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write artifact {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read artifact {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The notification channel rejected the report or stayed unreachable.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("notification request timed out")]
    Timeout,

    #[error("notification transport error: {0}")]
    Transport(String),

    #[error("notification channel returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

impl Transient for DeliveryError {
    fn is_transient(&self) -> bool {
        match self {
            DeliveryError::Timeout | DeliveryError::Transport(_) => true,
            DeliveryError::Status { status, .. } => is_transient_status(*status),
        }
    }
}

/// Errors that end the process with a failure status.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    TermSource(#[from] TermSourceError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// Rate limiting and server errors are worth another attempt.
pub fn is_transient_status(status: u16) -> bool {
    status == 429 || (500..=599).contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_statuses() {
        assert!(is_transient_status(429));
        assert!(is_transient_status(500));
        assert!(is_transient_status(503));
        assert!(!is_transient_status(400));
        assert!(!is_transient_status(401));
        assert!(!is_transient_status(404));
    }

    #[test]
    fn test_fetch_error_classification() {
        assert!(FetchError::Timeout.is_transient());
        assert!(FetchError::Transport("reset".into()).is_transient());
        assert!(
            FetchError::Status {
                status: 429,
                body: String::new()
            }
            .is_transient()
        );
        assert!(
            !FetchError::Status {
                status: 401,
                body: "apiKeyInvalid".into()
            }
            .is_transient()
        );
        assert!(!FetchError::Decode("eof".into()).is_transient());
    }

    #[test]
    fn test_skip_reason_kind() {
        assert_eq!(SkipReason::NotFound.kind(), "not_found");
        assert_eq!(SkipReason::from(FetchError::Timeout).kind(), "fetch_error");
        assert_eq!(
            SkipReason::from(SummarizeError::Empty).kind(),
            "summarize_error"
        );
    }
}
