//! # Trend Digest
//!
//! A daily batch job that turns the day's ranked trending search terms into
//! a digest of summarized news articles and pushes it to LINE.
//!
//! ## Usage
//!
//! ```sh
//! trend_digest --terms-file ./terms.txt
//! ```
//!
//! ## Architecture
//!
//! 1. **Terms**: read the ranked term list ([`sources::trends`])
//! 2. **Units**: per term, fetch one article ([`sources::newsapi`]) and
//!    summarize it ([`summarizer`]), several terms at a time ([`pipeline`])
//! 3. **Report**: assemble the included entries in rank order ([`outputs::report`])
//! 4. **Persist**: write the dated artifact ([`outputs::store`])
//! 5. **Deliver**: push the text to the notification channel ([`delivery`])
//!
//! ## Exit status
//!
//! - `0`: report written (and delivered), even if some terms were skipped
//! - `1`: configuration, term source, storage or delivery failure
//! - `2`: fewer entries than `pipeline.min_entries` (total failure)

use chrono::{Local, NaiveDate};
use clap::Parser;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod delivery;
mod error;
mod models;
mod outputs;
mod pipeline;
mod retry;
mod sources;
mod summarizer;
mod utils;

use api::{ChatClient, RetryAsk};
use cli::Cli;
use config::AppConfig;
use delivery::{DeliveryDispatcher, LineNotifier, Notifier};
use error::{AppError, ConfigError};
use outputs::report::ReportAssembler;
use outputs::store::{ArtifactStore, FsStore};
use pipeline::{Orchestrator, RunLimits, publish};
use sources::newsapi::NewsApiClient;
use sources::trends::TrendFile;
use summarizer::Summarizer;
use utils::ensure_writable_dir;

const EXIT_FATAL: u8 = 1;
const EXIT_TOTAL_FAILURE: u8 = 2;

/// How a successful invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Digest { included: usize, min_entries: usize },
    Resent,
}

impl Outcome {
    fn exit_status(self) -> u8 {
        match self {
            Outcome::Digest {
                included,
                min_entries,
            } if included < min_entries => EXIT_TOTAL_FAILURE,
            _ => 0,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), "trend_digest starting up");

    let args = Cli::parse();
    debug!(?args.config, ?args.terms_file, ?args.date, "Parsed CLI arguments");

    let result = run(&args).await;
    let elapsed = start_time.elapsed();

    match result {
        Ok(outcome) => {
            let status = outcome.exit_status();
            if status == EXIT_TOTAL_FAILURE {
                error!(?outcome, ?elapsed, "Report has too few entries; signalling total failure");
            } else {
                info!(?outcome, ?elapsed, "Execution complete");
            }
            ExitCode::from(status)
        }
        Err(e) => {
            error!(error = %e, ?elapsed, "Execution failed");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

#[instrument(level = "info", skip_all)]
async fn run(args: &Cli) -> Result<Outcome, AppError> {
    let mut config = AppConfig::load(args.config.as_deref())?;
    config.apply_cli(args);
    let date = args.date.unwrap_or_else(|| Local::now().date_naive());

    if args.deliver_only {
        config.validate(false, true)?;
        let store = FsStore::new(&config.output_dir);
        let dispatcher =
            DeliveryDispatcher::new(LineNotifier::new(&config)?, config.retry.backoff());
        return resend(&store, &dispatcher, date).await;
    }

    // ---- Pre-flight: nothing below touches the network until this passes ----
    let deliver = !args.skip_delivery;
    config.validate(true, deliver)?;
    let terms_path = args.terms_file.as_ref().ok_or_else(|| ConfigError::Invalid {
        name: "terms_file",
        reason: "--terms-file is required unless --deliver-only is set".to_string(),
    })?;
    let store = FsStore::new(&config.output_dir);
    ensure_writable_dir(store.dir()).await?;

    let fetcher = NewsApiClient::new(&config)?;
    let summarizer = Summarizer::new(RetryAsk::new(
        ChatClient::new(&config)?,
        config.retry.backoff(),
    ));
    let dispatcher = if deliver {
        Some(DeliveryDispatcher::new(
            LineNotifier::new(&config)?,
            config.retry.backoff(),
        ))
    } else {
        None
    };

    // ---- Terms ----
    let source = TrendFile::new(terms_path);
    let terms = source.load(config.pipeline.top_n).await?;
    if terms.is_empty() {
        warn!(path = %source.path().display(), "Term list is empty");
    }

    // ---- Fetch + summarize + assemble ----
    let orchestrator = Orchestrator::new(fetcher, summarizer, ReportAssembler::default());
    let digest = orchestrator
        .run(date, &terms, RunLimits::from_config(&config.pipeline))
        .await;

    let included = digest.report.len();
    info!(
        %date,
        terms = terms.len(),
        included,
        skipped = digest.skipped.len(),
        completed = digest.completed,
        "Run summary"
    );

    // ---- Persist, then deliver ----
    let path = publish(&store, dispatcher.as_ref(), &digest.report).await?;
    info!(path = %path.display(), "Report published");

    Ok(Outcome::Digest {
        included,
        min_entries: config.pipeline.min_entries,
    })
}

/// Send an already persisted report again without rerunning the pipeline.
#[instrument(level = "info", skip_all, fields(%date))]
async fn resend<S: ArtifactStore, N: Notifier>(
    store: &S,
    dispatcher: &DeliveryDispatcher<N>,
    date: NaiveDate,
) -> Result<Outcome, AppError> {
    let text = store.load(date).await?;
    dispatcher.deliver(&text).await?;
    Ok(Outcome::Resent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeliveryError;
    use crate::retry::Backoff;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        sent: Rc<RefCell<Vec<String>>>,
    }

    impl Notifier for Recorder {
        async fn push(&self, text: &str) -> Result<(), DeliveryError> {
            self.sent.borrow_mut().push(text.to_string());
            Ok(())
        }
    }

    fn dispatcher() -> (DeliveryDispatcher<Recorder>, Rc<RefCell<Vec<String>>>) {
        let recorder = Recorder::default();
        let sent = Rc::clone(&recorder.sent);
        let d = DeliveryDispatcher::new(
            recorder,
            Backoff {
                max_retries: 0,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
                max_jitter: Duration::ZERO,
            },
        );
        (d, sent)
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
    }

    #[tokio::test]
    async fn test_resend_delivers_stored_report_unchanged() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsStore::new(tmp.path());
        let text = "こんにちは！\n\n1. トレンド：台風\n・タイトル：上陸\n\n";
        store.save(day(), text).await.unwrap();

        let (d, sent) = dispatcher();
        let outcome = resend(&store, &d, day()).await.unwrap();

        assert_eq!(outcome, Outcome::Resent);
        assert_eq!(*sent.borrow(), vec![text.to_string()]);
        assert_eq!(store.load(day()).await.unwrap(), text);
    }

    #[tokio::test]
    async fn test_resend_without_artifact_fails_before_delivery() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsStore::new(tmp.path());

        let (d, sent) = dispatcher();
        let err = resend(&store, &d, day()).await.unwrap_err();

        assert!(matches!(err, AppError::Store(_)));
        assert!(sent.borrow().is_empty());
    }

    #[test]
    fn test_partial_success_exits_zero() {
        let o = Outcome::Digest {
            included: 9,
            min_entries: 1,
        };
        assert_eq!(o.exit_status(), 0);
    }

    #[test]
    fn test_empty_report_is_total_failure() {
        let o = Outcome::Digest {
            included: 0,
            min_entries: 1,
        };
        assert_eq!(o.exit_status(), EXIT_TOTAL_FAILURE);
    }

    #[test]
    fn test_threshold_is_configurable() {
        let o = Outcome::Digest {
            included: 3,
            min_entries: 5,
        };
        assert_eq!(o.exit_status(), EXIT_TOTAL_FAILURE);

        let o = Outcome::Digest {
            included: 0,
            min_entries: 0,
        };
        assert_eq!(o.exit_status(), 0);
    }

    #[test]
    fn test_resend_exits_zero() {
        assert_eq!(Outcome::Resent.exit_status(), 0);
    }
}
