//! Command-line interface definitions for Trend Digest.
//!
//! Every credential can be passed as a flag or through the environment;
//! values given here override the YAML config file.

use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the Trend Digest batch run.
///
/// # Examples
///
/// ```sh
/// # Full run: fetch, summarize, persist and push to LINE
/// trend_digest --terms-file ./terms.txt
///
/// # Persist only
/// trend_digest --terms-file ./terms.txt --skip-delivery
///
/// # Re-send an already persisted report
/// trend_digest --deliver-only --date 2026-10-17
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the YAML config file (defaults to ./config.yaml when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Ranked trend terms, one per line, top trend first
    #[arg(short, long)]
    pub terms_file: Option<PathBuf>,

    /// Directory receiving one report file per day
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Report date (YYYY-MM-DD); defaults to today in local time
    #[arg(short, long)]
    pub date: Option<NaiveDate>,

    /// Units of work in flight at once
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Persist the report but do not send it
    #[arg(long, conflicts_with = "deliver_only")]
    pub skip_delivery: bool,

    /// Send the already persisted report for --date without running the pipeline
    #[arg(long)]
    pub deliver_only: bool,

    /// News search API key
    #[arg(long, env = "NEWS_API_KEY", hide_env_values = true)]
    pub news_api_key: Option<String>,

    /// Generation service API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// LINE channel access token
    #[arg(long, env = "LINE_CHANNEL_ACCESS_TOKEN", hide_env_values = true)]
    pub line_access_token: Option<String>,

    /// LINE user id receiving the digest
    #[arg(long, env = "LINE_USER_ID")]
    pub line_user_id: Option<String>,
}
