//! Article summarization and bullet normalization.
//!
//! The generation service is asked for a ~100 character Japanese summary in
//! bullet form. Its output is interpreted in two stages:
//!
//! 1. [`parse_lines`] classifies every line as a bullet (leading `-`, `•`
//!    or `・` marker, or `*` followed by whitespace) or plain text.
//! 2. [`SummaryLine::render`] prints bullets with the fixed [`BULLET`]
//!    prefix and leaves plain lines untouched.
//!
//! Line order and line count are preserved, and normalizing already
//! normalized lines is a no-op.

use crate::api::AskAsync;
use crate::error::SummarizeError;
use crate::utils::truncate_for_log;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, instrument};

/// Fixed role given to the generation service.
pub const SYSTEM_PRIMING: &str = "あなたは助けになるアシスタントです。";

/// Indentation plus bullet glyph that starts every normalized bullet line.
pub const BULLET: &str = "  ・  ";

static MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-•・]|\*\s)\s*(.*?)\s*$").expect("static regex"));

/// Compress an article description into normalized summary lines.
pub trait Summarize {
    async fn summarize(&self, description: &str) -> Result<Vec<String>, SummarizeError>;
}

/// One line of generated output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryLine {
    Bullet(String),
    Plain(String),
}

impl SummaryLine {
    pub fn parse(line: &str) -> Self {
        match MARKER.captures(line) {
            Some(caps) => SummaryLine::Bullet(caps[1].to_string()),
            None => SummaryLine::Plain(line.to_string()),
        }
    }

    pub fn render(&self) -> String {
        match self {
            SummaryLine::Bullet(text) => format!("{BULLET}{text}"),
            SummaryLine::Plain(text) => text.clone(),
        }
    }
}

/// Stage one: split generated text into classified lines.
pub fn parse_lines(text: &str) -> Vec<SummaryLine> {
    text.lines().map(SummaryLine::parse).collect()
}

/// Both stages: generated text in, normalized lines out.
pub fn normalize(text: &str) -> Vec<String> {
    parse_lines(text).iter().map(SummaryLine::render).collect()
}

/// User prompt asking for a short bullet summary of `description`.
pub fn build_prompt(description: &str) -> String {
    format!("以下のテキストを、100文字程度で要約してください：\n{description}\n要約（箇条書き）：")
}

/// Summarizer backed by any [`AskAsync`] generation client.
#[derive(Debug)]
pub struct Summarizer<A> {
    api: A,
}

impl<A: AskAsync> Summarizer<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }
}

impl<A: AskAsync> Summarize for Summarizer<A> {
    #[instrument(level = "info", skip_all, fields(description_len = description.len()))]
    async fn summarize(&self, description: &str) -> Result<Vec<String>, SummarizeError> {
        let prompt = build_prompt(description);
        let text = self.api.ask(SYSTEM_PRIMING, &prompt).await?;
        debug!(response = %truncate_for_log(&text, 300), "Generation output");

        if text.trim().is_empty() {
            return Err(SummarizeError::Empty);
        }
        let lines = normalize(&text);
        info!(lines = lines.len(), "Summarized article");
        Ok(lines)
    }
}
