//! File-backed trend term source.
//!
//! The ranking itself is produced elsewhere; this reads the day's ordered
//! list from a UTF-8 text file:
//!
//! ```text
//! # top trends, most popular first
//! 大谷翔平
//! 台風10号
//! 5	総裁選
//! 6. 紅白歌合戦
//! ```
//!
//! Plain lines get the next rank in file order. `<rank><TAB><term>` and
//! `<rank>. <term>` carry an explicit rank. Blank lines and `#` comments are
//! ignored.

use crate::error::TermSourceError;
use crate::models::TrendTerm;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

static EXPLICIT_RANK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)(?:\t|\.\s+)(.*)$").expect("static regex"));

/// Ranked terms stored in a text file.
#[derive(Debug, Clone)]
pub struct TrendFile {
    path: PathBuf,
}

impl TrendFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read, validate and keep the top `top_n` terms.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display(), top_n = top_n))]
    pub async fn load(&self, top_n: usize) -> Result<Vec<TrendTerm>, TermSourceError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| TermSourceError::Read {
                path: self.path.clone(),
                source,
            })?;
        let mut terms = parse_terms(&text)?;
        terms.truncate(top_n);

        info!(count = terms.len(), "Loaded trend terms");
        for term in &terms {
            info!(rank = term.rank, term = %term.text, "Trend term");
        }
        Ok(terms)
    }
}

/// Parse and validate a ranked term list.
pub fn parse_terms(text: &str) -> Result<Vec<TrendTerm>, TermSourceError> {
    let mut terms: Vec<TrendTerm> = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let next_rank = terms.last().map_or(1, |t| t.rank.saturating_add(1));
        let term = match EXPLICIT_RANK.captures(line) {
            Some(caps) => {
                let raw_rank = &caps[1];
                let rank = raw_rank
                    .parse::<u32>()
                    .map_err(|_| TermSourceError::BadRank {
                        line: idx + 1,
                        raw: raw_rank.to_string(),
                    })?;
                TrendTerm::new(rank, caps[2].trim())
            }
            None => TrendTerm::new(next_rank, line),
        };
        terms.push(term);
    }

    validate_terms(&terms)?;
    Ok(terms)
}

/// Ranks must be 1-based, unique and strictly ascending; terms non-empty.
pub fn validate_terms(terms: &[TrendTerm]) -> Result<(), TermSourceError> {
    let mut previous = 0u32;
    for term in terms {
        if term.rank <= previous {
            return Err(TermSourceError::OutOfOrder {
                rank: term.rank,
                previous,
            });
        }
        if term.text.trim().is_empty() {
            return Err(TermSourceError::EmptyTerm { rank: term.rank });
        }
        previous = term.rank;
    }
    Ok(())
}
