//! Digest assembly.
//!
//! Included entries are shown in ascending original rank but numbered
//! contiguously from 1, so skipped terms leave no visible gaps. Each entry
//! renders as:
//!
//! ```text
//! {index}. トレンド：{term}
//! ・タイトル：{title}
//! ・URL：{url}
//! ・概要：{summary}
//!
//! ```

use crate::models::ReportEntry;
use crate::summarizer::BULLET;
use chrono::NaiveDate;
use itertools::Itertools;
use std::fmt;

/// Greeting that opens every digest.
pub const DEFAULT_HEADER: &str = "こんにちは！昨日話題になったトレンドのニュースをお届けします。興味のある話題が見つかるかもしれませんね。\n\n";

/// Artifact name for a date. One artifact per calendar day.
pub fn artifact_key(date: NaiveDate) -> String {
    format!("{}_trending_news_report.txt", date.format("%Y%m%d"))
}

/// Join normalized summary lines for display.
///
/// Bullet lines start on a fresh line; plain lines continue the current one.
pub fn join_summary_lines(lines: &[String]) -> String {
    let mut out = String::new();
    for line in lines {
        if line.starts_with(BULLET) {
            out.push('\n');
        }
        out.push_str(line);
    }
    out
}

/// An assembled digest. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub date: NaiveDate,
    pub header: String,
    pub entries: Vec<ReportEntry>,
}

impl Report {
    pub fn artifact_key(&self) -> String {
        artifact_key(self.date)
    }

    /// Header-only reports are valid output but signal total failure upstream.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.header)?;
        for (i, entry) in self.entries.iter().enumerate() {
            write!(
                f,
                "{}. トレンド：{}\n・タイトル：{}\n・URL：{}\n・概要：{}\n\n",
                i + 1,
                entry.term,
                entry.title,
                entry.url,
                join_summary_lines(&entry.summary_lines)
            )?;
        }
        Ok(())
    }
}

/// Builds [`Report`]s with a fixed header.
#[derive(Debug, Clone)]
pub struct ReportAssembler {
    header: String,
}

impl Default for ReportAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_HEADER)
    }
}

impl ReportAssembler {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
        }
    }

    /// Order entries by original rank and drop repeated terms (first wins).
    pub fn assemble(&self, date: NaiveDate, entries: Vec<ReportEntry>) -> Report {
        let entries = entries
            .into_iter()
            .sorted_by_key(|e| e.original_rank)
            .unique_by(|e| e.term.clone())
            .collect();
        Report {
            date,
            header: self.header.clone(),
            entries,
        }
    }
}
