//! Data models shared across the pipeline.
//!
//! - [`TrendTerm`]: one ranked trend for the day
//! - [`ArticleResult`]: the single article found for a term
//! - [`Summary`]: normalized bullet lines derived from one article
//! - [`ReportEntry`]: what the report shows for one included term
//! - [`UnitOutcome`]: the result of one fetch+summarize unit of work

use crate::error::SkipReason;
use serde::{Deserialize, Serialize};

/// A trending search term with its 1-based rank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendTerm {
    /// Position in the day's ranking; `1` is the top trend.
    pub rank: u32,
    /// The search phrase.
    pub text: String,
}

impl TrendTerm {
    pub fn new(rank: u32, text: impl Into<String>) -> Self {
        Self {
            rank,
            text: text.into(),
        }
    }
}

/// The best-matching article for a term, as returned by the search service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleResult {
    pub term: TrendTerm,
    pub title: String,
    pub url: String,
    /// Plain-text description; empty when the service had none.
    pub description: String,
    /// Host of `url` without a leading `www.`.
    pub source_domain: String,
}

/// Normalized summary lines for one term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub term: TrendTerm,
    pub bullet_lines: Vec<String>,
}

/// One included term as shown in the report.
///
/// `original_rank` drives ordering only; the rendered report shows a
/// contiguous display index instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub original_rank: u32,
    pub term: String,
    pub title: String,
    pub url: String,
    pub summary_lines: Vec<String>,
}

impl ReportEntry {
    /// Combine a fetched article with its summary.
    pub fn from_parts(article: ArticleResult, summary: Summary) -> Self {
        debug_assert_eq!(article.term, summary.term);
        Self {
            original_rank: article.term.rank,
            term: article.term.text,
            title: article.title,
            url: article.url,
            summary_lines: summary.bullet_lines,
        }
    }
}

/// What a single unit of work produced.
#[derive(Debug)]
pub enum UnitOutcome {
    Included(ReportEntry),
    Skipped(TrendTerm, SkipReason),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(rank: u32) -> ArticleResult {
        ArticleResult {
            term: TrendTerm::new(rank, "大谷翔平"),
            title: "大谷が50本塁打".to_string(),
            url: "https://www.nikkansports.com/article/1".to_string(),
            description: "ドジャースの大谷翔平が…".to_string(),
            source_domain: "nikkansports.com".to_string(),
        }
    }

    #[test]
    fn test_report_entry_from_parts() {
        let a = article(3);
        let s = Summary {
            term: a.term.clone(),
            bullet_lines: vec!["  ・  50本塁打を達成".to_string()],
        };
        let entry = ReportEntry::from_parts(a, s);

        assert_eq!(entry.original_rank, 3);
        assert_eq!(entry.term, "大谷翔平");
        assert_eq!(entry.title, "大谷が50本塁打");
        assert_eq!(entry.url, "https://www.nikkansports.com/article/1");
        assert_eq!(entry.summary_lines.len(), 1);
    }

    #[test]
    fn test_trend_term_deserialization() {
        let t: TrendTerm = serde_json::from_str(r#"{"rank": 2, "text": "台風"}"#).unwrap();
        assert_eq!(t, TrendTerm::new(2, "台風"));
    }
}
