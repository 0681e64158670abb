//! Small helpers for logging, text cleanup and the output directory.

use crate::error::ConfigError;
use scraper::Html;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Truncate a string for logging purposes.
///
/// Keeps at most `max` characters and appends `"…(+N bytes)"` with the
/// number of bytes dropped. Never splits a multi-byte character.
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Reduce an HTML fragment to its text, collapsing runs of whitespace.
///
/// Search results sometimes carry markup in their descriptions.
pub fn html_to_text(fragment: &str) -> String {
    if !fragment.contains('<') && !fragment.contains('&') {
        return collapse_whitespace(fragment);
    }
    let doc = Html::parse_fragment(fragment);
    let text = doc.root_element().text().collect::<Vec<_>>().join(" ");
    collapse_whitespace(&text)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Host of an article URL without a leading `www.`.
///
/// ```ignore
/// assert_eq!(source_domain("https://www.asahi.com/articles/1"), Some("asahi.com".into()));
/// ```
pub fn source_domain(article_url: &str) -> Option<String> {
    let parsed = url::Url::parse(article_url).ok()?;
    let host = parsed.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_string())
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then writes and removes a probe file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), ConfigError> {
    let to_err = |source| ConfigError::OutputDir {
        path: path.to_path_buf(),
        source,
    };
    fs::create_dir_all(path).await.map_err(to_err)?;
    let probe_path = path.join("..__probe_write__");
    stdfs::File::create(&probe_path).map_err(to_err)?;
    let _ = stdfs::remove_file(&probe_path);
    info!("Output directory is writable");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_multibyte() {
        let s = "東京都で記録的な大雨";
        assert_eq!(truncate_for_log(s, 3), "東京都…(+21 bytes)");
    }

    #[test]
    fn test_html_to_text() {
        assert_eq!(html_to_text("plain  text\n here"), "plain text here");
        assert_eq!(
            html_to_text("<p>大谷が<b>50本</b>塁打</p>"),
            "大谷が 50本 塁打"
        );
        assert_eq!(html_to_text("A &amp; B"), "A & B");
        assert_eq!(html_to_text(""), "");
    }

    #[test]
    fn test_source_domain() {
        assert_eq!(
            source_domain("https://www.asahi.com/articles/ASS1.html"),
            Some("asahi.com".to_string())
        );
        assert_eq!(
            source_domain("https://news.yahoo.co.jp/articles/abc"),
            Some("news.yahoo.co.jp".to_string())
        );
        assert_eq!(source_domain("not a url"), None);
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a/b");
        ensure_writable_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
        assert!(!nested.join("..__probe_write__").exists());
    }
}
