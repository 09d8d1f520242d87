//! Helpers shared across modules.
//!
//! - Reading the newline-delimited files (ledger, batch, targets)
//! - Building the shared HTTP client
//! - String truncation for logging and JSON error classification

use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use tokio::fs;
use tracing::{debug, instrument};

/// User agent sent with every outgoing HTTP request.
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Read a newline-delimited file into trimmed, non-empty lines.
///
/// # Returns
///
/// `Ok(None)` when the file does not exist, so callers can tell
/// "missing" apart from "present but empty".
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn read_lines(path: &Path) -> std::io::Result<Option<Vec<String>>> {
    match fs::read_to_string(path).await {
        Ok(contents) => {
            let lines = parse_lines(&contents);
            debug!(count = lines.len(), "Read lines");
            Ok(Some(lines))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Split file contents into trimmed, non-empty lines.
pub fn parse_lines(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Create the HTTP client shared by the page fetcher and the chat client.
///
/// Every request is bounded by `timeout`; a request that exceeds it fails
/// like any other transport error.
pub fn create_http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (on a character boundary)
/// with an ellipsis and the number of dropped bytes appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Keep at most `max` characters of `s`, ending with an ellipsis when cut.
pub fn clamp_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Detect if a serde_json error indicates truncated/incomplete JSON.
///
/// An LLM response cut off by a token limit fails with an EOF error; those
/// are worth asking again once.
pub fn looks_truncated(e: &serde_json::Error) -> bool {
    use serde_json::error::Category;
    matches!(e.classify(), Category::Eof)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

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
    fn test_truncate_for_log_respects_char_boundary() {
        let s = "ééééé";
        let result = truncate_for_log(s, 3);
        assert!(result.starts_with('é'));
        assert!(result.contains("(+8 bytes)"));
    }

    #[test]
    fn test_clamp_chars() {
        assert_eq!(clamp_chars("short", 10), "short");
        assert_eq!(clamp_chars("abcdefghij", 5), "abcd…");
        assert_eq!(clamp_chars("abcdefghij", 5).chars().count(), 5);
    }

    #[test]
    fn test_parse_lines_skips_blanks() {
        let lines = parse_lines("\nhttps://a.example/1\n  \n https://a.example/2 \n");
        assert_eq!(lines, vec!["https://a.example/1", "https://a.example/2"]);
    }

    #[tokio::test]
    async fn test_read_lines_missing_file() {
        let dir = tempdir().unwrap();
        let result = read_lines(&dir.path().join("absent.txt")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_read_lines_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("links.txt");
        std::fs::write(&path, "one\ntwo\n\n").unwrap();
        let result = read_lines(&path).await.unwrap();
        assert_eq!(result, Some(vec!["one".to_string(), "two".to_string()]));
    }

    #[test]
    fn test_looks_truncated() {
        let json_eof = r#"{"title": "value"#;
        let err = serde_json::from_str::<serde_json::Value>(json_eof).unwrap_err();
        assert!(looks_truncated(&err));

        let json_bad = r#"{"title": nope}"#;
        let err = serde_json::from_str::<serde_json::Value>(json_bad).unwrap_err();
        assert!(!looks_truncated(&err));
    }
}
