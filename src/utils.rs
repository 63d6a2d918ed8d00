//! Utility functions for string handling, URL checks and file system operations.
//!
//! This module provides helper functions used throughout the application:
//! - String truncation for logging and persisted error messages
//! - URL validation and listing-page detection
//! - File system validation for output directories

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};
use url::Url;

/// Paths like `/blog`, `/blogs/`, `/blog/page/2/`.
static LISTING_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/blogs?/?$|/blogs?/page/\d+/?$").expect("valid listing regex"));

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` characters with an ellipsis and
/// byte count indicator appended.
///
/// # Examples
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

/// Keep at most `max` characters, never splitting a UTF-8 sequence.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Parse an absolute http(s) URL or fail with `InvalidInput`.
pub fn parse_http_url(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Error::InvalidInput("URL is required".to_string()));
    }
    let url = Url::parse(raw).map_err(|_| {
        Error::InvalidInput(
            "Invalid URL provided. Please include http:// or https://".to_string(),
        )
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::InvalidInput(format!(
            "Unsupported URL scheme '{other}'. Please include http:// or https://"
        ))),
    }
}

/// Whether a URL looks like a blog listing page rather than a single article.
pub fn is_listing_url(url: &Url) -> bool {
    LISTING_PATH.is_match(url.path())
}

/// Ensure a directory exists and is writable.
///
/// This function creates the directory if it doesn't exist, then performs
/// a write test by creating and immediately deleting a probe file.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> std::result::Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = fs::create_dir_all(path).await {
        return Err(Box::new(e));
    }
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
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
        let s = "é".repeat(10);
        let result = truncate_for_log(&s, 3);
        assert!(result.starts_with("ééé…"));
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("ab", 3), "ab");
        assert_eq!(truncate_chars(&"ü".repeat(600), 500).chars().count(), 500);
    }

    #[test]
    fn test_parse_http_url() {
        assert!(parse_http_url("https://example.com/post").is_ok());
        assert!(parse_http_url("  http://example.com ").is_ok());
        assert!(matches!(parse_http_url(""), Err(Error::InvalidInput(_))));
        assert!(matches!(
            parse_http_url("example.com/post"),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            parse_http_url("ftp://example.com/file"),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_is_listing_url() {
        let yes = [
            "https://example.com/blog",
            "https://example.com/blogs/",
            "https://example.com/blog/page/2/",
            "https://example.com/en/blogs/page/10",
        ];
        for u in yes {
            assert!(is_listing_url(&Url::parse(u).unwrap()), "{u}");
        }
        let no = [
            "https://example.com/blog/my-first-post",
            "https://example.com/",
            "https://example.com/news/today",
        ];
        for u in no {
            assert!(!is_listing_url(&Url::parse(u).unwrap()), "{u}");
        }
    }

    #[tokio::test]
    async fn test_ensure_writable_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        ensure_writable_dir(nested.to_str().unwrap()).await.unwrap();
        assert!(nested.exists());
    }
}
