//! Content fetching from URLs, files, and stdin.
//!
//! This module provides functions for retrieving newsletter HTML from
//! various sources: HTTP/HTTPS URLs, local files, and standard input.

use std::fs;
use std::io::{self, Read};
use std::path::Path;
#[cfg(feature = "fetch")]
use std::time::Duration;

#[cfg(feature = "fetch")]
use reqwest::Client;
#[cfg(feature = "fetch")]
use url::Url;

use crate::{DigestorError, Result};

/// HTTP client configuration for fetching web pages.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Request timeout in seconds.
    pub timeout: u64,
    /// Custom User-Agent string.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { timeout: 30, user_agent: "Mozilla/5.0 (compatible; Digestor/0.1)".to_string() }
    }
}

/// Fetches HTML content from a URL.
///
/// Performs an HTTP GET request and returns the response body as text.
/// Redirects are followed and the configured timeout applies.
#[cfg(feature = "fetch")]
pub async fn fetch_url(url: &str, config: &FetchConfig) -> Result<String> {
    let parsed_url = Url::parse(url).map_err(|e| DigestorError::InvalidUrl(e.to_string()))?;

    if !matches!(parsed_url.scheme(), "http" | "https") {
        return Err(DigestorError::InvalidUrl(
            "URL must use the http:// or https:// scheme".to_string(),
        ));
    }

    let client = Client::builder()
        .timeout(Duration::from_secs(config.timeout))
        .build()
        .map_err(DigestorError::HttpError)?;

    let response = client
        .get(parsed_url)
        .header("User-Agent", &config.user_agent)
        .header("Accept", "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                DigestorError::Timeout { timeout: config.timeout }
            } else {
                DigestorError::HttpError(e)
            }
        })?;

    let content = response.error_for_status()?.text().await?;

    Ok(content)
}

/// Reads a local file as text.
///
/// Newsletter exports are not always UTF-8; bytes that fail to decode as
/// UTF-8 are read as Latin-1 instead.
pub fn fetch_file(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(DigestorError::FileNotFound(path.to_path_buf()));
    }

    let bytes = fs::read(path)?;
    Ok(decode_text(bytes))
}

/// Reads all of standard input until EOF.
pub fn fetch_stdin() -> Result<String> {
    let mut buffer = Vec::new();
    io::stdin().read_to_end(&mut buffer)?;

    Ok(decode_text(buffer))
}

/// Decodes bytes as UTF-8, falling back to Latin-1.
pub fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => err.into_bytes().into_iter().map(char::from).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.timeout, 30);
        assert!(config.user_agent.contains("Digestor"));
    }

    #[cfg(feature = "fetch")]
    #[test]
    fn test_fetch_url_invalid() {
        let config = FetchConfig::default();
        let result = std::thread::spawn(move || {
            tokio::runtime::Runtime::new()
                .unwrap()
                .block_on(fetch_url("not-a-url", &config))
        })
        .join()
        .unwrap();

        assert!(matches!(result, Err(DigestorError::InvalidUrl(_))));
    }

    #[cfg(feature = "fetch")]
    #[tokio::test]
    async fn test_fetch_url_rejects_non_http_scheme() {
        let result = fetch_url("ftp://example.com/newsletter.html", &FetchConfig::default()).await;
        assert!(matches!(result, Err(DigestorError::InvalidUrl(_))));
    }

    #[test]
    fn test_fetch_file_not_found() {
        let result = fetch_file("/nonexistent/path/file.html");
        assert!(matches!(result, Err(DigestorError::FileNotFound(_))));
    }

    #[test]
    fn test_fetch_file_utf8() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all("<h1>Überblick</h1>".as_bytes()).unwrap();

        assert_eq!(fetch_file(file.path()).unwrap(), "<h1>Überblick</h1>");
    }

    #[test]
    fn test_fetch_file_latin1_fallback() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"<p>caf\xe9</p>").unwrap();

        assert_eq!(fetch_file(file.path()).unwrap(), "<p>café</p>");
    }

    #[test]
    fn test_error_timeout_message() {
        let err = DigestorError::Timeout { timeout: 30 };
        assert!(err.to_string().contains("30"));
    }
}
