//! Error types for digestor operations.
//!
//! This module defines the main error type [`DigestorError`] which represents
//! everything that can go wrong while reading a newsletter, extracting its
//! sections, fitting text to post limits and talking to the external
//! revision and publishing services.
//!
//! # Example
//!
//! ```rust
//! use digestor_core::{DigestorError, trim};
//!
//! match trim(&"x".repeat(400), 280) {
//!     Ok(post) => println!("{post}"),
//!     Err(DigestorError::PreconditionError(reason)) => println!("cannot shorten: {reason}"),
//!     Err(e) => println!("Error: {e}"),
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for digestor operations.
#[derive(Error, Debug)]
pub enum DigestorError {
    /// HTTP request errors from reqwest.
    ///
    /// Wraps network errors, DNS failures and connection problems raised
    /// while fetching pages or calling the revision/publishing APIs.
    #[cfg(feature = "fetch")]
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Request timeout.
    #[error("Request timed out after {timeout} seconds")]
    Timeout { timeout: u64 },

    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The document cannot be treated as HTML at all.
    ///
    /// Returned for empty input, input without any markup, or an invalid
    /// CSS selector in the extraction configuration. Messy markup is never
    /// an error: the parser repairs unclosed tags and bad entities.
    #[error("Failed to parse HTML: {0}")]
    HtmlParseError(String),

    /// A tracking link did not have the expected redirect-wrapper shape.
    #[error("Could not unwrap redirect URL: {href}")]
    UnwrapFailed { href: String },

    /// Text cannot be shortened without breaking a word or a hashtag.
    #[error("Cannot fit text: {0}")]
    PreconditionError(String),

    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Standard I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Settings could not be loaded or are incomplete.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The message could not be read as an email.
    #[error("Mail error: {0}")]
    MailError(String),

    /// The inbox directory holds no `.eml` files.
    #[error("No .eml files found in {0}")]
    MailboxEmpty(PathBuf),

    /// The revision service failed or returned an unusable answer.
    #[error("Revision failed: {0}")]
    RevisionError(String),

    /// The publishing platform answered with a non-success status.
    #[error("Post rejected with status {status}: {message}")]
    PublishRejected { status: u16, message: String },

    /// A post exceeds the platform character limit.
    #[error("Post text is too long: {length} characters (max {limit})")]
    PostTooLong { length: usize, limit: usize },

    /// A URL shortening service failed.
    #[error("Shortening failed: {0}")]
    ShortenError(String),
}

impl DigestorError {
    /// Whether retrying the same call later may succeed.
    ///
    /// Timeouts, connection failures, authorization hiccups (401/403),
    /// rate limiting (429) and server errors are transient. Everything else,
    /// including [`DigestorError::PostTooLong`], fails the same way on every attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            DigestorError::Timeout { .. } => true,
            DigestorError::PublishRejected { status, .. } => matches!(status, 401 | 403 | 429 | 500..=599),
            #[cfg(feature = "fetch")]
            DigestorError::HttpError(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// Result type alias for DigestorError.
pub type Result<T> = std::result::Result<T, DigestorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DigestorError::InvalidUrl("not a url".to_string());
        assert!(err.to_string().contains("Invalid URL"));
    }

    #[test]
    fn test_post_too_long_error() {
        let err = DigestorError::PostTooLong { length: 301, limit: 280 };
        assert!(err.to_string().contains("301"));
        assert!(err.to_string().contains("280"));
    }

    #[test]
    fn test_transient_statuses() {
        for status in [401, 403, 429, 500, 503] {
            let err = DigestorError::PublishRejected { status, message: String::new() };
            assert!(err.is_transient(), "status {status} should be retryable");
        }

        let err = DigestorError::PublishRejected { status: 400, message: "duplicate".to_string() };
        assert!(!err.is_transient());
    }

    #[test]
    fn test_permanent_errors() {
        assert!(!DigestorError::PostTooLong { length: 300, limit: 280 }.is_transient());
        assert!(!DigestorError::PreconditionError("no spaces".to_string()).is_transient());
        assert!(DigestorError::Timeout { timeout: 30 }.is_transient());
    }
}
