//! Article record type produced by section extraction.

use serde::{Deserialize, Serialize};

/// One curated link recovered from a newsletter.
///
/// `title` and `url` are never empty. `description` may be empty but is
/// never whitespace-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    /// Link title, taken from the emphasized text inside the link.
    pub title: String,

    /// Absolute destination URL with any tracking redirect removed.
    pub url: String,

    /// Summary text from the block surrounding the link.
    pub description: String,
}

impl ArticleRecord {
    /// Creates a record, trimming surrounding whitespace from every field.
    pub fn new(title: impl Into<String>, url: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into().trim().to_string(),
            url: url.into().trim().to_string(),
            description: description.into().trim().to_string(),
        }
    }

    /// Whether the record carries any description text.
    pub fn has_description(&self) -> bool {
        !self.description.is_empty()
    }
}
