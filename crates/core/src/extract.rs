//! Section and article extraction from newsletter HTML.
//!
//! Newsletter templates lay a section out as two adjacent blocks: one
//! container holding the section heading, and the container right after it
//! holding the articles. The extractor walks every heading, classifies it
//! into a canonical [`Section`], hops to the sibling container and pulls one
//! [`ArticleRecord`] out of every titled link inside it.
//!
//! # Example
//!
//! ```rust
//! use digestor_core::{Section, extract_sections};
//!
//! let html = r#"
//!     <table><tr><td><h1>Quick Links</h1></td></tr></table>
//!     <table><tr><td><div class="text-block">
//!         <a href="https://example.com/post"><strong>A Post</strong></a>
//!         <span>A short explanation of the post.</span>
//!     </div></td></tr></table>
//! "#;
//!
//! let sections = extract_sections(html).unwrap();
//! assert_eq!(sections.get(Section::QuickLinks)[0].title, "A Post");
//! ```

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::article::ArticleRecord;
use crate::parse::{Document, Element};
use crate::preprocess::{PreprocessConfig, preprocess_html};
use crate::redirect::{UnwrapPolicy, resolve_link};
use crate::section::{Section, SectionMap};
use crate::Result;

static ENTITY_RESIDUE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"&[a-zA-Z0-9#]+;").unwrap());

/// Configuration for section extraction
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Selector for section headings
    pub heading_selector: String,
    /// Tag of the blocks that hold a heading and, in the next sibling, its articles
    pub container_tag: String,
    /// Selector for the emphasized title inside a link
    pub title_selector: String,
    /// Tag of the block holding a link's description
    pub description_tag: String,
    /// Class marking the block holding a link's description
    pub description_class: String,
    /// Links whose href contains any of these (case-insensitive) are skipped
    pub blocked_href_terms: Vec<String>,
    /// Description fragments shorter than this many characters are dropped
    pub min_fragment_chars: usize,
    /// What to do with links that are not tracking redirects
    pub unwrap_policy: UnwrapPolicy,
    /// Whether to strip scripts, styles, comments and tracking pixels first
    pub preprocess: bool,
    /// Preprocessing configuration
    pub preprocess_config: PreprocessConfig,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            heading_selector: "h1".to_string(),
            container_tag: "table".to_string(),
            title_selector: "strong".to_string(),
            description_tag: "div".to_string(),
            description_class: "text-block".to_string(),
            blocked_href_terms: ["refer.", "advertise", "unsubscribe", "manage"].map(String::from).to_vec(),
            min_fragment_chars: 10,
            unwrap_policy: UnwrapPolicy::default(),
            preprocess: true,
            preprocess_config: PreprocessConfig::default(),
        }
    }
}

impl ExtractConfig {
    /// Creates a new builder for ExtractConfig.
    ///
    /// # Example
    ///
    /// ```rust
    /// use digestor_core::{ExtractConfig, UnwrapPolicy};
    ///
    /// let config = ExtractConfig::builder()
    ///     .heading_selector("h2")
    ///     .unwrap_policy(UnwrapPolicy::Skip)
    ///     .build();
    /// assert_eq!(config.heading_selector, "h2");
    /// ```
    pub fn builder() -> ExtractConfigBuilder {
        ExtractConfigBuilder::new()
    }
}

/// Builder for ExtractConfig.
pub struct ExtractConfigBuilder {
    config: ExtractConfig,
}

impl ExtractConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self { config: ExtractConfig::default() }
    }

    /// Sets the heading selector.
    pub fn heading_selector(mut self, value: impl Into<String>) -> Self {
        self.config.heading_selector = value.into();
        self
    }

    /// Sets the container tag.
    pub fn container_tag(mut self, value: impl Into<String>) -> Self {
        self.config.container_tag = value.into();
        self
    }

    /// Sets the title selector.
    pub fn title_selector(mut self, value: impl Into<String>) -> Self {
        self.config.title_selector = value.into();
        self
    }

    /// Sets the description block class.
    pub fn description_class(mut self, value: impl Into<String>) -> Self {
        self.config.description_class = value.into();
        self
    }

    /// Adds a blocked href term.
    pub fn block_href_term(mut self, value: impl Into<String>) -> Self {
        self.config.blocked_href_terms.push(value.into());
        self
    }

    /// Sets the minimum description fragment length.
    pub fn min_fragment_chars(mut self, value: usize) -> Self {
        self.config.min_fragment_chars = value;
        self
    }

    /// Sets the unwrap policy.
    pub fn unwrap_policy(mut self, value: UnwrapPolicy) -> Self {
        self.config.unwrap_policy = value;
        self
    }

    /// Sets whether to preprocess the HTML.
    pub fn preprocess(mut self, value: bool) -> Self {
        self.config.preprocess = value;
        self
    }

    /// Builds the config.
    pub fn build(self) -> ExtractConfig {
        self.config
    }
}

impl Default for ExtractConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Extracts sections with the default configuration.
///
/// # Errors
///
/// Returns [`crate::DigestorError::HtmlParseError`] when the input is not HTML.
pub fn extract_sections(html: &str) -> Result<SectionMap> {
    extract_sections_with_config(html, &ExtractConfig::default())
}

/// Extracts sections with a custom configuration.
///
/// The result always holds all four canonical sections. Unrecognized
/// headings, headings without a sibling content block and links without a
/// title contribute nothing.
///
/// # Errors
///
/// Returns [`crate::DigestorError::HtmlParseError`] when the input is not HTML
/// or a configured selector is invalid, and
/// [`crate::DigestorError::UnwrapFailed`] under [`UnwrapPolicy::Fail`].
pub fn extract_sections_with_config(html: &str, config: &ExtractConfig) -> Result<SectionMap> {
    let source = if config.preprocess { preprocess_html(html, &config.preprocess_config) } else { html.to_string() };
    let doc = Document::parse(&source)?;
    let mut sections = SectionMap::new();

    for heading in doc.select(&config.heading_selector)? {
        let heading_text = collapse_whitespace(&heading.text());
        let Some(section) = Section::classify(&heading_text) else {
            debug!(heading = %heading_text, "skipping unrecognized heading");
            continue;
        };

        let Some(content) = heading
            .ancestor(&config.container_tag)
            .and_then(|container| container.next_sibling(&config.container_tag))
        else {
            debug!(%section, "heading has no sibling content block");
            continue;
        };

        let records = extract_records(&content, config)?;
        debug!(%section, count = records.len(), "extracted articles");
        sections.extend(section, records);
    }

    Ok(sections)
}

/// Extract one record per titled, non-blocked link inside a content block
fn extract_records(content: &Element<'_>, config: &ExtractConfig) -> Result<Vec<ArticleRecord>> {
    let mut records = Vec::new();

    for link in content.select("a[href]")? {
        let Some(href) = link.attr("href") else { continue };
        if is_blocked(href, &config.blocked_href_terms) {
            continue;
        }

        let title = match link.select(&config.title_selector)?.first() {
            Some(title) => collapse_whitespace(&title.text()),
            None => continue,
        };
        if title.is_empty() {
            continue;
        }

        let Some(url) = resolve_link(href, config.unwrap_policy)? else { continue };

        let description = link
            .ancestor_with_class(&config.description_tag, &config.description_class)
            .map(|block| describe(&block, &title, config.min_fragment_chars))
            .unwrap_or_default();

        records.push(ArticleRecord::new(title, url, description));
    }

    Ok(records)
}

fn is_blocked(href: &str, terms: &[String]) -> bool {
    let href = href.to_lowercase();
    terms.iter().any(|term| href.contains(&term.to_lowercase()))
}

/// Build a description from the visible text of a link's surrounding block
fn describe(block: &Element<'_>, title: &str, min_fragment_chars: usize) -> String {
    let fragments: Vec<String> = block
        .text_nodes()
        .into_iter()
        .map(collapse_whitespace)
        .filter(|text| text != title && !text.starts_with("http"))
        .filter(|text| text.chars().count() >= min_fragment_chars)
        .collect();

    if fragments.is_empty() {
        return String::new();
    }

    let joined = fragments.join(" ");
    collapse_whitespace(&ENTITY_RESIDUE.replace_all(&joined, " "))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
