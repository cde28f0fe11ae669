//! HTML parsing and DOM navigation.
//!
//! This module provides the [`Document`] and [`Element`] types for parsing
//! newsletter HTML and walking the tree: CSS selection downward, plus the
//! ancestor and sibling hops the section extractor needs to move between
//! a heading and the block that holds its articles.
//!
//! # Example
//!
//! ```rust
//! use digestor_core::parse::Document;
//!
//! let html = r#"
//!     <table><tr><td><h1>Quick Links</h1></td></tr></table>
//!     <table><tr><td><a href="https://example.com">Link</a></td></tr></table>
//! "#;
//!
//! let doc = Document::parse(html).unwrap();
//! let heading = &doc.select("h1").unwrap()[0];
//! let body = heading.ancestor("table").and_then(|t| t.next_sibling("table"));
//! assert!(body.is_some());
//! ```

use scraper::{ElementRef, Html, Selector};

use crate::{DigestorError, Result};

/// Represents a parsed HTML document.
///
/// Parsing is tolerant: unclosed tags, stray end tags and broken entities are
/// repaired the way browsers repair them. Only input that is not markup at
/// all is rejected.
///
/// # Example
///
/// ```rust
/// use digestor_core::parse::Document;
///
/// let html = "<html><body><h1>Miscellaneous</h1><p>Hello</p></body></html>";
/// let doc = Document::parse(html).unwrap();
/// assert_eq!(doc.select("h1").unwrap()[0].text(), "Miscellaneous");
/// ```
pub struct Document {
    html: Html,
}

impl Document {
    /// Parses HTML from a string.
    ///
    /// # Errors
    ///
    /// Returns [`DigestorError::HtmlParseError`] if the input is empty or
    /// contains no markup.
    pub fn parse(html: &str) -> Result<Self> {
        if html.trim().is_empty() {
            return Err(DigestorError::HtmlParseError("document is empty".to_string()));
        }
        if !html.contains('<') {
            return Err(DigestorError::HtmlParseError("document contains no markup".to_string()));
        }

        Ok(Self { html: Html::parse_document(html) })
    }

    /// Selects elements using a CSS selector, in document order.
    ///
    /// # Errors
    ///
    /// Returns [`DigestorError::HtmlParseError`] if the selector is invalid.
    ///
    /// # Example
    ///
    /// ```rust
    /// use digestor_core::parse::Document;
    ///
    /// let html = r#"<p class="content">First</p><p class="content">Second</p>"#;
    /// let doc = Document::parse(html).unwrap();
    /// let elements = doc.select("p.content").unwrap();
    /// assert_eq!(elements.len(), 2);
    /// ```
    pub fn select(&'_ self, selector: &str) -> Result<Vec<Element<'_>>> {
        let sel = parse_selector(selector)?;
        Ok(self.html.select(&sel).map(|el| Element { element: el }).collect())
    }
}

/// A wrapper around scraper's ElementRef for easier DOM navigation.
///
/// # Example
///
/// ```rust
/// use digestor_core::parse::Document;
///
/// let html = r#"<a href="https://example.com"><strong>Link text</strong></a>"#;
/// let doc = Document::parse(html).unwrap();
/// let link = &doc.select("a").unwrap()[0];
///
/// assert_eq!(link.text(), "Link text");
/// assert_eq!(link.attr("href"), Some("https://example.com"));
/// ```
#[derive(Clone, Debug)]
pub struct Element<'a> {
    element: ElementRef<'a>,
}

impl<'a> Element<'a> {
    /// Gets the text content of this element.
    pub fn text(&self) -> String {
        self.element.text().collect()
    }

    /// Gets every non-empty text node under this element, trimmed, in document order.
    pub fn text_nodes(&self) -> Vec<&'a str> {
        self.element
            .text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// Gets the value of an attribute.
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.element.value().attr(name)
    }

    /// Whether the element carries `class` among its classes.
    pub fn has_class(&self, class: &str) -> bool {
        self.element.value().classes().any(|c| c == class)
    }

    /// Nearest enclosing element with the given tag name.
    pub fn ancestor(&self, tag: &str) -> Option<Element<'a>> {
        self.element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name().eq_ignore_ascii_case(tag))
            .map(|element| Element { element })
    }

    /// Nearest enclosing element with the given tag name and class.
    pub fn ancestor_with_class(&self, tag: &str, class: &str) -> Option<Element<'a>> {
        self.element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .map(|element| Element { element })
            .find(|el| el.element.value().name().eq_ignore_ascii_case(tag) && el.has_class(class))
    }

    /// First following sibling element with the given tag name.
    ///
    /// Text and comment nodes between the two are skipped, as are sibling
    /// elements of other tags.
    pub fn next_sibling(&self, tag: &str) -> Option<Element<'a>> {
        self.element
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name().eq_ignore_ascii_case(tag))
            .map(|element| Element { element })
    }

    /// Selects descendant elements using a CSS selector.
    ///
    /// # Errors
    ///
    /// Returns [`DigestorError::HtmlParseError`] if the selector is invalid.
    pub fn select(&self, selector: &str) -> Result<Vec<Element<'a>>> {
        let sel = parse_selector(selector)?;
        Ok(self.element.select(&sel).map(|el| Element { element: el }).collect())
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| DigestorError::HtmlParseError(format!("Invalid selector: {}", e)))
}
