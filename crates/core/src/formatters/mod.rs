//! Rendering extracted sections for people and programs.

pub mod json;
pub mod markdown;
pub mod text;

use std::fmt;
use std::str::FromStr;

pub use json::{JsonConfig, convert_to_json};
pub use markdown::{MarkdownConfig, convert_to_markdown};
pub use text::{TextConfig, convert_to_text};

/// Output formats for a [`SectionMap`](crate::SectionMap).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Text,
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Json => "json",
            OutputFormat::Text => "text",
            OutputFormat::Markdown => "markdown",
        };
        f.write_str(name)
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "text" | "txt" => Ok(OutputFormat::Text),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            _ => Err(format!("Invalid format: {}. Valid options: json, text, markdown", s)),
        }
    }
}
