pub mod article;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod fit;
pub mod formatters;
#[cfg(feature = "mail")]
pub mod mailbox;
pub mod parse;
#[cfg(feature = "fetch")]
pub mod pipeline;
pub mod preprocess;
#[cfg(feature = "fetch")]
pub mod publish;
pub mod redirect;
#[cfg(feature = "fetch")]
pub mod revise;
pub mod section;
#[cfg(feature = "fetch")]
pub mod shorten;

pub use article::ArticleRecord;
pub use config::{PipelineSettings, PublishSettings, ReviseSettings, ReviserKind, Settings, ShortenSettings};
pub use error::{DigestorError, Result};
pub use extract::{ExtractConfig, ExtractConfigBuilder, extract_sections, extract_sections_with_config};
pub use fetch::{FetchConfig, decode_text, fetch_file, fetch_stdin};
#[cfg(feature = "fetch")]
pub use fetch::fetch_url;
pub use fit::{CHUNK_BUDGET, HASHTAG_MARKER, POST_LIMIT, split, trim};
pub use formatters::{JsonConfig, MarkdownConfig, OutputFormat, TextConfig};
pub use formatters::{convert_to_json, convert_to_markdown, convert_to_text};
#[cfg(feature = "mail")]
pub use mailbox::{MailContent, StagedMessage, html_body, latest_message, load_latest_html, parse_message};
pub use parse::Document;
#[cfg(feature = "fetch")]
pub use pipeline::{Pipeline, PipelineConfig, PipelineReport, PostedArticle, SkipReason, SkippedArticle};
#[doc(hidden)]
pub use preprocess::PreprocessConfig;
pub use preprocess::preprocess_html;
#[cfg(feature = "fetch")]
pub use publish::{DryRunPublisher, PostId, Publisher, RetryPolicy, ThreadError, XPublisher};
pub use redirect::{UnwrapPolicy, resolve_link, unwrap_redirect};
#[cfg(feature = "fetch")]
pub use revise::{AnthropicReviser, EchoReviser, OllamaReviser, OpenAiReviser, Reviser, build_reviser};
pub use section::{Section, SectionMap};
#[cfg(feature = "fetch")]
pub use shorten::{ShortenService, Shortener};
