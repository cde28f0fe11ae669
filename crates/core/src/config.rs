//! Application settings.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! environment variables for secrets. The CLI applies its flags on top.
//!
//! ```toml
//! [revise]
//! provider = "openai"
//! model = "gpt-3.5-turbo"
//!
//! [publish]
//! wait_on_rate_limit = true
//!
//! [pipeline]
//! inbox = "/home/me/Downloads"
//! sections = ["Attacks & Vulnerabilities", "Quick Links"]
//! pause_secs = 10
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::fit::{CHUNK_BUDGET, POST_LIMIT};
use crate::section::Section;
use crate::{DigestorError, Result};

/// System prompt sent with every revision request.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that revises text to fit into a single tweet of 280 characters.";

/// Which revision backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviserKind {
    #[default]
    OpenAi,
    Anthropic,
    Ollama,
    /// Returns the text unchanged.
    Echo,
}

impl ReviserKind {
    /// Model used when none is configured.
    pub fn default_model(self) -> &'static str {
        match self {
            ReviserKind::OpenAi => "gpt-3.5-turbo",
            ReviserKind::Anthropic => "claude-3-haiku-20240307",
            ReviserKind::Ollama => "llama2",
            ReviserKind::Echo => "echo",
        }
    }

    /// API base used when none is configured.
    pub fn default_base_url(self) -> &'static str {
        match self {
            ReviserKind::OpenAi => "https://api.openai.com/v1",
            ReviserKind::Anthropic => "https://api.anthropic.com/v1",
            ReviserKind::Ollama => "http://localhost:11434",
            ReviserKind::Echo => "",
        }
    }
}

impl fmt::Display for ReviserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReviserKind::OpenAi => "openai",
            ReviserKind::Anthropic => "anthropic",
            ReviserKind::Ollama => "ollama",
            ReviserKind::Echo => "echo",
        };
        f.write_str(name)
    }
}

impl FromStr for ReviserKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" | "gpt" => Ok(ReviserKind::OpenAi),
            "anthropic" | "claude" => Ok(ReviserKind::Anthropic),
            "ollama" | "local" => Ok(ReviserKind::Ollama),
            "echo" | "none" => Ok(ReviserKind::Echo),
            _ => Err(format!("Invalid reviser: {}. Valid options: openai, anthropic, ollama, echo", s)),
        }
    }
}

/// Settings for the text revision service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviseSettings {
    pub provider: ReviserKind,
    /// Model name; the provider default when unset.
    pub model: Option<String>,
    /// API key; usually supplied through the environment.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// API base URL; the provider default when unset.
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: String,
    /// Request timeout in seconds.
    pub timeout: u64,
}

impl Default for ReviseSettings {
    fn default() -> Self {
        Self {
            provider: ReviserKind::default(),
            model: None,
            api_key: None,
            base_url: None,
            temperature: 0.7,
            max_tokens: 70,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            timeout: 30,
        }
    }
}

impl ReviseSettings {
    /// Configured model or the provider default.
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(self.provider.default_model())
    }

    /// Configured base URL or the provider default, without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(self.provider.default_base_url()).trim_end_matches('/')
    }
}

/// Settings for the publishing platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishSettings {
    /// OAuth 2.0 user-context access token.
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    pub api_base: String,
    /// Wait once until the rate-limit window resets when the platform answers 429.
    pub wait_on_rate_limit: bool,
    /// Request timeout in seconds.
    pub timeout: u64,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self { access_token: None, api_base: "https://api.twitter.com".to_string(), wait_on_rate_limit: false, timeout: 30 }
    }
}

/// Settings for the newsletter-to-posts run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Directory holding saved `.eml` newsletters.
    pub inbox: Option<PathBuf>,
    /// Where the message being processed is moved; `<inbox>/.staging` when unset.
    pub staging_dir: Option<PathBuf>,
    /// Sections to post; every section when empty.
    pub sections: Vec<Section>,
    pub chunk_budget: usize,
    /// Characters per post; never above the platform limit of 280.
    pub post_limit: usize,
    /// Pause between articles, in seconds.
    pub pause_secs: u64,
    pub retry_attempts: u32,
    /// Delay between post attempts, in seconds.
    pub retry_delay_secs: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            inbox: None,
            staging_dir: None,
            sections: Vec::new(),
            chunk_budget: CHUNK_BUDGET,
            post_limit: POST_LIMIT,
            pause_secs: 10,
            retry_attempts: 3,
            retry_delay_secs: 3,
        }
    }
}

/// Settings for URL shortening.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortenSettings {
    /// Bitly access token.
    #[serde(skip_serializing)]
    pub bitly_token: Option<String>,
}

/// All application settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub revise: ReviseSettings,
    pub publish: PublishSettings,
    pub pipeline: PipelineSettings,
    pub shorten: ShortenSettings,
}

impl Settings {
    /// Loads settings from `path`, or from the default location when `None`.
    ///
    /// A missing default file is not an error; a missing explicit file is.
    /// Secrets from the process environment override the file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) if !path.exists() => return Err(DigestorError::FileNotFound(path.to_path_buf())),
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Parses a TOML settings file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        debug!(path = %path.display(), "loading settings");
        Self::from_toml(&content)
    }

    /// Parses settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| DigestorError::ConfigError(e.to_string()))
    }

    /// Fills secrets from environment variables looked up with `var`.
    ///
    /// The OpenAI key is read from `OPENAI_API_KEY`, then `openaiApiKey`.
    /// Only the key for the selected provider is applied.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| var(key).filter(|value| !value.trim().is_empty());

        let revise_key = match self.revise.provider {
            ReviserKind::OpenAi => non_empty("OPENAI_API_KEY").or_else(|| non_empty("openaiApiKey")),
            ReviserKind::Anthropic => non_empty("ANTHROPIC_API_KEY"),
            ReviserKind::Ollama | ReviserKind::Echo => None,
        };
        if let Some(key) = revise_key {
            self.revise.api_key = Some(key);
        }
        if let Some(token) = non_empty("X_ACCESS_TOKEN") {
            self.publish.access_token = Some(token);
        }
        if let Some(token) = non_empty("BITLY_TOKEN") {
            self.shorten.bitly_token = Some(token);
        }
    }
}

/// `<config_dir>/digestor/config.toml`, when the platform has a config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("digestor").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();

        assert_eq!(settings.revise.provider, ReviserKind::OpenAi);
        assert_eq!(settings.revise.model(), "gpt-3.5-turbo");
        assert_eq!(settings.revise.max_tokens, 70);
        assert_eq!(settings.pipeline.chunk_budget, 220);
        assert_eq!(settings.pipeline.post_limit, 280);
        assert_eq!(settings.pipeline.pause_secs, 10);
        assert_eq!(settings.pipeline.retry_attempts, 3);
        assert!(settings.pipeline.sections.is_empty());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = Settings::from_toml(
            r#"
            [revise]
            provider = "anthropic"

            [pipeline]
            sections = ["Quick Links"]
            pause_secs = 0
            "#,
        )
        .unwrap();

        assert_eq!(settings.revise.provider, ReviserKind::Anthropic);
        assert_eq!(settings.revise.model(), "claude-3-haiku-20240307");
        assert_eq!(settings.revise.temperature, 0.7);
        assert_eq!(settings.pipeline.sections, vec![Section::QuickLinks]);
        assert_eq!(settings.pipeline.pause_secs, 0);
        assert_eq!(settings.pipeline.chunk_budget, 220);
    }

    #[test]
    fn test_invalid_toml() {
        let result = Settings::from_toml("[revise]\nprovider = \"carrier-pigeon\"");
        assert!(matches!(result, Err(DigestorError::ConfigError(_))));
    }

    #[test]
    fn test_env_openai_key_precedence() {
        let mut settings = Settings::default();
        settings.apply_env(env(&[("OPENAI_API_KEY", "primary"), ("openaiApiKey", "legacy")]));
        assert_eq!(settings.revise.api_key.as_deref(), Some("primary"));

        let mut settings = Settings::default();
        settings.apply_env(env(&[("openaiApiKey", "legacy"), ("X_ACCESS_TOKEN", "tok")]));
        assert_eq!(settings.revise.api_key.as_deref(), Some("legacy"));
        assert_eq!(settings.publish.access_token.as_deref(), Some("tok"));
    }

    #[test]
    fn test_env_uses_provider_key() {
        let mut settings = Settings::from_toml("[revise]\nprovider = \"anthropic\"").unwrap();
        settings.apply_env(env(&[("OPENAI_API_KEY", "openai"), ("ANTHROPIC_API_KEY", "claude")]));
        assert_eq!(settings.revise.api_key.as_deref(), Some("claude"));
    }

    #[test]
    fn test_env_ignores_blank_values() {
        let mut settings = Settings::default();
        settings.apply_env(env(&[("OPENAI_API_KEY", "  ")]));
        assert_eq!(settings.revise.api_key, None);
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let result = Settings::load(Some(Path::new("/nonexistent/digestor.toml")));
        assert!(matches!(result, Err(DigestorError::FileNotFound(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[publish]\nwait_on_rate_limit = true\n").unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert!(settings.publish.wait_on_rate_limit);
    }

    #[test]
    fn test_secrets_not_serialized() {
        let mut settings = Settings::default();
        settings.revise.api_key = Some("secret".to_string());
        let rendered = toml::to_string(&settings).unwrap();
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn test_reviser_kind_from_str() {
        assert_eq!("claude".parse::<ReviserKind>(), Ok(ReviserKind::Anthropic));
        assert_eq!("ECHO".parse::<ReviserKind>(), Ok(ReviserKind::Echo));
        assert!("bard".parse::<ReviserKind>().is_err());
    }
}
