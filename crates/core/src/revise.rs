//! Text revision through a language model.
//!
//! A [`Reviser`] rewrites one chunk of an article description into a single
//! short post. Backends: OpenAI chat completions, the Anthropic messages API,
//! a local Ollama server, and an identity reviser for dry runs.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ReviseSettings, ReviserKind};
use crate::{DigestorError, Result};

/// Rewrites text into a post-sized revision.
#[async_trait]
pub trait Reviser: Send + Sync {
    fn name(&self) -> &str;

    /// Returns the revised text, trimmed of surrounding whitespace.
    ///
    /// The result is not guaranteed to fit the post limit.
    async fn revise(&self, text: &str) -> Result<String>;
}

/// Builds the reviser selected in `settings`.
///
/// # Errors
///
/// [`DigestorError::ConfigError`] when a hosted provider has no API key.
pub fn build_reviser(settings: &ReviseSettings) -> Result<Box<dyn Reviser>> {
    Ok(match settings.provider {
        ReviserKind::OpenAi => Box::new(OpenAiReviser::new(settings)?),
        ReviserKind::Anthropic => Box::new(AnthropicReviser::new(settings)?),
        ReviserKind::Ollama => Box::new(OllamaReviser::new(settings)?),
        ReviserKind::Echo => Box::new(EchoReviser),
    })
}

fn http_client(settings: &ReviseSettings) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(settings.timeout))
        .build()
        .map_err(DigestorError::HttpError)
}

fn require_key(settings: &ReviseSettings, variable: &str) -> Result<String> {
    settings.api_key.clone().ok_or_else(|| {
        DigestorError::ConfigError(format!("{} API key not found. Set the {} environment variable", settings.provider, variable))
    })
}

async fn send_json<T: for<'de> Deserialize<'de>>(request: RequestBuilder, timeout: u64) -> Result<T> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            DigestorError::Timeout { timeout }
        } else {
            DigestorError::HttpError(e)
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(DigestorError::RevisionError(format!("service answered {}: {}", status, body.trim())));
    }

    Ok(response.json().await?)
}

fn non_empty(answer: Option<String>) -> Result<String> {
    answer
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or_else(|| DigestorError::RevisionError("service returned no text".to_string()))
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

impl ChatResponse {
    fn into_text(self) -> Result<String> {
        non_empty(self.choices.into_iter().next().and_then(|choice| choice.message.content))
    }
}

/// OpenAI chat completions.
pub struct OpenAiReviser {
    client: Client,
    settings: ReviseSettings,
    api_key: String,
}

impl OpenAiReviser {
    pub fn new(settings: &ReviseSettings) -> Result<Self> {
        Ok(Self { client: http_client(settings)?, settings: settings.clone(), api_key: require_key(settings, "OPENAI_API_KEY")? })
    }
}

impl fmt::Debug for OpenAiReviser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiReviser")
            .field("model", &self.settings.model())
            .field("base_url", &self.settings.base_url())
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl Reviser for OpenAiReviser {
    fn name(&self) -> &str {
        "openai"
    }

    async fn revise(&self, text: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.settings.model(),
            messages: vec![
                ChatMessage { role: "system", content: &self.settings.system_prompt },
                ChatMessage { role: "user", content: text },
            ],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };
        debug!(model = request.model, chars = text.chars().count(), "requesting revision");

        let builder = self
            .client
            .post(format!("{}/chat/completions", self.settings.base_url()))
            .bearer_auth(&self.api_key)
            .json(&request);
        let response: ChatResponse = send_json(builder, self.settings.timeout).await?;

        response.into_text()
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    system: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

impl MessagesResponse {
    fn into_text(self) -> Result<String> {
        non_empty(self.content.into_iter().find_map(|block| block.text))
    }
}

/// Anthropic messages API.
pub struct AnthropicReviser {
    client: Client,
    settings: ReviseSettings,
    api_key: String,
}

impl AnthropicReviser {
    const API_VERSION: &'static str = "2023-06-01";

    pub fn new(settings: &ReviseSettings) -> Result<Self> {
        Ok(Self {
            client: http_client(settings)?,
            settings: settings.clone(),
            api_key: require_key(settings, "ANTHROPIC_API_KEY")?,
        })
    }
}

impl fmt::Debug for AnthropicReviser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicReviser")
            .field("model", &self.settings.model())
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl Reviser for AnthropicReviser {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn revise(&self, text: &str) -> Result<String> {
        let request = MessagesRequest {
            model: self.settings.model(),
            system: &self.settings.system_prompt,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            messages: vec![ChatMessage { role: "user", content: text }],
        };

        let builder = self
            .client
            .post(format!("{}/messages", self.settings.base_url()))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", Self::API_VERSION)
            .json(&request);
        let response: MessagesResponse = send_json(builder, self.settings.timeout).await?;

        response.into_text()
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

/// Local Ollama server.
#[derive(Debug)]
pub struct OllamaReviser {
    client: Client,
    settings: ReviseSettings,
}

impl OllamaReviser {
    pub fn new(settings: &ReviseSettings) -> Result<Self> {
        Ok(Self { client: http_client(settings)?, settings: settings.clone() })
    }
}

#[async_trait]
impl Reviser for OllamaReviser {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn revise(&self, text: &str) -> Result<String> {
        let request = GenerateRequest {
            model: self.settings.model(),
            system: &self.settings.system_prompt,
            prompt: text,
            stream: false,
        };

        let builder = self.client.post(format!("{}/api/generate", self.settings.base_url())).json(&request);
        let response: GenerateResponse = send_json(builder, self.settings.timeout).await?;

        non_empty(response.response)
    }
}

/// Returns its input trimmed; used for dry runs and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoReviser;

#[async_trait]
impl Reviser for EchoReviser {
    fn name(&self) -> &str {
        "echo"
    }

    async fn revise(&self, text: &str) -> Result<String> {
        non_empty(Some(text.to_string()))
    }
}
