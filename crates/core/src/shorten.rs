//! URL shortening through public services.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::{DigestorError, Result};

/// Supported shortening services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShortenService {
    #[default]
    TinyUrl,
    IsGd,
    VGd,
    /// Requires an access token.
    Bitly,
}

impl fmt::Display for ShortenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShortenService::TinyUrl => "tinyurl",
            ShortenService::IsGd => "isgd",
            ShortenService::VGd => "vgd",
            ShortenService::Bitly => "bitly",
        };
        f.write_str(name)
    }
}

impl FromStr for ShortenService {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tinyurl" => Ok(ShortenService::TinyUrl),
            "isgd" | "is.gd" => Ok(ShortenService::IsGd),
            "vgd" | "v.gd" => Ok(ShortenService::VGd),
            "bitly" => Ok(ShortenService::Bitly),
            _ => Err(format!("Invalid service: {}. Valid options: tinyurl, isgd, vgd, bitly", s)),
        }
    }
}

#[derive(Serialize)]
struct BitlyRequest<'a> {
    long_url: &'a str,
}

#[derive(Deserialize)]
struct BitlyResponse {
    link: Option<String>,
    message: Option<String>,
}

/// Stateless URL shortener.
#[derive(Debug, Clone)]
pub struct Shortener {
    client: Client,
    bitly_token: Option<String>,
}

impl Shortener {
    pub fn new(bitly_token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("digestor-shortener/0.1")
            .build()
            .map_err(DigestorError::HttpError)?;

        Ok(Self { client, bitly_token })
    }

    /// Shortens `long_url` with `service`.
    ///
    /// # Errors
    ///
    /// [`DigestorError::InvalidUrl`] for a non-http(s) input,
    /// [`DigestorError::ShortenError`] when the service fails or answers
    /// with something that is not one of its short links.
    pub async fn shorten(&self, long_url: &str, service: ShortenService) -> Result<String> {
        let parsed = Url::parse(long_url).map_err(|e| DigestorError::InvalidUrl(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DigestorError::InvalidUrl(format!("not an http(s) URL: {}", long_url)));
        }

        let answer = match service {
            ShortenService::TinyUrl => {
                let endpoint = format!("https://tinyurl.com/api-create.php?url={}", urlencoding::encode(long_url));
                self.plain_text(self.client.get(endpoint), service).await?
            }
            ShortenService::IsGd => {
                let request = self.client.post("https://is.gd/create.php").form(&[("format", "simple"), ("url", long_url)]);
                self.plain_text(request, service).await?
            }
            ShortenService::VGd => {
                let request = self.client.post("https://v.gd/create.php").form(&[("format", "simple"), ("url", long_url)]);
                self.plain_text(request, service).await?
            }
            ShortenService::Bitly => self.bitly(long_url).await?,
        };

        validate_short_url(&answer, service)
    }

    /// Shortens `long_url`, falling back to it unchanged on any failure.
    pub async fn shorten_or_original(&self, long_url: &str, service: ShortenService) -> String {
        match self.shorten(long_url, service).await {
            Ok(short) => short,
            Err(err) => {
                warn!(service = %service, error = %err, "shortening failed, keeping the long URL");
                long_url.to_string()
            }
        }
    }

    async fn plain_text(&self, request: reqwest::RequestBuilder, service: ShortenService) -> Result<String> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(DigestorError::ShortenError(format!("{} answered {}: {}", service, status, body.trim())));
        }
        Ok(body.trim().to_string())
    }

    async fn bitly(&self, long_url: &str) -> Result<String> {
        let token = self
            .bitly_token
            .as_deref()
            .ok_or_else(|| DigestorError::ConfigError("bitly requires an access token (BITLY_TOKEN)".to_string()))?;

        let response = self
            .client
            .post("https://api-ssl.bitly.com/v4/shorten")
            .bearer_auth(token)
            .json(&BitlyRequest { long_url })
            .send()
            .await?;
        let status = response.status();
        let body: BitlyResponse = response.json().await?;

        match body.link {
            Some(link) if status.is_success() => Ok(link),
            _ => Err(DigestorError::ShortenError(format!(
                "bitly answered {}: {}",
                status,
                body.message.unwrap_or_else(|| "no link in response".to_string())
            ))),
        }
    }
}

/// Checks that a service answer is one of that service's short links.
fn validate_short_url(answer: &str, service: ShortenService) -> Result<String> {
    let host = Url::parse(answer).ok().and_then(|url| url.host_str().map(str::to_lowercase));
    let valid = match (service, host.as_deref()) {
        (ShortenService::TinyUrl, Some(host)) => host == "tinyurl.com" || host.ends_with(".tinyurl.com"),
        (ShortenService::IsGd, Some(host)) => host == "is.gd",
        (ShortenService::VGd, Some(host)) => host == "v.gd",
        (ShortenService::Bitly, Some(_)) => true,
        (_, None) => false,
    };

    if valid {
        Ok(answer.to_string())
    } else {
        Err(DigestorError::ShortenError(format!("{} returned an unexpected answer: {}", service, answer)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_from_str() {
        assert_eq!("TinyURL".parse::<ShortenService>(), Ok(ShortenService::TinyUrl));
        assert_eq!("is.gd".parse::<ShortenService>(), Ok(ShortenService::IsGd));
        assert!("goo.gl".parse::<ShortenService>().is_err());
    }

    #[test]
    fn test_validate_short_url() {
        assert!(validate_short_url("https://tinyurl.com/abc123", ShortenService::TinyUrl).is_ok());
        assert!(validate_short_url("https://is.gd/xyz", ShortenService::IsGd).is_ok());
        assert!(validate_short_url("https://v.gd/xyz", ShortenService::VGd).is_ok());
        assert!(validate_short_url("https://bit.ly/xyz", ShortenService::Bitly).is_ok());
    }

    #[test]
    fn test_validate_rejects_error_answers() {
        assert!(validate_short_url("Error: Please enter a valid URL", ShortenService::IsGd).is_err());
        assert!(validate_short_url("https://example.com/long", ShortenService::TinyUrl).is_err());
        assert!(validate_short_url("https://is.gd/xyz", ShortenService::VGd).is_err());
    }

    #[tokio::test]
    async fn test_shorten_rejects_invalid_input() {
        let shortener = Shortener::new(None).unwrap();
        let result = shortener.shorten("not a url", ShortenService::TinyUrl).await;
        assert!(matches!(result, Err(DigestorError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_bitly_requires_token() {
        let shortener = Shortener::new(None).unwrap();
        let result = shortener.shorten("https://example.com/a", ShortenService::Bitly).await;
        assert!(matches!(result, Err(DigestorError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_shorten_or_original_falls_back() {
        let shortener = Shortener::new(None).unwrap();
        let url = "https://example.com/a";
        assert_eq!(shortener.shorten_or_original(url, ShortenService::Bitly).await, url);
    }
}
