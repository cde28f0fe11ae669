//! Publishing posts and threads.
//!
//! [`Publisher`] is the seam to the social platform. [`XPublisher`] talks to
//! the X API v2; [`DryRunPublisher`] only logs. [`RetryPolicy`] re-runs an
//! operation that failed with a transient error.

use std::fmt;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::PublishSettings;
use crate::fit::POST_LIMIT;
use crate::{DigestorError, Result};

/// Longest wait for a rate-limit window to reset.
const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(15 * 60);

/// Platform identifier of a published post.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub String);

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Publishes short posts.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publishes one post, optionally as a reply.
    async fn post(&self, text: &str, reply_to: Option<&PostId>) -> Result<PostId>;

    /// Publishes a chain of posts, each replying to the previous one.
    ///
    /// Every post runs under `retry`. The chain stops at the first post that
    /// still fails; the returned [`ThreadError`] carries the ids already
    /// published so the caller can report a partial thread.
    async fn post_thread(&self, texts: &[String], retry: &RetryPolicy) -> std::result::Result<Vec<PostId>, ThreadError> {
        if texts.is_empty() {
            let error = DigestorError::PreconditionError("a thread needs at least one post".to_string());
            return Err(ThreadError { error, published: Vec::new() });
        }

        let mut ids: Vec<PostId> = Vec::with_capacity(texts.len());
        for text in texts {
            let reply_to = ids.last().cloned();
            match retry.run(|| self.post(text, reply_to.as_ref())).await {
                Ok(id) => ids.push(id),
                Err(error) => return Err(ThreadError { error, published: ids }),
            }
        }
        Ok(ids)
    }
}

/// A thread that stopped part way through.
#[derive(Debug)]
pub struct ThreadError {
    pub error: DigestorError,
    /// Posts that went out before the failure, in order.
    pub published: Vec<PostId>,
}

impl fmt::Display for ThreadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} post(s) already published)", self.error, self.published.len())
    }
}

impl std::error::Error for ThreadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

fn check_length(text: &str) -> Result<()> {
    let length = text.chars().count();
    if length > POST_LIMIT {
        return Err(DigestorError::PostTooLong { length, limit: POST_LIMIT });
    }
    Ok(())
}

/// Retry settings for a fallible async operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, delay: Duration::from_secs(3) }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), delay }
    }

    /// Runs `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// Only errors for which [`DigestorError::is_transient`] holds are retried.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < attempts => {
                    warn!(attempt, max_attempts = attempts, error = %err, "attempt failed, retrying");
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[derive(Serialize)]
struct CreatePost<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply: Option<ReplyTo<'a>>,
}

#[derive(Serialize)]
struct ReplyTo<'a> {
    in_reply_to_tweet_id: &'a str,
}

#[derive(Deserialize)]
struct CreatePostResponse {
    data: CreatedPost,
}

#[derive(Deserialize)]
struct CreatedPost {
    id: String,
}

#[derive(Deserialize)]
struct ApiProblem {
    detail: Option<String>,
    title: Option<String>,
}

/// X API v2 publisher using an OAuth 2.0 user-context bearer token.
pub struct XPublisher {
    client: Client,
    settings: PublishSettings,
    token: String,
}

impl XPublisher {
    /// # Errors
    ///
    /// [`DigestorError::ConfigError`] when no access token is configured.
    pub fn new(settings: &PublishSettings) -> Result<Self> {
        let token = settings.access_token.clone().ok_or_else(|| {
            DigestorError::ConfigError("X access token not found. Set the X_ACCESS_TOKEN environment variable".to_string())
        })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout))
            .build()
            .map_err(DigestorError::HttpError)?;

        Ok(Self { client, settings: settings.clone(), token })
    }

    async fn send(&self, body: &CreatePost<'_>) -> Result<Response> {
        self.client
            .post(format!("{}/2/tweets", self.settings.api_base.trim_end_matches('/')))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DigestorError::Timeout { timeout: self.settings.timeout }
                } else {
                    DigestorError::HttpError(e)
                }
            })
    }
}

impl fmt::Debug for XPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XPublisher")
            .field("api_base", &self.settings.api_base)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl Publisher for XPublisher {
    async fn post(&self, text: &str, reply_to: Option<&PostId>) -> Result<PostId> {
        check_length(text)?;

        let body = CreatePost { text, reply: reply_to.map(|id| ReplyTo { in_reply_to_tweet_id: &id.0 }) };
        let mut response = self.send(&body).await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS && self.settings.wait_on_rate_limit {
            let wait = rate_limit_wait(&response, SystemTime::now());
            warn!(seconds = wait.as_secs(), "rate limited, waiting for the window to reset");
            tokio::time::sleep(wait).await;
            response = self.send(&body).await?;
        }

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            return Err(DigestorError::PublishRejected { status: status.as_u16(), message: problem_message(&raw) });
        }

        let created: CreatePostResponse = response.json().await?;
        info!(id = %created.data.id, chars = text.chars().count(), "posted");
        Ok(PostId(created.data.id))
    }
}

/// Time until the `x-rate-limit-reset` epoch, capped; one minute when the header is absent.
fn rate_limit_wait(response: &Response, now: SystemTime) -> Duration {
    let reset = response
        .headers()
        .get("x-rate-limit-reset")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok());

    match reset {
        Some(reset) => {
            let now = now.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or_default();
            Duration::from_secs(reset.saturating_sub(now).saturating_add(1)).min(MAX_RATE_LIMIT_WAIT)
        }
        None => Duration::from_secs(60),
    }
}

fn problem_message(raw: &str) -> String {
    match serde_json::from_str::<ApiProblem>(raw) {
        Ok(ApiProblem { detail: Some(detail), .. }) => detail,
        Ok(ApiProblem { title: Some(title), .. }) => title,
        _ => raw.trim().to_string(),
    }
}

/// One post recorded by [`DryRunPublisher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DryRunPost {
    pub id: PostId,
    pub reply_to: Option<PostId>,
    pub text: String,
}

/// Logs posts instead of publishing them, handing out sequential ids.
#[derive(Debug, Default)]
pub struct DryRunPublisher {
    next_id: AtomicU64,
    posts: Mutex<Vec<DryRunPost>>,
}

impl DryRunPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything posted so far, in order.
    pub fn posts(&self) -> Vec<DryRunPost> {
        self.posts.lock().map(|posts| posts.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Publisher for DryRunPublisher {
    async fn post(&self, text: &str, reply_to: Option<&PostId>) -> Result<PostId> {
        check_length(text)?;

        let id = PostId(format!("dry-run-{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1));
        info!(id = %id, reply_to = ?reply_to.map(|r| &r.0), text, "dry run post");

        if let Ok(mut posts) = self.posts.lock() {
            posts.push(DryRunPost { id: id.clone(), reply_to: reply_to.cloned(), text: text.to_string() });
        }
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[tokio::test]
    async fn test_dry_run_post_ids_are_sequential() {
        let publisher = DryRunPublisher::new();

        let first = publisher.post("first", None).await.unwrap();
        let second = publisher.post("second", Some(&first)).await.unwrap();

        assert_eq!(first, PostId("dry-run-1".to_string()));
        assert_eq!(second, PostId("dry-run-2".to_string()));
        assert_eq!(publisher.posts()[1].reply_to, Some(first));
    }

    #[tokio::test]
    async fn test_post_too_long_is_rejected() {
        let publisher = DryRunPublisher::new();
        let result = publisher.post(&"x".repeat(281), None).await;

        assert!(matches!(result, Err(DigestorError::PostTooLong { length: 281, limit: 280 })));
        assert!(publisher.posts().is_empty());
    }

    #[tokio::test]
    async fn test_post_thread_chains_replies() {
        let publisher = DryRunPublisher::new();
        let texts = vec!["one".to_string(), "two".to_string(), "three".to_string()];

        let ids = publisher.post_thread(&texts, &RetryPolicy::default()).await.unwrap();
        let posts = publisher.posts();

        assert_eq!(ids.len(), 3);
        assert_eq!(posts[0].reply_to, None);
        assert_eq!(posts[1].reply_to.as_ref(), Some(&ids[0]));
        assert_eq!(posts[2].reply_to.as_ref(), Some(&ids[1]));
    }

    #[tokio::test]
    async fn test_post_thread_empty_is_error() {
        let publisher = DryRunPublisher::new();
        let err = publisher.post_thread(&[], &RetryPolicy::default()).await.unwrap_err();
        assert!(matches!(err.error, DigestorError::PreconditionError(_)));
        assert!(err.published.is_empty());
    }

    /// Rejects "busy" once with 503, and rejects "bad" every time with 400.
    #[derive(Default)]
    struct ChoosyPublisher {
        inner: DryRunPublisher,
        busy_seen: AtomicU32,
    }

    #[async_trait]
    impl Publisher for ChoosyPublisher {
        async fn post(&self, text: &str, reply_to: Option<&PostId>) -> Result<PostId> {
            if text == "bad" {
                return Err(DigestorError::PublishRejected { status: 400, message: "duplicate".to_string() });
            }
            if text == "busy" && self.busy_seen.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(DigestorError::PublishRejected { status: 503, message: "busy".to_string() });
            }
            self.inner.post(text, reply_to).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_post_thread_retries_each_post() {
        let publisher = ChoosyPublisher::default();
        let texts = vec!["one".to_string(), "busy".to_string()];

        let ids = publisher.post_thread(&texts, &RetryPolicy::default()).await.unwrap();

        assert_eq!(ids.len(), 2);
        assert_eq!(publisher.busy_seen.load(Ordering::SeqCst), 2);
        assert_eq!(publisher.inner.posts()[1].reply_to.as_ref(), Some(&ids[0]));
    }

    #[tokio::test]
    async fn test_post_thread_reports_partial_thread() {
        let publisher = ChoosyPublisher::default();
        let texts = vec!["one".to_string(), "bad".to_string(), "three".to_string()];

        let err = publisher.post_thread(&texts, &RetryPolicy::default()).await.unwrap_err();

        assert!(matches!(err.error, DigestorError::PublishRejected { status: 400, .. }));
        assert_eq!(err.published, vec![PostId("dry-run-1".to_string())]);
        assert_eq!(publisher.inner.posts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_from_transient_error() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let policy = RetryPolicy::default();

        let result = policy
            .run(move || async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(DigestorError::PublishRejected { status: 503, message: "busy".to_string() })
                } else {
                    Ok("posted")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "posted");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let policy = RetryPolicy::new(3, Duration::from_secs(3));

        let result: Result<()> = policy
            .run(move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(DigestorError::Timeout { timeout: 30 })
            })
            .await;

        assert!(matches!(result, Err(DigestorError::Timeout { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_does_not_repeat_permanent_error() {
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result: Result<()> = RetryPolicy::default()
            .run(move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(DigestorError::PostTooLong { length: 300, limit: 280 })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_x_publisher_requires_token() {
        let result = XPublisher::new(&PublishSettings::default());
        assert!(matches!(result, Err(DigestorError::ConfigError(_))));
    }

    #[test]
    fn test_create_post_body() {
        let id = PostId("123".to_string());
        let body = CreatePost { text: "hi", reply: Some(ReplyTo { in_reply_to_tweet_id: &id.0 }) };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["reply"]["in_reply_to_tweet_id"], "123");

        let body = CreatePost { text: "hi", reply: None };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("reply").is_none());
    }

    #[test]
    fn test_problem_message() {
        assert_eq!(problem_message(r#"{"title":"Forbidden","detail":"duplicate content"}"#), "duplicate content");
        assert_eq!(problem_message(r#"{"title":"Too Many Requests"}"#), "Too Many Requests");
        assert_eq!(problem_message("  plain body "), "plain body");
    }
}
