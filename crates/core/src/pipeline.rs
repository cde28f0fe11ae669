//! Turning extracted newsletter sections into published posts.
//!
//! For each article: split the description into chunks, revise every chunk
//! into a post, trim revisions that still exceed the limit, then publish one
//! post or a thread. Failures are per chunk or per article; a run never
//! aborts because of one article.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::article::ArticleRecord;
use crate::config::PipelineSettings;
use crate::fit::{self, CHUNK_BUDGET, POST_LIMIT};
use crate::publish::{PostId, Publisher, RetryPolicy, ThreadError};
use crate::revise::Reviser;
use crate::section::{Section, SectionMap};
use crate::Result;

/// Tunables for a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Maximum characters per chunk sent for revision.
    pub chunk_budget: usize,
    /// Maximum characters per published post.
    pub post_limit: usize,
    /// Pause between published articles.
    pub pause: Duration,
    pub retry: RetryPolicy,
    /// Sections to publish; all of them when empty.
    pub sections: Vec<Section>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_budget: CHUNK_BUDGET,
            post_limit: POST_LIMIT,
            pause: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            sections: Vec::new(),
        }
    }
}

impl From<&PipelineSettings> for PipelineConfig {
    fn from(settings: &PipelineSettings) -> Self {
        Self {
            chunk_budget: settings.chunk_budget,
            post_limit: settings.post_limit.min(POST_LIMIT),
            pause: Duration::from_secs(settings.pause_secs),
            retry: RetryPolicy::new(settings.retry_attempts, Duration::from_secs(settings.retry_delay_secs)),
            sections: settings.sections.clone(),
        }
    }
}

/// An article that reached the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostedArticle {
    pub section: Section,
    pub title: String,
    pub url: String,
    pub posts: Vec<PostId>,
    /// Chunks dropped because revision or trimming failed.
    pub dropped_chunks: usize,
}

/// Why an article was not published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    EmptyDescription,
    /// Every chunk failed revision or trimming.
    NoUsableChunks { dropped_chunks: usize },
    /// Publishing failed after retries; `published` lists posts that went out before the failure.
    PublishFailed { message: String, published: Vec<PostId> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedArticle {
    pub section: Section,
    pub title: String,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Outcome of a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    pub posted: Vec<PostedArticle>,
    pub skipped: Vec<SkippedArticle>,
}

impl PipelineReport {
    /// Number of posts published across all articles.
    pub fn post_count(&self) -> usize {
        self.posted.iter().map(|article| article.posts.len()).sum()
    }
}

/// Drives revision and publishing for a set of extracted sections.
pub struct Pipeline<'a> {
    reviser: &'a dyn Reviser,
    publisher: &'a dyn Publisher,
    config: PipelineConfig,
}

impl<'a> Pipeline<'a> {
    pub fn new(reviser: &'a dyn Reviser, publisher: &'a dyn Publisher, config: PipelineConfig) -> Self {
        Self { reviser, publisher, config }
    }

    /// Publishes every article of the selected sections, in canonical order.
    pub async fn run(&self, sections: &SectionMap) -> PipelineReport {
        let mut report = PipelineReport::default();
        let mut published_any = false;

        for (section, record) in sections.records() {
            if !self.config.sections.is_empty() && !self.config.sections.contains(&section) {
                continue;
            }
            if !record.has_description() {
                debug!(title = %record.title, "skipping article without description");
                report.skipped.push(skipped(section, record, SkipReason::EmptyDescription));
                continue;
            }

            let (posts, dropped_chunks) = self.prepare_posts(&record.description).await;
            if posts.is_empty() {
                warn!(title = %record.title, dropped_chunks, "no usable chunks, skipping article");
                report.skipped.push(skipped(section, record, SkipReason::NoUsableChunks { dropped_chunks }));
                continue;
            }

            if published_any && !self.config.pause.is_zero() {
                tokio::time::sleep(self.config.pause).await;
            }
            published_any = true;

            match self.publisher.post_thread(&posts, &self.config.retry).await {
                Ok(ids) => {
                    info!(section = %section, title = %record.title, posts = ids.len(), "published article");
                    report.posted.push(PostedArticle {
                        section,
                        title: record.title.clone(),
                        url: record.url.clone(),
                        posts: ids,
                        dropped_chunks,
                    });
                }
                Err(ThreadError { error, published }) => {
                    warn!(title = %record.title, error = %error, "publishing failed, skipping article");
                    let reason = SkipReason::PublishFailed { message: error.to_string(), published };
                    report.skipped.push(skipped(section, record, reason));
                }
            }
        }

        report
    }

    /// Splits, revises and trims a description into publishable posts.
    ///
    /// Returns the posts and the number of chunks dropped along the way.
    pub async fn prepare_posts(&self, description: &str) -> (Vec<String>, usize) {
        let chunks = fit::split(description, self.config.chunk_budget);
        let mut posts = Vec::with_capacity(chunks.len());
        let mut dropped = 0;

        for chunk in &chunks {
            match self.prepare_chunk(chunk).await {
                Ok(post) => posts.push(post),
                Err(err) => {
                    warn!(error = %err, "dropping chunk");
                    dropped += 1;
                }
            }
        }

        (posts, dropped)
    }

    async fn prepare_chunk(&self, chunk: &str) -> Result<String> {
        let revised = self.reviser.revise(chunk).await?;
        if revised.chars().count() <= self.config.post_limit {
            return Ok(revised);
        }
        debug!(chars = revised.chars().count(), "revision over the limit, trimming");
        fit::trim(&revised, self.config.post_limit)
    }
}

fn skipped(section: Section, record: &ArticleRecord, reason: SkipReason) -> SkippedArticle {
    SkippedArticle { section, title: record.title.clone(), reason }
}
