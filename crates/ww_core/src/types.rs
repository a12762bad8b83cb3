use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Longest summary kept on a candidate, in characters.
pub const MAX_SUMMARY_CHARS: usize = 1000;

/// Longest extracted body kept on a stored article, before the ellipsis marker.
pub const MAX_CONTENT_CHARS: usize = 5000;

/// An article surfaced by a source, not yet checked against storage.
///
/// Sources only build candidates through [`RelevanceScorer::screen`], so every
/// candidate has a title, a url and a passing relevance score.
///
/// [`RelevanceScorer::screen`]: crate::relevance::RelevanceScorer::screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub title: String,
    pub url: String,
    pub source: String,
    pub summary: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// A persisted, deduplicated article. `url` is unique across the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredArticle {
    /// Assigned by the store; ignored on insert.
    pub id: i64,
    pub title: String,
    pub url: String,
    pub source: String,
    pub summary: String,
    pub content: String,
    pub published_at: Option<DateTime<Utc>>,
    pub scraped_at: DateTime<Utc>,
    pub is_relevant: bool,
    pub processed_downstream: bool,
}

impl StoredArticle {
    pub fn from_candidate(candidate: Candidate, content: String, scraped_at: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            title: candidate.title,
            url: candidate.url,
            source: candidate.source,
            summary: candidate.summary,
            content,
            published_at: candidate.published_at,
            scraped_at,
            is_relevant: true,
            processed_downstream: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Partial,
    Failed,
}

impl RunStatus {
    pub fn derive(error_count: usize, new_count: usize) -> Self {
        match (error_count, new_count) {
            (0, _) => RunStatus::Success,
            (_, 0) => RunStatus::Failed,
            _ => RunStatus::Partial,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(RunStatus::Success),
            "partial" => Ok(RunStatus::Partial),
            "failed" => Ok(RunStatus::Failed),
            other => Err(Error::Parse(format!("unknown run status: {}", other))),
        }
    }
}

/// One audit entry per pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: i64,
    pub ran_at: DateTime<Utc>,
    pub articles_found: usize,
    pub articles_new: usize,
    pub errors: Vec<String>,
    pub status: RunStatus,
}

impl RunRecord {
    pub fn from_summary(summary: &RunSummary, ran_at: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            ran_at,
            articles_found: summary.found,
            articles_new: summary.new,
            errors: summary.errors.clone(),
            status: RunStatus::derive(summary.errors.len(), summary.new),
        }
    }
}

/// What a completed run hands back to whoever triggered it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub found: usize,
    pub new: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlogStatus {
    Draft,
    Ready,
    Published,
    Failed,
}

impl BlogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlogStatus::Draft => "draft",
            BlogStatus::Ready => "ready",
            BlogStatus::Published => "published",
            BlogStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for BlogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlogStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(BlogStatus::Draft),
            "ready" => Ok(BlogStatus::Ready),
            "published" => Ok(BlogStatus::Published),
            "failed" => Ok(BlogStatus::Failed),
            other => Err(Error::Parse(format!("unknown blog status: {}", other))),
        }
    }
}

/// Structured output of the blog generator, before it is stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlogDraft {
    pub headline: String,
    pub meta_description: String,
    pub tags: Vec<String>,
    pub featured_image_prompt: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlogPost {
    pub id: i64,
    pub article_id: Option<i64>,
    pub headline: String,
    pub meta_description: String,
    pub content: String,
    pub tags: Vec<String>,
    pub featured_image_prompt: String,
    pub featured_image_url: String,
    pub status: BlogStatus,
    pub cms_post_id: Option<i64>,
    pub cms_url: String,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl BlogPost {
    pub fn from_draft(draft: BlogDraft, article_id: Option<i64>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            article_id,
            headline: draft.headline,
            meta_description: draft.meta_description,
            content: draft.content,
            tags: draft.tags,
            featured_image_prompt: draft.featured_image_prompt,
            featured_image_url: String::new(),
            status: BlogStatus::Draft,
            cms_post_id: None,
            cms_url: String::new(),
            created_at,
            published_at: None,
        }
    }
}
