use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use feed_rs::parser;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;
use ww_core::{Candidate, Error, HttpFetcher, RelevanceScorer, Result};

use super::utils::strip_html;
use super::{tolerate_transient, Source};

/// Entries published longer ago than this are skipped. Undated entries are kept.
pub const MAX_ENTRY_AGE_DAYS: i64 = 7;

pub struct FeedSource {
    url: String,
    fetcher: Arc<dyn HttpFetcher>,
    scorer: RelevanceScorer,
}

impl FeedSource {
    pub fn new(url: impl Into<String>, fetcher: Arc<dyn HttpFetcher>, scorer: RelevanceScorer) -> Self {
        Self {
            url: url.into(),
            fetcher,
            scorer,
        }
    }
}

/// Host of the feed url, used as the source label.
pub fn feed_label(feed_url: &str) -> String {
    Url::parse(feed_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Parse an RSS or Atom document into screened candidates.
///
/// `cap` bounds the raw entry list, before any filtering.
pub fn parse_feed(
    body: &str,
    feed_url: &str,
    cap: usize,
    now: DateTime<Utc>,
    scorer: &RelevanceScorer,
) -> Result<Vec<Candidate>> {
    let feed = parser::parse(body.as_bytes())
        .map_err(|e| Error::Parse(format!("Failed to parse feed: {}", e)))?;

    if feed.entries.is_empty() {
        warn!(feed = %feed_url, "Feed parsed but has no entries");
        return Ok(Vec::new());
    }

    let source = feed_label(feed_url);
    let oldest = now - Duration::days(MAX_ENTRY_AGE_DAYS);
    let mut candidates = Vec::new();

    for entry in feed.entries.into_iter().take(cap) {
        let title = entry.title.map(|t| t.content).unwrap_or_default();
        let link = entry.links.first().map(|l| l.href.clone()).unwrap_or_default();
        let summary = entry
            .summary
            .map(|s| s.content)
            .or_else(|| entry.content.and_then(|c| c.body))
            .map(|s| strip_html(&s))
            .unwrap_or_default();
        let published_at = entry.published.or(entry.updated);

        if let Some(published) = published_at {
            if published < oldest {
                debug!(%link, %published, "Skipping stale entry");
                continue;
            }
        }

        match scorer.screen(&title, &link, &source, &summary, published_at) {
            Some(candidate) => candidates.push(candidate),
            None => debug!(%title, "Skipping entry"),
        }
    }

    Ok(candidates)
}

#[async_trait]
impl Source for FeedSource {
    fn kind(&self) -> &str {
        "RSS"
    }

    fn target(&self) -> &str {
        &self.url
    }

    async fn fetch_candidates(&self, cap: usize) -> Result<Vec<Candidate>> {
        let result = async {
            let body = self.fetcher.get_text(&self.url).await?;
            let candidates = parse_feed(&body, &self.url, cap, Utc::now(), &self.scorer)?;
            info!(feed = %self.url, relevant = candidates.len(), "Parsed feed");
            Ok::<_, Error>(candidates)
        }
        .await;
        tolerate_transient(self, result)
    }
}
