use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use ww_core::{ArticleStorage, Candidate, Error, StoredArticle};

use crate::extract::ContentExtractor;

/// Dedup and commit stage: one candidate at a time, in input order.
pub struct Persister {
    articles: Arc<dyn ArticleStorage>,
    extractor: ContentExtractor,
    pause: Duration,
}

impl Persister {
    pub fn new(articles: Arc<dyn ArticleStorage>, extractor: ContentExtractor, pause: Duration) -> Self {
        Self {
            articles,
            extractor,
            pause,
        }
    }

    /// Returns how many candidates were newly stored.
    pub async fn persist_new(&self, candidates: Vec<Candidate>) -> usize {
        let mut new_count = 0;

        for candidate in candidates {
            match self.articles.find_by_url(&candidate.url).await {
                Ok(Some(_)) => {
                    debug!(url = %candidate.url, "Already stored");
                    continue;
                }
                Ok(None) => {}
                Err(e) => {
                    error!(url = %candidate.url, error = %e, "Failed to check for existing article");
                    continue;
                }
            }

            let content = self.extractor.extract_content(&candidate.url).await;
            let article = StoredArticle::from_candidate(candidate, content, Utc::now());

            match self.articles.insert_article(&article).await {
                Ok(id) => {
                    new_count += 1;
                    info!(id, title = %article.title, "New article saved");
                    if !self.pause.is_zero() {
                        tokio::time::sleep(self.pause).await;
                    }
                }
                Err(Error::Duplicate(url)) => debug!(%url, "Stored concurrently, skipping"),
                Err(e) => error!(url = %article.url, error = %e, "Failed to save article"),
            }
        }

        new_count
    }
}
