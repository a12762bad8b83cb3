use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};
use ww_core::{Candidate, HttpFetcher, RelevanceScorer, Result};

use super::{tolerate_transient, Source};

pub mod bing;
pub mod google;

pub use bing::BingNews;
pub use google::GoogleNews;

/// One result block lifted from a search engine's news page, before screening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    /// Absolute, unwrapped target url.
    pub link: String,
    pub snippet: String,
    pub source: String,
}

/// Extraction rules for one engine's news results page.
pub trait SearchEngine: Send + Sync {
    fn name(&self) -> &str;

    fn results_url(&self, query: &str) -> String;

    fn parse_results_page(&self, html: &str) -> Vec<SearchHit>;
}

pub(crate) fn encode_query(query: &str) -> String {
    url::form_urlencoded::byte_serialize(query.as_bytes()).collect()
}

/// Runs one query against one engine.
pub struct SearchSource {
    engine: Arc<dyn SearchEngine>,
    query: String,
    fetcher: Arc<dyn HttpFetcher>,
    scorer: RelevanceScorer,
}

impl SearchSource {
    pub fn new(
        engine: Arc<dyn SearchEngine>,
        query: impl Into<String>,
        fetcher: Arc<dyn HttpFetcher>,
        scorer: RelevanceScorer,
    ) -> Self {
        Self {
            engine,
            query: query.into(),
            fetcher,
            scorer,
        }
    }

    pub fn screen_hits(&self, hits: Vec<SearchHit>, cap: usize) -> Vec<Candidate> {
        hits.into_iter()
            .filter_map(|hit| {
                let candidate = self
                    .scorer
                    .screen(&hit.title, &hit.link, &hit.source, &hit.snippet, None);
                if candidate.is_none() {
                    debug!(title = %hit.title, "Skipping search result");
                }
                candidate
            })
            .take(cap)
            .collect()
    }
}

#[async_trait]
impl Source for SearchSource {
    fn kind(&self) -> &str {
        self.engine.name()
    }

    fn target(&self) -> &str {
        &self.query
    }

    async fn fetch_candidates(&self, cap: usize) -> Result<Vec<Candidate>> {
        let url = self.engine.results_url(&self.query);
        let html = match self.fetcher.get_text(&url).await {
            Ok(html) => html,
            Err(e) => return tolerate_transient(self, Err(e)),
        };
        let hits = self.engine.parse_results_page(&html);
        let candidates = self.screen_hits(hits, cap);
        info!(
            engine = self.engine.name(),
            query = %self.query,
            relevant = candidates.len(),
            "Scraped search results"
        );
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::FakeFetcher;

    fn hit(title: &str, link: &str) -> SearchHit {
        SearchHit {
            title: title.to_string(),
            link: link.to_string(),
            snippet: String::new(),
            source: "Bing News".to_string(),
        }
    }

    #[test]
    fn test_query_encoding() {
        assert_eq!(encode_query("sewage spill & EPA"), "sewage+spill+%26+EPA");
    }

    #[test]
    fn test_screen_hits_filters_then_caps() {
        let engine: Arc<dyn SearchEngine> = Arc::new(BingNews::new().unwrap());
        let source = SearchSource::new(
            engine,
            "sewage spill",
            Arc::new(FakeFetcher::new()),
            RelevanceScorer::default(),
        );
        let hits = vec![
            hit("Bakery opens", "https://a.example/1"),
            hit("Sewage leak", "https://a.example/2"),
            hit("Sewage overflow", ""),
            hit("Wastewater fine", "https://a.example/3"),
            hit("Effluent alarm", "https://a.example/4"),
        ];
        let candidates = source.screen_hits(hits, 2);
        let urls: Vec<&str> = candidates.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a.example/2", "https://a.example/3"]);
        assert!(candidates.iter().all(|c| c.published_at.is_none()));
    }

    #[tokio::test]
    async fn test_fetches_engine_url() {
        let engine = Arc::new(GoogleNews::new().unwrap());
        let url = engine.results_url("sewage spill");
        let html = r#"<div class="SoaBEf"><a href="https://news.example/x"><div class="MBeuO">Sewage spill fouls river</div></a></div>"#;
        let fetcher = Arc::new(FakeFetcher::new().page(&url, html));
        let source = SearchSource::new(engine, "sewage spill", fetcher.clone(), RelevanceScorer::default());

        let candidates = source.fetch_candidates(10).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].source, "Google News");
        assert_eq!(fetcher.requested(), vec![url]);
    }

    #[tokio::test]
    async fn test_missing_results_page_yields_empty_list() {
        let engine = Arc::new(GoogleNews::new().unwrap());
        let source = SearchSource::new(engine, "sewage spill", Arc::new(FakeFetcher::new()), RelevanceScorer::default());
        assert!(source.fetch_candidates(10).await.unwrap().is_empty());
    }
}
