use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use ww_core::{
    ArticleStorage, Config, HttpFetcher, RelevanceScorer, Result, RunRecord, RunSummary,
    SharedConfig,
};

use crate::extract::ContentExtractor;
use crate::persist::Persister;
use crate::scrapers::{BingNews, FeedSource, GoogleNews, SearchEngine, SearchSource, Source};

/// Pauses between requests so no single host gets hammered.
#[derive(Debug, Clone, Copy)]
pub struct Politeness {
    pub after_feed: Duration,
    pub after_search: Duration,
    pub after_candidate: Duration,
}

impl Default for Politeness {
    fn default() -> Self {
        Self {
            after_feed: Duration::from_secs(2),
            after_search: Duration::from_secs(3),
            after_candidate: Duration::from_secs(1),
        }
    }
}

impl Politeness {
    pub fn none() -> Self {
        Self {
            after_feed: Duration::ZERO,
            after_search: Duration::ZERO,
            after_candidate: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum RunOutcome {
    Completed(RunSummary),
    /// Another run was already in flight.
    Skipped,
}

/// A source plus the pause that follows it.
pub struct PlannedSource {
    pub source: Box<dyn Source>,
    pub pause: Duration,
}

/// Every enabled source in run order: feeds, then Google queries, then Bing queries.
pub fn plan_sources(
    config: &Config,
    fetcher: Arc<dyn HttpFetcher>,
    scorer: &RelevanceScorer,
    politeness: &Politeness,
) -> Result<Vec<PlannedSource>> {
    let mut planned = Vec::new();

    if config.enable_rss_feeds {
        for url in &config.rss_feeds {
            planned.push(PlannedSource {
                source: Box::new(FeedSource::new(url.clone(), fetcher.clone(), scorer.clone())),
                pause: politeness.after_feed,
            });
        }
    }

    let mut engines: Vec<Arc<dyn SearchEngine>> = Vec::new();
    if config.enable_google_news {
        engines.push(Arc::new(GoogleNews::new()?));
    }
    if config.enable_bing_news {
        engines.push(Arc::new(BingNews::new()?));
    }
    for engine in engines {
        for query in &config.search_queries {
            planned.push(PlannedSource {
                source: Box::new(SearchSource::new(
                    engine.clone(),
                    query.clone(),
                    fetcher.clone(),
                    scorer.clone(),
                )),
                pause: politeness.after_search,
            });
        }
    }

    Ok(planned)
}

/// Drain the planned sources in order. A source's pause follows only a call that
/// returned `Ok`, empty batches from tolerated failures included.
async fn run_sources(planned: Vec<PlannedSource>, cap: usize, persister: &Persister) -> RunSummary {
    let mut summary = RunSummary::default();

    for PlannedSource { source, pause } in planned {
        match source.fetch_candidates(cap).await {
            Ok(candidates) => {
                summary.found += candidates.len();
                if !candidates.is_empty() {
                    let relevant = candidates.len();
                    let new = persister.persist_new(candidates).await;
                    summary.new += new;
                    info!(kind = source.kind(), target = source.target(), relevant, new, "Source done");
                }
                if !pause.is_zero() {
                    tokio::time::sleep(pause).await;
                }
            }
            Err(e) => {
                let message = source.error_message(&e);
                if e.is_transient() {
                    warn!("{}", message);
                } else {
                    error!("{}", message);
                }
                summary.errors.push(message);
            }
        }
    }

    summary
}

/// Clears the running flag however the run ends, unwinding included.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Ingestion orchestrator. At most one run is in flight per instance.
pub struct Pipeline {
    config: SharedConfig,
    articles: Arc<dyn ArticleStorage>,
    fetcher: Arc<dyn HttpFetcher>,
    scorer: RelevanceScorer,
    politeness: Politeness,
    running: AtomicBool,
}

impl Pipeline {
    pub fn new(config: SharedConfig, articles: Arc<dyn ArticleStorage>, fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self {
            config,
            articles,
            fetcher,
            scorer: RelevanceScorer::default(),
            politeness: Politeness::default(),
            running: AtomicBool::new(false),
        }
    }

    pub fn with_politeness(mut self, politeness: Politeness) -> Self {
        self.politeness = politeness;
        self
    }

    pub fn with_scorer(mut self, scorer: RelevanceScorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run every enabled source once. Returns [`RunOutcome::Skipped`] immediately
    /// when a run is already in progress.
    pub async fn run(&self) -> Result<RunOutcome> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("Scrape already in progress, skipping");
            return Ok(RunOutcome::Skipped);
        }
        let _guard = RunGuard(&self.running);

        let config = self.config.read().await.clone();
        let cap = config.max_articles_per_run;
        let planned = plan_sources(&config, self.fetcher.clone(), &self.scorer, &self.politeness)?;
        let persister = Persister::new(
            self.articles.clone(),
            ContentExtractor::new(self.fetcher.clone()),
            self.politeness.after_candidate,
        );

        info!(sources = planned.len(), "Starting news scrape");
        let summary = run_sources(planned, cap, &persister).await;

        let record = RunRecord::from_summary(&summary, Utc::now());
        if let Err(e) = self.articles.insert_run_record(&record).await {
            error!(error = %e, "Failed to store run record");
        }

        info!(
            found = summary.found,
            new = summary.new,
            errors = summary.errors.len(),
            status = %record.status,
            "Scrape complete"
        );
        Ok(RunOutcome::Completed(summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::FakeFetcher;
    use async_trait::async_trait;
    use tokio::sync::Notify;
    use ww_core::{Candidate, Error, RunStatus};
    use ww_storage::InMemoryStorage;

    const FEED_A: &str = "https://feeds.example/a.xml";
    const FEED_B: &str = "https://feeds.example/b.xml";

    fn rss(links: &[(&str, &str)]) -> String {
        let items: String = links
            .iter()
            .map(|(title, link)| format!("<item><title>{}</title><link>{}</link></item>", title, link))
            .collect();
        format!(r#"<?xml version="1.0"?><rss version="2.0"><channel><title>t</title>{}</channel></rss>"#, items)
    }

    fn feeds_only(feeds: &[&str]) -> Config {
        let mut config = Config::default();
        config.rss_feeds = feeds.iter().map(|s| s.to_string()).collect();
        config.enable_google_news = false;
        config.enable_bing_news = false;
        config
    }

    fn pipeline(config: Config, storage: Arc<InMemoryStorage>, fetcher: Arc<dyn HttpFetcher>) -> Pipeline {
        Pipeline::new(config.shared(), storage, fetcher).with_politeness(Politeness::none())
    }

    #[test]
    fn test_plan_order() {
        let mut config = Config::default();
        config.rss_feeds = vec![FEED_A.to_string()];
        config.search_queries = vec!["sewage spill".to_string(), "effluent".to_string()];
        let planned = plan_sources(
            &config,
            Arc::new(FakeFetcher::new()),
            &RelevanceScorer::default(),
            &Politeness::default(),
        )
        .unwrap();
        let kinds: Vec<(&str, &str)> = planned.iter().map(|p| (p.source.kind(), p.source.target())).collect();
        assert_eq!(
            kinds,
            vec![
                ("RSS", FEED_A),
                ("Google News", "sewage spill"),
                ("Google News", "effluent"),
                ("Bing News", "sewage spill"),
                ("Bing News", "effluent"),
            ]
        );
        assert_eq!(planned[0].pause, Duration::from_secs(2));
        assert_eq!(planned[1].pause, Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_cross_source_dedup_and_record() {
        let shared = ("Sewage overflow hits bay", "https://news.example/overflow");
        let fetcher = FakeFetcher::new()
            .page(FEED_A, &rss(&[shared, ("Wastewater fine", "https://news.example/fine")]))
            .page(FEED_B, &rss(&[shared]));
        let storage = Arc::new(InMemoryStorage::new());
        let pipeline = pipeline(feeds_only(&[FEED_A, FEED_B]), storage.clone(), Arc::new(fetcher));

        let outcome = pipeline.run().await.unwrap();
        let RunOutcome::Completed(summary) = outcome else {
            panic!("run was skipped");
        };
        assert_eq!(summary.found, 3);
        assert_eq!(summary.new, 2);
        assert!(summary.errors.is_empty());

        let runs = storage.recent_runs(1).await.unwrap();
        assert_eq!(runs[0].status, RunStatus::Success);
        assert_eq!(runs[0].articles_found, 3);
        assert!(!pipeline.is_running());
    }

    #[tokio::test]
    async fn test_unreachable_feed_is_skipped_quietly() {
        let fetcher = FakeFetcher::new()
            .status(FEED_A, 500)
            .page(FEED_B, &rss(&[("Effluent alarm", "https://news.example/alarm")]));
        let storage = Arc::new(InMemoryStorage::new());
        let pipeline = pipeline(feeds_only(&[FEED_A, FEED_B]), storage.clone(), Arc::new(fetcher));

        let RunOutcome::Completed(summary) = pipeline.run().await.unwrap() else {
            panic!("run was skipped");
        };
        assert_eq!(summary.new, 1);
        assert!(summary.errors.is_empty());
        let runs = storage.recent_runs(1).await.unwrap();
        assert_eq!(runs[0].status, RunStatus::Success);

        // Same feeds again: nothing new, still no errors.
        pipeline.run().await.unwrap();
        let runs = storage.recent_runs(1).await.unwrap();
        assert_eq!(runs[0].articles_new, 0);
        assert_eq!(runs[0].status, RunStatus::Success);
    }

    #[tokio::test]
    async fn test_search_page_not_found_is_a_successful_empty_run() {
        let mut config = Config::default();
        config.enable_rss_feeds = false;
        config.enable_bing_news = false;
        config.search_queries = vec!["sewage spill".to_string()];
        let fetcher = Arc::new(FakeFetcher::new());
        let storage = Arc::new(InMemoryStorage::new());
        let pipeline = pipeline(config, storage.clone(), fetcher.clone());

        let RunOutcome::Completed(summary) = pipeline.run().await.unwrap() else {
            panic!("run was skipped");
        };
        assert_eq!(fetcher.requested().len(), 1);
        assert_eq!(summary.found, 0);
        assert!(summary.errors.is_empty());
        let runs = storage.recent_runs(1).await.unwrap();
        assert_eq!(runs[0].status, RunStatus::Success);
    }

    #[tokio::test]
    async fn test_malformed_feed_is_a_successful_empty_run() {
        let fetcher = FakeFetcher::new().page(FEED_A, "<html>not a feed");
        let storage = Arc::new(InMemoryStorage::new());
        let pipeline = pipeline(feeds_only(&[FEED_A]), storage.clone(), Arc::new(fetcher));

        let RunOutcome::Completed(summary) = pipeline.run().await.unwrap() else {
            panic!("run was skipped");
        };
        assert!(summary.errors.is_empty());
        let runs = storage.recent_runs(1).await.unwrap();
        assert_eq!(runs[0].status, RunStatus::Success);
    }

    /// Returns a fixed batch, or a storage error when it has none.
    struct StubSource {
        target: &'static str,
        batch: Option<Vec<Candidate>>,
    }

    #[async_trait]
    impl Source for StubSource {
        fn kind(&self) -> &str {
            "Stub"
        }

        fn target(&self) -> &str {
            self.target
        }

        async fn fetch_candidates(&self, _cap: usize) -> ww_core::Result<Vec<Candidate>> {
            match &self.batch {
                Some(batch) => Ok(batch.clone()),
                None => Err(Error::Storage("disk full".to_string())),
            }
        }
    }

    fn planned(target: &'static str, batch: Option<Vec<Candidate>>, pause_secs: u64) -> PlannedSource {
        PlannedSource {
            source: Box::new(StubSource { target, batch }),
            pause: Duration::from_secs(pause_secs),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hard_error_is_recorded_and_skips_the_pause() {
        let storage = Arc::new(InMemoryStorage::new());
        let persister = Persister::new(
            storage.clone(),
            ContentExtractor::new(Arc::new(FakeFetcher::new())),
            Duration::ZERO,
        );
        let sources = vec![
            planned("broken", None, 5),
            planned("quiet", Some(Vec::new()), 7),
            planned("also-broken", None, 11),
        ];

        let started = tokio::time::Instant::now();
        let summary = run_sources(sources, 10, &persister).await;

        assert_eq!(started.elapsed(), Duration::from_secs(7));
        assert_eq!(
            summary.errors,
            vec![
                "Stub error (broken): Storage error: disk full".to_string(),
                "Stub error (also-broken): Storage error: disk full".to_string(),
            ]
        );
        assert_eq!(RunStatus::derive(summary.errors.len(), summary.new), RunStatus::Failed);
    }

    /// Holds the first request until released.
    struct GatedFetcher {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl HttpFetcher for GatedFetcher {
        async fn get_text(&self, url: &str) -> ww_core::Result<String> {
            self.entered.notify_one();
            self.release.notified().await;
            Err(Error::HttpStatus {
                url: url.to_string(),
                status: 503,
            })
        }
    }

    #[tokio::test]
    async fn test_second_run_is_skipped_while_first_is_in_flight() {
        let fetcher = Arc::new(GatedFetcher {
            entered: Notify::new(),
            release: Notify::new(),
        });
        let storage = Arc::new(InMemoryStorage::new());
        let pipeline = Arc::new(pipeline(feeds_only(&[FEED_A]), storage.clone(), fetcher.clone()));

        let first = tokio::spawn({
            let pipeline = pipeline.clone();
            async move { pipeline.run().await }
        });
        fetcher.entered.notified().await;
        assert!(pipeline.is_running());

        assert_eq!(pipeline.run().await.unwrap(), RunOutcome::Skipped);

        fetcher.release.notify_one();
        let outcome = first.await.unwrap().unwrap();
        assert!(matches!(outcome, RunOutcome::Completed(_)));
        assert!(!pipeline.is_running());
        assert_eq!(storage.recent_runs(10).await.unwrap().len(), 1);

        // The guard was released, so a fresh run goes ahead.
        fetcher.release.notify_one();
        assert!(matches!(pipeline.run().await.unwrap(), RunOutcome::Completed(_)));
    }

    struct PanickingFetcher;

    #[async_trait]
    impl HttpFetcher for PanickingFetcher {
        async fn get_text(&self, _url: &str) -> ww_core::Result<String> {
            panic!("fetcher blew up");
        }
    }

    #[tokio::test]
    async fn test_guard_resets_after_panic() {
        let storage = Arc::new(InMemoryStorage::new());
        let pipeline = Arc::new(pipeline(feeds_only(&[FEED_A]), storage, Arc::new(PanickingFetcher)));

        let handle = tokio::spawn({
            let pipeline = pipeline.clone();
            async move { pipeline.run().await }
        });
        assert!(handle.await.is_err());
        assert!(!pipeline.is_running());
    }
}
