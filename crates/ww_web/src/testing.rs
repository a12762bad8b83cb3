use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use ww_core::{Config, Error, HttpFetcher, Result};
use ww_scrapers::Politeness;
use ww_storage::StorageSet;

use crate::AppState;

pub(crate) const FEED_URL: &str = "https://feeds.test/rss.xml";

pub(crate) const RELEVANT_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Test Wire</title>
<item><title>Sewage spill closes beach</title><link>https://news.test/spill</link>
<description>Untreated wastewater reached the shore.</description></item>
<item><title>Bakery opens downtown</title><link>https://news.test/bakery</link></item>
</channel></rss>"#;

/// Serves fixed bodies; anything else is a 404.
#[derive(Default)]
pub(crate) struct StaticFetcher {
    pages: HashMap<String, String>,
}

impl StaticFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), body.to_string());
        self
    }
}

#[async_trait]
impl HttpFetcher for StaticFetcher {
    async fn get_text(&self, url: &str) -> Result<String> {
        self.pages.get(url).cloned().ok_or_else(|| Error::HttpStatus {
            url: url.to_string(),
            status: 404,
        })
    }
}

pub(crate) fn feed_config() -> Config {
    let mut config = Config::default();
    config.rss_feeds = vec![FEED_URL.to_string()];
    config.enable_google_news = false;
    config.enable_bing_news = false;
    config
}

pub(crate) async fn test_state(config: Config, fetcher: StaticFetcher) -> AppState {
    AppState::new(config, StorageSet::in_memory(), Arc::new(fetcher), Politeness::none())
        .await
        .unwrap()
}
