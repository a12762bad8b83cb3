use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use ww_core::{Candidate, Error, Result};

pub mod feed;
pub mod search;

pub use feed::FeedSource;
pub use search::{BingNews, GoogleNews, SearchEngine, SearchHit, SearchSource};

/// One adapter invocation target: a feed url or a search query on one engine.
#[async_trait]
pub trait Source: Send + Sync {
    /// Label used in logs and run error messages, e.g. "RSS" or "Google News".
    fn kind(&self) -> &str;

    /// The feed url or query this source reads.
    fn target(&self) -> &str;

    /// Fetch, parse and screen. Network and parse failures come back as an empty
    /// list plus a warning. Only non-transient errors are returned as `Err`.
    async fn fetch_candidates(&self, cap: usize) -> Result<Vec<Candidate>>;

    fn error_message(&self, err: &Error) -> String {
        let target: String = self.target().chars().take(50).collect();
        format!("{} error ({}): {}", self.kind(), target, err)
    }
}

/// Swaps a transient failure for an empty batch, logging it at warn level.
pub(crate) fn tolerate_transient<S: Source + ?Sized>(
    source: &S,
    result: Result<Vec<Candidate>>,
) -> Result<Vec<Candidate>> {
    match result {
        Err(e) if e.is_transient() => {
            tracing::warn!("{}", source.error_message(&e));
            Ok(Vec::new())
        }
        other => other,
    }
}

/// Common utilities for the adapters and the extractor
pub(crate) mod utils {
    use super::*;

    pub fn selector(css: &str) -> Result<Selector> {
        Selector::parse(css).map_err(|e| Error::Scraping(format!("Invalid selector {:?}: {}", css, e)))
    }

    /// Text of an element with surrounding whitespace stripped from every text node.
    pub fn element_text(el: &ElementRef) -> String {
        el.text()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn first_text(el: &ElementRef, selector: &Selector) -> Option<String> {
        el.select(selector).next().map(|found| element_text(&found))
    }

    /// Plain text of an HTML fragment such as a feed summary.
    pub fn strip_html(fragment: &str) -> String {
        let fragment = Html::parse_fragment(fragment);
        fragment
            .root_element()
            .text()
            .flat_map(str::split_whitespace)
            .collect::<Vec<_>>()
            .join(" ")
    }
}
