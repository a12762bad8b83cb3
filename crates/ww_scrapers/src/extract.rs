use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use tracing::{debug, warn};
use ww_core::text::truncate_with_ellipsis;
use ww_core::{HttpFetcher, Result, MAX_CONTENT_CHARS};

use crate::scrapers::utils::{element_text, selector};

/// Subtrees whose text never counts as article body.
const IGNORED_TAGS: &[&str] = &[
    "script", "style", "nav", "footer", "header", "aside", "iframe", "form", "noscript",
];

const CONTAINER_CLASS_HINTS: &[&str] = &["article", "content", "post", "entry", "story"];

/// Paragraphs this short are usually captions, bylines or ads.
const MIN_PARAGRAPH_CHARS: usize = 30;

const MIN_BODY_CHARS: usize = 100;

struct Selectors {
    article: Selector,
    div: Selector,
    main: Selector,
    paragraph: Selector,
}

impl Selectors {
    fn new() -> Result<Self> {
        Ok(Self {
            article: selector("article")?,
            div: selector("div[class]")?,
            main: selector("main")?,
            paragraph: selector("p")?,
        })
    }
}

fn is_ignored(el: &ElementRef) -> bool {
    std::iter::once(**el)
        .chain(el.ancestors())
        .filter_map(|node| node.value().as_element().map(|e| e.name()))
        .any(|name| IGNORED_TAGS.contains(&name))
}

fn has_content_class(el: &ElementRef) -> bool {
    el.value()
        .attr("class")
        .map(|class| {
            let class = class.to_lowercase();
            CONTAINER_CLASS_HINTS.iter().any(|hint| class.contains(hint))
        })
        .unwrap_or(false)
}

/// Readable body text of an HTML page, or `""` when too little survives.
pub fn extract_from_html(html: &str) -> Result<String> {
    let selectors = Selectors::new()?;
    let document = Html::parse_document(html);

    let visible = |el: &ElementRef| !is_ignored(el);
    let container = document
        .select(&selectors.article)
        .find(visible)
        .or_else(|| {
            document
                .select(&selectors.div)
                .find(|el| visible(el) && has_content_class(el))
        })
        .or_else(|| document.select(&selectors.main).find(visible))
        .unwrap_or_else(|| document.root_element());

    let paragraphs: Vec<String> = container
        .select(&selectors.paragraph)
        .filter(|p| !is_ignored(p))
        .map(|p| element_text(&p))
        .filter(|text| text.chars().count() > MIN_PARAGRAPH_CHARS)
        .collect();

    let content = truncate_with_ellipsis(&paragraphs.join("\n\n"), MAX_CONTENT_CHARS);
    if content.chars().count() <= MIN_BODY_CHARS {
        return Ok(String::new());
    }
    Ok(content)
}

pub struct ContentExtractor {
    fetcher: Arc<dyn HttpFetcher>,
}

impl ContentExtractor {
    pub fn new(fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self { fetcher }
    }

    /// Never fails: network and parse problems are logged and yield `""`.
    pub async fn extract_content(&self, url: &str) -> String {
        let html = match self.fetcher.get_text(url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(%url, error = %e, "Failed to fetch article content");
                return String::new();
            }
        };
        match extract_from_html(&html) {
            Ok(content) => {
                debug!(%url, chars = content.chars().count(), "Extracted article content");
                content
            }
            Err(e) => {
                warn!(%url, error = %e, "Failed to extract article content");
                String::new()
            }
        }
    }
}
