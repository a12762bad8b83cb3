use scraper::{Html, Selector};
use url::Url;
use ww_core::Result;

use super::{encode_query, SearchEngine, SearchHit};
use crate::scrapers::utils::{element_text, first_text, selector};

const BASE_URL: &str = "https://www.google.com";

pub struct GoogleNews {
    block: Selector,
    link: Selector,
    title: Selector,
    snippet: Selector,
    source: Selector,
}

impl GoogleNews {
    pub fn new() -> Result<Self> {
        Ok(Self {
            block: selector("div.SoaBEf, div.xuvV6b, div.dbsr")?,
            link: selector("a[href]")?,
            title: selector("div.MBeuO, div.n0jPhd, div.JheGif")?,
            snippet: selector("div.GI74Re, div.Y3v8qd, div.s3v9rd")?,
            source: selector("div.CEMjEf span, div.XTjFC, span.WF4CUc")?,
        })
    }
}

/// Unwraps `/url?q=<target>&...` redirects and absolutizes other relative links.
pub fn resolve_link(href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    let joined = Url::parse(BASE_URL).ok()?.join(href).ok()?;
    if joined.path() == "/url" {
        return joined
            .query_pairs()
            .find(|(key, _)| key == "q")
            .map(|(_, target)| target.into_owned())
            .filter(|target| !target.is_empty());
    }
    Some(joined.to_string())
}

impl SearchEngine for GoogleNews {
    fn name(&self) -> &str {
        "Google News"
    }

    fn results_url(&self, query: &str) -> String {
        format!("{}/search?q={}&tbm=nws&hl=en", BASE_URL, encode_query(query))
    }

    fn parse_results_page(&self, html: &str) -> Vec<SearchHit> {
        let document = Html::parse_document(html);
        let mut hits = Vec::new();

        for block in document.select(&self.block) {
            let Some(link) = block
                .select(&self.link)
                .next()
                .and_then(|a| a.value().attr("href"))
                .and_then(resolve_link)
            else {
                continue;
            };
            let Some(title) = block.select(&self.title).next().map(|el| element_text(&el)) else {
                continue;
            };
            hits.push(SearchHit {
                title,
                link,
                snippet: first_text(&block, &self.snippet).unwrap_or_default(),
                source: first_text(&block, &self.source).unwrap_or_else(|| self.name().to_string()),
            });
        }

        hits
    }
}
