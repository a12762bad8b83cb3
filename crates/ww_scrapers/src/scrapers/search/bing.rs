use scraper::{Html, Selector};
use ww_core::Result;

use super::{encode_query, SearchEngine, SearchHit};
use crate::scrapers::utils::{element_text, first_text, selector};

const BASE_URL: &str = "https://www.bing.com";

pub struct BingNews {
    card: Selector,
    title: Selector,
    snippet: Selector,
    source: Selector,
}

impl BingNews {
    pub fn new() -> Result<Self> {
        Ok(Self {
            card: selector("div.news-card, a.news-card")?,
            title: selector("a.title, div.title")?,
            snippet: selector("div.snippet")?,
            source: selector("div.source span, span.source")?,
        })
    }
}

fn absolutize(link: &str) -> String {
    if link.starts_with("http") {
        link.to_string()
    } else {
        format!("{}{}", BASE_URL, link)
    }
}

impl SearchEngine for BingNews {
    fn name(&self) -> &str {
        "Bing News"
    }

    fn results_url(&self, query: &str) -> String {
        format!("{}/news/search?q={}&form=NSBABR", BASE_URL, encode_query(query))
    }

    fn parse_results_page(&self, html: &str) -> Vec<SearchHit> {
        let document = Html::parse_document(html);
        let mut hits = Vec::new();

        for card in document.select(&self.card) {
            let Some(title_el) = card.select(&self.title).next() else {
                continue;
            };
            let href = title_el
                .value()
                .attr("href")
                .or_else(|| card.value().attr("href"))
                .filter(|href| !href.is_empty());
            let Some(href) = href else {
                continue;
            };
            hits.push(SearchHit {
                title: element_text(&title_el),
                link: absolutize(href),
                snippet: first_text(&card, &self.snippet).unwrap_or_default(),
                source: first_text(&card, &self.source).unwrap_or_else(|| self.name().to_string()),
            });
        }

        hits
    }
}
