use std::sync::Arc;
use tokio::sync::RwLock;

use crate::{Error, Result};

/// Live configuration shared by the pipeline, the scheduler and the admin API.
pub type SharedConfig = Arc<RwLock<Config>>;

pub const WORDPRESS_PLACEHOLDER_URL: &str = "https://your-wordpress-site.com";

pub const DEFAULT_RSS_FEEDS: &[&str] = &[
    "https://news.google.com/rss/search?q=wastewater+treatment+pollution&hl=en-US&gl=US&ceid=US:en",
    "https://news.google.com/rss/search?q=sewage+spill+contamination&hl=en-US&gl=US&ceid=US:en",
    "https://news.google.com/rss/search?q=water+pollution+incident&hl=en-US&gl=US&ceid=US:en",
    "https://news.google.com/rss/search?q=wastewater+discharge+violation&hl=en-US&gl=US&ceid=US:en",
    "https://news.google.com/rss/search?q=sewage+overflow+environmental&hl=en-US&gl=US&ceid=US:en",
    "https://www.epa.gov/rss/epa-news-releases.xml",
    "https://www.wateronline.com/rss",
    "https://www.waterworld.com/rss",
];

pub const DEFAULT_SEARCH_QUERIES: &[&str] = &[
    "wastewater treatment pollution incident",
    "sewage spill contamination",
    "water pollution environmental violation",
    "wastewater discharge EPA fine",
    "sewage overflow water quality",
];

pub const DEFAULT_BLOG_PROMPT: &str = "You are a professional environmental journalist and blogger specializing in wastewater treatment and water pollution issues.

Based on the following news article(s), write a comprehensive, engaging blog post for a WordPress website focused on wastewater treatment industry news and pollution incidents.

ARTICLE INFORMATION:
Title: {title}
Source: {source}
Date: {date}
Summary: {summary}
Full Content: {content}

BLOG POST REQUIREMENTS:
1. Write an attention-grabbing headline (different from the original article title)
2. Write a compelling introduction that hooks the reader
3. Provide detailed analysis of the incident/news
4. Include relevant context about wastewater treatment regulations
5. Discuss potential environmental and public health impacts
6. Add expert-level commentary on industry implications
7. Include a conclusion with forward-looking perspective
8. Suggest 3-5 relevant tags for SEO
9. Write a meta description (150-160 characters) for SEO

FORMAT YOUR RESPONSE AS:
## HEADLINE: [Your headline]
## META_DESCRIPTION: [SEO meta description]
## TAGS: [comma-separated tags]
## FEATURED_IMAGE_PROMPT: [A description for generating a relevant featured image]
## CONTENT:
[Full blog post content in HTML format, using <h2>, <h3>, <p>, <ul>, <li>, <blockquote> tags]
";

/// Every key [`Config::apply`] understands.
pub const KEYS: &[&str] = &[
    "LLM_API_KEY",
    "LLM_BASE_URL",
    "LLM_MODEL",
    "WORDPRESS_URL",
    "WORDPRESS_USERNAME",
    "WORDPRESS_APP_PASSWORD",
    "SCRAPE_INTERVAL_MINUTES",
    "MAX_ARTICLES_PER_RUN",
    "AUTO_GENERATE_BLOGS",
    "AUTO_PUBLISH_DRAFTS",
    "ENABLE_RSS_FEEDS",
    "ENABLE_GOOGLE_NEWS",
    "ENABLE_BING_NEWS",
    "RSS_FEEDS",
    "NEWS_SEARCH_QUERIES",
    "BLOG_PROMPT_TEMPLATE",
    "EXPORT_DIR",
    "DATABASE_URL",
    "BIND_ADDR",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub llm_model: String,
    pub wordpress_url: String,
    pub wordpress_username: String,
    pub wordpress_app_password: String,
    pub scrape_interval_minutes: u64,
    pub max_articles_per_run: usize,
    pub auto_generate_blogs: bool,
    pub auto_publish_drafts: bool,
    pub enable_rss_feeds: bool,
    pub enable_google_news: bool,
    pub enable_bing_news: bool,
    pub rss_feeds: Vec<String>,
    pub search_queries: Vec<String>,
    pub blog_prompt_template: String,
    pub export_dir: String,
    pub database_url: String,
    pub bind_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_api_key: String::new(),
            llm_base_url: "https://api.perplexity.ai".to_string(),
            llm_model: "sonar-pro".to_string(),
            wordpress_url: String::new(),
            wordpress_username: String::new(),
            wordpress_app_password: String::new(),
            scrape_interval_minutes: 60,
            max_articles_per_run: 10,
            auto_generate_blogs: true,
            auto_publish_drafts: false,
            enable_rss_feeds: true,
            enable_google_news: true,
            enable_bing_news: true,
            rss_feeds: DEFAULT_RSS_FEEDS.iter().map(|s| s.to_string()).collect(),
            search_queries: DEFAULT_SEARCH_QUERIES.iter().map(|s| s.to_string()).collect(),
            blog_prompt_template: DEFAULT_BLOG_PROMPT.to_string(),
            export_dir: "generated_posts".to_string(),
            database_url: "sqlite:wastewatch.db".to_string(),
            bind_addr: "0.0.0.0:5000".to_string(),
        }
    }
}

impl Config {
    /// Defaults overlaid with whatever the process environment sets.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_overrides(std::env::vars())?;
        Ok(config)
    }

    /// Apply every known, non-empty pair. Unknown keys are ignored.
    pub fn apply_overrides<I, K, V>(&mut self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            if value.trim().is_empty() {
                continue;
            }
            if Self::is_known_key(key) {
                self.apply(key, value)?;
            }
        }
        Ok(())
    }

    pub fn is_known_key(key: &str) -> bool {
        KEYS.contains(&key) || key == "PERPLEXITY_API_KEY"
    }

    pub fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "LLM_API_KEY" | "PERPLEXITY_API_KEY" => self.llm_api_key = value.to_string(),
            "LLM_BASE_URL" => self.llm_base_url = value.trim_end_matches('/').to_string(),
            "LLM_MODEL" => self.llm_model = value.to_string(),
            "WORDPRESS_URL" => self.wordpress_url = value.trim_end_matches('/').to_string(),
            "WORDPRESS_USERNAME" => self.wordpress_username = value.to_string(),
            "WORDPRESS_APP_PASSWORD" => self.wordpress_app_password = value.to_string(),
            "SCRAPE_INTERVAL_MINUTES" => {
                let minutes = parse_number::<u64>(key, value)?;
                if minutes == 0 {
                    return Err(Error::Config(format!("{} must be at least 1", key)));
                }
                self.scrape_interval_minutes = minutes;
            }
            "MAX_ARTICLES_PER_RUN" => self.max_articles_per_run = parse_number(key, value)?,
            "AUTO_GENERATE_BLOGS" => self.auto_generate_blogs = parse_flag(value),
            "AUTO_PUBLISH_DRAFTS" => self.auto_publish_drafts = parse_flag(value),
            "ENABLE_RSS_FEEDS" => self.enable_rss_feeds = parse_flag(value),
            "ENABLE_GOOGLE_NEWS" => self.enable_google_news = parse_flag(value),
            "ENABLE_BING_NEWS" => self.enable_bing_news = parse_flag(value),
            "RSS_FEEDS" => self.rss_feeds = parse_list(value),
            "NEWS_SEARCH_QUERIES" => self.search_queries = parse_list(value),
            "BLOG_PROMPT_TEMPLATE" => self.blog_prompt_template = value.to_string(),
            "EXPORT_DIR" => self.export_dir = value.to_string(),
            "DATABASE_URL" => self.database_url = value.to_string(),
            "BIND_ADDR" => self.bind_addr = value.to_string(),
            other => return Err(Error::Config(format!("unknown setting: {}", other))),
        }
        Ok(())
    }

    pub fn shared(self) -> SharedConfig {
        Arc::new(RwLock::new(self))
    }

    pub fn wordpress_configured(&self) -> bool {
        !self.wordpress_url.is_empty()
            && !self.wordpress_username.is_empty()
            && !self.wordpress_app_password.is_empty()
            && self.wordpress_url != WORDPRESS_PLACEHOLDER_URL
    }

    /// No API key means blog posts come from the offline demo writer.
    pub fn demo_mode(&self) -> bool {
        self.llm_api_key.is_empty()
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("{} expects a number, got {:?}", key, value)))
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(|c| c == ',' || c == '\n')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
