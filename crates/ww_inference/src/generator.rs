use chrono::Utc;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use ww_core::{
    ArticleStorage, BlogDraft, BlogPost, BlogStorage, InferenceModel, Result, SharedConfig,
    StoredArticle,
};

use crate::models::{create_model, DemoModel};

pub const SYSTEM_PROMPT: &str = "You are a professional environmental journalist specializing in wastewater \
    treatment and water pollution. Write engaging, well-researched blog posts.";

static HEADLINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"## HEADLINE:[ \t]*(.+)").unwrap());
static META: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"## META_DESCRIPTION:[ \t]*(.+)").unwrap());
static TAGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"## TAGS:[ \t]*(.+)").unwrap());
static IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"## FEATURED_IMAGE_PROMPT:[ \t]*(.+)").unwrap());
static CONTENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)## CONTENT:[ \t]*\r?\n?(.*)").unwrap());

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn split_tags(raw: &str) -> Vec<String> {
    raw.trim_matches(|c| c == '[' || c == ']')
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Fill `{title} {source} {date} {summary} {content}` from the article.
pub fn fill_template(template: &str, article: &StoredArticle) -> String {
    let date = article
        .published_at
        .map(|d| d.format("%B %d, %Y").to_string())
        .unwrap_or_else(|| "Unknown".to_string());
    let content = if article.content.is_empty() {
        &article.summary
    } else {
        &article.content
    };
    template
        .replace("{title}", &article.title)
        .replace("{source}", &article.source)
        .replace("{date}", &date)
        .replace("{summary}", &article.summary)
        .replace("{content}", content)
}

/// Split a model reply into its headed sections. Missing pieces fall back to
/// `Analysis: {title}` for the headline and the whole reply for the body.
pub fn parse_blog_response(text: &str, article: &StoredArticle) -> BlogDraft {
    BlogDraft {
        headline: capture(&HEADLINE, text).unwrap_or_else(|| format!("Analysis: {}", article.title)),
        meta_description: capture(&META, text).unwrap_or_default(),
        tags: capture(&TAGS, text).map(|t| split_tags(&t)).unwrap_or_default(),
        featured_image_prompt: capture(&IMAGE, text).unwrap_or_default(),
        content: capture(&CONTENT, text).unwrap_or_else(|| text.to_string()),
    }
}

/// Turns stored articles into draft blog posts.
pub struct BlogGenerator {
    config: SharedConfig,
    model: RwLock<Option<Arc<dyn InferenceModel>>>,
    demo: DemoModel,
    articles: Arc<dyn ArticleStorage>,
    blogs: Arc<dyn BlogStorage>,
}

impl BlogGenerator {
    pub async fn from_config(
        config: SharedConfig,
        articles: Arc<dyn ArticleStorage>,
        blogs: Arc<dyn BlogStorage>,
    ) -> Result<Self> {
        let model = create_model(&*config.read().await)?;
        Ok(Self::with_model(config, model, articles, blogs))
    }

    pub fn with_model(
        config: SharedConfig,
        model: Option<Arc<dyn InferenceModel>>,
        articles: Arc<dyn ArticleStorage>,
        blogs: Arc<dyn BlogStorage>,
    ) -> Self {
        Self {
            config,
            model: RwLock::new(model),
            demo: DemoModel::new(),
            articles,
            blogs,
        }
    }

    /// Rebuild the model after the API key or model settings change.
    pub async fn reload_model(&self) -> Result<()> {
        let model = create_model(&*self.config.read().await)?;
        *self.model.write().await = model;
        Ok(())
    }

    pub async fn is_demo(&self) -> bool {
        self.model.read().await.is_none()
    }

    /// Prompt precedence: `prompt_override`, then the configured template.
    pub async fn generate(&self, article: &StoredArticle, prompt_override: Option<&str>) -> BlogDraft {
        let model = self.model.read().await.clone();
        let Some(model) = model else {
            info!("Running in demo mode (no API key configured)");
            return self.demo.draft(article);
        };

        let template = match prompt_override.filter(|p| !p.trim().is_empty()) {
            Some(custom) => custom.to_string(),
            None => self.config.read().await.blog_prompt_template.clone(),
        };
        let prompt = fill_template(&template, article);

        match model.complete(SYSTEM_PROMPT, &prompt).await {
            Ok(text) => parse_blog_response(&text, article),
            Err(e) => {
                error!(model = model.name(), error = %e, "Model call failed, using demo post");
                self.demo.draft(article)
            }
        }
    }

    /// Generate and store a draft post, then mark the article consumed.
    pub async fn process_article(&self, article: &StoredArticle, prompt_override: Option<&str>) -> Result<BlogPost> {
        let title: String = article.title.chars().take(60).collect();
        info!(article_id = article.id, %title, "Generating blog post");

        let draft = self.generate(article, prompt_override).await;
        let mut blog = BlogPost::from_draft(draft, Some(article.id), Utc::now());
        blog.id = self.blogs.insert_blog(&blog).await?;
        self.articles.mark_processed(article.id).await?;

        info!(blog_id = blog.id, headline = %blog.headline, "Blog post created");
        Ok(blog)
    }

    /// Run [`process_article`](Self::process_article) for up to `limit` pending
    /// articles. Failures are logged and skipped.
    pub async fn process_unprocessed(&self, limit: usize, prompt_override: Option<&str>) -> Result<Vec<BlogPost>> {
        let pending = self.articles.select_unprocessed(limit).await?;
        let mut created = Vec::with_capacity(pending.len());
        for article in &pending {
            match self.process_article(article, prompt_override).await {
                Ok(blog) => created.push(blog),
                Err(e) => warn!(article_id = article.id, error = %e, "Failed to generate blog"),
            }
        }
        Ok(created)
    }
}
