use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use ww_core::{BlogPost, BlogStatus, Config, RunRecord, StoredArticle};
use ww_inference::export_html;
use ww_publish::{ConnectionStatus, WordPressClient};
use ww_scrapers::RunOutcome;

use crate::error::{ApiError, ApiResult};
use crate::scheduler::SchedulerStatus;
use crate::AppState;

pub const PAGE_SIZE: usize = 20;
const DEFAULT_GENERATE_LIMIT: usize = 5;
const RECENT_RUNS: usize = 20;

#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    pub limit: Option<usize>,
    pub prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<usize>,
}

impl PageQuery {
    fn page(&self) -> usize {
        self.page.unwrap_or(1).max(1)
    }

    fn offset(&self) -> usize {
        (self.page() - 1) * PAGE_SIZE
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct PostRef {
    pub id: i64,
    pub headline: String,
}

impl From<&BlogPost> for PostRef {
    fn from(blog: &BlogPost) -> Self {
        Self {
            id: blog.id,
            headline: blog.headline.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Stats {
    pub total_articles: usize,
    pub total_blogs: usize,
    pub unprocessed: usize,
    pub published: usize,
    pub drafts: usize,
}

async fn find_blog(state: &AppState, id: i64) -> ApiResult<BlogPost> {
    state
        .storage
        .blogs
        .get_blog(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Blog post not found".to_string()))
}

pub async fn scrape(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    match state.pipeline.run().await? {
        RunOutcome::Completed(summary) => Ok(Json(json!({ "success": true, "data": summary }))),
        RunOutcome::Skipped => Err(ApiError::Conflict("A scrape is already in progress".to_string())),
    }
}

pub async fn generate(
    State(state): State<Arc<AppState>>,
    body: Option<Json<GenerateRequest>>,
) -> ApiResult<Json<Value>> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let limit = request.limit.unwrap_or(DEFAULT_GENERATE_LIMIT);
    let blogs = state
        .generator
        .process_unprocessed(limit, request.prompt.as_deref())
        .await?;
    let posts: Vec<PostRef> = blogs.iter().map(PostRef::from).collect();
    Ok(Json(json!({ "success": true, "generated": posts.len(), "posts": posts })))
}

pub async fn generate_one(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    body: Option<Json<GenerateRequest>>,
) -> ApiResult<Json<Value>> {
    let article = state
        .storage
        .articles
        .get_article(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Article not found".to_string()))?;
    let prompt = body.and_then(|Json(r)| r.prompt);
    let blog = state.generator.process_article(&article, prompt.as_deref()).await?;
    Ok(Json(json!({ "success": true, "post": PostRef::from(&blog) })))
}

pub async fn publish(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> ApiResult<Json<Value>> {
    let mut blog = find_blog(&state, id).await?;
    let client = WordPressClient::from_config(&*state.config.read().await)?;
    if !client.is_configured() {
        return Err(ApiError::BadRequest(
            "WordPress is not configured. Set the WORDPRESS_* settings.".to_string(),
        ));
    }
    let published = client.publish_as_draft(&*state.storage.blogs, &mut blog).await?;
    Ok(Json(json!({
        "success": true,
        "post_id": published.post_id,
        "url": published.url,
        "message": published.message,
    })))
}

pub async fn export(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> ApiResult<Json<Value>> {
    let blog = find_blog(&state, id).await?;
    let dir = PathBuf::from(&state.config.read().await.export_dir);
    let path = export_html(&blog, &dir).await?;
    Ok(Json(json!({ "success": true, "filepath": path.display().to_string() })))
}

pub async fn wordpress_test(State(state): State<Arc<AppState>>) -> ApiResult<Json<ConnectionStatus>> {
    let client = WordPressClient::from_config(&*state.config.read().await)?;
    Ok(Json(client.test_connection().await))
}

pub async fn scheduler_start(State(state): State<Arc<AppState>>) -> Json<Value> {
    let message = if state.scheduler.start().await {
        "Scheduler started!"
    } else {
        "Scheduler already running"
    };
    Json(json!({ "success": true, "message": message }))
}

pub async fn scheduler_stop(State(state): State<Arc<AppState>>) -> Json<Value> {
    let message = if state.scheduler.stop().await {
        "Scheduler stopped."
    } else {
        "Scheduler was not running"
    };
    Json(json!({ "success": true, "message": message }))
}

pub async fn scheduler_status(State(state): State<Arc<AppState>>) -> Json<SchedulerStatus> {
    Json(state.scheduler.status().await)
}

pub async fn stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<Stats>> {
    let articles = &state.storage.articles;
    let blogs = &state.storage.blogs;
    Ok(Json(Stats {
        total_articles: articles.count_articles().await?,
        total_blogs: blogs.count_blogs(None).await?,
        unprocessed: articles.count_unprocessed().await?,
        published: blogs.count_blogs(Some(BlogStatus::Published)).await?,
        drafts: blogs.count_blogs(Some(BlogStatus::Draft)).await?,
    }))
}

pub async fn list_articles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Page<StoredArticle>>> {
    let articles = &state.storage.articles;
    Ok(Json(Page {
        items: articles.list_articles(query.offset(), PAGE_SIZE).await?,
        page: query.page(),
        per_page: PAGE_SIZE,
        total: articles.count_articles().await?,
    }))
}

pub async fn list_blogs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Page<BlogPost>>> {
    let blogs = &state.storage.blogs;
    Ok(Json(Page {
        items: blogs.list_blogs(query.offset(), PAGE_SIZE).await?,
        page: query.page(),
        per_page: PAGE_SIZE,
        total: blogs.count_blogs(None).await?,
    }))
}

pub async fn recent_runs(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<RunRecord>>> {
    Ok(Json(state.storage.articles.recent_runs(RECENT_RUNS).await?))
}

fn setting_value(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Validate every pair first so a bad value leaves the store untouched.
pub async fn save_settings(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BTreeMap<String, Value>>,
) -> ApiResult<Json<Value>> {
    let pairs: Vec<(String, String)> = body.into_iter().map(|(k, v)| (k, setting_value(v))).collect();

    let mut probe = state.config.read().await.clone();
    for (key, value) in &pairs {
        if !Config::is_known_key(key) {
            return Err(ApiError::BadRequest(format!("unknown setting: {}", key)));
        }
        if !value.trim().is_empty() {
            probe.apply(key, value)?;
        }
    }

    for (key, value) in &pairs {
        state.storage.settings.set_setting(key, value).await?;
    }
    state.refresh_config().await?;

    let saved: Vec<String> = pairs.into_iter().map(|(key, _)| key).collect();
    Ok(Json(json!({ "success": true, "saved": saved })))
}

pub async fn delete_article(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> ApiResult<Json<Value>> {
    if state.storage.articles.delete_article(id).await? {
        Ok(Json(json!({ "success": true })))
    } else {
        Err(ApiError::NotFound("Not found".to_string()))
    }
}

pub async fn delete_blog(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> ApiResult<Json<Value>> {
    if state.storage.blogs.delete_blog(id).await? {
        Ok(Json(json!({ "success": true })))
    } else {
        Err(ApiError::NotFound("Not found".to_string()))
    }
}
