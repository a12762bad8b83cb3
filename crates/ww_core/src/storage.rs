use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::types::{BlogPost, BlogStatus, RunRecord, StoredArticle};
use crate::Result;

#[async_trait]
pub trait ArticleStorage: Send + Sync {
    async fn find_by_url(&self, url: &str) -> Result<Option<StoredArticle>>;

    /// Store a new article and return its id.
    /// Fails with [`Error::Duplicate`](crate::Error::Duplicate) when the url is already stored.
    async fn insert_article(&self, article: &StoredArticle) -> Result<i64>;

    async fn get_article(&self, id: i64) -> Result<Option<StoredArticle>>;

    /// Newest `scraped_at` first.
    async fn list_articles(&self, offset: usize, limit: usize) -> Result<Vec<StoredArticle>>;

    /// Relevant articles not yet consumed downstream, newest `scraped_at` first.
    async fn select_unprocessed(&self, limit: usize) -> Result<Vec<StoredArticle>>;

    async fn mark_processed(&self, id: i64) -> Result<()>;

    async fn delete_article(&self, id: i64) -> Result<bool>;

    async fn count_articles(&self) -> Result<usize>;

    async fn count_unprocessed(&self) -> Result<usize>;

    async fn insert_run_record(&self, record: &RunRecord) -> Result<i64>;

    /// Most recent first.
    async fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>>;
}

#[async_trait]
pub trait BlogStorage: Send + Sync {
    async fn insert_blog(&self, blog: &BlogPost) -> Result<i64>;

    async fn get_blog(&self, id: i64) -> Result<Option<BlogPost>>;

    /// Replaces every field of the stored post with the same id.
    async fn update_blog(&self, blog: &BlogPost) -> Result<()>;

    /// Newest `created_at` first.
    async fn list_blogs(&self, offset: usize, limit: usize) -> Result<Vec<BlogPost>>;

    async fn delete_blog(&self, id: i64) -> Result<bool>;

    async fn count_blogs(&self, status: Option<BlogStatus>) -> Result<usize>;
}

#[async_trait]
pub trait SettingsStorage: Send + Sync {
    async fn get_setting(&self, key: &str) -> Result<Option<String>>;

    /// Insert or overwrite.
    async fn set_setting(&self, key: &str, value: &str) -> Result<()>;

    async fn all_settings(&self) -> Result<BTreeMap<String, String>>;
}
