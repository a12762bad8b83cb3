use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use ww_core::{
    ArticleStorage, BlogPost, BlogStatus, BlogStorage, Error, Result, RunRecord, SettingsStorage,
    StoredArticle,
};

#[derive(Default)]
struct MemoryStore {
    articles: Vec<StoredArticle>,
    runs: Vec<RunRecord>,
    blogs: Vec<BlogPost>,
    settings: BTreeMap<String, String>,
    next_article_id: i64,
    next_run_id: i64,
    next_blog_id: i64,
}

impl MemoryStore {
    fn articles_newest_first(&self) -> Vec<&StoredArticle> {
        let mut articles: Vec<&StoredArticle> = self.articles.iter().collect();
        // Later inserts win ties so equal timestamps still read newest first.
        articles.sort_by(|a, b| b.scraped_at.cmp(&a.scraped_at).then(b.id.cmp(&a.id)));
        articles
    }
}

/// Process-local backend. Nothing survives a restart.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    store: Arc<RwLock<MemoryStore>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArticleStorage for InMemoryStorage {
    async fn find_by_url(&self, url: &str) -> Result<Option<StoredArticle>> {
        let store = self.store.read().await;
        Ok(store.articles.iter().find(|a| a.url == url).cloned())
    }

    async fn insert_article(&self, article: &StoredArticle) -> Result<i64> {
        let mut store = self.store.write().await;
        if store.articles.iter().any(|a| a.url == article.url) {
            return Err(Error::Duplicate(article.url.clone()));
        }
        store.next_article_id += 1;
        let id = store.next_article_id;
        let mut stored = article.clone();
        stored.id = id;
        store.articles.push(stored);
        Ok(id)
    }

    async fn get_article(&self, id: i64) -> Result<Option<StoredArticle>> {
        let store = self.store.read().await;
        Ok(store.articles.iter().find(|a| a.id == id).cloned())
    }

    async fn list_articles(&self, offset: usize, limit: usize) -> Result<Vec<StoredArticle>> {
        let store = self.store.read().await;
        Ok(store
            .articles_newest_first()
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn select_unprocessed(&self, limit: usize) -> Result<Vec<StoredArticle>> {
        let store = self.store.read().await;
        Ok(store
            .articles_newest_first()
            .into_iter()
            .filter(|a| a.is_relevant && !a.processed_downstream)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_processed(&self, id: i64) -> Result<()> {
        let mut store = self.store.write().await;
        match store.articles.iter_mut().find(|a| a.id == id) {
            Some(article) => {
                article.processed_downstream = true;
                Ok(())
            }
            None => Err(Error::NotFound(format!("article {}", id))),
        }
    }

    async fn delete_article(&self, id: i64) -> Result<bool> {
        let mut store = self.store.write().await;
        let before = store.articles.len();
        store.articles.retain(|a| a.id != id);
        Ok(store.articles.len() != before)
    }

    async fn count_articles(&self) -> Result<usize> {
        Ok(self.store.read().await.articles.len())
    }

    async fn count_unprocessed(&self) -> Result<usize> {
        let store = self.store.read().await;
        Ok(store
            .articles
            .iter()
            .filter(|a| a.is_relevant && !a.processed_downstream)
            .count())
    }

    async fn insert_run_record(&self, record: &RunRecord) -> Result<i64> {
        let mut store = self.store.write().await;
        store.next_run_id += 1;
        let id = store.next_run_id;
        let mut stored = record.clone();
        stored.id = id;
        store.runs.push(stored);
        Ok(id)
    }

    async fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>> {
        let store = self.store.read().await;
        Ok(store.runs.iter().rev().take(limit).cloned().collect())
    }
}

#[async_trait]
impl BlogStorage for InMemoryStorage {
    async fn insert_blog(&self, blog: &BlogPost) -> Result<i64> {
        let mut store = self.store.write().await;
        store.next_blog_id += 1;
        let id = store.next_blog_id;
        let mut stored = blog.clone();
        stored.id = id;
        store.blogs.push(stored);
        Ok(id)
    }

    async fn get_blog(&self, id: i64) -> Result<Option<BlogPost>> {
        let store = self.store.read().await;
        Ok(store.blogs.iter().find(|b| b.id == id).cloned())
    }

    async fn update_blog(&self, blog: &BlogPost) -> Result<()> {
        let mut store = self.store.write().await;
        match store.blogs.iter_mut().find(|b| b.id == blog.id) {
            Some(existing) => {
                *existing = blog.clone();
                Ok(())
            }
            None => Err(Error::NotFound(format!("blog post {}", blog.id))),
        }
    }

    async fn list_blogs(&self, offset: usize, limit: usize) -> Result<Vec<BlogPost>> {
        let store = self.store.read().await;
        let mut blogs: Vec<&BlogPost> = store.blogs.iter().collect();
        blogs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(blogs.into_iter().skip(offset).take(limit).cloned().collect())
    }

    async fn delete_blog(&self, id: i64) -> Result<bool> {
        let mut store = self.store.write().await;
        let before = store.blogs.len();
        store.blogs.retain(|b| b.id != id);
        Ok(store.blogs.len() != before)
    }

    async fn count_blogs(&self, status: Option<BlogStatus>) -> Result<usize> {
        let store = self.store.read().await;
        Ok(store
            .blogs
            .iter()
            .filter(|b| status.map_or(true, |s| b.status == s))
            .count())
    }
}

#[async_trait]
impl SettingsStorage for InMemoryStorage {
    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        Ok(self.store.read().await.settings.get(key).cloned())
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let mut store = self.store.write().await;
        store.settings.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn all_settings(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.store.read().await.settings.clone())
    }
}
