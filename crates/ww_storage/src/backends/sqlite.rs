use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use ww_core::{
    ArticleStorage, BlogPost, BlogStatus, BlogStorage, Error, Result, RunRecord, RunStatus,
    SettingsStorage, StoredArticle,
};

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        url TEXT NOT NULL UNIQUE,
        source TEXT NOT NULL,
        summary TEXT NOT NULL DEFAULT '',
        content TEXT NOT NULL DEFAULT '',
        published_at TEXT,
        scraped_at TEXT NOT NULL,
        is_relevant INTEGER NOT NULL DEFAULT 1,
        processed_downstream INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS scrape_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ran_at TEXT NOT NULL,
        articles_found INTEGER NOT NULL,
        articles_new INTEGER NOT NULL,
        errors TEXT NOT NULL,
        status TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS blog_posts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        article_id INTEGER REFERENCES articles(id) ON DELETE SET NULL,
        headline TEXT NOT NULL,
        meta_description TEXT NOT NULL DEFAULT '',
        content TEXT NOT NULL,
        tags TEXT NOT NULL DEFAULT '[]',
        featured_image_prompt TEXT NOT NULL DEFAULT '',
        featured_image_url TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL,
        cms_post_id INTEGER,
        cms_url TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL,
        published_at TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_articles_scraped_at ON articles (scraped_at)",
];

pub struct SQLiteStorage {
    pool: Arc<SqlitePool>,
}

fn db_err(context: &str) -> impl Fn(sqlx::Error) -> Error + '_ {
    move |e| Error::Database(format!("{}: {}", context, e))
}

/// Fixed-width UTC text so lexical order matches chronological order.
fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Database(format!("bad timestamp {:?}: {}", value, e)))
}

fn parse_optional_timestamp(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value.as_deref().map(parse_timestamp).transpose()
}

fn article_from_row(row: &SqliteRow) -> Result<StoredArticle> {
    let get = db_err("Failed to read article row");
    Ok(StoredArticle {
        id: row.try_get("id").map_err(&get)?,
        title: row.try_get("title").map_err(&get)?,
        url: row.try_get("url").map_err(&get)?,
        source: row.try_get("source").map_err(&get)?,
        summary: row.try_get("summary").map_err(&get)?,
        content: row.try_get("content").map_err(&get)?,
        published_at: parse_optional_timestamp(row.try_get("published_at").map_err(&get)?)?,
        scraped_at: parse_timestamp(&row.try_get::<String, _>("scraped_at").map_err(&get)?)?,
        is_relevant: row.try_get("is_relevant").map_err(&get)?,
        processed_downstream: row.try_get("processed_downstream").map_err(&get)?,
    })
}

fn run_from_row(row: &SqliteRow) -> Result<RunRecord> {
    let get = db_err("Failed to read run row");
    let errors: String = row.try_get("errors").map_err(&get)?;
    let status: String = row.try_get("status").map_err(&get)?;
    Ok(RunRecord {
        id: row.try_get("id").map_err(&get)?,
        ran_at: parse_timestamp(&row.try_get::<String, _>("ran_at").map_err(&get)?)?,
        articles_found: row.try_get::<i64, _>("articles_found").map_err(&get)? as usize,
        articles_new: row.try_get::<i64, _>("articles_new").map_err(&get)? as usize,
        errors: serde_json::from_str(&errors)?,
        status: RunStatus::from_str(&status)?,
    })
}

fn blog_from_row(row: &SqliteRow) -> Result<BlogPost> {
    let get = db_err("Failed to read blog row");
    let tags: String = row.try_get("tags").map_err(&get)?;
    let status: String = row.try_get("status").map_err(&get)?;
    Ok(BlogPost {
        id: row.try_get("id").map_err(&get)?,
        article_id: row.try_get("article_id").map_err(&get)?,
        headline: row.try_get("headline").map_err(&get)?,
        meta_description: row.try_get("meta_description").map_err(&get)?,
        content: row.try_get("content").map_err(&get)?,
        tags: serde_json::from_str(&tags)?,
        featured_image_prompt: row.try_get("featured_image_prompt").map_err(&get)?,
        featured_image_url: row.try_get("featured_image_url").map_err(&get)?,
        status: BlogStatus::from_str(&status)?,
        cms_post_id: row.try_get("cms_post_id").map_err(&get)?,
        cms_url: row.try_get("cms_url").map_err(&get)?,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at").map_err(&get)?)?,
        published_at: parse_optional_timestamp(row.try_get("published_at").map_err(&get)?)?,
    })
}

impl SQLiteStorage {
    /// Opens (creating if needed) the database behind a `sqlite:` url and runs migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(db_err("Invalid database url"))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(db_err("Failed to connect to database"))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| Error::Database(format!("Failed to run migration {}: {}", i, e)))?;
        }

        Ok(Self { pool: Arc::new(pool) })
    }

    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::connect(&format!("sqlite:{}", db_path.display())).await
    }
}

#[async_trait]
impl ArticleStorage for SQLiteStorage {
    async fn find_by_url(&self, url: &str) -> Result<Option<StoredArticle>> {
        let row = sqlx::query("SELECT * FROM articles WHERE url = ?")
            .bind(url)
            .fetch_optional(&*self.pool)
            .await
            .map_err(db_err("Failed to look up article"))?;
        row.as_ref().map(article_from_row).transpose()
    }

    async fn insert_article(&self, article: &StoredArticle) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO articles
            (title, url, source, summary, content, published_at, scraped_at, is_relevant, processed_downstream)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&article.title)
        .bind(&article.url)
        .bind(&article.source)
        .bind(&article.summary)
        .bind(&article.content)
        .bind(article.published_at.as_ref().map(timestamp))
        .bind(timestamp(&article.scraped_at))
        .bind(article.is_relevant)
        .bind(article.processed_downstream)
        .execute(&*self.pool)
        .await;

        match result {
            Ok(done) => Ok(done.last_insert_rowid()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(Error::Duplicate(article.url.clone()))
            }
            Err(e) => Err(Error::Database(format!("Failed to store article: {}", e))),
        }
    }

    async fn get_article(&self, id: i64) -> Result<Option<StoredArticle>> {
        let row = sqlx::query("SELECT * FROM articles WHERE id = ?")
            .bind(id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(db_err("Failed to get article"))?;
        row.as_ref().map(article_from_row).transpose()
    }

    async fn list_articles(&self, offset: usize, limit: usize) -> Result<Vec<StoredArticle>> {
        let rows = sqlx::query("SELECT * FROM articles ORDER BY scraped_at DESC, id DESC LIMIT ? OFFSET ?")
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&*self.pool)
            .await
            .map_err(db_err("Failed to list articles"))?;
        rows.iter().map(article_from_row).collect()
    }

    async fn select_unprocessed(&self, limit: usize) -> Result<Vec<StoredArticle>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM articles
            WHERE is_relevant = 1 AND processed_downstream = 0
            ORDER BY scraped_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(db_err("Failed to select unprocessed articles"))?;
        rows.iter().map(article_from_row).collect()
    }

    async fn mark_processed(&self, id: i64) -> Result<()> {
        let done = sqlx::query("UPDATE articles SET processed_downstream = 1 WHERE id = ?")
            .bind(id)
            .execute(&*self.pool)
            .await
            .map_err(db_err("Failed to mark article processed"))?;
        if done.rows_affected() == 0 {
            return Err(Error::NotFound(format!("article {}", id)));
        }
        Ok(())
    }

    async fn delete_article(&self, id: i64) -> Result<bool> {
        let done = sqlx::query("DELETE FROM articles WHERE id = ?")
            .bind(id)
            .execute(&*self.pool)
            .await
            .map_err(db_err("Failed to delete article"))?;
        Ok(done.rows_affected() > 0)
    }

    async fn count_articles(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles")
            .fetch_one(&*self.pool)
            .await
            .map_err(db_err("Failed to count articles"))?;
        Ok(count as usize)
    }

    async fn count_unprocessed(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM articles WHERE is_relevant = 1 AND processed_downstream = 0",
        )
        .fetch_one(&*self.pool)
        .await
        .map_err(db_err("Failed to count unprocessed articles"))?;
        Ok(count as usize)
    }

    async fn insert_run_record(&self, record: &RunRecord) -> Result<i64> {
        let errors = serde_json::to_string(&record.errors)?;
        let done = sqlx::query(
            r#"
            INSERT INTO scrape_logs (ran_at, articles_found, articles_new, errors, status)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(timestamp(&record.ran_at))
        .bind(record.articles_found as i64)
        .bind(record.articles_new as i64)
        .bind(errors)
        .bind(record.status.as_str())
        .execute(&*self.pool)
        .await
        .map_err(db_err("Failed to store run record"))?;
        Ok(done.last_insert_rowid())
    }

    async fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>> {
        let rows = sqlx::query("SELECT * FROM scrape_logs ORDER BY ran_at DESC, id DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&*self.pool)
            .await
            .map_err(db_err("Failed to list run records"))?;
        rows.iter().map(run_from_row).collect()
    }
}

#[async_trait]
impl BlogStorage for SQLiteStorage {
    async fn insert_blog(&self, blog: &BlogPost) -> Result<i64> {
        let tags = serde_json::to_string(&blog.tags)?;
        let done = sqlx::query(
            r#"
            INSERT INTO blog_posts
            (article_id, headline, meta_description, content, tags, featured_image_prompt,
             featured_image_url, status, cms_post_id, cms_url, created_at, published_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(blog.article_id)
        .bind(&blog.headline)
        .bind(&blog.meta_description)
        .bind(&blog.content)
        .bind(tags)
        .bind(&blog.featured_image_prompt)
        .bind(&blog.featured_image_url)
        .bind(blog.status.as_str())
        .bind(blog.cms_post_id)
        .bind(&blog.cms_url)
        .bind(timestamp(&blog.created_at))
        .bind(blog.published_at.as_ref().map(timestamp))
        .execute(&*self.pool)
        .await
        .map_err(db_err("Failed to store blog post"))?;
        Ok(done.last_insert_rowid())
    }

    async fn get_blog(&self, id: i64) -> Result<Option<BlogPost>> {
        let row = sqlx::query("SELECT * FROM blog_posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(db_err("Failed to get blog post"))?;
        row.as_ref().map(blog_from_row).transpose()
    }

    async fn update_blog(&self, blog: &BlogPost) -> Result<()> {
        let tags = serde_json::to_string(&blog.tags)?;
        let done = sqlx::query(
            r#"
            UPDATE blog_posts SET
                article_id = ?, headline = ?, meta_description = ?, content = ?, tags = ?,
                featured_image_prompt = ?, featured_image_url = ?, status = ?, cms_post_id = ?,
                cms_url = ?, created_at = ?, published_at = ?
            WHERE id = ?
            "#,
        )
        .bind(blog.article_id)
        .bind(&blog.headline)
        .bind(&blog.meta_description)
        .bind(&blog.content)
        .bind(tags)
        .bind(&blog.featured_image_prompt)
        .bind(&blog.featured_image_url)
        .bind(blog.status.as_str())
        .bind(blog.cms_post_id)
        .bind(&blog.cms_url)
        .bind(timestamp(&blog.created_at))
        .bind(blog.published_at.as_ref().map(timestamp))
        .bind(blog.id)
        .execute(&*self.pool)
        .await
        .map_err(db_err("Failed to update blog post"))?;
        if done.rows_affected() == 0 {
            return Err(Error::NotFound(format!("blog post {}", blog.id)));
        }
        Ok(())
    }

    async fn list_blogs(&self, offset: usize, limit: usize) -> Result<Vec<BlogPost>> {
        let rows = sqlx::query("SELECT * FROM blog_posts ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?")
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&*self.pool)
            .await
            .map_err(db_err("Failed to list blog posts"))?;
        rows.iter().map(blog_from_row).collect()
    }

    async fn delete_blog(&self, id: i64) -> Result<bool> {
        let done = sqlx::query("DELETE FROM blog_posts WHERE id = ?")
            .bind(id)
            .execute(&*self.pool)
            .await
            .map_err(db_err("Failed to delete blog post"))?;
        Ok(done.rows_affected() > 0)
    }

    async fn count_blogs(&self, status: Option<BlogStatus>) -> Result<usize> {
        let count: i64 = match status {
            Some(status) => sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM blog_posts WHERE status = ?")
                .bind(status.as_str())
                .fetch_one(&*self.pool)
                .await,
            None => sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM blog_posts")
                .fetch_one(&*self.pool)
                .await,
        }
        .map_err(db_err("Failed to count blog posts"))?;
        Ok(count as usize)
    }
}

#[async_trait]
impl SettingsStorage for SQLiteStorage {
    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&*self.pool)
            .await
            .map_err(db_err("Failed to read setting"))?;
        Ok(value)
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(timestamp(&Utc::now()))
        .execute(&*self.pool)
        .await
        .map_err(db_err("Failed to save setting"))?;
        Ok(())
    }

    async fn all_settings(&self) -> Result<BTreeMap<String, String>> {
        let rows = sqlx::query("SELECT key, value FROM settings ORDER BY key")
            .fetch_all(&*self.pool)
            .await
            .map_err(db_err("Failed to list settings"))?;
        let get = db_err("Failed to read setting row");
        let mut settings = BTreeMap::new();
        for row in rows {
            settings.insert(row.try_get("key").map_err(&get)?, row.try_get("value").map_err(&get)?);
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::tempdir;
    use ww_core::BlogDraft;

    fn article(url: &str, scraped_at: DateTime<Utc>) -> StoredArticle {
        StoredArticle {
            id: 0,
            title: "Wastewater plant fined".to_string(),
            url: url.to_string(),
            source: "www.epa.gov".to_string(),
            summary: "Effluent limits exceeded".to_string(),
            content: "Body".to_string(),
            published_at: Some(scraped_at - Duration::days(1)),
            scraped_at,
            is_relevant: true,
            processed_downstream: false,
        }
    }

    #[tokio::test]
    async fn test_sqlite_articles() {
        let temp_dir = tempdir().unwrap();
        let storage = SQLiteStorage::new_with_path(&temp_dir.path().join("test.db"))
            .await
            .unwrap();
        let now = Utc::now();

        let id = storage.insert_article(&article("https://a.example/1", now)).await.unwrap();
        let found = storage.find_by_url("https://a.example/1").await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.title, "Wastewater plant fined");
        assert!(found.published_at.is_some());
        assert!(storage.find_by_url("https://a.example/2").await.unwrap().is_none());

        let err = storage
            .insert_article(&article("https://a.example/1", now))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_sqlite_unprocessed_order() {
        let temp_dir = tempdir().unwrap();
        let storage = SQLiteStorage::new_with_path(&temp_dir.path().join("test.db"))
            .await
            .unwrap();
        let now = Utc::now();

        storage
            .insert_article(&article("https://a.example/old", now - Duration::hours(2)))
            .await
            .unwrap();
        let newest = storage.insert_article(&article("https://a.example/new", now)).await.unwrap();

        let pending = storage.select_unprocessed(5).await.unwrap();
        assert_eq!(pending[0].id, newest);
        storage.mark_processed(newest).await.unwrap();
        let pending = storage.select_unprocessed(5).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].url, "https://a.example/old");
        assert_eq!(storage.count_unprocessed().await.unwrap(), 1);
        assert!(matches!(storage.mark_processed(99).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_sqlite_runs_blogs_settings() {
        let temp_dir = tempdir().unwrap();
        let storage = SQLiteStorage::new_with_path(&temp_dir.path().join("test.db"))
            .await
            .unwrap();

        let record = RunRecord {
            id: 0,
            ran_at: Utc::now(),
            articles_found: 3,
            articles_new: 0,
            errors: vec!["Google News error (sewage spill): timed out".to_string()],
            status: RunStatus::Failed,
        };
        storage.insert_run_record(&record).await.unwrap();
        let runs = storage.recent_runs(5).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].errors, record.errors);
        assert_eq!(runs[0].status, RunStatus::Failed);

        let draft = BlogDraft {
            headline: "Environmental Alert".to_string(),
            tags: vec!["Sewage".to_string(), "EPA".to_string()],
            content: "<p>Body</p>".to_string(),
            ..Default::default()
        };
        let id = storage
            .insert_blog(&BlogPost::from_draft(draft, None, Utc::now()))
            .await
            .unwrap();
        let mut blog = storage.get_blog(id).await.unwrap().unwrap();
        assert_eq!(blog.tags, vec!["Sewage", "EPA"]);
        blog.status = BlogStatus::Published;
        blog.cms_post_id = Some(42);
        storage.update_blog(&blog).await.unwrap();
        assert_eq!(storage.get_blog(id).await.unwrap().unwrap().cms_post_id, Some(42));
        assert_eq!(storage.count_blogs(Some(BlogStatus::Published)).await.unwrap(), 1);

        storage.set_setting("MAX_ARTICLES_PER_RUN", "5").await.unwrap();
        storage.set_setting("MAX_ARTICLES_PER_RUN", "7").await.unwrap();
        let all = storage.all_settings().await.unwrap();
        assert_eq!(all.get("MAX_ARTICLES_PER_RUN").map(String::as_str), Some("7"));
        assert_eq!(all.len(), 1);
    }
}
