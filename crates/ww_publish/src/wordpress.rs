use chrono::Utc;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info, warn};
use ww_core::config::WORDPRESS_PLACEHOLDER_URL;
use ww_core::{BlogPost, BlogStatus, BlogStorage, Config, Error, Result};

const USER_AGENT: &str = "WasteWatch/1.0";
const AUTH_TIMEOUT: Duration = Duration::from_secs(10);
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Pending,
    Publish,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Pending => "pending",
            PostStatus::Publish => "publish",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionStatus {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl ConnectionStatus {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            user: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRef {
    pub id: i64,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedPost {
    pub post_id: i64,
    pub url: String,
    pub message: String,
}

#[derive(Deserialize)]
struct WpUser {
    name: Option<String>,
}

#[derive(Deserialize)]
struct WpTerm {
    id: i64,
}

#[derive(Deserialize)]
struct WpMedia {
    id: i64,
    #[serde(default)]
    source_url: String,
}

#[derive(Deserialize)]
struct WpPost {
    id: i64,
    #[serde(default)]
    link: String,
}

#[derive(Deserialize)]
struct WpError {
    message: Option<String>,
}

/// Client for the WordPress REST API (`{site}/wp-json/wp/v2`) using an
/// application password.
pub struct WordPressClient {
    client: Client,
    site_url: String,
    username: String,
    app_password: String,
}

impl WordPressClient {
    pub fn new(site_url: &str, username: &str, app_password: &str) -> Result<Self> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            site_url: site_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            app_password: app_password.to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.wordpress_url,
            &config.wordpress_username,
            &config.wordpress_app_password,
        )
    }

    pub fn is_configured(&self) -> bool {
        !self.site_url.is_empty()
            && !self.username.is_empty()
            && !self.app_password.is_empty()
            && self.site_url != WORDPRESS_PLACEHOLDER_URL
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/wp-json/wp/v2{}", self.site_url, path)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(self.endpoint(path))
            .basic_auth(&self.username, Some(&self.app_password))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(self.endpoint(path))
            .basic_auth(&self.username, Some(&self.app_password))
    }

    fn require_configured(&self) -> Result<()> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(Error::Config("WordPress not configured".to_string()))
        }
    }

    /// Check the credentials against `/users/me`. Never fails; the outcome is
    /// reported in the returned status.
    pub async fn test_connection(&self) -> ConnectionStatus {
        if !self.is_configured() {
            return ConnectionStatus::failed("WordPress is not configured. Set the WORDPRESS_* settings.");
        }

        let response = match self.get("/users/me").timeout(AUTH_TIMEOUT).send().await {
            Ok(response) => response,
            Err(e) if e.is_connect() => {
                return ConnectionStatus::failed(format!("Cannot connect to {}. Check the URL.", self.site_url))
            }
            Err(e) => return ConnectionStatus::failed(format!("Connection error: {}", e)),
        };

        if response.status() != StatusCode::OK {
            return ConnectionStatus::failed(format!(
                "Authentication failed (HTTP {})",
                response.status().as_u16()
            ));
        }

        match response.json::<WpUser>().await {
            Ok(user) => {
                let name = user.name.unwrap_or_else(|| "Unknown".to_string());
                ConnectionStatus {
                    success: true,
                    message: format!("Connected as: {}", name),
                    user: Some(name),
                }
            }
            Err(e) => ConnectionStatus::failed(format!("Connection error: {}", e)),
        }
    }

    pub async fn upload_media(&self, path: &Path) -> Result<MediaRef> {
        self.require_configured()?;
        if !path.exists() {
            warn!(path = %path.display(), "Image not found");
            return Err(Error::NotFound(path.display().to_string()));
        }

        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let response = self
            .post("/media")
            .timeout(UPLOAD_TIMEOUT)
            .header("Content-Type", media_type(path))
            .header("Content-Disposition", format!("attachment; filename=\"{}\"", filename))
            .body(bytes)
            .send()
            .await?;

        if response.status() != StatusCode::CREATED {
            let status = response.status().as_u16();
            error!(status, "Image upload failed");
            return Err(Error::Publish(format!("Image upload failed (HTTP {})", status)));
        }

        let media: WpMedia = response.json().await?;
        info!(url = %media.source_url, "Image uploaded");
        Ok(MediaRef {
            id: media.id,
            url: media.source_url,
        })
    }

    /// Resolve tag names to ids, creating missing tags. Tags that fail are
    /// logged and left out.
    pub async fn ensure_tags(&self, names: &[String]) -> Vec<i64> {
        let mut ids = Vec::new();
        for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
            match self.find_or_create_tag(name).await {
                Ok(Some(id)) => ids.push(id),
                Ok(None) => warn!(tag = name, "Tag could not be created"),
                Err(e) => warn!(tag = name, error = %e, "Tag creation error"),
            }
        }
        ids
    }

    async fn find_or_create_tag(&self, name: &str) -> Result<Option<i64>> {
        let response = self
            .get("/tags")
            .query(&[("search", name)])
            .timeout(AUTH_TIMEOUT)
            .send()
            .await?;
        if response.status() == StatusCode::OK {
            let existing: Vec<WpTerm> = response.json().await?;
            if let Some(term) = existing.first() {
                return Ok(Some(term.id));
            }
        }

        let response = self
            .post("/tags")
            .json(&json!({ "name": name }))
            .timeout(AUTH_TIMEOUT)
            .send()
            .await?;
        if response.status() != StatusCode::CREATED {
            return Ok(None);
        }
        let created: WpTerm = response.json().await?;
        Ok(Some(created.id))
    }

    /// Create the post and record the CMS id, link and status on `blog`.
    pub async fn publish_post(
        &self,
        blogs: &dyn BlogStorage,
        blog: &mut BlogPost,
        status: PostStatus,
        featured_media: Option<i64>,
    ) -> Result<PublishedPost> {
        self.require_configured()?;

        let mut body = json!({
            "title": blog.headline,
            "content": blog.content,
            "status": status.as_str(),
            "excerpt": blog.meta_description,
            "format": "standard",
        });
        let tag_ids = self.ensure_tags(&blog.tags).await;
        if !tag_ids.is_empty() {
            body["tags"] = json!(tag_ids);
        }
        if let Some(media) = featured_media {
            body["featured_media"] = json!(media);
        }

        let response = self
            .post("/posts")
            .json(&body)
            .timeout(UPLOAD_TIMEOUT)
            .send()
            .await?;

        if response.status() != StatusCode::CREATED {
            let message = response
                .json::<WpError>()
                .await
                .ok()
                .and_then(|e| e.message)
                .unwrap_or_else(|| "Unknown error".to_string());
            error!(blog_id = blog.id, %message, "WordPress publish failed");
            return Err(Error::Publish(format!("Publish failed: {}", message)));
        }

        let post: WpPost = response.json().await?;
        blog.cms_post_id = Some(post.id);
        blog.cms_url = post.link.clone();
        blog.status = match status {
            PostStatus::Publish => BlogStatus::Published,
            _ => BlogStatus::Ready,
        };
        blog.published_at = Some(Utc::now());
        blogs.update_blog(blog).await?;

        info!(blog_id = blog.id, url = %post.link, "Published to WordPress");
        let message = match status {
            PostStatus::Publish => "Post published!",
            _ => "Post saved as draft!",
        };
        Ok(PublishedPost {
            post_id: post.id,
            url: post.link,
            message: message.to_string(),
        })
    }

    pub async fn publish_as_draft(&self, blogs: &dyn BlogStorage, blog: &mut BlogPost) -> Result<PublishedPost> {
        self.publish_post(blogs, blog, PostStatus::Draft, None).await
    }
}

impl fmt::Debug for WordPressClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WordPressClient")
            .field("site_url", &self.site_url)
            .field("username", &self.username)
            .field("app_password", &"<redacted>")
            .finish()
    }
}

fn media_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Query, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use ww_core::BlogDraft;
    use ww_storage::InMemoryStorage;

    const AUTH: &str = "Basic YWRtaW46c2VjcmV0";

    #[derive(Clone, Default)]
    struct Recorded {
        posts: Arc<Mutex<Vec<Value>>>,
        media_headers: Arc<Mutex<Vec<String>>>,
    }

    fn wordpress_router(recorded: Recorded) -> Router {
        Router::new()
            .route(
                "/wp-json/wp/v2/users/me",
                get(|headers: HeaderMap| async move {
                    if headers.get("authorization").and_then(|v| v.to_str().ok()) == Some(AUTH) {
                        (StatusCode::OK, Json(json!({"name": "Admin"})))
                    } else {
                        (StatusCode::UNAUTHORIZED, Json(json!({"message": "bad auth"})))
                    }
                }),
            )
            .route(
                "/wp-json/wp/v2/tags",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    if q.get("search").map(String::as_str) == Some("sewage") {
                        Json(json!([{"id": 7, "name": "sewage"}]))
                    } else {
                        Json(json!([]))
                    }
                })
                .post(|Json(body): Json<Value>| async move {
                    if body["name"] == "broken" {
                        (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({})))
                    } else {
                        (StatusCode::CREATED, Json(json!({"id": 100})))
                    }
                }),
            )
            .route(
                "/wp-json/wp/v2/posts",
                post(|State(rec): State<Recorded>, Json(body): Json<Value>| async move {
                    if body["title"] == "" {
                        return (StatusCode::BAD_REQUEST, Json(json!({"message": "Content, title, and excerpt are empty."})));
                    }
                    rec.posts.lock().unwrap().push(body);
                    (StatusCode::CREATED, Json(json!({"id": 42, "link": "https://wp.example/?p=42"})))
                }),
            )
            .route(
                "/wp-json/wp/v2/media",
                post(|State(rec): State<Recorded>, headers: HeaderMap| async move {
                    let disposition = headers
                        .get("content-disposition")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    rec.media_headers.lock().unwrap().push(disposition);
                    (StatusCode::CREATED, Json(json!({"id": 5, "source_url": "https://wp.example/spill.jpg"})))
                }),
            )
            .with_state(recorded)
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn stored_blog(storage: &InMemoryStorage, headline: &str) -> BlogPost {
        let draft = BlogDraft {
            headline: headline.to_string(),
            meta_description: "What happened".to_string(),
            tags: vec!["sewage".to_string(), "broken".to_string(), "PFAS".to_string()],
            featured_image_prompt: String::new(),
            content: "<p>Body</p>".to_string(),
        };
        let mut blog = BlogPost::from_draft(draft, None, Utc::now());
        blog.id = storage.insert_blog(&blog).await.unwrap();
        blog
    }

    #[test]
    fn test_is_configured() {
        assert!(!WordPressClient::new("", "admin", "secret").unwrap().is_configured());
        assert!(!WordPressClient::new(WORDPRESS_PLACEHOLDER_URL, "admin", "secret")
            .unwrap()
            .is_configured());
        assert!(WordPressClient::new("https://blog.example/", "admin", "secret")
            .unwrap()
            .is_configured());
    }

    #[tokio::test]
    async fn test_connection_reports_user_and_auth_failure() {
        let base = serve(wordpress_router(Recorded::default())).await;

        let ok = WordPressClient::new(&base, "admin", "secret").unwrap().test_connection().await;
        assert!(ok.success);
        assert_eq!(ok.message, "Connected as: Admin");

        let denied = WordPressClient::new(&base, "admin", "wrong").unwrap().test_connection().await;
        assert!(!denied.success);
        assert_eq!(denied.message, "Authentication failed (HTTP 401)");

        let unconfigured = WordPressClient::new("", "", "").unwrap().test_connection().await;
        assert!(!unconfigured.success);
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let status = WordPressClient::new(&base, "admin", "secret").unwrap().test_connection().await;
        assert!(!status.success);
        assert!(status.message.starts_with("Cannot connect to") || status.message.starts_with("Connection error"));
    }

    #[tokio::test]
    async fn test_publish_as_draft_updates_blog() {
        let recorded = Recorded::default();
        let base = serve(wordpress_router(recorded.clone())).await;
        let storage = InMemoryStorage::new();
        let mut blog = stored_blog(&storage, "Sewage crisis").await;

        let client = WordPressClient::new(&base, "admin", "secret").unwrap();
        let published = client.publish_as_draft(&storage, &mut blog).await.unwrap();
        assert_eq!(published.post_id, 42);
        assert_eq!(published.message, "Post saved as draft!");

        let sent = recorded.posts.lock().unwrap()[0].clone();
        assert_eq!(sent["status"], "draft");
        assert_eq!(sent["excerpt"], "What happened");
        assert_eq!(sent["format"], "standard");
        assert_eq!(sent["tags"], json!([7, 100]));

        let saved = storage.get_blog(blog.id).await.unwrap().unwrap();
        assert_eq!(saved.status, BlogStatus::Ready);
        assert_eq!(saved.cms_post_id, Some(42));
        assert_eq!(saved.cms_url, "https://wp.example/?p=42");
        assert!(saved.published_at.is_some());
    }

    #[tokio::test]
    async fn test_publish_status_and_failure_message() {
        let base = serve(wordpress_router(Recorded::default())).await;
        let storage = InMemoryStorage::new();
        let client = WordPressClient::new(&base, "admin", "secret").unwrap();

        let mut blog = stored_blog(&storage, "Live post").await;
        client
            .publish_post(&storage, &mut blog, PostStatus::Publish, Some(5))
            .await
            .unwrap();
        assert_eq!(blog.status, BlogStatus::Published);

        let mut empty = stored_blog(&storage, "").await;
        let err = client.publish_as_draft(&storage, &mut empty).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Publish error: Publish failed: Content, title, and excerpt are empty."
        );
        assert_eq!(storage.get_blog(empty.id).await.unwrap().unwrap().status, BlogStatus::Draft);
    }

    #[tokio::test]
    async fn test_publish_requires_configuration() {
        let storage = InMemoryStorage::new();
        let mut blog = stored_blog(&storage, "Anything").await;
        let client = WordPressClient::new(WORDPRESS_PLACEHOLDER_URL, "admin", "secret").unwrap();
        assert!(matches!(
            client.publish_as_draft(&storage, &mut blog).await,
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_upload_media() {
        let recorded = Recorded::default();
        let base = serve(wordpress_router(recorded.clone())).await;
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("spill.jpg");
        std::fs::write(&image, b"\xff\xd8\xff").unwrap();

        let client = WordPressClient::new(&base, "admin", "secret").unwrap();
        let media = client.upload_media(&image).await.unwrap();
        assert_eq!(media, MediaRef { id: 5, url: "https://wp.example/spill.jpg".to_string() });
        assert_eq!(
            recorded.media_headers.lock().unwrap()[0],
            "attachment; filename=\"spill.jpg\""
        );

        let missing = client.upload_media(&dir.path().join("nope.jpg")).await;
        assert!(matches!(missing, Err(Error::NotFound(_))));
    }
}
