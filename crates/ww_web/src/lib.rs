use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

pub mod error;
pub mod handlers;
pub mod scheduler;
pub mod state;
#[cfg(test)]
pub(crate) mod testing;

pub use error::ApiError;
pub use scheduler::{CycleReport, Scheduler, SchedulerStatus};
pub use state::{layered_config, AppState};

pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/api/scrape", post(handlers::scrape))
        .route("/api/generate", post(handlers::generate))
        .route("/api/generate/:id", post(handlers::generate_one))
        .route("/api/publish/:id", post(handlers::publish))
        .route("/api/export/:id", post(handlers::export))
        .route("/api/wordpress/test", post(handlers::wordpress_test))
        .route("/api/scheduler/start", post(handlers::scheduler_start))
        .route("/api/scheduler/stop", post(handlers::scheduler_stop))
        .route("/api/scheduler/status", get(handlers::scheduler_status))
        .route("/api/stats", get(handlers::stats))
        .route("/api/articles", get(handlers::list_articles))
        .route("/api/articles/:id", delete(handlers::delete_article))
        .route("/api/blogs", get(handlers::list_blogs))
        .route("/api/blogs/:id", delete(handlers::delete_blog))
        .route("/api/runs", get(handlers::recent_runs))
        .route("/api/settings", post(handlers::save_settings))
        .layer(cors)
        .with_state(state)
}

pub async fn serve(state: Arc<AppState>, bind_addr: &str) -> ww_core::Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    info!(addr = %listener.local_addr()?, "Admin API listening");
    axum::serve(listener, create_app(state)).await?;
    Ok(())
}
