pub mod config;
pub mod error;
pub mod fetch;
pub mod models;
pub mod relevance;
pub mod storage;
pub mod text;
pub mod types;

pub use config::{Config, SharedConfig};
pub use error::{Error, Result};
pub use fetch::HttpFetcher;
pub use models::InferenceModel;
pub use relevance::RelevanceScorer;
pub use storage::{ArticleStorage, BlogStorage, SettingsStorage};
pub use types::*;
