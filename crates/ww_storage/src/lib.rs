use std::fmt;
use std::sync::Arc;
use ww_core::{ArticleStorage, BlogStorage, Result, SettingsStorage};

pub mod backends;

pub use backends::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StorageKind {
    Memory,
    #[cfg(feature = "sqlite")]
    Sqlite,
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageKind::Memory => write!(f, "memory"),
            #[cfg(feature = "sqlite")]
            StorageKind::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl Default for StorageKind {
    fn default() -> Self {
        #[cfg(feature = "sqlite")]
        {
            Self::Sqlite
        }
        #[cfg(not(feature = "sqlite"))]
        {
            Self::Memory
        }
    }
}

/// The three record stores, all served by one backend instance.
#[derive(Clone)]
pub struct StorageSet {
    pub articles: Arc<dyn ArticleStorage>,
    pub blogs: Arc<dyn BlogStorage>,
    pub settings: Arc<dyn SettingsStorage>,
}

impl StorageSet {
    pub fn from_backend<B>(backend: B) -> Self
    where
        B: ArticleStorage + BlogStorage + SettingsStorage + 'static,
    {
        let backend = Arc::new(backend);
        Self {
            articles: backend.clone(),
            blogs: backend.clone(),
            settings: backend,
        }
    }

    pub fn in_memory() -> Self {
        Self::from_backend(InMemoryStorage::new())
    }
}

pub async fn create_storage(kind: StorageKind, database_url: &str) -> Result<StorageSet> {
    match kind {
        StorageKind::Memory => {
            tracing::info!(ignored_url = %database_url, "Using in-memory storage");
            Ok(StorageSet::in_memory())
        }
        #[cfg(feature = "sqlite")]
        StorageKind::Sqlite => {
            tracing::info!(%database_url, "Using SQLite storage");
            let backend = SQLiteStorage::connect(database_url).await?;
            Ok(StorageSet::from_backend(backend))
        }
    }
}
