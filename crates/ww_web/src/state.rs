use std::sync::Arc;
use ww_core::{Config, HttpFetcher, Result, SettingsStorage, SharedConfig};
use ww_inference::BlogGenerator;
use ww_scrapers::{Pipeline, Politeness};
use ww_storage::StorageSet;

use crate::scheduler::Scheduler;

pub struct AppState {
    /// Defaults plus environment, before stored settings are layered on.
    pub base_config: Config,
    pub config: SharedConfig,
    pub storage: StorageSet,
    pub pipeline: Arc<Pipeline>,
    pub generator: Arc<BlogGenerator>,
    pub scheduler: Scheduler,
}

impl AppState {
    pub async fn new(
        base_config: Config,
        storage: StorageSet,
        fetcher: Arc<dyn HttpFetcher>,
        politeness: Politeness,
    ) -> Result<Self> {
        let config = layered_config(&base_config, &*storage.settings).await?.shared();
        let pipeline = Arc::new(
            Pipeline::new(config.clone(), storage.articles.clone(), fetcher).with_politeness(politeness),
        );
        let generator = Arc::new(
            BlogGenerator::from_config(config.clone(), storage.articles.clone(), storage.blogs.clone()).await?,
        );
        let scheduler = Scheduler::new(
            config.clone(),
            pipeline.clone(),
            generator.clone(),
            storage.blogs.clone(),
        );
        Ok(Self {
            base_config,
            config,
            storage,
            pipeline,
            generator,
            scheduler,
        })
    }

    /// Re-layer stored settings over the base config and rebuild the model.
    pub async fn refresh_config(&self) -> Result<()> {
        let fresh = layered_config(&self.base_config, &*self.storage.settings).await?;
        *self.config.write().await = fresh;
        self.generator.reload_model().await
    }
}

/// `base` with every non-empty stored setting applied on top.
pub async fn layered_config(base: &Config, settings: &dyn SettingsStorage) -> Result<Config> {
    let mut config = base.clone();
    config.apply_overrides(settings.all_settings().await?)?;
    Ok(config)
}
