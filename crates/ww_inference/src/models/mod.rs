use std::sync::Arc;
use tracing::info;
use ww_core::{Config, InferenceModel, Result};

pub mod chat;
pub mod demo;

pub use chat::ChatCompletionModel;
pub use demo::DemoModel;

/// The configured chat model, or `None` in demo mode (no API key).
pub fn create_model(config: &Config) -> Result<Option<Arc<dyn InferenceModel>>> {
    if config.demo_mode() {
        info!("No LLM API key configured, blog posts will use the demo writer");
        return Ok(None);
    }
    let model = ChatCompletionModel::new(
        config.llm_api_key.clone(),
        config.llm_base_url.clone(),
        config.llm_model.clone(),
    )?;
    info!(model = model.name(), base_url = %config.llm_base_url, "Using chat completion model");
    Ok(Some(Arc::new(model)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_mode_has_no_model() {
        assert!(create_model(&Config::default()).unwrap().is_none());

        let mut config = Config::default();
        config.apply("LLM_API_KEY", "pplx-test").unwrap();
        let model = create_model(&config).unwrap().unwrap();
        assert_eq!(model.name(), "sonar-pro");
    }
}
