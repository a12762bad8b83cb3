use async_trait::async_trait;

use crate::Result;

#[async_trait]
pub trait InferenceModel: Send + Sync {
    /// Short label for logs.
    fn name(&self) -> &str;

    /// Run one chat turn and return the assistant text.
    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;
}
