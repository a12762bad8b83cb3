use async_trait::async_trait;

use crate::Result;

/// GET primitive shared by the source adapters and the content extractor.
///
/// Implementations apply their own timeout, headers and redirect policy, and
/// report non-success statuses as [`Error::HttpStatus`](crate::Error::HttpStatus).
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn get_text(&self, url: &str) -> Result<String>;
}
