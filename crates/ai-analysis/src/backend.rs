use analysis_core::{ProviderFailure, RateLimits};
use async_trait::async_trait;

use crate::prompt::AnalysisPrompt;

/// A chat-completion endpoint that turns a prompt into raw reply text
#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn name(&self) -> &str;

    fn is_configured(&self) -> bool;

    fn rate_limits(&self) -> RateLimits;

    async fn complete(&self, prompt: &AnalysisPrompt) -> Result<String, ProviderFailure>;
}

/// Shared by the HTTP backends.
pub(crate) async fn read_error(response: reqwest::Response) -> ProviderFailure {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    if status == 429 {
        ProviderFailure::RateLimited(body)
    } else {
        ProviderFailure::status(status, body)
    }
}
