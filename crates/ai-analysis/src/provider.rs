use analysis_core::{
    AnalysisContext, AnalysisDomain, AnalysisPayload, DataProvider, FetchOptions, FetchResult, RateLimits,
};
use async_trait::async_trait;
use std::time::Duration;

use crate::backend::ChatBackend;
use crate::prompt::PromptBuilder;
use crate::reply::parse_reply;

/// LLM replies are slower than data APIs.
const CHAT_TIMEOUT: Duration = Duration::from_secs(60);

/// Turns a chat backend into an analysis-domain provider: prompt in, validated payload out.
pub struct ChatAnalysisProvider<B> {
    backend: B,
    prompts: PromptBuilder,
}

impl<B: ChatBackend> ChatAnalysisProvider<B> {
    pub fn new(backend: B) -> Self {
        Self::with_prompts(backend, PromptBuilder::default())
    }

    pub fn with_prompts(backend: B, prompts: PromptBuilder) -> Self {
        Self { backend, prompts }
    }
}

#[async_trait]
impl<B: ChatBackend> DataProvider<AnalysisDomain> for ChatAnalysisProvider<B> {
    fn name(&self) -> &str {
        self.backend.name()
    }

    fn is_available(&self) -> bool {
        self.backend.is_configured()
    }

    fn rate_limits(&self) -> RateLimits {
        self.backend.rate_limits()
    }

    fn timeout(&self) -> Option<Duration> {
        Some(CHAT_TIMEOUT)
    }

    async fn fetch(
        &self,
        key: &str,
        _options: &FetchOptions,
        context: &AnalysisContext,
    ) -> FetchResult<AnalysisPayload> {
        let prompt = self.prompts.build(&context.inputs);
        tracing::debug!(
            "Requesting {} analysis for {} ({} prompt chars)",
            self.backend.name(),
            key,
            prompt.user.len()
        );
        let outcome = match self.backend.complete(&prompt).await {
            Ok(reply) => parse_reply(&reply).inspect_err(|e| {
                tracing::debug!("Unusable {} reply for {}: {}", self.backend.name(), key, e);
            }),
            Err(e) => Err(e),
        };
        FetchResult::from_outcome(key, self.backend.name(), outcome).with_freshness(context.freshness)
    }
}
