use ai_analysis::{AiProviderKind, AnthropicBackend, ChatAnalysisProvider, OpenAiBackend};
use analysis_core::{
    AnalysisDomain, AnalysisPayload, ConfigError, DataProvider, FundamentalsDomain, FundamentalsPayload,
    SentimentDomain, SentimentPayload,
};
use data_providers::{
    AlphaVantageClient, AlphaVantageFundamentals, AlphaVantageSentiment, FinbertClient, FinbertSentiment,
    LexiconSentiment, PolygonFundamentals, PolygonInputSource,
};
use polygon_client::PolygonClient;
use std::sync::Arc;
use std::time::Duration;

use crate::analysis::AnalysisEngine;
use crate::cache::InMemoryCacheStore;
use crate::config::AggregatorConfig;
use crate::engine::AggregationEngine;
use crate::quota::QuotaTracker;

const FINBERT_TIMEOUT: Duration = Duration::from_secs(5);

/// The three domain engines, wired from configuration with one shared quota tracker.
pub struct DataServices {
    pub fundamentals: AggregationEngine<FundamentalsDomain>,
    pub sentiment: AggregationEngine<SentimentDomain>,
    pub analysis: AnalysisEngine,
}

fn chat_provider(kind: AiProviderKind, config: &AggregatorConfig) -> Arc<dyn DataProvider<AnalysisDomain>> {
    match kind {
        AiProviderKind::OpenAi => Arc::new(ChatAnalysisProvider::new(OpenAiBackend::with_base_url(
            config.openai_api_key.clone().unwrap_or_default(),
            config.openai_model.clone(),
            config.openai_base_url.clone(),
        ))),
        AiProviderKind::Anthropic => Arc::new(ChatAnalysisProvider::new(AnthropicBackend::new(
            config.anthropic_api_key.clone().unwrap_or_default(),
            config.anthropic_model.clone(),
        ))),
    }
}

impl DataServices {
    /// Providers without credentials are still registered; they report unavailable and are skipped.
    pub fn from_config(config: &AggregatorConfig) -> Result<Self, ConfigError> {
        let settings = config.engine_settings();
        let quota = Arc::new(QuotaTracker::new());

        let polygon = Arc::new(PolygonClient::new(
            config.polygon_api_key.clone().unwrap_or_default(),
            config.polygon_rate_limit,
        ));
        let alpha_vantage = Arc::new(AlphaVantageClient::new(
            config.alpha_vantage_api_key.clone().unwrap_or_default(),
        ));
        let finbert = config
            .ml_sentiment_url
            .clone()
            .map(|url| FinbertClient::new(url, FINBERT_TIMEOUT));

        let fundamentals = AggregationEngine::<FundamentalsDomain>::new(
            vec![
                Arc::new(AlphaVantageFundamentals::new(alpha_vantage.clone())),
                Arc::new(PolygonFundamentals::new(polygon.clone())),
            ],
            Arc::new(InMemoryCacheStore::<FundamentalsPayload>::new()),
            settings.clone(),
        )?
        .with_quota(quota.clone());

        let sentiment = AggregationEngine::<SentimentDomain>::new(
            vec![
                Arc::new(AlphaVantageSentiment::new(alpha_vantage)),
                Arc::new(FinbertSentiment::new(finbert, polygon.clone())),
                Arc::new(LexiconSentiment::new(polygon.clone())),
            ],
            Arc::new(InMemoryCacheStore::<SentimentPayload>::new()),
            settings.clone(),
        )?
        .with_quota(quota.clone());

        let primary = config.default_ai_provider;
        let analysis = AnalysisEngine::new(
            chat_provider(primary, config),
            Some(chat_provider(primary.alternate(), config)),
            Arc::new(PolygonInputSource::new(polygon)),
            Arc::new(InMemoryCacheStore::<AnalysisPayload>::new()),
            settings,
        )?
        .with_quota(quota);

        tracing::info!(
            "Data services ready: fundamentals {:?}, sentiment {:?}, analysis {:?}",
            fundamentals.get_available_providers(),
            sentiment.get_available_providers(),
            analysis.engine().get_available_providers()
        );

        Ok(Self {
            fundamentals,
            sentiment,
            analysis,
        })
    }
}
