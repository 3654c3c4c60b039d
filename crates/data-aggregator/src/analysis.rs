use analysis_core::{
    AnalysisContext, AnalysisDomain, AnalysisPayload, ConfigError, DataProvider, FetchOptions, FetchResult,
    InputSource, MarketInputs,
};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::batch::run_bounded;
use crate::cache::CacheStore;
use crate::engine::{AggregationEngine, EngineSettings};
use crate::freshness::FreshnessScorer;
use crate::quota::QuotaTracker;

/// AI analysis: a primary model with an optional alternate, fed by freshly loaded inputs.
///
/// The two models form an ordinary provider chain of length two, so caching, fallback and
/// stale handling are exactly those of [`AggregationEngine`].
pub struct AnalysisEngine {
    chain: AggregationEngine<AnalysisDomain>,
    inputs: Arc<dyn InputSource>,
    scorer: FreshnessScorer,
}

impl AnalysisEngine {
    pub fn new(
        primary: Arc<dyn DataProvider<AnalysisDomain>>,
        alternate: Option<Arc<dyn DataProvider<AnalysisDomain>>>,
        inputs: Arc<dyn InputSource>,
        cache: Arc<dyn CacheStore<AnalysisPayload>>,
        settings: EngineSettings,
    ) -> Result<Self, ConfigError> {
        let mut providers = vec![primary];
        providers.extend(alternate);
        Ok(Self {
            chain: AggregationEngine::new(providers, cache, settings)?,
            inputs,
            scorer: FreshnessScorer::default(),
        })
    }

    /// Count model calls and input loads in a tracker shared with other engines.
    pub fn with_quota(mut self, quota: Arc<QuotaTracker>) -> Self {
        self.chain = self.chain.with_quota(quota);
        self
    }

    pub fn with_scorer(mut self, scorer: FreshnessScorer) -> Self {
        self.scorer = scorer;
        self
    }

    /// Cache administration and provider listing.
    pub fn engine(&self) -> &AggregationEngine<AnalysisDomain> {
        &self.chain
    }

    pub async fn get_result(&self, key: &str, options: &FetchOptions, use_cache: bool) -> FetchResult<AnalysisPayload> {
        if use_cache {
            if let Some(hit) = self.chain.cached_fresh(key, options).await {
                tracing::debug!("Cache hit for analysis {}", key);
                return hit;
            }
        }

        let inputs = self.load_inputs(key).await;
        let report = self.scorer.score(&inputs, Utc::now());
        tracing::debug!("Inputs for {} scored {} for freshness", key, report.score);

        let context = AnalysisContext {
            inputs,
            freshness: report.score,
        };
        self.chain.get_result_with(key, options, &context, false).await
    }

    /// Empty inputs when the upstream quota cannot cover a load; the freshness score records the gap.
    async fn load_inputs(&self, key: &str) -> MarketInputs {
        if let Some(cost) = self.inputs.quota_cost() {
            if !self.chain.acquire_quota(&cost.key, cost.limits, cost.calls) {
                tracing::warn!("{} quota spent, analysing {} without market inputs", cost.key, key);
                return MarketInputs {
                    symbol: key.to_string(),
                    ..Default::default()
                };
            }
        }
        self.inputs.load(key).await
    }

    pub async fn get_batch_result(
        &self,
        keys: &[String],
        options: &FetchOptions,
        use_cache: bool,
        cancel: &CancellationToken,
    ) -> BTreeMap<String, FetchResult<AnalysisPayload>> {
        let limit = self.chain.batch_concurrency();
        tracing::info!("Running analysis for {} keys (concurrency {})", keys.len(), limit);
        run_bounded(keys, limit, cancel, move |key| async move {
            self.get_result(&key, options, use_cache).await
        })
        .await
    }
}
