use analysis_core::{
    CacheKey, ConfigError, DataProvider, Domain, FetchOptions, FetchResult, ProviderFailure, RateLimits,
};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::batch::run_bounded;
use crate::cache::{CacheEntry, CacheStats, CacheStore, InMemoryCacheStore};
use crate::quota::{QuotaTracker, RateLimitOverride};

pub const DEFAULT_CACHE_TTL_SECS: u64 = 1800;
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_BATCH_CONCURRENCY: usize = 8;

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub cache_ttl_secs: u64,
    /// Applies to providers that do not declare their own timeout
    pub default_timeout: Duration,
    pub max_batch_concurrency: usize,
    pub rate_limit_overrides: HashMap<String, RateLimitOverride>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            default_timeout: DEFAULT_PROVIDER_TIMEOUT,
            max_batch_concurrency: DEFAULT_MAX_BATCH_CONCURRENCY,
            rate_limit_overrides: HashMap::new(),
        }
    }
}

/// Ordered provider chain with caching, quota bookkeeping and stale fallback for one domain.
///
/// Per-request failures never surface as errors: every call returns a [`FetchResult`].
pub struct AggregationEngine<D: Domain> {
    providers: RwLock<Vec<Arc<dyn DataProvider<D>>>>,
    cache: Arc<dyn CacheStore<D::Payload>>,
    ttl_secs: AtomicU64,
    quota: Arc<QuotaTracker>,
    default_timeout: Duration,
    max_batch_concurrency: usize,
    overrides: HashMap<String, RateLimitOverride>,
}

impl<D: Domain> AggregationEngine<D> {
    /// Fails only when `providers` is empty.
    pub fn new(
        providers: Vec<Arc<dyn DataProvider<D>>>,
        cache: Arc<dyn CacheStore<D::Payload>>,
        settings: EngineSettings,
    ) -> Result<Self, ConfigError> {
        if providers.is_empty() {
            return Err(ConfigError::NoProviders {
                domain: D::NAME.to_string(),
            });
        }

        Ok(Self {
            providers: RwLock::new(providers),
            cache,
            ttl_secs: AtomicU64::new(settings.cache_ttl_secs),
            quota: Arc::new(QuotaTracker::new()),
            default_timeout: settings.default_timeout,
            max_batch_concurrency: settings.max_batch_concurrency.max(1),
            overrides: settings.rate_limit_overrides,
        })
    }

    /// Default settings and a private in-memory cache.
    pub fn in_memory(providers: Vec<Arc<dyn DataProvider<D>>>) -> Result<Self, ConfigError> {
        Self::new(
            providers,
            Arc::new(InMemoryCacheStore::<D::Payload>::new()),
            EngineSettings::default(),
        )
    }

    /// Share call counts with other engines hitting the same upstream quotas.
    pub fn with_quota(mut self, quota: Arc<QuotaTracker>) -> Self {
        self.quota = quota;
        self
    }

    fn providers(&self) -> Vec<Arc<dyn DataProvider<D>>> {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.ttl_secs.load(Ordering::Relaxed) as i64)
    }

    fn effective_limits(&self, provider: &dyn DataProvider<D>) -> RateLimits {
        let declared = provider.rate_limits();
        let ov = self
            .overrides
            .get(provider.name())
            .or_else(|| self.overrides.get(provider.quota_key()));
        match ov {
            Some(ov) => ov.apply(declared),
            None => declared,
        }
    }

    /// Draw `calls` from the `quota_key` bucket for work outside a provider fetch.
    /// Returns false, drawing nothing, when the bucket lacks the headroom.
    pub fn acquire_quota(&self, quota_key: &str, declared: RateLimits, calls: u32) -> bool {
        let limits = match self.overrides.get(quota_key) {
            Some(ov) => ov.apply(declared),
            None => declared,
        };
        self.quota.try_acquire(quota_key, &limits, calls)
    }

    /// The cached result for `key` if it is valid and within TTL.
    pub async fn cached_fresh(&self, key: &str, options: &FetchOptions) -> Option<FetchResult<D::Payload>> {
        let entry = self.cache.get(&CacheKey::new(key, options)).await?;
        if entry.value.is_valid() && entry.is_fresh(self.ttl(), Utc::now()) {
            Some(entry.value)
        } else {
            None
        }
    }

    /// Fetch with the domain's default context.
    pub async fn get_result(&self, key: &str, options: &FetchOptions, use_cache: bool) -> FetchResult<D::Payload>
    where
        D::Context: Default,
    {
        self.get_result_with(key, options, &<D::Context as Default>::default(), use_cache)
            .await
    }

    /// Cache check, then providers in priority order, then stale fallback, then exhaustion.
    pub async fn get_result_with(
        &self,
        key: &str,
        options: &FetchOptions,
        context: &D::Context,
        use_cache: bool,
    ) -> FetchResult<D::Payload> {
        let cache_key = CacheKey::new(key, options);

        if use_cache {
            if let Some(hit) = self.cached_fresh(key, options).await {
                tracing::debug!("Cache hit for {} {} ({})", D::NAME, key, hit.provider());
                return hit;
            }
        }

        let mut attempts: Vec<(String, String)> = Vec::new();

        for provider in self.providers() {
            let name = provider.name().to_string();

            if !provider.is_available() {
                tracing::debug!("Skipping {} for {}: not configured", name, key);
                let failure = ProviderFailure::Unavailable("not configured".to_string());
                attempts.push((name, failure.to_string()));
                continue;
            }

            let limits = self.effective_limits(provider.as_ref());
            if !self.quota.try_acquire(provider.quota_key(), &limits, 1) {
                tracing::debug!("Skipping {} for {}: {} quota spent", name, key, provider.quota_key());
                let failure = ProviderFailure::RateLimited(format!("{} quota spent", provider.quota_key()));
                attempts.push((name, failure.to_string()));
                continue;
            }

            let timeout = provider.timeout().unwrap_or(self.default_timeout);
            let result = match tokio::time::timeout(timeout, provider.fetch(key, options, context)).await {
                Ok(result) => result,
                Err(_) => FetchResult::failure(
                    key,
                    &name,
                    &ProviderFailure::Timeout(format!("no response within {:.1}s", timeout.as_secs_f64())),
                ),
            };
            let result = D::finalize(result, context);

            if result.is_valid() {
                tracing::info!("{} served {} for {}", name, D::NAME, key);
                self.cache.insert(CacheEntry::new(cache_key, result.clone())).await;
                return result;
            }

            let reason = result.error().unwrap_or("invalid result").to_string();
            tracing::warn!("{} failed {} for {}: {}", name, D::NAME, key, reason);
            attempts.push((name, reason));
        }

        // Re-read: a concurrent request may have refreshed the entry meanwhile
        if let Some(entry) = self.cache.get(&cache_key).await {
            if entry.value.is_valid() {
                if entry.is_fresh(self.ttl(), Utc::now()) {
                    return D::finalize(entry.value, context);
                }
                tracing::warn!(
                    "All {} providers failed for {}, serving stale data from {}",
                    D::NAME,
                    key,
                    entry.value.fetched_at()
                );
                return D::finalize(entry.value.into_stale(), context);
            }
        }

        tracing::warn!("All {} providers failed for {}", D::NAME, key);
        D::finalize(FetchResult::exhausted(key, &attempts), context)
    }

    /// One result per distinct key, never all-or-nothing.
    pub async fn get_batch_result(
        &self,
        keys: &[String],
        options: &FetchOptions,
        use_cache: bool,
    ) -> BTreeMap<String, FetchResult<D::Payload>>
    where
        D::Context: Default,
    {
        self.get_batch_result_cancellable(keys, options, use_cache, &CancellationToken::new())
            .await
    }

    pub async fn get_batch_result_cancellable(
        &self,
        keys: &[String],
        options: &FetchOptions,
        use_cache: bool,
        cancel: &CancellationToken,
    ) -> BTreeMap<String, FetchResult<D::Payload>>
    where
        D::Context: Default,
    {
        let limit = self.batch_concurrency();
        tracing::info!("Fetching {} for {} keys (concurrency {})", D::NAME, keys.len(), limit);
        run_bounded(keys, limit, cancel, move |key| async move {
            self.get_result(&key, options, use_cache).await
        })
        .await
    }

    /// Tightest remaining headroom among available providers, clamped to `[1, max]`.
    /// Sequential when any provider's headroom is unknown.
    pub fn batch_concurrency(&self) -> usize {
        let mut limit = self.max_batch_concurrency;
        for provider in self.providers().iter().filter(|p| p.is_available()) {
            let limits = self.effective_limits(provider.as_ref());
            match self.quota.remaining(provider.quota_key(), &limits) {
                None => return 1,
                Some(left) => limit = limit.min(left as usize),
            }
        }
        limit.clamp(1, self.max_batch_concurrency)
    }

    /// Appends at lowest priority.
    pub fn add_provider(&self, provider: Arc<dyn DataProvider<D>>) {
        tracing::info!("Adding {} provider {}", D::NAME, provider.name());
        self.providers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(provider);
    }

    /// Applies to every later freshness check; stored timestamps are untouched.
    pub fn set_cache_ttl(&self, seconds: u64) {
        self.ttl_secs.store(seconds, Ordering::Relaxed);
    }

    pub fn cache_ttl_secs(&self) -> u64 {
        self.ttl_secs.load(Ordering::Relaxed)
    }

    /// Clear one entity (all option variants) or everything.
    pub async fn clear_cache(&self, key: Option<&str>) -> usize {
        let removed = match key {
            Some(entity) => self.cache.remove_entity(entity).await,
            None => self.cache.clear().await,
        };
        tracing::debug!("Cleared {} {} cache entries", removed, D::NAME);
        removed
    }

    pub async fn get_cache_stats(&self) -> CacheStats {
        let entries = self.cache.entries().await;
        CacheStats::classify(&entries, self.ttl(), Utc::now())
    }

    pub fn get_available_providers(&self) -> Vec<String> {
        self.providers()
            .iter()
            .filter(|p| p.is_available())
            .map(|p| p.name().to_string())
            .collect()
    }

    pub fn has_available_provider(&self) -> bool {
        self.providers().iter().any(|p| p.is_available())
    }
}
