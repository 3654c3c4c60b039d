use async_trait::async_trait;
use std::time::Duration;

use crate::{Domain, FetchOptions, FetchResult, MarketInputs, QuotaCost, RateLimits};

/// Adapter to one upstream source for a domain.
///
/// `fetch` never returns an error: transport, status and decode failures come back as an
/// invalid [`FetchResult`] tagged with this provider's name.
#[async_trait]
pub trait DataProvider<D: Domain>: Send + Sync {
    fn name(&self) -> &str;

    /// Whether required configuration (credentials, endpoint) is present.
    fn is_available(&self) -> bool;

    fn rate_limits(&self) -> RateLimits;

    /// Bucket the calls are counted against. Providers backed by one upstream account
    /// must return the same key so they share its headroom.
    fn quota_key(&self) -> &str {
        self.name()
    }

    /// Per-call timeout; the engine's default applies when `None`.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    async fn fetch(
        &self,
        key: &str,
        options: &FetchOptions,
        context: &D::Context,
    ) -> FetchResult<D::Payload>;
}

/// Loads the raw market inputs an AI analysis is built from
#[async_trait]
pub trait InputSource: Send + Sync {
    async fn load(&self, symbol: &str) -> MarketInputs;

    /// Upstream calls one `load` makes, if they count against a rate-limited quota.
    fn quota_cost(&self) -> Option<QuotaCost> {
        None
    }
}
