use analysis_core::{
    DataProvider, FetchOptions, FetchResult, FundamentalsDomain, FundamentalsPayload, InputSource, MarketInputs,
    ProviderFailure, QuotaCost, RateLimits,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use polygon_client::PolygonClient;
use std::sync::Arc;

use crate::ratios::derive_ratios;

const PROVIDER_NAME: &str = "polygon";

/// Quota bucket for everything drawing on the one Polygon account.
pub const POLYGON_QUOTA: &str = "polygon";

/// Quarters requested: two years, enough for year-over-year growth.
const FINANCIAL_QUARTERS: u32 = 8;
const BAR_LOOKBACK_DAYS: i64 = 60;
const INPUT_NEWS_LIMIT: u32 = 20;

/// Limits of the shared Polygon bucket; every Polygon-backed provider declares these.
pub(crate) fn polygon_limits(client: &PolygonClient) -> RateLimits {
    RateLimits::new(Some(client.calls_per_minute()), None, "polygon")
}

/// Requests one input load issues: bars, news and financials.
const INPUT_LOAD_CALLS: u32 = 3;

/// Ratios derived from Polygon quarterly statements
pub struct PolygonFundamentals {
    client: Arc<PolygonClient>,
}

impl PolygonFundamentals {
    pub fn new(client: Arc<PolygonClient>) -> Self {
        Self { client }
    }

    async fn load(&self, key: &str) -> Result<FundamentalsPayload, ProviderFailure> {
        let financials = self.client.get_financials(key, FINANCIAL_QUARTERS).await?;
        if financials.is_empty() {
            return Err(ProviderFailure::Format(format!("no financial statements for {}", key)));
        }
        Ok(derive_ratios(&financials))
    }
}

#[async_trait]
impl DataProvider<FundamentalsDomain> for PolygonFundamentals {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn is_available(&self) -> bool {
        self.client.has_credentials()
    }

    fn rate_limits(&self) -> RateLimits {
        polygon_limits(&self.client)
    }

    fn quota_key(&self) -> &str {
        POLYGON_QUOTA
    }

    async fn fetch(&self, key: &str, _options: &FetchOptions, _context: &()) -> FetchResult<FundamentalsPayload> {
        FetchResult::from_outcome(key, PROVIDER_NAME, self.load(key).await)
    }
}

/// Bars, news and financials for AI analysis, fetched concurrently.
///
/// A failed piece comes back empty and is logged; the freshness score reflects the gap.
pub struct PolygonInputSource {
    client: Arc<PolygonClient>,
}

impl PolygonInputSource {
    pub fn new(client: Arc<PolygonClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl InputSource for PolygonInputSource {
    async fn load(&self, symbol: &str) -> MarketInputs {
        if !self.client.has_credentials() {
            tracing::debug!("POLYGON_API_KEY not set, analysing {} without market inputs", symbol);
            return MarketInputs {
                symbol: symbol.to_string(),
                ..Default::default()
            };
        }

        let to = Utc::now();
        let from = to - Duration::days(BAR_LOOKBACK_DAYS);

        let (bars, news, financials) = tokio::join!(
            self.client.get_aggregates(symbol, 1, "day", from, to),
            self.client.get_news(Some(symbol), INPUT_NEWS_LIMIT),
            self.client.get_financials(symbol, FINANCIAL_QUARTERS),
        );

        MarketInputs {
            symbol: symbol.to_string(),
            bars: bars.unwrap_or_else(|e| {
                tracing::warn!("Bars unavailable for {}: {}", symbol, e);
                Vec::new()
            }),
            news: news.unwrap_or_else(|e| {
                tracing::warn!("News unavailable for {}: {}", symbol, e);
                Vec::new()
            }),
            financials: financials.unwrap_or_else(|e| {
                tracing::warn!("Financials unavailable for {}: {}", symbol, e);
                Vec::new()
            }),
        }
    }

    fn quota_cost(&self) -> Option<QuotaCost> {
        self.client.has_credentials().then(|| QuotaCost {
            key: POLYGON_QUOTA.to_string(),
            calls: INPUT_LOAD_CALLS,
            limits: polygon_limits(&self.client),
        })
    }
}
