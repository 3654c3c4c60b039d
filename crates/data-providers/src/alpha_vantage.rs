use analysis_core::{
    DataProvider, FetchOptions, FetchResult, FundamentalsDomain, FundamentalsPayload, ProviderFailure,
    RateLimits, SentimentDomain, SentimentPayload,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const BASE_URL: &str = "https://www.alphavantage.co/query";
const PROVIDER_NAME: &str = "alpha_vantage";

#[derive(Clone)]
pub struct AlphaVantageClient {
    api_key: String,
    client: reqwest::Client,
}

/// Subset of the OVERVIEW endpoint. Alpha Vantage sends every number as a string.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CompanyOverview {
    #[serde(rename = "Symbol", default)]
    pub symbol: String,
    #[serde(rename = "LatestQuarter", default)]
    pub latest_quarter: Option<String>,
    #[serde(rename = "PERatio", default)]
    pub pe_ratio: Option<String>,
    #[serde(rename = "PEGRatio", default)]
    pub peg_ratio: Option<String>,
    #[serde(rename = "PriceToBookRatio", default)]
    pub price_to_book: Option<String>,
    #[serde(rename = "EPS", default)]
    pub eps: Option<String>,
    #[serde(rename = "DividendYield", default)]
    pub dividend_yield: Option<String>,
    #[serde(rename = "ProfitMargin", default)]
    pub profit_margin: Option<String>,
    #[serde(rename = "OperatingMarginTTM", default)]
    pub operating_margin: Option<String>,
    #[serde(rename = "ReturnOnEquityTTM", default)]
    pub roe: Option<String>,
    #[serde(rename = "ReturnOnAssetsTTM", default)]
    pub roa: Option<String>,
    #[serde(rename = "QuarterlyRevenueGrowthYOY", default)]
    pub revenue_growth_yoy: Option<String>,
    #[serde(rename = "Beta", default)]
    pub beta: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewsSentimentFeed {
    #[serde(default)]
    pub feed: Vec<FeedItem>,
}

#[derive(Debug, Deserialize)]
pub struct FeedItem {
    pub title: String,
    #[serde(default)]
    pub ticker_sentiment: Vec<TickerSentiment>,
}

#[derive(Debug, Deserialize)]
pub struct TickerSentiment {
    pub ticker: String,
    pub relevance_score: String,
    pub ticker_sentiment_score: String,
}

/// "None", "-" and empty strings are how the API spells a missing value.
fn parse_number(raw: &Option<String>) -> Option<f64> {
    raw.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "None" && *s != "-")
        .and_then(|s| s.parse::<f64>().ok())
}

/// Alpha Vantage reports errors and throttling with HTTP 200 and a marker key.
fn check_body(json: &serde_json::Value) -> Result<(), ProviderFailure> {
    if let Some(error) = json.get("Error Message") {
        return Err(ProviderFailure::Format(format!("Alpha Vantage error: {}", error)));
    }
    if let Some(note) = json.get("Note").or_else(|| json.get("Information")) {
        return Err(ProviderFailure::RateLimited(format!("Alpha Vantage: {}", note)));
    }
    if json.as_object().map_or(true, |obj| obj.is_empty()) {
        return Err(ProviderFailure::Format("empty response body".to_string()));
    }
    Ok(())
}

impl AlphaVantageClient {
    pub fn new(api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { api_key, client }
    }

    pub fn has_credentials(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    async fn query(&self, params: &[(&str, &str)]) -> Result<serde_json::Value, ProviderFailure> {
        let response = self
            .client
            .get(BASE_URL)
            .query(params)
            .query(&[("apikey", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderFailure::status(
                status.as_u16(),
                response.text().await.unwrap_or_default(),
            ));
        }

        let json: serde_json::Value = response.json().await?;
        check_body(&json)?;
        Ok(json)
    }

    /// Get company overview (fundamental ratios)
    pub async fn get_company_overview(&self, symbol: &str) -> Result<CompanyOverview, ProviderFailure> {
        let json = self.query(&[("function", "OVERVIEW"), ("symbol", symbol)]).await?;
        Ok(serde_json::from_value(json)?)
    }

    /// Get ticker-scoped news sentiment
    pub async fn get_news_sentiment(&self, symbol: &str, limit: u32) -> Result<NewsSentimentFeed, ProviderFailure> {
        let limit = limit.to_string();
        let json = self
            .query(&[("function", "NEWS_SENTIMENT"), ("tickers", symbol), ("limit", limit.as_str())])
            .await?;
        Ok(serde_json::from_value(json)?)
    }
}

/// Ratios from OVERVIEW. Fractions (margins, returns, yield) are converted to percent.
pub fn overview_to_fundamentals(overview: &CompanyOverview) -> FundamentalsPayload {
    let pct = |raw: &Option<String>| parse_number(raw).map(|v| v * 100.0);

    let mut payload = FundamentalsPayload {
        fiscal_period: overview.latest_quarter.clone(),
        ..Default::default()
    };
    payload.set("pe_ratio", parse_number(&overview.pe_ratio));
    payload.set("peg_ratio", parse_number(&overview.peg_ratio));
    payload.set("price_to_book", parse_number(&overview.price_to_book));
    payload.set("eps", parse_number(&overview.eps));
    payload.set("beta", parse_number(&overview.beta));
    payload.set("dividend_yield", pct(&overview.dividend_yield));
    payload.set("profit_margin", pct(&overview.profit_margin));
    payload.set("operating_margin", pct(&overview.operating_margin));
    payload.set("roe", pct(&overview.roe));
    payload.set("roa", pct(&overview.roa));
    payload.set("revenue_growth_yoy", pct(&overview.revenue_growth_yoy));
    payload
}

/// Relevance-weighted average of the per-ticker scores for `symbol`.
///
/// Articles that do not mention the ticker are ignored; none at all is a format failure.
pub fn aggregate_feed(symbol: &str, feed: &NewsSentimentFeed) -> Result<SentimentPayload, ProviderFailure> {
    let mut weighted = 0.0;
    let mut total_relevance = 0.0;
    let mut count = 0usize;

    for item in &feed.feed {
        let Some(entry) = item.ticker_sentiment.iter().find(|t| t.ticker.eq_ignore_ascii_case(symbol)) else {
            continue;
        };
        let relevance = entry.relevance_score.trim().parse::<f64>().ok().filter(|v| v.is_finite());
        let score = entry.ticker_sentiment_score.trim().parse::<f64>().ok().filter(|v| v.is_finite());
        if let (Some(relevance), Some(score)) = (relevance, score) {
            weighted += score * relevance;
            total_relevance += relevance;
            count += 1;
        }
    }

    if count == 0 || total_relevance <= 0.0 {
        return Err(ProviderFailure::Format(format!("no scored articles mention {}", symbol)));
    }

    let score = weighted / total_relevance;
    let mean_relevance = total_relevance / count as f64;
    let coverage = (count as f64 / 10.0).min(1.0);
    let confidence = 0.5 * mean_relevance + 0.5 * coverage;

    Ok(SentimentPayload::new(score, confidence, count))
}

fn rate_limits() -> RateLimits {
    RateLimits::new(Some(5), Some(500), "free")
}

/// Fundamentals from the OVERVIEW endpoint
pub struct AlphaVantageFundamentals {
    client: Arc<AlphaVantageClient>,
}

impl AlphaVantageFundamentals {
    pub fn new(client: Arc<AlphaVantageClient>) -> Self {
        Self { client }
    }

    async fn load(&self, key: &str) -> Result<FundamentalsPayload, ProviderFailure> {
        let overview = self.client.get_company_overview(key).await?;
        if overview.symbol.is_empty() {
            return Err(ProviderFailure::Format(format!("no overview for {}", key)));
        }
        Ok(overview_to_fundamentals(&overview))
    }
}

#[async_trait]
impl DataProvider<FundamentalsDomain> for AlphaVantageFundamentals {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn is_available(&self) -> bool {
        self.client.has_credentials()
    }

    fn rate_limits(&self) -> RateLimits {
        rate_limits()
    }

    async fn fetch(&self, key: &str, _options: &FetchOptions, _context: &()) -> FetchResult<FundamentalsPayload> {
        FetchResult::from_outcome(key, PROVIDER_NAME, self.load(key).await)
    }
}

/// Sentiment from the NEWS_SENTIMENT endpoint
pub struct AlphaVantageSentiment {
    client: Arc<AlphaVantageClient>,
}

impl AlphaVantageSentiment {
    pub fn new(client: Arc<AlphaVantageClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataProvider<SentimentDomain> for AlphaVantageSentiment {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn is_available(&self) -> bool {
        self.client.has_credentials()
    }

    fn rate_limits(&self) -> RateLimits {
        rate_limits()
    }

    async fn fetch(&self, key: &str, options: &FetchOptions, _context: &()) -> FetchResult<SentimentPayload> {
        let outcome = match self.client.get_news_sentiment(key, crate::news_limit(options)).await {
            Ok(feed) => aggregate_feed(key, &feed),
            Err(e) => Err(e),
        };
        FetchResult::from_outcome(key, PROVIDER_NAME, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{FailureClass, SentimentLabel};
    use serde_json::json;

    #[test]
    fn test_check_body_rate_limit_note() {
        let body = json!({"Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute"});
        let err = check_body(&body).unwrap_err();
        assert!(matches!(err, ProviderFailure::RateLimited(_)));
        assert_eq!(err.class(), FailureClass::ProviderTransportFailure);

        let body = json!({"Information": "daily limit reached"});
        assert!(matches!(check_body(&body), Err(ProviderFailure::RateLimited(_))));
    }

    #[test]
    fn test_check_body_error_and_empty() {
        let err = check_body(&json!({"Error Message": "Invalid API call"})).unwrap_err();
        assert_eq!(err.class(), FailureClass::ProviderFormatFailure);
        assert!(check_body(&json!({})).is_err());
        assert!(check_body(&json!({"Symbol": "IBM"})).is_ok());
    }

    #[test]
    fn test_overview_to_fundamentals() {
        let overview: CompanyOverview = serde_json::from_value(json!({
            "Symbol": "IBM",
            "LatestQuarter": "2024-09-30",
            "PERatio": "22.5",
            "PEGRatio": "None",
            "EPS": "9.08",
            "ProfitMargin": "0.12",
            "ReturnOnEquityTTM": "0.25",
            "DividendYield": "0.031",
            "Beta": "-"
        }))
        .unwrap();

        let p = overview_to_fundamentals(&overview);
        assert_eq!(p.get("pe_ratio"), Some(22.5));
        assert_eq!(p.get("eps"), Some(9.08));
        assert!(p.get("peg_ratio").is_none());
        assert!(p.get("beta").is_none());
        assert!((p.get("profit_margin").unwrap() - 12.0).abs() < 1e-9);
        assert!((p.get("roe").unwrap() - 25.0).abs() < 1e-9);
        assert_eq!(p.fiscal_period.as_deref(), Some("2024-09-30"));
    }

    #[test]
    fn test_aggregate_feed_weights_by_relevance() {
        let feed: NewsSentimentFeed = serde_json::from_value(json!({
            "feed": [
                {"title": "Apple beats", "ticker_sentiment": [
                    {"ticker": "AAPL", "relevance_score": "0.9", "ticker_sentiment_score": "0.5"}
                ]},
                {"title": "Market wrap", "ticker_sentiment": [
                    {"ticker": "AAPL", "relevance_score": "0.1", "ticker_sentiment_score": "-0.5"},
                    {"ticker": "MSFT", "relevance_score": "0.8", "ticker_sentiment_score": "0.9"}
                ]},
                {"title": "Unrelated", "ticker_sentiment": []}
            ]
        }))
        .unwrap();

        let p = aggregate_feed("AAPL", &feed).unwrap();
        assert_eq!(p.article_count, 2);
        assert!((p.score - 0.4).abs() < 1e-9);
        assert_eq!(p.label, SentimentLabel::Positive);
        assert!(p.confidence > 0.0 && p.confidence <= 1.0);
    }

    #[test]
    fn test_aggregate_feed_skips_non_finite_values() {
        let feed: NewsSentimentFeed = serde_json::from_value(json!({
            "feed": [
                {"title": "Garbled", "ticker_sentiment": [
                    {"ticker": "AAPL", "relevance_score": "NaN", "ticker_sentiment_score": "0.5"}
                ]},
                {"title": "Garbled too", "ticker_sentiment": [
                    {"ticker": "AAPL", "relevance_score": "0.7", "ticker_sentiment_score": "inf"}
                ]},
                {"title": "Apple slips", "ticker_sentiment": [
                    {"ticker": "AAPL", "relevance_score": "0.6", "ticker_sentiment_score": "-0.3"}
                ]}
            ]
        }))
        .unwrap();

        let p = aggregate_feed("AAPL", &feed).unwrap();
        assert_eq!(p.article_count, 1);
        assert!((p.score + 0.3).abs() < 1e-9);

        let only_nan: NewsSentimentFeed = serde_json::from_value(json!({
            "feed": [{"title": "Garbled", "ticker_sentiment": [
                {"ticker": "AAPL", "relevance_score": "NaN", "ticker_sentiment_score": "NaN"}
            ]}]
        }))
        .unwrap();
        assert!(matches!(aggregate_feed("AAPL", &only_nan), Err(ProviderFailure::Format(_))));
    }

    #[test]
    fn test_aggregate_feed_without_mentions_fails() {
        let feed = NewsSentimentFeed { feed: Vec::new() };
        assert!(matches!(aggregate_feed("AAPL", &feed), Err(ProviderFailure::Format(_))));
    }
}
