use analysis_core::{Bar, Financials, NewsArticle, ProviderFailure};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const BASE_URL: &str = "https://api.polygon.io";

/// Free tier allowance. Paid plans should raise POLYGON_RATE_LIMIT.
pub const DEFAULT_CALLS_PER_MINUTE: u32 = 5;

/// Sliding-window rate limiter: at most `max_requests` per `window` duration.
#[derive(Clone)]
struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests: max_requests.max(1),
            window,
        }
    }

    async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            // Remove timestamps outside the window
            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            if ts.len() < self.max_requests {
                ts.push_back(now);
                return;
            }

            // Wait until the oldest request falls out of the window
            let sleep_dur = match ts.front() {
                Some(&oldest) => (oldest + self.window).saturating_duration_since(now),
                None => Duration::ZERO,
            } + Duration::from_millis(50);
            drop(ts);
            tracing::debug!("Rate limiter: waiting {:.1}s for Polygon API slot", sleep_dur.as_secs_f64());
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

#[derive(Clone)]
pub struct PolygonClient {
    api_key: String,
    client: Client,
    rate_limiter: RateLimiter,
    calls_per_minute: u32,
}

impl PolygonClient {
    pub fn new(api_key: String, calls_per_minute: u32) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            api_key,
            client,
            rate_limiter: RateLimiter::new(calls_per_minute as usize, Duration::from_secs(60)),
            calls_per_minute,
        }
    }

    pub fn has_credentials(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn calls_per_minute(&self) -> u32 {
        self.calls_per_minute
    }

    /// Send a rate-limited request. A 429 is reported rather than retried so the caller can fall back.
    async fn send_request(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, ProviderFailure> {
        self.rate_limiter.acquire().await;
        let response = builder.send().await?;

        let status = response.status();
        if status.as_u16() == 429 {
            tracing::warn!("Polygon 429 rate limited");
            return Err(ProviderFailure::RateLimited("polygon returned HTTP 429".to_string()));
        }
        if !status.is_success() {
            return Err(ProviderFailure::status(
                status.as_u16(),
                response.text().await.unwrap_or_default(),
            ));
        }
        Ok(response)
    }

    /// Get aggregates (bars) for a symbol
    pub async fn get_aggregates(
        &self,
        symbol: &str,
        multiplier: u32,
        timespan: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Bar>, ProviderFailure> {
        let url = format!(
            "{}/v2/aggs/ticker/{}/range/{}/{}/{}/{}",
            BASE_URL,
            symbol,
            multiplier,
            timespan,
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d")
        );

        let response = self
            .send_request(self.client.get(&url).query(&[("apiKey", self.api_key.as_str()), ("adjusted", "true")]))
            .await?;

        let agg_response: AggregateResponse = response.json().await?;

        Ok(agg_response
            .results
            .into_iter()
            .filter_map(|r| {
                Some(Bar {
                    timestamp: DateTime::from_timestamp_millis(r.t)?,
                    open: r.o,
                    high: r.h,
                    low: r.l,
                    close: r.c,
                    volume: r.v,
                    vwap: r.vw,
                })
            })
            .collect())
    }

    /// Get quarterly financials, most recent first
    pub async fn get_financials(&self, symbol: &str, limit: u32) -> Result<Vec<Financials>, ProviderFailure> {
        let url = format!("{}/vX/reference/financials", BASE_URL);
        let limit = limit.to_string();

        let response = self
            .send_request(self.client.get(&url).query(&[
                ("ticker", symbol),
                ("timeframe", "quarterly"),
                ("order", "desc"),
                ("apiKey", self.api_key.as_str()),
                ("limit", limit.as_str()),
            ]))
            .await?;

        let fin_response: FinancialsResponse = response.json().await?;
        Ok(map_financials(symbol, fin_response.results))
    }

    /// Get news articles
    pub async fn get_news(&self, symbol: Option<&str>, limit: u32) -> Result<Vec<NewsArticle>, ProviderFailure> {
        let url = format!("{}/v2/reference/news", BASE_URL);

        let mut query = vec![("apiKey", self.api_key.clone()), ("limit", limit.to_string())];
        if let Some(sym) = symbol {
            query.push(("ticker", sym.to_string()));
        }

        let response = self.send_request(self.client.get(&url).query(&query)).await?;
        let news_response: NewsResponse = response.json().await?;

        Ok(news_response
            .results
            .into_iter()
            .filter_map(|r| {
                let published_utc = DateTime::parse_from_rfc3339(&r.published_utc)
                    .map(|dt| dt.with_timezone(&Utc))
                    .ok()?;
                Some(NewsArticle {
                    id: r.id,
                    title: r.title,
                    author: r.author,
                    published_utc,
                    article_url: r.article_url,
                    description: r.description,
                    keywords: r.keywords.unwrap_or_default(),
                    tickers: r.tickers,
                })
            })
            .collect())
    }
}

fn statement_value(statement: &HashMap<String, serde_json::Value>, field: &str) -> Option<f64> {
    statement.get(field).and_then(|v| v.get("value")).and_then(|v| v.as_f64())
}

fn map_financials(symbol: &str, results: Vec<FinancialResult>) -> Vec<Financials> {
    results
        .into_iter()
        .map(|r| {
            let income = r.financials.income_statement;
            let balance = r.financials.balance_sheet;
            let cash_flow = r.financials.cash_flow_statement;

            Financials {
                symbol: symbol.to_string(),
                fiscal_period: r.fiscal_period,
                fiscal_year: r.fiscal_year.parse().unwrap_or(0),
                revenue: statement_value(&income, "revenues"),
                gross_profit: statement_value(&income, "gross_profit"),
                operating_income: statement_value(&income, "operating_income_loss"),
                net_income: statement_value(&income, "net_income_loss"),
                eps: statement_value(&income, "basic_earnings_per_share"),
                total_assets: statement_value(&balance, "assets"),
                total_liabilities: statement_value(&balance, "liabilities"),
                current_assets: statement_value(&balance, "current_assets"),
                current_liabilities: statement_value(&balance, "current_liabilities"),
                shareholders_equity: statement_value(&balance, "equity"),
                cash_flow_operating: statement_value(&cash_flow, "net_cash_flow_from_operating_activities"),
            }
        })
        .collect()
}

// Response structures
#[derive(Debug, Deserialize)]
struct AggregateResponse {
    #[serde(default)]
    results: Vec<AggregateResult>,
}

#[derive(Debug, Deserialize)]
struct AggregateResult {
    t: i64, // timestamp
    o: f64, // open
    h: f64, // high
    l: f64, // low
    c: f64, // close
    v: f64, // volume
    #[serde(default)]
    vw: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct FinancialsResponse {
    #[serde(default)]
    results: Vec<FinancialResult>,
}

#[derive(Debug, Deserialize)]
struct FinancialResult {
    fiscal_period: String,
    fiscal_year: String,
    financials: FinancialStatements,
}

#[derive(Debug, Deserialize)]
struct FinancialStatements {
    #[serde(default)]
    income_statement: HashMap<String, serde_json::Value>,
    #[serde(default)]
    balance_sheet: HashMap<String, serde_json::Value>,
    #[serde(default)]
    cash_flow_statement: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    results: Vec<NewsResult>,
}

#[derive(Debug, Deserialize)]
struct NewsResult {
    id: String,
    title: String,
    author: Option<String>,
    published_utc: String,
    article_url: String,
    description: Option<String>,
    keywords: Option<Vec<String>>,
    #[serde(default)]
    tickers: Vec<String>,
}
