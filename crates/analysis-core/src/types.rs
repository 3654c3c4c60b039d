use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// OHLCV bar data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default)]
    pub vwap: Option<f64>,
}

/// Company financials for one fiscal period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Financials {
    pub symbol: String,
    pub fiscal_period: String,
    pub fiscal_year: i32,
    pub revenue: Option<f64>,
    pub gross_profit: Option<f64>,
    pub operating_income: Option<f64>,
    pub net_income: Option<f64>,
    pub eps: Option<f64>,
    pub total_assets: Option<f64>,
    pub total_liabilities: Option<f64>,
    pub current_assets: Option<f64>,
    pub current_liabilities: Option<f64>,
    pub shareholders_equity: Option<f64>,
    pub cash_flow_operating: Option<f64>,
}

/// News article
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsArticle {
    pub id: String,
    pub title: String,
    pub author: Option<String>,
    pub published_utc: DateTime<Utc>,
    pub article_url: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub tickers: Vec<String>,
}

/// Raw inputs gathered for one symbol before AI analysis.
///
/// Any piece may be empty when its upstream failed; the freshness score accounts for that.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketInputs {
    pub symbol: String,
    pub bars: Vec<Bar>,
    pub news: Vec<NewsArticle>,
    /// Most recent period first
    pub financials: Vec<Financials>,
}

impl MarketInputs {
    pub fn latest_bar(&self) -> Option<&Bar> {
        self.bars.iter().max_by_key(|b| b.timestamp)
    }

    pub fn newest_article(&self) -> Option<&NewsArticle> {
        self.news.iter().max_by_key(|a| a.published_utc)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    pub const THRESHOLD: f64 = 0.15;

    /// Label a score in [-1, 1].
    pub fn from_score(score: f64) -> Self {
        if score >= Self::THRESHOLD {
            SentimentLabel::Positive
        } else if score <= -Self::THRESHOLD {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SentimentLabel::Positive => "POSITIVE",
            SentimentLabel::Negative => "NEGATIVE",
            SentimentLabel::Neutral => "NEUTRAL",
        };
        f.write_str(s)
    }
}

/// News sentiment for one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentPayload {
    /// -1.0 (bearish) to 1.0 (bullish)
    pub score: f64,
    pub label: SentimentLabel,
    /// 0.0 to 1.0
    pub confidence: f64,
    pub article_count: usize,
}

impl SentimentPayload {
    /// Builds a payload, clamping score and confidence into range and deriving the label.
    pub fn new(score: f64, confidence: f64, article_count: usize) -> Self {
        let score = score.clamp(-1.0, 1.0);
        Self {
            score,
            label: SentimentLabel::from_score(score),
            confidence: confidence.clamp(0.0, 1.0),
            article_count,
        }
    }
}

/// Named fundamental ratios (pe_ratio, roe, debt_to_equity, ...)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundamentalsPayload {
    pub ratios: BTreeMap<String, f64>,
    pub fiscal_period: Option<String>,
}

impl FundamentalsPayload {
    /// Inserts the ratio only when it is present and finite.
    pub fn set(&mut self, name: &str, value: Option<f64>) {
        if let Some(v) = value.filter(|v| v.is_finite()) {
            self.ratios.insert(name.to_string(), v);
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.ratios.get(name).copied()
    }
}

/// Structured output of an AI analysis. Scores are 0-100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPayload {
    pub fundamental_score: f64,
    pub technical_score: f64,
    pub momentum_score: f64,
    pub sentiment_score: f64,
    pub overall_score: f64,
    /// 0.0 to 1.0
    pub confidence: f64,
    pub sentiment_label: SentimentLabel,
    pub summary: String,
    #[serde(default)]
    pub risks: Vec<String>,
}

impl AnalysisPayload {
    pub const FUNDAMENTAL_WEIGHT: f64 = 0.40;
    pub const TECHNICAL_WEIGHT: f64 = 0.30;
    pub const MOMENTUM_WEIGHT: f64 = 0.20;
    pub const SENTIMENT_WEIGHT: f64 = 0.10;

    pub fn weighted_overall(fundamental: f64, technical: f64, momentum: f64, sentiment: f64) -> f64 {
        fundamental * Self::FUNDAMENTAL_WEIGHT
            + technical * Self::TECHNICAL_WEIGHT
            + momentum * Self::MOMENTUM_WEIGHT
            + sentiment * Self::SENTIMENT_WEIGHT
    }
}

/// Static quota metadata a provider declares. `None` means the limit is not known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimits {
    pub calls_per_minute: Option<u32>,
    pub calls_per_day: Option<u32>,
    pub tier: String,
}

impl RateLimits {
    pub fn new(calls_per_minute: Option<u32>, calls_per_day: Option<u32>, tier: impl Into<String>) -> Self {
        Self {
            calls_per_minute,
            calls_per_day,
            tier: tier.into(),
        }
    }

    pub fn unknown(tier: impl Into<String>) -> Self {
        Self::new(None, None, tier)
    }

    /// Local computation with no upstream quota at all.
    pub fn unlimited() -> Self {
        Self::new(Some(u32::MAX), Some(u32::MAX), "local")
    }
}

/// Calls drawn from a shared quota bucket by work that is not itself a provider fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaCost {
    pub key: String,
    pub calls: u32,
    pub limits: RateLimits,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentiment_label_thresholds() {
        assert_eq!(SentimentLabel::from_score(0.42), SentimentLabel::Positive);
        assert_eq!(SentimentLabel::from_score(0.15), SentimentLabel::Positive);
        assert_eq!(SentimentLabel::from_score(0.1), SentimentLabel::Neutral);
        assert_eq!(SentimentLabel::from_score(-0.2), SentimentLabel::Negative);
    }

    #[test]
    fn test_sentiment_payload_clamps() {
        let p = SentimentPayload::new(1.7, -0.3, 4);
        assert_eq!(p.score, 1.0);
        assert_eq!(p.confidence, 0.0);
        assert_eq!(p.label, SentimentLabel::Positive);
    }

    #[test]
    fn test_fundamentals_skip_non_finite() {
        let mut f = FundamentalsPayload::default();
        f.set("pe_ratio", Some(f64::NAN));
        f.set("roe", None);
        f.set("eps", Some(6.1));
        assert_eq!(f.ratios.len(), 1);
        assert_eq!(f.get("eps"), Some(6.1));
    }

    #[test]
    fn test_weighted_overall() {
        let overall = AnalysisPayload::weighted_overall(80.0, 60.0, 50.0, 40.0);
        assert!((overall - 64.0).abs() < 1e-9);
    }
}
