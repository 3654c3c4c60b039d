//! Concrete upstream adapters for the aggregation engine.
//!
//! Provider names are stable identifiers: they show up in results, logs, quota bookkeeping
//! and `RATE_LIMIT_OVERRIDES`.

pub mod alpha_vantage;
pub mod finbert;
pub mod lexicon;
pub mod polygon;
pub mod ratios;

pub use alpha_vantage::{AlphaVantageClient, AlphaVantageFundamentals, AlphaVantageSentiment};
pub use finbert::{FinbertClient, FinbertSentiment};
pub use lexicon::{LexiconScorer, LexiconSentiment};
pub use polygon::{PolygonFundamentals, PolygonInputSource, POLYGON_QUOTA};

/// Option key: how many news articles sentiment providers read.
pub const NEWS_LIMIT_OPTION: &str = "news_limit";
pub const DEFAULT_NEWS_LIMIT: u32 = 20;

pub(crate) fn news_limit(options: &analysis_core::FetchOptions) -> u32 {
    options
        .get_u64(NEWS_LIMIT_OPTION)
        .map(|n| n.clamp(1, 200) as u32)
        .unwrap_or(DEFAULT_NEWS_LIMIT)
}
