//! Data domains served by the aggregation engine.
//!
//! A domain fixes the payload a provider returns and any extra per-call context it needs,
//! so one engine implementation serves fundamentals, sentiment and AI analysis alike.

use crate::{AnalysisPayload, FetchResult, FundamentalsPayload, MarketInputs, SentimentPayload};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Domain payload carried by a valid result.
pub trait Payload: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// A valid result must never carry an empty payload.
    fn is_empty(&self) -> bool;
}

pub trait Domain: Send + Sync + 'static {
    type Payload: Payload;
    type Context: Send + Sync;

    const NAME: &'static str;

    /// Attach per-call metadata to a result before the engine caches or returns it.
    fn finalize(result: FetchResult<Self::Payload>, _context: &Self::Context) -> FetchResult<Self::Payload> {
        result
    }
}

pub struct FundamentalsDomain;

pub struct SentimentDomain;

pub struct AnalysisDomain;

/// What the AI providers analyse, plus the freshness of those inputs (0-100).
#[derive(Debug, Clone, Default)]
pub struct AnalysisContext {
    pub inputs: MarketInputs,
    pub freshness: u8,
}

impl Domain for FundamentalsDomain {
    type Payload = FundamentalsPayload;
    type Context = ();

    const NAME: &'static str = "fundamentals";
}

impl Domain for SentimentDomain {
    type Payload = SentimentPayload;
    type Context = ();

    const NAME: &'static str = "sentiment";
}

impl Domain for AnalysisDomain {
    type Payload = AnalysisPayload;
    type Context = AnalysisContext;

    const NAME: &'static str = "analysis";

    /// Every analysis result carries the freshness of the inputs it was built from.
    fn finalize(result: FetchResult<AnalysisPayload>, context: &AnalysisContext) -> FetchResult<AnalysisPayload> {
        if result.freshness_score().is_some() {
            result
        } else {
            result.with_freshness(context.freshness)
        }
    }
}

impl Payload for FundamentalsPayload {
    fn is_empty(&self) -> bool {
        self.ratios.is_empty()
    }
}

impl Payload for SentimentPayload {
    fn is_empty(&self) -> bool {
        self.article_count == 0
    }
}

impl Payload for AnalysisPayload {
    fn is_empty(&self) -> bool {
        self.summary.trim().is_empty()
    }
}
