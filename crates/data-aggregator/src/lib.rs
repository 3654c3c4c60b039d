//! Multi-provider aggregation with caching, quota-aware batching and stale fallback.

pub mod analysis;
pub mod batch;
pub mod cache;
pub mod config;
pub mod engine;
pub mod freshness;
pub mod quota;
pub mod services;

pub use analysis::AnalysisEngine;
pub use cache::{CacheEntry, CacheStats, CacheStore, InMemoryCacheStore};
pub use config::AggregatorConfig;
pub use engine::{AggregationEngine, EngineSettings};
pub use freshness::{FreshnessReport, FreshnessScorer};
pub use quota::{QuotaTracker, RateLimitOverride};
pub use services::DataServices;
