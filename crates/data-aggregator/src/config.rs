use ai_analysis::AiProviderKind;
use analysis_core::ConfigError;
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::engine::{
    EngineSettings, DEFAULT_CACHE_TTL_SECS, DEFAULT_MAX_BATCH_CONCURRENCY, DEFAULT_PROVIDER_TIMEOUT,
};
use crate::quota::RateLimitOverride;

/// Everything the aggregation layer reads from the environment.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    // Credentials and endpoints (absent means that provider reports unavailable)
    pub polygon_api_key: Option<String>,
    pub polygon_rate_limit: u32,
    pub alpha_vantage_api_key: Option<String>,
    pub ml_sentiment_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub anthropic_api_key: Option<String>,
    pub anthropic_model: String,

    pub default_ai_provider: AiProviderKind,

    // Engine behaviour
    pub cache_ttl_secs: u64,
    pub provider_timeout: Duration,
    pub max_batch_concurrency: usize,
    pub rate_limit_overrides: HashMap<String, RateLimitOverride>,
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key: key.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_limit(side: &str) -> Result<Option<u32>, String> {
    let side = side.trim();
    if side.is_empty() {
        Ok(None)
    } else {
        side.parse().map(Some).map_err(|e: std::num::ParseIntError| e.to_string())
    }
}

/// Parse `name=per_minute/per_day,...`. Either side of the slash may be empty.
pub fn parse_rate_limit_overrides(raw: &str) -> Result<HashMap<String, RateLimitOverride>, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        key: "RATE_LIMIT_OVERRIDES".to_string(),
        value: raw.to_string(),
        reason,
    };

    let mut overrides = HashMap::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (name, limits) = item
            .split_once('=')
            .ok_or_else(|| invalid(format!("'{}' is not name=per_minute/per_day", item)))?;
        let (per_minute, per_day) = limits.split_once('/').unwrap_or((limits, ""));
        let ov = RateLimitOverride {
            calls_per_minute: parse_limit(per_minute).map_err(&invalid)?,
            calls_per_day: parse_limit(per_day).map_err(&invalid)?,
        };
        overrides.insert(name.trim().to_string(), ov);
    }
    Ok(overrides)
}

impl AggregatorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let lookup = move |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let default_ai_provider = parse_or(&lookup, "AI_DEFAULT_PROVIDER", AiProviderKind::default())?;
        let provider_timeout_secs = parse_or(&lookup, "PROVIDER_TIMEOUT_SECS", DEFAULT_PROVIDER_TIMEOUT.as_secs())?;
        let rate_limit_overrides = match lookup("RATE_LIMIT_OVERRIDES") {
            Some(raw) => parse_rate_limit_overrides(&raw)?,
            None => HashMap::new(),
        };

        Ok(Self {
            polygon_api_key: lookup("POLYGON_API_KEY"),
            polygon_rate_limit: parse_or(&lookup, "POLYGON_RATE_LIMIT", polygon_client::DEFAULT_CALLS_PER_MINUTE)?,
            alpha_vantage_api_key: lookup("ALPHA_VANTAGE_API_KEY"),
            ml_sentiment_url: lookup("ML_SENTIMENT_URL"),
            openai_api_key: lookup("OPENAI_API_KEY"),
            openai_base_url: lookup("OPENAI_BASE_URL").unwrap_or_else(|| ai_analysis::openai::DEFAULT_BASE_URL.to_string()),
            openai_model: lookup("OPENAI_MODEL").unwrap_or_else(|| ai_analysis::openai::DEFAULT_MODEL.to_string()),
            anthropic_api_key: lookup("ANTHROPIC_API_KEY"),
            anthropic_model: lookup("ANTHROPIC_MODEL")
                .unwrap_or_else(|| ai_analysis::anthropic::DEFAULT_MODEL.to_string()),
            default_ai_provider,
            cache_ttl_secs: parse_or(&lookup, "DATA_CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS)?,
            provider_timeout: Duration::from_secs(provider_timeout_secs),
            max_batch_concurrency: parse_or(&lookup, "MAX_BATCH_CONCURRENCY", DEFAULT_MAX_BATCH_CONCURRENCY)?,
            rate_limit_overrides,
        })
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            cache_ttl_secs: self.cache_ttl_secs,
            default_timeout: self.provider_timeout,
            max_batch_concurrency: self.max_batch_concurrency,
            rate_limit_overrides: self.rate_limit_overrides.clone(),
        }
    }
}
