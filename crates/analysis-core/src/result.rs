use crate::{Payload, ProviderFailure};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider name used on results the engine manufactures itself.
pub const NO_PROVIDER: &str = "none";

/// Outcome of one fetch attempt for one entity.
///
/// Built only through the constructors below, which keep `valid` and `error` consistent
/// and never attach a payload to an invalid result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResult<P> {
    entity_key: String,
    provider: String,
    fetched_at: DateTime<Utc>,
    valid: bool,
    error: Option<String>,
    #[serde(default)]
    stale: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    freshness_score: Option<u8>,
    payload: Option<P>,
}

/// What a caller can tell a user about a result.
#[derive(Debug, Clone, PartialEq)]
pub enum Availability {
    Fresh,
    Stale { as_of: DateTime<Utc> },
    NoData { reason: String },
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Availability::Fresh => write!(f, "fresh data"),
            Availability::Stale { as_of } => {
                write!(f, "stale data as of {}", as_of.format("%Y-%m-%d %H:%M:%S UTC"))
            }
            Availability::NoData { reason } => write!(f, "no data: {}", reason),
        }
    }
}

impl<P: Payload> FetchResult<P> {
    /// A successful fetch. An empty payload is downgraded to a format failure.
    pub fn success(entity_key: &str, provider: &str, payload: P) -> Self {
        if payload.is_empty() {
            return Self::failure(
                entity_key,
                provider,
                &ProviderFailure::Format("empty payload".to_string()),
            );
        }
        Self {
            entity_key: entity_key.to_string(),
            provider: provider.to_string(),
            fetched_at: Utc::now(),
            valid: true,
            error: None,
            stale: false,
            freshness_score: None,
            payload: Some(payload),
        }
    }

    /// Folds a provider's internal `Result` into the public shape.
    pub fn from_outcome(entity_key: &str, provider: &str, outcome: Result<P, ProviderFailure>) -> Self {
        match outcome {
            Ok(payload) => Self::success(entity_key, provider, payload),
            Err(failure) => Self::failure(entity_key, provider, &failure),
        }
    }

    pub fn failure(entity_key: &str, provider: &str, failure: &ProviderFailure) -> Self {
        Self::invalid(entity_key, provider, failure.to_string())
    }

    /// Every provider failed or was skipped. `attempts` pairs provider names with reasons.
    pub fn exhausted(entity_key: &str, attempts: &[(String, String)]) -> Self {
        let error = if attempts.is_empty() {
            "all providers exhausted: no provider was available".to_string()
        } else {
            let detail = attempts
                .iter()
                .map(|(name, reason)| format!("{}: {}", name, reason))
                .collect::<Vec<_>>()
                .join("; ");
            format!("all providers exhausted ({})", detail)
        };
        Self::invalid(entity_key, NO_PROVIDER, error)
    }

    /// A batch was cancelled before this key completed.
    pub fn cancelled(entity_key: &str) -> Self {
        Self::invalid(entity_key, NO_PROVIDER, "cancelled before completion".to_string())
    }

    fn invalid(entity_key: &str, provider: &str, error: String) -> Self {
        Self {
            entity_key: entity_key.to_string(),
            provider: provider.to_string(),
            fetched_at: Utc::now(),
            valid: false,
            error: Some(error),
            stale: false,
            freshness_score: None,
            payload: None,
        }
    }

    /// Same result, flagged as served past its TTL.
    pub fn into_stale(mut self) -> Self {
        self.stale = true;
        self
    }

    pub fn with_freshness(mut self, score: u8) -> Self {
        self.freshness_score = Some(score.min(100));
        self
    }

    pub fn entity_key(&self) -> &str {
        &self.entity_key
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn freshness_score(&self) -> Option<u8> {
        self.freshness_score
    }

    /// The payload, only for valid results.
    pub fn payload(&self) -> Option<&P> {
        if self.valid {
            self.payload.as_ref()
        } else {
            None
        }
    }

    pub fn into_payload(self) -> Option<P> {
        if self.valid {
            self.payload
        } else {
            None
        }
    }

    pub fn availability(&self) -> Availability {
        match (self.valid, self.stale) {
            (true, false) => Availability::Fresh,
            (true, true) => Availability::Stale {
                as_of: self.fetched_at,
            },
            (false, _) => Availability::NoData {
                reason: self.error.clone().unwrap_or_else(|| "unknown".to_string()),
            },
        }
    }
}
