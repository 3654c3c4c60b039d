use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Free-form request options forwarded to providers.
///
/// Keys are kept sorted so two option sets with the same content always hash the same.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchOptions(BTreeMap<String, Value>);

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(Value::as_u64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First 16 hex chars of SHA-256 over the canonical JSON encoding.
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::to_vec(&self.0).unwrap_or_default();
        let digest = Sha256::digest(&canonical);
        hex::encode(digest)[..16].to_string()
    }
}

/// Cache key: entity plus a hash of the request options.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    pub entity: String,
    pub fingerprint: String,
}

impl CacheKey {
    pub fn new(entity: &str, options: &FetchOptions) -> Self {
        Self {
            entity: entity.to_string(),
            fingerprint: options.fingerprint(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity, self.fingerprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_ignores_insertion_order() {
        let a = FetchOptions::new().with("news_limit", 20).with("timeframe", "1d");
        let b = FetchOptions::new().with("timeframe", "1d").with("news_limit", 20);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 16);
    }

    #[test]
    fn test_fingerprint_differs_by_value() {
        let a = FetchOptions::new().with("news_limit", 20);
        let b = FetchOptions::new().with("news_limit", 50);
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_ne!(
            CacheKey::new("AAPL", &a),
            CacheKey::new("AAPL", &b)
        );
    }

    #[test]
    fn test_getters() {
        let opts = FetchOptions::new().with("news_limit", 5).with("timeframe", "1d");
        assert_eq!(opts.get_u64("news_limit"), Some(5));
        assert_eq!(opts.get_str("timeframe"), Some("1d"));
        assert!(opts.get("missing").is_none());
    }
}
