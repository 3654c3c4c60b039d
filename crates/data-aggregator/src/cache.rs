use analysis_core::{CacheKey, FetchResult, Payload};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;

/// A cached result and when it was stored
#[derive(Debug, Clone)]
pub struct CacheEntry<P> {
    pub key: CacheKey,
    pub value: FetchResult<P>,
    pub inserted_at: DateTime<Utc>,
}

impl<P> CacheEntry<P> {
    pub fn new(key: CacheKey, value: FetchResult<P>) -> Self {
        Self {
            key,
            value,
            inserted_at: Utc::now(),
        }
    }

    /// Fresh iff `now - inserted_at < ttl`.
    pub fn is_fresh(&self, ttl: chrono::Duration, now: DateTime<Utc>) -> bool {
        now - self.inserted_at < ttl
    }
}

/// Storage seam for the aggregation engine.
///
/// Expired entries stay retrievable until overwritten or removed; they are the stale fallback.
#[async_trait]
pub trait CacheStore<P: Payload>: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Option<CacheEntry<P>>;

    /// Must not let an older entry replace a newer one for the same key.
    async fn insert(&self, entry: CacheEntry<P>);

    /// Remove every entry for an entity, whatever its options. Returns how many were removed.
    async fn remove_entity(&self, entity: &str) -> usize;

    async fn clear(&self) -> usize;

    async fn entries(&self) -> Vec<CacheEntry<P>>;
}

/// Process-local store on a sharded concurrent map
pub struct InMemoryCacheStore<P> {
    entries: DashMap<CacheKey, CacheEntry<P>>,
}

impl<P> InMemoryCacheStore<P> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<P> Default for InMemoryCacheStore<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<P: Payload> CacheStore<P> for InMemoryCacheStore<P> {
    async fn get(&self, key: &CacheKey) -> Option<CacheEntry<P>> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    async fn insert(&self, entry: CacheEntry<P>) {
        // The shard lock is held for the whole compare-and-swap
        match self.entries.entry(entry.key.clone()) {
            Entry::Occupied(mut existing) => {
                if existing.get().inserted_at <= entry.inserted_at {
                    existing.insert(entry);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(entry);
            }
        }
    }

    async fn remove_entity(&self, entity: &str) -> usize {
        let keys: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|e| e.key().entity == entity)
            .map(|e| e.key().clone())
            .collect();
        keys.iter().filter(|k| self.entries.remove(*k).is_some()).count()
    }

    async fn clear(&self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        removed
    }

    async fn entries(&self) -> Vec<CacheEntry<P>> {
        self.entries.iter().map(|e| e.value().clone()).collect()
    }
}

/// Entry counts by current state. `valid + stale + invalid == total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total: usize,
    pub valid: usize,
    pub stale: usize,
    pub invalid: usize,
}

impl CacheStats {
    pub fn classify<P: Payload>(entries: &[CacheEntry<P>], ttl: chrono::Duration, now: DateTime<Utc>) -> Self {
        let mut stats = CacheStats {
            total: entries.len(),
            ..Default::default()
        };
        for entry in entries {
            if !entry.value.is_valid() {
                stats.invalid += 1;
            } else if entry.value.is_stale() || !entry.is_fresh(ttl, now) {
                stats.stale += 1;
            } else {
                stats.valid += 1;
            }
        }
        stats
    }
}
