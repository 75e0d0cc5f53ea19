//! Response caching for provider results.
//!
//! Identical queries against the same backend are frequent (a user
//! retyping a postal code, several form fields resolving the same
//! street), so normalized results are memoized per (provider, query)
//! pair. The cache is shared, read-mostly, and safe for concurrent
//! access: writes for an identical key are idempotent because they
//! derive from the same upstream query.
//!
//! Keys are the lowercased trimmed query combined with the provider id,
//! so `"Marienplatz"` and `"  marienplatz "` hit the same entry.
//!
//! There is no TTL and no eviction: entries live for the engine's
//! lifetime. `CacheStats::entries` exposes growth so long-running
//! deployments can watch it.

use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::traits::AddressCandidate;

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: usize,
    /// Number of cache misses.
    pub misses: usize,
    /// Current number of entries.
    pub entries: usize,
}

impl CacheStats {
    /// Get the cache hit rate.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: usize,
    misses: usize,
}

/// In-memory cache of normalized provider results.
#[derive(Debug)]
pub struct ResponseCache {
    enabled: bool,
    entries: RwLock<HashMap<String, Vec<AddressCandidate>>>,
    counters: RwLock<Counters>,
}

impl ResponseCache {
    /// Create a new cache. A disabled cache never hits and never stores.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: RwLock::new(HashMap::new()),
            counters: RwLock::new(Counters::default()),
        }
    }

    /// Whether the cache is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn key(provider_id: &str, query: &str) -> String {
        format!("{}::{}", provider_id, query.trim()).to_lowercase()
    }

    /// Look up the cached result for a (provider, query) pair.
    pub async fn get(&self, provider_id: &str, query: &str) -> Option<Vec<AddressCandidate>> {
        if !self.enabled {
            return None;
        }

        let key = Self::key(provider_id, query);
        let entries = self.entries.read().await;

        match entries.get(&key) {
            Some(candidates) => {
                let candidates = candidates.clone();
                drop(entries);
                self.counters.write().await.hits += 1;
                debug!(provider = provider_id, query, "cache hit");
                Some(candidates)
            }
            None => {
                drop(entries);
                self.counters.write().await.misses += 1;
                None
            }
        }
    }

    /// Store the result for a (provider, query) pair.
    pub async fn put(&self, provider_id: &str, query: &str, candidates: Vec<AddressCandidate>) {
        if !self.enabled {
            return;
        }

        let key = Self::key(provider_id, query);
        self.entries.write().await.insert(key, candidates);
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let counters = self.counters.read().await;
        let entries = self.entries.read().await;
        CacheStats {
            hits: counters.hits,
            misses: counters.misses,
            entries: entries.len(),
        }
    }

    /// Drop all entries. Statistics counters keep their values.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}
