//! The resolution engine: classify, select, fan out, merge.
//!
//! One [`HybridEngine`] instance owns everything process-wide: the
//! immutable configuration, the provider adapters, the response cache
//! and the rate limiter. There are no ambient globals; callers share the
//! engine by reference (or `Arc`) and every `resolve` call goes through
//! the same shared state.
//!
//! # Fan-out and merge
//!
//! `resolve` dispatches one task per selected provider and joins them
//! through an explicit outstanding-count: each completion delivers
//! `(slot index, partial result)` over a channel, the engine stores the
//! partial in its invocation-order slot and decrements the count, and
//! when it reaches zero the slots are concatenated *in invocation
//! order*. Completion order is irrelevant — a slow regional backend
//! still sorts ahead of a fast fallback — which makes the output
//! reproducible under any network timing.
//!
//! A provider error degrades to an empty partial for that slot and the
//! join continues; `resolve` itself never fails.
//!
//! # Superseded calls
//!
//! Autocomplete typing issues a new `resolve` per keystroke, and a slow
//! old response must not overwrite a newer one. [`SearchSession`] wraps
//! the engine with a monotonically increasing generation counter per
//! logical caller: a completion whose captured generation is no longer
//! current is discarded.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, ResponseCache};
use crate::classifier::{Classification, InputClassifier};
use crate::config::{ConfigError, EngineConfig};
use crate::factory::ProviderFactory;
use crate::rate_limiter::RateLimiter;
use crate::selector;
use crate::traits::{AddressCandidate, AddressProvider};

/// Why a resolution produced the candidates it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionOutcome {
    /// Providers were invoked; the candidate list is their merged output
    /// (possibly empty — "no results").
    Resolved,
    /// Selection came up empty: nothing was asked of any backend.
    NoProvidersEnabled,
}

/// Result of a single `resolve` call.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Classification of the query.
    pub classification: Classification,
    /// Ids of the invoked providers, in invocation order.
    pub invoked: Vec<String>,
    /// Merged, deduplicated candidates, in invocation order.
    pub candidates: Vec<AddressCandidate>,
    /// Distinguishes "no results" from "nothing was asked".
    pub outcome: ResolutionOutcome,
}

/// Hybrid multi-source address resolution engine.
pub struct HybridEngine {
    config: EngineConfig,
    classifier: InputClassifier,
    providers: HashMap<String, Arc<dyn AddressProvider>>,
    cache: Arc<ResponseCache>,
    limiter: Arc<RateLimiter>,
}

impl HybridEngine {
    /// Build an engine from configuration, constructing one adapter per
    /// enabled provider through the factory.
    pub fn from_config(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let providers = ProviderFactory::build_all(&config)?;
        Ok(Self::assemble(config, providers))
    }

    /// Build an engine over explicit provider instances (tests, custom
    /// backends). Provider ids must match their configuration entries.
    pub fn with_providers(
        config: EngineConfig,
        providers: Vec<Arc<dyn AddressProvider>>,
    ) -> Self {
        Self::assemble(config, providers)
    }

    fn assemble(config: EngineConfig, providers: Vec<Arc<dyn AddressProvider>>) -> Self {
        let classifier = InputClassifier::new(config.region_ranges.clone());
        let cache = Arc::new(ResponseCache::new(config.cache_enabled));
        let limiter = Arc::new(RateLimiter::new(config.providers.iter().map(|p| {
            (p.id.clone(), Duration::from_millis(p.rate_limit_ms))
        })));
        let providers = providers
            .into_iter()
            .map(|provider| (provider.id().to_string(), provider))
            .collect();

        Self {
            config,
            classifier,
            providers,
            cache,
            limiter,
        }
    }

    /// The engine's configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Classify a raw query.
    pub fn classify(&self, query: &str) -> Classification {
        self.classifier.classify(query)
    }

    /// Whether a postal code lies in a configured region range.
    pub fn is_in_region(&self, postal_code: &str) -> bool {
        self.classifier.is_in_region(postal_code)
    }

    /// Response-cache statistics.
    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// Resolve a free-text query into a ranked, deduplicated candidate
    /// list.
    ///
    /// Never fails: provider errors degrade to reduced coverage, and an
    /// empty selection is reported through
    /// [`ResolutionOutcome::NoProvidersEnabled`].
    pub async fn resolve(&self, query: &str) -> Resolution {
        let classification = self.classify(query);
        debug!(query, kind = ?classification.kind, "resolving");

        // Selection is pure: same classification + config, same order.
        // Configured providers without a live adapter cannot be invoked.
        let invoked: Vec<String> = selector::select(&classification, &self.config.providers)
            .into_iter()
            .map(|config| config.id.clone())
            .filter(|id| self.providers.contains_key(id))
            .collect();

        if invoked.is_empty() {
            info!(query, "no providers enabled for this query");
            return Resolution {
                classification,
                invoked,
                candidates: Vec::new(),
                outcome: ResolutionOutcome::NoProvidersEnabled,
            };
        }

        let candidates = self
            .fan_out(&classification.normalized, &classification, &invoked)
            .await;
        let candidates = dedup(candidates);

        info!(
            query,
            providers = invoked.len(),
            count = candidates.len(),
            "resolved"
        );

        Resolution {
            classification,
            invoked,
            candidates,
            outcome: ResolutionOutcome::Resolved,
        }
    }

    /// Dispatch one task per provider and join on an outstanding-count.
    ///
    /// Partials land in slots indexed by invocation order; the
    /// concatenation at join time walks the slots in that fixed order,
    /// never in completion order.
    async fn fan_out(
        &self,
        query: &str,
        classification: &Classification,
        invoked: &[String],
    ) -> Vec<AddressCandidate> {
        let (tx, mut rx) = mpsc::channel::<(usize, Vec<AddressCandidate>)>(invoked.len());

        for (slot, id) in invoked.iter().enumerate() {
            let provider = Arc::clone(&self.providers[id]);
            let cache = Arc::clone(&self.cache);
            let limiter = Arc::clone(&self.limiter);
            let query = query.to_string();
            let classification = classification.clone();
            let tx = tx.clone();

            tokio::spawn(async move {
                let partial =
                    fetch_one(provider, cache, limiter, &query, &classification).await;
                // The receiver only goes away if the resolve future was
                // dropped; nothing to deliver to then.
                let _ = tx.send((slot, partial)).await;
            });
        }
        drop(tx);

        let mut slots: Vec<Option<Vec<AddressCandidate>>> = vec![None; invoked.len()];
        let mut outstanding = invoked.len();

        while let Some((slot, partial)) = rx.recv().await {
            debug!(
                provider = invoked[slot].as_str(),
                count = partial.len(),
                "provider completed"
            );
            slots[slot] = Some(partial);
            outstanding -= 1;
            if outstanding == 0 {
                break;
            }
        }

        slots.into_iter().flatten().flatten().collect()
    }
}

/// One provider leg: rate limit, cache, fetch, populate; errors degrade
/// to an empty partial.
async fn fetch_one(
    provider: Arc<dyn AddressProvider>,
    cache: Arc<ResponseCache>,
    limiter: Arc<RateLimiter>,
    query: &str,
    classification: &Classification,
) -> Vec<AddressCandidate> {
    let id = provider.id();

    if let Some(cached) = cache.get(id, query).await {
        return cached;
    }

    limiter.acquire(id).await;

    match provider.search(query, classification).await {
        Ok(candidates) => {
            cache.put(id, query, candidates.clone()).await;
            candidates
        }
        Err(error) => {
            warn!(provider = id, %error, "provider failed, degrading to empty result");
            Vec::new()
        }
    }
}

/// Deduplicate candidates by their composite key, keeping the first
/// occurrence (and therefore the earlier provider's entry).
fn dedup(candidates: Vec<AddressCandidate>) -> Vec<AddressCandidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|candidate| seen.insert(candidate.dedup_key()))
        .collect()
}

// ============================================================================
// Search Session
// ============================================================================

/// A logical caller (one autocomplete field) issuing successive
/// `resolve` calls where only the newest matters.
///
/// Every call bumps the session's generation; a completion whose
/// captured generation is no longer current returns `None` instead of a
/// stale resolution.
pub struct SearchSession {
    engine: Arc<HybridEngine>,
    generation: AtomicU64,
}

impl SearchSession {
    /// Create a session over a shared engine.
    pub fn new(engine: Arc<HybridEngine>) -> Self {
        Self {
            engine,
            generation: AtomicU64::new(0),
        }
    }

    /// The engine behind this session.
    pub fn engine(&self) -> &Arc<HybridEngine> {
        &self.engine
    }

    /// Resolve a query, discarding the result if a newer call
    /// superseded it while it was in flight.
    pub async fn resolve_latest(&self, query: &str) -> Option<Resolution> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let resolution = self.engine.resolve(query).await;

        if self.generation.load(Ordering::SeqCst) == generation {
            Some(resolution)
        } else {
            debug!(query, "resolution superseded, discarding");
            None
        }
    }
}
