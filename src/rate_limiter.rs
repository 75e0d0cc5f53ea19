//! Per-provider rate limiting with a minimum inter-request interval.
//!
//! Some backends impose hard usage policies (the OSM endpoint allows at
//! most one request per second); others are unthrottled. The limiter
//! keeps one slot per provider id holding the timestamp of the last
//! granted acquisition. `acquire` suspends the caller until the
//! configured interval has elapsed since that grant, then records the new
//! grant time.
//!
//! The check and the record are a single atomic step: the slot's async
//! mutex is held across the wait, so two concurrent callers for the same
//! provider can never both observe a stale "last call" time and both
//! proceed early. Callers for *different* providers never contend — each
//! id has its own slot.
//!
//! The slot map is fixed at construction (provider configuration is
//! immutable for the engine's lifetime); acquiring for an unknown id
//! grants immediately.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Per-provider grant state.
#[derive(Debug, Default)]
struct Slot {
    last_grant: Option<Instant>,
}

/// Enforces a minimum interval between requests, per provider id.
#[derive(Debug, Default)]
pub struct RateLimiter {
    slots: HashMap<String, (Duration, Arc<Mutex<Slot>>)>,
}

impl RateLimiter {
    /// Create a limiter from (provider id, minimum interval) pairs.
    ///
    /// An interval of zero means the provider is unthrottled: `acquire`
    /// grants immediately (but still records the grant).
    pub fn new(intervals: impl IntoIterator<Item = (String, Duration)>) -> Self {
        let slots = intervals
            .into_iter()
            .map(|(id, interval)| (id, (interval, Arc::new(Mutex::new(Slot::default())))))
            .collect();
        Self { slots }
    }

    /// The configured interval for a provider, if it has a slot.
    pub fn interval(&self, provider_id: &str) -> Option<Duration> {
        self.slots.get(provider_id).map(|(interval, _)| *interval)
    }

    /// Wait until a request to `provider_id` is allowed, then record the
    /// grant.
    ///
    /// Returns immediately for unknown ids and zero intervals. Concurrent
    /// acquisitions for the same id are serialized; each caller in turn
    /// observes the previous caller's grant time, so any two consecutive
    /// grants are separated by at least the configured interval.
    pub async fn acquire(&self, provider_id: &str) {
        let Some((interval, slot)) = self.slots.get(provider_id) else {
            return;
        };

        // Held across the sleep: check-and-record must be atomic per id.
        let mut slot = slot.lock().await;

        if !interval.is_zero() {
            if let Some(last) = slot.last_grant {
                let elapsed = last.elapsed();
                if elapsed < *interval {
                    let wait = *interval - elapsed;
                    debug!(
                        provider = provider_id,
                        wait_ms = wait.as_millis() as u64,
                        "rate limited, waiting"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }

        slot.last_grant = Some(Instant::now());
    }
}
