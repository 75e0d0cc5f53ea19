//! Mock provider for testing.
//!
//! Deterministic in-process provider used by the engine tests:
//! - queue-based responses (pop the next queued list, or fall back to a
//!   fixed default list)
//! - configurable artificial latency, for exercising the fan-out's
//!   ordering guarantees under arbitrary completion orders
//! - a fetch counter, for asserting that a cached query reaches the
//!   backend exactly once
//! - an optional forced failure, for the graceful-degradation path

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::classifier::Classification;
use crate::error::{GeocodeError, Result};
use crate::traits::{AddressCandidate, AddressProvider};

/// Mock address provider for testing.
#[derive(Debug, Clone)]
pub struct MockProvider {
    id: String,
    responses: Arc<Mutex<VecDeque<Vec<AddressCandidate>>>>,
    default_candidates: Vec<AddressCandidate>,
    latency: Arc<StdMutex<Duration>>,
    fetch_count: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

impl MockProvider {
    /// Create a new mock provider with an empty default result.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            responses: Arc::new(Mutex::new(VecDeque::new())),
            default_candidates: Vec::new(),
            latency: Arc::new(StdMutex::new(Duration::ZERO)),
            fetch_count: Arc::new(AtomicUsize::new(0)),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set the fixed result returned when the response queue is empty.
    pub fn with_candidates(mut self, candidates: Vec<AddressCandidate>) -> Self {
        self.default_candidates = candidates;
        self
    }

    /// Set the artificial latency applied to every search.
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock().unwrap() = latency;
        self
    }

    /// Queue a one-shot response list.
    pub async fn push_response(&self, candidates: Vec<AddressCandidate>) {
        self.responses.lock().await.push_back(candidates);
    }

    /// Change the artificial latency.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    /// Make every subsequent search fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of searches that reached this provider.
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AddressProvider for MockProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn search(
        &self,
        _query: &str,
        _classification: &Classification,
    ) -> Result<Vec<AddressCandidate>> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);

        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(GeocodeError::ProviderError(format!(
                "mock provider {} failing",
                self.id
            )));
        }

        let queued = self.responses.lock().await.pop_front();
        Ok(queued.unwrap_or_else(|| self.default_candidates.clone()))
    }
}
