//! Anschrift - Hybrid Multi-Source Address Resolution
//!
//! Resolves a free-text address fragment into a ranked, deduplicated list
//! of structured candidates by querying several geocoding backends that
//! differ in coverage, authority, rate limits and response shape.
//!
//! This crate provides:
//! - Query classification (postal code, street + number, free text)
//! - Policy-driven provider selection over regional/country/fallback tiers
//! - Concurrent fan-out with a deterministic, invocation-ordered merge
//! - Per-provider rate limiting and response caching
//! - Per-provider normalization into one canonical candidate type
//!
//! # Providers
//!
//! | Provider | Tier | Coverage | Notes |
//! |----------|------|----------|-------|
//! | Ortssuchdienst | regional | Bavaria | API key, abbreviation on |
//! | OpenPLZ | country | Germany | paginated by postal code |
//! | Nominatim | fallback | worldwide (filtered to `de`) | 1 req/s, User-Agent |
//! | Mock | — | testing | no network |
//!
//! # Architecture
//!
//! ```text
//! query ──► InputClassifier ──► selector ──► fan-out ──► merge ──► candidates
//!                                              │
//!                             per provider: cache ► rate limit ► fetch ► normalize
//! ```
//!
//! One [`HybridEngine`] instance owns the configuration, the adapters,
//! the cache and the rate limiter; every call shares that state
//! explicitly, there are no hidden singletons. Provider *invocation*
//! order is a pure function of the query's classification and the
//! configuration; provider *completion* order never shows in the output.
//!
//! # Example
//!
//! ```ignore
//! use anschrift::{EngineConfig, HybridEngine};
//!
//! let engine = HybridEngine::from_config(EngineConfig::default())?;
//!
//! let resolution = engine.resolve("80331").await;
//! for candidate in &resolution.candidates {
//!     println!("{} ({})", candidate.display, candidate.source);
//! }
//! ```
//!
//! # See Also
//!
//! - [`crate::traits`] for the provider trait and candidate types
//! - [`crate::providers`] for concrete adapters
//! - [`crate::engine`] for the fan-out/merge mechanics

pub mod abbreviator;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod factory;
pub mod providers;
pub mod rate_limiter;
pub mod retry;
pub mod selector;
pub mod traits;

pub use abbreviator::StreetAbbreviator;
pub use cache::{CacheStats, ResponseCache};
pub use classifier::{
    extract_postal_code, has_house_number, Classification, InputClassifier, QueryKind,
};
pub use config::{ConfigError, EngineConfig, ProviderConfig, ProviderTier, RegionRange};
pub use engine::{HybridEngine, Resolution, ResolutionOutcome, SearchSession};
pub use error::{GeocodeError, Result, RetryStrategy};
pub use factory::{ProviderFactory, ProviderKind};
pub use providers::bayern::BayernProvider;
pub use providers::mock::MockProvider;
pub use providers::nominatim::NominatimProvider;
pub use providers::openplz::OpenPlzProvider;
pub use rate_limiter::RateLimiter;
pub use retry::RetryExecutor;
pub use traits::{AddressCandidate, AddressProvider, Coordinates};
