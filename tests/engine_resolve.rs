//! Engine-level resolution tests through mock providers.
//!
//! These tests drive the full classify → select → fan-out → merge
//! pipeline without touching the network. The central property under
//! test: the merged output is a pure function of (query, configuration)
//! and does not depend on which provider answers first.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use anschrift::providers::mock::MockProvider;
use anschrift::{
    AddressCandidate, EngineConfig, HybridEngine, ProviderConfig, ProviderTier, QueryKind,
    ResolutionOutcome, SearchSession,
};

fn provider_config(id: &str, tier: ProviderTier, priority: u8) -> ProviderConfig {
    ProviderConfig::new(id)
        .with_tier(tier)
        .with_priority(priority)
        .with_usage(true, true, true)
}

fn candidate(street: &str, postal_code: &str, locality: &str, source: &str) -> AddressCandidate {
    AddressCandidate::new(street, postal_code, locality, source)
}

/// Three-tier engine over mock providers with the default region ranges.
fn three_tier_engine(latencies: [Duration; 3]) -> (HybridEngine, [MockProvider; 3]) {
    let regional = MockProvider::new("regional")
        .with_candidates(vec![
            candidate("Marienplatz 1", "80331", "München", "regional"),
            candidate("Sendlinger Str. 5", "80331", "München", "regional"),
        ])
        .with_latency(latencies[0]);
    let country = MockProvider::new("country")
        .with_candidates(vec![
            // Duplicate of a regional entry, differing only in case.
            candidate("marienplatz 1", "80331", "MÜNCHEN", "country"),
            candidate("Hauptstraße 7", "80331", "München", "country"),
        ])
        .with_latency(latencies[1]);
    let fallback = MockProvider::new("fallback")
        .with_candidates(vec![candidate(
            "Marienplatz 1",
            "80331",
            "München",
            "fallback",
        )])
        .with_latency(latencies[2]);

    let config = EngineConfig {
        providers: vec![
            provider_config("regional", ProviderTier::Regional, 1),
            provider_config("country", ProviderTier::Country, 2),
            provider_config("fallback", ProviderTier::Fallback, 3),
        ],
        ..EngineConfig::default()
    };

    let providers: Vec<Arc<dyn anschrift::AddressProvider>> = vec![
        Arc::new(regional.clone()),
        Arc::new(country.clone()),
        Arc::new(fallback.clone()),
    ];

    (
        HybridEngine::with_providers(config, providers),
        [regional, country, fallback],
    )
}

#[tokio::test]
async fn output_order_is_invariant_under_latency_permutations() {
    // Fixed (classification, provider set); only the latencies vary.
    let (reference_engine, _) = three_tier_engine([Duration::ZERO; 3]);
    let reference = reference_engine.resolve("80331").await;
    assert_eq!(reference.outcome, ResolutionOutcome::Resolved);
    assert!(!reference.candidates.is_empty());

    let mut rng = rand::thread_rng();
    for _ in 0..8 {
        let latencies = [
            Duration::from_millis(rng.gen_range(0..40)),
            Duration::from_millis(rng.gen_range(0..40)),
            Duration::from_millis(rng.gen_range(0..40)),
        ];

        let (engine, _) = three_tier_engine(latencies);
        let resolution = engine.resolve("80331").await;

        assert_eq!(
            resolution.candidates, reference.candidates,
            "merge order changed under latencies {:?}",
            latencies
        );
        assert_eq!(resolution.invoked, reference.invoked);
    }
}

#[tokio::test]
async fn no_two_candidates_share_a_dedup_key() {
    let (engine, _) = three_tier_engine([
        Duration::from_millis(5),
        Duration::ZERO,
        Duration::from_millis(2),
    ]);

    let resolution = engine.resolve("80331").await;

    let mut keys: Vec<String> = resolution
        .candidates
        .iter()
        .map(|c| c.dedup_key())
        .collect();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), resolution.candidates.len());

    // First occurrence wins: the duplicate came from the country and
    // fallback providers, so the surviving entry is regional.
    let marienplatz = resolution
        .candidates
        .iter()
        .find(|c| c.street.eq_ignore_ascii_case("marienplatz 1"))
        .unwrap();
    assert_eq!(marienplatz.source, "regional");
}

#[tokio::test]
async fn in_region_postal_code_invokes_regional_then_country() {
    // Default-policy selection: fallback participates only when opted in.
    let regional = MockProvider::new("regional")
        .with_candidates(vec![candidate("Marienplatz 1", "80331", "München", "regional")]);
    let country = MockProvider::new("country")
        .with_candidates(vec![candidate("Hauptstraße 7", "80331", "München", "country")]);
    let fallback = MockProvider::new("fallback")
        .with_candidates(vec![candidate("Anderes 9", "80331", "München", "fallback")]);

    let config = EngineConfig {
        providers: vec![
            ProviderConfig::new("regional")
                .with_tier(ProviderTier::Regional)
                .with_priority(1)
                .with_usage(true, false, false),
            ProviderConfig::new("country")
                .with_tier(ProviderTier::Country)
                .with_priority(2)
                .with_usage(false, true, false),
            ProviderConfig::new("fallback")
                .with_tier(ProviderTier::Fallback)
                .with_priority(3)
                .with_usage(false, false, false),
        ],
        ..EngineConfig::default()
    };

    let engine = HybridEngine::with_providers(
        config,
        vec![
            Arc::new(regional),
            Arc::new(country),
            Arc::new(fallback.clone()),
        ],
    );

    let resolution = engine.resolve("80331").await;

    assert_eq!(resolution.classification.kind, QueryKind::PostalCodeOnly);
    assert!(resolution.classification.is_in_region());
    assert_eq!(resolution.invoked, vec!["regional", "country"]);
    assert_eq!(fallback.fetch_count(), 0);

    // Regional entries sort ahead of country entries.
    assert_eq!(resolution.candidates[0].source, "regional");
    assert_eq!(resolution.candidates[1].source, "country");
}

#[tokio::test]
async fn out_of_region_postal_code_skips_regional() {
    let regional = MockProvider::new("regional");
    let country = MockProvider::new("country")
        .with_candidates(vec![candidate("Hauptstraße 12", "12345", "Berlin", "country")]);
    let fallback = MockProvider::new("fallback")
        .with_candidates(vec![candidate("Hauptstraße 12a", "12345", "Berlin", "fallback")]);

    let config = EngineConfig {
        providers: vec![
            ProviderConfig::new("regional")
                .with_tier(ProviderTier::Regional)
                .with_priority(1)
                .with_usage(true, false, false),
            ProviderConfig::new("country")
                .with_tier(ProviderTier::Country)
                .with_priority(2)
                .with_usage(false, true, false),
            ProviderConfig::new("fallback")
                .with_tier(ProviderTier::Fallback)
                .with_priority(3)
                .with_usage(false, false, true),
        ],
        ..EngineConfig::default()
    };

    let engine = HybridEngine::with_providers(
        config,
        vec![
            Arc::new(regional.clone()),
            Arc::new(country),
            Arc::new(fallback),
        ],
    );

    let resolution = engine.resolve("Hauptstraße 12, 12345 Berlin").await;

    assert_eq!(resolution.classification.kind, QueryKind::WithPostalCode);
    assert_eq!(
        resolution.classification.postal_code.as_deref(),
        Some("12345")
    );
    assert!(!resolution.classification.is_in_region());
    assert_eq!(resolution.invoked, vec!["country", "fallback"]);
    assert_eq!(regional.fetch_count(), 0);
    assert_eq!(resolution.candidates.len(), 2);
}

#[tokio::test]
async fn identical_queries_hit_the_backend_once() {
    let provider = MockProvider::new("regional")
        .with_candidates(vec![candidate("Marienplatz 1", "80331", "München", "regional")]);
    let counter = provider.clone();

    let config = EngineConfig {
        providers: vec![provider_config("regional", ProviderTier::Regional, 1)],
        ..EngineConfig::default()
    };
    let engine = HybridEngine::with_providers(config, vec![Arc::new(provider)]);

    let first = engine.resolve("Marienplatz").await;
    let second = engine.resolve("Marienplatz").await;
    // Key normalization: differing case and padding still hit.
    let third = engine.resolve("  MARIENPLATZ ").await;

    assert_eq!(first.candidates, second.candidates);
    assert_eq!(first.candidates, third.candidates);
    assert_eq!(counter.fetch_count(), 1);
}

#[tokio::test]
async fn all_providers_disabled_reports_nothing_asked() {
    let config = EngineConfig {
        providers: vec![
            provider_config("regional", ProviderTier::Regional, 1).with_enabled(false),
        ],
        ..EngineConfig::default()
    };
    let engine = HybridEngine::with_providers(config, vec![]);

    let resolution = engine.resolve("80331").await;
    assert_eq!(resolution.outcome, ResolutionOutcome::NoProvidersEnabled);
    assert!(resolution.candidates.is_empty());

    // Distinguished from a provider that was asked and found nothing.
    let config = EngineConfig {
        providers: vec![provider_config("regional", ProviderTier::Regional, 1)],
        ..EngineConfig::default()
    };
    let engine =
        HybridEngine::with_providers(config, vec![Arc::new(MockProvider::new("regional"))]);

    let resolution = engine.resolve("80331").await;
    assert_eq!(resolution.outcome, ResolutionOutcome::Resolved);
    assert!(resolution.candidates.is_empty());
}

#[tokio::test]
async fn failing_provider_reduces_coverage_but_never_aborts() {
    let (engine, [regional, _, _]) = three_tier_engine([Duration::ZERO; 3]);
    regional.set_failing(true);

    let resolution = engine.resolve("80331").await;

    assert_eq!(resolution.outcome, ResolutionOutcome::Resolved);
    assert_eq!(resolution.invoked.len(), 3);
    assert!(resolution
        .candidates
        .iter()
        .all(|c| c.source != "regional"));
    assert!(!resolution.candidates.is_empty());
}

#[tokio::test]
async fn session_keeps_only_the_newest_resolution() {
    let provider = MockProvider::new("regional")
        .with_candidates(vec![candidate("Marienplatz 1", "80331", "München", "regional")])
        .with_latency(Duration::from_millis(40));

    let config = EngineConfig {
        providers: vec![provider_config("regional", ProviderTier::Regional, 1)],
        ..EngineConfig::default()
    };
    let engine = Arc::new(HybridEngine::with_providers(
        config,
        vec![Arc::new(provider)],
    ));
    let session = Arc::new(SearchSession::new(engine));

    // Simulate a user typing: each keystroke supersedes the previous
    // in-flight resolve.
    let mut handles = Vec::new();
    for query in ["M", "Ma", "Mar", "Mari"] {
        let session = Arc::clone(&session);
        handles.push(tokio::spawn(async move {
            session.resolve_latest(query).await
        }));
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let newest = session.resolve_latest("Marienplatz").await;

    assert!(newest.is_some());
    for handle in handles {
        assert!(handle.await.unwrap().is_none());
    }
}
