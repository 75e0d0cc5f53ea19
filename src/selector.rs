//! Provider selection: classification × usage policy → ordered providers.
//!
//! Selection is a pure function of the classification and the immutable
//! provider configuration, so the set and order of invoked providers is
//! identical for identical inputs, no matter how the network behaves
//! later.
//!
//! # Decision table
//!
//! | Query | Regional tier | Country tier | Fallback tier |
//! |-------|---------------|--------------|---------------|
//! | postal code, in region | if `use_for_region` | if enabled | if `use_as_fallback` |
//! | postal code, out of region | excluded | if `use_for_country_wide` | if `use_as_fallback` |
//! | no postal code | if enabled | excluded (needs a code to page) | if `use_as_fallback` |
//!
//! Disabled providers never participate. Included providers are ordered
//! by (tier, priority, id); an empty result means nothing is configured
//! for this kind of query, which the engine reports as
//! "no providers enabled" rather than "no results".

use crate::classifier::Classification;
use crate::config::{ProviderConfig, ProviderTier};

/// Select and order the providers to invoke for a classification.
///
/// Returns references into `configs`; the engine resolves them to
/// adapter instances. The order is the invocation order and therefore
/// also the merge order of the fan-out.
pub fn select<'a>(
    classification: &Classification,
    configs: &'a [ProviderConfig],
) -> Vec<&'a ProviderConfig> {
    let mut selected: Vec<&ProviderConfig> = configs
        .iter()
        .filter(|config| config.enabled && includes(classification, config))
        .collect();

    selected.sort_by(|a, b| {
        (a.tier, a.priority, a.id.as_str()).cmp(&(b.tier, b.priority, b.id.as_str()))
    });
    selected
}

/// One row of the decision table: does this provider participate?
fn includes(classification: &Classification, config: &ProviderConfig) -> bool {
    match (classification.has_postal_code(), classification.is_in_region()) {
        // Postal code inside the configured region.
        (true, true) => match config.tier {
            ProviderTier::Regional => config.use_for_region,
            ProviderTier::Country => true,
            ProviderTier::Fallback => config.use_as_fallback,
        },
        // Postal code outside the region: the regional backend has no
        // authority here.
        (true, false) => match config.tier {
            ProviderTier::Regional => false,
            ProviderTier::Country => config.use_for_country_wide,
            ProviderTier::Fallback => config.use_as_fallback,
        },
        // No postal code at all: the country backend cannot page.
        (false, _) => match config.tier {
            ProviderTier::Regional => true,
            ProviderTier::Country => false,
            ProviderTier::Fallback => config.use_as_fallback,
        },
    }
}
