//! Concrete provider adapters.
//!
//! One module per backend. Each adapter builds its own `reqwest::Client`
//! with an explicit timeout, fetches the raw provider-shaped payload,
//! and normalizes it into [`AddressCandidate`](crate::AddressCandidate)
//! values, dropping empty or invalid entries along the way.
//!
//! | Adapter | Tier | Notes |
//! |---------|------|-------|
//! | [`bayern`] | regional | HTML-ish labels, API key, abbreviation on by default |
//! | [`openplz`] | country | street records paginated by postal code |
//! | [`nominatim`] | fallback | OSM search, identifying User-Agent required |
//! | [`mock`] | any | in-process, for tests |

pub mod bayern;
pub mod mock;
pub mod nominatim;
pub mod openplz;
