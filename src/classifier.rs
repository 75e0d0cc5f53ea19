//! Query classification and postal-code extraction.
//!
//! Every raw query falls into exactly one of five categories, derived
//! purely from the trimmed text. The classification decides which
//! providers get invoked, so it has to be total and deterministic:
//! anything the more specific rules do not recognize lands in
//! [`QueryKind::Mixed`], never in an error.
//!
//! # Categories
//!
//! | Input | Category |
//! |-------|----------|
//! | `80331` | `PostalCodeOnly` |
//! | `Hauptstraße 12, 12345 Berlin` | `WithPostalCode` |
//! | `Hauptstraße 12` | `StreetWithNumber` |
//! | `Marienplatz` | `StreetOrCity` |
//! | `!!/#` | `Mixed` |
//!
//! When a postal code is present, the classifier also answers whether it
//! lies inside one of the configured numeric region ranges. A code that
//! does not parse as an integer, or parses outside every range, is never
//! in region.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::RegionRange;

/// Exactly five digits, nothing else.
static POSTAL_CODE_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{5}$").unwrap());

/// First standalone 5-digit run (word-bounded) anywhere in the query.
static POSTAL_CODE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{5})\b").unwrap());

/// At least one digit.
static ANY_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d").unwrap());

/// At least one letter (including German umlauts and sharp s).
static ANY_LETTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-zÄÖÜäöüß]").unwrap());

/// Only letters, spaces, hyphens and periods.
static LETTERS_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-zÄÖÜäöüß\s\-.]+$").unwrap());

/// A street token led by a letter, followed by a house number with an
/// optional suffix ("Am Plan 3c", "Hauptstr. 4 1/2", "A-Weg 8").
static STREET_WITH_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-zÄÖÜäöüß]\D*\s+\d+\s*.*$").unwrap());

/// Category of a raw query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    /// The whole query is one 5-digit postal code.
    PostalCodeOnly,
    /// Free text containing a standalone 5-digit postal code.
    WithPostalCode,
    /// Digits and letters but no postal code; typically street + number.
    StreetWithNumber,
    /// Letters, spaces, hyphens and periods only; street or locality name.
    StreetOrCity,
    /// Anything else.
    Mixed,
}

/// Classification of a query: category, normalized text, extracted
/// postal code and region membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// The assigned category.
    pub kind: QueryKind,
    /// The trimmed query text the category was derived from.
    pub normalized: String,
    /// Extracted 5-digit postal code, if any. When the query contains
    /// several standalone digit runs, the first one wins.
    pub postal_code: Option<String>,
    /// Whether the postal code lies in a configured region range.
    /// `None` when no postal code is present.
    pub in_region: Option<bool>,
}

impl Classification {
    /// Whether a postal code was extracted and lies in the region.
    pub fn is_in_region(&self) -> bool {
        self.in_region.unwrap_or(false)
    }

    /// Whether this classification carries a postal code at all.
    pub fn has_postal_code(&self) -> bool {
        self.postal_code.is_some()
    }
}

/// Classifies raw queries against a fixed set of region ranges.
#[derive(Debug, Clone)]
pub struct InputClassifier {
    ranges: Vec<RegionRange>,
}

impl InputClassifier {
    /// Create a classifier over the given region ranges.
    pub fn new(ranges: Vec<RegionRange>) -> Self {
        Self { ranges }
    }

    /// Classify a raw query. Total: every string gets exactly one category.
    pub fn classify(&self, query: &str) -> Classification {
        let trimmed = query.trim().to_string();

        if POSTAL_CODE_ONLY.is_match(&trimmed) {
            let in_region = self.is_in_region(&trimmed);
            return Classification {
                kind: QueryKind::PostalCodeOnly,
                postal_code: Some(trimmed.clone()),
                in_region: Some(in_region),
                normalized: trimmed,
            };
        }

        if let Some(code) = extract_postal_code(&trimmed) {
            let in_region = self.is_in_region(&code);
            return Classification {
                kind: QueryKind::WithPostalCode,
                postal_code: Some(code),
                in_region: Some(in_region),
                normalized: trimmed,
            };
        }

        let kind = if ANY_DIGIT.is_match(&trimmed) && ANY_LETTER.is_match(&trimmed) {
            QueryKind::StreetWithNumber
        } else if !trimmed.is_empty() && LETTERS_ONLY.is_match(&trimmed) {
            QueryKind::StreetOrCity
        } else {
            QueryKind::Mixed
        };

        Classification {
            kind,
            normalized: trimmed,
            postal_code: None,
            in_region: None,
        }
    }

    /// Whether a postal code lies inside one of the configured ranges.
    ///
    /// The code must parse as an integer; non-numeric input is never in
    /// region.
    pub fn is_in_region(&self, postal_code: &str) -> bool {
        match postal_code.trim().parse::<u32>() {
            Ok(code) => self.ranges.iter().any(|range| range.contains(code)),
            Err(_) => false,
        }
    }
}

/// Extract the first standalone 5-digit run from a query, if any.
pub fn extract_postal_code(query: &str) -> Option<String> {
    POSTAL_CODE_RUN
        .captures(query)
        .map(|caps| caps[1].to_string())
}

/// Whether a street input carries a house number ("Am Plan 3c",
/// "Hauptstr. 4 1/2", "A-Weg 8").
pub fn has_house_number(street_input: &str) -> bool {
    STREET_WITH_NUMBER.is_match(street_input.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> InputClassifier {
        InputClassifier::new(vec![
            RegionRange::new(80000, 87999),
            RegionRange::new(90000, 97999),
        ])
    }

    #[test]
    fn test_postal_code_only() {
        let c = classifier().classify("80331");
        assert_eq!(c.kind, QueryKind::PostalCodeOnly);
        assert_eq!(c.postal_code.as_deref(), Some("80331"));
        assert_eq!(c.in_region, Some(true));
    }

    #[test]
    fn test_postal_code_only_trims_whitespace() {
        let c = classifier().classify("  12345  ");
        assert_eq!(c.kind, QueryKind::PostalCodeOnly);
        assert_eq!(c.normalized, "12345");
        assert_eq!(c.in_region, Some(false));
    }

    #[test]
    fn test_all_five_digit_strings_classify_as_postal_code_only() {
        let classifier = classifier();
        for code in ["00000", "01067", "54321", "87999", "99999"] {
            let c = classifier.classify(code);
            assert_eq!(c.kind, QueryKind::PostalCodeOnly, "input {:?}", code);
            assert_eq!(c.postal_code.as_deref(), Some(code));
        }
    }

    #[test]
    fn test_with_postal_code() {
        let c = classifier().classify("Hauptstraße 12, 12345 Berlin");
        assert_eq!(c.kind, QueryKind::WithPostalCode);
        assert_eq!(c.postal_code.as_deref(), Some("12345"));
        assert_eq!(c.in_region, Some(false));
    }

    #[test]
    fn test_with_postal_code_in_region() {
        let c = classifier().classify("Marienplatz 1 80331 München");
        assert_eq!(c.kind, QueryKind::WithPostalCode);
        assert_eq!(c.postal_code.as_deref(), Some("80331"));
        assert_eq!(c.in_region, Some(true));
    }

    #[test]
    fn test_first_postal_code_run_wins() {
        // Ambiguity preserved from the source behavior: with several
        // standalone digit runs, the first is taken.
        let c = classifier().classify("Weg 12345 67890");
        assert_eq!(c.kind, QueryKind::WithPostalCode);
        assert_eq!(c.postal_code.as_deref(), Some("12345"));
    }

    #[test]
    fn test_six_digit_run_is_not_a_postal_code() {
        let c = classifier().classify("Ordernummer 123456");
        assert_eq!(c.kind, QueryKind::StreetWithNumber);
        assert_eq!(c.postal_code, None);
    }

    #[test]
    fn test_street_with_number() {
        let c = classifier().classify("Hauptstraße 12");
        assert_eq!(c.kind, QueryKind::StreetWithNumber);
        assert_eq!(c.postal_code, None);
        assert_eq!(c.in_region, None);
    }

    #[test]
    fn test_street_or_city() {
        for input in ["Marienplatz", "Bad Tölz", "Garmisch-Partenkirchen", "Hauptstr."] {
            let c = classifier().classify(input);
            assert_eq!(c.kind, QueryKind::StreetOrCity, "input {:?}", input);
        }
    }

    #[test]
    fn test_umlauts_are_letters() {
        let c = classifier().classify("Münchner Straße 5");
        assert_eq!(c.kind, QueryKind::StreetWithNumber);

        let c = classifier().classify("Öttingenstraße");
        assert_eq!(c.kind, QueryKind::StreetOrCity);
    }

    #[test]
    fn test_mixed_catch_all() {
        for input in ["!!/#", "12", "§$%", "Haus @", ""] {
            let c = classifier().classify(input);
            assert_eq!(c.kind, QueryKind::Mixed, "input {:?}", input);
            assert_eq!(c.postal_code, None);
        }
    }

    #[test]
    fn test_is_in_region() {
        let classifier = classifier();
        assert!(classifier.is_in_region("80331"));
        assert!(classifier.is_in_region("87999"));
        assert!(classifier.is_in_region("90000"));
        assert!(classifier.is_in_region("97999"));
        assert!(!classifier.is_in_region("79999"));
        assert!(!classifier.is_in_region("88000"));
        assert!(!classifier.is_in_region("12345"));
    }

    #[test]
    fn test_is_in_region_non_numeric() {
        let classifier = classifier();
        assert!(!classifier.is_in_region("abcde"));
        assert!(!classifier.is_in_region("8o331"));
        assert!(!classifier.is_in_region(""));
    }

    #[test]
    fn test_is_in_region_leading_zeros() {
        // "01067" parses as 1067, which is outside every default range.
        assert!(!classifier().is_in_region("01067"));
    }

    #[test]
    fn test_extract_postal_code() {
        assert_eq!(extract_postal_code("12345 Berlin").as_deref(), Some("12345"));
        assert_eq!(
            extract_postal_code("Berlin 12345").as_deref(),
            Some("12345")
        );
        assert_eq!(extract_postal_code("no code here"), None);
        assert_eq!(extract_postal_code("123456"), None);
        assert_eq!(extract_postal_code("1234"), None);
    }

    #[test]
    fn test_has_house_number() {
        assert!(has_house_number("Am Plan 3c"));
        assert!(has_house_number("Hauptstr. 4 1/2"));
        assert!(has_house_number("A-Weg 8"));
        assert!(has_house_number("Herrenstraße 12"));
        assert!(!has_house_number("Herrenstraße"));
        assert!(!has_house_number("12345"));
        assert!(!has_house_number(""));
    }

    #[test]
    fn test_classification_helpers() {
        let c = classifier().classify("80331");
        assert!(c.is_in_region());
        assert!(c.has_postal_code());

        let c = classifier().classify("Marienplatz");
        assert!(!c.is_in_region());
        assert!(!c.has_postal_code());
    }
}
