//! Street-suffix abbreviation ("Herrenstraße" → "Herrenstr.").
//!
//! An ordered list of pattern → replacement rules, one per spelling of
//! the suffix term (lowercase, titlecase, uppercase). Each rule is
//! anchored so it only rewrites a suffix token at a word end, never a
//! substring inside another word ("Straßenbahn" stays untouched). Rules
//! run in a fixed sequence, and no rule's output can re-trigger another
//! rule.
//!
//! Whether the abbreviator runs at all is a per-provider decision: some
//! backends already deliver abbreviated street names, others deliver the
//! long form that downstream form fields cannot hold.

use once_cell::sync::Lazy;
use regex::Regex;

/// One rewrite rule: anchored pattern plus replacement keeping the
/// trailing separator.
struct Rule {
    pattern: Regex,
    replacement: &'static str,
}

/// Suffix rules in application order, one per case variant.
static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        Rule {
            pattern: Regex::new(r"straße(\s|$)").unwrap(),
            replacement: "str.$1",
        },
        Rule {
            pattern: Regex::new(r"Straße(\s|$)").unwrap(),
            replacement: "Str.$1",
        },
        Rule {
            pattern: Regex::new(r"STRASSE(\s|$)").unwrap(),
            replacement: "STR.$1",
        },
    ]
});

/// Applies the ordered street-suffix rewrite rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreetAbbreviator;

impl StreetAbbreviator {
    /// Create a new abbreviator with the built-in rule set.
    pub fn new() -> Self {
        Self
    }

    /// Apply all rules in order to a street name.
    pub fn apply(&self, street_name: &str) -> String {
        let mut result = street_name.to_string();
        for rule in RULES.iter() {
            if rule.pattern.is_match(&result) {
                result = rule
                    .pattern
                    .replace_all(&result, rule.replacement)
                    .into_owned();
            }
        }
        if result != street_name {
            tracing::debug!(from = street_name, to = %result, "street name abbreviated");
        }
        result
    }
}
