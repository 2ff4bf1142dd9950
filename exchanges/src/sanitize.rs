//! Rate payload sanitizing and validation.
//!
//! Upstream payloads are untrusted: values may arrive as strings, nulls,
//! nested objects or non-finite numbers. [`sanitize`] keeps only entries that
//! are finite numbers after coercion; [`is_valid`] checks the shape of a raw
//! payload.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Currency code → numeric rate.
///
/// Values are finite but not necessarily positive; positivity is enforced when
/// a ticker is built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RateMap(HashMap<String, f64>);

impl RateMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, code: &str) -> Option<f64> {
        self.0.get(code).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.0.iter()
    }

    /// At least one entry, every value finite.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty() && self.0.values().all(|v| v.is_finite())
    }
}

impl FromIterator<(String, f64)> for RateMap {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Coerce a raw rate payload into a [`RateMap`].
///
/// Non-object input yields an empty map. String values must parse whole
/// after trimming, so `"1.5 USD"` is dropped rather than read as `1.5`.
pub fn sanitize(raw: &Value) -> RateMap {
    let Value::Object(entries) = raw else {
        return RateMap::new();
    };

    entries
        .iter()
        .filter_map(|(code, value)| coerce_rate(value).map(|rate| (code.clone(), rate)))
        .collect()
}

/// True iff `raw` is a non-empty object whose values are all numbers.
pub fn is_valid(raw: &Value) -> bool {
    match raw {
        Value::Object(entries) => {
            !entries.is_empty() && entries.values().all(Value::is_number)
        }
        _ => false,
    }
}

fn coerce_rate(value: &Value) -> Option<f64> {
    let rate = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    rate.is_finite().then_some(rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_sanitize_coerces_and_drops() {
        let rates = sanitize(&json!({
            "A": "1.5",
            "B": 2,
            "C": "x",
            "D": "NaN",
            "E": "Infinity",
            "F": null,
            "G": {"nested": 1},
            "H": [1.0],
            "I": "-inf",
        }));

        let expected: RateMap = [("A".to_string(), 1.5), ("B".to_string(), 2.0)]
            .into_iter()
            .collect();
        assert_eq!(rates, expected);
    }

    #[test]
    fn test_sanitize_keeps_non_positive_values() {
        let rates = sanitize(&json!({"USD": 0, "EUR": "-0.5"}));
        assert_eq!(rates.get("USD"), Some(0.0));
        assert_eq!(rates.get("EUR"), Some(-0.5));
    }

    #[test]
    fn test_sanitize_non_object() {
        assert!(sanitize(&Value::Null).is_empty());
        assert!(sanitize(&json!("x")).is_empty());
        assert!(sanitize(&json!(123)).is_empty());
        assert!(sanitize(&json!([1, 2, 3])).is_empty());
        assert!(sanitize(&json!({})).is_empty());
    }

    #[test]
    fn test_sanitize_requires_whole_numeric_strings() {
        let rates = sanitize(&json!({"EUR": "1.5 USD", "COP": " 3940.15 ", "GBP": "0.7x"}));

        assert_eq!(rates.len(), 1);
        assert_eq!(rates.get("COP"), Some(3940.15));
        assert_eq!(rates.get("EUR"), None);
    }

    #[test]
    fn test_is_valid() {
        assert!(!is_valid(&json!({})));
        assert!(is_valid(&json!({"A": 1})));
        assert!(is_valid(&json!({"USD": 1, "EUR": 0.85, "GBP": 0.72})));
        assert!(!is_valid(&json!({"A": "1"})));
        assert!(!is_valid(&json!({"USD": 1, "EUR": "0.85"})));
    }

    #[test]
    fn test_is_valid_non_object() {
        assert!(!is_valid(&Value::Null));
        assert!(!is_valid(&json!("rates")));
        assert!(!is_valid(&json!(123)));
        assert!(!is_valid(&json!([1, 2, 3])));
    }

    #[test]
    fn test_sanitized_output_is_valid() {
        let raw = json!({"USD": 1, "EUR": "0.85", "COP": "bogus"});
        let rates = sanitize(&raw);
        assert!(rates.is_valid());
        assert!(is_valid(&serde_json::to_value(&rates).unwrap()));
        assert!(!sanitize(&json!({"COP": "bogus"})).is_valid());
    }

    proptest! {
        #[test]
        fn finite_numbers_and_numeric_strings_survive(
            entries in proptest::collection::hash_map("[A-Z]{3}", -1e9f64..1e9, 0..12),
            as_strings in any::<bool>(),
        ) {
            let raw: serde_json::Map<String, Value> = entries
                .iter()
                .map(|(code, rate)| {
                    let value = if as_strings { json!(rate.to_string()) } else { json!(rate) };
                    (code.clone(), value)
                })
                .collect();

            let rates = sanitize(&Value::Object(raw));

            prop_assert_eq!(rates.len(), entries.len());
            for (code, rate) in &entries {
                prop_assert_eq!(rates.get(code), Some(*rate));
            }
        }

        #[test]
        fn non_numeric_strings_are_dropped(text in "[a-zA-Z ]{1,12}") {
            let raw = json!({ "USD": text, "EUR": 1.0 });
            let rates = sanitize(&raw);
            prop_assume!(text.trim().parse::<f64>().is_err());
            prop_assert_eq!(rates.len(), 1);
            prop_assert_eq!(rates.get("EUR"), Some(1.0));
        }
    }
}
