//! The typed result of resolving a metric against a snapshot

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unit attached to a metric value
///
/// Only `USD` and `%` change how a value is formatted; every other unit
/// string is carried through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Unit {
    Usd,
    /// Stored as a 0-1 fraction
    Percent,
    Other(String),
}

impl From<String> for Unit {
    fn from(s: String) -> Self {
        match s.as_str() {
            "USD" => Unit::Usd,
            "%" => Unit::Percent,
            _ => Unit::Other(s),
        }
    }
}

impl From<&str> for Unit {
    fn from(s: &str) -> Self {
        Unit::from(s.to_string())
    }
}

impl From<Unit> for String {
    fn from(unit: Unit) -> Self {
        match unit {
            Unit::Usd => "USD".into(),
            Unit::Percent => "%".into(),
            Unit::Other(s) => s,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Usd => write!(f, "USD"),
            Unit::Percent => write!(f, "%"),
            Unit::Other(s) => write!(f, "{}", s),
        }
    }
}

/// A resolved metric: `value` is what sorts and computes, `raw` is what a
/// person reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    pub value: f64,
    pub unit: Option<Unit>,
    pub raw: String,
    pub key: String,
}

impl MetricValue {
    pub fn new(value: f64, unit: Option<Unit>, raw: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            value,
            unit,
            raw: raw.into(),
            key: key.into(),
        }
    }

    /// The "no data" value: zero, unitless, nothing to display
    pub fn empty(key: impl Into<String>) -> Self {
        Self::new(0.0, None, "", key)
    }

    /// Value used for ordering; anything non-finite counts as zero
    pub fn sort_value(&self) -> f64 {
        if self.value.is_finite() {
            self.value
        } else {
            0.0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.value == 0.0 && self.unit.is_none() && self.raw.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_from_wire_strings() {
        assert_eq!(Unit::from("USD"), Unit::Usd);
        assert_eq!(Unit::from("%"), Unit::Percent);
        assert_eq!(Unit::from("years"), Unit::Other("years".into()));
    }

    #[test]
    fn test_unit_serializes_back_to_wire_string() {
        let json = serde_json::to_string(&Unit::Percent).unwrap();
        assert_eq!(json, "\"%\"");
        let unit: Unit = serde_json::from_str("\"per 1,000\"").unwrap();
        assert_eq!(unit, Unit::Other("per 1,000".into()));
    }

    #[test]
    fn test_empty_value() {
        let value = MetricValue::empty("gini_coefficient");
        assert!(value.is_empty());
        assert_eq!(value.value, 0.0);
        assert_eq!(value.key, "gini_coefficient");
    }

    #[test]
    fn test_sort_value_masks_non_finite() {
        let value = MetricValue::new(f64::NAN, None, "?", "x");
        assert_eq!(value.sort_value(), 0.0);
        let value = MetricValue::new(f64::INFINITY, None, "?", "x");
        assert_eq!(value.sort_value(), 0.0);
    }
}
