//! Dotted-path lookup over snapshot documents
//!
//! Snapshot documents are free-form JSON whose shape changes as the
//! simulation template evolves. A metric leaf normally looks like
//! `{"value": 0.42, "unit": "%", "raw": "42%", "key": "Unemployment Rate"}`;
//! a bare number is accepted too. Paths are resolved fresh every call.

use crate::metrics::value::{MetricValue, Unit};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PathError {
    #[error("path '{path}' not found at segment '{segment}'")]
    NotFound { path: String, segment: String },

    #[error("path '{path}' does not hold a numeric metric")]
    NotAMetric { path: String },
}

/// Walk `path` through `document` and return the metric found there
pub fn resolve(document: &Value, path: &str) -> Result<MetricValue, PathError> {
    let leaf = lookup(document, path)?;
    metric_from_leaf(leaf, path).ok_or_else(|| PathError::NotAMetric { path: path.to_string() })
}

/// Like [`resolve`], but "no data" becomes an empty value
pub fn resolve_or_empty(document: &Value, path: &str) -> MetricValue {
    resolve(document, path).unwrap_or_else(|_| MetricValue::empty(last_segment(path)))
}

/// Raw JSON node at `path`
pub fn lookup<'a>(document: &'a Value, path: &str) -> Result<&'a Value, PathError> {
    let mut node = document;
    for segment in path.split('.') {
        node = node
            .as_object()
            .and_then(|map| map.get(segment))
            .ok_or_else(|| PathError::NotFound {
                path: path.to_string(),
                segment: segment.to_string(),
            })?;
    }
    Ok(node)
}

fn metric_from_leaf(leaf: &Value, path: &str) -> Option<MetricValue> {
    match leaf {
        Value::Number(n) => {
            let value = n.as_f64()?;
            Some(MetricValue::new(value, None, n.to_string(), last_segment(path)))
        }
        Value::Object(map) => {
            let value = match map.get("value")? {
                Value::Number(n) => n.as_f64()?,
                Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok()?,
                _ => return None,
            };
            let unit = map
                .get("unit")
                .and_then(Value::as_str)
                .filter(|u| !u.is_empty())
                .map(Unit::from);
            let raw = map
                .get("raw")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| value.to_string());
            let key = map
                .get("key")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| last_segment(path).to_string());
            Some(MetricValue::new(value, unit, raw, key))
        }
        _ => None,
    }
}

fn last_segment(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}
