//! Field comparisons between desired parameters and what the proxy reports
//!
//! Only fields the user set are compared. Models compare as sets. Desired
//! metadata must be a subset of the observed metadata, since the proxy adds
//! its own entries.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// A set desired string matches the observed one
pub fn field_matches(desired: Option<&String>, observed: Option<&String>) -> bool {
    match desired.filter(|d| !d.is_empty()) {
        None => true,
        Some(desired) => observed == Some(desired),
    }
}

pub fn models_match(desired: &[String], observed: Option<&Vec<String>>) -> bool {
    if desired.is_empty() {
        return true;
    }
    let observed: BTreeSet<&String> = observed.into_iter().flatten().collect();
    desired.iter().collect::<BTreeSet<_>>() == observed
}

pub fn budget_matches(desired: Option<f64>, observed: Option<f64>) -> bool {
    match desired {
        None => true,
        Some(desired) => observed.is_some_and(|o| (o - desired).abs() < 1e-9),
    }
}

pub fn metadata_matches(desired: &BTreeMap<String, String>, observed: Option<&Map<String, Value>>) -> bool {
    desired.iter().all(|(k, v)| {
        observed
            .and_then(|m| m.get(k))
            .and_then(Value::as_str)
            .is_some_and(|o| o == v)
    })
}
