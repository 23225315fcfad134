//! Case-insensitive view over a flat survey submission
//!
//! Form platforms prefix answers with their group path
//! (`group_power/electricity_source`) and casing drifts between form
//! versions, so keys are indexed by their lowercased last path segment.
//! Unprefixed keys win over prefixed ones that share a segment.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;

use super::fields::{value_bool, value_datetime, value_f64, value_i64, value_list, value_text};
use super::geolocation::parse_geolocation;
use crate::models::GeoPoint;

pub struct RawRecord<'a> {
    fields: HashMap<String, &'a Value>,
}

impl<'a> RawRecord<'a> {
    pub fn new(map: &'a Map<String, Value>) -> Self {
        let mut fields = HashMap::with_capacity(map.len());

        for (key, value) in map.iter().filter(|(k, _)| !k.contains('/')) {
            fields.entry(key.to_lowercase()).or_insert(value);
        }
        for (key, value) in map.iter().filter(|(k, _)| k.contains('/')) {
            fields.entry(normalize_key(key)).or_insert(value);
        }

        Self { fields }
    }

    /// Raw value for `key`, if present and not null
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.fields
            .get(&key.to_lowercase())
            .copied()
            .filter(|v| !v.is_null())
    }

    /// First present, non-null value among `keys`
    pub fn first(&self, keys: &[&str]) -> Option<&'a Value> {
        keys.iter().find_map(|k| self.get(k))
    }

    /// First of `keys` that yields usable text
    pub fn text(&self, keys: &[&str]) -> Option<String> {
        self.find(keys, value_text)
    }

    /// First of `keys` that yields a non-empty list; empty list otherwise
    pub fn list(&self, keys: &[&str]) -> Vec<String> {
        self.find(keys, |v| {
            let items = value_list(v);
            (!items.is_empty()).then_some(items)
        })
        .unwrap_or_default()
    }

    /// Integer answer, `0` when absent or unparseable
    pub fn int(&self, keys: &[&str]) -> i64 {
        self.find(keys, value_i64).unwrap_or(0)
    }

    /// Numeric answer, `0.0` when absent or unparseable
    pub fn number(&self, keys: &[&str]) -> f64 {
        self.find(keys, value_f64).unwrap_or(0.0)
    }

    /// Yes/no answer, `false` when absent or unrecognized
    pub fn flag(&self, keys: &[&str]) -> bool {
        self.find(keys, value_bool).unwrap_or(false)
    }

    pub fn datetime(&self, keys: &[&str]) -> Option<DateTime<Utc>> {
        self.find(keys, value_datetime)
    }

    pub fn geolocation(&self, keys: &[&str]) -> Option<GeoPoint> {
        self.find(keys, parse_geolocation)
    }

    fn find<T>(&self, keys: &[&str], parse: impl Fn(&Value) -> Option<T>) -> Option<T> {
        keys.iter().filter_map(|k| self.get(k)).find_map(parse)
    }
}

/// Lowercased last `/`-separated segment
fn normalize_key(key: &str) -> String {
    key.rsplit('/').next().unwrap_or(key).to_lowercase()
}
