//! Bind parameters for queries

use indexmap::IndexMap;
use std::collections::{BTreeMap, HashMap};

use crate::{Result, Value};

/// Named bind parameters for a query.
///
/// Keeps the caller's insertion order for binding; use [`QueryParams::normalized`]
/// when an order-independent form is needed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    values: IndexMap<String, Value>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Entries sorted by key with each value serialized to JSON.
    ///
    /// Two parameter sets with the same entries produce the same output
    /// whatever order they were inserted in.
    pub fn normalized(&self) -> Result<Vec<(String, String)>> {
        let mut entries = self
            .values
            .iter()
            .map(|(k, v)| Ok((k.clone(), serde_json::to_string(v)?)))
            .collect::<Result<Vec<_>>>()?;
        entries.sort();
        Ok(entries)
    }

    /// `None` when there is nothing to bind
    pub fn non_empty(params: Option<&QueryParams>) -> Option<&QueryParams> {
        params.filter(|p| !p.is_empty())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

impl From<HashMap<String, Value>> for QueryParams {
    fn from(map: HashMap<String, Value>) -> Self {
        map.into_iter().collect()
    }
}

impl From<BTreeMap<String, Value>> for QueryParams {
    fn from(map: BTreeMap<String, Value>) -> Self {
        map.into_iter().collect()
    }
}
