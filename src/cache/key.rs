//! Cache Key Module
//!
//! Derives stable cache keys from an entity path and a typed parameter set.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// == Param Value ==
/// Closed set of scalar values a query parameter may take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Str(v) => f.write_str(v),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v.into())
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        ParamValue::Int(v.into())
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

// == Params ==
/// Query parameters for a read.
///
/// Backed by an ordered map, so insertion order never leaks into the key.
/// Inserting `None` leaves the parameter out entirely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, ParamValue>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Builder-style insert that skips absent values.
    pub fn with_opt<V: Into<ParamValue>>(mut self, name: impl Into<String>, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.insert(name, value);
        }
        self
    }

    /// Inserts a parameter. Non-finite floats have no JSON form and are left
    /// out, like absent values.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        let value = value.into();
        if let ParamValue::Float(v) = value {
            if !v.is_finite() {
                return;
            }
        }
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<ParamValue> {
        self.0.remove(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when every parameter of `self` appears in `other` with the same value.
    pub fn is_subset_of(&self, other: &Params) -> bool {
        self.0
            .iter()
            .all(|(name, value)| other.get(name) == Some(value))
    }

    /// Parameters as `(name, value)` string pairs for a URL query.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .map(|(name, value)| (name.clone(), value.to_string()))
            .collect()
    }

    fn canonical(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| format!("{:?}", self.0))
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (name, value) in iter {
            params.insert(name, value);
        }
        params
    }
}

// == Entity Id ==
/// Backend record identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Int(i64),
    Str(String),
}

impl EntityId {
    /// Parses a path segment, preferring the integer form.
    pub fn parse(segment: &str) -> Self {
        segment
            .parse::<i64>()
            .map(EntityId::Int)
            .unwrap_or_else(|_| EntityId::Str(segment.to_string()))
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Int(id) => write!(f, "{}", id),
            EntityId::Str(id) => f.write_str(id),
        }
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        EntityId::Int(id)
    }
}

impl From<i32> for EntityId {
    fn from(id: i32) -> Self {
        EntityId::Int(id.into())
    }
}

impl From<u32> for EntityId {
    fn from(id: u32) -> Self {
        EntityId::Int(id.into())
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        EntityId::Str(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        EntityId::Str(id)
    }
}

// == Cache Key ==
/// Deterministic identifier of one (entity path, params) read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Params of this key when it is a read of exactly `entity`, empty for
    /// the unfiltered read. `None` for any other path.
    pub fn params_of(&self, entity: &str) -> Option<Params> {
        match self.0.strip_prefix(entity)? {
            "" => Some(Params::new()),
            rest => serde_json::from_str(rest.strip_prefix('?')?).ok(),
        }
    }

    /// True when this key equals `prefix` or extends it past a `/` or `?`
    /// boundary, so `leases` covers `leases/3` but never `leases-archive`.
    pub fn is_under(&self, prefix: &CacheKey) -> bool {
        match self.0.strip_prefix(prefix.as_str()) {
            Some("") => true,
            Some(rest) => rest.starts_with('/') || rest.starts_with('?'),
            None => false,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// == Builders ==
/// Builds the cache key for `entity` and optional params.
///
/// `None` and an empty parameter set produce the same key.
pub fn build_key(entity: &str, params: Option<&Params>) -> CacheKey {
    match params {
        Some(params) if !params.is_empty() => {
            CacheKey(format!("{}?{}", entity, params.canonical()))
        }
        _ => CacheKey(entity.to_string()),
    }
}

/// Entity path of a single record, e.g. `tenants/7`.
pub fn record_path(entity: &str, id: &EntityId) -> String {
    format!("{}/{}", entity, id)
}

/// Entity path of a nested collection, e.g. `apartments/3/meter-readings`.
pub fn related_path(entity: &str, id: &EntityId, related: &str) -> String {
    format!("{}/{}/{}", entity, id, related)
}
