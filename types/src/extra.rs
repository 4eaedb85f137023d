//! Typed key-value bag carried by confirmations, results and error details.
//!
//! Per-ledger payloads vary in shape, so the bag stays open on keys but
//! closed on value kinds.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single value in an [`ExtraData`] bag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtraValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<ExtraValue>),
    Map(BTreeMap<String, ExtraValue>),
}

impl ExtraValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<bool> for ExtraValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ExtraValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for ExtraValue {
    fn from(v: i32) -> Self {
        Self::Integer(v.into())
    }
}

impl From<u32> for ExtraValue {
    fn from(v: u32) -> Self {
        Self::Integer(v.into())
    }
}

/// Values beyond `i64::MAX` are kept as decimal text.
impl From<u64> for ExtraValue {
    fn from(v: u64) -> Self {
        match i64::try_from(v) {
            Ok(n) => Self::Integer(n),
            Err(_) => Self::Text(v.to_string()),
        }
    }
}

impl From<f64> for ExtraValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ExtraValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for ExtraValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl<T: Into<ExtraValue>> From<Option<T>> for ExtraValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<ExtraValue>> From<Vec<T>> for ExtraValue {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl From<ExtraData> for ExtraValue {
    fn from(v: ExtraData) -> Self {
        Self::Map(v.0)
    }
}

/// Ordered map of string keys to [`ExtraValue`]s.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtraData(BTreeMap<String, ExtraValue>);

impl ExtraData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ExtraValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ExtraValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<ExtraValue> {
        self.0.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&ExtraValue> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ExtraValue::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(ExtraValue::as_i64)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ExtraValue)> {
        self.0.iter()
    }

    /// Copy every entry of `other` into `self`, overwriting existing keys.
    pub fn extend(&mut self, other: ExtraData) {
        self.0.extend(other.0);
    }
}

impl FromIterator<(String, ExtraValue)> for ExtraData {
    fn from_iter<I: IntoIterator<Item = (String, ExtraValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
