//! Record representation
//!
//! A Record is a single JSON file holding named bins. Each bin holds an
//! arbitrarily nested value (maps, lists, scalars) — the structure path
//! expressions navigate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A record in the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Unique key (derived from filename, without .json extension)
    pub key: String,

    /// Named bins
    pub bins: Bins,

    /// Metadata about the record
    #[serde(skip)]
    pub meta: RecordMeta,
}

/// Nested values that can be stored in a bin
///
/// Maps use `BTreeMap` so iteration order, and therefore query output,
/// is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<Value>> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Look a key up if this value is a map
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|m| m.get(key))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Name of this value's shape, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(l: Vec<Value>) -> Self {
        Value::List(l)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(m: BTreeMap<String, Value>) -> Self {
        Value::Map(m)
    }
}

/// A map of bin names to values
pub type Bins = BTreeMap<String, Value>;

/// Metadata about a record (not persisted inside the bins)
#[derive(Debug, Clone, Default)]
pub struct RecordMeta {
    /// Write counter, bumped on every persisted change
    pub generation: u64,
    /// File modification time
    pub modified_at: Option<std::time::SystemTime>,
}

impl Record {
    /// Create a new record with the given key
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            bins: Bins::new(),
            meta: RecordMeta::default(),
        }
    }

    /// Set a bin value
    pub fn set_bin(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.bins.insert(name.into(), value.into());
        self
    }

    /// Get a bin value
    pub fn bin(&self, name: &str) -> Option<&Value> {
        self.bins.get(name)
    }
}
