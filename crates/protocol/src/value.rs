//! Structured values carried in response envelopes
//!
//! The encoder is deterministic and applies the table canonicalization the
//! controller relies on:
//!
//! - non-finite numbers serialize as `null`
//! - integral numbers serialize without a fractional part
//! - a [`Table`] whose keys are exactly `1..=n` serializes as a list
//! - any other table serializes as an object, integer keys first
//!
//! ```
//! use itg_remote_protocol::value::{Table, Value};
//!
//! let mut steps = Table::new();
//! steps.insert(1, "Difficulty_Easy");
//! steps.insert(2, "Difficulty_Hard");
//!
//! let text = Value::from(steps).to_json().unwrap();
//! assert_eq!(text, r#"["Difficulty_Easy","Difficulty_Hard"]"#);
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::{ProtocolError, Result};

/// Largest magnitude rendered as an integer (2^53)
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<Value>),
    Table(Table),
}

/// Key of a [`Table`] entry
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    Index(i64),
    Name(String),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(i) => write!(f, "{}", i),
            Key::Name(name) => f.write_str(name),
        }
    }
}

impl From<i64> for Key {
    fn from(index: i64) -> Self {
        Key::Index(index)
    }
}

impl From<i32> for Key {
    fn from(index: i32) -> Self {
        Key::Index(index as i64)
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index as i64)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

/// Mapping from integer or string keys to values
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    entries: BTreeMap<Key, Value>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<Key>, value: impl Into<Value>) -> &mut Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<Key>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts only when `value` is present
    pub fn with_opt<V: Into<Value>>(mut self, key: impl Into<Key>, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.insert(key, value);
        }
        self
    }

    pub fn get(&self, key: impl Into<Key>) -> Option<&Value> {
        self.entries.get(&key.into())
    }

    pub fn contains_key(&self, key: impl Into<Key>) -> bool {
        self.entries.contains_key(&key.into())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Value)> {
        self.entries.iter()
    }

    /// Returns the values in key order if the keys are exactly `1..=n`
    pub fn as_sequence(&self) -> Option<Vec<&Value>> {
        if self.entries.is_empty() {
            return None;
        }

        let mut expected = 1i64;
        for key in self.entries.keys() {
            match key {
                Key::Index(i) if *i == expected => expected += 1,
                _ => return None,
            }
        }
        Some(self.entries.values().collect())
    }
}

impl<K: Into<Key>, V: Into<Value>> FromIterator<(K, V)> for Table {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut table = Table::new();
        for (key, value) in iter {
            table.insert(key, value);
        }
        table
    }
}

impl Value {
    /// Renders the value as compact JSON text
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| ProtocolError::CodecError(format!("JSON encode failed: {}", e)))
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Value::Table(table) => Some(table),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

fn serialize_number<S: Serializer>(n: f64, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    if !n.is_finite() {
        serializer.serialize_unit()
    } else if n.fract() == 0.0 && n.abs() < MAX_EXACT_INTEGER {
        serializer.serialize_i64(n as i64)
    } else {
        serializer.serialize_f64(n)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => serialize_number(*n, serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::List(items) => serializer.collect_seq(items),
            Value::Table(table) => table.serialize(serializer),
        }
    }
}

impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if let Some(items) = self.as_sequence() {
            return serializer.collect_seq(items);
        }

        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(&key.to_string(), value)?;
        }
        map.end()
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::Number(n as f64)
    }
}

macro_rules! impl_from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(n: $t) -> Self {
                    Value::Number(n as f64)
                }
            }
        )*
    };
}

impl_from_integer!(u8, u16, u32, u64, usize, i32, i64);

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

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::String(s.clone())
    }
}

impl From<Table> for Value {
    fn from(table: Table) -> Self {
        Value::Table(table)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json(value: impl Into<Value>) -> String {
        value.into().to_json().unwrap()
    }

    #[test]
    fn test_scalars() {
        assert_eq!(json(Value::Null), "null");
        assert_eq!(json(true), "true");
        assert_eq!(json(3u32), "3");
        assert_eq!(json(-2i64), "-2");
        assert_eq!(json(0.5), "0.5");
        assert_eq!(json(97.25f64), "97.25");
    }

    #[test]
    fn test_non_finite_numbers_are_null() {
        assert_eq!(json(f64::NAN), "null");
        assert_eq!(json(f64::INFINITY), "null");
        assert_eq!(json(f64::NEG_INFINITY), "null");
    }

    #[test]
    fn test_consecutive_keys_render_as_list() {
        let table: Table = [(1, "a"), (2, "b"), (3, "c")].into_iter().collect();
        assert_eq!(json(table), json(vec!["a", "b", "c"]));
    }

    #[test]
    fn test_sparse_keys_render_as_object() {
        let table: Table = [(1, "a"), (3, "c")].into_iter().collect();
        assert_eq!(json(table), r#"{"1":"a","3":"c"}"#);
    }

    #[test]
    fn test_zero_based_keys_render_as_object() {
        let table: Table = [(0, "a"), (1, "b")].into_iter().collect();
        assert_eq!(json(table), r#"{"0":"a","1":"b"}"#);
    }

    #[test]
    fn test_named_keys_render_as_object() {
        let table = Table::new().with("a", 1u32);
        assert_eq!(json(table), r#"{"a":1}"#);
    }

    #[test]
    fn test_mixed_keys_render_as_object() {
        let table = Table::new().with(1, "first").with("n", 1u32);
        assert_eq!(json(table), r#"{"1":"first","n":1}"#);
    }

    #[test]
    fn test_empty_table_is_object() {
        assert_eq!(json(Table::new()), "{}");
        assert_eq!(json(Vec::<Value>::new()), "[]");
    }

    #[test]
    fn test_string_escapes() {
        let text = json("a\\b\"c\nd\re\tf");
        assert_eq!(text, r#""a\\b\"c\nd\re\tf""#);
    }

    #[test]
    fn test_with_opt() {
        let table = Table::new()
            .with("ok", true)
            .with_opt("score", Some(100u32))
            .with_opt::<f64>("combo", None);
        assert!(table.contains_key("score"));
        assert!(!table.contains_key("combo"));
    }
}
