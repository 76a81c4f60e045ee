//! Property and reference value types.

use crate::entity::Entity;
use serde::{Serialize, Serializer};
use serde_json::Number;
use std::collections::BTreeMap;

/// A decoded property value.
///
/// Objects met inside `props` are decoded as nested entities, so the
/// `Object` variant only ever carries passthrough fields of a context
/// entity (such as its `namespaces` table).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// JSON null. Only appears as a list element or context field; null
    /// property values are dropped by the decoder.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Number in its JSON representation.
    Number(Number),
    /// String value, stored verbatim.
    String(String),
    /// Ordered list of values.
    List(Vec<Value>),
    /// Embedded entity.
    Entity(Box<Entity>),
    /// Plain JSON object (context passthrough only).
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Returns the string if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the boolean if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the number as `u64` if it is a non-negative integer.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Number(n) => n.as_u64(),
            _ => None,
        }
    }

    /// Returns the number as `i64` if it is an integer in range.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    /// Returns the number as `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    /// Returns the elements if this is a `List`.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the embedded entity if this is an `Entity`.
    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Value::Entity(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the fields if this is an `Object`.
    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Returns true if this is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
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

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(n.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Entity> for Value {
    fn from(e: Entity) -> Self {
        Value::Entity(Box::new(e))
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => n.serialize(serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::List(items) => serializer.collect_seq(items),
            Value::Entity(e) => e.serialize(serializer),
            Value::Object(map) => serializer.collect_map(map),
        }
    }
}

/// A reference value: one or many namespace-resolved entity ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RefValue {
    /// Single referenced id.
    Single(String),
    /// List of referenced ids.
    Many(Vec<String>),
}

impl RefValue {
    /// Iterates over the referenced ids.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        let slice: &[String] = match self {
            RefValue::Single(id) => std::slice::from_ref(id),
            RefValue::Many(ids) => ids,
        };
        slice.iter().map(String::as_str)
    }

    /// Number of referenced ids.
    pub fn len(&self) -> usize {
        match self {
            RefValue::Single(_) => 1,
            RefValue::Many(ids) => ids.len(),
        }
    }

    /// Returns true if this is an empty list.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rewrites every referenced id in place.
    pub fn map_ids(&mut self, mut f: impl FnMut(&str) -> String) {
        match self {
            RefValue::Single(id) => *id = f(id),
            RefValue::Many(ids) => {
                for id in ids.iter_mut() {
                    *id = f(id);
                }
            }
        }
    }
}

impl From<&str> for RefValue {
    fn from(id: &str) -> Self {
        RefValue::Single(id.to_string())
    }
}

impl From<Vec<&str>> for RefValue {
    fn from(ids: Vec<&str>) -> Self {
        RefValue::Many(ids.into_iter().map(str::to_string).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn value_accessors() {
        assert_eq!(Value::from("x").as_str(), Some("x"));
        assert_eq!(Value::from(true).as_bool(), Some(true));
        assert_eq!(Value::from(42u64).as_u64(), Some(42));
        assert_eq!(Value::from(-3i64).as_i64(), Some(-3));
        assert!(Value::Null.is_null());
        assert_eq!(Value::from("x").as_bool(), None);
    }

    #[test]
    fn value_from_json_keeps_structure() {
        let value = Value::from(json!({"a": [1, null, "b"], "c": {"d": 2.5}}));
        let map = value.as_object().unwrap();
        let list = map["a"].as_list().unwrap();
        assert_eq!(list.len(), 3);
        assert!(list[1].is_null());
        assert_eq!(map["c"].as_object().unwrap()["d"].as_f64(), Some(2.5));
    }

    #[test]
    fn value_serializes_as_plain_json() {
        let value = Value::List(vec![Value::from("a"), Value::from(1u64), Value::Null]);
        assert_eq!(serde_json::to_string(&value).unwrap(), r#"["a",1,null]"#);
    }

    #[test]
    fn ref_value_serializes_untagged() {
        assert_eq!(
            serde_json::to_string(&RefValue::from("ns0:a")).unwrap(),
            r#""ns0:a""#
        );
        assert_eq!(
            serde_json::to_string(&RefValue::from(vec!["ns0:a", "ns0:b"])).unwrap(),
            r#"["ns0:a","ns0:b"]"#
        );
    }

    #[test]
    fn ref_value_map_ids() {
        let mut refs = RefValue::from(vec!["a", "b"]);
        refs.map_ids(|id| format!("x:{id}"));
        assert_eq!(refs.ids().collect::<Vec<_>>(), vec!["x:a", "x:b"]);
        assert_eq!(refs.len(), 2);
        assert!(!refs.is_empty());
    }
}
