//! The entity record and its sentinel forms.

use crate::value::{RefValue, Value};
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Id of the context entity that opens every stream.
pub const CONTEXT_ID: &str = "@context";

/// Id of the continuation entity that may close a stream.
pub const CONTINUATION_ID: &str = "@continuation";

/// Property key holding the namespace table of a context entity.
pub const NAMESPACES_KEY: &str = "namespaces";

/// Property key holding the resumption token of a continuation entity.
pub const TOKEN_KEY: &str = "token";

/// A graph-shaped record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entity {
    /// Compressed `prefix:local` id, or one of the sentinel ids.
    pub id: String,
    /// Logical timestamp, 0 when absent.
    pub recorded: u64,
    /// Deletion marker.
    pub deleted: bool,
    /// Property values keyed by compressed property name.
    pub properties: BTreeMap<String, Value>,
    /// Reference values keyed by compressed reference name.
    pub references: BTreeMap<String, RefValue>,
}

impl Entity {
    /// Creates an empty entity with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Creates a context entity carrying the given namespace table.
    pub fn context<I, K, V>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let table = namespaces
            .into_iter()
            .map(|(k, v)| (k.into(), Value::String(v.into())))
            .collect();
        let mut e = Self::new(CONTEXT_ID);
        e.properties
            .insert("id".to_string(), Value::String(CONTEXT_ID.to_string()));
        e.properties
            .insert(NAMESPACES_KEY.to_string(), Value::Object(table));
        e
    }

    /// Creates a continuation entity carrying a resumption token.
    pub fn continuation(token: impl Into<String>) -> Self {
        let mut e = Self::new(CONTINUATION_ID);
        e.properties
            .insert(TOKEN_KEY.to_string(), Value::String(token.into()));
        e
    }

    /// Sets a property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Sets a reference.
    pub fn with_reference(mut self, key: impl Into<String>, value: impl Into<RefValue>) -> Self {
        self.references.insert(key.into(), value.into());
        self
    }

    /// Returns true for the `@context` sentinel.
    pub fn is_context(&self) -> bool {
        self.id == CONTEXT_ID
    }

    /// Returns true for the `@continuation` sentinel.
    pub fn is_continuation(&self) -> bool {
        self.id == CONTINUATION_ID
    }

    /// Returns true for ordinary data entities.
    pub fn is_content(&self) -> bool {
        !self.is_context() && !self.is_continuation()
    }

    /// The namespace table of a context entity, prefix to expansion.
    ///
    /// Non-string expansions are skipped.
    pub fn namespaces(&self) -> Option<BTreeMap<String, String>> {
        let table = self.properties.get(NAMESPACES_KEY)?.as_object()?;
        Some(
            table
                .iter()
                .filter_map(|(prefix, exp)| Some((prefix.clone(), exp.as_str()?.to_string())))
                .collect(),
        )
    }

    /// The resumption token of a continuation entity.
    pub fn continuation_token(&self) -> Option<&str> {
        if !self.is_continuation() {
            return None;
        }
        self.properties.get(TOKEN_KEY)?.as_str()
    }
}

impl Serialize for Entity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.is_context() {
            // The context travels as its raw field map.
            let mut map = serializer.serialize_map(None)?;
            if !self.properties.contains_key("id") {
                map.serialize_entry("id", CONTEXT_ID)?;
            }
            for (k, v) in &self.properties {
                map.serialize_entry(k, v)?;
            }
            return map.end();
        }

        if self.is_continuation() {
            let mut map = serializer.serialize_map(Some(2))?;
            map.serialize_entry("id", CONTINUATION_ID)?;
            map.serialize_entry(TOKEN_KEY, &self.continuation_token().unwrap_or_default())?;
            return map.end();
        }

        let mut s = serializer.serialize_struct("Entity", 5)?;
        s.serialize_field("id", &self.id)?;
        s.serialize_field("recorded", &self.recorded)?;
        s.serialize_field("deleted", &self.deleted)?;
        s.serialize_field("props", &self.properties)?;
        s.serialize_field("refs", &self.references)?;
        s.end()
    }
}
