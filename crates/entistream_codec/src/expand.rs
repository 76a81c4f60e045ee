//! Rewriting compressed identifiers back to full URIs.

use crate::entity::Entity;
use crate::namespace::expand_with;
use crate::value::Value;
use std::collections::BTreeMap;

/// Expands `prefix:local` identifiers using a context's namespace table.
///
/// Ids, property keys, reference keys, reference targets, and string
/// property values (inside lists and nested entities too) are all
/// rewritten. Identifiers with an unknown prefix are left as they are.
#[derive(Debug, Clone, Default)]
pub struct Expander {
    namespaces: BTreeMap<String, String>,
}

impl Expander {
    /// Creates an expander over a prefix to expansion table.
    pub fn new(namespaces: BTreeMap<String, String>) -> Self {
        Self { namespaces }
    }

    /// Creates an expander from a context entity.
    pub fn from_context(context: &Entity) -> Option<Self> {
        context.namespaces().map(Self::new)
    }

    /// The namespace table in use.
    pub fn namespaces(&self) -> &BTreeMap<String, String> {
        &self.namespaces
    }

    /// Expands a single identifier.
    pub fn expand_str(&self, id: &str) -> String {
        expand_with(id, |prefix| self.namespaces.get(prefix).map(String::as_str))
    }

    /// Expands a content entity in place. Sentinels are left unchanged.
    pub fn expand_entity(&self, entity: &mut Entity) {
        if !entity.is_content() {
            return;
        }
        entity.id = self.expand_str(&entity.id);

        let properties = std::mem::take(&mut entity.properties);
        entity.properties = properties
            .into_iter()
            .map(|(key, mut value)| {
                self.expand_value(&mut value);
                (self.expand_str(&key), value)
            })
            .collect();

        let references = std::mem::take(&mut entity.references);
        entity.references = references
            .into_iter()
            .map(|(key, mut value)| {
                value.map_ids(|id| self.expand_str(id));
                (self.expand_str(&key), value)
            })
            .collect();
    }

    fn expand_value(&self, value: &mut Value) {
        match value {
            Value::String(s) => *s = self.expand_str(s),
            Value::List(items) => items.iter_mut().for_each(|v| self.expand_value(v)),
            Value::Entity(e) => self.expand_entity(e),
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::Object(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::RefValue;

    fn expander() -> Expander {
        Expander::from_context(&Entity::context([
            ("ns1", "http://hello/"),
            ("ns2", "http://goodbye/"),
        ]))
        .unwrap()
    }

    #[test]
    fn expands_ids_keys_and_values() {
        let mut e = Entity::new("ns1:bob")
            .with_property("ns1:name", "Bob")
            .with_property("ns1:workplace", "ns2:office")
            .with_reference("ns2:friends", vec!["ns1:frank", "ns1:fred"])
            .with_reference("ns2:boss", "ns2:john");
        expander().expand_entity(&mut e);

        assert_eq!(e.id, "http://hello/bob");
        assert_eq!(e.properties["http://hello/name"].as_str(), Some("Bob"));
        assert_eq!(
            e.properties["http://hello/workplace"].as_str(),
            Some("http://goodbye/office")
        );
        assert_eq!(
            e.references["http://goodbye/friends"],
            RefValue::from(vec!["http://hello/frank", "http://hello/fred"])
        );
        assert_eq!(
            e.references["http://goodbye/boss"],
            RefValue::from("http://goodbye/john")
        );
    }

    #[test]
    fn expands_nested_entities_and_lists() {
        let inner = Entity::new("ns1:home").with_reference("ns2:owner", "ns1:bob");
        let mut e = Entity::new("ns1:bob").with_property(
            "ns1:things",
            Value::List(vec![Value::from(inner), Value::from("ns2:x"), Value::from(3u64)]),
        );
        expander().expand_entity(&mut e);

        let things = e.properties["http://hello/things"].as_list().unwrap();
        let home = things[0].as_entity().unwrap();
        assert_eq!(home.id, "http://hello/home");
        assert_eq!(
            home.references["http://goodbye/owner"],
            RefValue::from("http://hello/bob")
        );
        assert_eq!(things[1].as_str(), Some("http://goodbye/x"));
        assert_eq!(things[2].as_u64(), Some(3));
    }

    #[test]
    fn unknown_prefixes_and_sentinels_are_untouched() {
        let x = expander();
        assert_eq!(x.expand_str("other:bob"), "other:bob");
        assert_eq!(x.expand_str("plain text"), "plain text");

        let mut cont = Entity::continuation("ns1:token");
        x.expand_entity(&mut cont);
        assert_eq!(cont.continuation_token(), Some("ns1:token"));
    }
}
