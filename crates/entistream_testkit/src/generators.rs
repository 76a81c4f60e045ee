//! Property-based test generators using proptest.
//!
//! Provides strategies for generating URIs and whole wire-format streams.

use proptest::prelude::*;
use serde_json::{json, Value as Json};

/// Strategy for `http(s)://host/path/local` and `http(s)://host/path#local` URIs.
pub fn uri_strategy() -> impl Strategy<Value = String> {
    (
        prop_oneof![Just("http"), Just("https")],
        prop::string::string_regex("[a-z]{1,8}(\\.[a-z]{2,4})?").expect("Invalid regex"),
        prop::collection::vec(
            prop::string::string_regex("[a-z0-9-]{1,6}").expect("Invalid regex"),
            0..4,
        ),
        prop_oneof![Just('/'), Just('#')],
        prop::string::string_regex("[A-Za-z0-9_-]{1,10}").expect("Invalid regex"),
    )
        .prop_map(|(scheme, host, segments, sep, local)| {
            let mut uri = format!("{scheme}://{host}");
            for segment in segments {
                uri.push('/');
                uri.push_str(&segment);
            }
            uri.push(sep);
            uri.push_str(&local);
            uri
        })
}

/// Strategy for JSON property values, nulls and nested lists included.
pub fn property_value_strategy() -> impl Strategy<Value = Json> {
    let leaf = prop_oneof![
        Just(Json::Null),
        any::<bool>().prop_map(Json::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[ -~]{0,12}".prop_map(Json::String),
    ];
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop::collection::vec(inner, 0..4).prop_map(Json::Array)
    })
}

/// Strategy for one entity object with full-URI ids and keys.
pub fn entity_json_strategy() -> impl Strategy<Value = Json> {
    (
        uri_strategy(),
        any::<u32>(),
        any::<bool>(),
        prop::collection::btree_map(uri_strategy(), property_value_strategy(), 0..4),
        prop::collection::btree_map(uri_strategy(), uri_strategy(), 0..3),
    )
        .prop_map(|(id, recorded, deleted, props, refs)| {
            json!({
                "id": id,
                "recorded": recorded,
                "deleted": deleted,
                "props": props,
                "refs": refs,
            })
        })
}

/// Strategy for a complete stream and its number of content entities.
pub fn stream_strategy() -> impl Strategy<Value = (String, usize)> {
    (
        prop::collection::vec(entity_json_strategy(), 0..12),
        prop::option::of("[a-z0-9]{1,8}"),
    )
        .prop_map(|(entities, token)| {
            let count = entities.len();
            let mut elements = vec![json!({ "id": "@context", "namespaces": {} })];
            elements.extend(entities);
            if let Some(token) = token {
                elements.push(json!({ "id": "@continuation", "token": token }));
            }
            (Json::Array(elements).to_string(), count)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use entistream_codec::parse_entities;

    proptest! {
        #[test]
        fn generated_streams_decode((stream, count) in stream_strategy()) {
            let entities = parse_entities(stream.as_bytes()).unwrap();
            prop_assert!(entities[0].is_context());
            prop_assert_eq!(entities.iter().filter(|e| e.is_content()).count(), count);
            if let Some(last) = entities.last() {
                if last.is_continuation() {
                    prop_assert_eq!(last.properties.len(), 1);
                }
            }
            for entity in entities.iter().filter(|e| e.is_content()) {
                prop_assert!(entity.properties.values().all(|v| !v.is_null()));
            }
        }
    }
}
