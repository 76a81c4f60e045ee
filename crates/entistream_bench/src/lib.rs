//! Benchmark utilities.
//!
//! Generates deterministic wire-format streams of a given shape.

use serde_json::{json, Value as Json};

/// Namespace used for generated ids.
pub const PEOPLE: &str = "http://data.example.io/people/";

/// One entity with `props` string properties and a reference list.
pub fn entity(i: usize, props: usize) -> Json {
    let properties: serde_json::Map<String, Json> = (0..props)
        .map(|p| (format!("people:field{p}"), json!(format!("value {i}-{p}"))))
        .collect();
    json!({
        "id": format!("people:person-{i}"),
        "recorded": 1_700_000_000_000u64 + i as u64,
        "props": properties,
        "refs": {
            "people:knows": [format!("people:person-{}", i + 1), format!("http://other.example.io/x/{i}")]
        }
    })
}

/// A stream with `count` entities and a continuation.
pub fn stream(count: usize, props: usize) -> Vec<u8> {
    let mut elements = Vec::with_capacity(count + 2);
    elements.push(json!({ "id": "@context", "namespaces": { "people": PEOPLE } }));
    elements.extend((0..count).map(|i| entity(i, props)));
    elements.push(json!({ "id": "@continuation", "token": "bench" }));
    Json::Array(elements).to_string().into_bytes()
}

/// A stream of full-URI ids, all needing compression.
pub fn uncompressed_stream(count: usize) -> Vec<u8> {
    let mut elements = Vec::with_capacity(count + 1);
    elements.push(json!({ "id": "@context", "namespaces": {} }));
    elements.extend((0..count).map(|i| {
        json!({
            "id": format!("http://data.example.io/ns{}/person-{i}", i % 16),
            "props": { "http://schema.example.io/name": format!("Person {i}") }
        })
    }));
    Json::Array(elements).to_string().into_bytes()
}
