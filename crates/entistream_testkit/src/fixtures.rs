//! Wire-format fixtures.
//!
//! Provides canned streams and a builder for composing new ones.

use serde_json::{json, Map, Value as Json};
use std::path::PathBuf;
use tempfile::TempDir;

/// A context, one entity with a property and two references, and a
/// continuation.
pub const SCENARIO_A: &str = r#"[
    {
        "id" : "@context",
        "namespaces" : {
            "mimiro-people" : "http://data.mimiro.io/people/",
            "_" : "http://data.mimiro.io/core/"
        }
    },
    {
        "id" : "mimiro-people:homer",
        "props" : {
            "Name" : "Homer Simpson"
        },
        "refs" : {
            "friends" : [ "mimiro-people:marge" , "mimiro-people:bert"]
        }
    },
    {
        "id" : "@continuation",
        "token" : "next-20"
    }
]"#;

/// Expansion of the `people` prefix used by the builder defaults.
pub const PEOPLE: &str = "http://data.example.io/people/";

/// Expansion of the default prefix used by the builder defaults.
pub const CORE: &str = "http://data.example.io/core/";

/// Builds wire-format streams.
///
/// # Example
///
/// ```
/// use entistream_testkit::StreamBuilder;
///
/// let stream = StreamBuilder::new()
///     .namespace("people", "http://data.example.io/people/")
///     .entity("people:homer")
///     .continuation("next")
///     .build();
/// assert!(stream.starts_with("[{\"id\":\"@context\""));
/// ```
#[derive(Debug, Clone, Default)]
pub struct StreamBuilder {
    namespaces: Map<String, Json>,
    entities: Vec<Json>,
    continuation: Option<String>,
}

impl StreamBuilder {
    /// Creates a builder with an empty namespace table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder declaring the `people` and default prefixes.
    pub fn people() -> Self {
        Self::new().namespace("people", PEOPLE).namespace("_", CORE)
    }

    /// Declares a namespace prefix in the context.
    pub fn namespace(mut self, prefix: &str, expansion: &str) -> Self {
        self.namespaces
            .insert(prefix.to_string(), Json::String(expansion.to_string()));
        self
    }

    /// Adds an entity with only an id.
    pub fn entity(self, id: &str) -> Self {
        self.entity_json(json!({ "id": id }))
    }

    /// Adds an entity with a string property.
    pub fn entity_with_name(self, id: &str, name: &str) -> Self {
        self.entity_json(json!({ "id": id, "props": { "name": name }, "refs": {} }))
    }

    /// Adds an arbitrary JSON element.
    pub fn entity_json(mut self, entity: Json) -> Self {
        self.entities.push(entity);
        self
    }

    /// Adds `count` entities with ids `people:{prefix}{i}`.
    pub fn people_entities(mut self, prefix: &str, count: usize) -> Self {
        for i in 0..count {
            self = self.entity_with_name(&format!("people:{prefix}{i}"), &format!("Person {i}"));
        }
        self
    }

    /// Closes the stream with a continuation token.
    pub fn continuation(mut self, token: &str) -> Self {
        self.continuation = Some(token.to_string());
        self
    }

    /// Renders the stream.
    pub fn build(&self) -> String {
        let mut elements = Vec::with_capacity(self.entities.len() + 2);
        elements.push(json!({ "id": "@context", "namespaces": self.namespaces }));
        elements.extend(self.entities.iter().cloned());
        if let Some(token) = &self.continuation {
            elements.push(json!({ "id": "@continuation", "token": token }));
        }
        Json::Array(elements).to_string()
    }
}

/// Page `page` of a paginated people dataset.
///
/// Pages are numbered from 0 and carry a `page-{n+1}` continuation unless
/// `last` is set.
pub fn people_page(page: usize, size: usize, last: bool) -> String {
    let mut builder = StreamBuilder::people().people_entities(&format!("p{page}-"), size);
    if !last {
        builder = builder.continuation(&format!("page-{}", page + 1));
    }
    builder.build()
}

/// Writes a stream to a file in a fresh temporary directory.
///
/// The directory is removed when the returned guard is dropped.
pub fn temp_stream_file(contents: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let path = dir.path().join("stream.json");
    std::fs::write(&path, contents).expect("Failed to write stream file");
    (dir, path)
}
