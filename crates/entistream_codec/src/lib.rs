//! # Entistream Codec
//!
//! Streaming decoder for the entity wire format.
//!
//! A stream is a JSON array opening with a `@context` object that declares
//! namespace prefixes, followed by entity objects and an optional
//! `@continuation` carrying a resumption token:
//!
//! ```json
//! [
//!   {"id": "@context", "namespaces": {"people": "http://data.example.io/people/"}},
//!   {"id": "people:homer", "props": {"people:name": "Homer"}, "refs": {}},
//!   {"id": "@continuation", "token": "next-20"}
//! ]
//! ```
//!
//! Entities are emitted one at a time while the input is read, with every
//! identifier compressed to `prefix:local` form. [`Expander`] turns them
//! back into full URIs.
//!
//! ## Usage
//!
//! ```
//! use entistream_codec::{EntityStreamParser, CodecError};
//!
//! let input = br#"[{"id":"@context","namespaces":{"p":"http://data.example.io/p/"}},
//!                  {"id":"http://data.example.io/p/homer"}]"#;
//!
//! let mut ids = Vec::new();
//! EntityStreamParser::new()
//!     .parse_stream(&input[..], |entity| {
//!         ids.push(entity.id);
//!         Ok::<(), CodecError>(())
//!     })
//!     .unwrap();
//! assert_eq!(ids, vec!["@context", "p:homer"]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod entity;
mod error;
mod expand;
mod namespace;
mod token;
mod value;
mod values;

pub use decoder::{parse_entities, EntityStreamParser};
pub use entity::{Entity, CONTEXT_ID, CONTINUATION_ID, NAMESPACES_KEY, TOKEN_KEY};
pub use error::{CodecError, CodecResult};
pub use expand::Expander;
pub use namespace::{expand_with, split_uri, NamespaceRegistry, DEFAULT_PREFIX};
pub use token::{Token, TokenReader};
pub use value::{RefValue, Value};
