//! Namespace compression and expansion.
//!
//! Identifiers travel either as full URIs (`http://data.example.io/people/homer`)
//! or in compressed `prefix:local` form (`ns0:homer`). A [`NamespaceRegistry`]
//! assigns prefixes to URI expansions for the lifetime of one decode session.

use crate::error::{CodecError, CodecResult};
use std::collections::{BTreeMap, HashMap};

/// Prefix key under which a context declares its default expansion.
pub const DEFAULT_PREFIX: &str = "_";

const GENERATED_PREFIX: &str = "ns";

/// Bidirectional prefix table for one decode session.
///
/// Never shared between sessions; generated prefixes are only stable
/// within the registry that produced them.
#[derive(Debug, Clone, Default)]
pub struct NamespaceRegistry {
    /// prefix -> expansion
    prefixes: HashMap<String, String>,
    /// expansion -> prefix
    expansions: HashMap<String, String>,
}

impl NamespaceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry seeded with a prefix table.
    pub fn with_namespaces<I, K, V>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut registry = Self::new();
        registry.seed(namespaces);
        registry
    }

    /// Loads a prefix table, typically the `namespaces` of a context.
    ///
    /// Existing expansions keep their first prefix. The default prefix
    /// is recorded for lookups but is never handed out for compression.
    pub fn seed<I, K, V>(&mut self, namespaces: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (prefix, expansion) in namespaces {
            let prefix = prefix.into();
            let expansion = expansion.into();
            if prefix != DEFAULT_PREFIX {
                self.expansions
                    .entry(expansion.clone())
                    .or_insert_with(|| prefix.clone());
            }
            self.prefixes.insert(prefix, expansion);
        }
    }

    /// Number of known prefixes.
    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    /// Returns true if no prefix is known.
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// Expansion registered for a prefix.
    pub fn expansion(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(String::as_str)
    }

    /// Prefix registered for an expansion.
    pub fn prefix(&self, expansion: &str) -> Option<&str> {
        self.expansions.get(expansion).map(String::as_str)
    }

    /// The prefix table, prefix to expansion, in prefix order.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.prefixes
            .iter()
            .map(|(p, e)| (p.clone(), e.clone()))
            .collect()
    }

    /// Compresses an identifier into `prefix:local` form.
    ///
    /// - `http://` and `https://` URIs are split at the last `#`, else the
    ///   last `/`; the expansion gets a prefix on first sight.
    /// - Bare names without `:` are resolved against the default expansion.
    /// - Anything else containing `:` is returned unchanged.
    ///
    /// # Errors
    ///
    /// Fails on empty input, on URIs that cannot be split into a non-empty
    /// expansion and local part, and on bare names when no default
    /// expansion is declared.
    pub fn compress(&mut self, uri: &str) -> CodecResult<String> {
        if uri.is_empty() {
            return Err(CodecError::namespace("empty identifier"));
        }

        if uri.starts_with("http://") || uri.starts_with("https://") {
            let (expansion, local) = split_uri(uri)
                .ok_or_else(|| CodecError::namespace(format!("unable to split uri '{uri}'")))?;
            let prefix = self.assert_prefix(expansion);
            return Ok(format!("{prefix}:{local}"));
        }

        if !uri.contains(':') {
            let Some(expansion) = self.prefixes.get(DEFAULT_PREFIX).cloned() else {
                return Err(CodecError::namespace(format!(
                    "'{uri}' has no prefix and no default expansion is declared"
                )));
            };
            let prefix = self.assert_prefix(&expansion);
            return Ok(format!("{prefix}:{uri}"));
        }

        Ok(uri.to_string())
    }

    /// Expands a `prefix:local` identifier with this registry's table.
    ///
    /// Unknown prefixes leave the identifier unchanged.
    pub fn expand(&self, id: &str) -> String {
        expand_with(id, |prefix| self.expansion(prefix))
    }

    /// Returns the prefix for an expansion, assigning `ns<N>` if new.
    fn assert_prefix(&mut self, expansion: &str) -> String {
        if let Some(prefix) = self.expansions.get(expansion) {
            return prefix.clone();
        }

        let mut n = self.prefixes.len();
        let mut prefix = format!("{GENERATED_PREFIX}{n}");
        while self.prefixes.contains_key(&prefix) {
            n += 1;
            prefix = format!("{GENERATED_PREFIX}{n}");
        }

        self.prefixes.insert(prefix.clone(), expansion.to_string());
        self.expansions.insert(expansion.to_string(), prefix.clone());
        prefix
    }
}

/// Splits a URI into `(expansion, local)` at the last `#`, else the last `/`.
///
/// The separator stays with the expansion. Returns `None` unless both
/// parts are non-empty.
pub fn split_uri(uri: &str) -> Option<(&str, &str)> {
    let idx = uri.rfind('#').or_else(|| uri.rfind('/'))?;
    let (expansion, local) = uri.split_at(idx + 1);
    if expansion.is_empty() || local.is_empty() {
        return None;
    }
    Some((expansion, local))
}

/// Expands `prefix:local` using a lookup from prefix to expansion.
///
/// The identifier is split at its first `:`. Unresolvable prefixes and
/// identifiers without `:` are returned unchanged.
pub fn expand_with<'a, F>(id: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<&'a str>,
{
    match id.split_once(':') {
        Some((prefix, local)) => match lookup(prefix) {
            Some(expansion) => format!("{expansion}{local}"),
            None => id.to_string(),
        },
        None => id.to_string(),
    }
}
