//! Namespace prefix mappings.
//!
//! The wire codec interns full URIs and never needs a registry; prefixes
//! exist for the human-facing name form `prefix:local`. The registry is
//! read-only while a codec runs.

use std::collections::HashMap;

use crate::name::{InvalidNameError, Name, NS_JCR_URI, NS_MIX_URI, NS_NT_URI};

/// Bidirectional prefix ↔ namespace URI mapping.
pub trait NamespaceRegistry: Send + Sync {
    /// The URI registered for `prefix`.
    fn uri_for_prefix(&self, prefix: &str) -> Option<&str>;

    /// The prefix registered for `uri`.
    fn prefix_for_uri(&self, uri: &str) -> Option<&str>;
}

/// A fixed in-memory registry seeded with the built-in mappings.
#[derive(Debug, Clone)]
pub struct StaticNamespaceRegistry {
    by_prefix: HashMap<String, String>,
    by_uri: HashMap<String, String>,
}

impl StaticNamespaceRegistry {
    /// A registry holding the built-in `jcr`, `nt` and `mix` mappings plus
    /// the empty prefix for the default namespace.
    pub fn new() -> Self {
        let mut registry = Self {
            by_prefix: HashMap::new(),
            by_uri: HashMap::new(),
        };
        registry.register("", "");
        registry.register("jcr", NS_JCR_URI);
        registry.register("nt", NS_NT_URI);
        registry.register("mix", NS_MIX_URI);
        registry
    }

    /// Add or replace a mapping.
    pub fn register(&mut self, prefix: &str, uri: &str) {
        self.by_prefix.insert(prefix.to_owned(), uri.to_owned());
        self.by_uri.insert(uri.to_owned(), prefix.to_owned());
    }
}

impl Default for StaticNamespaceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceRegistry for StaticNamespaceRegistry {
    fn uri_for_prefix(&self, prefix: &str) -> Option<&str> {
        self.by_prefix.get(prefix).map(String::as_str)
    }

    fn prefix_for_uri(&self, uri: &str) -> Option<&str> {
        self.by_uri.get(uri).map(String::as_str)
    }
}

impl Name {
    /// Render this name as `prefix:local`, or bare `local` in the default
    /// namespace. `None` when the namespace has no registered prefix.
    pub fn to_prefixed(&self, registry: &dyn NamespaceRegistry) -> Option<String> {
        let prefix = registry.prefix_for_uri(self.namespace_uri())?;
        if prefix.is_empty() {
            Some(self.local_name().to_owned())
        } else {
            Some(format!("{prefix}:{}", self.local_name()))
        }
    }

    /// Parse the `prefix:local` form against a registry.
    pub fn parse_prefixed(
        registry: &dyn NamespaceRegistry,
        text: &str,
    ) -> Result<Self, InvalidNameError> {
        let (prefix, local) = match text.split_once(':') {
            Some((prefix, local)) => (prefix, local),
            None => ("", text),
        };
        let Some(uri) = registry.uri_for_prefix(prefix) else {
            return Err(InvalidNameError::new(format!(
                "unknown namespace prefix '{prefix}' in '{text}'"
            )));
        };
        if local.is_empty() {
            return Err(InvalidNameError::new(format!(
                "empty local name in '{text}'"
            )));
        }
        Ok(Name::new(uri, local))
    }
}
