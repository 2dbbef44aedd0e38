//! Qualified names.
//!
//! A [`Name`] is an immutable pair of namespace URI and local name with value
//! equality and a total order. The expanded text form is `{uri}local`; names
//! in the default (empty) namespace print as the bare local name.

use std::fmt;
use std::sync::OnceLock;

/// The default (empty) namespace URI.
pub const NS_DEFAULT_URI: &str = "";

/// Namespace of the built-in `jcr:*` names.
pub const NS_JCR_URI: &str = "http://www.jcp.org/jcr/1.0";

/// Namespace of the built-in node types (`nt:*`).
pub const NS_NT_URI: &str = "http://www.jcp.org/jcr/nt/1.0";

/// Namespace of the built-in mixin types (`mix:*`).
pub const NS_MIX_URI: &str = "http://www.jcp.org/jcr/mix/1.0";

/// A qualified name: namespace URI plus non-empty local name.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct Name {
    namespace_uri: String,
    local_name: String,
}

impl Name {
    /// Create a name from its parts.
    ///
    /// The local name must be non-empty; the wire codec relies on this.
    /// Use [`Name::parse`] for untrusted input.
    pub fn new(namespace_uri: impl Into<String>, local_name: impl Into<String>) -> Self {
        let name = Self {
            namespace_uri: namespace_uri.into(),
            local_name: local_name.into(),
        };
        debug_assert!(!name.local_name.is_empty(), "local name must be non-empty");
        name
    }

    /// Parse the expanded form `{uri}local` (or a bare local name).
    pub fn parse(expanded: &str) -> Result<Self, InvalidNameError> {
        let (uri, local) = if let Some(rest) = expanded.strip_prefix('{') {
            match rest.split_once('}') {
                Some((uri, local)) => (uri, local),
                None => {
                    return Err(InvalidNameError {
                        detail: format!("missing '}}' in expanded name '{expanded}'"),
                    })
                }
            }
        } else {
            (NS_DEFAULT_URI, expanded)
        };
        if local.is_empty() {
            return Err(InvalidNameError {
                detail: format!("empty local name in '{expanded}'"),
            });
        }
        if local.contains(['/', '[', ']', '{', '}']) {
            return Err(InvalidNameError {
                detail: format!("illegal character in local name '{local}'"),
            });
        }
        Ok(Self::new(uri, local))
    }

    #[inline]
    pub fn namespace_uri(&self) -> &str {
        &self.namespace_uri
    }

    #[inline]
    pub fn local_name(&self) -> &str {
        &self.local_name
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace_uri.is_empty() {
            f.write_str(&self.local_name)
        } else {
            write!(f, "{{{}}}{}", self.namespace_uri, self.local_name)
        }
    }
}

/// Error returned when parsing a malformed name string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidNameError {
    detail: String,
}

impl InvalidNameError {
    pub(crate) fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

impl fmt::Display for InvalidNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.detail)
    }
}

impl std::error::Error for InvalidNameError {}

macro_rules! well_known {
    ($(#[$doc:meta])* $fn_name:ident, $uri:expr, $local:expr) => {
        $(#[$doc])*
        pub fn $fn_name() -> &'static Name {
            static NAME: OnceLock<Name> = OnceLock::new();
            NAME.get_or_init(|| Name::new($uri, $local))
        }
    };
}

/// Accessors for names the repository core refers to by identity.
pub mod well_known {
    use super::{Name, OnceLock, NS_JCR_URI, NS_MIX_URI, NS_NT_URI};

    well_known!(
        /// `jcr:primaryType` — synthetic property carrying the primary type.
        jcr_primary_type, NS_JCR_URI, "primaryType");
    well_known!(
        /// `jcr:mixinTypes` — synthetic property carrying the mixin names.
        jcr_mixin_types, NS_JCR_URI, "mixinTypes");
    well_known!(
        /// `jcr:uuid` — synthetic property of referenceable nodes.
        jcr_uuid, NS_JCR_URI, "uuid");
    well_known!(jcr_root, NS_JCR_URI, "root");
    well_known!(jcr_system, NS_JCR_URI, "system");
    well_known!(jcr_content, NS_JCR_URI, "content");
    well_known!(jcr_data, NS_JCR_URI, "data");
    well_known!(jcr_created, NS_JCR_URI, "created");
    well_known!(jcr_created_by, NS_JCR_URI, "createdBy");
    well_known!(jcr_last_modified, NS_JCR_URI, "lastModified");
    well_known!(jcr_last_modified_by, NS_JCR_URI, "lastModifiedBy");
    well_known!(jcr_mimetype, NS_JCR_URI, "mimeType");
    well_known!(jcr_encoding, NS_JCR_URI, "encoding");
    well_known!(nt_base, NS_NT_URI, "base");
    well_known!(nt_unstructured, NS_NT_URI, "unstructured");
    well_known!(nt_hierarchy_node, NS_NT_URI, "hierarchyNode");
    well_known!(nt_file, NS_NT_URI, "file");
    well_known!(nt_folder, NS_NT_URI, "folder");
    well_known!(nt_resource, NS_NT_URI, "resource");
    well_known!(mix_referenceable, NS_MIX_URI, "referenceable");
    well_known!(mix_lockable, NS_MIX_URI, "lockable");
    well_known!(mix_versionable, NS_MIX_URI, "versionable");
    well_known!(mix_shareable, NS_MIX_URI, "shareable");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_equality() {
        let a = Name::new(NS_JCR_URI, "primaryType");
        let b = Name::new(NS_JCR_URI, "primaryType");
        let c = Name::new(NS_JCR_URI, "mixinTypes");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn display_expanded_form() {
        assert_eq!(
            Name::new(NS_JCR_URI, "uuid").to_string(),
            "{http://www.jcp.org/jcr/1.0}uuid"
        );
        assert_eq!(Name::new(NS_DEFAULT_URI, "a1").to_string(), "a1");
    }

    #[test]
    fn parse_expanded_form() {
        let name = Name::parse("{http://example.com/ns}title").unwrap();
        assert_eq!(name.namespace_uri(), "http://example.com/ns");
        assert_eq!(name.local_name(), "title");

        let bare = Name::parse("title").unwrap();
        assert_eq!(bare.namespace_uri(), NS_DEFAULT_URI);
        assert_eq!(bare.local_name(), "title");
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(Name::parse("{unclosed").is_err());
        assert!(Name::parse("{}").is_err());
        assert!(Name::parse("").is_err());
        assert!(Name::parse("a/b").is_err());
        assert!(Name::parse("a[1]").is_err());
    }

    #[test]
    fn well_known_names_are_interned() {
        assert!(std::ptr::eq(
            well_known::jcr_primary_type(),
            well_known::jcr_primary_type()
        ));
        assert_eq!(well_known::jcr_uuid().local_name(), "uuid");
    }

    #[test]
    fn ordering_is_total() {
        let mut names = vec![
            Name::new(NS_NT_URI, "base"),
            Name::new(NS_JCR_URI, "uuid"),
            Name::new(NS_JCR_URI, "created"),
        ];
        names.sort();
        assert_eq!(names[0].local_name(), "created");
        assert_eq!(names[1].local_name(), "uuid");
    }
}
