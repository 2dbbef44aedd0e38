//! Static dictionary of well-known names.
//!
//! Names that appear in nearly every bundle are written as a single byte:
//! their index in this ordered table. Index 0 is reserved for the `null`
//! sentinel that terminates name lists in the wire format. The table is part
//! of the format: entries may only be appended, and only together with a
//! bundle version bump.

use std::collections::HashMap;
use std::sync::OnceLock;

use warren_types::{Name, NS_JCR_URI, NS_MIX_URI, NS_NT_URI};

/// The single-byte encoding of the `null` name sentinel.
pub const NULL_NAME_INDEX: u8 = 0;

/// Well-known name entries in frozen wire order, starting at index 1.
const ENTRIES: &[(&str, &str)] = &[
    (NS_JCR_URI, "primaryType"),
    (NS_JCR_URI, "mixinTypes"),
    (NS_JCR_URI, "uuid"),
    (NS_JCR_URI, "root"),
    (NS_JCR_URI, "system"),
    (NS_JCR_URI, "content"),
    (NS_JCR_URI, "data"),
    (NS_JCR_URI, "created"),
    (NS_JCR_URI, "createdBy"),
    (NS_JCR_URI, "lastModified"),
    (NS_JCR_URI, "lastModifiedBy"),
    (NS_JCR_URI, "mimeType"),
    (NS_JCR_URI, "encoding"),
    (NS_JCR_URI, "title"),
    (NS_JCR_URI, "description"),
    (NS_JCR_URI, "language"),
    (NS_JCR_URI, "versionStorage"),
    (NS_JCR_URI, "versionHistory"),
    (NS_JCR_URI, "baseVersion"),
    (NS_JCR_URI, "isCheckedOut"),
    (NS_JCR_URI, "predecessors"),
    (NS_JCR_URI, "successors"),
    (NS_JCR_URI, "rootVersion"),
    (NS_JCR_URI, "versionLabels"),
    (NS_JCR_URI, "frozenNode"),
    (NS_JCR_URI, "frozenPrimaryType"),
    (NS_JCR_URI, "frozenMixinTypes"),
    (NS_JCR_URI, "frozenUuid"),
    (NS_JCR_URI, "childVersionHistory"),
    (NS_JCR_URI, "lockOwner"),
    (NS_JCR_URI, "lockIsDeep"),
    (NS_NT_URI, "base"),
    (NS_NT_URI, "unstructured"),
    (NS_NT_URI, "hierarchyNode"),
    (NS_NT_URI, "file"),
    (NS_NT_URI, "folder"),
    (NS_NT_URI, "resource"),
    (NS_NT_URI, "version"),
    (NS_NT_URI, "versionHistory"),
    (NS_NT_URI, "versionLabels"),
    (NS_NT_URI, "versionedChild"),
    (NS_NT_URI, "frozenNode"),
    (NS_MIX_URI, "referenceable"),
    (NS_MIX_URI, "lockable"),
    (NS_MIX_URI, "versionable"),
    (NS_MIX_URI, "shareable"),
    (NS_MIX_URI, "simpleVersionable"),
];

fn table() -> &'static Vec<Name> {
    static TABLE: OnceLock<Vec<Name>> = OnceLock::new();
    TABLE.get_or_init(|| {
        debug_assert!(ENTRIES.len() < 0x80, "table must fit seven-bit indices");
        ENTRIES
            .iter()
            .map(|&(uri, local)| Name::new(uri, local))
            .collect()
    })
}

fn reverse() -> &'static HashMap<Name, u8> {
    static REVERSE: OnceLock<HashMap<Name, u8>> = OnceLock::new();
    REVERSE.get_or_init(|| {
        table()
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), (i + 1) as u8))
            .collect()
    })
}

/// The wire index of a well-known name, or `None` if the name must be
/// written in expanded form. Returned indices are in 1..=127.
pub fn name_to_index(name: &Name) -> Option<u8> {
    reverse().get(name).copied()
}

/// The well-known name for a wire index. `None` for the null sentinel (0)
/// and for indices beyond the table.
pub fn index_to_name(index: u8) -> Option<&'static Name> {
    if index == NULL_NAME_INDEX {
        return None;
    }
    table().get(usize::from(index) - 1)
}
