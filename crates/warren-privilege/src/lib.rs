//! Privilege definitions and their validation.
//!
//! A privilege is either a non-aggregate leaf or the union of other
//! privileges. The registry validates every definition set it accepts:
//! names must be fresh, aggregates must resolve, the aggregate graph must be
//! acyclic, no two aggregates may expand to the same leaves, and custom
//! aggregates may not absorb built-ins.

pub mod registry;

pub use registry::{PrivilegeDefinition, PrivilegeRegistry};
