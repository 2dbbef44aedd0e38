//! The privilege registry.

use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use tracing::debug;
use warren_error::{Result, WarrenError};
use warren_types::{Name, NS_JCR_URI};

/// One privilege definition: a name, the abstract flag and the names it
/// aggregates (empty for a non-aggregate leaf).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivilegeDefinition {
    name: Name,
    is_abstract: bool,
    declared_aggregate_names: Vec<Name>,
}

impl PrivilegeDefinition {
    pub fn new(name: Name, is_abstract: bool, declared_aggregate_names: Vec<Name>) -> Self {
        Self {
            name,
            is_abstract,
            declared_aggregate_names,
        }
    }

    #[inline]
    pub fn name(&self) -> &Name {
        &self.name
    }

    #[inline]
    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    #[inline]
    pub fn declared_aggregate_names(&self) -> &[Name] {
        &self.declared_aggregate_names
    }

    #[inline]
    pub fn is_aggregate(&self) -> bool {
        !self.declared_aggregate_names.is_empty()
    }
}

macro_rules! builtin_name {
    ($fn_name:ident, $local:expr) => {
        pub fn $fn_name() -> &'static Name {
            static NAME: OnceLock<Name> = OnceLock::new();
            NAME.get_or_init(|| Name::new(NS_JCR_URI, $local))
        }
    };
}

/// The reserved built-in privilege names.
pub mod builtin {
    use super::{Name, OnceLock, NS_JCR_URI};

    builtin_name!(jcr_read, "read");
    builtin_name!(jcr_modify_properties, "modifyProperties");
    builtin_name!(jcr_add_child_nodes, "addChildNodes");
    builtin_name!(jcr_remove_node, "removeNode");
    builtin_name!(jcr_remove_child_nodes, "removeChildNodes");
    builtin_name!(jcr_write, "write");
    builtin_name!(jcr_read_access_control, "readAccessControl");
    builtin_name!(jcr_modify_access_control, "modifyAccessControl");
    builtin_name!(jcr_lock_management, "lockManagement");
    builtin_name!(jcr_version_management, "versionManagement");
    builtin_name!(jcr_node_type_management, "nodeTypeManagement");
    builtin_name!(jcr_retention_management, "retentionManagement");
    builtin_name!(jcr_lifecycle_management, "lifecycleManagement");
    builtin_name!(jcr_all, "all");
}

fn built_in_definitions() -> Vec<PrivilegeDefinition> {
    use builtin::*;
    let leaf = |name: &Name| PrivilegeDefinition::new(name.clone(), false, Vec::new());
    vec![
        leaf(jcr_read()),
        leaf(jcr_modify_properties()),
        leaf(jcr_add_child_nodes()),
        leaf(jcr_remove_node()),
        leaf(jcr_remove_child_nodes()),
        PrivilegeDefinition::new(
            jcr_write().clone(),
            false,
            vec![
                jcr_modify_properties().clone(),
                jcr_add_child_nodes().clone(),
                jcr_remove_node().clone(),
                jcr_remove_child_nodes().clone(),
            ],
        ),
        leaf(jcr_read_access_control()),
        leaf(jcr_modify_access_control()),
        leaf(jcr_lock_management()),
        leaf(jcr_version_management()),
        leaf(jcr_node_type_management()),
        leaf(jcr_retention_management()),
        leaf(jcr_lifecycle_management()),
        // jcr:all additionally absorbs every registered custom privilege;
        // `get` synthesizes the full definition
        PrivilegeDefinition::new(
            jcr_all().clone(),
            false,
            vec![
                jcr_read().clone(),
                jcr_write().clone(),
                jcr_read_access_control().clone(),
                jcr_modify_access_control().clone(),
                jcr_lock_management().clone(),
                jcr_version_management().clone(),
                jcr_node_type_management().clone(),
                jcr_retention_management().clone(),
                jcr_lifecycle_management().clone(),
            ],
        ),
    ]
}

/// Registry of built-in and custom privilege definitions.
///
/// Every accepted definition set has passed full validation; a failed
/// registration leaves the registry exactly as it was.
#[derive(Debug)]
pub struct PrivilegeRegistry {
    builtins: HashMap<Name, PrivilegeDefinition>,
    customs: HashMap<Name, PrivilegeDefinition>,
    /// Registration order, used when synthesizing `jcr:all`.
    custom_order: Vec<Name>,
}

impl PrivilegeRegistry {
    /// Create a registry holding the built-ins plus `custom_definitions`,
    /// validating the whole set.
    pub fn new(custom_definitions: Vec<PrivilegeDefinition>) -> Result<Self> {
        let builtins: HashMap<Name, PrivilegeDefinition> = built_in_definitions()
            .into_iter()
            .map(|def| (def.name().clone(), def))
            .collect();

        let mut customs = HashMap::new();
        let mut custom_order = Vec::new();
        for def in custom_definitions {
            if customs
                .insert(def.name().clone(), def.clone())
                .is_some()
            {
                return Err(WarrenError::DuplicateName {
                    name: def.name().clone(),
                });
            }
            custom_order.push(def.name().clone());
        }

        validate(&builtins, &customs)?;
        Ok(Self {
            builtins,
            customs,
            custom_order,
        })
    }

    /// Register one additional custom definition.
    ///
    /// Validation runs against a scratch copy; on failure the registry is
    /// untouched.
    pub fn register_definition(
        &mut self,
        name: Name,
        is_abstract: bool,
        declared_aggregate_names: Vec<Name>,
    ) -> Result<()> {
        let definition =
            PrivilegeDefinition::new(name.clone(), is_abstract, declared_aggregate_names);

        let mut staged = self.customs.clone();
        if staged.insert(name.clone(), definition).is_some() {
            return Err(WarrenError::DuplicateName { name });
        }
        validate(&self.builtins, &staged)?;

        debug!(privilege = %name, "registered custom privilege");
        self.customs = staged;
        self.custom_order.push(name);
        Ok(())
    }

    /// Look up a definition. `jcr:all` is synthesized to include every
    /// registered custom privilege.
    pub fn get(&self, name: &Name) -> Option<PrivilegeDefinition> {
        if name == builtin::jcr_all() {
            let base = self.builtins.get(name)?;
            let mut aggregates = base.declared_aggregate_names().to_vec();
            aggregates.extend(self.custom_order.iter().cloned());
            return Some(PrivilegeDefinition::new(
                base.name().clone(),
                base.is_abstract(),
                aggregates,
            ));
        }
        self.builtins
            .get(name)
            .or_else(|| self.customs.get(name))
            .cloned()
    }

    /// Whether `name` is a registered custom privilege.
    pub fn is_custom(&self, name: &Name) -> bool {
        self.customs.contains_key(name)
    }

    /// All definitions, built-ins first, customs in registration order.
    pub fn definitions(&self) -> Vec<PrivilegeDefinition> {
        let mut all: Vec<PrivilegeDefinition> = built_in_definitions()
            .iter()
            .filter_map(|def| self.get(def.name()))
            .collect();
        all.extend(
            self.custom_order
                .iter()
                .filter_map(|name| self.customs.get(name).cloned()),
        );
        all
    }

    /// The non-aggregate privileges `name` expands to; a non-aggregate
    /// expands to itself.
    pub fn effective_leaves(&self, name: &Name) -> Option<BTreeSet<Name>> {
        let definition = self.get(name)?;
        if !definition.is_aggregate() {
            return Some(BTreeSet::from([definition.name().clone()]));
        }
        let mut leaves = BTreeSet::new();
        let mut stack: Vec<Name> = definition.declared_aggregate_names().to_vec();
        while let Some(next) = stack.pop() {
            let def = self.get(&next)?;
            if def.is_aggregate() {
                stack.extend(def.declared_aggregate_names().iter().cloned());
            } else {
                leaves.insert(next);
            }
        }
        Some(leaves)
    }
}

// --------------------------------------------------------------- validation

fn validate(
    builtins: &HashMap<Name, PrivilegeDefinition>,
    customs: &HashMap<Name, PrivilegeDefinition>,
) -> Result<()> {
    // reserved names and resolvable aggregates
    for (name, definition) in customs {
        if builtins.contains_key(name) {
            return Err(WarrenError::DuplicateName { name: name.clone() });
        }
        for aggregate in definition.declared_aggregate_names() {
            if !builtins.contains_key(aggregate) && !customs.contains_key(aggregate) {
                return Err(WarrenError::InvalidName {
                    detail: format!(
                        "definition of '{name}' aggregates unknown privilege '{aggregate}'"
                    ),
                });
            }
        }
    }

    check_acyclic(customs)?;

    // custom aggregates must not absorb built-ins, directly or transitively;
    // the graph is already known to be acyclic here
    for (name, definition) in customs {
        if definition.is_aggregate() && reaches_builtin(definition, builtins, customs) {
            return Err(WarrenError::AggregationNotSupported { name: name.clone() });
        }
    }

    check_equivalence(builtins, customs)?;
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    White,
    Gray,
    Black,
}

/// Three-color depth-first search over the custom aggregate graph; a
/// gray-to-gray edge is a cycle.
fn check_acyclic(customs: &HashMap<Name, PrivilegeDefinition>) -> Result<()> {
    let mut marks: HashMap<&Name, Mark> = customs.keys().map(|name| (name, Mark::White)).collect();
    let mut trail: Vec<Name> = Vec::new();

    fn visit<'a>(
        name: &'a Name,
        customs: &'a HashMap<Name, PrivilegeDefinition>,
        marks: &mut HashMap<&'a Name, Mark>,
        trail: &mut Vec<Name>,
    ) -> Result<()> {
        marks.insert(name, Mark::Gray);
        trail.push(name.clone());
        let definition = &customs[name];
        for aggregate in definition.declared_aggregate_names() {
            let Some((aggregate, _)) = customs.get_key_value(aggregate) else {
                continue; // built-in: terminal for cycle purposes
            };
            match marks[aggregate] {
                Mark::Gray => {
                    let mut cycle: Vec<String> =
                        trail.iter().map(ToString::to_string).collect();
                    cycle.push(aggregate.to_string());
                    return Err(WarrenError::CyclicDefinitions {
                        trail: cycle.join(" -> "),
                    });
                }
                Mark::White => visit(aggregate, customs, marks, trail)?,
                Mark::Black => {}
            }
        }
        trail.pop();
        marks.insert(name, Mark::Black);
        Ok(())
    }

    let roots: Vec<&Name> = customs.keys().collect();
    for root in roots {
        if marks[root] == Mark::White {
            visit(root, customs, &mut marks, &mut trail)?;
        }
    }
    Ok(())
}

fn reaches_builtin(
    definition: &PrivilegeDefinition,
    builtins: &HashMap<Name, PrivilegeDefinition>,
    customs: &HashMap<Name, PrivilegeDefinition>,
) -> bool {
    let mut stack: Vec<&Name> = definition.declared_aggregate_names().iter().collect();
    let mut seen: BTreeSet<&Name> = BTreeSet::new();
    while let Some(next) = stack.pop() {
        if builtins.contains_key(next) {
            return true;
        }
        if !seen.insert(next) {
            continue;
        }
        if let Some(def) = customs.get(next) {
            stack.extend(def.declared_aggregate_names().iter());
        }
    }
    false
}

/// The non-aggregate leaves of every aggregate definition, memoized by name.
fn leaf_set<'a>(
    name: &'a Name,
    customs: &'a HashMap<Name, PrivilegeDefinition>,
    memo: &mut HashMap<&'a Name, BTreeSet<Name>>,
) -> BTreeSet<Name> {
    if let Some(cached) = memo.get(name) {
        return cached.clone();
    }
    let mut leaves = BTreeSet::new();
    if let Some(definition) = customs.get(name) {
        for aggregate in definition.declared_aggregate_names() {
            match customs.get_key_value(aggregate) {
                Some((aggregate, def)) if def.is_aggregate() => {
                    leaves.extend(leaf_set(aggregate, customs, memo));
                }
                _ => {
                    leaves.insert(aggregate.clone());
                }
            }
        }
    }
    memo.insert(name, leaves.clone());
    leaves
}

/// No two privileges may expand to the same non-empty leaf set. Built-in
/// aggregates participate so a custom aggregate can never shadow one.
fn check_equivalence(
    builtins: &HashMap<Name, PrivilegeDefinition>,
    customs: &HashMap<Name, PrivilegeDefinition>,
) -> Result<()> {
    let mut by_leaves: HashMap<BTreeSet<Name>, Name> = HashMap::new();

    for (name, definition) in builtins {
        if definition.is_aggregate() {
            let leaves: BTreeSet<Name> =
                builtin_leaves(definition, builtins).into_iter().collect();
            by_leaves.insert(leaves, name.clone());
        }
    }

    let mut memo = HashMap::new();
    // deterministic error attribution regardless of map order
    let mut names: Vec<&Name> = customs
        .iter()
        .filter(|(_, def)| def.is_aggregate())
        .map(|(name, _)| name)
        .collect();
    names.sort();
    for name in names {
        let leaves = leaf_set(name, customs, &mut memo);
        if leaves.is_empty() {
            continue;
        }
        if let Some(other) = by_leaves.insert(leaves, name.clone()) {
            return Err(WarrenError::EquivalentDefinitions {
                name: name.clone(),
                other,
            });
        }
    }
    Ok(())
}

fn builtin_leaves(
    definition: &PrivilegeDefinition,
    builtins: &HashMap<Name, PrivilegeDefinition>,
) -> Vec<Name> {
    let mut leaves = Vec::new();
    let mut stack: Vec<&Name> = definition.declared_aggregate_names().iter().collect();
    while let Some(next) = stack.pop() {
        match builtins.get(next) {
            Some(def) if def.is_aggregate() => {
                stack.extend(def.declared_aggregate_names().iter());
            }
            _ => leaves.push(next.clone()),
        }
    }
    leaves
}
