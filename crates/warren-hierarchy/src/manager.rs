//! The id ↔ path cache and its event-driven maintenance.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;
use warren_error::{Result, WarrenError};
use warren_state::{ItemState, ItemStateManager, NodeState, NodeStateListener};
use warren_types::{ItemId, Name, NodeId, Path, PathElement, PropertyId, INDEX_DEFAULT};

/// A concurrent cache from node ids to repository paths and back.
///
/// Cache misses walk the hierarchy through the [`ItemStateManager`] and
/// install every visited node, subscribing to its structural events. Event
/// callbacks patch or evict entries so that anything still cached always
/// agrees with a fresh walk from the root.
///
/// Locking: all map state sits behind one mutex. Reads release it before
/// calling into the state manager and install their results only if no
/// invalidating event arrived in between, so the manager never holds its
/// own lock while acquiring a state's lock.
pub struct CachingHierarchyManager {
    root_id: NodeId,
    provider: Arc<dyn ItemStateManager>,
    weak_self: Weak<CachingHierarchyManager>,
    inner: Mutex<CacheInner>,
}

struct CacheInner {
    /// One path per node; for shareable nodes the first resolved parent
    /// wins and alternate paths are not cached.
    by_id: HashMap<NodeId, Path>,
    /// Exact inverse of `by_id`.
    by_path: HashMap<Path, NodeId>,
    /// States we are subscribed to, kept weakly for unsubscription.
    subscriptions: HashMap<NodeId, Weak<NodeState>>,
    /// Bumped by every event; guards in-flight installs.
    generation: u64,
}

impl CachingHierarchyManager {
    pub fn new(root_id: NodeId, provider: Arc<dyn ItemStateManager>) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            root_id,
            provider,
            weak_self: weak_self.clone(),
            inner: Mutex::new(CacheInner {
                by_id: HashMap::new(),
                by_path: HashMap::new(),
                subscriptions: HashMap::new(),
                generation: 0,
            }),
        })
    }

    #[inline]
    pub fn root_id(&self) -> NodeId {
        self.root_id
    }

    /// Resolve `path` to a node or property id, preferring the node when
    /// both exist at the leaf. Returns `None` for paths that denote nothing.
    pub fn resolve_path(&self, path: &Path) -> Result<Option<ItemId>> {
        self.resolve(path, true, true)
    }

    /// Resolve `path` to a node id.
    pub fn resolve_node_path(&self, path: &Path) -> Result<Option<NodeId>> {
        Ok(self.resolve(path, true, false)?.and_then(|id| id.node_id()))
    }

    /// Resolve `path` to a property id. Property steps never carry a
    /// same-name-sibling index above one.
    pub fn resolve_property_path(&self, path: &Path) -> Result<Option<PropertyId>> {
        Ok(self
            .resolve(path, false, true)?
            .and_then(|id| id.property_id().cloned()))
    }

    /// The absolute path of `id`, from the cache or by walking `parent_id`
    /// links up to the root.
    pub fn get_path(&self, id: NodeId) -> Result<Path> {
        if id == self.root_id {
            return Ok(Path::root());
        }
        if let Some(path) = self.inner.lock().by_id.get(&id) {
            return Ok(path.clone());
        }

        let generation = self.inner.lock().generation;

        // climb to the root collecting (state, step name, sns index)
        let mut chain: Vec<(Arc<NodeState>, Name, u32)> = Vec::new();
        let mut current = self.node_state(id)?;
        while current.node_id() != self.root_id {
            let current_id = current.node_id();
            let Some(parent_id) = current.parent_id() else {
                return Err(WarrenError::ItemState {
                    detail: format!("node {current_id} is not attached to the hierarchy"),
                });
            };
            let parent = self.node_state(parent_id)?;
            let Some((entry, index)) = parent.child_node_entry_by_id(current_id) else {
                return Err(WarrenError::ItemState {
                    detail: format!("no child entry for {current_id} in parent {parent_id}"),
                });
            };
            chain.push((current, entry.name, index));
            current = parent;
        }
        chain.reverse();

        let mut path = Path::root();
        {
            let mut inner = self.inner.lock();
            let install = inner.generation == generation;
            for (state, name, index) in &chain {
                path = path.child_indexed(name.clone(), *index);
                if install {
                    self.install_locked(&mut inner, state, &path);
                }
            }
            if install {
                // the root state has no mapping but its child events matter
                self.subscribe_locked(&mut inner, &current);
            }
        }
        Ok(path)
    }

    /// Whether a path for `id` is currently cached. The root is always
    /// considered cached.
    pub fn is_cached(&self, id: NodeId) -> bool {
        id == self.root_id || self.inner.lock().by_id.contains_key(&id)
    }

    // ----------------------------------------------------------- resolution

    fn resolve(&self, path: &Path, nodes: bool, properties: bool) -> Result<Option<ItemId>> {
        let path = path.normalize()?;
        if !path.is_absolute() {
            return Err(WarrenError::ItemState {
                detail: format!("cannot resolve relative path '{path}'"),
            });
        }
        if path.is_root() {
            return Ok(nodes.then_some(ItemId::Node(self.root_id)));
        }

        let total = path.depth();
        let elements = path.elements();

        // cached fast path; property hits are never cached. The generation
        // is captured under the same lock as the ancestor lookup so an event
        // racing the walk reliably voids the installs below.
        let (mut current_id, mut resolved, generation) = {
            let inner = self.inner.lock();
            if nodes {
                if let Some(id) = inner.by_path.get(&path) {
                    return Ok(Some(ItemId::Node(*id)));
                }
            }
            let (id, depth) = deepest_cached_ancestor(&inner, self.root_id, elements, total);
            (id, depth, inner.generation)
        };

        while resolved < total {
            let element = &elements[resolved + 1];
            let Some(name) = element.name() else {
                return Err(WarrenError::ItemState {
                    detail: format!("unexpected marker element in normalized path '{path}'"),
                });
            };
            let index = element.normalized_index();

            let state = match self.node_state(current_id) {
                Ok(state) => state,
                // a vanished intermediate state means the path denotes nothing
                Err(WarrenError::NoSuchItemState { .. }) => return Ok(None),
                Err(err) => return Err(err),
            };
            {
                let prefix = Path::from_elements(elements[..resolved + 1].to_vec());
                let mut inner = self.inner.lock();
                if inner.generation == generation {
                    self.install_locked(&mut inner, &state, &prefix);
                }
            }

            let is_last = resolved + 1 == total;
            if is_last {
                if nodes {
                    if let Some(entry) = state.child_node_entry(name, index) {
                        // fetch the leaf so it can be cached and subscribed;
                        // the entry alone already proves existence
                        if let Ok(leaf) = self.node_state(entry.id) {
                            let mut inner = self.inner.lock();
                            if inner.generation == generation {
                                self.install_locked(&mut inner, &leaf, &path);
                            }
                        }
                        return Ok(Some(ItemId::Node(entry.id)));
                    }
                }
                if properties
                    && index == INDEX_DEFAULT
                    && state.has_property_name(name)
                {
                    return Ok(Some(ItemId::Property(PropertyId::new(
                        current_id,
                        name.clone(),
                    ))));
                }
                return Ok(None);
            }

            match state.child_node_entry(name, index) {
                Some(entry) => {
                    current_id = entry.id;
                    resolved += 1;
                }
                None => return Ok(None),
            }
        }
        // unreachable: the loop always returns at the last element
        Ok(None)
    }

    fn node_state(&self, id: NodeId) -> Result<Arc<NodeState>> {
        match self.provider.get_item_state(&ItemId::Node(id))? {
            ItemState::Node(state) => Ok(state),
            ItemState::Property(state) => Err(WarrenError::ItemState {
                detail: format!(
                    "expected node state for {id}, found property {}",
                    state.property_id()
                ),
            }),
        }
    }

    // ----------------------------------------------------- cache maintenance

    /// Subscribe to `state` and record the mapping for `path`. For a
    /// shareable node that is already cached under another parent, the
    /// first path wins and the alternate path is not cached.
    fn install_locked(&self, inner: &mut CacheInner, state: &Arc<NodeState>, path: &Path) {
        self.subscribe_locked(inner, state);
        if path.is_root() {
            return;
        }
        let id = state.node_id();
        if inner.by_id.contains_key(&id) {
            return;
        }
        // a different id still holding this path is stale; drop it so the
        // maps stay exact inverses
        if inner.by_path.contains_key(path) {
            evict_path(inner, path);
        }
        inner.by_id.insert(id, path.clone());
        inner.by_path.insert(path.clone(), id);
    }

    fn subscribe_locked(&self, inner: &mut CacheInner, state: &Arc<NodeState>) {
        state.set_listener(self.weak_self.clone() as Weak<dyn NodeStateListener>);
        inner
            .subscriptions
            .insert(state.node_id(), Arc::downgrade(state));
    }

    /// The cached path of an event source; the root has an implicit one.
    fn cached_path_of(&self, inner: &CacheInner, state: &NodeState) -> Option<Path> {
        if state.node_id() == self.root_id {
            Some(Path::root())
        } else {
            inner.by_id.get(&state.node_id()).cloned()
        }
    }
}

/// Longest cached proper prefix of the path, as (node id, resolved depth).
fn deepest_cached_ancestor(
    inner: &CacheInner,
    root_id: NodeId,
    elements: &[PathElement],
    total: usize,
) -> (NodeId, usize) {
    for depth in (1..total).rev() {
        let prefix = Path::from_elements(elements[..=depth].to_vec());
        if let Some(id) = inner.by_path.get(&prefix) {
            return (*id, depth);
        }
    }
    (root_id, 0)
}

/// Remove the mapping for `path`; the maps stay exact inverses.
fn evict_path(inner: &mut CacheInner, path: &Path) {
    if let Some(id) = inner.by_path.remove(path) {
        inner.by_id.remove(&id);
        unsubscribe(inner, id);
    }
}

/// Remove every mapping at or below `prefix`.
fn evict_subtree(inner: &mut CacheInner, prefix: &Path) {
    let paths: Vec<Path> = inner
        .by_path
        .keys()
        .filter(|path| path.starts_with(prefix))
        .cloned()
        .collect();
    for path in &paths {
        evict_path(inner, path);
    }
}

/// Remove every mapping whose step below `parent_path` carries `name` with
/// a same-name-sibling index of at least `from_index`.
fn evict_same_name_siblings(
    inner: &mut CacheInner,
    parent_path: &Path,
    name: &Name,
    from_index: u32,
) {
    let step = parent_path.depth() + 1;
    let paths: Vec<Path> = inner
        .by_path
        .keys()
        .filter(|path| {
            path.depth() >= step && path.starts_with(parent_path) && {
                let element = &path.elements()[step];
                element.name() == Some(name) && element.normalized_index() >= from_index
            }
        })
        .cloned()
        .collect();
    for path in &paths {
        evict_path(inner, path);
    }
}

fn unsubscribe(inner: &mut CacheInner, id: NodeId) {
    if let Some(weak) = inner.subscriptions.remove(&id) {
        if let Some(state) = weak.upgrade() {
            state.clear_listener();
        }
    }
}

/// Structural events from subscribed states. Each handler serializes behind
/// the manager lock, bumps the generation so racing reads drop their
/// installs, and evicts exactly the entries the mutation may have stalled.
impl NodeStateListener for CachingHierarchyManager {
    fn node_added(&self, state: &NodeState, name: &Name, index: u32, id: NodeId) {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        let Some(parent_path) = self.cached_path_of(&inner, state) else {
            return;
        };
        // the new child is not prefetched; same-name siblings at or above
        // its index shifted up and are now stale
        debug!(parent = %parent_path, name = %name, index, child = %id, "child added, invalidating shifted siblings");
        evict_same_name_siblings(&mut inner, &parent_path, name, index);
    }

    fn node_modified(&self, _state: &NodeState) {
        // opaque change (parent link, shares, properties): no mapping is
        // derived from those, but racing installs must still be dropped
        self.inner.lock().generation += 1;
    }

    fn nodes_replaced(&self, state: &NodeState) {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        let Some(path) = self.cached_path_of(&inner, state) else {
            return;
        };
        // a wholesale reorder may shift any descendant's sns index
        debug!(parent = %path, "child list replaced, evicting descendants");
        let descendants: Vec<Path> = inner
            .by_path
            .keys()
            .filter(|p| p.depth() > path.depth() && p.starts_with(&path))
            .cloned()
            .collect();
        for descendant in &descendants {
            evict_path(&mut inner, descendant);
        }
    }

    fn node_removed(&self, state: &NodeState, name: &Name, index: u32, id: NodeId) {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        let Some(parent_path) = self.cached_path_of(&inner, state) else {
            return;
        };
        // the removed child's subtree is gone and higher same-name sibling
        // indexes shifted down; a share cached under another parent survives
        debug!(parent = %parent_path, name = %name, index, child = %id, "child removed, evicting subtree and shifted siblings");
        evict_same_name_siblings(&mut inner, &parent_path, name, index);
    }

    fn state_discarded(&self, state: &NodeState) {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        let id = state.node_id();
        if let Some(path) = inner.by_id.get(&id).cloned() {
            evict_subtree(&mut inner, &path);
        }
        unsubscribe(&mut inner, id);
    }
}
