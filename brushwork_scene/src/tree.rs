// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core tree implementation: structure, attachment hooks, bounds cache, queries.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use glam::{DMat4, DVec3};

use crate::bounds::{BBox3, NodeBounds, Ray3};
use crate::contents::{Layer, NodeContents, WorldData};
use crate::error::SceneError;
use crate::linked_groups::{nested_link_ids, parent_link_ids};
use crate::node::{Node, accepted_children, has_link_id, is_selectable, should_add_to_spatial_index};
use crate::notify::Notification;
use crate::selection::Selection;
use crate::spatial::{IndexBackend, SpatialIndex};
use crate::types::{
    EditState, LinkId, LockState, NodeId, NodeKind, PersistentId, VisibilityState,
};
use crate::visitor::NodeVisitor;

/// Construction options for a [`Tree`].
#[derive(Clone, Debug)]
pub struct TreeConfig {
    /// Name of the default layer created with the world.
    pub default_layer_name: String,
    /// Spatial index backend.
    pub index_backend: IndexBackend,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            default_layer_name: String::from("Default Layer"),
            index_backend: IndexBackend::default(),
        }
    }
}

/// How [`Tree::clone_subtree`] treats link ids.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LinkIdPolicy {
    /// Clones share link ids with their originals (a linked copy).
    Preserve,
    /// Every clone gets a fresh link id (an independent copy).
    Fresh,
}

/// Filters applied during picking and point queries.
///
/// Used by [`Tree::pick`] and [`Tree::find_nodes_containing`].
#[derive(Clone, Copy, Debug, Default)]
pub struct QueryFilter {
    /// If true, only consider nodes whose resolved visibility is shown.
    pub visible_only: bool,
    /// If true, only consider nodes whose resolved lock state is unlocked.
    pub unlocked_only: bool,
}

/// Result of a ray pick.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PickHit {
    /// The indexed node that was hit.
    pub node: NodeId,
    /// Entry distance into the node's physical bounds, in ray direction lengths.
    pub distance: f64,
}

/// The document's node tree: the world, its layers and everything below them.
///
/// The tree owns the per-document counters (persistent and link ids), the entity property
/// index, the spatial index and the selection. Both derived structures are updated from the
/// same three hooks: a subtree attached under the world, a subtree about to be detached, and a
/// node's bounds invalidated.
pub struct Tree {
    nodes: Vec<Option<Node>>, // slots
    generations: Vec<u32>,    // last generation per slot (persists across frees)
    free_list: Vec<usize>,
    world: NodeId,
    default_layer: NodeId,
    next_persistent_id: u64,
    next_link_id: u64,
    current_group: Option<NodeId>,
    // key -> value -> entities
    property_index: BTreeMap<String, BTreeMap<String, BTreeSet<NodeId>>>,
    spatial: SpatialIndex,
    selection: Selection,
    notifications: Vec<Notification>,
    pending_link_changes: BTreeSet<NodeId>,
}

impl core::fmt::Debug for Tree {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let total = self.nodes.len();
        let alive = self.nodes.iter().filter(|n| n.is_some()).count();
        let free = self.free_list.len();
        f.debug_struct("Tree")
            .field("nodes_total", &total)
            .field("nodes_alive", &alive)
            .field("free_list", &free)
            .field("next_persistent_id", &self.next_persistent_id)
            .field("spatial", &self.spatial)
            .finish_non_exhaustive()
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// Create a tree holding a world and its default layer.
    pub fn new() -> Self {
        Self::with_config(TreeConfig::default())
    }

    /// Create a tree with explicit options.
    pub fn with_config(config: TreeConfig) -> Self {
        let placeholder = NodeId::new(0, 0);
        let mut tree = Self {
            nodes: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            world: placeholder,
            default_layer: placeholder,
            next_persistent_id: 0,
            next_link_id: 0,
            current_group: None,
            property_index: BTreeMap::new(),
            spatial: SpatialIndex::new(config.index_backend),
            selection: Selection::default(),
            notifications: Vec::new(),
            pending_link_changes: BTreeSet::new(),
        };
        let world = tree.create(NodeContents::World(WorldData::default()));
        let layer = tree.create(NodeContents::Layer(Layer {
            sort_index: Layer::DEFAULT_SORT_INDEX,
            ..Layer::new(config.default_layer_name)
        }));
        tree.link(world, 0, layer);
        tree.world = world;
        tree.default_layer = layer;
        tree.attach_to_world(world);
        tree
    }

    // --- identity and liveness ---

    /// The root.
    pub fn world(&self) -> NodeId {
        self.world
    }

    /// The non-removable first layer.
    pub fn default_layer(&self) -> NodeId {
        self.default_layer
    }

    /// Returns true if `id` refers to a live node.
    ///
    /// A `NodeId` is considered live if its slot exists and its generation matches
    /// the current generation stored in that slot.
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Number of live nodes, attached or not.
    pub fn len(&self) -> usize {
        self.nodes.len() - self.free_list.len()
    }

    /// Always false; a tree holds at least its world and default layer.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn node(&self, id: NodeId) -> Option<&Node> {
        let n = self.nodes.get(id.idx())?.as_ref()?;
        (n.generation == id.1).then_some(n)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let n = self.nodes.get_mut(id.idx())?.as_mut()?;
        if n.generation != id.1 {
            return None;
        }
        Some(n)
    }

    fn get(&self, id: NodeId) -> Result<&Node, SceneError> {
        self.node(id).ok_or(SceneError::NodeNotFound(id))
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut Node, SceneError> {
        self.node_mut(id).ok_or(SceneError::NodeNotFound(id))
    }

    // --- read accessors ---

    /// Variant tag of a live node.
    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.node(id).map(Node::kind)
    }

    /// Contents of a live node.
    pub fn contents(&self, id: NodeId) -> Option<&NodeContents> {
        self.node(id).map(|n| &n.contents)
    }

    /// Parent of a live node; `None` for the world and detached roots.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    /// Children in order; empty for stale ids.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Whether the node is attached under the world.
    pub fn in_world(&self, id: NodeId) -> bool {
        self.node(id).is_some_and(|n| n.in_world)
    }

    /// Persistent id, once the node has been attached under the world.
    pub fn persistent_id(&self, id: NodeId) -> Option<PersistentId> {
        self.node(id)?.persistent_id
    }

    /// Link id of an object node.
    pub fn link_id(&self, id: NodeId) -> Option<LinkId> {
        self.node(id)?.link_id
    }

    /// Local visibility state.
    pub fn visibility_state(&self, id: NodeId) -> Option<VisibilityState> {
        self.node(id).map(|n| n.visibility)
    }

    /// Local lock state.
    pub fn lock_state(&self, id: NodeId) -> Option<LockState> {
        self.node(id).map(|n| n.lock)
    }

    /// Edit state of a group.
    pub fn edit_state(&self, id: NodeId) -> Option<EditState> {
        self.node(id).map(|n| n.edit_state)
    }

    /// Whether the node itself is selected.
    pub fn is_selected(&self, id: NodeId) -> bool {
        self.node(id).is_some_and(|n| n.selected)
    }

    /// Whether any descendant is selected.
    pub fn is_partially_selected(&self, id: NodeId) -> bool {
        self.node(id).is_some_and(|n| n.descendant_selection_count > 0)
    }

    /// The selection tracker.
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Selected entities followed by the entities owning selected brushes or patches.
    ///
    /// Each entity appears once, in first-seen order.
    pub fn all_selected_entities(&self) -> Vec<NodeId> {
        let owners = self
            .selection
            .brushes()
            .iter()
            .chain(self.selection.patches())
            .filter_map(|&id| self.parent(id))
            .filter(|&p| self.kind(p) == Some(NodeKind::Entity));
        let mut seen = BTreeSet::new();
        self.selection
            .entities()
            .iter()
            .copied()
            .chain(owners)
            .filter(|&id| seen.insert(id))
            .collect()
    }

    /// The spatial index.
    pub fn spatial_index(&self) -> &SpatialIndex {
        &self.spatial
    }

    /// The group currently open for editing.
    pub fn current_group(&self) -> Option<NodeId> {
        self.current_group
    }

    // --- navigation ---

    /// `root` and all its descendants in pre-order.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.is_alive(root) {
            return out;
        }
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// Strict ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cur = self.parent(id);
        while let Some(p) = cur {
            out.push(p);
            cur = self.parent(p);
        }
        out
    }

    /// Nearest strict ancestor that is a group.
    pub fn containing_group(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors(id)
            .into_iter()
            .find(|a| self.kind(*a) == Some(NodeKind::Group))
    }

    /// The layer `id` lives in (or `id` itself for a layer).
    pub fn containing_layer(&self, id: NodeId) -> Option<NodeId> {
        core::iter::once(id)
            .chain(self.ancestors(id))
            .find(|a| self.kind(*a) == Some(NodeKind::Layer))
    }

    /// Number of strict ancestors.
    pub fn depth(&self, id: NodeId) -> usize {
        self.ancestors(id).len()
    }

    /// Whether `ancestor` lies on the path from `id` to its root (excluding `id`).
    pub fn is_ancestor_of(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut cur = self.parent(id);
        while let Some(p) = cur {
            if p == ancestor {
                return true;
            }
            cur = self.parent(p);
        }
        false
    }

    /// Dispatch to the visitor method for the node's variant.
    pub fn accept<V: NodeVisitor>(&self, id: NodeId, visitor: &mut V) -> Option<V::Output> {
        let n = self.node(id)?;
        Some(match &n.contents {
            NodeContents::World(w) => visitor.visit_world(self, id, w),
            NodeContents::Layer(l) => visitor.visit_layer(self, id, l),
            NodeContents::Group(g) => visitor.visit_group(self, id, g),
            NodeContents::Entity(e) => visitor.visit_entity(self, id, e),
            NodeContents::Brush(b) => visitor.visit_brush(self, id, b),
            NodeContents::Patch(p) => visitor.visit_patch(self, id, p),
        })
    }

    // --- capabilities ---

    /// Whether `child` may be placed under `parent`.
    ///
    /// Checks the compatibility matrix, rejects cycles, and rejects nesting a group under a
    /// group of its own link set (directly or through nested groups).
    pub fn can_add_child(&self, parent: NodeId, child: NodeId) -> bool {
        let (Some(p), Some(c)) = (self.node(parent), self.node(child)) else {
            return false;
        };
        if parent == child || self.is_ancestor_of(child, parent) {
            return false;
        }
        if !accepted_children(p.kind()).has(c.kind()) {
            return false;
        }
        let above = parent_link_ids(self, parent);
        above.is_empty() || nested_link_ids(self, child).is_disjoint(&above)
    }

    /// Whether `child` may be detached from `parent`.
    pub fn can_remove_child(&self, parent: NodeId, child: NodeId) -> bool {
        self.parent(child) == Some(parent) && child != self.default_layer
    }

    /// Whether the spatial index tracks this node.
    pub fn should_add_to_spatial_index(&self, id: NodeId) -> bool {
        self.kind(id).is_some_and(should_add_to_spatial_index)
    }

    /// Whether this node can be selected.
    pub fn is_selectable(&self, id: NodeId) -> bool {
        self.kind(id).is_some_and(is_selectable)
    }

    // --- lifecycle ---

    /// Create a detached node.
    pub fn create(&mut self, contents: NodeContents) -> NodeId {
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.nodes[idx] = Some(Node::new(generation, contents));
            (idx, generation)
        } else {
            let generation = 1_u32;
            self.nodes.push(Some(Node::new(generation, contents)));
            self.generations.push(generation);
            (self.nodes.len() - 1, generation)
        };
        #[allow(
            clippy::cast_possible_truncation,
            reason = "NodeId holds 32-bit arena indices."
        )]
        NodeId::new(idx as u32, generation)
    }

    /// Destroy a detached subtree, invalidating all its ids.
    pub fn destroy(&mut self, root: NodeId) -> Result<(), SceneError> {
        let n = self.get(root)?;
        if n.parent.is_some() || root == self.world {
            return Err(SceneError::NodeAttached(root));
        }
        for id in self.descendants(root) {
            self.nodes[id.idx()] = None;
            self.free_list.push(id.idx());
        }
        Ok(())
    }

    /// Append `child` to `parent`'s children.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        let index = self.get(parent)?.children.len();
        self.insert_child(parent, index, child)
    }

    /// Insert the detached `child` at `index` among `parent`'s children.
    ///
    /// Attaching under the world assigns missing persistent and link ids in pre-order and
    /// registers indexed nodes with the spatial index. The world's first child stays the
    /// default layer.
    pub fn insert_child(
        &mut self,
        parent: NodeId,
        index: usize,
        child: NodeId,
    ) -> Result<(), SceneError> {
        self.get(parent)?;
        if self.get(child)?.parent.is_some() || child == self.world {
            return Err(SceneError::NodeAttached(child));
        }
        if !self.can_add_child(parent, child) {
            return Err(SceneError::InvalidHierarchy {
                node: child,
                parent,
            });
        }
        self.link(parent, index, child);
        let attached = self.in_world(parent);
        if attached {
            self.attach_to_world(child);
        }
        self.invalidate_bounds(parent)?;
        self.mark_groups_from(Some(parent));
        if attached {
            self.notifications
                .push(Notification::NodesWereAdded(vec![child]));
        }
        Ok(())
    }

    /// Detach `child` from `parent`, returning the index it had.
    ///
    /// Detaching from the world deselects the subtree and removes it from the spatial index.
    /// If the current group lies inside the subtree, editing moves to the nearest group
    /// outside it.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<usize, SceneError> {
        self.get(parent)?;
        if child == self.default_layer || child == self.world {
            return Err(SceneError::ProtectedNode(child));
        }
        if self.get(child)?.parent != Some(parent) {
            return Err(SceneError::InvalidHierarchy {
                node: child,
                parent,
            });
        }
        let attached = self.in_world(child);
        if attached {
            self.notifications
                .push(Notification::NodesWillBeRemoved(vec![child]));
            self.detach_from_world(child)?;
        }
        self.mark_groups_from(Some(parent));
        let index = self.unlink(child).map_or(0, |(_, i)| i);
        self.invalidate_bounds(parent)?;
        if attached {
            self.notifications
                .push(Notification::NodesWereRemoved(vec![child]));
        }
        Ok(index)
    }

    /// Move `child` under `new_parent` (appended), returning the old parent and index.
    pub fn reparent(
        &mut self,
        child: NodeId,
        new_parent: NodeId,
    ) -> Result<(NodeId, usize), SceneError> {
        let index = self.get(new_parent)?.children.len();
        self.reparent_at(child, new_parent, index)
    }

    /// Move `child` under `new_parent` at `index`, returning the old parent and index.
    ///
    /// Validation happens before any mutation: an invalid move leaves the tree untouched.
    /// A move that stays under the world keeps selection, index entries and ids.
    pub fn reparent_at(
        &mut self,
        child: NodeId,
        new_parent: NodeId,
        index: usize,
    ) -> Result<(NodeId, usize), SceneError> {
        self.get(new_parent)?;
        let Some(old_parent) = self.get(child)?.parent else {
            return Err(SceneError::NodeNotFound(child));
        };
        if child == self.default_layer {
            return Err(SceneError::ProtectedNode(child));
        }
        if !self.can_add_child(new_parent, child) {
            return Err(SceneError::InvalidHierarchy {
                node: child,
                parent: new_parent,
            });
        }
        if !(self.in_world(child) && self.in_world(new_parent)) {
            let old_index = self.remove_child(old_parent, child)?;
            self.insert_child(new_parent, index, child)?;
            return Ok((old_parent, old_index));
        }

        let reopen = self
            .current_group
            .filter(|g| *g == child || self.is_ancestor_of(child, *g));
        if reopen.is_some() {
            self.set_current_group(None)?;
        }
        self.notifications
            .push(Notification::NodesWillBeRemoved(vec![child]));
        self.mark_groups_from(Some(old_parent));
        let old_index = self.unlink(child).map_or(0, |(_, i)| i);
        self.invalidate_bounds(old_parent)?;
        self.link(new_parent, index, child);
        self.invalidate_bounds(new_parent)?;
        self.mark_groups_from(Some(new_parent));
        self.notifications
            .push(Notification::NodesWereRemoved(vec![child]));
        self.notifications
            .push(Notification::NodesWereAdded(vec![child]));
        if reopen.is_some() {
            self.set_current_group(reopen)?;
        }
        log::trace!("reparented {child:?} from {old_parent:?} to {new_parent:?}");
        Ok((old_parent, old_index))
    }

    /// Deep copy of a subtree, detached.
    ///
    /// Persistent ids, selection and edit state are not copied; visibility and lock states are.
    /// Groups lose their shared persistent id.
    pub fn clone_subtree(
        &mut self,
        root: NodeId,
        policy: LinkIdPolicy,
    ) -> Result<NodeId, SceneError> {
        let n = self.get(root)?;
        let mut contents = n.contents.clone();
        let (visibility, lock, link_id) = (n.visibility, n.lock, n.link_id);
        let children = n.children.clone();
        if let NodeContents::Group(g) = &mut contents {
            g.shared_persistent_id = None;
        }
        let kind = contents.kind();
        let clone = self.create(contents);
        let link_id = match policy {
            LinkIdPolicy::Preserve => link_id,
            LinkIdPolicy::Fresh => has_link_id(kind).then(|| self.allocate_link_id()),
        };
        if let Some(c) = self.node_mut(clone) {
            c.visibility = visibility;
            c.lock = lock;
            c.link_id = link_id;
        }
        for child in children {
            let child_clone = self.clone_subtree(child, policy)?;
            let index = self.children(clone).len();
            self.link(clone, index, child_clone);
        }
        Ok(clone)
    }

    // --- contents and ids ---

    /// Replace a node's contents, returning the old contents.
    ///
    /// The variant cannot change. Groups containing the node are marked as having pending
    /// linked changes.
    pub fn set_contents(
        &mut self,
        id: NodeId,
        contents: NodeContents,
    ) -> Result<NodeContents, SceneError> {
        self.set_contents_within(id, id, contents)
    }

    /// Replace a node's contents as part of an edit rooted at `root`.
    ///
    /// Only groups containing `root` are marked as changed, so transforming a group together
    /// with its descendants does not count as editing the group's own content.
    pub fn set_contents_within(
        &mut self,
        root: NodeId,
        id: NodeId,
        contents: NodeContents,
    ) -> Result<NodeContents, SceneError> {
        let n = self.get(id)?;
        if n.kind() != contents.kind() {
            return Err(SceneError::KindMismatch(id));
        }
        let attached = n.in_world;
        if attached {
            self.unindex_properties(id);
        }
        let old = core::mem::replace(&mut self.get_mut(id)?.contents, contents);
        if attached {
            self.index_properties(id);
        }
        self.invalidate_bounds(id)?;
        self.mark_groups_from(self.parent(root));
        if attached {
            self.notifications
                .push(Notification::NodeContentsChanged(id));
        }
        Ok(old)
    }

    /// Apply `m` to the contents of every node in the subtree.
    pub fn transform_subtree(&mut self, root: NodeId, m: &DMat4) -> Result<(), SceneError> {
        for id in self.descendants(root) {
            let contents = self.get(id)?.contents.transformed(m);
            self.set_contents_within(root, id, contents)?;
        }
        Ok(())
    }

    /// Set or clear a node's link id, returning the old one.
    pub fn set_link_id(
        &mut self,
        id: NodeId,
        link_id: Option<LinkId>,
    ) -> Result<Option<LinkId>, SceneError> {
        let n = self.get_mut(id)?;
        let old = core::mem::replace(&mut n.link_id, link_id);
        if n.in_world && old != link_id {
            self.notifications.push(Notification::LinkIdChanged(id));
        }
        Ok(old)
    }

    /// Allocate a link id never handed out before in this tree.
    pub fn allocate_link_id(&mut self) -> LinkId {
        self.next_link_id += 1;
        LinkId(self.next_link_id)
    }

    fn allocate_persistent_id(&mut self) -> PersistentId {
        self.next_persistent_id += 1;
        PersistentId(self.next_persistent_id)
    }

    // --- bounds cache ---

    /// Cached logical and physical bounds, recomputed if invalid.
    pub fn bounds(&self, id: NodeId) -> Option<NodeBounds> {
        self.node(id).map(|n| self.cached_bounds(n))
    }

    /// Logical bounds.
    pub fn logical_bounds(&self, id: NodeId) -> Option<BBox3> {
        self.bounds(id).map(|b| b.logical)
    }

    /// Physical bounds.
    pub fn physical_bounds(&self, id: NodeId) -> Option<BBox3> {
        self.bounds(id).map(|b| b.physical)
    }

    /// Bounds recomputed from scratch, ignoring every cache in the subtree.
    pub fn uncached_bounds(&self, id: NodeId) -> Option<NodeBounds> {
        let n = self.node(id)?;
        Some(self.compute_bounds(n, &|c| self.uncached_bounds(c)))
    }

    fn cached_bounds(&self, n: &Node) -> NodeBounds {
        if let Some(b) = n.bounds.get() {
            return b;
        }
        let b = self.compute_bounds(n, &|c| self.bounds(c));
        n.bounds.set(Some(b));
        b
    }

    fn compute_bounds(
        &self,
        n: &Node,
        child_bounds: &dyn Fn(NodeId) -> Option<NodeBounds>,
    ) -> NodeBounds {
        let from_contents = match &n.contents {
            NodeContents::Entity(_) if !n.children.is_empty() => None,
            contents => contents.leaf_bounds(),
        };
        from_contents.unwrap_or_else(|| {
            n.children
                .iter()
                .filter_map(|c| child_bounds(*c))
                .reduce(NodeBounds::union)
                .unwrap_or(NodeBounds::uniform(BBox3::ZERO))
        })
    }

    /// Invalidate `id` and its ancestors, refreshing the index entries of indexed ones.
    fn invalidate_bounds(&mut self, id: NodeId) -> Result<(), SceneError> {
        let mut cur = Some(id);
        while let Some(c) = cur {
            let Some(n) = self.node(c) else { break };
            n.bounds.set(None);
            let (attached, indexed, parent) = (
                n.in_world,
                should_add_to_spatial_index(n.kind()),
                n.parent,
            );
            if attached {
                if indexed {
                    let physical = self.cached_bounds(n).physical;
                    self.spatial.update(c, physical)?;
                }
                self.notifications
                    .push(Notification::NodePhysicalBoundsChanged(c));
            }
            cur = parent;
        }
        Ok(())
    }

    // --- visibility, locking, selection ---

    /// Set the local visibility state, returning the old one.
    pub fn set_visibility(
        &mut self,
        id: NodeId,
        state: VisibilityState,
    ) -> Result<VisibilityState, SceneError> {
        let n = self.get_mut(id)?;
        let old = core::mem::replace(&mut n.visibility, state);
        if n.in_world && old != state {
            self.notifications.push(Notification::NodeStateChanged(id));
        }
        Ok(old)
    }

    /// Set the local lock state, returning the old one.
    pub fn set_lock(&mut self, id: NodeId, state: LockState) -> Result<LockState, SceneError> {
        let n = self.get_mut(id)?;
        let old = core::mem::replace(&mut n.lock, state);
        if n.in_world && old != state {
            self.notifications.push(Notification::NodeStateChanged(id));
        }
        Ok(old)
    }

    /// Resolved visibility: the nearest explicit state on the path to the root, shown by default.
    pub fn is_visible(&self, id: NodeId) -> bool {
        let mut cur = Some(id);
        while let Some(c) = cur {
            let Some(n) = self.node(c) else { break };
            match n.visibility {
                VisibilityState::Shown => return true,
                VisibilityState::Hidden => return false,
                VisibilityState::Inherited => cur = n.parent,
            }
        }
        true
    }

    /// Resolved lock state: the nearest explicit state on the path to the root, unlocked by default.
    pub fn is_locked(&self, id: NodeId) -> bool {
        let mut cur = Some(id);
        while let Some(c) = cur {
            let Some(n) = self.node(c) else { break };
            match n.lock {
                LockState::Unlocked => return false,
                LockState::Locked => return true,
                LockState::Inherited => cur = n.parent,
            }
        }
        false
    }

    /// Select nodes. Non-selectable, detached and already selected nodes are skipped.
    pub fn select(&mut self, ids: &[NodeId]) -> Result<(), SceneError> {
        let mut selected = Vec::new();
        for &id in ids {
            let n = self.get_mut(id)?;
            if n.selected || !n.in_world || !is_selectable(n.kind()) {
                continue;
            }
            n.selected = true;
            let (kind, parent) = (n.kind(), n.parent);
            self.adjust_selection_counts(parent, 1, true);
            self.selection.on_selected(id, kind);
            selected.push(id);
        }
        if !selected.is_empty() {
            self.notifications.push(Notification::SelectionChanged {
                selected,
                deselected: Vec::new(),
            });
        }
        Ok(())
    }

    /// Deselect nodes. Unselected nodes are skipped.
    pub fn deselect(&mut self, ids: &[NodeId]) -> Result<(), SceneError> {
        let mut deselected = Vec::new();
        for &id in ids {
            let n = self.get_mut(id)?;
            if !n.selected {
                continue;
            }
            n.selected = false;
            let (kind, parent) = (n.kind(), n.parent);
            self.adjust_selection_counts(parent, 1, false);
            self.selection.on_deselected(id, kind);
            deselected.push(id);
        }
        if !deselected.is_empty() {
            self.notifications.push(Notification::SelectionChanged {
                selected: Vec::new(),
                deselected,
            });
        }
        Ok(())
    }

    /// Deselect everything.
    pub fn deselect_all(&mut self) -> Result<(), SceneError> {
        let all = self.selection.nodes().to_vec();
        self.deselect(&all)
    }

    fn adjust_selection_counts(&mut self, start: Option<NodeId>, n: usize, add: bool) {
        let mut cur = start;
        while let Some(c) = cur {
            let Some(node) = self.node_mut(c) else { break };
            node.descendant_selection_count = if add {
                node.descendant_selection_count + n
            } else {
                node.descendant_selection_count.saturating_sub(n)
            };
            cur = node.parent;
        }
    }

    // --- group editing ---

    /// Make `group` the current group, or close all groups with `None`.
    ///
    /// Returns the previous current group. The new group becomes `Open` and its containing
    /// groups `DescendantOpen`; the previous chain is reset to `Closed`.
    pub fn set_current_group(
        &mut self,
        group: Option<NodeId>,
    ) -> Result<Option<NodeId>, SceneError> {
        if let Some(g) = group {
            if self.get(g)?.kind() != NodeKind::Group {
                return Err(SceneError::NotAGroup(g));
            }
            if !self.in_world(g) {
                return Err(SceneError::NodeNotFound(g));
            }
        }
        let previous = self.current_group.take();
        if let Some(old) = previous {
            for id in core::iter::once(old).chain(self.ancestors(old)) {
                if let Some(n) = self.node_mut(id) {
                    n.edit_state = EditState::Closed;
                }
            }
            self.notifications.push(Notification::GroupWasClosed(old));
        }
        if let Some(g) = group {
            for a in self.ancestors(g) {
                if let Some(n) = self.node_mut(a)
                    && n.kind() == NodeKind::Group
                {
                    n.edit_state = EditState::DescendantOpen;
                }
            }
            if let Some(n) = self.node_mut(g) {
                n.edit_state = EditState::Open;
            }
            self.current_group = Some(g);
            self.notifications.push(Notification::GroupWasOpened(g));
        }
        Ok(previous)
    }

    /// Open `group` for editing.
    pub fn open_group(&mut self, group: NodeId) -> Result<Option<NodeId>, SceneError> {
        self.set_current_group(Some(group))
    }

    /// Close the current group, making its containing group current. Returns the closed group.
    pub fn close_group(&mut self) -> Result<Option<NodeId>, SceneError> {
        let Some(current) = self.current_group else {
            return Ok(None);
        };
        let outer = self.containing_group(current);
        self.set_current_group(outer)?;
        Ok(Some(current))
    }

    // --- spatial queries ---

    /// Indexed nodes hit by the ray, nearest first.
    pub fn pick(&self, ray: Ray3, filter: QueryFilter) -> Vec<PickHit> {
        self.spatial
            .query_ray(ray)
            .into_iter()
            .filter(|(id, _)| self.passes(*id, filter))
            .map(|(node, distance)| PickHit { node, distance })
            .collect()
    }

    /// Indexed nodes whose physical bounds contain the point.
    pub fn find_nodes_containing(&self, point: DVec3, filter: QueryFilter) -> Vec<NodeId> {
        self.spatial
            .query_point(point)
            .into_iter()
            .filter(|id| self.passes(*id, filter))
            .collect()
    }

    /// Indexed nodes whose physical bounds intersect the box.
    pub fn query_box(&self, bounds: BBox3) -> Vec<NodeId> {
        self.spatial.query_box(bounds)
    }

    /// Every node currently in the spatial index.
    pub fn indexed_nodes(&self) -> Vec<NodeId> {
        self.spatial.nodes().collect()
    }

    fn passes(&self, id: NodeId, filter: QueryFilter) -> bool {
        (!filter.visible_only || self.is_visible(id)) && (!filter.unlocked_only || !self.is_locked(id))
    }

    /// Stop maintaining the spatial index (bulk-load mode).
    pub fn suspend_index(&mut self) {
        self.spatial.suspend();
    }

    /// Rebuild the spatial index from the tree in one pass and resume maintenance.
    pub fn resume_index(&mut self) {
        let items: Vec<(NodeId, BBox3)> = self
            .descendants(self.world)
            .into_iter()
            .filter(|id| self.should_add_to_spatial_index(*id))
            .filter_map(|id| Some((id, self.physical_bounds(id)?)))
            .collect();
        self.spatial.rebuild(items);
    }

    // --- entity property index ---

    /// Attached entities whose `key` property equals `value`.
    pub fn find_entities_with_property(&self, key: &str, value: &str) -> Vec<NodeId> {
        self.property_index
            .get(key)
            .and_then(|values| values.get(value))
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    fn index_properties(&mut self, id: NodeId) {
        let Some(NodeContents::Entity(e)) = self.contents(id) else {
            return;
        };
        let pairs: Vec<(String, String)> = e
            .properties
            .iter()
            .map(|p| (p.key.clone(), p.value.clone()))
            .collect();
        for (k, v) in pairs {
            self.property_index
                .entry(k)
                .or_default()
                .entry(v)
                .or_default()
                .insert(id);
        }
    }

    fn unindex_properties(&mut self, id: NodeId) {
        let Some(NodeContents::Entity(e)) = self.contents(id) else {
            return;
        };
        let pairs: Vec<(String, String)> = e
            .properties
            .iter()
            .map(|p| (p.key.clone(), p.value.clone()))
            .collect();
        for (k, v) in pairs {
            let Some(values) = self.property_index.get_mut(&k) else {
                continue;
            };
            if let Some(ids) = values.get_mut(&v) {
                ids.remove(&id);
                if ids.is_empty() {
                    values.remove(&v);
                }
            }
            if values.is_empty() {
                self.property_index.remove(&k);
            }
        }
    }

    // --- notifications and pending link changes ---

    /// Drain queued notifications, oldest first.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        core::mem::take(&mut self.notifications)
    }

    /// Drain the groups whose content changed since the last drain.
    pub fn take_pending_link_changes(&mut self) -> BTreeSet<NodeId> {
        core::mem::take(&mut self.pending_link_changes)
    }

    fn mark_groups_from(&mut self, start: Option<NodeId>) {
        let mut cur = start;
        while let Some(c) = cur {
            let Some(n) = self.node(c) else { break };
            if !n.in_world {
                break;
            }
            let (kind, parent) = (n.kind(), n.parent);
            if kind == NodeKind::Group {
                self.pending_link_changes.insert(c);
            }
            cur = parent;
        }
    }

    // --- internals ---

    fn link(&mut self, parent: NodeId, index: usize, child: NodeId) {
        // The default layer stays first under the world.
        let min = usize::from(parent == self.world);
        let count = self.node(child).map_or(0, |c| usize::from(c.selected) + c.descendant_selection_count);
        let Some(p) = self.node_mut(parent) else {
            return;
        };
        let index = index.clamp(min.min(p.children.len()), p.children.len());
        p.children.insert(index, child);
        if let Some(c) = self.node_mut(child) {
            c.parent = Some(parent);
        }
        if count > 0 {
            self.adjust_selection_counts(Some(parent), count, true);
        }
    }

    fn unlink(&mut self, child: NodeId) -> Option<(NodeId, usize)> {
        let c = self.node_mut(child)?;
        let parent = c.parent.take()?;
        let count = usize::from(c.selected) + c.descendant_selection_count;
        let p = self.node_mut(parent)?;
        let index = p.children.iter().position(|n| *n == child)?;
        p.children.remove(index);
        if count > 0 {
            self.adjust_selection_counts(Some(parent), count, false);
        }
        Some((parent, index))
    }

    fn attach_to_world(&mut self, root: NodeId) {
        for id in self.descendants(root) {
            let missing_pid = self.node(id).is_some_and(|n| n.persistent_id.is_none());
            let pid = missing_pid.then(|| self.allocate_persistent_id());
            let missing_link = self
                .node(id)
                .is_some_and(|n| n.link_id.is_none() && has_link_id(n.kind()));
            let link = missing_link.then(|| self.allocate_link_id());
            let Some(n) = self.node_mut(id) else { continue };
            n.in_world = true;
            if pid.is_some() {
                n.persistent_id = pid;
            }
            if link.is_some() {
                n.link_id = link;
            }
            let indexed = should_add_to_spatial_index(n.kind());
            self.index_properties(id);
            if indexed && let Some(b) = self.physical_bounds(id) {
                self.spatial.insert(id, b);
            }
            log::trace!("attached {id:?}");
        }
    }

    fn detach_from_world(&mut self, root: NodeId) -> Result<(), SceneError> {
        if let Some(g) = self.current_group
            && (g == root || self.is_ancestor_of(root, g))
        {
            let outer = self.containing_group(root);
            self.set_current_group(outer)?;
        }
        let subtree = self.descendants(root);
        let selected: Vec<NodeId> = subtree
            .iter()
            .copied()
            .filter(|id| self.is_selected(*id))
            .collect();
        self.deselect(&selected)?;
        for id in subtree {
            self.unindex_properties(id);
            if self.should_add_to_spatial_index(id) {
                self.spatial.remove(id)?;
            }
            if let Some(n) = self.node_mut(id) {
                n.in_world = false;
            }
            log::trace!("detached {id:?}");
        }
        Ok(())
    }
}
