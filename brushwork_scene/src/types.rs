// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for the scene tree: identifiers, per-node states and kind flags.

/// Identifier for a node in the tree.
///
/// This is a small, copyable handle that stays stable across updates but becomes
/// invalid when the underlying slot is reused.
/// It consists of a slot index and a generation counter.
///
/// ## Semantics
///
/// - On create, a fresh slot is allocated with generation `1`.
/// - On destroy, the slot is freed; any existing `NodeId` that pointed to that slot is now stale.
/// - On reuse of a freed slot, its generation is incremented, producing a new, distinct `NodeId`.
///
/// ### Liveness
///
/// Use [`Tree::is_alive`](crate::Tree::is_alive) to check whether a `NodeId` still refers to a live node.
/// Stale `NodeId`s never alias a different live node because the generation must match.
/// Accessors return `None` (or [`SceneError::NodeNotFound`](crate::SceneError::NodeNotFound))
/// for stale ids instead of reading a dangling slot.
///
/// A `NodeId` is an in-memory handle only. Use [`PersistentId`] for identity that survives
/// save and load.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32, pub(crate) u32);

impl NodeId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Stable per-document identity of a node.
///
/// Assigned the first time a node is attached under the world, strictly increasing within a
/// document and never reused, even after the node is destroyed.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct PersistentId(pub u64);

/// Identifies a link set.
///
/// Groups sharing a link id are instances of one linked group. Objects inside them share link
/// ids with their counterparts in the other instances.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct LinkId(pub u64);

/// Visibility of a node, resolved by walking ancestors when `Inherited`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum VisibilityState {
    /// Use the parent's resolved visibility.
    #[default]
    Inherited,
    /// Explicitly shown.
    Shown,
    /// Explicitly hidden.
    Hidden,
}

/// Lock state of a node, resolved by walking ancestors when `Inherited`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum LockState {
    /// Use the parent's resolved lock state.
    #[default]
    Inherited,
    /// Explicitly unlocked.
    Unlocked,
    /// Explicitly locked.
    Locked,
}

/// Edit state of a group.
///
/// At most one group is `Open`; its containing groups are `DescendantOpen`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum EditState {
    /// Not being edited.
    #[default]
    Closed,
    /// The group currently being edited.
    Open,
    /// A group nested inside this one is being edited.
    DescendantOpen,
}

/// The concrete variant of a node.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    /// The tree root.
    World,
    /// Top-level ordered container.
    Layer,
    /// Instanceable container with a transformation.
    Group,
    /// Point entity, or container of brushes and patches.
    Entity,
    /// Convex solid.
    Brush,
    /// Bezier surface.
    Patch,
}

impl NodeKind {
    /// The single-bit flag for this kind.
    pub const fn flag(self) -> NodeKinds {
        match self {
            Self::World => NodeKinds::WORLD,
            Self::Layer => NodeKinds::LAYER,
            Self::Group => NodeKinds::GROUP,
            Self::Entity => NodeKinds::ENTITY,
            Self::Brush => NodeKinds::BRUSH,
            Self::Patch => NodeKinds::PATCH,
        }
    }
}

bitflags::bitflags! {
    /// A set of node kinds, used for capability checks and filtered traversals.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct NodeKinds: u8 {
        /// The world.
        const WORLD  = 0b0000_0001;
        /// Layers.
        const LAYER  = 0b0000_0010;
        /// Groups.
        const GROUP  = 0b0000_0100;
        /// Entities.
        const ENTITY = 0b0000_1000;
        /// Brushes.
        const BRUSH  = 0b0001_0000;
        /// Patches.
        const PATCH  = 0b0010_0000;
        /// Kinds that can live inside layers and groups and carry link ids.
        const OBJECTS = Self::GROUP.bits() | Self::ENTITY.bits() | Self::BRUSH.bits() | Self::PATCH.bits();
        /// Kinds tracked by the spatial index.
        const INDEXED = Self::ENTITY.bits() | Self::BRUSH.bits() | Self::PATCH.bits();
        /// Kinds whose bounds are the union of their children.
        const CONTAINERS = Self::WORLD.bits() | Self::LAYER.bits() | Self::GROUP.bits();
    }
}

impl NodeKinds {
    /// Whether `kind` is in the set.
    pub const fn has(self, kind: NodeKind) -> bool {
        self.contains(kind.flag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_sets() {
        assert!(NodeKinds::INDEXED.has(NodeKind::Brush));
        assert!(!NodeKinds::INDEXED.has(NodeKind::Group), "groups are never indexed");
        assert!(NodeKinds::OBJECTS.has(NodeKind::Group));
        assert!(!NodeKinds::OBJECTS.has(NodeKind::Layer));
    }

    #[test]
    fn ids_order_by_slot_then_generation() {
        assert!(NodeId::new(1, 5) < NodeId::new(2, 1));
        assert!(NodeId::new(1, 1) < NodeId::new(1, 2));
        assert!(PersistentId(3) > PersistentId(2));
    }
}
