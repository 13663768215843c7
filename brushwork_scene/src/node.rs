// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Arena node record and the per-variant capability matrix.

use alloc::vec::Vec;
use core::cell::Cell;

use crate::bounds::NodeBounds;
use crate::contents::NodeContents;
use crate::types::{EditState, LinkId, LockState, NodeId, NodeKind, NodeKinds, PersistentId, VisibilityState};

#[derive(Clone, Debug)]
pub(crate) struct Node {
    pub(crate) generation: u32,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) contents: NodeContents,
    // Invalid until read; cleared on structural or geometric change.
    pub(crate) bounds: Cell<Option<NodeBounds>>,
    pub(crate) persistent_id: Option<PersistentId>,
    pub(crate) link_id: Option<LinkId>,
    pub(crate) visibility: VisibilityState,
    pub(crate) lock: LockState,
    pub(crate) edit_state: EditState,
    pub(crate) selected: bool,
    pub(crate) descendant_selection_count: usize,
    pub(crate) in_world: bool,
}

impl Node {
    pub(crate) fn new(generation: u32, contents: NodeContents) -> Self {
        Self {
            generation,
            parent: None,
            children: Vec::new(),
            contents,
            bounds: Cell::new(None),
            persistent_id: None,
            link_id: None,
            visibility: VisibilityState::Inherited,
            lock: LockState::Inherited,
            edit_state: EditState::Closed,
            selected: false,
            descendant_selection_count: 0,
            in_world: false,
        }
    }

    pub(crate) fn kind(&self) -> NodeKind {
        self.contents.kind()
    }
}

/// Child kinds a parent kind accepts, ignoring link-id recursion.
pub const fn accepted_children(parent: NodeKind) -> NodeKinds {
    match parent {
        NodeKind::World => NodeKinds::LAYER,
        NodeKind::Layer | NodeKind::Group => NodeKinds::OBJECTS,
        NodeKind::Entity => NodeKinds::BRUSH.union(NodeKinds::PATCH),
        NodeKind::Brush | NodeKind::Patch => NodeKinds::empty(),
    }
}

/// Whether the spatial index tracks nodes of this kind.
///
/// Containers are never indexed, so picking resolves to primitives.
pub const fn should_add_to_spatial_index(kind: NodeKind) -> bool {
    NodeKinds::INDEXED.has(kind)
}

/// Whether nodes of this kind can be selected.
pub const fn is_selectable(kind: NodeKind) -> bool {
    NodeKinds::OBJECTS.has(kind)
}

/// Whether a node of this kind is removed along with its last child.
///
/// Groups and brush entities disappear when emptied; layers stay.
pub const fn remove_if_empty(kind: NodeKind) -> bool {
    matches!(kind, NodeKind::Group | NodeKind::Entity)
}

/// Whether nodes of this kind carry link ids.
pub const fn has_link_id(kind: NodeKind) -> bool {
    NodeKinds::OBJECTS.has(kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compatibility_matrix() {
        use NodeKind::*;
        let all = [World, Layer, Group, Entity, Brush, Patch];
        let expected: [(NodeKind, &[NodeKind]); 6] = [
            (World, &[Layer]),
            (Layer, &[Group, Entity, Brush, Patch]),
            (Group, &[Group, Entity, Brush, Patch]),
            (Entity, &[Brush, Patch]),
            (Brush, &[]),
            (Patch, &[]),
        ];
        for (parent, ok) in expected {
            for child in all {
                assert_eq!(
                    accepted_children(parent).has(child),
                    ok.contains(&child),
                    "{parent:?} accepting {child:?}"
                );
            }
        }
    }

    #[test]
    fn capability_queries() {
        assert!(should_add_to_spatial_index(NodeKind::Entity));
        assert!(!should_add_to_spatial_index(NodeKind::Layer));
        assert!(!is_selectable(NodeKind::World));
        assert!(remove_if_empty(NodeKind::Group));
        assert!(!remove_if_empty(NodeKind::Layer));
    }
}
