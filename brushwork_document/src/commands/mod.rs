// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The built-in undoable commands.
//!
//! Every command here leaves the map unchanged when `perform_do` fails, and keeps the nodes
//! it detaches alive until it is disposed.

mod add_remove;
mod duplicate;
mod group_state;
mod link_ids;
mod reparent;
mod selection;
mod swap_contents;
mod transform;
mod update_linked_groups;

pub use add_remove::AddRemoveNodes;
pub use duplicate::DuplicateNodes;
pub use group_state::{CurrentGroupChange, CurrentGroupCommand, NodeStateChange, SetNodeState};
pub use link_ids::SetLinkIds;
pub use reparent::ReparentNodes;
pub use selection::{SelectionAction, SelectionCommand};
pub use swap_contents::SwapNodeContents;
pub use transform::TransformNodes;
pub use update_linked_groups::UpdateLinkedGroups;

use alloc::vec::Vec;

use brushwork_scene::{NodeId, Tree};

use crate::error::DocumentError;
use crate::map::Map;

/// Fail if any attached node in the given subtrees extends outside the world bounds.
pub(crate) fn check_world_bounds(map: &Map, nodes: &[NodeId]) -> Result<(), DocumentError> {
    let tree = map.tree();
    let world = map.world_bounds();
    for &root in nodes {
        if !tree.in_world(root) {
            continue;
        }
        for id in tree.descendants(root) {
            if let Some(b) = tree.logical_bounds(id)
                && !world.contains(&b)
            {
                return Err(DocumentError::OutOfWorldBounds(id));
            }
        }
    }
    Ok(())
}

/// `nodes` without those that have an ancestor in `nodes`, order kept.
pub(crate) fn topmost(tree: &Tree, nodes: &[NodeId]) -> Vec<NodeId> {
    let mut out: Vec<NodeId> = Vec::with_capacity(nodes.len());
    for &n in nodes {
        let nested = nodes.iter().any(|&a| a != n && tree.is_ancestor_of(a, n));
        if !nested && !out.contains(&n) {
            out.push(n);
        }
    }
    out
}
