// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::string::String;
use alloc::vec::Vec;

use brushwork_scene::linked_groups::{
    reset_link_ids, restore_link_ids, should_reset_link_ids_on_reparent,
};
use brushwork_scene::{LinkId, NodeId, Tree};

use crate::command::{Command, UndoableCommand};
use crate::error::DocumentError;
use crate::map::Map;

type LinkIds = Vec<(NodeId, Option<LinkId>)>;

/// Move nodes to new parents.
///
/// Nodes that leave a linked group, or enter a group of another link set, get fresh link ids
/// (see [`should_reset_link_ids_on_reparent`]). Redo reapplies the same fresh ids.
#[derive(Debug)]
pub struct ReparentNodes {
    name: String,
    moves: Vec<(NodeId, NodeId)>,
    // (child, old parent, old index) of the last perform_do
    previous: Vec<(NodeId, NodeId, usize)>,
    link_ids_before: LinkIds,
    link_ids_after: Option<LinkIds>,
}

impl ReparentNodes {
    /// Move each `(child, new_parent)`, appending to the new parent's children.
    pub fn new(moves: Vec<(NodeId, NodeId)>) -> Self {
        Self {
            name: String::from("Reparent Objects"),
            moves,
            previous: Vec::new(),
            link_ids_before: Vec::new(),
            link_ids_after: None,
        }
    }

    /// Old parents of the moved nodes, as of the last perform.
    pub fn old_parents(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.previous.iter().map(|(_, p, _)| *p)
    }

    fn revert_moves(&mut self, tree: &mut Tree) -> Result<(), DocumentError> {
        for (child, parent, index) in self.previous.drain(..).rev() {
            tree.reparent_at(child, parent, index)?;
        }
        Ok(())
    }
}

impl Command for ReparentNodes {
    fn name(&self) -> &str {
        &self.name
    }

    fn perform_do(&mut self, map: &mut Map) -> Result<(), DocumentError> {
        let tree = map.tree_mut();
        let resets: Vec<NodeId> = self
            .moves
            .iter()
            .filter(|(child, parent)| should_reset_link_ids_on_reparent(tree, *child, *parent))
            .map(|(child, _)| *child)
            .collect();

        self.previous.clear();
        for &(child, parent) in &self.moves {
            match tree.reparent(child, parent) {
                Ok((old_parent, old_index)) => self.previous.push((child, old_parent, old_index)),
                Err(e) => {
                    let moved = core::mem::take(&mut self.previous);
                    for (c, p, i) in moved.into_iter().rev() {
                        tree.reparent_at(c, p, i)?;
                    }
                    return Err(e.into());
                }
            }
        }

        let applied = match &self.link_ids_after {
            None => reset_link_ids(tree, &resets).map(|before| {
                let after = before.iter().map(|(n, _)| (*n, tree.link_id(*n))).collect();
                (before, after)
            }),
            Some(after) => {
                let before = after.iter().map(|(n, _)| (*n, tree.link_id(*n))).collect();
                restore_link_ids(tree, after).map(|()| (before, after.clone()))
            }
        };
        match applied {
            Ok((before, after)) => {
                self.link_ids_before = before;
                self.link_ids_after = Some(after);
                Ok(())
            }
            Err(e) => {
                self.revert_moves(tree)?;
                Err(e.into())
            }
        }
    }
}

impl UndoableCommand for ReparentNodes {
    fn perform_undo(&mut self, map: &mut Map) -> Result<(), DocumentError> {
        let tree = map.tree_mut();
        restore_link_ids(tree, &self.link_ids_before)?;
        self.revert_moves(tree)
    }
}
