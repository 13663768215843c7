// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::string::String;
use alloc::vec::Vec;

use brushwork_scene::linked_groups::{reset_link_ids, restore_link_ids};
use brushwork_scene::{LinkId, NodeId};

use crate::command::{Command, UndoableCommand};
use crate::error::DocumentError;
use crate::map::Map;

type LinkIds = Vec<(NodeId, Option<LinkId>)>;

/// Give nodes fresh link ids, separating groups from their link sets.
///
/// Redo reapplies the ids handed out by the first perform.
#[derive(Debug)]
pub struct SetLinkIds {
    name: String,
    nodes: Vec<NodeId>,
    before: LinkIds,
    after: Option<LinkIds>,
}

impl SetLinkIds {
    /// Reset the link ids of `nodes` (see [`reset_link_ids`]).
    pub fn reset(name: impl Into<String>, nodes: Vec<NodeId>) -> Self {
        Self {
            name: name.into(),
            nodes,
            before: Vec::new(),
            after: None,
        }
    }
}

impl Command for SetLinkIds {
    fn name(&self) -> &str {
        &self.name
    }

    fn perform_do(&mut self, map: &mut Map) -> Result<(), DocumentError> {
        let tree = map.tree_mut();
        match &self.after {
            None => {
                let before = reset_link_ids(tree, &self.nodes)?;
                let after = before.iter().map(|(n, _)| (*n, tree.link_id(*n))).collect();
                self.before = before;
                self.after = Some(after);
            }
            Some(after) => {
                self.before = after.iter().map(|(n, _)| (*n, tree.link_id(*n))).collect();
                restore_link_ids(tree, after)?;
            }
        }
        Ok(())
    }
}

impl UndoableCommand for SetLinkIds {
    fn perform_undo(&mut self, map: &mut Map) -> Result<(), DocumentError> {
        restore_link_ids(map.tree_mut(), &self.before)?;
        Ok(())
    }
}
