// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::vec::Vec;

use brushwork_scene::{LockState, NodeId, VisibilityState};

use crate::command::{Command, UndoableCommand};
use crate::error::DocumentError;
use crate::map::Map;

/// Which group to edit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CurrentGroupChange {
    /// Open a group, nested in the currently open one or anywhere else.
    Open(NodeId),
    /// Close the current group, reopening its containing group.
    Close,
}

/// Open or close a group for editing. Opening deselects everything.
#[derive(Debug)]
pub struct CurrentGroupCommand {
    change: CurrentGroupChange,
    previous_group: Option<NodeId>,
    previous_selection: Vec<NodeId>,
}

impl CurrentGroupCommand {
    /// Create a group change.
    pub fn new(change: CurrentGroupChange) -> Self {
        Self {
            change,
            previous_group: None,
            previous_selection: Vec::new(),
        }
    }
}

impl Command for CurrentGroupCommand {
    fn name(&self) -> &str {
        match self.change {
            CurrentGroupChange::Open(_) => "Open Group",
            CurrentGroupChange::Close => "Close Group",
        }
    }

    fn perform_do(&mut self, map: &mut Map) -> Result<(), DocumentError> {
        let tree = map.tree_mut();
        let target = match self.change {
            CurrentGroupChange::Open(group) => Some(group),
            CurrentGroupChange::Close => tree.current_group().and_then(|g| tree.containing_group(g)),
        };
        self.previous_selection = tree.selection().nodes().to_vec();
        self.previous_group = tree.set_current_group(target)?;
        tree.deselect_all()?;
        Ok(())
    }
}

impl UndoableCommand for CurrentGroupCommand {
    fn perform_undo(&mut self, map: &mut Map) -> Result<(), DocumentError> {
        let tree = map.tree_mut();
        tree.set_current_group(self.previous_group)?;
        tree.select(&self.previous_selection)?;
        Ok(())
    }
}

/// A visibility or lock change.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NodeStateChange {
    /// Set the local visibility state.
    Visibility(VisibilityState),
    /// Set the local lock state.
    Lock(LockState),
}

/// Hide, show, lock or unlock nodes.
///
/// Nodes that end up hidden or locked are deselected; undo selects them again.
#[derive(Debug)]
pub struct SetNodeState {
    nodes: Vec<NodeId>,
    change: NodeStateChange,
    previous: Vec<NodeStateChange>,
    deselected: Vec<NodeId>,
}

impl SetNodeState {
    /// Apply `change` to each of `nodes`.
    pub fn new(nodes: Vec<NodeId>, change: NodeStateChange) -> Self {
        Self {
            nodes,
            change,
            previous: Vec::new(),
            deselected: Vec::new(),
        }
    }
}

impl Command for SetNodeState {
    fn name(&self) -> &str {
        match self.change {
            NodeStateChange::Visibility(VisibilityState::Hidden) => "Hide Objects",
            NodeStateChange::Visibility(_) => "Show Objects",
            NodeStateChange::Lock(LockState::Locked) => "Lock Objects",
            NodeStateChange::Lock(_) => "Unlock Objects",
        }
    }

    fn perform_do(&mut self, map: &mut Map) -> Result<(), DocumentError> {
        let tree = map.tree_mut();
        self.previous.clear();
        for &id in &self.nodes {
            let old = match self.change {
                NodeStateChange::Visibility(state) => {
                    tree.set_visibility(id, state).map(NodeStateChange::Visibility)
                }
                NodeStateChange::Lock(state) => tree.set_lock(id, state).map(NodeStateChange::Lock),
            };
            match old {
                Ok(old) => self.previous.push(old),
                Err(e) => {
                    restore(map, &self.nodes, &self.previous)?;
                    self.previous.clear();
                    return Err(e.into());
                }
            }
        }
        let tree = map.tree_mut();
        self.deselected = tree
            .selection()
            .nodes()
            .iter()
            .copied()
            .filter(|&n| !tree.is_visible(n) || tree.is_locked(n))
            .collect();
        tree.deselect(&self.deselected)?;
        Ok(())
    }
}

fn restore(map: &mut Map, nodes: &[NodeId], previous: &[NodeStateChange]) -> Result<(), DocumentError> {
    let tree = map.tree_mut();
    for (&id, &state) in nodes.iter().zip(previous).rev() {
        match state {
            NodeStateChange::Visibility(v) => {
                tree.set_visibility(id, v)?;
            }
            NodeStateChange::Lock(l) => {
                tree.set_lock(id, l)?;
            }
        }
    }
    Ok(())
}

impl UndoableCommand for SetNodeState {
    fn perform_undo(&mut self, map: &mut Map) -> Result<(), DocumentError> {
        restore(map, &self.nodes, &self.previous)?;
        map.tree_mut().select(&self.deselected)?;
        Ok(())
    }
}
