// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::vec::Vec;

use brushwork_scene::NodeId;

use crate::command::{Command, UndoableCommand};
use crate::error::DocumentError;
use crate::map::Map;

/// What a [`SelectionCommand`] does.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectionAction {
    /// Add nodes to the selection.
    Select(Vec<NodeId>),
    /// Remove nodes from the selection.
    Deselect(Vec<NodeId>),
    /// Clear the selection.
    DeselectAll,
    /// Clear the selection, then select nodes.
    Replace(Vec<NodeId>),
}

/// Change the selection. Undo restores the previous selection.
///
/// Selection changes delimit the repeat history: commands repeated after a selection change
/// apply to the new selection.
#[derive(Debug)]
pub struct SelectionCommand {
    action: SelectionAction,
    previous: Vec<NodeId>,
}

impl SelectionCommand {
    /// Create a selection change.
    pub fn new(action: SelectionAction) -> Self {
        Self {
            action,
            previous: Vec::new(),
        }
    }
}

impl Command for SelectionCommand {
    fn name(&self) -> &str {
        match self.action {
            SelectionAction::Select(_) | SelectionAction::Replace(_) => "Select Objects",
            SelectionAction::Deselect(_) => "Deselect Objects",
            SelectionAction::DeselectAll => "Select None",
        }
    }

    fn perform_do(&mut self, map: &mut Map) -> Result<(), DocumentError> {
        let tree = map.tree_mut();
        self.previous = tree.selection().nodes().to_vec();
        match &self.action {
            SelectionAction::Select(nodes) => tree.select(nodes)?,
            SelectionAction::Deselect(nodes) => tree.deselect(nodes)?,
            SelectionAction::DeselectAll => tree.deselect_all()?,
            SelectionAction::Replace(nodes) => {
                tree.deselect_all()?;
                tree.select(nodes)?;
            }
        }
        Ok(())
    }
}

impl UndoableCommand for SelectionCommand {
    fn perform_undo(&mut self, map: &mut Map) -> Result<(), DocumentError> {
        let tree = map.tree_mut();
        tree.deselect_all()?;
        tree.select(&self.previous)?;
        Ok(())
    }

    fn is_repeat_delimiter(&self) -> bool {
        true
    }
}
