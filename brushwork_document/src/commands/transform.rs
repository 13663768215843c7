// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::any::Any;

use brushwork_scene::{NodeContents, NodeId, Tree};
use glam::DMat4;

use super::{check_world_bounds, topmost};
use crate::command::{Command, Repeater, UndoableCommand};
use crate::error::DocumentError;
use crate::map::Map;

/// Apply an affine transformation to subtrees.
///
/// Adjacent transforms of the same nodes collate into one undo step. Transforming a whole
/// group does not count as editing the group's content, so a linked group can be moved on its
/// own without touching the rest of its link set.
#[derive(Debug)]
pub struct TransformNodes {
    name: String,
    nodes: Vec<NodeId>,
    transform: DMat4,
    // (root, node, contents before the first perform)
    snapshot: Vec<(NodeId, NodeId, NodeContents)>,
}

impl TransformNodes {
    /// Transform `nodes` (and their descendants) by `transform`.
    pub fn new(name: impl Into<String>, tree: &Tree, nodes: &[NodeId], transform: DMat4) -> Self {
        Self {
            name: name.into(),
            nodes: topmost(tree, nodes),
            transform,
            snapshot: Vec::new(),
        }
    }

    /// Accumulated transformation.
    pub fn transform(&self) -> DMat4 {
        self.transform
    }

    fn restore(&self, map: &mut Map) -> Result<(), DocumentError> {
        let tree = map.tree_mut();
        for (root, id, contents) in self.snapshot.iter().rev() {
            tree.set_contents_within(*root, *id, contents.clone())?;
        }
        Ok(())
    }
}

impl Command for TransformNodes {
    fn name(&self) -> &str {
        &self.name
    }

    fn perform_do(&mut self, map: &mut Map) -> Result<(), DocumentError> {
        let tree = map.tree_mut();
        self.snapshot.clear();
        for &root in &self.nodes {
            for id in tree.descendants(root) {
                let Some(old) = tree.contents(id).cloned() else {
                    continue;
                };
                let new = old.transformed(&self.transform);
                self.snapshot.push((root, id, old));
                if let Err(e) = tree.set_contents_within(root, id, new) {
                    self.snapshot.pop();
                    self.restore(map)?;
                    return Err(e.into());
                }
            }
        }
        if let Err(e) = check_world_bounds(map, &self.nodes) {
            self.restore(map)?;
            return Err(e);
        }
        Ok(())
    }
}

impl UndoableCommand for TransformNodes {
    fn perform_undo(&mut self, map: &mut Map) -> Result<(), DocumentError> {
        self.restore(map)
    }

    fn collate_with(&mut self, other: &dyn UndoableCommand) -> bool {
        let other: &dyn Any = other;
        match other.downcast_ref::<Self>() {
            Some(o) if o.nodes == self.nodes => {
                self.transform = o.transform * self.transform;
                true
            }
            _ => false,
        }
    }

    fn repeater(&self) -> Option<Box<dyn Repeater>> {
        Some(Box::new(TransformRepeater {
            name: self.name.clone(),
            transform: self.transform,
        }))
    }
}

/// Applies a recorded transformation to the current selection.
#[derive(Debug)]
pub(crate) struct TransformRepeater {
    name: String,
    transform: DMat4,
}

impl Repeater for TransformRepeater {
    fn repeat(&self, map: &Map) -> Result<Box<dyn UndoableCommand>, DocumentError> {
        let selected = map.tree().selection().nodes();
        if selected.is_empty() {
            return Err(DocumentError::EmptySelection);
        }
        Ok(Box::new(TransformNodes::new(
            self.name.clone(),
            map.tree(),
            selected,
            self.transform,
        )))
    }
}
