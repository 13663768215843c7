// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

use brushwork_scene::{LinkIdPolicy, NodeId, Tree};

use super::topmost;
use crate::command::{Command, Repeater, UndoableCommand};
use crate::error::DocumentError;
use crate::map::Map;

/// Copy subtrees next to their originals and select the copies.
///
/// Copies get fresh link ids, so duplicating a linked group yields an independent group.
/// Redo reattaches the same copies.
#[derive(Debug)]
pub struct DuplicateNodes {
    name: String,
    originals: Vec<NodeId>,
    // (parent, copy)
    copies: Vec<(NodeId, NodeId)>,
    previous_selection: Vec<NodeId>,
    attached: bool,
}

impl DuplicateNodes {
    /// Duplicate `nodes`; nested nodes are copied along with their topmost selected ancestor.
    pub fn new(tree: &Tree, nodes: &[NodeId]) -> Self {
        Self {
            name: String::from("Duplicate Objects"),
            originals: topmost(tree, nodes),
            copies: Vec::new(),
            previous_selection: Vec::new(),
            attached: false,
        }
    }

    /// The copies, once performed.
    pub fn copies(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.copies.iter().map(|(_, c)| *c)
    }

    fn make_copies(&mut self, tree: &mut Tree) -> Result<(), DocumentError> {
        for &original in &self.originals {
            let Some(parent) = tree.parent(original) else {
                continue;
            };
            match tree.clone_subtree(original, LinkIdPolicy::Fresh) {
                Ok(copy) => self.copies.push((parent, copy)),
                Err(e) => {
                    for (_, copy) in self.copies.drain(..) {
                        tree.destroy(copy)?;
                    }
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }
}

impl Command for DuplicateNodes {
    fn name(&self) -> &str {
        &self.name
    }

    fn perform_do(&mut self, map: &mut Map) -> Result<(), DocumentError> {
        let tree = map.tree_mut();
        let first = self.copies.is_empty();
        if first {
            self.make_copies(tree)?;
        }
        self.previous_selection = tree.selection().nodes().to_vec();
        for i in 0..self.copies.len() {
            let (parent, copy) = self.copies[i];
            if let Err(e) = tree.add_child(parent, copy) {
                for &(p, c) in self.copies[..i].iter().rev() {
                    tree.remove_child(p, c)?;
                }
                if first {
                    for (_, c) in self.copies.drain(..) {
                        tree.destroy(c)?;
                    }
                }
                return Err(e.into());
            }
        }
        tree.deselect_all()?;
        let copies: Vec<NodeId> = self.copies().collect();
        tree.select(&copies)?;
        self.attached = true;
        Ok(())
    }
}

impl UndoableCommand for DuplicateNodes {
    fn perform_undo(&mut self, map: &mut Map) -> Result<(), DocumentError> {
        let tree = map.tree_mut();
        for &(parent, copy) in self.copies.iter().rev() {
            tree.remove_child(parent, copy)?;
        }
        self.attached = false;
        tree.select(&self.previous_selection)?;
        Ok(())
    }

    fn repeater(&self) -> Option<Box<dyn Repeater>> {
        Some(Box::new(DuplicateRepeater))
    }

    fn dispose(&mut self, map: &mut Map) {
        if self.attached {
            return;
        }
        let tree = map.tree_mut();
        for (_, copy) in self.copies.drain(..) {
            if let Err(e) = tree.destroy(copy) {
                log::warn!("could not dispose {copy:?}: {e}");
            }
        }
    }
}

/// Duplicates the current selection.
#[derive(Debug)]
pub(crate) struct DuplicateRepeater;

impl Repeater for DuplicateRepeater {
    fn repeat(&self, map: &Map) -> Result<Box<dyn UndoableCommand>, DocumentError> {
        let selected = map.tree().selection().nodes();
        if selected.is_empty() {
            return Err(DocumentError::EmptySelection);
        }
        Ok(Box::new(DuplicateNodes::new(map.tree(), selected)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brushwork_scene::{BBox3, Brush, Group};

    #[test]
    fn copies_are_selected_and_unlinked() {
        let mut map = Map::default();
        let tree = map.tree_mut();
        let layer = tree.default_layer();
        let g = tree.create(Group::new("g").into());
        let b = tree.create(Brush::cuboid(BBox3::cube(1.0), "a").into());
        tree.add_child(g, b).expect("attach");
        tree.add_child(layer, g).expect("attach");
        tree.select(&[g]).expect("live");

        let mut cmd = DuplicateNodes::new(map.tree(), &[g]);
        cmd.perform_do(&mut map).expect("duplicate");
        let copy = cmd.copies().next().expect("one copy");
        let tree = map.tree();
        assert_eq!(tree.children(layer), [g, copy]);
        assert_eq!(tree.selection().nodes(), [copy]);
        assert_ne!(tree.link_id(copy), tree.link_id(g));
        let inner = tree.children(copy)[0];
        assert_ne!(tree.link_id(inner), tree.link_id(b));

        cmd.perform_undo(&mut map).expect("undo");
        assert_eq!(map.tree().children(layer), [g]);
        assert_eq!(map.tree().selection().nodes(), [g]);
        cmd.perform_do(&mut map).expect("redo");
        assert_eq!(map.tree().children(layer), [g, copy], "redo reuses the copy");
    }
}
