// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::collections::BTreeSet;
use alloc::string::String;
use alloc::vec::Vec;

use brushwork_scene::{NodeId, Tree, remove_if_empty};

use crate::command::{Command, UndoableCommand};
use crate::error::DocumentError;
use crate::map::Map;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Action {
    Add,
    Remove,
}

/// Attach or detach subtrees.
///
/// Removal also takes along groups and brush entities that would be left empty. Nodes stay
/// alive while detached so undo can put them back at their old positions; they are destroyed
/// when the command is disposed in the detached state.
#[derive(Debug)]
pub struct AddRemoveNodes {
    name: String,
    action: Action,
    // (parent, child, index), index refreshed on every detach
    entries: Vec<(NodeId, NodeId, usize)>,
    // selected nodes inside the subtrees at the last detach
    selection: Vec<NodeId>,
    attached: bool,
}

impl AddRemoveNodes {
    /// Attach each detached child to its parent, appended.
    pub fn add(nodes: Vec<(NodeId, NodeId)>) -> Self {
        Self {
            name: String::from("Add Objects"),
            action: Action::Add,
            entries: nodes.into_iter().map(|(p, c)| (p, c, usize::MAX)).collect(),
            selection: Vec::new(),
            attached: false,
        }
    }

    /// Detach `nodes` and every container they would leave empty.
    pub fn remove(tree: &Tree, nodes: &[NodeId]) -> Self {
        let entries = removal_set(tree, nodes)
            .into_iter()
            .filter_map(|n| Some((tree.parent(n)?, n, 0)))
            .collect();
        Self {
            name: String::from("Remove Objects"),
            action: Action::Remove,
            entries,
            selection: Vec::new(),
            attached: true,
        }
    }

    /// The subtree roots this command adds or removes.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.entries.iter().map(|(_, c, _)| *c)
    }

    fn attach(&mut self, map: &mut Map) -> Result<(), DocumentError> {
        let tree = map.tree_mut();
        for i in 0..self.entries.len() {
            let (parent, child, index) = self.entries[i];
            if let Err(e) = tree.insert_child(parent, index, child) {
                for &(p, c, _) in self.entries[..i].iter().rev() {
                    tree.remove_child(p, c)?;
                }
                return Err(e.into());
            }
        }
        tree.select(&self.selection)?;
        self.attached = true;
        Ok(())
    }

    fn detach(&mut self, map: &mut Map) -> Result<(), DocumentError> {
        let tree = map.tree_mut();
        let selected: BTreeSet<NodeId> = tree.selection().nodes().iter().copied().collect();
        self.selection = self
            .entries
            .iter()
            .flat_map(|(_, c, _)| tree.descendants(*c))
            .filter(|n| selected.contains(n))
            .collect();
        let n = self.entries.len();
        for i in (0..n).rev() {
            let (parent, child, _) = self.entries[i];
            match tree.remove_child(parent, child) {
                Ok(index) => self.entries[i].2 = index,
                Err(e) => {
                    for &(p, c, index) in &self.entries[i + 1..] {
                        tree.insert_child(p, index, c)?;
                    }
                    return Err(e.into());
                }
            }
        }
        self.attached = false;
        Ok(())
    }
}

/// Topmost nodes to detach, in tree order, including parents that would be left empty.
fn removal_set(tree: &Tree, nodes: &[NodeId]) -> Vec<NodeId> {
    let mut set: BTreeSet<NodeId> = nodes
        .iter()
        .copied()
        .filter(|n| tree.parent(*n).is_some())
        .collect();
    loop {
        let parents: BTreeSet<NodeId> = set.iter().filter_map(|n| tree.parent(*n)).collect();
        let emptied: Vec<NodeId> = parents
            .into_iter()
            .filter(|p| {
                !set.contains(p)
                    && tree.parent(*p).is_some()
                    && tree.kind(*p).is_some_and(remove_if_empty)
                    && tree.children(*p).iter().all(|c| set.contains(c))
            })
            .collect();
        if emptied.is_empty() {
            break;
        }
        set.extend(emptied);
    }
    tree.descendants(tree.world())
        .into_iter()
        .filter(|n| set.contains(n) && !tree.ancestors(*n).iter().any(|a| set.contains(a)))
        .collect()
}

impl Command for AddRemoveNodes {
    fn name(&self) -> &str {
        &self.name
    }

    fn perform_do(&mut self, map: &mut Map) -> Result<(), DocumentError> {
        match self.action {
            Action::Add => self.attach(map),
            Action::Remove => self.detach(map),
        }
    }
}

impl UndoableCommand for AddRemoveNodes {
    fn perform_undo(&mut self, map: &mut Map) -> Result<(), DocumentError> {
        match self.action {
            Action::Add => self.detach(map),
            Action::Remove => self.attach(map),
        }
    }

    fn dispose(&mut self, map: &mut Map) {
        if self.attached {
            return;
        }
        let tree = map.tree_mut();
        for &(_, child, _) in &self.entries {
            if tree.is_alive(child)
                && tree.parent(child).is_none()
                && let Err(e) = tree.destroy(child)
            {
                log::warn!("could not dispose {child:?}: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brushwork_scene::{BBox3, Brush, Entity, Group};

    #[test]
    fn removing_last_child_takes_empty_containers_along() {
        let mut map = Map::default();
        let tree = map.tree_mut();
        let layer = tree.default_layer();
        let group = tree.create(Group::new("g").into());
        let entity = tree.create(Entity::with_classname("func_door").into());
        let brush = tree.create(Brush::cuboid(BBox3::cube(4.0), "door").into());
        tree.add_child(entity, brush).expect("attach");
        tree.add_child(group, entity).expect("attach");
        tree.add_child(layer, group).expect("attach");

        let mut cmd = AddRemoveNodes::remove(map.tree(), &[brush]);
        assert_eq!(cmd.nodes().collect::<Vec<_>>(), [group]);
        cmd.perform_do(&mut map).expect("remove");
        assert!(map.tree().children(layer).is_empty());
        cmd.perform_undo(&mut map).expect("restore");
        assert_eq!(map.tree().children(layer), [group]);
        assert_eq!(map.tree().children(entity), [brush]);
    }

    #[test]
    fn layers_are_never_removed_as_empty_parents() {
        let mut map = Map::default();
        let tree = map.tree_mut();
        let layer = tree.default_layer();
        let brush = tree.create(Brush::cuboid(BBox3::cube(4.0), "a").into());
        tree.add_child(layer, brush).expect("attach");
        let cmd = AddRemoveNodes::remove(map.tree(), &[brush]);
        assert_eq!(cmd.nodes().collect::<Vec<_>>(), [brush]);
    }

    #[test]
    fn undo_restores_order_and_selection() {
        let mut map = Map::default();
        let tree = map.tree_mut();
        let layer = tree.default_layer();
        let bs: Vec<_> = (0..3)
            .map(|i| {
                let b = tree.create(Brush::cuboid(BBox3::cube(f64::from(i) + 1.0), "a").into());
                tree.add_child(layer, b).expect("attach");
                b
            })
            .collect();
        tree.select(&[bs[1]]).expect("live");
        let mut cmd = AddRemoveNodes::remove(map.tree(), &[bs[1]]);
        cmd.perform_do(&mut map).expect("remove");
        assert!(map.tree().selection().is_empty());
        cmd.perform_undo(&mut map).expect("restore");
        assert_eq!(map.tree().children(layer), bs.as_slice());
        assert_eq!(map.tree().selection().nodes(), [bs[1]]);
    }

    #[test]
    fn disposing_undone_add_destroys_nodes() {
        let mut map = Map::default();
        let layer = map.tree().default_layer();
        let b = map
            .tree_mut()
            .create(Brush::cuboid(BBox3::cube(1.0), "a").into());
        let mut cmd = AddRemoveNodes::add(alloc::vec![(layer, b)]);
        cmd.perform_do(&mut map).expect("add");
        cmd.perform_undo(&mut map).expect("undo");
        cmd.dispose(&mut map);
        assert!(!map.tree().is_alive(b));
    }
}
