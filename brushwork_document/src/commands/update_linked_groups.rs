// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::collections::BTreeSet;
use alloc::format;
use alloc::vec::Vec;

use brushwork_scene::linked_groups::{collect_link_set, link_sets, update_linked_groups};
use brushwork_scene::{LinkId, LinkedGroupUpdate, NodeId, SceneError, Tree};

use crate::command::{Command, UndoableCommand};
use crate::error::DocumentError;
use crate::map::Map;

/// Replay edits of linked groups into the other members of their link sets.
///
/// Each changed group is a source; every other member of its link set gets its children
/// replaced by transformed clones of the source's children. Sources are processed innermost
/// first, so an edit inside nested linked groups reaches every copy of the outer group too.
/// The replaced children stay detached and are swapped back on undo.
#[derive(Debug)]
pub struct UpdateLinkedGroups {
    sources: Vec<NodeId>,
    // (target, children to swap in next), in application order.
    swaps: Vec<(NodeId, Vec<NodeId>)>,
    computed: bool,
}

impl UpdateLinkedGroups {
    /// Build the update for a set of changed groups, or `None` if none of them is linked.
    ///
    /// Groups no longer in the world and groups whose link set has a single member are
    /// ignored. Two changed members of the same link set are a conflict.
    pub fn from_changes(
        map: &Map,
        changed: &BTreeSet<NodeId>,
    ) -> Result<Option<Self>, DocumentError> {
        let tree = map.tree();
        let sets = link_sets(tree);
        let mut seen: BTreeSet<LinkId> = BTreeSet::new();
        let mut sources = Vec::new();
        for &group in changed {
            if !tree.in_world(group) {
                continue;
            }
            let Some(link) = tree.link_id(group) else {
                continue;
            };
            if sets.get(&link).is_none_or(|members| members.len() < 2) {
                continue;
            }
            if !seen.insert(link) {
                return Err(DocumentError::LinkPropagationFailed(format!(
                    "more than one member of link set {link:?} was changed"
                )));
            }
            sources.push(group);
        }
        if sources.is_empty() {
            return Ok(None);
        }
        sources.sort_by_key(|g| core::cmp::Reverse(tree.depth(*g)));
        Ok(Some(Self {
            sources,
            swaps: Vec::new(),
            computed: false,
        }))
    }

    /// The groups whose content is replayed.
    pub fn sources(&self) -> &[NodeId] {
        &self.sources
    }

    fn compute(&mut self, map: &mut Map) -> Result<(), DocumentError> {
        let world_bounds = map.world_bounds();
        let tree = map.tree_mut();
        for &source in &self.sources {
            let targets = collect_link_set(tree, source);
            let updates = update_linked_groups(tree, source, &targets, world_bounds)
                .map_err(propagation_error)?;
            let mut updates = updates.into_iter();
            while let Some(LinkedGroupUpdate {
                target,
                mut children,
            }) = updates.next()
            {
                if let Err(e) = swap_children(tree, target, &mut children) {
                    for root in children
                        .into_iter()
                        .chain(updates.flat_map(|u| u.children))
                    {
                        tree.destroy(root)?;
                    }
                    return Err(propagation_error(e));
                }
                self.swaps.push((target, children));
            }
        }
        Ok(())
    }

    fn revert_and_destroy(&mut self, map: &mut Map) -> Result<(), DocumentError> {
        let tree = map.tree_mut();
        for (target, children) in self.swaps.iter_mut().rev() {
            swap_children(tree, *target, children)?;
        }
        for (_, children) in self.swaps.drain(..) {
            for root in children {
                tree.destroy(root)?;
            }
        }
        Ok(())
    }
}

fn propagation_error(e: SceneError) -> DocumentError {
    match e {
        SceneError::LinkPropagationFailed(reason) => DocumentError::LinkPropagationFailed(reason),
        other => DocumentError::Scene(other),
    }
}

/// Replace `target`'s children with `children`, leaving the old children in `children`.
fn swap_children(
    tree: &mut Tree,
    target: NodeId,
    children: &mut Vec<NodeId>,
) -> Result<(), SceneError> {
    let old = tree.children(target).to_vec();
    for &child in old.iter().rev() {
        tree.remove_child(target, child)?;
    }
    for (i, &child) in children.iter().enumerate() {
        if let Err(e) = tree.add_child(target, child) {
            for &added in children[..i].iter().rev() {
                tree.remove_child(target, added)?;
            }
            for &child in &old {
                tree.add_child(target, child)?;
            }
            return Err(e);
        }
    }
    *children = old;
    Ok(())
}

impl Command for UpdateLinkedGroups {
    fn name(&self) -> &str {
        "Update Linked Groups"
    }

    fn perform_do(&mut self, map: &mut Map) -> Result<(), DocumentError> {
        if self.computed {
            let tree = map.tree_mut();
            for (target, children) in &mut self.swaps {
                swap_children(tree, *target, children)?;
            }
            return Ok(());
        }
        if let Err(e) = self.compute(map) {
            self.revert_and_destroy(map)?;
            return Err(e);
        }
        self.computed = true;
        Ok(())
    }
}

impl UndoableCommand for UpdateLinkedGroups {
    fn perform_undo(&mut self, map: &mut Map) -> Result<(), DocumentError> {
        let tree = map.tree_mut();
        for (target, children) in self.swaps.iter_mut().rev() {
            swap_children(tree, *target, children)?;
        }
        Ok(())
    }

    fn dispose(&mut self, map: &mut Map) {
        let tree = map.tree_mut();
        for (_, children) in self.swaps.drain(..) {
            for root in children {
                if let Err(e) = tree.destroy(root) {
                    log::warn!("could not dispose {root:?}: {e}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brushwork_scene::{BBox3, Brush, Group, LinkIdPolicy};
    use glam::{DMat4, DVec3};

    fn linked_pair(map: &mut Map) -> (NodeId, NodeId, NodeId) {
        let tree = map.tree_mut();
        let layer = tree.default_layer();
        let g1 = tree.create(Group::new("g").into());
        let b = tree.create(Brush::cuboid(BBox3::cube(8.0), "rock").into());
        tree.add_child(g1, b).expect("attach");
        tree.add_child(layer, g1).expect("attach");
        let g2 = tree.clone_subtree(g1, LinkIdPolicy::Preserve).expect("live");
        tree.transform_subtree(g2, &DMat4::from_translation(DVec3::X * 100.0))
            .expect("live");
        tree.add_child(layer, g2).expect("attach");
        tree.take_pending_link_changes();
        (g1, g2, b)
    }

    #[test]
    fn unlinked_changes_need_no_update() {
        let mut map = Map::default();
        let layer = map.tree().default_layer();
        let g = map.tree_mut().create(Group::new("solo").into());
        map.tree_mut().add_child(layer, g).expect("attach");
        let changed = BTreeSet::from([g]);
        assert!(
            UpdateLinkedGroups::from_changes(&map, &changed)
                .expect("no conflict")
                .is_none()
        );
    }

    #[test]
    fn two_changed_members_conflict() {
        let mut map = Map::default();
        let (g1, g2, _) = linked_pair(&mut map);
        let changed = BTreeSet::from([g1, g2]);
        assert!(matches!(
            UpdateLinkedGroups::from_changes(&map, &changed),
            Err(DocumentError::LinkPropagationFailed(_))
        ));
    }

    #[test]
    fn replays_and_swaps_back_on_undo() {
        let mut map = Map::default();
        let (g1, g2, b) = linked_pair(&mut map);
        let old_child = map.tree().children(g2)[0];
        let moved = Brush::cuboid(BBox3::cube(8.0).translate(DVec3::Z * 16.0), "rock");
        map.tree_mut().set_contents(b, moved.into()).expect("same kind");
        let changed = map.tree_mut().take_pending_link_changes();

        let mut update = UpdateLinkedGroups::from_changes(&map, &changed)
            .expect("no conflict")
            .expect("g1 is linked");
        assert_eq!(update.sources(), [g1]);
        update.perform_do(&mut map).expect("replay");
        let new_child = map.tree().children(g2)[0];
        assert_ne!(new_child, old_child);
        let expected = BBox3::cube(8.0).translate(DVec3::new(100.0, 0.0, 16.0));
        assert!(
            map.tree()
                .logical_bounds(new_child)
                .is_some_and(|bb| bb.abs_diff_eq(&expected, 1e-9)),
            "replayed in the target's frame"
        );

        update.perform_undo(&mut map).expect("undo");
        assert_eq!(map.tree().children(g2), [old_child]);
        update.perform_do(&mut map).expect("redo");
        assert_eq!(map.tree().children(g2), [new_child]);
    }
}
