// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Link sets: diffing, cloning and id maintenance for linked groups.
//!
//! A link set is every group in the world sharing one [`LinkId`]. Objects inside the members
//! share link ids with their counterparts, which is how per-instance data (group names and
//! protected entity properties) is matched up when one member's content is replayed into the
//! others.
//!
//! Nothing here touches the undo history: [`update_linked_groups`] only builds detached
//! replacement children. Swapping them in is left to the caller.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use glam::DMat4;

use crate::bounds::BBox3;
use crate::contents::{Entity, NodeContents, rename_group};
use crate::error::SceneError;
use crate::node::has_link_id;
use crate::tree::{LinkIdPolicy, Tree};
use crate::types::{LinkId, NodeId, NodeKind};

/// Detached replacement children for one member of a link set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkedGroupUpdate {
    /// The member whose children are replaced.
    pub target: NodeId,
    /// Detached clones of the source's children, already transformed into the target's frame.
    pub children: Vec<NodeId>,
}

/// Link ids of `parent` and every group above it.
pub(crate) fn parent_link_ids(tree: &Tree, parent: NodeId) -> BTreeSet<LinkId> {
    core::iter::once(parent)
        .chain(tree.ancestors(parent))
        .filter(|id| tree.kind(*id) == Some(NodeKind::Group))
        .filter_map(|id| tree.link_id(id))
        .collect()
}

/// Link ids of every group in the subtree rooted at `root`, `root` included.
pub(crate) fn nested_link_ids(tree: &Tree, root: NodeId) -> BTreeSet<LinkId> {
    tree.descendants(root)
        .into_iter()
        .filter(|id| tree.kind(*id) == Some(NodeKind::Group))
        .filter_map(|id| tree.link_id(id))
        .collect()
}

/// Every group attached under the world, keyed by link id, in pre-order.
pub fn link_sets(tree: &Tree) -> BTreeMap<LinkId, Vec<NodeId>> {
    let mut sets: BTreeMap<LinkId, Vec<NodeId>> = BTreeMap::new();
    for id in tree.descendants(tree.world()) {
        if tree.kind(id) == Some(NodeKind::Group)
            && let Some(link) = tree.link_id(id)
        {
            sets.entry(link).or_default().push(id);
        }
    }
    sets
}

/// Members of `group`'s link set, `group` included.
pub fn collect_link_set(tree: &Tree, group: NodeId) -> Vec<NodeId> {
    let Some(link) = tree.link_id(group) else {
        return vec![group];
    };
    link_sets(tree).remove(&link).unwrap_or_else(|| vec![group])
}

fn group_transform(tree: &Tree, id: NodeId) -> Result<DMat4, SceneError> {
    match tree.contents(id) {
        Some(NodeContents::Group(g)) => Ok(g.transformation),
        Some(_) => Err(SceneError::NotAGroup(id)),
        None => Err(SceneError::NodeNotFound(id)),
    }
}

/// Replay `source`'s children into every other group in `targets`.
///
/// For each target the children of `source` are cloned (sharing link ids) and transformed by
/// `target.transformation * inverse(source.transformation)`. Group names and protected entity
/// properties already present in the target are kept, matched by link id. The clones are
/// returned detached; on error every clone created so far is destroyed.
///
/// Fails with [`SceneError::LinkPropagationFailed`] if the source transformation is not
/// invertible, if any cloned node would leave `world_bounds`, or if a replacement would nest a
/// group inside its own link set.
pub fn update_linked_groups(
    tree: &mut Tree,
    source: NodeId,
    targets: &[NodeId],
    world_bounds: BBox3,
) -> Result<Vec<LinkedGroupUpdate>, SceneError> {
    let source_transform = group_transform(tree, source)?;
    let det = source_transform.determinant();
    if det == 0.0 || !det.is_finite() {
        return Err(SceneError::LinkPropagationFailed(String::from(
            "source group transformation is not invertible",
        )));
    }
    let inverse = source_transform.inverse();

    let mut updates: Vec<LinkedGroupUpdate> = Vec::new();
    for &target in targets.iter().filter(|t| **t != source) {
        let mut children = Vec::new();
        let built = group_transform(tree, target).and_then(|target_transform| {
            clone_into_frame(
                tree,
                source,
                target,
                &(target_transform * inverse),
                world_bounds,
                &mut children,
            )
        });
        if let Err(e) = built {
            log::warn!("linked group update of {target:?} from {source:?} failed: {e}");
            for root in children
                .into_iter()
                .chain(updates.into_iter().flat_map(|u| u.children))
            {
                tree.destroy(root)?;
            }
            return Err(e);
        }
        updates.push(LinkedGroupUpdate { target, children });
    }
    log::debug!(
        "replayed {source:?} into {} linked group(s)",
        updates.len()
    );
    Ok(updates)
}

fn clone_into_frame(
    tree: &mut Tree,
    source: NodeId,
    target: NodeId,
    transform: &DMat4,
    world_bounds: BBox3,
    children: &mut Vec<NodeId>,
) -> Result<(), SceneError> {
    for child in tree.children(source).to_vec() {
        let clone = tree.clone_subtree(child, LinkIdPolicy::Preserve)?;
        children.push(clone);
        tree.transform_subtree(clone, transform)?;
    }
    preserve_instance_data(tree, target, children)?;

    let above = parent_link_ids(tree, target);
    for &clone in children.iter() {
        for id in tree.descendants(clone) {
            let within = tree
                .logical_bounds(id)
                .is_some_and(|b| world_bounds.contains(&b));
            if !within {
                return Err(SceneError::LinkPropagationFailed(format!(
                    "linked group {target:?} would extend outside the world bounds"
                )));
            }
        }
        if !nested_link_ids(tree, clone).is_disjoint(&above) {
            return Err(SceneError::LinkPropagationFailed(format!(
                "linked group {target:?} would contain a member of its own link set"
            )));
        }
    }
    Ok(())
}

/// Carry the target's group names and protected entity properties over to the clones.
fn preserve_instance_data(
    tree: &mut Tree,
    target: NodeId,
    clones: &[NodeId],
) -> Result<(), SceneError> {
    let mut names: BTreeMap<LinkId, String> = BTreeMap::new();
    let mut entities: BTreeMap<LinkId, Entity> = BTreeMap::new();
    for id in tree.descendants(target).into_iter().skip(1) {
        let Some(link) = tree.link_id(id) else {
            continue;
        };
        match tree.contents(id) {
            Some(NodeContents::Group(g)) => {
                names.insert(link, g.name.clone());
            }
            Some(NodeContents::Entity(e)) => {
                entities.insert(link, e.clone());
            }
            _ => {}
        }
    }
    if names.is_empty() && entities.is_empty() {
        return Ok(());
    }

    for &root in clones {
        for id in tree.descendants(root) {
            let (Some(link), Some(contents)) = (tree.link_id(id), tree.contents(id)) else {
                continue;
            };
            let replacement = match contents {
                NodeContents::Group(_) => names.get(&link).map(|name| {
                    let mut c = contents.clone();
                    rename_group(&mut c, name);
                    c
                }),
                NodeContents::Entity(e) => entities
                    .get(&link)
                    .map(|t| NodeContents::Entity(preserve_protected_properties(e, t))),
                _ => None,
            };
            if let Some(c) = replacement {
                tree.set_contents(id, c)?;
            }
        }
    }
    Ok(())
}

/// `source` with the protected properties of either side taken from `target`.
///
/// A protected key absent from `target` is removed. The result keeps `target`'s list of
/// protected keys.
fn preserve_protected_properties(source: &Entity, target: &Entity) -> Entity {
    let mut out = source.clone();
    let keys: BTreeSet<&str> = source
        .protected_properties
        .iter()
        .chain(&target.protected_properties)
        .map(String::as_str)
        .collect();
    for key in keys {
        match target.property(key) {
            Some(value) => out.set_property(key, value),
            None => {
                out.remove_property(key);
            }
        }
    }
    out.protected_properties = target.protected_properties.clone();
    out
}

/// Give `nodes` fresh link ids, returning the previous ones for [`restore_link_ids`].
///
/// A group is reset along with its non-group descendants; nested groups keep their ids and
/// content. Any other object is reset with all of its descendants.
pub fn reset_link_ids(
    tree: &mut Tree,
    nodes: &[NodeId],
) -> Result<Vec<(NodeId, Option<LinkId>)>, SceneError> {
    let mut previous = Vec::new();
    for &root in nodes {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(kind) = tree.kind(id) else {
                return Err(SceneError::NodeNotFound(id));
            };
            if (kind == NodeKind::Group && id != root) || !has_link_id(kind) {
                continue;
            }
            let fresh = tree.allocate_link_id();
            previous.push((id, tree.set_link_id(id, Some(fresh))?));
            stack.extend(tree.children(id).iter().copied());
        }
    }
    Ok(previous)
}

/// Put back link ids saved by [`reset_link_ids`] or [`copy_link_ids`].
pub fn restore_link_ids(
    tree: &mut Tree,
    saved: &[(NodeId, Option<LinkId>)],
) -> Result<(), SceneError> {
    for &(id, link) in saved.iter().rev() {
        tree.set_link_id(id, link)?;
    }
    Ok(())
}

/// Whether moving `node` under `new_parent` must give it fresh link ids.
///
/// Leaving a linked group, or entering a group of a different link set, breaks the
/// correspondence with the other members. Moves within one member, or between members of the
/// same link set, keep it.
pub fn should_reset_link_ids_on_reparent(tree: &Tree, node: NodeId, new_parent: NodeId) -> bool {
    let Some(old_group) = tree.containing_group(node) else {
        return false;
    };
    let new_group = if tree.kind(new_parent) == Some(NodeKind::Group) {
        Some(new_parent)
    } else {
        tree.containing_group(new_parent)
    };
    match new_group {
        None => true,
        Some(g) => tree.link_id(g) != tree.link_id(old_group),
    }
}

/// Whether two subtrees have the same shape: same kinds, same child counts, recursively.
pub fn is_structurally_consistent(tree: &Tree, a: NodeId, b: NodeId) -> bool {
    if tree.kind(a) != tree.kind(b) || tree.kind(a).is_none() {
        return false;
    }
    let (ca, cb) = (tree.children(a), tree.children(b));
    ca.len() == cb.len()
        && ca
            .iter()
            .zip(cb)
            .all(|(x, y)| is_structurally_consistent(tree, *x, *y))
}

/// Copy link ids positionally from `source`'s subtree onto `target`'s.
///
/// Returns the previous ids. Fails without changes if the subtrees differ in shape.
pub fn copy_link_ids(
    tree: &mut Tree,
    source: NodeId,
    target: NodeId,
) -> Result<Vec<(NodeId, Option<LinkId>)>, SceneError> {
    if !is_structurally_consistent(tree, source, target) {
        return Err(SceneError::LinkPropagationFailed(format!(
            "{target:?} does not match the structure of {source:?}"
        )));
    }
    let pairs: Vec<(NodeId, NodeId)> = tree
        .descendants(source)
        .into_iter()
        .zip(tree.descendants(target))
        .collect();
    let mut previous = Vec::with_capacity(pairs.len());
    for (s, t) in pairs {
        let link = tree.link_id(s);
        previous.push((t, tree.set_link_id(t, link)?));
    }
    Ok(previous)
}

/// Make every link set in the world structurally consistent.
///
/// Within each link set the member with the lowest persistent id is the reference; members
/// with the same shape take its object link ids, members with a different shape are unlinked
/// by [`reset_link_ids`]. Returns the unlinked groups. Used after bulk loads.
pub fn initialize_link_ids(tree: &mut Tree) -> Result<Vec<NodeId>, SceneError> {
    let mut unlinked = Vec::new();
    for (link, mut members) in link_sets(tree) {
        if members.len() < 2 {
            continue;
        }
        members.sort_by_key(|m| tree.persistent_id(*m));
        let source = members[0];
        for &member in &members[1..] {
            if is_structurally_consistent(tree, source, member) {
                copy_link_ids(tree, source, member)?;
            } else {
                log::warn!("unlinking {member:?} from link set {link:?}: inconsistent structure");
                reset_link_ids(tree, &[member])?;
                unlinked.push(member);
            }
        }
    }
    Ok(unlinked)
}
