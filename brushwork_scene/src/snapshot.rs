// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Value snapshots of subtrees, for comparing document states.

use alloc::vec::Vec;

use crate::bounds::NodeBounds;
use crate::contents::NodeContents;
use crate::tree::Tree;
use crate::types::{LinkId, LockState, NodeId, NodeKind, PersistentId, VisibilityState};

/// Observable state of a node and its subtree.
///
/// Selection and group edit state are left out; they are not part of the document content.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeSnapshot {
    /// Variant tag.
    pub kind: NodeKind,
    /// Contents.
    pub contents: NodeContents,
    /// Persistent id.
    pub persistent_id: Option<PersistentId>,
    /// Link id.
    pub link_id: Option<LinkId>,
    /// Local visibility.
    pub visibility: VisibilityState,
    /// Local lock state.
    pub lock: LockState,
    /// Bounds.
    pub bounds: NodeBounds,
    /// Children in order.
    pub children: Vec<NodeSnapshot>,
}

impl NodeSnapshot {
    /// Compare shape, link ids and bounds, allowing `epsilon` of drift in coordinates.
    ///
    /// Persistent ids and contents are ignored, so two members of a link set compare equal
    /// once one is moved onto the other.
    pub fn matches_linked(&self, other: &Self, epsilon: f64) -> bool {
        self.kind == other.kind
            && self.link_id == other.link_id
            && self
                .bounds
                .logical
                .abs_diff_eq(&other.bounds.logical, epsilon)
            && self.children.len() == other.children.len()
            && self
                .children
                .iter()
                .zip(&other.children)
                .all(|(a, b)| a.matches_linked(b, epsilon))
    }
}

impl Tree {
    /// Snapshot of the subtree rooted at `id`.
    pub fn snapshot(&self, id: NodeId) -> Option<NodeSnapshot> {
        let n = self.node(id)?;
        Some(NodeSnapshot {
            kind: n.kind(),
            contents: n.contents.clone(),
            persistent_id: n.persistent_id,
            link_id: n.link_id,
            visibility: n.visibility,
            lock: n.lock,
            bounds: self.bounds(id)?,
            children: n
                .children
                .iter()
                .filter_map(|c| self.snapshot(*c))
                .collect(),
        })
    }
}
