// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Incrementally maintained classification of the selected nodes.

use alloc::vec::Vec;

use crate::types::{NodeId, NodeKind};

/// Selected nodes, in selection order, split by kind.
///
/// Updated by the tree whenever a node is selected, deselected, or detached while selected;
/// never recomputed by walking the tree.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    nodes: Vec<NodeId>,
    groups: Vec<NodeId>,
    entities: Vec<NodeId>,
    brushes: Vec<NodeId>,
    patches: Vec<NodeId>,
}

impl Selection {
    fn bucket_mut(&mut self, kind: NodeKind) -> Option<&mut Vec<NodeId>> {
        match kind {
            NodeKind::Group => Some(&mut self.groups),
            NodeKind::Entity => Some(&mut self.entities),
            NodeKind::Brush => Some(&mut self.brushes),
            NodeKind::Patch => Some(&mut self.patches),
            NodeKind::World | NodeKind::Layer => None,
        }
    }

    pub(crate) fn on_selected(&mut self, id: NodeId, kind: NodeKind) {
        if let Some(bucket) = self.bucket_mut(kind) {
            bucket.push(id);
            self.nodes.push(id);
        }
    }

    pub(crate) fn on_deselected(&mut self, id: NodeId, kind: NodeKind) {
        if let Some(bucket) = self.bucket_mut(kind) {
            bucket.retain(|n| *n != id);
            self.nodes.retain(|n| *n != id);
        }
    }

    /// All selected nodes in selection order.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Selected groups.
    pub fn groups(&self) -> &[NodeId] {
        &self.groups
    }

    /// Selected entities.
    pub fn entities(&self) -> &[NodeId] {
        &self.entities
    }

    /// Selected brushes.
    pub fn brushes(&self) -> &[NodeId] {
        &self.brushes
    }

    /// Selected patches.
    pub fn patches(&self) -> &[NodeId] {
        &self.patches
    }

    /// Whether anything is selected.
    pub fn has_nodes(&self) -> bool {
        !self.nodes.is_empty()
    }

    /// Whether the selection is non-empty and holds only brushes.
    pub fn has_only_brushes(&self) -> bool {
        !self.brushes.is_empty() && self.brushes.len() == self.nodes.len()
    }

    /// Whether the selection is non-empty and holds only groups.
    pub fn has_only_groups(&self) -> bool {
        !self.groups.is_empty() && self.groups.len() == self.nodes.len()
    }

    /// Whether the selection is non-empty and holds only entities.
    pub fn has_only_entities(&self) -> bool {
        !self.entities.is_empty() && self.entities.len() == self.nodes.len()
    }

    /// Whether brushes or patches are selected.
    pub fn has_geometry(&self) -> bool {
        !self.brushes.is_empty() || !self.patches.is_empty()
    }

    /// Number of selected nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_kinds_and_order() {
        let mut s = Selection::default();
        let b = NodeId::new(4, 1);
        let e = NodeId::new(2, 1);
        s.on_selected(b, NodeKind::Brush);
        assert!(s.has_only_brushes());
        s.on_selected(e, NodeKind::Entity);
        assert!(!s.has_only_brushes());
        assert_eq!(s.nodes(), [b, e], "selection order is kept");
        s.on_deselected(b, NodeKind::Brush);
        assert!(s.has_only_entities());
        s.on_selected(NodeId::new(0, 1), NodeKind::Layer);
        assert_eq!(s.len(), 1, "layers are never selected");
    }
}
