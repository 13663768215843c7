// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Exhaustive per-variant dispatch over node contents.

use crate::contents::{Brush, Entity, Group, Layer, Patch, WorldData};
use crate::tree::Tree;
use crate::types::NodeId;

/// One method per node variant, called by [`Tree::accept`].
///
/// Every method is required, so adding a variant is a compile error at every visitor.
pub trait NodeVisitor {
    /// Value produced per visited node.
    type Output;

    /// Visit the world.
    fn visit_world(&mut self, tree: &Tree, id: NodeId, world: &WorldData) -> Self::Output;
    /// Visit a layer.
    fn visit_layer(&mut self, tree: &Tree, id: NodeId, layer: &Layer) -> Self::Output;
    /// Visit a group.
    fn visit_group(&mut self, tree: &Tree, id: NodeId, group: &Group) -> Self::Output;
    /// Visit an entity.
    fn visit_entity(&mut self, tree: &Tree, id: NodeId, entity: &Entity) -> Self::Output;
    /// Visit a brush.
    fn visit_brush(&mut self, tree: &Tree, id: NodeId, brush: &Brush) -> Self::Output;
    /// Visit a patch.
    fn visit_patch(&mut self, tree: &Tree, id: NodeId, patch: &Patch) -> Self::Output;
}
