// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Change notifications drained by renderers and tools.

use alloc::vec::Vec;

use crate::types::NodeId;

/// A change to nodes attached under the world.
///
/// Notifications carry ids only; consumers re-read bounds and contents from the tree.
/// Changes to detached subtrees are not reported.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    /// Subtrees rooted at these nodes were attached.
    NodesWereAdded(Vec<NodeId>),
    /// Subtrees rooted at these nodes are about to be detached.
    NodesWillBeRemoved(Vec<NodeId>),
    /// Subtrees rooted at these nodes were detached.
    NodesWereRemoved(Vec<NodeId>),
    /// The node's contents were replaced.
    NodeContentsChanged(NodeId),
    /// The node's cached physical bounds were invalidated.
    NodePhysicalBoundsChanged(NodeId),
    /// The selection changed.
    SelectionChanged {
        /// Newly selected nodes.
        selected: Vec<NodeId>,
        /// Newly deselected nodes.
        deselected: Vec<NodeId>,
    },
    /// Visibility or lock state of the node changed.
    NodeStateChanged(NodeId),
    /// The group became the current group.
    GroupWasOpened(NodeId),
    /// The group stopped being the current group.
    GroupWasClosed(NodeId),
    /// The node's link id changed.
    LinkIdChanged(NodeId),
}
