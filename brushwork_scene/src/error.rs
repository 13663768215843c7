// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scene error taxonomy.

use alloc::string::String;

use crate::types::NodeId;

/// Errors returned by tree mutations and linked group updates.
///
/// Every failing operation is rejected before it mutates the tree, except
/// [`SceneError::NodeNotIndexed`], which reports that the tree and the spatial index have
/// already diverged.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SceneError {
    /// The node cannot be placed under the parent: the kinds are incompatible, the move would
    /// create a cycle, or it would nest a linked group inside its own link set.
    #[error("{node:?} cannot be placed under {parent:?}")]
    InvalidHierarchy {
        /// The node being placed.
        node: NodeId,
        /// The rejected parent.
        parent: NodeId,
    },
    /// The node is guarded against removal (the default layer, the world).
    #[error("{0:?} is protected and cannot be removed")]
    ProtectedNode(NodeId),
    /// An indexed node is missing from the spatial index.
    #[error("{0:?} is not in the spatial index")]
    NodeNotIndexed(NodeId),
    /// The id is stale or was never issued by this tree.
    #[error("{0:?} does not refer to a live node")]
    NodeNotFound(NodeId),
    /// The operation requires a detached node.
    #[error("{0:?} is still attached to a parent")]
    NodeAttached(NodeId),
    /// Replaying a linked group edit would break world bounds or hierarchy rules.
    #[error("linked group update failed: {0}")]
    LinkPropagationFailed(String),
    /// The operation requires a group.
    #[error("{0:?} is not a group")]
    NotAGroup(NodeId),
    /// Replacement contents must keep the node's variant.
    #[error("replacement contents for {0:?} have a different kind")]
    KindMismatch(NodeId),
}
