// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Document error taxonomy.

use alloc::boxed::Box;
use alloc::string::String;

use brushwork_scene::{NodeId, SceneError};

/// Errors returned by commands, transactions and the history stacks.
///
/// A failed transaction leaves the document structurally identical to its state before the
/// transaction started and reports exactly one of these.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    /// A tree mutation was rejected.
    #[error(transparent)]
    Scene(#[from] SceneError),
    /// A command failed while the transaction holding it was executing; the transaction was
    /// rolled back.
    #[error("command `{name}` failed: {source}")]
    CommandFailed {
        /// Name of the failing command.
        name: String,
        /// Why it failed.
        source: Box<DocumentError>,
    },
    /// Replaying an edit into the other members of a link set failed; the transaction was
    /// rolled back.
    #[error("linked group update failed: {0}")]
    LinkPropagationFailed(String),
    /// The edit would move the node outside the world bounds.
    #[error("{0:?} would lie outside the world bounds")]
    OutOfWorldBounds(NodeId),
    /// The command needs a selection and nothing is selected.
    #[error("nothing is selected")]
    EmptySelection,
    /// The undo stack is empty.
    #[error("nothing to undo")]
    NothingToUndo,
    /// The redo stack is empty.
    #[error("nothing to redo")]
    NothingToRedo,
    /// The repeat stack is empty.
    #[error("nothing to repeat")]
    NothingToRepeat,
    /// Undo and redo are not allowed while a transaction is open.
    #[error("a transaction is in progress")]
    TransactionInProgress,
    /// Commit or rollback without an open transaction.
    #[error("no transaction is open")]
    NoTransaction,
}

impl DocumentError {
    /// The innermost error, looking through [`DocumentError::CommandFailed`].
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::CommandFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
