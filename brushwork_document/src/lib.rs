// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=brushwork_document --heading-base-level=0

//! Brushwork Document: undoable editing of a [`brushwork_scene`] tree.
//!
//! ## Overview
//!
//! A [`Document`] pairs a [`Map`] (the tree plus its [`DocumentOptions`]) with a
//! [`CommandProcessor`] holding the undo, redo and repeat history. Every edit is a command:
//! a value implementing [`UndoableCommand`] that can perform and revert itself.
//!
//! ## Transactions
//!
//! Commands run inside transactions. A transaction either commits as one undo step or is
//! rolled back completely; a failed command leaves the map as it was before the transaction
//! started. Linked-group-aware transactions finish by replaying edits of linked groups into
//! the other members of their link sets ([`commands::UpdateLinkedGroups`]). If that replay
//! fails, the transaction is rolled back as well.
//!
//! ## Repeat
//!
//! Commands that can be reapplied to a new selection, such as moves and duplicates, are
//! recorded on a repeat stack that [`Document::repeat_commands`] replays. Selection changes
//! start a new repeat history; undo and redo clear it.
//!
//! ## Example
//!
//! ```rust
//! use brushwork_document::Document;
//! use brushwork_scene::{BBox3, Brush};
//! use glam::DVec3;
//!
//! let mut doc = Document::default();
//! let layer = doc.tree().default_layer();
//! let brush = doc
//!     .add_node(layer, Brush::cuboid(BBox3::cube(8.0), "rock").into())
//!     .unwrap();
//!
//! doc.select(&[brush]).unwrap();
//! doc.translate_selection(DVec3::X * 16.0).unwrap();
//! assert_eq!(doc.tree().logical_bounds(brush).unwrap().min.x, 8.0);
//!
//! // Repeating applies the move again; adjacent moves collate into one undo step.
//! doc.repeat_commands().unwrap();
//! assert_eq!(doc.tree().logical_bounds(brush).unwrap().min.x, 24.0);
//!
//! doc.undo().unwrap();
//! assert_eq!(doc.tree().logical_bounds(brush).unwrap().min.x, -8.0);
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod command;
pub mod commands;
mod document;
mod error;
mod map;
mod options;
mod processor;
mod transaction;

pub use command::{Command, CommandState, Repeater, UndoableCommand};
pub use document::Document;
pub use error::DocumentError;
pub use map::Map;
pub use options::{DEFAULT_WORLD_EXTENT, DocumentOptions};
pub use processor::{CommandNotification, CommandProcessor};
pub use transaction::{Transaction, TransactionScope};
