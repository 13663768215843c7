// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Command traits.
//!
//! ## Overview
//!
//! A [`Command`] mutates a [`Map`]. An [`UndoableCommand`] can also revert itself and is what
//! the [`CommandProcessor`](crate::CommandProcessor) stores in its history. Commands refer to
//! nodes by [`NodeId`](brushwork_scene::NodeId); nodes a command detaches stay alive (and
//! owned by the command) until it is undone or disposed.
//!
//! ## Lifecycle
//!
//! `Unexecuted → Done → Undone → Done → …`. The processor only calls
//! [`Command::perform_do`] on an unexecuted or undone command and
//! [`UndoableCommand::perform_undo`] on a done one. A command whose `perform_do` fails must
//! leave the map unchanged.

use alloc::boxed::Box;
use core::any::Any;
use core::fmt::Debug;

use crate::error::DocumentError;
use crate::map::Map;

/// Lifecycle state of a stored command.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CommandState {
    /// Created, never performed.
    Unexecuted,
    /// Performed (or redone).
    Done,
    /// Reverted.
    Undone,
}

/// A named mutation of the map.
pub trait Command: Debug {
    /// Display name, shown in undo/redo menus.
    fn name(&self) -> &str;

    /// Apply the command. On error the map must be unchanged.
    fn perform_do(&mut self, map: &mut Map) -> Result<(), DocumentError>;
}

/// A command that can revert itself.
pub trait UndoableCommand: Command + Any {
    /// Revert the effect of the last [`Command::perform_do`].
    fn perform_undo(&mut self, map: &mut Map) -> Result<(), DocumentError>;

    /// Absorb `other`, which was just performed right after `self`.
    ///
    /// Returns true if `self` now stands for both; `other` is then dropped. Implementations
    /// downcast `other` through [`Any`].
    fn collate_with(&mut self, other: &dyn UndoableCommand) -> bool {
        let _ = other;
        false
    }

    /// Whether storing this command starts a fresh repeat history.
    fn is_repeat_delimiter(&self) -> bool {
        false
    }

    /// A recipe for replaying this command against the current selection.
    fn repeater(&self) -> Option<Box<dyn Repeater>> {
        None
    }

    /// Destroy nodes this command holds detached. Called when the command leaves the history.
    fn dispose(&mut self, map: &mut Map) {
        let _ = map;
    }
}

/// Builds a new command that repeats a recorded one.
pub trait Repeater: Debug {
    /// The command to run now. Usually derived from the current selection.
    fn repeat(&self, map: &Map) -> Result<Box<dyn UndoableCommand>, DocumentError>;

    /// Nested repeaters, for compound recipes; replayed in order instead of [`Self::repeat`].
    fn parts(&self) -> &[Box<dyn Repeater>] {
        &[]
    }
}

/// A stored command together with its lifecycle state.
#[derive(Debug)]
pub(crate) struct Tracked {
    command: Box<dyn UndoableCommand>,
    state: CommandState,
}

impl Tracked {
    pub(crate) fn new(command: Box<dyn UndoableCommand>) -> Self {
        Self {
            command,
            state: CommandState::Unexecuted,
        }
    }

    /// Wrap a command whose effect is already applied.
    pub(crate) fn done(command: Box<dyn UndoableCommand>) -> Self {
        Self {
            command,
            state: CommandState::Done,
        }
    }

    pub(crate) fn name(&self) -> &str {
        self.command.name()
    }

    pub(crate) fn perform_do(&mut self, map: &mut Map) -> Result<(), DocumentError> {
        debug_assert_ne!(self.state, CommandState::Done, "command performed twice");
        self.command.perform_do(map)?;
        self.state = CommandState::Done;
        Ok(())
    }

    pub(crate) fn perform_undo(&mut self, map: &mut Map) -> Result<(), DocumentError> {
        debug_assert_eq!(self.state, CommandState::Done, "undo of a command not done");
        self.command.perform_undo(map)?;
        self.state = CommandState::Undone;
        Ok(())
    }

    pub(crate) fn collate_with(&mut self, other: &Self) -> bool {
        self.command.collate_with(other.command.as_ref())
    }

    pub(crate) fn is_repeat_delimiter(&self) -> bool {
        self.command.is_repeat_delimiter()
    }

    pub(crate) fn repeater(&self) -> Option<Box<dyn Repeater>> {
        self.command.repeater()
    }

    pub(crate) fn dispose(mut self, map: &mut Map) {
        self.command.dispose(map);
    }
}
