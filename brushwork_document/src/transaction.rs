// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Transactions: commands stored and undone as one unit.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

use crate::command::{Command, Repeater, Tracked, UndoableCommand};
use crate::error::DocumentError;
use crate::map::Map;

/// Whether committing a transaction replays linked group edits.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TransactionScope {
    /// Commit as is; pending linked group changes are discarded.
    Oneshot,
    /// Append a linked group update before committing.
    #[default]
    LinkedGroupAware,
}

/// Executed commands stored as one undo step.
#[derive(Debug)]
pub struct Transaction {
    name: String,
    commands: Vec<Tracked>,
}

impl Transaction {
    pub(crate) fn new(name: String, commands: Vec<Tracked>) -> Self {
        Self { name, commands }
    }

    /// Number of commands in the transaction.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether the transaction holds no commands.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Names of the contained commands, in execution order.
    pub fn command_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.commands.iter().map(Tracked::name)
    }
}

impl Command for Transaction {
    fn name(&self) -> &str {
        &self.name
    }

    fn perform_do(&mut self, map: &mut Map) -> Result<(), DocumentError> {
        for i in 0..self.commands.len() {
            if let Err(e) = self.commands[i].perform_do(map) {
                for done in self.commands[..i].iter_mut().rev() {
                    if let Err(undo_err) = done.perform_undo(map) {
                        log::error!("could not revert `{}`: {undo_err}", done.name());
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }
}

impl UndoableCommand for Transaction {
    fn perform_undo(&mut self, map: &mut Map) -> Result<(), DocumentError> {
        let n = self.commands.len();
        for i in (0..n).rev() {
            if let Err(e) = self.commands[i].perform_undo(map) {
                for undone in &mut self.commands[i + 1..] {
                    if let Err(redo_err) = undone.perform_do(map) {
                        log::error!("could not reapply `{}`: {redo_err}", undone.name());
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }

    fn is_repeat_delimiter(&self) -> bool {
        self.commands.iter().any(Tracked::is_repeat_delimiter)
    }

    fn repeater(&self) -> Option<Box<dyn Repeater>> {
        let parts: Vec<_> = self.commands.iter().filter_map(Tracked::repeater).collect();
        (!parts.is_empty()).then(|| Box::new(CompoundRepeater { parts }) as Box<dyn Repeater>)
    }

    fn dispose(&mut self, map: &mut Map) {
        for command in self.commands.drain(..).rev() {
            command.dispose(map);
        }
    }
}

/// Replays the repeatable commands of a transaction in order.
#[derive(Debug)]
pub(crate) struct CompoundRepeater {
    parts: Vec<Box<dyn Repeater>>,
}

impl Repeater for CompoundRepeater {
    fn repeat(&self, _map: &Map) -> Result<Box<dyn UndoableCommand>, DocumentError> {
        Err(DocumentError::NothingToRepeat)
    }

    fn parts(&self) -> &[Box<dyn Repeater>] {
        &self.parts
    }
}
