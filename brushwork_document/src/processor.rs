// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Command processor: transactions, undo/redo and repeat stacks.
//!
//! ## Overview
//!
//! Every stored command runs inside a transaction. [`CommandProcessor::execute_and_store`]
//! outside an explicit transaction opens an implicit, linked-group-aware one named after the
//! command and commits it right away.
//!
//! ## Commit
//!
//! - Linked-group-aware transactions first replay edits of linked groups into the other
//!   members of their link sets (see [`UpdateLinkedGroups`]). If that fails, the whole
//!   transaction is rolled back.
//! - A transaction holding a single command is stored as that command, so it can collate with
//!   the previous undo step.
//! - Storing clears the redo stack and disposes the commands on it.
//!
//! ## Repeat
//!
//! Stored commands that provide a [`Repeater`] are recorded on the repeat stack. A repeat
//! delimiter (a selection change) makes the next recorded command start a fresh history. Undo
//! and redo clear the repeat stack.

use alloc::boxed::Box;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::command::{Repeater, Tracked, UndoableCommand};
use crate::commands::UpdateLinkedGroups;
use crate::error::DocumentError;
use crate::map::Map;
use crate::transaction::{Transaction, TransactionScope};

/// Events emitted as commands move through the processor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandNotification {
    /// A command is about to be performed.
    CommandDo(String),
    /// A command was performed.
    CommandDone(String),
    /// A command failed and its transaction was rolled back.
    CommandDoFailed(String),
    /// A stored command is about to be undone.
    CommandUndo(String),
    /// A stored command was undone.
    CommandUndone(String),
    /// A transaction was committed and stored.
    TransactionDone(String),
    /// A transaction was rolled back or undone.
    TransactionUndone(String),
}

#[derive(Debug)]
struct OpenTransaction {
    name: String,
    scope: TransactionScope,
    // Nesting depth; the transaction commits when it drops to zero.
    level: usize,
    commands: Vec<Tracked>,
}

/// Owns the history of a document.
#[derive(Debug, Default)]
pub struct CommandProcessor {
    undo_stack: Vec<Tracked>,
    redo_stack: Vec<Tracked>,
    repeat_stack: Vec<Box<dyn Repeater>>,
    clear_repeat_stack: bool,
    // Whether the top of the repeat stack was recorded from the top of the undo stack.
    repeat_top_is_last: bool,
    repeating: bool,
    transaction: Option<OpenTransaction>,
    // Whether the top of the undo stack may absorb the next stored command.
    last_collatable: bool,
    notifications: Vec<CommandNotification>,
}

impl CommandProcessor {
    /// Create an empty processor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether [`Self::undo`] would do something.
    pub fn can_undo(&self) -> bool {
        self.transaction.is_none() && !self.undo_stack.is_empty()
    }

    /// Whether [`Self::redo`] would do something.
    pub fn can_redo(&self) -> bool {
        self.transaction.is_none() && !self.redo_stack.is_empty()
    }

    /// Whether [`Self::repeat_commands`] would do something.
    pub fn can_repeat(&self) -> bool {
        !self.repeat_stack.is_empty()
    }

    /// Name of the step [`Self::undo`] would revert.
    pub fn undo_command_name(&self) -> Option<&str> {
        self.undo_stack.last().map(Tracked::name)
    }

    /// Name of the step [`Self::redo`] would reapply.
    pub fn redo_command_name(&self) -> Option<&str> {
        self.redo_stack.last().map(Tracked::name)
    }

    /// Number of undo steps.
    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    /// Number of redo steps.
    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    /// Whether a transaction is open.
    pub fn is_in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    /// Drain command lifecycle events, oldest first.
    pub fn take_notifications(&mut self) -> Vec<CommandNotification> {
        core::mem::take(&mut self.notifications)
    }

    /// Perform a command without recording it.
    ///
    /// Outside a transaction its edits are not propagated to linked groups, and the next
    /// transaction does not pick them up either.
    pub fn execute(
        &mut self,
        map: &mut Map,
        command: &mut dyn crate::command::Command,
    ) -> Result<(), DocumentError> {
        let name = command.name().to_string();
        self.notifications
            .push(CommandNotification::CommandDo(name.clone()));
        let result = command.perform_do(map);
        if self.transaction.is_none() {
            map.tree_mut().take_pending_link_changes();
        }
        match result {
            Ok(()) => {
                self.notifications.push(CommandNotification::CommandDone(name));
                Ok(())
            }
            Err(e) => {
                self.notifications
                    .push(CommandNotification::CommandDoFailed(name));
                Err(e)
            }
        }
    }

    /// Perform a command and record it.
    ///
    /// Inside a transaction the command joins it. Otherwise it runs in an implicit
    /// linked-group-aware transaction that commits immediately. On failure the enclosing
    /// transaction is rolled back and [`DocumentError::CommandFailed`] is returned.
    pub fn execute_and_store(
        &mut self,
        map: &mut Map,
        command: Box<dyn UndoableCommand>,
    ) -> Result<(), DocumentError> {
        let implicit = self.transaction.is_none();
        if implicit {
            self.start_transaction(map, command.name(), TransactionScope::LinkedGroupAware);
        }
        let mut tracked = Tracked::new(command);
        let name = tracked.name().to_string();
        log::debug!("executing `{name}`");
        self.notifications
            .push(CommandNotification::CommandDo(name.clone()));
        if let Err(e) = tracked.perform_do(map) {
            log::warn!("`{name}` failed: {e}");
            self.notifications
                .push(CommandNotification::CommandDoFailed(name.clone()));
            self.rollback_transaction(map)?;
            return Err(DocumentError::CommandFailed {
                name,
                source: Box::new(e),
            });
        }
        self.notifications
            .push(CommandNotification::CommandDone(name));
        self.push_transaction_command(map, tracked);
        if implicit {
            self.commit_transaction(map)?;
        }
        Ok(())
    }

    fn push_transaction_command(&mut self, map: &mut Map, tracked: Tracked) {
        let collate = map.options().collate_commands;
        let Some(tx) = self.transaction.as_mut() else {
            return;
        };
        if collate
            && let Some(last) = tx.commands.last_mut()
            && last.collate_with(&tracked)
        {
            tracked.dispose(map);
            return;
        }
        tx.commands.push(tracked);
    }

    /// Open a transaction, or extend the open one.
    ///
    /// Nested calls only deepen the open transaction; its name and scope stay those of the
    /// outermost call. A new transaction only propagates changes made inside it.
    pub fn start_transaction(&mut self, map: &mut Map, name: &str, scope: TransactionScope) {
        match &mut self.transaction {
            Some(tx) => tx.level += 1,
            None => {
                log::debug!("starting transaction `{name}`");
                map.tree_mut().take_pending_link_changes();
                self.transaction = Some(OpenTransaction {
                    name: name.to_string(),
                    scope,
                    level: 1,
                    commands: Vec::new(),
                });
            }
        }
    }

    /// Close one level of the open transaction; the outermost level stores it.
    pub fn commit_transaction(&mut self, map: &mut Map) -> Result<(), DocumentError> {
        let Some(mut tx) = self.transaction.take() else {
            return Err(DocumentError::NoTransaction);
        };
        if tx.level > 1 {
            tx.level -= 1;
            self.transaction = Some(tx);
            return Ok(());
        }

        let changed = map.tree_mut().take_pending_link_changes();
        if tx.scope == TransactionScope::LinkedGroupAware && !changed.is_empty() {
            let update = UpdateLinkedGroups::from_changes(map, &changed).and_then(|update| {
                let Some(update) = update else {
                    return Ok(None);
                };
                let mut tracked = Tracked::new(Box::new(update));
                tracked.perform_do(map)?;
                Ok(Some(tracked))
            });
            match update {
                Ok(Some(tracked)) => tx.commands.push(tracked),
                Ok(None) => {}
                Err(e) => {
                    log::warn!("rolling back `{}`: {e}", tx.name);
                    self.transaction = Some(tx);
                    self.rollback_transaction(map)?;
                    return Err(match e {
                        DocumentError::LinkPropagationFailed(reason) => {
                            DocumentError::LinkPropagationFailed(reason)
                        }
                        other => DocumentError::LinkPropagationFailed(other.to_string()),
                    });
                }
            }
            // The update itself marks the groups it rewrote.
            map.tree_mut().take_pending_link_changes();
        }

        let OpenTransaction {
            name, mut commands, ..
        } = tx;
        log::debug!("committing `{name}` with {} command(s)", commands.len());
        match commands.len() {
            0 => Ok(()),
            1 => {
                if let Some(command) = commands.pop() {
                    self.store(map, command, true);
                }
                Ok(())
            }
            _ => {
                let stored = Tracked::done(Box::new(Transaction::new(name, commands)));
                self.store(map, stored, false);
                Ok(())
            }
        }
    }

    fn store(&mut self, map: &mut Map, command: Tracked, collate: bool) {
        let name = command.name().to_string();
        for discarded in self.redo_stack.drain(..).rev() {
            discarded.dispose(map);
        }
        let collated = collate
            && map.options().collate_commands
            && self.last_collatable
            && self
                .undo_stack
                .last_mut()
                .is_some_and(|last| last.collate_with(&command));
        if collated {
            command.dispose(map);
            // The absorbed step extends the recipe recorded for the step it joined.
            if self.repeating {
                self.repeat_top_is_last = false;
            } else if self.repeat_top_is_last
                && let Some(repeater) = self.undo_stack.last().and_then(Tracked::repeater)
                && let Some(top) = self.repeat_stack.last_mut()
            {
                *top = repeater;
            }
        } else {
            self.record_repeat(&command);
            self.undo_stack.push(command);
        }
        self.last_collatable = true;
        self.notifications
            .push(CommandNotification::TransactionDone(name));
    }

    fn record_repeat(&mut self, command: &Tracked) {
        self.repeat_top_is_last = false;
        if self.repeating {
            return;
        }
        if command.is_repeat_delimiter() {
            self.clear_repeat_stack = true;
        } else if let Some(repeater) = command.repeater() {
            if self.clear_repeat_stack {
                self.repeat_stack.clear();
                self.clear_repeat_stack = false;
            }
            self.repeat_stack.push(repeater);
            self.repeat_top_is_last = true;
        }
    }

    /// Undo every command of the open transaction (all nesting levels) and close it.
    pub fn rollback_transaction(&mut self, map: &mut Map) -> Result<(), DocumentError> {
        let Some(tx) = self.transaction.take() else {
            return Err(DocumentError::NoTransaction);
        };
        log::warn!("rolling back transaction `{}`", tx.name);
        let mut first_error = None;
        for mut command in tx.commands.into_iter().rev() {
            if let Err(e) = command.perform_undo(map) {
                log::error!("could not revert `{}`: {e}", command.name());
                first_error.get_or_insert(e);
            }
            command.dispose(map);
        }
        map.tree_mut().take_pending_link_changes();
        self.notifications
            .push(CommandNotification::TransactionUndone(tx.name));
        first_error.map_or(Ok(()), Err)
    }

    /// Revert the most recent undo step.
    pub fn undo(&mut self, map: &mut Map) -> Result<(), DocumentError> {
        if self.transaction.is_some() {
            return Err(DocumentError::TransactionInProgress);
        }
        let Some(mut command) = self.undo_stack.pop() else {
            return Err(DocumentError::NothingToUndo);
        };
        let name = command.name().to_string();
        log::debug!("undoing `{name}`");
        self.notifications
            .push(CommandNotification::CommandUndo(name.clone()));
        let result = command.perform_undo(map);
        map.tree_mut().take_pending_link_changes();
        self.repeat_stack.clear();
        self.repeat_top_is_last = false;
        self.last_collatable = false;
        match result {
            Ok(()) => {
                self.redo_stack.push(command);
                self.notifications
                    .push(CommandNotification::CommandUndone(name.clone()));
                self.notifications
                    .push(CommandNotification::TransactionUndone(name));
                Ok(())
            }
            Err(e) => {
                self.undo_stack.push(command);
                Err(e)
            }
        }
    }

    /// Reapply the most recently undone step.
    pub fn redo(&mut self, map: &mut Map) -> Result<(), DocumentError> {
        if self.transaction.is_some() {
            return Err(DocumentError::TransactionInProgress);
        }
        let Some(mut command) = self.redo_stack.pop() else {
            return Err(DocumentError::NothingToRedo);
        };
        let name = command.name().to_string();
        log::debug!("redoing `{name}`");
        self.notifications
            .push(CommandNotification::CommandDo(name.clone()));
        let result = command.perform_do(map);
        map.tree_mut().take_pending_link_changes();
        self.repeat_stack.clear();
        self.repeat_top_is_last = false;
        self.last_collatable = false;
        match result {
            Ok(()) => {
                self.undo_stack.push(command);
                self.notifications
                    .push(CommandNotification::CommandDone(name.clone()));
                self.notifications
                    .push(CommandNotification::TransactionDone(name));
                Ok(())
            }
            Err(e) => {
                self.redo_stack.push(command);
                Err(e)
            }
        }
    }

    /// Record a repeat recipe directly, as if a command providing it had been stored.
    pub fn push_repeatable_command(&mut self, repeater: Box<dyn Repeater>) {
        if self.clear_repeat_stack {
            self.repeat_stack.clear();
            self.clear_repeat_stack = false;
        }
        self.repeat_stack.push(repeater);
        self.repeat_top_is_last = false;
    }

    /// Replay the repeat stack against the current document as one stored transaction.
    ///
    /// Commands are built one at a time, each after the previous one was performed.
    pub fn repeat_commands(&mut self, map: &mut Map) -> Result<(), DocumentError> {
        if self.transaction.is_some() {
            return Err(DocumentError::TransactionInProgress);
        }
        if self.repeat_stack.is_empty() {
            return Err(DocumentError::NothingToRepeat);
        }
        let stack = core::mem::take(&mut self.repeat_stack);
        let name = format!("Repeat {} Commands", stack.len());
        self.repeating = true;
        self.start_transaction(map, &name, TransactionScope::LinkedGroupAware);
        let mut result = Ok(());
        for repeater in &stack {
            result = self.replay(map, repeater.as_ref());
            if result.is_err() {
                break;
            }
        }
        let result = match result {
            Ok(()) => self.commit_transaction(map),
            Err(e) => {
                // A failing command has already rolled the transaction back.
                if self.transaction.is_some() {
                    self.rollback_transaction(map)?;
                }
                Err(e)
            }
        };
        self.repeating = false;
        self.repeat_stack = stack;
        result
    }

    fn replay(&mut self, map: &mut Map, repeater: &dyn Repeater) -> Result<(), DocumentError> {
        let parts = repeater.parts();
        if !parts.is_empty() {
            for part in parts {
                self.replay(map, part.as_ref())?;
            }
            return Ok(());
        }
        let command = repeater.repeat(map)?;
        self.execute_and_store(map, command)
    }

    /// Drop the whole history, disposing stored commands.
    pub fn clear(&mut self, map: &mut Map) {
        for command in self.redo_stack.drain(..).rev() {
            command.dispose(map);
        }
        for command in self.undo_stack.drain(..).rev() {
            command.dispose(map);
        }
        self.repeat_stack.clear();
        self.clear_repeat_stack = false;
        self.repeat_top_is_last = false;
        self.last_collatable = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use alloc::string::String;
    use brushwork_scene::{Group, NodeContents};

    /// Renames a group; collates with other renames of the same group.
    #[derive(Debug)]
    struct Rename {
        group: brushwork_scene::NodeId,
        name: String,
        previous: Option<NodeContents>,
        fail: bool,
    }

    impl Rename {
        fn boxed(group: brushwork_scene::NodeId, name: &str) -> Box<Self> {
            Box::new(Self {
                group,
                name: name.into(),
                previous: None,
                fail: false,
            })
        }
    }

    impl Command for Rename {
        fn name(&self) -> &str {
            "Rename"
        }

        fn perform_do(&mut self, map: &mut Map) -> Result<(), DocumentError> {
            if self.fail {
                return Err(DocumentError::EmptySelection);
            }
            let old = map
                .tree_mut()
                .set_contents(self.group, Group::new(self.name.clone()).into())?;
            self.previous.get_or_insert(old);
            Ok(())
        }
    }

    impl UndoableCommand for Rename {
        fn perform_undo(&mut self, map: &mut Map) -> Result<(), DocumentError> {
            if let Some(previous) = self.previous.clone() {
                map.tree_mut().set_contents(self.group, previous)?;
            }
            Ok(())
        }

        fn collate_with(&mut self, other: &dyn UndoableCommand) -> bool {
            let other: &dyn core::any::Any = other;
            match other.downcast_ref::<Self>() {
                Some(o) if o.group == self.group => {
                    self.name.clone_from(&o.name);
                    true
                }
                _ => false,
            }
        }
    }

    fn setup() -> (Map, brushwork_scene::NodeId) {
        let mut map = Map::default();
        let layer = map.tree().default_layer();
        let g = map.tree_mut().create(Group::new("a").into());
        map.tree_mut().add_child(layer, g).expect("attach");
        (map, g)
    }

    fn group_name(map: &Map, g: brushwork_scene::NodeId) -> String {
        map.tree()
            .contents(g)
            .and_then(NodeContents::name)
            .unwrap_or_default()
            .into()
    }

    #[test]
    fn adjacent_commands_collate_into_one_step() {
        let (mut map, g) = setup();
        let mut p = CommandProcessor::new();
        p.execute_and_store(&mut map, Rename::boxed(g, "b")).expect("ok");
        p.execute_and_store(&mut map, Rename::boxed(g, "c")).expect("ok");
        assert_eq!(p.undo_len(), 1, "second rename collates into the first");
        p.undo(&mut map).expect("undo");
        assert_eq!(group_name(&map, g), "a");
        p.redo(&mut map).expect("redo");
        assert_eq!(group_name(&map, g), "c");

        // After undo/redo the top is no longer collatable.
        p.execute_and_store(&mut map, Rename::boxed(g, "d")).expect("ok");
        assert_eq!(p.undo_len(), 2);
    }

    #[test]
    fn failing_command_rolls_back_the_transaction() {
        let (mut map, g) = setup();
        let mut p = CommandProcessor::new();
        p.start_transaction(&mut map, "Outer", TransactionScope::Oneshot);
        p.execute_and_store(&mut map, Rename::boxed(g, "b")).expect("ok");
        let mut failing = Rename::boxed(g, "x");
        failing.fail = true;
        let err = p.execute_and_store(&mut map, failing).expect_err("fails");
        assert!(matches!(err, DocumentError::CommandFailed { .. }));
        assert_eq!(err.root_cause(), &DocumentError::EmptySelection);
        assert_eq!(group_name(&map, g), "a", "earlier command reverted");
        assert!(!p.is_in_transaction());
        assert_eq!(p.undo_len(), 0);
        assert_eq!(p.commit_transaction(&mut map), Err(DocumentError::NoTransaction));
    }

    #[test]
    fn nested_transactions_commit_once() {
        let (mut map, g) = setup();
        let mut p = CommandProcessor::new();
        p.start_transaction(&mut map, "Outer", TransactionScope::Oneshot);
        p.start_transaction(&mut map, "Inner", TransactionScope::LinkedGroupAware);
        p.execute_and_store(&mut map, Rename::boxed(g, "b")).expect("ok");
        p.commit_transaction(&mut map).expect("inner");
        assert!(p.is_in_transaction());
        assert_eq!(p.undo(&mut map), Err(DocumentError::TransactionInProgress));
        p.commit_transaction(&mut map).expect("outer");
        assert_eq!(p.undo_len(), 1);
        assert_eq!(p.undo_command_name(), Some("Rename"));
    }

    #[test]
    fn collated_moves_leave_one_repeat_recipe_for_the_whole_drag() {
        use crate::commands::TransformNodes;
        use brushwork_scene::{BBox3, Brush};
        use glam::{DMat4, DVec3};

        let mut map = Map::default();
        let layer = map.tree().default_layer();
        let b = map
            .tree_mut()
            .create(Brush::cuboid(BBox3::cube(8.0), "a").into());
        map.tree_mut().add_child(layer, b).expect("attach");
        map.tree_mut().select(&[b]).expect("live");

        let mut p = CommandProcessor::new();
        let step = DMat4::from_translation(DVec3::X);
        for _ in 0..3 {
            let nudge = TransformNodes::new("Move Objects", map.tree(), &[b], step);
            p.execute_and_store(&mut map, Box::new(nudge)).expect("move");
        }
        assert_eq!(p.undo_len(), 1, "the drag is one undo step");
        assert_eq!(p.repeat_stack.len(), 1, "and one repeat recipe");

        p.repeat_commands(&mut map).expect("repeat");
        let moved = BBox3::cube(8.0).translate(DVec3::X * 6.0);
        assert!(
            map.tree()
                .logical_bounds(b)
                .is_some_and(|bb| bb.abs_diff_eq(&moved, 1e-9)),
            "repeat replays the whole drag once"
        );
        assert_eq!(p.repeat_stack.len(), 1, "replaying does not record itself");
    }

    #[test]
    fn undo_and_redo_on_empty_stacks() {
        let mut map = Map::default();
        let mut p = CommandProcessor::new();
        assert_eq!(p.undo(&mut map), Err(DocumentError::NothingToUndo));
        assert_eq!(p.redo(&mut map), Err(DocumentError::NothingToRedo));
        assert_eq!(p.repeat_commands(&mut map), Err(DocumentError::NothingToRepeat));
    }

    #[test]
    fn lifecycle_notifications_are_emitted() {
        let (mut map, g) = setup();
        let mut p = CommandProcessor::new();
        p.execute_and_store(&mut map, Rename::boxed(g, "b")).expect("ok");
        p.undo(&mut map).expect("undo");
        let events = p.take_notifications();
        assert_eq!(
            events,
            [
                CommandNotification::CommandDo("Rename".into()),
                CommandNotification::CommandDone("Rename".into()),
                CommandNotification::TransactionDone("Rename".into()),
                CommandNotification::CommandUndo("Rename".into()),
                CommandNotification::CommandUndone("Rename".into()),
                CommandNotification::TransactionUndone("Rename".into()),
            ]
        );
    }
}
