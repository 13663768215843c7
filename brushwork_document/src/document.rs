// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The document facade: a map plus its command history.

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;

use brushwork_scene::{
    Group, LinkIdPolicy, LockState, NodeContents, NodeId, NodeKind, Notification, SceneError,
    Tree, VisibilityState, remove_if_empty,
};
use glam::{DMat4, DVec3};

use crate::command::{Command, Repeater, UndoableCommand};
use crate::commands::{
    AddRemoveNodes, CurrentGroupChange, CurrentGroupCommand, DuplicateNodes, NodeStateChange,
    ReparentNodes, SelectionAction, SelectionCommand, SetLinkIds, SetNodeState,
    SwapNodeContents, TransformNodes, topmost,
};
use crate::error::DocumentError;
use crate::map::Map;
use crate::options::DocumentOptions;
use crate::processor::{CommandNotification, CommandProcessor};
use crate::transaction::TransactionScope;

/// An editable map with undo, redo and repeat.
///
/// Reads go through [`Document::tree`]. Every edit is a command; the convenience methods
/// build the usual ones and store them, wrapping multi-step edits in one transaction.
#[derive(Debug, Default)]
pub struct Document {
    map: Map,
    processor: CommandProcessor,
}

impl Document {
    /// An empty document: a world holding its default layer.
    pub fn new(options: DocumentOptions) -> Self {
        Self {
            map: Map::new(options),
            processor: CommandProcessor::new(),
        }
    }

    /// The map.
    pub fn map(&self) -> &Map {
        &self.map
    }

    /// The node tree.
    pub fn tree(&self) -> &Tree {
        self.map.tree()
    }

    /// The command history.
    pub fn processor(&self) -> &CommandProcessor {
        &self.processor
    }

    // --- history ---

    /// Perform a command without recording it.
    pub fn execute(&mut self, command: &mut dyn Command) -> Result<(), DocumentError> {
        self.processor.execute(&mut self.map, command)
    }

    /// Perform a command and record it. See [`CommandProcessor::execute_and_store`].
    pub fn execute_and_store(
        &mut self,
        command: Box<dyn UndoableCommand>,
    ) -> Result<(), DocumentError> {
        self.processor.execute_and_store(&mut self.map, command)
    }

    /// Revert the last undo step.
    pub fn undo(&mut self) -> Result<(), DocumentError> {
        self.processor.undo(&mut self.map)
    }

    /// Reapply the last undone step.
    pub fn redo(&mut self) -> Result<(), DocumentError> {
        self.processor.redo(&mut self.map)
    }

    /// Whether [`Self::undo`] would do something.
    pub fn can_undo(&self) -> bool {
        self.processor.can_undo()
    }

    /// Whether [`Self::redo`] would do something.
    pub fn can_redo(&self) -> bool {
        self.processor.can_redo()
    }

    /// Open a transaction, or extend the open one.
    pub fn start_transaction(&mut self, name: &str, scope: TransactionScope) {
        self.processor.start_transaction(&mut self.map, name, scope);
    }

    /// Close one level of the open transaction.
    pub fn commit_transaction(&mut self) -> Result<(), DocumentError> {
        self.processor.commit_transaction(&mut self.map)
    }

    /// Revert and close the open transaction.
    pub fn rollback_transaction(&mut self) -> Result<(), DocumentError> {
        self.processor.rollback_transaction(&mut self.map)
    }

    /// Record a repeat recipe.
    pub fn push_repeatable_command(&mut self, repeater: Box<dyn Repeater>) {
        self.processor.push_repeatable_command(repeater);
    }

    /// Replay the repeat stack against the current selection.
    pub fn repeat_commands(&mut self) -> Result<(), DocumentError> {
        self.processor.repeat_commands(&mut self.map)
    }

    /// Drop the undo, redo and repeat history.
    pub fn clear_history(&mut self) {
        self.processor.clear(&mut self.map);
    }

    /// Drain tree change notifications.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        self.map.tree_mut().take_notifications()
    }

    /// Drain command lifecycle notifications.
    pub fn take_command_notifications(&mut self) -> Vec<CommandNotification> {
        self.processor.take_notifications()
    }

    /// Run `f` inside a transaction, committing on success and rolling back on error.
    fn transaction<T>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Self) -> Result<T, DocumentError>,
    ) -> Result<T, DocumentError> {
        self.processor
            .start_transaction(&mut self.map, name, TransactionScope::LinkedGroupAware);
        match f(self) {
            Ok(value) => {
                self.processor.commit_transaction(&mut self.map)?;
                Ok(value)
            }
            Err(e) => {
                if self.processor.is_in_transaction() {
                    self.processor.rollback_transaction(&mut self.map)?;
                }
                Err(e)
            }
        }
    }

    /// Destroy `id` if a failed edit left it alive and detached.
    fn discard(&mut self, id: NodeId) {
        let tree = self.map.tree_mut();
        if tree.is_alive(id)
            && tree.parent(id).is_none()
            && let Err(e) = tree.destroy(id)
        {
            log::warn!("could not discard {id:?}: {e}");
        }
    }

    // --- structure ---

    /// Create a node from `contents` and attach it under `parent`.
    pub fn add_node(
        &mut self,
        parent: NodeId,
        contents: NodeContents,
    ) -> Result<NodeId, DocumentError> {
        let node = self.map.tree_mut().create(contents);
        let result = self.execute_and_store(Box::new(AddRemoveNodes::add(vec![(parent, node)])));
        if let Err(e) = result {
            self.discard(node);
            return Err(e);
        }
        Ok(node)
    }

    /// Attach detached subtrees, each `(parent, child)`.
    pub fn add_nodes(&mut self, nodes: Vec<(NodeId, NodeId)>) -> Result<(), DocumentError> {
        self.execute_and_store(Box::new(AddRemoveNodes::add(nodes)))
    }

    /// Detach nodes, along with the groups and brush entities they leave empty.
    pub fn remove_nodes(&mut self, nodes: &[NodeId]) -> Result<(), DocumentError> {
        let command = AddRemoveNodes::remove(self.tree(), nodes);
        self.execute_and_store(Box::new(command))
    }

    /// Move each `(child, new_parent)`, removing groups and brush entities left empty.
    pub fn reparent_nodes(&mut self, moves: Vec<(NodeId, NodeId)>) -> Result<(), DocumentError> {
        self.transaction("Reparent Objects", |doc| doc.reparent_and_clean_up(moves))
    }

    fn reparent_and_clean_up(&mut self, moves: Vec<(NodeId, NodeId)>) -> Result<(), DocumentError> {
        let mut old_parents: Vec<NodeId> = moves
            .iter()
            .filter_map(|(child, _)| self.tree().parent(*child))
            .collect();
        old_parents.sort();
        old_parents.dedup();
        self.execute_and_store(Box::new(ReparentNodes::new(moves)))?;

        let tree = self.tree();
        let emptied: Vec<NodeId> = old_parents
            .into_iter()
            .filter(|p| {
                tree.in_world(*p)
                    && tree.children(*p).is_empty()
                    && tree.kind(*p).is_some_and(remove_if_empty)
            })
            .collect();
        if emptied.is_empty() {
            return Ok(());
        }
        let command = AddRemoveNodes::remove(tree, &emptied);
        self.execute_and_store(Box::new(command))
    }

    // --- selection ---

    /// Add nodes to the selection.
    pub fn select(&mut self, nodes: &[NodeId]) -> Result<(), DocumentError> {
        self.selection(SelectionAction::Select(nodes.to_vec()))
    }

    /// Remove nodes from the selection.
    pub fn deselect(&mut self, nodes: &[NodeId]) -> Result<(), DocumentError> {
        self.selection(SelectionAction::Deselect(nodes.to_vec()))
    }

    /// Clear the selection.
    pub fn deselect_all(&mut self) -> Result<(), DocumentError> {
        self.selection(SelectionAction::DeselectAll)
    }

    /// Select exactly `nodes`.
    pub fn replace_selection(&mut self, nodes: &[NodeId]) -> Result<(), DocumentError> {
        self.selection(SelectionAction::Replace(nodes.to_vec()))
    }

    fn selection(&mut self, action: SelectionAction) -> Result<(), DocumentError> {
        self.execute_and_store(Box::new(SelectionCommand::new(action)))
    }

    fn selected(&self) -> Result<Vec<NodeId>, DocumentError> {
        let nodes = self.tree().selection().nodes();
        if nodes.is_empty() {
            return Err(DocumentError::EmptySelection);
        }
        Ok(nodes.to_vec())
    }

    // --- geometry ---

    /// Move the selection by `delta`.
    pub fn translate_selection(&mut self, delta: DVec3) -> Result<(), DocumentError> {
        self.transform_selection("Move Objects", DMat4::from_translation(delta))
    }

    /// Apply `transform` to the selection.
    pub fn transform_selection(
        &mut self,
        name: &str,
        transform: DMat4,
    ) -> Result<(), DocumentError> {
        let selected = self.selected()?;
        let command = TransformNodes::new(name, self.tree(), &selected, transform);
        self.execute_and_store(Box::new(command))
    }

    /// Copy the selection in place and select the copies, which are returned.
    pub fn duplicate_selection(&mut self) -> Result<Vec<NodeId>, DocumentError> {
        let selected = self.selected()?;
        let command = DuplicateNodes::new(self.tree(), &selected);
        self.execute_and_store(Box::new(command))?;
        Ok(self.tree().selection().nodes().to_vec())
    }

    /// Set an entity property on each of `entities`.
    pub fn set_entity_property(
        &mut self,
        entities: &[NodeId],
        key: &str,
        value: &str,
    ) -> Result<(), DocumentError> {
        let mut changes = Vec::with_capacity(entities.len());
        for &id in entities {
            match self.tree().contents(id) {
                Some(NodeContents::Entity(entity)) => {
                    let mut entity = entity.clone();
                    entity.set_property(key, value);
                    changes.push((id, entity.into()));
                }
                Some(_) => return Err(SceneError::KindMismatch(id).into()),
                None => return Err(SceneError::NodeNotFound(id).into()),
            }
        }
        self.execute_and_store(Box::new(SwapNodeContents::new("Set Property", changes)))
    }

    // --- groups ---

    /// Move the selection into a new group and select it.
    ///
    /// The group is created in the current group, or else in the layer of the first selected
    /// node.
    pub fn group_selected_nodes(&mut self, name: &str) -> Result<NodeId, DocumentError> {
        let selected = topmost(self.tree(), &self.selected()?);
        let tree = self.tree();
        let parent = tree
            .current_group()
            .or_else(|| selected.first().and_then(|n| tree.containing_layer(*n)))
            .unwrap_or_else(|| tree.default_layer());
        let group = self.map.tree_mut().create(Group::new(name).into());
        let result = self.transaction("Group Selected Objects", |doc| {
            doc.execute_and_store(Box::new(AddRemoveNodes::add(vec![(parent, group)])))?;
            let moves = selected.iter().map(|n| (*n, group)).collect();
            doc.reparent_and_clean_up(moves)?;
            doc.selection(SelectionAction::Replace(vec![group]))
        });
        if let Err(e) = result {
            self.discard(group);
            return Err(e);
        }
        Ok(group)
    }

    /// Dissolve groups, moving their children to the groups' parents and selecting them.
    pub fn ungroup(&mut self, groups: &[NodeId]) -> Result<(), DocumentError> {
        let mut moves = Vec::new();
        for &group in groups {
            if self.tree().kind(group) != Some(NodeKind::Group) {
                return Err(SceneError::NotAGroup(group).into());
            }
            let parent = self
                .tree()
                .parent(group)
                .ok_or(SceneError::NodeNotFound(group))?;
            moves.extend(self.tree().children(group).iter().map(|c| (*c, parent)));
        }
        let groups = groups.to_vec();
        self.transaction("Ungroup", |doc| {
            let children: Vec<NodeId> = moves.iter().map(|(c, _)| *c).collect();
            doc.reparent_and_clean_up(moves)?;
            let remaining: Vec<NodeId> = groups
                .into_iter()
                .filter(|g| doc.tree().in_world(*g))
                .collect();
            if !remaining.is_empty() {
                doc.remove_nodes(&remaining)?;
            }
            doc.selection(SelectionAction::Replace(children))
        })
    }

    /// Open `group` for editing.
    pub fn open_group(&mut self, group: NodeId) -> Result<(), DocumentError> {
        let command = CurrentGroupCommand::new(CurrentGroupChange::Open(group));
        self.execute_and_store(Box::new(command))
    }

    /// Close the current group.
    pub fn close_group(&mut self) -> Result<(), DocumentError> {
        let command = CurrentGroupCommand::new(CurrentGroupChange::Close);
        self.execute_and_store(Box::new(command))
    }

    /// Add a linked copy of `group` next to it and select it.
    ///
    /// The first linked copy names the link set after the original's persistent id.
    pub fn create_linked_duplicate(&mut self, group: NodeId) -> Result<NodeId, DocumentError> {
        let tree = self.tree();
        let Some(NodeContents::Group(contents)) = tree.contents(group) else {
            return Err(SceneError::NotAGroup(group).into());
        };
        let parent = tree.parent(group).ok_or(SceneError::NodeNotFound(group))?;
        let named = match (contents.shared_persistent_id, tree.persistent_id(group)) {
            (None, Some(id)) => {
                let mut named = contents.clone();
                named.shared_persistent_id = Some(id);
                Some(named)
            }
            _ => None,
        };

        let mut copy = None;
        let result = self.transaction("Create Linked Duplicate", |doc| {
            if let Some(named) = named {
                let command = SwapNodeContents::new("Set Linked Group Id", vec![(group, named.into())]);
                doc.execute_and_store(Box::new(command))?;
            }
            let clone = doc
                .map
                .tree_mut()
                .clone_subtree(group, LinkIdPolicy::Preserve)?;
            copy = Some(clone);
            doc.execute_and_store(Box::new(AddRemoveNodes::add(vec![(parent, clone)])))?;
            doc.selection(SelectionAction::Replace(vec![clone]))?;
            Ok(clone)
        });
        if result.is_err()
            && let Some(clone) = copy
        {
            self.discard(clone);
        }
        result
    }

    /// Give `groups` fresh link ids, separating each from its link set.
    pub fn separate_linked_groups(&mut self, groups: &[NodeId]) -> Result<(), DocumentError> {
        for &group in groups {
            if self.tree().kind(group) != Some(NodeKind::Group) {
                return Err(SceneError::NotAGroup(group).into());
            }
        }
        let command = SetLinkIds::reset("Separate Linked Groups", groups.to_vec());
        self.execute_and_store(Box::new(command))
    }

    // --- visibility and locking ---

    /// Hide nodes, deselecting what becomes hidden.
    pub fn hide(&mut self, nodes: &[NodeId]) -> Result<(), DocumentError> {
        self.set_state(nodes, NodeStateChange::Visibility(VisibilityState::Hidden))
    }

    /// Show nodes explicitly.
    pub fn show(&mut self, nodes: &[NodeId]) -> Result<(), DocumentError> {
        self.set_state(nodes, NodeStateChange::Visibility(VisibilityState::Shown))
    }

    /// Lock nodes, deselecting what becomes locked.
    pub fn lock(&mut self, nodes: &[NodeId]) -> Result<(), DocumentError> {
        self.set_state(nodes, NodeStateChange::Lock(LockState::Locked))
    }

    /// Unlock nodes explicitly.
    pub fn unlock(&mut self, nodes: &[NodeId]) -> Result<(), DocumentError> {
        self.set_state(nodes, NodeStateChange::Lock(LockState::Unlocked))
    }

    fn set_state(&mut self, nodes: &[NodeId], change: NodeStateChange) -> Result<(), DocumentError> {
        self.execute_and_store(Box::new(SetNodeState::new(nodes.to_vec(), change)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brushwork_scene::{BBox3, Brush, Entity, linked_groups::collect_link_set};

    fn brush_at(x: f64) -> NodeContents {
        Brush::cuboid(BBox3::cube(8.0).translate(DVec3::X * x), "rock").into()
    }

    #[test]
    fn grouping_and_ungrouping_round_trip() {
        let mut doc = Document::default();
        let layer = doc.tree().default_layer();
        let a = doc.add_node(layer, brush_at(0.0)).expect("add");
        let b = doc.add_node(layer, brush_at(32.0)).expect("add");
        doc.select(&[a, b]).expect("select");

        let group = doc.group_selected_nodes("pair").expect("group");
        assert_eq!(doc.tree().children(group), [a, b]);
        assert_eq!(doc.tree().selection().nodes(), [group]);

        doc.ungroup(&[group]).expect("ungroup");
        assert!(!doc.tree().in_world(group), "emptied group is removed");
        assert_eq!(doc.tree().parent(a), Some(layer));
        assert_eq!(doc.tree().selection().nodes(), [a, b]);

        doc.undo().expect("undo ungroup");
        assert_eq!(doc.tree().parent(a), Some(group));
    }

    #[test]
    fn moving_the_last_brush_out_removes_the_brush_entity() {
        let mut doc = Document::default();
        let layer = doc.tree().default_layer();
        let entity = doc
            .add_node(layer, Entity::with_classname("func_door").into())
            .expect("add");
        let brush = doc.add_node(entity, brush_at(0.0)).expect("add");

        doc.reparent_nodes(vec![(brush, layer)]).expect("move");
        assert!(!doc.tree().in_world(entity));
        assert_eq!(doc.processor().undo_command_name(), Some("Reparent Objects"));
        doc.undo().expect("undo");
        assert_eq!(doc.tree().parent(brush), Some(entity));
        assert_eq!(doc.tree().parent(entity), Some(layer));
    }

    #[test]
    fn linked_duplicate_shares_the_link_set() {
        let mut doc = Document::default();
        let layer = doc.tree().default_layer();
        let brush = doc.add_node(layer, brush_at(0.0)).expect("add");
        doc.select(&[brush]).expect("select");
        let group = doc.group_selected_nodes("g").expect("group");

        let copy = doc.create_linked_duplicate(group).expect("duplicate");
        assert_eq!(collect_link_set(doc.tree(), group), [group, copy]);
        let Some(NodeContents::Group(g)) = doc.tree().contents(group) else {
            panic!("group contents expected");
        };
        assert_eq!(g.shared_persistent_id, doc.tree().persistent_id(group));

        doc.separate_linked_groups(&[copy]).expect("separate");
        assert_eq!(collect_link_set(doc.tree(), group), [group]);
    }

    #[test]
    fn transforming_an_empty_selection_fails() {
        let mut doc = Document::default();
        assert_eq!(
            doc.translate_selection(DVec3::X),
            Err(DocumentError::EmptySelection)
        );
        assert!(!doc.can_undo());
    }

    #[test]
    fn property_edits_reject_non_entities() {
        let mut doc = Document::default();
        let layer = doc.tree().default_layer();
        let brush = doc.add_node(layer, brush_at(0.0)).expect("add");
        assert_eq!(
            doc.set_entity_property(&[brush], "light", "300"),
            Err(DocumentError::Scene(SceneError::KindMismatch(brush)))
        );
    }
}
