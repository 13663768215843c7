// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::string::String;
use alloc::vec::Vec;

use brushwork_scene::{NodeContents, NodeId};

use super::check_world_bounds;
use crate::command::{Command, UndoableCommand};
use crate::error::DocumentError;
use crate::map::Map;

/// Replace node contents; undo swaps the old contents back in.
///
/// Used for property edits and any other change expressed as new contents.
#[derive(Debug)]
pub struct SwapNodeContents {
    name: String,
    // Contents to swap in next.
    nodes: Vec<(NodeId, NodeContents)>,
}

impl SwapNodeContents {
    /// Give each node its new contents.
    pub fn new(name: impl Into<String>, nodes: Vec<(NodeId, NodeContents)>) -> Self {
        Self {
            name: name.into(),
            nodes,
        }
    }

    fn swap(&mut self, map: &mut Map) -> Result<(), DocumentError> {
        for i in 0..self.nodes.len() {
            if let Err(e) = self.swap_one(map, i) {
                self.unwind(map, i);
                return Err(e);
            }
        }
        let ids: Vec<NodeId> = self.nodes.iter().map(|(id, _)| *id).collect();
        if let Err(e) = check_world_bounds(map, &ids) {
            self.unwind(map, self.nodes.len());
            return Err(e);
        }
        Ok(())
    }

    fn swap_one(&mut self, map: &mut Map, i: usize) -> Result<(), DocumentError> {
        let (id, contents) = &self.nodes[i];
        let old = map.tree_mut().set_contents(*id, contents.clone())?;
        self.nodes[i].1 = old;
        Ok(())
    }

    fn unwind(&mut self, map: &mut Map, swapped: usize) {
        for i in (0..swapped).rev() {
            if let Err(e) = self.swap_one(map, i) {
                log::error!("could not restore contents of {:?}: {e}", self.nodes[i].0);
            }
        }
    }
}

impl Command for SwapNodeContents {
    fn name(&self) -> &str {
        &self.name
    }

    fn perform_do(&mut self, map: &mut Map) -> Result<(), DocumentError> {
        self.swap(map)
    }
}

impl UndoableCommand for SwapNodeContents {
    fn perform_undo(&mut self, map: &mut Map) -> Result<(), DocumentError> {
        self.swap(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brushwork_scene::Entity;
    use glam::DVec3;

    #[test]
    fn entity_moved_outside_world_is_rejected() {
        let mut map = Map::default();
        let layer = map.tree().default_layer();
        let entity = map
            .tree_mut()
            .create(Entity::with_classname("info_null").into());
        map.tree_mut().add_child(layer, entity).expect("attach");
        let before = map.tree().contents(entity).cloned();

        let mut far = Entity::with_classname("info_null");
        far.set_origin(DVec3::new(1.0e6, 0.0, 0.0));
        let mut cmd = SwapNodeContents::new("Set Property", alloc::vec![(entity, far.into())]);
        assert_eq!(
            cmd.perform_do(&mut map),
            Err(DocumentError::OutOfWorldBounds(entity))
        );
        assert_eq!(map.tree().contents(entity).cloned(), before);
    }
}
