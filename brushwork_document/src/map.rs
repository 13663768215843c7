// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The mutable document context commands operate on.

use brushwork_scene::{BBox3, Tree, TreeConfig};

use crate::options::DocumentOptions;

/// The tree plus the options commands consult.
///
/// Commands receive `&mut Map`; everything else reads it through [`Document`](crate::Document).
#[derive(Debug)]
pub struct Map {
    tree: Tree,
    options: DocumentOptions,
}

impl Map {
    /// Create an empty map: a world and its default layer.
    pub fn new(options: DocumentOptions) -> Self {
        let tree = Tree::with_config(TreeConfig {
            default_layer_name: options.default_layer_name.clone(),
            index_backend: options.index_backend,
        });
        Self { tree, options }
    }

    /// The node tree.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// The node tree, for commands.
    pub fn tree_mut(&mut self) -> &mut Tree {
        &mut self.tree
    }

    /// Options the map was created with.
    pub fn options(&self) -> &DocumentOptions {
        &self.options
    }

    /// Bounds every object must stay inside.
    pub fn world_bounds(&self) -> BBox3 {
        self.options.world_bounds
    }
}

impl Default for Map {
    fn default() -> Self {
        Self::new(DocumentOptions::default())
    }
}
