// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Document configuration.

use alloc::string::String;

use brushwork_scene::{BBox3, IndexBackend};

/// Half extent of the default world bounds on every axis.
pub const DEFAULT_WORLD_EXTENT: f64 = 65536.0;

/// Options fixed when a [`Document`](crate::Document) is created.
#[derive(Clone, Debug)]
pub struct DocumentOptions {
    /// Every object must stay inside these bounds.
    pub world_bounds: BBox3,
    /// Name of the layer created with the world.
    pub default_layer_name: String,
    /// Whether adjacent commands of the same kind merge into one undo step.
    pub collate_commands: bool,
    /// Spatial index backend.
    pub index_backend: IndexBackend,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            world_bounds: BBox3::cube(DEFAULT_WORLD_EXTENT),
            default_layer_name: String::from("Default Layer"),
            collate_commands: true,
            index_backend: IndexBackend::default(),
        }
    }
}
