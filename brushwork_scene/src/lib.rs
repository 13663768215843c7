// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=brushwork_scene --heading-base-level=0

//! Brushwork Scene: the node tree of a brush-based map editor.
//!
//! A map is a tree rooted at a single world. The world holds layers, layers hold groups,
//! entities, brushes and patches, groups nest, and entities hold brushes and patches.
//!
//! - [`Tree`] owns every node in a generational arena and enforces the parent/child rules.
//! - Each node caches logical and physical bounds, recomputed lazily after invalidation.
//! - Entities, brushes and patches attached under the world are mirrored into a
//!   [`SpatialIndex`] backed by [`brushwork_index`] for ray picking and point queries.
//! - Persistent ids and link ids are assigned when nodes are first attached under the world.
//! - [`linked_groups`] holds the machinery that keeps linked groups (groups sharing a
//!   [`LinkId`]) structurally identical.
//!
//! Mutations queue [`Notification`]s that renderers and tools drain with
//! [`Tree::take_notifications`]. Undo, redo and transactions live in the `brushwork_document`
//! crate on top of this one.
//!
//! ## Example
//!
//! ```rust
//! use brushwork_scene::{BBox3, Brush, Group, QueryFilter, Ray3, Tree};
//! use glam::DVec3;
//!
//! let mut tree = Tree::new();
//! let layer = tree.default_layer();
//!
//! let group = tree.create(Group::new("crates").into());
//! let near = tree.create(Brush::cuboid(BBox3::cube(8.0).translate(DVec3::X * 64.0), "wood").into());
//! let far = tree.create(Brush::cuboid(BBox3::cube(8.0).translate(DVec3::X * 128.0), "wood").into());
//! tree.add_child(group, near).unwrap();
//! tree.add_child(group, far).unwrap();
//! tree.add_child(layer, group).unwrap();
//!
//! // Groups are never indexed: picking resolves to primitives, nearest first.
//! let hits = tree.pick(Ray3::new(DVec3::ZERO, DVec3::X), QueryFilter::default());
//! assert_eq!(hits.iter().map(|h| h.node).collect::<Vec<_>>(), [near, far]);
//!
//! // The group's bounds are the union of its children.
//! let bounds = tree.logical_bounds(group).unwrap();
//! assert_eq!(bounds.min.x, 56.0);
//! assert_eq!(bounds.max.x, 136.0);
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod bounds;
mod contents;
mod error;
pub mod linked_groups;
mod node;
mod notify;
mod selection;
mod snapshot;
mod spatial;
mod tree;
mod types;
mod visitor;

pub use bounds::{BBox3, NodeBounds, Ray3};
pub use contents::{
    Brush, DEFAULT_ENTITY_HALF_EXTENT, Entity, EntityProperty, Group, Layer, NodeContents, Patch,
    WorldData, format_vec3, parse_vec3,
};
pub use error::SceneError;
pub use linked_groups::LinkedGroupUpdate;
pub use node::{
    accepted_children, has_link_id, is_selectable, remove_if_empty, should_add_to_spatial_index,
};
pub use notify::Notification;
pub use selection::Selection;
pub use snapshot::NodeSnapshot;
pub use spatial::{IndexBackend, SpatialIndex};
pub use tree::{LinkIdPolicy, PickHit, QueryFilter, Tree, TreeConfig};
pub use types::{
    EditState, LinkId, LockState, NodeId, NodeKind, NodeKinds, PersistentId, VisibilityState,
};
pub use visitor::NodeVisitor;
