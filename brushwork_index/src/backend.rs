// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend trait for spatial indexing implementations.

use alloc::boxed::Box;

use crate::types::{Aabb3D, Ray3D, Scalar};

/// Spatial backend abstraction used by `IndexGeneric`.
///
/// Backends only see slot numbers and boxes; payloads and generations live in
/// the index that owns them.
pub trait Backend<T: Scalar> {
    /// Insert a new slot into the spatial structure.
    fn insert(&mut self, slot: usize, aabb: Aabb3D<T>);

    /// Update an existing slot's AABB.
    fn update(&mut self, slot: usize, aabb: Aabb3D<T>);

    /// Remove a slot from the spatial structure.
    fn remove(&mut self, slot: usize);

    /// Clear all spatial structures.
    fn clear(&mut self);

    /// Replace the whole structure with `items` in one pass.
    ///
    /// The default clears and inserts one by one; hierarchical backends
    /// override this with a top-down build.
    fn rebuild(&mut self, items: &[(usize, Aabb3D<T>)]) {
        self.clear();
        for (slot, aabb) in items {
            self.insert(*slot, *aabb);
        }
    }

    /// Query slots whose AABB contains the point.
    fn query_point<'a>(&'a self, x: T, y: T, z: T) -> Box<dyn Iterator<Item = usize> + 'a>;

    /// Query slots whose AABB intersects the box.
    fn query_box<'a>(&'a self, aabb: Aabb3D<T>) -> Box<dyn Iterator<Item = usize> + 'a>;

    /// Query slots whose AABB is hit by the ray, with the entry distance.
    ///
    /// Results are unordered.
    fn query_ray<'a>(&'a self, ray: Ray3D<T>) -> Box<dyn Iterator<Item = (usize, T)> + 'a>;
}
