// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Spatial index observer: mirrors physical bounds of indexed nodes into a
//! [`brushwork_index`] index.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use brushwork_index::{Aabb3D, BVHF64, Backend, FlatVec, IndexGeneric, Key, Ray3D};

use crate::bounds::{BBox3, Ray3, bbox_to_aabb, ray_to_index};
use crate::error::SceneError;
use crate::types::NodeId;

/// Which [`brushwork_index`] backend stores the physical bounds.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum IndexBackend {
    /// Bounding volume hierarchy; rebuilt top-down after bulk loads.
    #[default]
    Bvh,
    /// Linear scans; fine for tiny maps and tests.
    FlatVec,
}

/// Runtime choice between the index backends.
#[derive(Debug)]
enum AnyBackend {
    Bvh(BVHF64),
    Flat(FlatVec<f64>),
}

impl Backend<f64> for AnyBackend {
    fn insert(&mut self, slot: usize, aabb: Aabb3D<f64>) {
        match self {
            Self::Bvh(b) => b.insert(slot, aabb),
            Self::Flat(b) => b.insert(slot, aabb),
        }
    }

    fn update(&mut self, slot: usize, aabb: Aabb3D<f64>) {
        match self {
            Self::Bvh(b) => b.update(slot, aabb),
            Self::Flat(b) => b.update(slot, aabb),
        }
    }

    fn remove(&mut self, slot: usize) {
        match self {
            Self::Bvh(b) => b.remove(slot),
            Self::Flat(b) => b.remove(slot),
        }
    }

    fn clear(&mut self) {
        match self {
            Self::Bvh(b) => b.clear(),
            Self::Flat(b) => b.clear(),
        }
    }

    fn rebuild(&mut self, items: &[(usize, Aabb3D<f64>)]) {
        match self {
            Self::Bvh(b) => b.rebuild(items),
            Self::Flat(b) => b.rebuild(items),
        }
    }

    fn query_point<'a>(
        &'a self,
        x: f64,
        y: f64,
        z: f64,
    ) -> Box<dyn Iterator<Item = usize> + 'a> {
        match self {
            Self::Bvh(b) => b.query_point(x, y, z),
            Self::Flat(b) => b.query_point(x, y, z),
        }
    }

    fn query_box<'a>(&'a self, aabb: Aabb3D<f64>) -> Box<dyn Iterator<Item = usize> + 'a> {
        match self {
            Self::Bvh(b) => b.query_box(aabb),
            Self::Flat(b) => b.query_box(aabb),
        }
    }

    fn query_ray<'a>(&'a self, ray: Ray3D<f64>) -> Box<dyn Iterator<Item = (usize, f64)> + 'a> {
        match self {
            Self::Bvh(b) => b.query_ray(ray),
            Self::Flat(b) => b.query_ray(ray),
        }
    }
}

/// Physical bounds of every indexed node attached under the world.
///
/// The tree drives this from its attach, detach and bounds-changed hooks; nothing else writes
/// to it. While suspended, hooks are ignored and [`SpatialIndex::rebuild`] restores the
/// contents in one pass.
#[derive(Debug)]
pub struct SpatialIndex {
    index: IndexGeneric<f64, NodeId, AnyBackend>,
    keys: BTreeMap<NodeId, Key>,
    suspended: bool,
}

impl SpatialIndex {
    pub(crate) fn new(backend: IndexBackend) -> Self {
        let backend = match backend {
            IndexBackend::Bvh => AnyBackend::Bvh(BVHF64::default()),
            IndexBackend::FlatVec => AnyBackend::Flat(FlatVec::default()),
        };
        Self {
            index: IndexGeneric::with_backend(backend),
            keys: BTreeMap::new(),
            suspended: false,
        }
    }

    /// Number of indexed nodes.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no node is indexed.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Whether maintenance is suspended for a bulk load.
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Whether `id` is indexed.
    pub fn contains(&self, id: NodeId) -> bool {
        self.keys.contains_key(&id)
    }

    /// Indexed nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.keys.keys().copied()
    }

    /// Indexed bounds of `id`.
    pub fn bounds(&self, id: NodeId) -> Option<BBox3> {
        let (aabb, _) = self.index.get(*self.keys.get(&id)?)?;
        Some(BBox3 {
            min: glam::DVec3::new(aabb.min_x, aabb.min_y, aabb.min_z),
            max: glam::DVec3::new(aabb.max_x, aabb.max_y, aabb.max_z),
        })
    }

    pub(crate) fn insert(&mut self, id: NodeId, bounds: BBox3) {
        if self.suspended {
            return;
        }
        if let Some(key) = self.keys.get(&id) {
            // Re-attaching an indexed node only refreshes its bounds.
            self.index.update(*key, bbox_to_aabb(bounds));
        } else {
            let key = self.index.insert(bbox_to_aabb(bounds), id);
            self.keys.insert(id, key);
            log::trace!("indexed {id:?}");
        }
        let _ = self.index.commit();
    }

    pub(crate) fn remove(&mut self, id: NodeId) -> Result<(), SceneError> {
        if self.suspended {
            return Ok(());
        }
        let removed = self
            .keys
            .remove(&id)
            .and_then(|key| self.index.remove(key));
        if removed.is_none() {
            log::error!("spatial index lost track of {id:?}");
            return Err(SceneError::NodeNotIndexed(id));
        }
        let _ = self.index.commit();
        log::trace!("unindexed {id:?}");
        Ok(())
    }

    pub(crate) fn update(&mut self, id: NodeId, bounds: BBox3) -> Result<(), SceneError> {
        if self.suspended {
            return Ok(());
        }
        let Some(key) = self.keys.get(&id) else {
            log::error!("spatial index lost track of {id:?}");
            return Err(SceneError::NodeNotIndexed(id));
        };
        if !self.index.update(*key, bbox_to_aabb(bounds)) {
            return Err(SceneError::NodeNotIndexed(id));
        }
        let _ = self.index.commit();
        Ok(())
    }

    pub(crate) fn suspend(&mut self) {
        self.suspended = true;
    }

    /// Replace the contents with `items` and resume maintenance.
    pub(crate) fn rebuild(&mut self, items: impl IntoIterator<Item = (NodeId, BBox3)>) {
        self.index.clear();
        self.keys.clear();
        for (id, bounds) in items {
            let key = self.index.insert(bbox_to_aabb(bounds), id);
            self.keys.insert(id, key);
        }
        self.index.rebuild();
        self.suspended = false;
        log::trace!("rebuilt spatial index with {} nodes", self.keys.len());
    }

    /// Nodes whose bounds are hit by the ray, nearest first, with entry distances.
    pub fn query_ray(&self, ray: Ray3) -> Vec<(NodeId, f64)> {
        self.index
            .query_ray(ray_to_index(ray))
            .into_iter()
            .map(|(_, id, t)| (id, t))
            .collect()
    }

    /// Nodes whose bounds contain the point.
    pub fn query_point(&self, p: glam::DVec3) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = self.index.query_point(p.x, p.y, p.z).map(|(_, id)| id).collect();
        out.sort_unstable();
        out
    }

    /// Nodes whose bounds intersect the box.
    pub fn query_box(&self, b: BBox3) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = self.index.query_box(bbox_to_aabb(b)).map(|(_, id)| id).collect();
        out.sort_unstable();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    fn id(i: u32) -> NodeId {
        NodeId::new(i, 1)
    }

    #[test]
    fn remove_of_unknown_node_is_reported() {
        let mut s = SpatialIndex::new(IndexBackend::Bvh);
        s.insert(id(1), BBox3::cube(1.0));
        assert_eq!(s.remove(id(2)), Err(SceneError::NodeNotIndexed(id(2))));
        assert_eq!(s.remove(id(1)), Ok(()));
        assert_eq!(s.remove(id(1)), Err(SceneError::NodeNotIndexed(id(1))));
        assert!(s.is_empty());
    }

    #[test]
    fn update_moves_query_results() {
        let mut s = SpatialIndex::new(IndexBackend::FlatVec);
        s.insert(id(1), BBox3::cube(1.0));
        s.update(id(1), BBox3::cube(1.0).translate(DVec3::new(10.0, 0.0, 0.0)))
            .expect("indexed");
        assert!(s.query_point(DVec3::ZERO).is_empty());
        assert_eq!(s.query_point(DVec3::new(10.0, 0.0, 0.0)), [id(1)]);
        let hits = s.query_ray(Ray3::new(DVec3::ZERO, DVec3::X));
        assert_eq!(hits, [(id(1), 9.0)]);
    }

    #[test]
    fn suspended_index_ignores_hooks_until_rebuild() {
        let mut s = SpatialIndex::new(IndexBackend::Bvh);
        s.suspend();
        s.insert(id(1), BBox3::cube(1.0));
        assert!(s.remove(id(7)).is_ok(), "hooks are ignored while suspended");
        assert!(s.is_empty());
        s.rebuild([(id(1), BBox3::cube(1.0)), (id(2), BBox3::cube(2.0))]);
        assert!(!s.is_suspended());
        assert_eq!(s.query_point(DVec3::splat(1.5)), [id(2)]);
    }
}
