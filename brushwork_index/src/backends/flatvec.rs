// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Flat vector backend with linear scans. Small and simple; good for tiny sets.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt::Debug;

use crate::backend::Backend;
use crate::types::{Aabb3D, Ray3D, Scalar};

/// Flat vector backend with linear scans.
pub struct FlatVec<T: Scalar> {
    entries: Vec<Option<Aabb3D<T>>>,
}

impl<T: Scalar> Default for FlatVec<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: Scalar> Debug for FlatVec<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let total = self.entries.len();
        let alive = self.entries.iter().filter(|e| e.is_some()).count();
        f.debug_struct("FlatVec")
            .field("total_slots", &total)
            .field("alive", &alive)
            .finish_non_exhaustive()
    }
}

impl<T: Scalar> FlatVec<T> {
    fn scan<'a, R: 'a>(
        &'a self,
        f: impl Fn(usize, &Aabb3D<T>) -> Option<R> + 'a,
    ) -> Box<dyn Iterator<Item = R> + 'a> {
        Box::new(
            self.entries
                .iter()
                .enumerate()
                .filter_map(move |(i, slot)| slot.as_ref().and_then(|a| f(i, a))),
        )
    }
}

impl<T: Scalar> Backend<T> for FlatVec<T> {
    fn insert(&mut self, slot: usize, aabb: Aabb3D<T>) {
        if self.entries.len() <= slot {
            self.entries.resize_with(slot + 1, || None);
        }
        self.entries[slot] = Some(aabb);
    }
    fn update(&mut self, slot: usize, aabb: Aabb3D<T>) {
        if let Some(e) = self.entries.get_mut(slot) {
            *e = Some(aabb);
        }
    }
    fn remove(&mut self, slot: usize) {
        if let Some(e) = self.entries.get_mut(slot) {
            *e = None;
        }
    }
    fn clear(&mut self) {
        self.entries.clear();
    }
    fn query_point<'a>(&'a self, x: T, y: T, z: T) -> Box<dyn Iterator<Item = usize> + 'a> {
        self.scan(move |i, a| a.contains_point(x, y, z).then_some(i))
    }
    fn query_box<'a>(&'a self, aabb: Aabb3D<T>) -> Box<dyn Iterator<Item = usize> + 'a> {
        self.scan(move |i, a| (!a.intersect(&aabb).is_empty()).then_some(i))
    }
    fn query_ray<'a>(&'a self, ray: Ray3D<T>) -> Box<dyn Iterator<Item = (usize, T)> + 'a> {
        self.scan(move |i, a| a.ray_entry(&ray).map(|t| (i, t)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn point_box_and_ray_scans() {
        let mut b: FlatVec<f32> = FlatVec::default();
        b.insert(0, Aabb3D::new(0.0, 0.0, 0.0, 1.0, 1.0, 1.0));
        b.insert(4, Aabb3D::new(5.0, 0.0, 0.0, 6.0, 1.0, 1.0));
        let p: Vec<_> = b.query_point(5.5, 0.5, 0.5).collect();
        assert_eq!(p, vec![4]);
        let r: Vec<_> = b
            .query_ray(Ray3D::new([-1.0, 0.5, 0.5], [1.0, 0.0, 0.0]))
            .collect();
        assert_eq!(r, vec![(0, 1.0), (4, 6.0)]);
        b.remove(0);
        assert_eq!(
            b.query_box(Aabb3D::new(-1.0, -1.0, -1.0, 10.0, 10.0, 10.0))
                .count(),
            1
        );
    }
}
