// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public `Index` API and generic implementation over a pluggable backend.

use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt::Debug;

use crate::backend::Backend;
use crate::damage::Damage;
use crate::types::{Aabb3D, Ray3D, Scalar};

/// Generational handle for entries.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(u32, u32);

impl Key {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Index keys hold 32-bit slot indices."
    )]
    const fn new(idx: usize, generation: u32) -> Self {
        Self(idx as u32, generation)
    }

    const fn idx(self) -> usize {
        self.0 as usize
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Mark {
    Added,
    Updated,
    Removed,
}

#[derive(Clone, Debug)]
struct Entry<T, P> {
    generation: u32,
    aabb: Aabb3D<T>,
    payload: P,
    mark: Option<Mark>,
    prev_aabb: Option<Aabb3D<T>>, // for moved damage
}

/// A generic AABB index parameterized by a spatial backend.
///
/// Mutations are staged and reach the backend on [`commit`](Self::commit).
/// Only slots touched since the last commit are visited.
#[derive(Debug)]
pub struct IndexGeneric<T: Scalar, P: Copy + Debug, B: Backend<T>> {
    entries: Vec<Option<Entry<T, P>>>,
    free_list: Vec<usize>,
    dirty: Vec<usize>,
    // Generation of the last entry that lived in a freed slot.
    retired: Vec<u32>,
    live: usize,
    backend: B,
}

impl<T, P, B> IndexGeneric<T, P, B>
where
    T: Scalar,
    P: Copy + Debug,
    B: Backend<T> + Default,
{
    /// Create an empty index using the backend's default constructor.
    pub fn new() -> Self {
        Self::with_backend(B::default())
    }
}

impl<T, P, B> IndexGeneric<T, P, B>
where
    T: Scalar,
    P: Copy + Debug,
    B: Backend<T>,
{
    /// Create an empty index over an explicit backend instance.
    pub fn with_backend(backend: B) -> Self {
        Self {
            entries: Vec::new(),
            free_list: Vec::new(),
            dirty: Vec::new(),
            retired: Vec::new(),
            live: 0,
            backend,
        }
    }

    /// Reserve space for at least `n` entries.
    pub fn reserve(&mut self, n: usize) {
        self.entries.reserve(n);
    }

    /// Number of live entries, including ones not yet committed.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether the index holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Insert a new AABB with payload. Returns a stable handle `Key`.
    pub fn insert(&mut self, aabb: Aabb3D<T>, payload: P) -> Key {
        let entry = |generation| Entry {
            generation,
            aabb,
            payload,
            mark: Some(Mark::Added),
            prev_aabb: None,
        };
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.retired[idx] + 1;
            self.entries[idx] = Some(entry(generation));
            (idx, generation)
        } else {
            let generation = 1_u32;
            self.entries.push(Some(entry(generation)));
            self.retired.push(0);
            (self.entries.len() - 1, generation)
        };
        self.dirty.push(idx);
        self.live += 1;
        Key::new(idx, generation)
    }

    /// Update an existing AABB. Returns `false` for stale keys.
    pub fn update(&mut self, key: Key, aabb: Aabb3D<T>) -> bool {
        let Some(e) = self.entry_mut(key) else {
            return false;
        };
        let was_clean = e.mark.is_none();
        if was_clean {
            e.prev_aabb = Some(e.aabb);
        }
        e.aabb = aabb;
        e.mark = Some(match e.mark {
            Some(Mark::Added) => Mark::Added,
            _ => Mark::Updated,
        });
        if was_clean {
            self.dirty.push(key.idx());
        }
        true
    }

    /// Remove an existing AABB, returning its payload. Returns `None` for stale keys.
    pub fn remove(&mut self, key: Key) -> Option<P> {
        let e = self.entry_mut(key)?;
        let payload = e.payload;
        let mark = e.mark;
        if mark == Some(Mark::Added) {
            self.free_slot(key.idx());
        } else {
            e.mark = Some(Mark::Removed);
            if mark.is_none() {
                self.dirty.push(key.idx());
            }
        }
        self.live -= 1;
        Some(payload)
    }

    /// Look up the current AABB and payload of a live entry.
    pub fn get(&self, key: Key) -> Option<(Aabb3D<T>, P)> {
        let e = self.entries.get(key.idx())?.as_ref()?;
        if e.generation != key.1 || e.mark == Some(Mark::Removed) {
            return None;
        }
        Some((e.aabb, e.payload))
    }

    /// Iterate all live entries, committed or not.
    pub fn iter(&self) -> impl Iterator<Item = (Key, Aabb3D<T>, P)> + '_ {
        self.entries.iter().enumerate().filter_map(|(i, e)| {
            let e = e.as_ref()?;
            (e.mark != Some(Mark::Removed)).then(|| (Key::new(i, e.generation), e.aabb, e.payload))
        })
    }

    /// Clear the index (without reporting damage).
    pub fn clear(&mut self) {
        self.entries.clear();
        self.free_list.clear();
        self.dirty.clear();
        self.retired.clear();
        self.live = 0;
        self.backend.clear();
    }

    /// Apply pending changes and compute batched damage. Also synchronizes backend state.
    pub fn commit(&mut self) -> Damage<T> {
        let mut dmg = Damage::default();
        let mut dirty = core::mem::take(&mut self.dirty);
        for i in dirty.drain(..) {
            let Some(entry) = self.entries[i].as_mut() else {
                continue;
            };
            match entry.mark.take() {
                Some(Mark::Added) => {
                    self.backend.insert(i, entry.aabb);
                    dmg.added.push(entry.aabb);
                }
                Some(Mark::Removed) => {
                    self.backend.remove(i);
                    dmg.removed.push(entry.aabb);
                    self.free_slot(i);
                }
                Some(Mark::Updated) => {
                    self.backend.update(i, entry.aabb);
                    if let Some(prev) = entry.prev_aabb.take()
                        && prev != entry.aabb
                    {
                        dmg.moved.push((prev, entry.aabb));
                    }
                }
                None => {}
            }
        }
        // Hand the allocation back for the next batch.
        self.dirty = dirty;
        dmg
    }

    /// Drop all pending marks and rebuild the backend from the live entries in one pass.
    ///
    /// No damage is reported; callers use this after bulk loads.
    pub fn rebuild(&mut self) {
        for i in core::mem::take(&mut self.dirty) {
            let removed = match self.entries[i].as_mut() {
                Some(e) => {
                    e.prev_aabb = None;
                    e.mark.take() == Some(Mark::Removed)
                }
                None => false,
            };
            if removed {
                self.free_slot(i);
            }
        }
        let items: Vec<(usize, Aabb3D<T>)> = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|e| (i, e.aabb)))
            .collect();
        self.backend.rebuild(&items);
    }

    /// Query for committed entries whose AABB contains the point.
    pub fn query_point(&self, x: T, y: T, z: T) -> impl Iterator<Item = (Key, P)> + '_ {
        self.resolve(self.backend.query_point(x, y, z))
    }

    /// Query for committed entries whose AABB intersects the given box.
    pub fn query_box(&self, aabb: Aabb3D<T>) -> impl Iterator<Item = (Key, P)> + '_ {
        self.resolve(self.backend.query_box(aabb))
    }

    /// Query for committed entries hit by the ray, nearest entry first.
    ///
    /// Ties are broken by slot order so results are deterministic.
    pub fn query_ray(&self, ray: Ray3D<T>) -> Vec<(Key, P, T)> {
        let mut hits: Vec<(usize, T)> = self.backend.query_ray(ray).collect();
        hits.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        hits.into_iter()
            .filter_map(|(i, t)| {
                let e = self.entries.get(i)?.as_ref()?;
                Some((Key::new(i, e.generation), e.payload, t))
            })
            .collect()
    }

    fn resolve<'a>(
        &'a self,
        slots: impl Iterator<Item = usize> + 'a,
    ) -> impl Iterator<Item = (Key, P)> + 'a {
        slots.filter_map(|i| {
            let e = self.entries.get(i)?.as_ref()?;
            Some((Key::new(i, e.generation), e.payload))
        })
    }

    fn free_slot(&mut self, idx: usize) {
        if let Some(e) = self.entries[idx].take() {
            self.retired[idx] = e.generation;
        }
        self.free_list.push(idx);
    }

    fn entry_mut(&mut self, key: Key) -> Option<&mut Entry<T, P>> {
        let e = self.entries.get_mut(key.idx())?.as_mut()?;
        if e.generation != key.1 || e.mark == Some(Mark::Removed) {
            return None;
        }
        Some(e)
    }
}

/// Default index using a flat vector backend.
pub type Index<T, P> = IndexGeneric<T, P, crate::backends::flatvec::FlatVec<T>>;

impl<T: Scalar, P: Copy + Debug> Default for Index<T, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Copy + Debug> Index<f64, P> {
    /// Create a BVH-backed index using SAH-like splits.
    pub fn with_bvh() -> IndexGeneric<f64, P, crate::backends::bvh::BVHF64> {
        IndexGeneric::with_backend(crate::backends::bvh::BVHF64::default())
    }

    /// Build a BVH-backed index in bulk from entries.
    pub fn with_bvh_bulk(
        entries: &[(Aabb3D<f64>, P)],
    ) -> IndexGeneric<f64, P, crate::backends::bvh::BVHF64> {
        let mut idx = Self::with_bvh();
        idx.reserve(entries.len());
        for (aabb, payload) in entries.iter().copied() {
            let _ = idx.insert(aabb, payload);
        }
        idx.rebuild();
        idx
    }
}

impl<P: Copy + Debug> Index<f32, P> {
    /// Create a BVH-backed index (f32 coordinates).
    pub fn with_bvh() -> IndexGeneric<f32, P, crate::backends::bvh::BVHF32> {
        IndexGeneric::with_backend(crate::backends::bvh::BVHF32::default())
    }
}
