// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Binary bounding hierarchy backend generic over scalar `T: Scalar`.

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;

use crate::backend::Backend;
use crate::types::{Aabb3D, Ray3D, Scalar, surface_area, union_aabb};
use core::fmt::Debug;

/// A simple BVH backend using SAH-like splits.
pub struct BVH<T: Scalar> {
    max_leaf: usize,
    root: Option<NodeIdx>,
    arena: Vec<Node<T>>,
    slots: Vec<Option<Aabb3D<T>>>,
}

enum Kind<T: Scalar> {
    Leaf(Vec<(usize, Aabb3D<T>)>),
    Internal { left: NodeIdx, right: NodeIdx },
}

struct Node<T: Scalar> {
    bbox: Aabb3D<T>,
    kind: Kind<T>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
struct NodeIdx(usize);

impl NodeIdx {
    const fn new(i: usize) -> Self {
        Self(i)
    }

    const fn get(self) -> usize {
        self.0
    }
}

impl<T: Scalar> Default for BVH<T> {
    fn default() -> Self {
        Self {
            max_leaf: 8,
            root: None,
            arena: Vec::new(),
            slots: Vec::new(),
        }
    }
}

// Reduce clippy::type_complexity noise for local helpers.
type BvhItem<TS> = (usize, Aabb3D<TS>);
type BvhItems<TS> = Vec<BvhItem<TS>>;

impl<T: Scalar> BVH<T> {
    /// Create a BVH whose leaves hold at most `max_leaf` items (minimum 2).
    pub fn with_max_leaf(max_leaf: usize) -> Self {
        Self {
            max_leaf: max_leaf.max(2),
            ..Self::default()
        }
    }

    fn ensure_slot(&mut self, slot: usize, bbox: Aabb3D<T>) {
        if self.slots.len() <= slot {
            self.slots.resize_with(slot + 1, || None);
        }
        self.slots[slot] = Some(bbox);
    }

    fn bbox_items(items: &[(usize, Aabb3D<T>)]) -> Aabb3D<T> {
        let mut it = items.iter();
        if let Some((_, b)) = it.next() {
            it.fold(*b, |acc, (_, bb)| union_aabb(acc, *bb))
        } else {
            let z = T::zero();
            Aabb3D::new(z, z, z, z, z, z)
        }
    }

    fn centroid(b: &Aabb3D<T>, axis: usize) -> T {
        let (lo, hi) = b.axis(axis);
        T::mid(lo, hi)
    }

    /// SAH-like split: sort along each axis, precompute prefix/suffix AABBs, and
    /// choose `k` that minimizes `area(LB_k) * k + area(RB_k) * (n - k)`.
    ///
    /// Returns the split position after leaving `items` sorted along the winning axis.
    fn split_sah(items: &mut [BvhItem<T>], min_children: usize) -> usize {
        let n = items.len();
        let min_children = min_children.clamp(1, n / 2);
        let mut best: Option<(T::Acc, usize, usize)> = None;
        for axis in 0..3 {
            items.sort_by(|a, b| {
                Self::centroid(&a.1, axis)
                    .partial_cmp(&Self::centroid(&b.1, axis))
                    .unwrap_or(core::cmp::Ordering::Equal)
            });

            // Precompute prefix/suffix bboxes for O(1) split evaluation
            let mut prefix: Vec<Aabb3D<T>> = Vec::with_capacity(n);
            for (_, bb) in items.iter() {
                let next = prefix.last().map_or(*bb, |prev| union_aabb(*prev, *bb));
                prefix.push(next);
            }
            let mut suffix: Vec<Aabb3D<T>> = Vec::with_capacity(n);
            for (_, bb) in items.iter().rev() {
                let next = suffix.last().map_or(*bb, |prev| union_aabb(*bb, *prev));
                suffix.push(next);
            }
            suffix.reverse();

            for k in min_children..=(n - min_children) {
                let lb = prefix[k - 1];
                let rb = suffix[k];
                let cost = surface_area(&lb) * T::acc_from_usize(k)
                    + surface_area(&rb) * T::acc_from_usize(n - k);
                if best.map(|(bc, _, _)| cost < bc).unwrap_or(true) {
                    best = Some((cost, axis, k));
                }
            }
        }
        let (_, axis, k) = best.unwrap_or((T::widen(T::zero()), 2, n / 2));
        if axis != 2 {
            items.sort_by(|a, b| {
                Self::centroid(&a.1, axis)
                    .partial_cmp(&Self::centroid(&b.1, axis))
                    .unwrap_or(core::cmp::Ordering::Equal)
            });
        }
        k
    }

    fn build(arena: &mut Vec<Node<T>>, mut items: BvhItems<T>, max_leaf: usize) -> NodeIdx {
        let bbox = Self::bbox_items(&items);
        if items.len() <= max_leaf {
            arena.push(Node {
                bbox,
                kind: Kind::Leaf(items),
            });
            return NodeIdx::new(arena.len() - 1);
        }
        let k = Self::split_sah(&mut items, max_leaf / 2);
        let right_items = items.split_off(k);
        let left = Self::build(arena, items, max_leaf);
        let right = Self::build(arena, right_items, max_leaf);
        arena.push(Node {
            bbox,
            kind: Kind::Internal { left, right },
        });
        NodeIdx::new(arena.len() - 1)
    }

    fn insert_node(
        arena: &mut Vec<Node<T>>,
        node_idx: usize,
        slot: usize,
        bbox: Aabb3D<T>,
        max_leaf: usize,
    ) {
        let kind = core::mem::replace(&mut arena[node_idx].kind, Kind::Leaf(Vec::new()));
        match kind {
            Kind::Leaf(mut items) => {
                items.push((slot, bbox));
                let node_bbox = Self::bbox_items(&items);
                let new_kind = if items.len() > max_leaf {
                    let k = Self::split_sah(&mut items, max_leaf / 2);
                    let r = items.split_off(k);
                    let l_idx = arena.len();
                    arena.push(Node {
                        bbox: Self::bbox_items(&items),
                        kind: Kind::Leaf(items),
                    });
                    let r_idx = arena.len();
                    arena.push(Node {
                        bbox: Self::bbox_items(&r),
                        kind: Kind::Leaf(r),
                    });
                    Kind::Internal {
                        left: NodeIdx::new(l_idx),
                        right: NodeIdx::new(r_idx),
                    }
                } else {
                    Kind::Leaf(items)
                };
                arena[node_idx].kind = new_kind;
                arena[node_idx].bbox = node_bbox;
            }
            Kind::Internal { left, right } => {
                let lb = arena[left.get()].bbox;
                let rb = arena[right.get()].bbox;
                let cost_l = surface_area(&union_aabb(lb, bbox)) - surface_area(&lb);
                let cost_r = surface_area(&union_aabb(rb, bbox)) - surface_area(&rb);
                if cost_l <= cost_r {
                    Self::insert_node(arena, left.get(), slot, bbox, max_leaf);
                } else {
                    Self::insert_node(arena, right.get(), slot, bbox, max_leaf);
                }
                let node_bbox = union_aabb(arena[left.get()].bbox, arena[right.get()].bbox);
                arena[node_idx].kind = Kind::Internal { left, right };
                arena[node_idx].bbox = node_bbox;
            }
        }
    }

    fn is_empty_leaf(node: &Node<T>) -> bool {
        matches!(node.kind, Kind::Leaf(ref v) if v.is_empty())
    }

    fn remove_node(
        arena: &mut Vec<Node<T>>,
        node_idx: usize,
        slot: usize,
        old: &Aabb3D<T>,
    ) -> bool {
        if !arena[node_idx].bbox.contains(old) {
            return false;
        }
        let kind = core::mem::replace(&mut arena[node_idx].kind, Kind::Leaf(Vec::new()));
        let (new_kind, new_bbox, removed) = match kind {
            Kind::Leaf(mut items) => {
                let before = items.len();
                items.retain(|(s, _)| *s != slot);
                let removed = items.len() != before;
                let bbox = Self::bbox_items(&items);
                (Kind::Leaf(items), bbox, removed)
            }
            Kind::Internal { left, right } => {
                let removed = Self::remove_node(arena, left.get(), slot, old)
                    || Self::remove_node(arena, right.get(), slot, old);
                let is_left_empty = Self::is_empty_leaf(&arena[left.get()]);
                let is_right_empty = Self::is_empty_leaf(&arena[right.get()]);
                if removed && is_left_empty != is_right_empty {
                    // Collapse the surviving child into this node.
                    let keep = if is_left_empty { right } else { left };
                    let kind =
                        core::mem::replace(&mut arena[keep.get()].kind, Kind::Leaf(Vec::new()));
                    let bbox = arena[keep.get()].bbox;
                    (kind, bbox, true)
                } else if removed && is_left_empty {
                    (Kind::Leaf(Vec::new()), Self::bbox_items(&[]), true)
                } else {
                    let bbox = union_aabb(arena[left.get()].bbox, arena[right.get()].bbox);
                    (Kind::Internal { left, right }, bbox, removed)
                }
            }
        };
        arena[node_idx].kind = new_kind;
        arena[node_idx].bbox = new_bbox;
        removed
    }

    fn collect<F, G, R>(&self, node_test: F, item_test: G) -> Vec<R>
    where
        F: Fn(&Aabb3D<T>) -> bool,
        G: Fn(usize, &Aabb3D<T>) -> Option<R>,
    {
        let mut out = Vec::new();
        let Some(root_idx) = self.root else {
            return out;
        };
        let mut stack = vec![root_idx];
        while let Some(i) = stack.pop() {
            let n = &self.arena[i.get()];
            if !node_test(&n.bbox) {
                continue;
            }
            match &n.kind {
                Kind::Leaf(items) => {
                    out.extend(items.iter().filter_map(|(s, b)| item_test(*s, b)));
                }
                Kind::Internal { left, right } => {
                    stack.push(*left);
                    stack.push(*right);
                }
            }
        }
        out
    }
}

impl<T: Scalar> Backend<T> for BVH<T> {
    fn insert(&mut self, slot: usize, aabb: Aabb3D<T>) {
        self.ensure_slot(slot, aabb);
        match self.root {
            None => {
                let idx = self.arena.len();
                self.arena.push(Node {
                    bbox: aabb,
                    kind: Kind::Leaf(vec![(slot, aabb)]),
                });
                self.root = Some(NodeIdx::new(idx));
            }
            Some(root_idx) if Self::is_empty_leaf(&self.arena[root_idx.get()]) => {
                self.arena[root_idx.get()] = Node {
                    bbox: aabb,
                    kind: Kind::Leaf(vec![(slot, aabb)]),
                };
            }
            Some(root_idx) => {
                Self::insert_node(&mut self.arena, root_idx.get(), slot, aabb, self.max_leaf);
            }
        }
    }

    fn update(&mut self, slot: usize, aabb: Aabb3D<T>) {
        if let Some(old) = self.slots.get(slot).and_then(|x| *x)
            && let Some(root_idx) = self.root
        {
            let _ = Self::remove_node(&mut self.arena, root_idx.get(), slot, &old);
        }
        self.insert(slot, aabb);
    }

    fn remove(&mut self, slot: usize) {
        if let Some(old) = self.slots.get(slot).and_then(|x| *x)
            && let Some(root_idx) = self.root
        {
            let _ = Self::remove_node(&mut self.arena, root_idx.get(), slot, &old);
            if let Some(s) = self.slots.get_mut(slot) {
                *s = None;
            }
        }
    }

    fn clear(&mut self) {
        self.root = None;
        self.arena.clear();
        self.slots.clear();
    }

    fn rebuild(&mut self, items: &[(usize, Aabb3D<T>)]) {
        self.clear();
        for (slot, aabb) in items {
            self.ensure_slot(*slot, *aabb);
        }
        if !items.is_empty() {
            self.arena.reserve(2 * items.len() / self.max_leaf + 1);
            let root = Self::build(&mut self.arena, items.to_vec(), self.max_leaf);
            self.root = Some(root);
        }
    }

    fn query_point<'a>(&'a self, x: T, y: T, z: T) -> Box<dyn Iterator<Item = usize> + 'a> {
        let out = self.collect(
            |bb| bb.contains_point(x, y, z),
            |s, b| b.contains_point(x, y, z).then_some(s),
        );
        Box::new(out.into_iter())
    }

    fn query_box<'a>(&'a self, aabb: Aabb3D<T>) -> Box<dyn Iterator<Item = usize> + 'a> {
        let out = self.collect(
            |bb| !bb.intersect(&aabb).is_empty(),
            |s, b| (!b.intersect(&aabb).is_empty()).then_some(s),
        );
        Box::new(out.into_iter())
    }

    fn query_ray<'a>(&'a self, ray: Ray3D<T>) -> Box<dyn Iterator<Item = (usize, T)> + 'a> {
        let out = self.collect(
            |bb| bb.ray_entry(&ray).is_some(),
            |s, b| b.ray_entry(&ray).map(|t| (s, t)),
        );
        Box::new(out.into_iter())
    }
}

impl<T: Scalar> Debug for BVH<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let total = self.slots.len();
        let alive = self.slots.iter().filter(|e| e.is_some()).count();
        let has_root = self.root.is_some();
        f.debug_struct("BVH")
            .field("max_leaf", &self.max_leaf)
            .field("arena_nodes", &self.arena.len())
            .field("total_slots", &total)
            .field("alive", &alive)
            .field("has_root", &has_root)
            .finish_non_exhaustive()
    }
}

/// Convenience type aliases for common scalar choices.
/// BVH with f32 coordinates and f64 metrics.
pub type BVHF32 = BVH<f32>;

/// BVH with f64 coordinates and f64 metrics.
pub type BVHF64 = BVH<f64>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Index;

    fn slab(i: usize) -> Aabb3D<f64> {
        let x0 = (i as f64) * 20.0;
        Aabb3D::new(x0, 0.0, 0.0, x0 + 10.0, 10.0, 10.0)
    }

    #[test]
    fn bvh_f64_basic() {
        let mut idx = Index::<f64, u32>::with_bvh();
        let _k1 = idx.insert(Aabb3D::new(0.0, 0.0, 0.0, 10.0, 10.0, 10.0), 1);
        let _k2 = idx.insert(Aabb3D::new(5.0, 5.0, 5.0, 15.0, 15.0, 15.0), 2);
        let _ = idx.commit();
        let hits: Vec<_> = idx.query_point(6.0, 6.0, 6.0).collect();
        assert_eq!(hits.len(), 2);
        let q: Vec<_> = idx
            .query_box(Aabb3D::new(12.0, 12.0, 12.0, 20.0, 20.0, 20.0))
            .collect();
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn bvh_f64_update_move_correctness() {
        let mut b: BVH<f64> = BVH::default();
        b.insert(0, slab(0));
        b.insert(1, slab(1));
        let arena_before = b.arena.len();

        b.update(0, Aabb3D::new(100.0, 100.0, 100.0, 110.0, 110.0, 110.0));

        // Two items fit in the root leaf; moving one must not allocate.
        assert_eq!(b.arena.len(), arena_before);
        let v_old: Vec<_> = b.query_point(5.0, 5.0, 5.0).collect();
        assert!(v_old.is_empty());
        let v_new: Vec<_> = b.query_point(105.0, 105.0, 105.0).collect();
        assert_eq!(v_new, vec![0]);
        let v_neighbor: Vec<_> = b.query_point(25.0, 5.0, 5.0).collect();
        assert_eq!(v_neighbor, vec![1]);
    }

    #[test]
    fn bvh_f64_split_then_updates_on_internal() {
        // Exceed max_leaf (8) to force a split, then move a few items away.
        let mut b: BVH<f64> = BVH::default();
        let n = 12_usize;
        let mut current: Vec<Aabb3D<f64>> = (0..n).map(slab).collect();
        for (i, a) in current.iter().enumerate() {
            b.insert(i, *a);
        }

        let root = b.root.expect("root exists").get();
        assert!(
            matches!(b.arena[root].kind, Kind::Internal { .. }),
            "expected internal root after split"
        );

        for &i in &[0_usize, 5, 9] {
            let x = 1000.0 + i as f64 * 20.0;
            let new_bb = Aabb3D::new(x, 1000.0, 1000.0, x + 10.0, 1010.0, 1010.0);
            b.update(i, new_bb);
            current[i] = new_bb;
        }

        for (i, bb) in current.iter().enumerate() {
            let mx = (bb.min_x + bb.max_x) * 0.5;
            let my = (bb.min_y + bb.max_y) * 0.5;
            let mz = (bb.min_z + bb.max_z) * 0.5;
            let hits: Vec<_> = b.query_point(mx, my, mz).collect();
            assert_eq!(hits, vec![i], "midpoint lookup must return the slot itself");
        }
    }

    #[test]
    fn bulk_rebuild_matches_incremental_queries() {
        let items: Vec<(usize, Aabb3D<f64>)> = (0..200)
            .map(|i| {
                let x = (i % 10) as f64 * 16.0;
                let y = ((i / 10) % 5) as f64 * 16.0;
                let z = (i / 50) as f64 * 16.0;
                (i, Aabb3D::new(x, y, z, x + 8.0, y + 8.0, z + 8.0))
            })
            .collect();
        let mut bulk: BVH<f64> = BVH::default();
        bulk.rebuild(&items);
        let mut incremental: BVH<f64> = BVH::default();
        for (s, a) in &items {
            incremental.insert(*s, *a);
        }

        let query = Aabb3D::new(20.0, 20.0, 0.0, 60.0, 40.0, 40.0);
        let mut a: Vec<_> = bulk.query_box(query).collect();
        let mut b: Vec<_> = incremental.query_box(query).collect();
        a.sort_unstable();
        b.sort_unstable();
        assert!(!a.is_empty());
        assert_eq!(a, b);

        let ray = Ray3D::new([-10.0, 4.0, 4.0], [1.0, 0.0, 0.0]);
        let mut hits: Vec<_> = bulk.query_ray(ray).map(|(s, _)| s).collect();
        hits.sort_unstable();
        assert_eq!(hits, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn removing_everything_leaves_an_empty_root() {
        let mut b: BVH<f64> = BVH::with_max_leaf(2);
        for i in 0..9 {
            b.insert(i, slab(i));
        }
        for i in 0..9 {
            b.remove(i);
        }
        assert_eq!(b.query_box(slab(4)).count(), 0);
        b.insert(3, slab(3));
        let hits: Vec<_> = b.query_point(65.0, 5.0, 5.0).collect();
        assert_eq!(hits, vec![3]);
    }
}
