// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend implementations for different spatial strategies.
//!
//! - `flatvec`: flat vector with linear scans (small, simple).
//! - `bvh`: generic BVH (`T: Scalar`) with SAH-like split (aliases: `BVHF32`, `BVHF64`).
//!
//! SAH note
//! --------
//! The BVH uses an SAH-like split heuristic.
//! For a split point `k` along a sorted axis we minimize:
//!
//! `cost(k) = area(LB_k) * k + area(RB_k) * (n - k)`
//!
//! where `LB_k` and `RB_k` are the bounding boxes of the first `k` and remaining `n - k` items
//! and `area` is half the surface area of a box.
//! We evaluate all `k` in O(n) per axis using prefix/suffix bounding boxes, and pick the lowest cost
//! over the three axes. Accumulators are widened (`f32`→`f64`) for robust comparisons.
//! [`Backend::rebuild`](crate::Backend::rebuild) applies the same split top-down to build the
//! whole hierarchy in one pass.

pub mod bvh;
pub mod flatvec;
