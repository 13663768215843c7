// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Brushwork Index: a generic 3D AABB index for scene picking.
//!
//! Brushwork Index is the spatial building block underneath the Brushwork scene tree.
//!
//! - Insert, update, and remove axis-aligned bounding boxes (AABBs) with user payloads.
//! - Query by point, intersecting box, or ray (nearest hit first).
//! - Batch updates with [`Index::commit`] and receive coarse damage (added/removed/moved boxes).
//! - Rebuild the whole backend in one pass with [`IndexGeneric::rebuild`] after a bulk load.
//!
//! It is generic over the float scalar type `T` and does not depend on any geometry crate.
//! Higher layers compute world-space AABBs and feed them here.
//!
//! # Example
//!
//! ```rust
//! use brushwork_index::{Aabb3D, Index, Ray3D};
//!
//! let mut idx = Index::<f64, u32>::with_bvh();
//! let k1 = idx.insert(Aabb3D::new(0.0, 0.0, 0.0, 10.0, 10.0, 10.0), 1);
//! let _k2 = idx.insert(Aabb3D::new(20.0, 0.0, 0.0, 30.0, 10.0, 10.0), 2);
//! let _damage0 = idx.commit();
//!
//! // Move the first box and commit a damage set.
//! idx.update(k1, Aabb3D::new(40.0, 0.0, 0.0, 50.0, 10.0, 10.0));
//! let damage = idx.commit();
//! assert!(!damage.is_empty());
//!
//! // Cast a ray along +x: box 2 is now in front of box 1.
//! let hits = idx.query_ray(Ray3D::new([0.0, 5.0, 5.0], [1.0, 0.0, 0.0]));
//! let order: Vec<u32> = hits.iter().map(|h| h.1).collect();
//! assert_eq!(order, [2, 1]);
//! ```
//!
//! ## Choosing a backend
//!
//! - `FlatVec` (default): simplest and smallest, linear scans. Good for very small sets
//!   or when inserts/updates vastly outnumber queries.
//! - `BVHF32`/`BVHF64`: binary hierarchy with SAH-like splits; excels when bulk-build
//!   and query performance matter. See the [`backends`] docs for a brief SAH overview.
//!
//! ### Float semantics
//!
//! This crate assumes no NaNs for floating-point coordinates.
//! SAH metrics use widened accumulators to reduce precision pitfalls.

#![no_std]

extern crate alloc;

pub mod backend;
pub mod backends;
pub mod damage;
pub mod index;
pub mod types;

pub use backend::Backend;
pub use backends::bvh::{BVH, BVHF32, BVHF64};
pub use backends::flatvec::FlatVec;
pub use damage::Damage;
pub use index::{Index, IndexGeneric, Key};
pub use types::{Aabb3D, Ray3D, Scalar};
