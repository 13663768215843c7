// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Axis-aligned boxes, rays, and conversions into the index's scalar types.

use brushwork_index::{Aabb3D, Ray3D};
use glam::{DMat4, DVec3};

/// Axis-aligned bounding box in world space.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BBox3 {
    /// Minimum corner.
    pub min: DVec3,
    /// Maximum corner.
    pub max: DVec3,
}

impl BBox3 {
    /// The degenerate box at the origin; bounds of an empty container.
    pub const ZERO: Self = Self {
        min: DVec3::ZERO,
        max: DVec3::ZERO,
    };

    /// Create a box from corners, reordering components so `min <= max`.
    pub fn new(a: DVec3, b: DVec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// A cube centered on the origin with the given half extent.
    pub fn cube(half: f64) -> Self {
        Self {
            min: DVec3::splat(-half),
            max: DVec3::splat(half),
        }
    }

    /// The smallest box containing all points, or `None` for an empty iterator.
    pub fn from_points(points: impl IntoIterator<Item = DVec3>) -> Option<Self> {
        let mut it = points.into_iter();
        let first = it.next()?;
        Some(it.fold(Self::new(first, first), |b, p| b.include_point(p)))
    }

    /// Grow the box to include `p`.
    pub fn include_point(self, p: DVec3) -> Self {
        Self {
            min: self.min.min(p),
            max: self.max.max(p),
        }
    }

    /// The smallest box containing both.
    pub fn union(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Whether `other` lies entirely inside this box.
    pub fn contains(&self, other: &Self) -> bool {
        self.min.cmple(other.min).all() && other.max.cmple(self.max).all()
    }

    /// Whether the point lies inside this box (inclusive).
    pub fn contains_point(&self, p: DVec3) -> bool {
        self.min.cmple(p).all() && p.cmple(self.max).all()
    }

    /// Whether the boxes overlap (touching counts).
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.cmple(other.max).all() && other.min.cmple(self.max).all()
    }

    /// Box center.
    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Box extent along each axis.
    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }

    /// The box moved by `delta`.
    pub fn translate(self, delta: DVec3) -> Self {
        Self {
            min: self.min + delta,
            max: self.max + delta,
        }
    }

    /// The eight corners.
    pub fn corners(&self) -> [DVec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            DVec3::new(a.x, a.y, a.z),
            DVec3::new(b.x, a.y, a.z),
            DVec3::new(a.x, b.y, a.z),
            DVec3::new(b.x, b.y, a.z),
            DVec3::new(a.x, a.y, b.z),
            DVec3::new(b.x, a.y, b.z),
            DVec3::new(a.x, b.y, b.z),
            DVec3::new(b.x, b.y, b.z),
        ]
    }

    /// Conservative box around the transformed corners.
    pub fn transform(&self, m: &DMat4) -> Self {
        let [first, rest @ ..] = self.corners().map(|c| m.transform_point3(c));
        rest.into_iter()
            .fold(Self::new(first, first), |b, p| b.include_point(p))
    }

    /// Component-wise approximate equality.
    pub fn abs_diff_eq(&self, other: &Self, epsilon: f64) -> bool {
        self.min.abs_diff_eq(other.min, epsilon) && self.max.abs_diff_eq(other.max, epsilon)
    }
}

/// Logical and physical bounds of a node.
///
/// Logical bounds are the placement box; physical bounds additionally cover visual extent such
/// as an entity's model. Physical bounds always contain logical bounds.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NodeBounds {
    /// Placement box.
    pub logical: BBox3,
    /// Placement plus visual extent.
    pub physical: BBox3,
}

impl NodeBounds {
    /// Both boxes equal to `b`.
    pub const fn uniform(b: BBox3) -> Self {
        Self {
            logical: b,
            physical: b,
        }
    }

    /// Field-wise union.
    pub fn union(self, other: Self) -> Self {
        Self {
            logical: self.logical.union(other.logical),
            physical: self.physical.union(other.physical),
        }
    }
}

/// A picking ray in world space. The direction need not be normalized.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Ray3 {
    /// Ray origin.
    pub origin: DVec3,
    /// Ray direction.
    pub direction: DVec3,
}

impl Ray3 {
    /// Create a ray.
    pub const fn new(origin: DVec3, direction: DVec3) -> Self {
        Self { origin, direction }
    }

    /// The point at distance `t` along the ray.
    pub fn point_at(&self, t: f64) -> DVec3 {
        self.origin + self.direction * t
    }
}

pub(crate) fn bbox_to_aabb(b: BBox3) -> Aabb3D<f64> {
    Aabb3D::new(b.min.x, b.min.y, b.min.z, b.max.x, b.max.y, b.max.z)
}

pub(crate) fn ray_to_index(r: Ray3) -> Ray3D<f64> {
    Ray3D::new(r.origin.to_array(), r.direction.to_array())
}
