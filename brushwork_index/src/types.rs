// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Primitive geometry types and helpers.

use core::cmp::Ordering;
use core::fmt::Debug;

/// Axis-aligned bounding box in 3D.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Aabb3D<T> {
    /// Minimum x
    pub min_x: T,
    /// Minimum y
    pub min_y: T,
    /// Minimum z
    pub min_z: T,
    /// Maximum x
    pub max_x: T,
    /// Maximum y
    pub max_y: T,
    /// Maximum z
    pub max_z: T,
}

impl<T> Aabb3D<T> {
    /// Create a new AABB from min/max corners.
    pub const fn new(min_x: T, min_y: T, min_z: T, max_x: T, max_y: T, max_z: T) -> Self {
        Self {
            min_x,
            min_y,
            min_z,
            max_x,
            max_y,
            max_z,
        }
    }
}

impl<T: Copy + PartialOrd> Aabb3D<T> {
    /// Whether this AABB contains the point.
    pub fn contains_point(&self, x: T, y: T, z: T) -> bool {
        le(self.min_x, x)
            && le(self.min_y, y)
            && le(self.min_z, z)
            && le(x, self.max_x)
            && le(y, self.max_y)
            && le(z, self.max_z)
    }

    /// Whether `other` lies entirely inside this AABB.
    pub fn contains(&self, other: &Self) -> bool {
        le(self.min_x, other.min_x)
            && le(self.min_y, other.min_y)
            && le(self.min_z, other.min_z)
            && le(other.max_x, self.max_x)
            && le(other.max_y, self.max_y)
            && le(other.max_z, self.max_z)
    }

    /// The intersection of two AABBs.
    pub fn intersect(&self, other: &Self) -> Self {
        Self {
            min_x: max_t(self.min_x, other.min_x),
            min_y: max_t(self.min_y, other.min_y),
            min_z: max_t(self.min_z, other.min_z),
            max_x: min_t(self.max_x, other.max_x),
            max_y: min_t(self.max_y, other.max_y),
            max_z: min_t(self.max_z, other.max_z),
        }
    }

    /// The smallest AABB enclosing both.
    pub fn union(&self, other: &Self) -> Self {
        union_aabb(*self, *other)
    }

    /// Return true if the AABB is inverted on any axis. Assumes no NaN.
    ///
    /// Degenerate boxes (zero extent on an axis) are not empty, so flat
    /// geometry such as a planar patch still intersects queries.
    pub fn is_empty(&self) -> bool {
        lt(self.max_x, self.min_x) || lt(self.max_y, self.min_y) || lt(self.max_z, self.min_z)
    }

    pub(crate) fn axis(&self, axis: usize) -> (T, T) {
        match axis {
            0 => (self.min_x, self.max_x),
            1 => (self.min_y, self.max_y),
            _ => (self.min_z, self.max_z),
        }
    }
}

impl<T: Scalar> Aabb3D<T> {
    /// Create an AABB from a minimum corner and a size.
    pub fn from_min_size(min: [T; 3], size: [T; 3]) -> Self {
        Self {
            min_x: min[0],
            min_y: min[1],
            min_z: min[2],
            max_x: T::add(min[0], size[0]),
            max_y: T::add(min[1], size[1]),
            max_z: T::add(min[2], size[2]),
        }
    }

    /// Entry distance of `ray` into this box, or `None` if the ray misses.
    ///
    /// A ray starting inside the box reports distance zero.
    pub fn ray_entry(&self, ray: &Ray3D<T>) -> Option<T> {
        let mut t_min = T::zero();
        let mut t_max = T::infinity();
        for axis in 0..3 {
            let (lo, hi) = self.axis(axis);
            let o = ray.origin[axis];
            let d = ray.direction[axis];
            if d == T::zero() {
                if lt(o, lo) || lt(hi, o) {
                    return None;
                }
                continue;
            }
            let inv = T::div(T::one(), d);
            let mut t0 = T::mul(T::sub(lo, o), inv);
            let mut t1 = T::mul(T::sub(hi, o), inv);
            if lt(t1, t0) {
                core::mem::swap(&mut t0, &mut t1);
            }
            t_min = max_t(t_min, t0);
            t_max = min_t(t_max, t1);
            if lt(t_max, t_min) {
                return None;
            }
        }
        Some(t_min)
    }
}

/// A half-line used for picking queries.
///
/// The direction need not be normalized; hit distances are expressed in
/// multiples of the direction's length.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Ray3D<T> {
    /// Ray origin.
    pub origin: [T; 3],
    /// Ray direction.
    pub direction: [T; 3],
}

impl<T> Ray3D<T> {
    /// Create a ray from origin and direction.
    pub const fn new(origin: [T; 3], direction: [T; 3]) -> Self {
        Self { origin, direction }
    }
}

/// Numeric scalar abstraction for 3D AABBs used by backends.
///
/// This trait provides the operations required for SAH metrics, centroid
/// computations and ray slab tests, and an associated widened accumulator
/// type for surface areas (f32→f64).
pub trait Scalar: Copy + PartialOrd + Debug {
    /// Widened accumulator type suitable for area/cost computations.
    type Acc: Copy
        + PartialOrd
        + core::ops::Add<Output = Self::Acc>
        + core::ops::Sub<Output = Self::Acc>
        + core::ops::Mul<Output = Self::Acc>
        + Debug;

    /// Add two scalar values.
    fn add(a: Self, b: Self) -> Self;

    /// Subtract two scalar values: a - b.
    fn sub(a: Self, b: Self) -> Self;

    /// Multiply two scalar values.
    fn mul(a: Self, b: Self) -> Self;

    /// Divide two scalar values: a / b.
    fn div(a: Self, b: Self) -> Self;

    /// Zero value for the scalar type.
    fn zero() -> Self;

    /// One value for the scalar type.
    fn one() -> Self;

    /// Positive infinity.
    fn infinity() -> Self;

    /// Max of the scalar value and zero.
    fn max_zero(v: Self) -> Self;

    /// Midpoint between a and b (used for centroid ordering).
    fn mid(a: Self, b: Self) -> Self;

    /// Convert a scalar to the accumulator type.
    fn widen(v: Self) -> Self::Acc;

    /// Convert a `usize` to the accumulator type (for SAH weighting).
    fn acc_from_usize(n: usize) -> Self::Acc;
}

impl Scalar for f32 {
    type Acc = f64;

    #[inline]
    fn add(a: Self, b: Self) -> Self {
        a + b
    }

    #[inline]
    fn sub(a: Self, b: Self) -> Self {
        a - b
    }

    #[inline]
    fn mul(a: Self, b: Self) -> Self {
        a * b
    }

    #[inline]
    fn div(a: Self, b: Self) -> Self {
        a / b
    }

    #[inline]
    fn zero() -> Self {
        0.0
    }

    #[inline]
    fn one() -> Self {
        1.0
    }

    #[inline]
    fn infinity() -> Self {
        Self::INFINITY
    }

    #[inline]
    fn max_zero(v: Self) -> Self {
        v.max(0.0)
    }

    #[inline]
    fn mid(a: Self, b: Self) -> Self {
        0.5 * (a + b)
    }

    #[inline]
    fn widen(v: Self) -> Self::Acc {
        v as f64
    }

    #[inline]
    fn acc_from_usize(n: usize) -> Self::Acc {
        n as f64
    }
}

impl Scalar for f64 {
    type Acc = Self;

    #[inline]
    fn add(a: Self, b: Self) -> Self {
        a + b
    }

    #[inline]
    fn sub(a: Self, b: Self) -> Self {
        a - b
    }

    #[inline]
    fn mul(a: Self, b: Self) -> Self {
        a * b
    }

    #[inline]
    fn div(a: Self, b: Self) -> Self {
        a / b
    }

    #[inline]
    fn zero() -> Self {
        0.0
    }

    #[inline]
    fn one() -> Self {
        1.0
    }

    #[inline]
    fn infinity() -> Self {
        Self::INFINITY
    }

    #[inline]
    fn max_zero(v: Self) -> Self {
        v.max(0.0)
    }

    #[inline]
    fn mid(a: Self, b: Self) -> Self {
        0.5 * (a + b)
    }

    #[inline]
    fn widen(v: Self) -> Self::Acc {
        v
    }

    #[inline]
    fn acc_from_usize(n: usize) -> Self::Acc {
        n as Self::Acc
    }
}

/// Half the surface area of an AABB, in the scalar's widened accumulator type.
///
/// SAH only compares costs, so the constant factor is dropped.
#[inline]
pub fn surface_area<T: Scalar>(a: &Aabb3D<T>) -> T::Acc {
    let w = T::widen(T::max_zero(T::sub(a.max_x, a.min_x)));
    let h = T::widen(T::max_zero(T::sub(a.max_y, a.min_y)));
    let d = T::widen(T::max_zero(T::sub(a.max_z, a.min_z)));
    w * h + h * d + d * w
}

/// Helper alias for the widened accumulator type associated with a scalar `T`.
pub type ScalarAcc<T> = <T as Scalar>::Acc;

pub(crate) fn min_t<T: PartialOrd + Copy>(a: T, b: T) -> T {
    match a.partial_cmp(&b) {
        Some(Ordering::Greater) => b,
        _ => a,
    }
}

pub(crate) fn max_t<T: PartialOrd + Copy>(a: T, b: T) -> T {
    match a.partial_cmp(&b) {
        Some(Ordering::Less) => b,
        _ => a,
    }
}

pub(crate) fn le<T: PartialOrd>(a: T, b: T) -> bool {
    a.partial_cmp(&b)
        .map(|o| o != Ordering::Greater)
        .unwrap_or(false)
}

pub(crate) fn lt<T: PartialOrd>(a: T, b: T) -> bool {
    a.partial_cmp(&b)
        .map(|o| o == Ordering::Less)
        .unwrap_or(false)
}

pub(crate) fn union_aabb<T: PartialOrd + Copy>(a: Aabb3D<T>, b: Aabb3D<T>) -> Aabb3D<T> {
    Aabb3D {
        min_x: min_t(a.min_x, b.min_x),
        min_y: min_t(a.min_y, b.min_y),
        min_z: min_t(a.min_z, b.min_z),
        max_x: max_t(a.max_x, b.max_x),
        max_y: max_t(a.max_y, b.max_y),
        max_z: max_t(a.max_z, b.max_z),
    }
}
