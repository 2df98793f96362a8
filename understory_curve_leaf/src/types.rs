// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Primitive identifiers, axes, and box helpers.

use glam::Vec3;

/// Reference to one curve primitive inside a scene.
///
/// Ordering follows [`PrimRef::id64`]: geometry id first, then primitive id.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PrimRef {
    /// Geometry the primitive belongs to.
    pub geom_id: u32,
    /// Primitive index within its geometry.
    pub prim_id: u32,
}

impl PrimRef {
    /// Create a reference from geometry and primitive ids.
    #[inline(always)]
    pub const fn new(geom_id: u32, prim_id: u32) -> Self {
        Self { geom_id, prim_id }
    }

    /// Combined identifier `(geom_id << 32) | prim_id`.
    #[inline]
    pub const fn id64(self) -> u64 {
        ((self.geom_id as u64) << 32) | self.prim_id as u64
    }
}

/// One of the three local frame axes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    /// First axis.
    X,
    /// Second axis.
    Y,
    /// Third axis.
    Z,
}

impl Axis {
    /// All axes in storage order.
    pub const ALL: [Self; 3] = [Self::X, Self::Y, Self::Z];

    /// Position of the axis in storage order.
    #[inline(always)]
    pub const fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }
}

/// Axis-aligned box in 3D.
///
/// An empty box has `lower > upper` on every axis so that [`Bounds3::extend`]
/// and [`Bounds3::union`] work without special cases.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bounds3 {
    /// Minimum corner.
    pub lower: Vec3,
    /// Maximum corner.
    pub upper: Vec3,
}

impl Default for Bounds3 {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Bounds3 {
    /// The empty box.
    pub const EMPTY: Self = Self {
        lower: Vec3::INFINITY,
        upper: Vec3::NEG_INFINITY,
    };

    /// Create a box from its corners.
    #[inline(always)]
    pub const fn new(lower: Vec3, upper: Vec3) -> Self {
        Self { lower, upper }
    }

    /// The smallest box containing all `points`.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut out = Self::EMPTY;
        for p in points {
            out.extend(p);
        }
        out
    }

    /// Grow to include `p`.
    #[inline]
    pub fn extend(&mut self, p: Vec3) {
        self.lower = self.lower.min(p);
        self.upper = self.upper.max(p);
    }

    /// The smallest box enclosing both boxes.
    #[inline]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            lower: self.lower.min(other.lower),
            upper: self.upper.max(other.upper),
        }
    }

    /// Grow by `r` on every side.
    #[inline]
    pub fn enlarge(&self, r: f32) -> Self {
        Self {
            lower: self.lower - Vec3::splat(r),
            upper: self.upper + Vec3::splat(r),
        }
    }

    /// Extent along each axis. Negative for empty boxes.
    #[inline]
    pub fn size(&self) -> Vec3 {
        self.upper - self.lower
    }

    /// Return true if the box is inverted on any axis. Degenerate (flat) boxes are not empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lower.cmpgt(self.upper).any()
    }

    /// Whether the box contains `p`, edges included.
    #[inline]
    pub fn contains_point(&self, p: Vec3) -> bool {
        self.lower.cmple(p).all() && p.cmple(self.upper).all()
    }

    /// Whether `other` lies entirely inside this box.
    #[inline]
    pub fn contains(&self, other: &Self) -> bool {
        self.lower.cmple(other.lower).all() && other.upper.cmple(self.upper).all()
    }

    /// Whether both corners are finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.lower.is_finite() && self.upper.is_finite()
    }
}
