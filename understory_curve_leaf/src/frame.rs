// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Aligned space estimation for groups of curve segments.
//!
//! Curves are thin, so an axis-aligned box around a near-linear segment wastes
//! most of its volume. [`estimate_frame`] picks an orthonormal frame whose
//! z-axis follows the chord of one curve in the group; boxes taken in that
//! frame hug the curve much more tightly.
//!
//! The curve that defines the frame is the one with the lowest
//! [`PrimRef::id64`] among those with a usable chord, which makes the choice
//! independent of the order primitives arrive in.

use glam::Vec3;

use crate::curve::BezierCurve;
use crate::geometry::CurveSource;
use crate::types::PrimRef;

/// Squared length below which a direction is considered degenerate.
pub const MIN_SQR_LENGTH: f32 = 1e-18;

/// Affine normalization `(p - offset) * scale` shared by all primitives of a leaf.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Normalization {
    /// Subtracted from every world-space point.
    pub offset: Vec3,
    /// Uniform scale applied after the offset.
    pub scale: f32,
}

impl Default for Normalization {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Normalization {
    /// No-op normalization.
    pub const IDENTITY: Self = Self {
        offset: Vec3::ZERO,
        scale: 1.0,
    };

    /// Create a normalization from offset and scale.
    #[inline(always)]
    pub const fn new(offset: Vec3, scale: f32) -> Self {
        Self { offset, scale }
    }

    /// Map a world-space point into normalized space.
    #[inline]
    pub fn apply(&self, p: Vec3) -> Vec3 {
        (p - self.offset) * self.scale
    }
}

/// A 3×3 linear frame with axes `vx`, `vy`, `vz`.
///
/// Frames produced by [`estimate_frame`] are orthonormal and right-handed.
/// The quantizer also uses this type for its scaled integer axes, which are
/// only approximately orthogonal.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AlignedSpace {
    /// Local x-axis.
    pub vx: Vec3,
    /// Local y-axis.
    pub vy: Vec3,
    /// Local z-axis (tangent direction).
    pub vz: Vec3,
}

impl Default for AlignedSpace {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl AlignedSpace {
    /// The world frame.
    pub const IDENTITY: Self = Self {
        vx: Vec3::X,
        vy: Vec3::Y,
        vz: Vec3::Z,
    };

    /// Create a frame from its axes.
    #[inline(always)]
    pub const fn new(vx: Vec3, vy: Vec3, vz: Vec3) -> Self {
        Self { vx, vy, vz }
    }

    /// Complete an orthonormal frame around the unit vector `vz`.
    ///
    /// The x seed is whichever of `X × vz` and `Y × vz` is longer, so the
    /// result is deterministic and well conditioned for any direction.
    pub fn from_z(vz: Vec3) -> Self {
        let dx0 = Vec3::X.cross(vz);
        let dx1 = Vec3::Y.cross(vz);
        let vx = if dx0.length_squared() > dx1.length_squared() {
            dx0
        } else {
            dx1
        }
        .normalize();
        let vy = vz.cross(vx).normalize();
        Self { vx, vy, vz }
    }

    /// Coordinates of `v` along each axis: `(vx·v, vy·v, vz·v)`.
    #[inline]
    pub fn xfm_vector(&self, v: Vec3) -> Vec3 {
        Vec3::new(self.vx.dot(v), self.vy.dot(v), self.vz.dot(v))
    }

    /// Axes in storage order.
    #[inline]
    pub fn axes(&self) -> [Vec3; 3] {
        [self.vx, self.vy, self.vz]
    }

    /// Whether all axes have unit length and are mutually orthogonal within `tolerance`.
    pub fn is_orthonormal(&self, tolerance: f32) -> bool {
        let near = |a: f32, b: f32| a - b <= tolerance && b - a <= tolerance;
        self.axes().iter().all(|a| near(a.length_squared(), 1.0))
            && near(self.vx.dot(self.vy), 0.0)
            && near(self.vy.dot(self.vz), 0.0)
            && near(self.vz.dot(self.vx), 0.0)
    }
}

/// Estimate an aligned space for the primitives in `prims`.
///
/// Curves are evaluated under `norm`. Primitives that `source` cannot resolve
/// are treated like curves with a degenerate chord. See
/// [`estimate_frame_from`] for the selection rule.
pub fn estimate_frame<S: CurveSource + ?Sized>(
    source: &S,
    prims: &[PrimRef],
    norm: Normalization,
) -> AlignedSpace {
    estimate_frame_from(
        prims
            .iter()
            .filter_map(|p| source.curve(*p).map(|c| (p.id64(), c))),
        norm,
    )
}

/// Estimate an aligned space from already resolved `(id64, curve)` candidates.
///
/// Selects the candidate with the lowest id whose normalized chord is longer
/// than [`MIN_SQR_LENGTH`]. Its chord becomes the z-axis and the cross
/// product of the chord with the start tangent the y-axis. When no candidate
/// has a usable chord the z-axis defaults to world Z, and when the y-axis is
/// degenerate the frame is completed from z alone via
/// [`AlignedSpace::from_z`]. Never fails.
pub fn estimate_frame_from<I>(candidates: I, norm: Normalization) -> AlignedSpace
where
    I: IntoIterator<Item = (u64, BezierCurve)>,
{
    let mut best: Option<(u64, Vec3, Vec3)> = None;
    for (id, curve) in candidates {
        if best.is_some_and(|(best_id, ..)| id >= best_id) {
            continue;
        }
        let curve = curve.normalized(norm);
        let chord = curve.end() - curve.begin();
        if chord.length_squared() > MIN_SQR_LENGTH {
            let axisz = chord.normalize();
            let axisy = axisz.cross(curve.eval_du(0.0));
            best = Some((id, axisz, axisy));
        }
    }

    let Some((_, axisz, axisy)) = best else {
        return AlignedSpace::from_z(Vec3::Z);
    };
    if axisy.length_squared() > MIN_SQR_LENGTH {
        let axisy = axisy.normalize();
        let axisx = axisy.cross(axisz).normalize();
        AlignedSpace::new(axisx, axisy, axisz)
    } else {
        AlignedSpace::from_z(axisz)
    }
}
