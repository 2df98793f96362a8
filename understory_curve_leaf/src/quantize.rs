// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fixed-point encoding of aligned spaces and local bounds.
//!
//! A leaf normalizes its primitives into a region whose diagonal is at most
//! [`NORMALIZED_DIAGONAL`] units. Frame axes are stored as `i8` components
//! scaled by [`AXIS_SCALE`], so a normalized point projects onto a stored axis
//! with magnitude at most `AXIS_SCALE * NORMALIZED_DIAGONAL`, which must fit
//! the `i16` bound range. Changing either constant (or the field widths)
//! must keep that relationship; the compile-time checks below enforce it.
//!
//! Frames are truncated toward zero, which is fine because bounds are taken
//! in the truncated frame itself. Bounds are rounded outward so the stored
//! box never undercuts the geometry. An axis whose rounded bounds coincide
//! (a flat box, e.g. a zero-radius planar curve) gets one extra unit on each
//! side, since points reconstructed in `f32` can land a few ulps off the
//! exact integer.

use glam::Vec3;

use crate::curve::BezierCurve;
use crate::frame::{AlignedSpace, Normalization};
use crate::types::{Axis, Bounds3};

/// Scale applied to unit frame axes before truncation to `i8`.
pub const AXIS_SCALE: i32 = 126;

/// Largest magnitude of a stored bound.
pub const BOUND_LIMIT: i32 = i16::MAX as i32;

/// Upper bound on the diagonal of a leaf's normalized region.
pub const NORMALIZED_DIAGONAL: i32 = 256;

const _: () = assert!(
    AXIS_SCALE < i8::MAX as i32,
    "axis components need headroom below i8::MAX"
);
const _: () = assert!(
    AXIS_SCALE * NORMALIZED_DIAGONAL < BOUND_LIMIT,
    "normalized region projected on a stored axis must fit the i16 bound range"
);

/// Frame axes in fixed point: each axis is `trunc(AXIS_SCALE * axis)`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct QuantizedSpace {
    /// Components of the x-axis.
    pub vx: [i8; 3],
    /// Components of the y-axis.
    pub vy: [i8; 3],
    /// Components of the z-axis.
    pub vz: [i8; 3],
}

impl QuantizedSpace {
    /// Quantize a unit frame.
    pub fn from_space(space: &AlignedSpace) -> Self {
        let [vx, vy, vz] = space.axes().map(quantize_axis);
        Self { vx, vy, vz }
    }

    /// Stored components of `axis`.
    #[inline]
    pub fn axis(&self, axis: Axis) -> [i8; 3] {
        match axis {
            Axis::X => self.vx,
            Axis::Y => self.vy,
            Axis::Z => self.vz,
        }
    }

    /// The scaled integer axes as floats (lengths close to [`AXIS_SCALE`]).
    pub fn to_space(&self) -> AlignedSpace {
        let f = |a: [i8; 3]| Vec3::new(f32::from(a[0]), f32::from(a[1]), f32::from(a[2]));
        AlignedSpace::new(f(self.vx), f(self.vy), f(self.vz))
    }

    /// Length of the longest stored axis.
    pub fn max_axis_length(&self) -> f32 {
        let s = self.to_space();
        s.vx.length().max(s.vy.length()).max(s.vz.length())
    }
}

fn quantize_axis(axis: Vec3) -> [i8; 3] {
    let scaled = (axis * AXIS_SCALE as f32).trunc();
    scaled.to_array().map(quantize_component)
}

#[allow(
    clippy::cast_possible_truncation,
    reason = "Value is clamped to the i8 axis range before the cast."
)]
fn quantize_component(v: f32) -> i8 {
    debug_assert!(
        (-127.0..=127.0).contains(&v),
        "axis component {v} out of range; frame axes must be unit length"
    );
    let limit = AXIS_SCALE as f32;
    v.clamp(-limit, limit) as i8
}

/// Local bounds in fixed point, rounded outward.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct QuantizedBounds {
    /// Lower bound along each local axis.
    pub lower: [i16; 3],
    /// Upper bound along each local axis.
    pub upper: [i16; 3],
}

impl QuantizedBounds {
    /// Quantize `bounds`, flooring lower and ceiling upper values.
    ///
    /// Axes where both values round to the same integer are widened by one
    /// unit in each direction.
    pub fn from_bounds(bounds: &Bounds3) -> Self {
        debug_assert!(!bounds.is_empty(), "cannot quantize empty bounds");
        let lower = bounds.lower.floor();
        let upper = bounds.upper.ceil();
        let flat = lower.cmpeq(upper);
        Self {
            lower: Vec3::select(flat, lower - 1.0, lower)
                .to_array()
                .map(quantize_bound),
            upper: Vec3::select(flat, upper + 1.0, upper)
                .to_array()
                .map(quantize_bound),
        }
    }

    /// Stored `(lower, upper)` along `axis`.
    #[inline]
    pub fn axis(&self, axis: Axis) -> (i16, i16) {
        (self.lower[axis.index()], self.upper[axis.index()])
    }

    /// The stored box as floats.
    pub fn to_bounds(&self) -> Bounds3 {
        let f = |a: [i16; 3]| Vec3::new(f32::from(a[0]), f32::from(a[1]), f32::from(a[2]));
        Bounds3::new(f(self.lower), f(self.upper))
    }
}

#[allow(
    clippy::cast_possible_truncation,
    reason = "Value is an integer clamped to the i16 bound range before the cast."
)]
fn quantize_bound(v: f32) -> i16 {
    let limit = BOUND_LIMIT as f32;
    debug_assert!(
        (-limit..=limit).contains(&v),
        "bound {v} out of range; leaf normalization is too coarse"
    );
    v.clamp(-limit, limit) as i16
}

/// One primitive's packed fields as stored in a leaf.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PackedPrimitive {
    /// Primitive id within the leaf's geometry.
    pub prim_id: u32,
    /// Quantized aligned space.
    pub space: QuantizedSpace,
    /// Quantized bounds in that space.
    pub bounds: QuantizedBounds,
}

impl PackedPrimitive {
    /// Pack a quantized frame with bounds already taken in that frame.
    ///
    /// `local_bounds` must be measured along the axes of `space.to_space()`,
    /// with radii inflated by at least `space.max_axis_length()`.
    pub fn pack(prim_id: u32, space: QuantizedSpace, local_bounds: &Bounds3) -> Self {
        Self {
            prim_id,
            space,
            bounds: QuantizedBounds::from_bounds(local_bounds),
        }
    }

    /// Pack `curve` (world space) with its unit `frame` under the leaf normalization.
    ///
    /// Bounds are computed in the truncated frame, with the radius inflated by
    /// the longest truncated axis, so they are conservative for the frame that
    /// readers reconstruct.
    pub fn encode(
        prim_id: u32,
        frame: &AlignedSpace,
        curve: &BezierCurve,
        norm: Normalization,
    ) -> Self {
        let space = QuantizedSpace::from_space(frame);
        let local = curve
            .normalized(norm)
            .local_bounds(&space.to_space(), space.max_axis_length());
        Self::pack(prim_id, space, &local)
    }

    /// Coordinates of world point `p` in this primitive's quantized frame.
    #[inline]
    pub fn local_point(&self, norm: Normalization, p: Vec3) -> Vec3 {
        self.space.to_space().xfm_vector(norm.apply(p))
    }

    /// Whether world point `p` lies inside the stored oriented box.
    pub fn contains_point(&self, norm: Normalization, p: Vec3) -> bool {
        self.bounds.to_bounds().contains_point(self.local_point(norm, p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::estimate_frame_from;

    #[test]
    fn identity_quantizes_to_axis_scale() {
        let q = QuantizedSpace::from_space(&AlignedSpace::IDENTITY);
        assert_eq!(q.vx, [126, 0, 0]);
        assert_eq!(q.vy, [0, 126, 0]);
        assert_eq!(q.vz, [0, 0, 126]);
        assert_eq!(q.max_axis_length(), 126.0);
    }

    #[test]
    fn components_truncate_toward_zero() {
        let d = Vec3::new(1.0, -1.0, 1.0).normalize();
        let q = QuantizedSpace::from_space(&AlignedSpace::from_z(d));
        // 126 / sqrt(3) = 72.74...
        assert_eq!(q.vz, [72, -72, 72]);
        for axis in Axis::ALL {
            for c in q.axis(axis) {
                assert!((-126..=126).contains(&c));
            }
        }
        assert!(q.max_axis_length() <= 126.0);
    }

    #[test]
    fn bounds_round_outward() {
        let b = Bounds3::new(Vec3::new(-1.5, 0.2, 3.0), Vec3::new(-0.5, 0.2, 3.5));
        let q = QuantizedBounds::from_bounds(&b);
        assert_eq!(q.lower, [-2, 0, 3]);
        assert_eq!(q.upper, [0, 1, 4]);
        assert!(q.to_bounds().contains(&b));
        for axis in Axis::ALL {
            let (lo, hi) = q.axis(axis);
            assert!(lo <= hi);
        }
    }

    #[test]
    fn flat_axes_are_widened() {
        let b = Bounds3::new(Vec3::new(0.0, 2.0, -0.5), Vec3::new(0.0, 2.0, 0.5));
        let q = QuantizedBounds::from_bounds(&b);
        assert_eq!(q.lower, [-1, 1, -1]);
        assert_eq!(q.upper, [1, 3, 1]);
    }

    // Release builds skip the range assertions and rely on clamping.
    #[cfg(not(debug_assertions))]
    #[test]
    fn out_of_range_bounds_saturate() {
        let wide = Bounds3::new(Vec3::splat(-1.0e6), Vec3::new(1.0e6, 4.0e4, -4.0e4));
        let q = QuantizedBounds::from_bounds(&wide);
        assert_eq!(q.lower, [-32767; 3]);
        assert_eq!(q.upper, [32767, 32767, -32767]);

        let beyond = Bounds3::new(Vec3::splat(4.0e4), Vec3::splat(5.0e4));
        let q = QuantizedBounds::from_bounds(&beyond);
        assert_eq!(q.lower, [32767; 3]);
        assert_eq!(q.upper, [32767; 3]);
        for axis in Axis::ALL {
            let (lo, hi) = q.axis(axis);
            assert!(lo <= hi, "clamping flipped {axis:?}");
        }
    }

    #[test]
    fn pack_keeps_given_bounds() {
        let space = QuantizedSpace::from_space(&AlignedSpace::IDENTITY);
        let local = Bounds3::new(Vec3::new(-5.5, 0.0, 1.2), Vec3::new(7.25, 3.0, 9.0));
        let p = PackedPrimitive::pack(9, space, &local);
        assert_eq!(p.prim_id, 9);
        assert_eq!(p.space, space);
        assert_eq!(p.bounds.lower, [-6, 0, 1]);
        assert_eq!(p.bounds.upper, [8, 3, 9]);
    }

    #[test]
    fn encoded_box_contains_curve_tube() {
        let curve = BezierCurve::with_radius(
            [
                Vec3::new(10.0, 10.0, 10.0),
                Vec3::new(30.0, 60.0, 12.0),
                Vec3::new(70.0, 40.0, 20.0),
                Vec3::new(90.0, 90.0, 30.0),
            ],
            1.5,
        );
        let norm = Normalization::new(Vec3::splat(8.0), 1.2);
        let frame = estimate_frame_from([(0, curve)], norm);
        let packed = PackedPrimitive::encode(3, &frame, &curve, norm);
        assert_eq!(packed.prim_id, 3);
        for i in 0..=32 {
            let t = i as f32 / 32.0;
            let p = curve.eval(t);
            let r = curve.eval_radius(t);
            for d in [Vec3::X, Vec3::Y, Vec3::Z, -Vec3::X, -Vec3::Y, -Vec3::Z] {
                assert!(packed.contains_point(norm, p + d * r), "t = {t}");
            }
        }
    }
}
