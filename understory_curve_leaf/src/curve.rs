// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cubic Bézier curve segments with a per-control-point radius.

use glam::{Vec3, Vec4, Vec4Swizzles as _};

use crate::frame::{AlignedSpace, Normalization};
use crate::types::Bounds3;

/// A cubic Bézier segment. Each control point stores its position in `xyz`
/// and the curve radius at that point in `w`.
///
/// Both the centerline and the radius lie in the convex hull of their control
/// values, so the hull of the control points enlarged by the largest control
/// radius bounds the whole swept tube.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BezierCurve {
    /// Control points `v0..v3`.
    pub v: [Vec4; 4],
}

impl BezierCurve {
    /// Create a curve from four `xyzw` control points.
    #[inline(always)]
    pub const fn new(v0: Vec4, v1: Vec4, v2: Vec4, v3: Vec4) -> Self {
        Self {
            v: [v0, v1, v2, v3],
        }
    }

    /// Create a curve with a constant radius.
    pub fn with_radius(points: [Vec3; 4], radius: f32) -> Self {
        Self {
            v: points.map(|p| p.extend(radius)),
        }
    }

    /// Start point `P0`.
    #[inline]
    pub fn begin(&self) -> Vec3 {
        self.v[0].xyz()
    }

    /// End point `P3`.
    #[inline]
    pub fn end(&self) -> Vec3 {
        self.v[3].xyz()
    }

    /// Evaluate position and radius at `t`.
    pub fn eval4(&self, t: f32) -> Vec4 {
        let mt = 1.0 - t;
        let mt2 = mt * mt;
        let t2 = t * t;
        self.v[0] * (mt2 * mt)
            + self.v[1] * (3.0 * mt2 * t)
            + self.v[2] * (3.0 * mt * t2)
            + self.v[3] * (t2 * t)
    }

    /// Position at `t`.
    #[inline]
    pub fn eval(&self, t: f32) -> Vec3 {
        self.eval4(t).xyz()
    }

    /// Radius at `t`.
    #[inline]
    pub fn eval_radius(&self, t: f32) -> f32 {
        self.eval4(t).w
    }

    /// First derivative of the position at `t`.
    pub fn eval_du(&self, t: f32) -> Vec3 {
        let [p0, p1, p2, p3] = self.v.map(|v| v.xyz());
        let mt = 1.0 - t;
        3.0 * ((p1 - p0) * (mt * mt) + (p2 - p1) * (2.0 * mt * t) + (p3 - p2) * (t * t))
    }

    /// Largest control radius.
    #[inline]
    pub fn max_radius(&self) -> f32 {
        self.v[0].w.max(self.v[1].w).max(self.v[2].w).max(self.v[3].w)
    }

    /// Apply `(p - offset) * scale` to positions and `r * scale` to radii.
    pub fn normalized(&self, norm: Normalization) -> Self {
        Self {
            v: self.v.map(|v| norm.apply(v.xyz()).extend(v.w * norm.scale)),
        }
    }

    /// World-space bounds of the swept tube.
    pub fn bounds(&self) -> Bounds3 {
        Bounds3::from_points(self.v.iter().map(|v| v.xyz())).enlarge(self.max_radius())
    }

    /// Bounds of the tube in the local coordinates of `space`.
    ///
    /// Each control point is projected onto the (not necessarily unit) axes
    /// of `space`. A ball of radius `r` projects onto an axis of length `l`
    /// as an interval of half-width `r * l`, so the hull is enlarged by
    /// `max_radius * r_scale`, where `r_scale` must be at least the longest
    /// axis length.
    pub fn local_bounds(&self, space: &AlignedSpace, r_scale: f32) -> Bounds3 {
        Bounds3::from_points(self.v.iter().map(|v| space.xfm_vector(v.xyz())))
            .enlarge(self.max_radius() * r_scale)
    }
}

#[cfg(test)]
mod tests {
    use super::BezierCurve;
    use crate::frame::{AlignedSpace, Normalization};
    use glam::{Vec3, Vec4};

    fn sample() -> BezierCurve {
        BezierCurve::new(
            Vec4::new(0.0, 0.0, 0.0, 0.1),
            Vec4::new(1.0, 2.0, 0.0, 0.2),
            Vec4::new(2.0, 2.0, 0.0, 0.3),
            Vec4::new(3.0, 0.0, 0.0, 0.4),
        )
    }

    #[test]
    fn endpoints_and_tangent() {
        let c = sample();
        assert_eq!(c.eval(0.0), c.begin());
        assert_eq!(c.eval(1.0), c.end());
        assert_eq!(c.eval_du(0.0), Vec3::new(3.0, 6.0, 0.0));
        assert_eq!(c.eval_du(1.0), Vec3::new(3.0, -6.0, 0.0));
        assert!((c.eval_radius(0.5) - 0.25).abs() < 1e-6);
        assert_eq!(c.max_radius(), 0.4);
    }

    #[test]
    fn bounds_contain_samples() {
        let c = sample();
        let b = c.bounds();
        for i in 0..=16 {
            let t = i as f32 / 16.0;
            let p = c.eval(t);
            let r = c.eval_radius(t);
            for d in [Vec3::X, Vec3::Y, Vec3::Z, -Vec3::X, -Vec3::Y, -Vec3::Z] {
                assert!(b.contains_point(p + d * r));
            }
        }
    }

    #[test]
    fn normalization_scales_radius() {
        let c = sample();
        let norm = Normalization::new(Vec3::new(1.0, 0.0, 0.0), 2.0);
        let n = c.normalized(norm);
        assert_eq!(n.begin(), Vec3::new(-2.0, 0.0, 0.0));
        assert_eq!(n.v[3].w, 0.8);
    }

    #[test]
    fn local_bounds_in_identity_space_match_world_bounds() {
        let c = sample();
        assert_eq!(c.local_bounds(&AlignedSpace::IDENTITY, 1.0), c.bounds());
    }
}
