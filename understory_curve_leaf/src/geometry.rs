// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scene access for curve primitives.
//!
//! The leaf builder only needs to resolve a [`PrimRef`] to its four control
//! points, which is what [`CurveSource`] abstracts. [`CurveScene`] is a small
//! in-memory implementation keyed by geometry id.

use alloc::vec::Vec;

use glam::Vec4;
use hashbrown::HashMap;

use crate::curve::BezierCurve;
use crate::frame::{AlignedSpace, Normalization};
use crate::types::{Bounds3, PrimRef};

/// Read-only access to curve control points.
///
/// Implementations must be safe to share between threads building different
/// leaves; all methods take `&self`.
pub trait CurveSource {
    /// Resolve the control points of `prim`, or `None` if it does not exist.
    fn curve(&self, prim: PrimRef) -> Option<BezierCurve>;

    /// World-space bounds of `prim`, including its radius.
    fn bounds(&self, prim: PrimRef) -> Option<Bounds3> {
        self.curve(prim).map(|c| c.bounds())
    }

    /// Bounds of `prim` after normalization, in the local coordinates of `space`.
    ///
    /// `r_scale` inflates the radius and must be at least the longest axis of
    /// `space`; see [`BezierCurve::local_bounds`].
    fn local_bounds(
        &self,
        prim: PrimRef,
        norm: Normalization,
        r_scale: f32,
        space: &AlignedSpace,
    ) -> Option<Bounds3> {
        self.curve(prim)
            .map(|c| c.normalized(norm).local_bounds(space, r_scale))
    }
}

impl<S: CurveSource + ?Sized> CurveSource for &S {
    #[inline]
    fn curve(&self, prim: PrimRef) -> Option<BezierCurve> {
        (**self).curve(prim)
    }
}

/// A set of cubic curves sharing one control point buffer.
///
/// Curve `i` uses the four consecutive vertices starting at `curves[i]`, so
/// neighboring segments of a strand may share control points.
#[derive(Clone, Debug, Default)]
pub struct CurveGeometry {
    vertices: Vec<Vec4>,
    curves: Vec<u32>,
}

impl CurveGeometry {
    /// Create an empty geometry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a geometry from a vertex buffer and per-curve first-vertex indices.
    ///
    /// Returns `None` if any curve would read past the end of `vertices`.
    pub fn from_parts(vertices: Vec<Vec4>, curves: Vec<u32>) -> Option<Self> {
        let valid = curves
            .iter()
            .all(|&first| (first as usize).saturating_add(4) <= vertices.len());
        valid.then_some(Self { vertices, curves })
    }

    /// Append a curve with its own four control points. Returns its primitive id.
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Primitive and vertex ids are 32-bit; larger geometries are not supported."
    )]
    pub fn add_curve(&mut self, points: [Vec4; 4]) -> u32 {
        let first = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&points);
        self.curves.push(first);
        (self.curves.len() - 1) as u32
    }

    /// Append a strand of `3 * k + 1` control points as `k` connected curves.
    ///
    /// Returns the primitive ids of the new curves. Trailing points that do
    /// not complete a segment are ignored.
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Primitive and vertex ids are 32-bit; larger geometries are not supported."
    )]
    pub fn add_strand(&mut self, points: &[Vec4]) -> core::ops::Range<u32> {
        let start = self.curves.len() as u32;
        if points.len() < 4 {
            return start..start;
        }
        let base = self.vertices.len();
        let segments = (points.len() - 1) / 3;
        self.vertices.extend_from_slice(&points[..segments * 3 + 1]);
        for s in 0..segments {
            self.curves.push((base + 3 * s) as u32);
        }
        start..self.curves.len() as u32
    }

    /// Number of curves.
    pub fn len(&self) -> usize {
        self.curves.len()
    }

    /// Whether the geometry has no curves.
    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }

    /// Control point `index`.
    pub fn vertex(&self, index: usize) -> Option<Vec4> {
        self.vertices.get(index).copied()
    }

    /// The curve with primitive id `prim_id`.
    pub fn curve(&self, prim_id: u32) -> Option<BezierCurve> {
        let first = *self.curves.get(prim_id as usize)? as usize;
        let v = self.vertices.get(first..first + 4)?;
        Some(BezierCurve::new(v[0], v[1], v[2], v[3]))
    }
}

/// In-memory scene mapping geometry ids to [`CurveGeometry`].
#[derive(Clone, Debug, Default)]
pub struct CurveScene {
    geometries: HashMap<u32, CurveGeometry>,
}

impl CurveScene {
    /// Create an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the geometry with id `geom_id`.
    pub fn insert(&mut self, geom_id: u32, geometry: CurveGeometry) -> Option<CurveGeometry> {
        self.geometries.insert(geom_id, geometry)
    }

    /// The geometry with id `geom_id`.
    pub fn get(&self, geom_id: u32) -> Option<&CurveGeometry> {
        self.geometries.get(&geom_id)
    }

    /// References to every curve of every geometry, sorted by [`PrimRef::id64`].
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Primitive ids are 32-bit by construction."
    )]
    pub fn prim_refs(&self) -> Vec<PrimRef> {
        let mut out: Vec<PrimRef> = self
            .geometries
            .iter()
            .flat_map(|(&geom_id, g)| {
                (0..g.curves.len()).map(move |i| PrimRef::new(geom_id, i as u32))
            })
            .collect();
        out.sort_unstable();
        out
    }
}

impl CurveSource for CurveScene {
    fn curve(&self, prim: PrimRef) -> Option<BezierCurve> {
        self.geometries.get(&prim.geom_id)?.curve(prim.prim_id)
    }
}
