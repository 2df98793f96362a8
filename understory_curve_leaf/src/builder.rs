// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Leaf construction.
//!
//! [`CurveLeaf`] turns a run of primitive references into leaf records. All
//! primitives of a record share one geometry id and one normalization taken
//! from the run's union bounds; each primitive then gets its own aligned
//! space and quantized box.
//!
//! ```
//! use glam::Vec4;
//! use understory_curve_leaf::{
//!     Curve4Leaf, CurveGeometry, CurveScene, LeafArena, PrimRef,
//! };
//!
//! let mut geometry = CurveGeometry::new();
//! for i in 0..5 {
//!     let x = i as f32;
//!     geometry.add_curve([
//!         Vec4::new(x, 0.0, 0.0, 0.05),
//!         Vec4::new(x, 1.0, 0.2, 0.05),
//!         Vec4::new(x, 2.0, 0.1, 0.05),
//!         Vec4::new(x, 3.0, 0.0, 0.05),
//!     ]);
//! }
//! let mut scene = CurveScene::new();
//! scene.insert(0, geometry);
//!
//! let run: Vec<PrimRef> = (0..5).map(|i| PrimRef::new(0, i)).collect();
//! let mut arena = LeafArena::new();
//! let handle = Curve4Leaf::create_leaf(&mut arena, &run, &scene).unwrap();
//! assert_eq!(handle.records, Curve4Leaf::blocks(5));
//! assert_eq!(handle.byte_len(), Curve4Leaf::bytes(5));
//!
//! let leaf = arena.leaf(&handle).unwrap();
//! let counts: Vec<usize> = leaf.iter().map(|r| r.count()).collect();
//! assert_eq!(counts, [4, 1]);
//! ```

use smallvec::SmallVec;

use crate::arena::{Allocation, LEAF_ALIGNMENT, LeafAllocator, LeafHandle};
use crate::curve::BezierCurve;
use crate::error::BuildError;
use crate::frame::{Normalization, estimate_frame_from};
use crate::geometry::CurveSource;
use crate::layout::{self, MAX_RECORD_COUNT, record_bytes};
use crate::quantize::{NORMALIZED_DIAGONAL, PackedPrimitive, QuantizedSpace};
use crate::record::RecordWriter;
use crate::types::{Bounds3, PrimRef};

/// Smallest extent used when computing a leaf's scale.
///
/// Keeps the scale finite for runs whose bounds collapse to a point.
pub const MIN_EXTENT: f32 = 1e-6;

const SQRT_3: f32 = 1.732_050_8;

/// Normalization mapping `bounds` into a region whose diagonal is at most
/// [`NORMALIZED_DIAGONAL`].
///
/// The offset is the lower corner; the scale is `256 / (extent * √3)` for the
/// largest extent, which is the smallest of the per-axis scales.
pub fn leaf_normalization(bounds: &Bounds3) -> Normalization {
    let extent = bounds.size().max_element().max(MIN_EXTENT);
    let scale = NORMALIZED_DIAGONAL as f32 / (extent * SQRT_3);
    Normalization::new(bounds.lower, scale)
}

/// Builder for leaves of at most `M` primitives per record.
///
/// `M` must lie in `1..=255`; other values fail to compile when the leaf is
/// used.
#[derive(Copy, Clone, Debug, Default)]
pub struct CurveLeaf<const M: usize>;

/// Leaves with four primitives per record.
pub type Curve4Leaf = CurveLeaf<4>;
/// Leaves with eight primitives per record.
pub type Curve8Leaf = CurveLeaf<8>;

impl<const M: usize> CurveLeaf<M> {
    /// Primitives per record.
    pub const CAPACITY: usize = {
        assert!(
            M >= 1 && M <= MAX_RECORD_COUNT,
            "leaf capacity must be in 1..=255"
        );
        M
    };

    /// Size of a full record.
    #[inline]
    pub const fn max_size() -> usize {
        record_bytes(Self::CAPACITY)
    }

    /// Records needed for `n` primitives.
    #[inline]
    pub const fn blocks(n: usize) -> usize {
        layout::blocks(n, Self::CAPACITY)
    }

    /// Bytes needed for `n` primitives.
    #[inline]
    pub const fn bytes(n: usize) -> usize {
        layout::total_bytes(n, Self::CAPACITY)
    }

    /// Write one record for the first `min(M, run.len())` primitives of `run`
    /// to the front of `out`.
    ///
    /// Returns the bytes written and the number of primitives consumed.
    /// `out` must hold at least [`record_bytes`] of the consumed count.
    pub fn fill<S: CurveSource + ?Sized>(
        out: &mut [u8],
        run: &[PrimRef],
        source: &S,
    ) -> Result<(usize, usize), BuildError> {
        let run = &run[..run.len().min(Self::CAPACITY)];
        let geom_id = check_geometry(run)?;

        let required = record_bytes(run.len());
        if out.len() < required {
            return Err(BuildError::BufferTooSmall {
                required,
                available: out.len(),
            });
        }

        let curves = run
            .iter()
            .map(|&prim| source.curve(prim).ok_or(unknown(prim)))
            .collect::<Result<SmallVec<[BezierCurve; 8]>, _>>()?;

        let bounds = run.iter().try_fold(Bounds3::EMPTY, |b, &prim| {
            source
                .bounds(prim)
                .map(|pb| b.union(&pb))
                .ok_or(unknown(prim))
        })?;
        let norm = leaf_normalization(&bounds);

        let packed = run
            .iter()
            .zip(&curves)
            .map(|(&prim, curve)| {
                let frame = estimate_frame_from([(prim.id64(), *curve)], norm);
                let space = QuantizedSpace::from_space(&frame);
                let local = source
                    .local_bounds(prim, norm, space.max_axis_length(), &space.to_space())
                    .ok_or(unknown(prim))?;
                Ok(PackedPrimitive::pack(prim.prim_id, space, &local))
            })
            .collect::<Result<SmallVec<[PackedPrimitive; 8]>, BuildError>>()?;

        #[allow(
            clippy::cast_possible_truncation,
            reason = "Run length is at most CAPACITY, which is checked to fit in u8."
        )]
        let mut writer = RecordWriter::new(out, run.len() as u8);
        writer.set_geom_id(geom_id);
        writer.set_normalization(norm);
        for (i, prim) in packed.iter().enumerate() {
            writer.set_primitive(i, prim);
        }

        tracing::trace!(
            geom_id,
            count = run.len(),
            scale = norm.scale,
            "filled curve leaf record"
        );
        Ok((writer.byte_len(), run.len()))
    }

    /// Allocate and fill the records for all of `run`.
    ///
    /// The run must be non-empty, belong to a single geometry and resolve in
    /// `source`; all of this is checked before anything is allocated. Records
    /// are written back to back, `M` primitives each except for the last.
    pub fn create_leaf<A, S>(
        allocator: &mut A,
        run: &[PrimRef],
        source: &S,
    ) -> Result<LeafHandle, BuildError>
    where
        A: LeafAllocator + ?Sized,
        S: CurveSource + ?Sized,
    {
        let geom_id = check_geometry(run)?;
        if let Some(&prim) = run.iter().find(|&&p| source.curve(p).is_none()) {
            return Err(unknown(prim));
        }
        let size = Self::bytes(run.len());
        let Allocation { offset, bytes } = allocator.allocate(size, LEAF_ALIGNMENT)?;

        let mut written = 0;
        let mut records = 0;
        let mut rest = run;
        while !rest.is_empty() {
            let (n, consumed) = Self::fill(&mut bytes[written..], rest, source)?;
            written += n;
            records += 1;
            rest = &rest[consumed..];
        }
        debug_assert_eq!(written, size, "leaf size does not match its records");

        tracing::debug!(
            geom_id,
            primitives = run.len(),
            records,
            bytes = size,
            offset,
            "created curve leaf"
        );
        Ok(LeafHandle {
            range: offset..offset + size,
            records,
            primitives: run.len(),
        })
    }
}

fn unknown(prim: PrimRef) -> BuildError {
    BuildError::UnknownPrimitive {
        geom_id: prim.geom_id,
        prim_id: prim.prim_id,
    }
}

/// Geometry id shared by every primitive of `run`.
fn check_geometry(run: &[PrimRef]) -> Result<u32, BuildError> {
    let expected = run.first().ok_or(BuildError::EmptyRun)?.geom_id;
    match run.iter().position(|p| p.geom_id != expected) {
        Some(index) => Err(BuildError::MixedGeometry {
            index,
            expected,
            found: run[index].geom_id,
        }),
        None => Ok(expected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::LeafArena;
    use crate::frame::AlignedSpace;
    use crate::geometry::{CurveGeometry, CurveScene};
    use crate::record::LeafRecord;
    use alloc::vec::Vec;
    use glam::{Vec3, Vec4};

    fn scene_with(geom_id: u32, count: u32) -> CurveScene {
        let mut g = CurveGeometry::new();
        for i in 0..count {
            let x = i as f32 * 0.5;
            g.add_curve([
                Vec4::new(x, 0.0, 0.0, 0.02),
                Vec4::new(x + 0.1, 0.4, 0.1, 0.02),
                Vec4::new(x - 0.1, 0.8, 0.2, 0.015),
                Vec4::new(x, 1.2, 0.0, 0.01),
            ]);
        }
        let mut scene = CurveScene::new();
        scene.insert(geom_id, g);
        scene
    }

    #[test]
    fn four_curves_fill_one_record() {
        let mut g = CurveGeometry::new();
        // Pad so the curves get ids 10..=13.
        for _ in 0..10 {
            g.add_curve([Vec4::ZERO; 4]);
        }
        let mut scene = CurveScene::new();
        for i in 0..4 {
            let x = i as f32;
            g.add_curve([
                Vec4::new(x, 0.0, 0.0, 0.1),
                Vec4::new(x, 1.0, 1.0, 0.1),
                Vec4::new(x, 2.0, 1.0, 0.1),
                Vec4::new(x, 3.0, 0.0, 0.1),
            ]);
        }
        scene.insert(7, g);
        let run: Vec<PrimRef> = (10..14).map(|i| PrimRef::new(7, i)).collect();

        let mut out = [0_u8; 256];
        let (written, consumed) = Curve4Leaf::fill(&mut out, &run, &scene).unwrap();
        assert_eq!((written, consumed), (121, 4));
        assert_eq!(Curve4Leaf::max_size(), 121);

        let r = LeafRecord::new(&out).unwrap();
        assert_eq!(r.count(), 4);
        assert_eq!(r.geom_id(), 7);
        assert_eq!(r.prim_ids().as_slice(), &[10, 11, 12, 13]);
        assert_eq!(r.normalization().offset, Vec3::new(-0.1, -0.1, -0.1));
        assert!(out[121..].iter().all(|&b| b == 0));
    }

    #[test]
    fn fill_clamps_to_capacity() {
        let scene = scene_with(0, 5);
        let run: Vec<PrimRef> = (0..5).map(|i| PrimRef::new(0, i)).collect();
        let mut out = [0_u8; 512];
        let (written, consumed) = Curve4Leaf::fill(&mut out, &run, &scene).unwrap();
        assert_eq!((written, consumed), (121, 4));
        let (written, consumed) = Curve4Leaf::fill(&mut out, &run[4..], &scene).unwrap();
        assert_eq!((written, consumed), (46, 1));
        assert_eq!(Curve4Leaf::blocks(5), 2);
        assert_eq!(Curve8Leaf::blocks(5), 1);
        assert_eq!(Curve4Leaf::bytes(5), 167);
    }

    #[test]
    fn fill_reports_bad_input() {
        let scene = scene_with(3, 2);
        let mut out = [0_u8; 64];
        assert_eq!(
            Curve4Leaf::fill(&mut out, &[], &scene),
            Err(BuildError::EmptyRun)
        );
        assert_eq!(
            Curve4Leaf::fill(&mut out, &[PrimRef::new(3, 0), PrimRef::new(4, 0)], &scene),
            Err(BuildError::MixedGeometry {
                index: 1,
                expected: 3,
                found: 4
            })
        );
        assert_eq!(
            Curve4Leaf::fill(&mut out, &[PrimRef::new(3, 9)], &scene),
            Err(BuildError::UnknownPrimitive {
                geom_id: 3,
                prim_id: 9
            })
        );
        assert_eq!(
            Curve4Leaf::fill(&mut out, &[PrimRef::new(3, 0), PrimRef::new(3, 1)], &scene),
            Err(BuildError::BufferTooSmall {
                required: 71,
                available: 64
            })
        );
    }

    #[test]
    fn degenerate_run_has_finite_scale() {
        let mut g = CurveGeometry::new();
        g.add_curve([Vec4::new(1.0, 2.0, 3.0, 0.0); 4]);
        let mut scene = CurveScene::new();
        scene.insert(0, g);
        let mut out = [0_u8; 64];
        Curve4Leaf::fill(&mut out, &[PrimRef::new(0, 0)], &scene).unwrap();
        let r = LeafRecord::new(&out).unwrap();
        let norm = r.normalization();
        assert!(norm.scale.is_finite() && norm.scale > 0.0);
        // No usable chord: the frame falls back to world axes.
        assert_eq!(r.space(0).vz, [0, 0, 126]);
        // A point-like curve gets a one-unit box around the origin.
        assert_eq!(r.bounds(0).lower, [-1; 3]);
        assert_eq!(r.bounds(0).upper, [1; 3]);
    }

    #[test]
    fn normalization_fits_the_diagonal() {
        let b = Bounds3::new(Vec3::new(-2.0, 0.0, 1.0), Vec3::new(6.0, 1.0, 3.0));
        let n = leaf_normalization(&b);
        assert_eq!(n.offset, b.lower);
        let diag = (n.apply(b.upper) - n.apply(b.lower)).length();
        assert!(diag <= NORMALIZED_DIAGONAL as f32 + 1e-3);
        // Point-like bounds still produce a finite scale.
        let p = Bounds3::new(Vec3::ONE, Vec3::ONE);
        assert!(leaf_normalization(&p).scale.is_finite());
    }

    #[test]
    fn create_leaf_writes_records_back_to_back() {
        let scene = scene_with(2, 5);
        let run: Vec<PrimRef> = (0..5).map(|i| PrimRef::new(2, i)).collect();
        let mut arena = LeafArena::new();
        arena.allocate(3, 1).unwrap();
        let handle = Curve4Leaf::create_leaf(&mut arena, &run, &scene).unwrap();
        assert_eq!(handle.range, 16..16 + 167);
        assert_eq!(handle.records, 2);
        assert_eq!(handle.primitives, 5);

        let leaf = arena.leaf(&handle).unwrap();
        let sizes: Vec<(usize, usize)> = leaf.iter().map(|r| (r.count(), r.byte_len())).collect();
        assert_eq!(sizes, [(4, 121), (1, 46)]);
        let ids: Vec<u32> = leaf.iter().flat_map(|r| r.prim_ids()).collect();
        assert_eq!(ids, [0, 1, 2, 3, 4]);
    }

    #[test]
    fn create_leaf_propagates_failures() {
        let scene = scene_with(2, 5);
        let run: Vec<PrimRef> = (0..5).map(|i| PrimRef::new(2, i)).collect();
        let mut arena = LeafArena::with_limit(100);
        assert!(matches!(
            Curve4Leaf::create_leaf(&mut arena, &run, &scene),
            Err(BuildError::Alloc(_))
        ));
        assert!(arena.is_empty());

        // An unknown curve in the second record is caught before allocating.
        let mut missing = run.clone();
        missing[4] = PrimRef::new(2, 99);
        let mut arena = LeafArena::new();
        assert_eq!(
            Curve4Leaf::create_leaf(&mut arena, &missing, &scene),
            Err(BuildError::UnknownPrimitive {
                geom_id: 2,
                prim_id: 99
            })
        );
        assert!(arena.is_empty());

        let mut mixed = run.clone();
        mixed[3] = PrimRef::new(9, 0);
        let mut arena = LeafArena::new();
        assert_eq!(
            Curve4Leaf::create_leaf(&mut arena, &mixed, &scene),
            Err(BuildError::MixedGeometry {
                index: 3,
                expected: 2,
                found: 9
            })
        );
        assert!(arena.is_empty());
    }

    /// Scene that reports its own world and local boxes instead of deriving
    /// them from the control points.
    struct BoxedScene {
        scene: CurveScene,
    }

    impl CurveSource for BoxedScene {
        fn curve(&self, prim: PrimRef) -> Option<BezierCurve> {
            self.scene.curve(prim)
        }

        fn bounds(&self, prim: PrimRef) -> Option<Bounds3> {
            self.curve(prim)
                .map(|_| Bounds3::new(Vec3::splat(-10.0), Vec3::splat(10.0)))
        }

        fn local_bounds(
            &self,
            prim: PrimRef,
            _norm: Normalization,
            _r_scale: f32,
            _space: &AlignedSpace,
        ) -> Option<Bounds3> {
            self.curve(prim).map(|_| {
                Bounds3::new(Vec3::new(-5.5, 0.0, 1.2), Vec3::new(7.25, 3.0, 9.0))
            })
        }
    }

    #[test]
    fn fill_uses_bounds_reported_by_the_source() {
        let source = BoxedScene {
            scene: scene_with(1, 4),
        };
        let run: Vec<PrimRef> = (0..4).map(|i| PrimRef::new(1, i)).collect();
        let mut out = [0_u8; 128];
        Curve4Leaf::fill(&mut out, &run, &source).unwrap();

        let r = LeafRecord::new(&out).unwrap();
        let norm = r.normalization();
        assert_eq!(norm.offset, Vec3::splat(-10.0));
        assert!(
            (norm.scale - 256.0 / (20.0 * SQRT_3)).abs() < 1e-4,
            "scale {} not derived from the reported bounds",
            norm.scale
        );
        for i in 0..4 {
            assert_eq!(r.bounds(i).lower, [-6, 0, 1]);
            assert_eq!(r.bounds(i).upper, [8, 3, 9]);
        }
    }
}
