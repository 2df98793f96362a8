// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Curve Leaf: compact BVH leaves for cubic curve primitives.
//!
//! Hair, fur and grass are made of many thin, elongated Bézier segments. An
//! axis-aligned box around such a segment is mostly empty space, so a ray
//! tracer wants a per-primitive oriented box instead. This crate builds the
//! leaf records that store those boxes compactly:
//!
//! - A **frame estimator** ([`estimate_frame`]) picks an orthonormal frame
//!   whose z-axis follows a curve's chord.
//! - A **quantizer** ([`PackedPrimitive::encode`]) stores that frame as `i8`
//!   axes and the curve's bounds in the frame as `i16` intervals, rounded so
//!   the stored box always contains the curve.
//! - The [`layout`] module defines the byte layout of a record holding `N`
//!   primitives, whose size and field offsets depend on `N` alone.
//! - The **leaf builder** ([`CurveLeaf`]) fills records from a run of
//!   primitive references sharing one geometry, using one offset/scale
//!   normalization per record.
//!
//! Scene data is read through the [`CurveSource`] trait and leaf storage is
//! requested through [`LeafAllocator`]. [`CurveScene`] and [`LeafArena`] are
//! simple implementations of both.
//!
//! # Example
//!
//! ```rust
//! use glam::Vec4;
//! use understory_curve_leaf::{
//!     Curve8Leaf, CurveGeometry, CurveScene, LeafArena, PrimRef,
//! };
//!
//! // One strand of three connected segments.
//! let mut geometry = CurveGeometry::new();
//! let points: Vec<Vec4> = (0..10)
//!     .map(|i| Vec4::new(0.1 * i as f32, i as f32, 0.0, 0.02))
//!     .collect();
//! let ids = geometry.add_strand(&points);
//! let mut scene = CurveScene::new();
//! scene.insert(1, geometry);
//!
//! let run: Vec<PrimRef> = ids.map(|i| PrimRef::new(1, i)).collect();
//! let mut arena = LeafArena::new();
//! let handle = Curve8Leaf::create_leaf(&mut arena, &run, &scene).unwrap();
//!
//! // Every sampled point of the curves lies inside its stored oriented box.
//! let leaf = arena.leaf(&handle).unwrap();
//! let geometry = scene.get(1).unwrap();
//! for record in leaf.iter() {
//!     for i in 0..record.count() {
//!         let curve = geometry.curve(record.prim_id(i)).unwrap();
//!         assert!(record.contains_point(i, curve.eval(0.5)));
//!     }
//! }
//! ```
//!
//! ## Features
//!
//! - `std` *(default)*: enables `std` support in `glam`, `thiserror` and `tracing`.
//! - `libm`: enables `no_std` builds that rely on `libm` for floating-point math.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

mod arena;
mod builder;
mod curve;
mod error;
mod frame;
mod geometry;
pub mod layout;
mod quantize;
mod record;
mod types;

pub use arena::{Allocation, LEAF_ALIGNMENT, LeafAllocator, LeafArena, LeafHandle};
pub use builder::{Curve4Leaf, Curve8Leaf, CurveLeaf, MIN_EXTENT, leaf_normalization};
pub use curve::BezierCurve;
pub use error::{AllocError, BuildError};
pub use frame::{
    AlignedSpace, MIN_SQR_LENGTH, Normalization, estimate_frame, estimate_frame_from,
};
pub use geometry::{CurveGeometry, CurveScene, CurveSource};
pub use quantize::{
    AXIS_SCALE, BOUND_LIMIT, NORMALIZED_DIAGONAL, PackedPrimitive, QuantizedBounds,
    QuantizedSpace,
};
pub use record::{LeafBlock, LeafRecord};
pub use types::{Axis, Bounds3, PrimRef};
