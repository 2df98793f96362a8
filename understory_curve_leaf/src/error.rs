// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors reported while building leaves.

use thiserror::Error;

/// The leaf allocator could not provide the requested storage.
#[derive(Copy, Clone, Debug, Error, PartialEq, Eq)]
#[error("cannot allocate {requested} leaf bytes ({available} available)")]
pub struct AllocError {
    /// Bytes requested, including alignment padding.
    pub requested: usize,
    /// Bytes still available when the request failed.
    pub available: usize,
}

/// Why a leaf could not be built.
#[derive(Copy, Clone, Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    /// The primitive run was empty.
    #[error("cannot build a leaf from an empty primitive run")]
    EmptyRun,
    /// A primitive in the run belongs to a different geometry than the first one.
    #[error("primitive {index} of the run has geometry {found}, expected {expected}")]
    MixedGeometry {
        /// Position in the run.
        index: usize,
        /// Geometry id of the first primitive.
        expected: u32,
        /// Geometry id found at `index`.
        found: u32,
    },
    /// The scene does not know a referenced primitive.
    #[error("no curve for geometry {geom_id} primitive {prim_id}")]
    UnknownPrimitive {
        /// Geometry id of the reference.
        geom_id: u32,
        /// Primitive id of the reference.
        prim_id: u32,
    },
    /// The output buffer is shorter than the record being written.
    #[error("leaf record needs {required} bytes but only {available} are available")]
    BufferTooSmall {
        /// Bytes needed.
        required: usize,
        /// Bytes provided.
        available: usize,
    },
    /// Storage for the leaf could not be allocated.
    #[error(transparent)]
    Alloc(#[from] AllocError),
}
