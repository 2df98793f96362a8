// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Byte layout of a curve leaf record.
//!
//! A record holding `N` primitives is a packed sequence of field arrays with
//! no padding:
//!
//! | field               | element | count |
//! |---------------------|---------|-------|
//! | `count`             | `u8`    | 1     |
//! | `geom_id`           | `u32`   | 1     |
//! | `prim_id`           | `u32`   | N     |
//! | `basis[a].x/y/z`    | `i8`    | N × 3 |
//! | `lower[a]`          | `i16`   | N     |
//! | `upper[a]`          | `i16`   | N     |
//! | `offset`            | `[f32; 3]` | 1  |
//! | `scale`             | `f32`   | 1     |
//!
//! The three `basis`/`lower`/`upper` groups repeat for local axes `a` = x, y, z.
//!
//! Every offset depends on `N`, so the size of a record is
//! [`record_bytes`]`(N)` = `5 + 25 N + 16` and can be computed from the count
//! byte alone. Fields are not aligned; readers use unaligned loads.

use core::ops::Range;

use crate::types::Axis;

/// Size of the count byte.
pub const COUNT_BYTES: usize = 1;
/// Size of the shared geometry id.
pub const GEOM_ID_BYTES: usize = 4;
/// Bytes before the per-primitive arrays.
pub const HEADER_BYTES: usize = COUNT_BYTES + GEOM_ID_BYTES;

/// Size of one primitive id.
pub const PRIM_ID_BYTES: usize = 4;
/// Bytes per primitive for one local axis: three `i8` components and two `i16` bounds.
pub const AXIS_BYTES: usize = 3 + 2 * 2;
/// Bytes per primitive across all per-primitive arrays.
pub const PRIMITIVE_STRIDE: usize = PRIM_ID_BYTES + 3 * AXIS_BYTES;

/// Size of the shared normalization offset.
pub const OFFSET_BYTES: usize = 12;
/// Size of the shared normalization scale.
pub const SCALE_BYTES: usize = 4;
/// Bytes after the per-primitive arrays.
pub const TRAILER_BYTES: usize = OFFSET_BYTES + SCALE_BYTES;

/// Largest count a record can describe.
pub const MAX_RECORD_COUNT: usize = u8::MAX as usize;

const _: () = assert!(HEADER_BYTES == 5 && PRIMITIVE_STRIDE == 25 && TRAILER_BYTES == 16);

/// Bytes used by one record holding `n` primitives.
#[inline]
pub const fn record_bytes(n: usize) -> usize {
    HEADER_BYTES + n * PRIMITIVE_STRIDE + TRAILER_BYTES
}

/// Number of records needed for `total` primitives at `capacity` per record.
#[inline]
pub const fn blocks(total: usize, capacity: usize) -> usize {
    total.div_ceil(capacity)
}

/// Bytes used by `total` primitives packed into full records of `capacity`
/// followed by one partial record.
#[inline]
pub const fn total_bytes(total: usize, capacity: usize) -> usize {
    let full = total / capacity;
    let rest = total % capacity;
    full * record_bytes(capacity) + if rest != 0 { record_bytes(rest) } else { 0 }
}

/// A named field (or field array) of a record.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    /// Number of primitives in the record.
    Count,
    /// Shared geometry id.
    GeomId,
    /// Per-primitive ids.
    PrimId,
    /// Per-primitive component `component` of local axis `axis`.
    Basis {
        /// Local axis.
        axis: Axis,
        /// World component of that axis.
        component: Axis,
    },
    /// Per-primitive lower bound along a local axis.
    Lower(Axis),
    /// Per-primitive upper bound along a local axis.
    Upper(Axis),
    /// Shared normalization offset.
    Offset,
    /// Shared normalization scale.
    Scale,
}

const fn basis(axis: Axis, component: Axis) -> Field {
    Field::Basis { axis, component }
}

impl Field {
    /// All fields in storage order.
    pub const ALL: [Self; 20] = [
        Self::Count,
        Self::GeomId,
        Self::PrimId,
        basis(Axis::X, Axis::X),
        basis(Axis::X, Axis::Y),
        basis(Axis::X, Axis::Z),
        Self::Lower(Axis::X),
        Self::Upper(Axis::X),
        basis(Axis::Y, Axis::X),
        basis(Axis::Y, Axis::Y),
        basis(Axis::Y, Axis::Z),
        Self::Lower(Axis::Y),
        Self::Upper(Axis::Y),
        basis(Axis::Z, Axis::X),
        basis(Axis::Z, Axis::Y),
        basis(Axis::Z, Axis::Z),
        Self::Lower(Axis::Z),
        Self::Upper(Axis::Z),
        Self::Offset,
        Self::Scale,
    ];

    /// Size of one element of this field.
    pub const fn element_bytes(self) -> usize {
        match self {
            Self::Count => COUNT_BYTES,
            Self::GeomId => GEOM_ID_BYTES,
            Self::PrimId => PRIM_ID_BYTES,
            Self::Basis { .. } => 1,
            Self::Lower(_) | Self::Upper(_) => 2,
            Self::Offset => OFFSET_BYTES,
            Self::Scale => SCALE_BYTES,
        }
    }

    /// Whether the field holds one element per primitive.
    pub const fn is_per_primitive(self) -> bool {
        matches!(
            self,
            Self::PrimId | Self::Basis { .. } | Self::Lower(_) | Self::Upper(_)
        )
    }
}

/// Field offsets for a record holding a given number of primitives.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RecordLayout {
    count: usize,
}

impl RecordLayout {
    /// Layout for a record of `count` primitives.
    #[inline]
    pub const fn new(count: usize) -> Self {
        debug_assert!(
            count >= 1 && count <= MAX_RECORD_COUNT,
            "record count must be in 1..=255"
        );
        Self { count }
    }

    /// Number of primitives.
    #[inline]
    pub const fn count(self) -> usize {
        self.count
    }

    /// Total bytes of the record.
    #[inline]
    pub const fn byte_len(self) -> usize {
        record_bytes(self.count)
    }

    /// Start of the per-axis arrays for `axis`.
    #[inline]
    const fn axis_base(self, axis: Axis) -> usize {
        let n = self.count;
        HEADER_BYTES + PRIM_ID_BYTES * n + AXIS_BYTES * n * axis.index()
    }

    /// Byte offset of the start of `field`.
    pub const fn offset(self, field: Field) -> usize {
        let n = self.count;
        match field {
            Field::Count => 0,
            Field::GeomId => COUNT_BYTES,
            Field::PrimId => HEADER_BYTES,
            Field::Basis { axis, component } => self.axis_base(axis) + component.index() * n,
            Field::Lower(axis) => self.axis_base(axis) + 3 * n,
            Field::Upper(axis) => self.axis_base(axis) + 5 * n,
            Field::Offset => HEADER_BYTES + PRIMITIVE_STRIDE * n,
            Field::Scale => HEADER_BYTES + PRIMITIVE_STRIDE * n + OFFSET_BYTES,
        }
    }

    /// Bytes occupied by the whole `field` array.
    pub const fn field_bytes(self, field: Field) -> usize {
        if field.is_per_primitive() {
            field.element_bytes() * self.count
        } else {
            field.element_bytes()
        }
    }

    /// Byte range of the whole `field` array.
    #[inline]
    pub const fn range(self, field: Field) -> Range<usize> {
        let start = self.offset(field);
        start..start + self.field_bytes(field)
    }

    /// Byte range of element `index` of `field`.
    ///
    /// For shared fields `index` must be 0.
    #[inline]
    pub const fn element(self, field: Field, index: usize) -> Range<usize> {
        debug_assert!(
            if field.is_per_primitive() {
                index < self.count
            } else {
                index == 0
            },
            "field element index out of range"
        );
        let size = field.element_bytes();
        let start = self.offset(field) + index * size;
        start..start + size
    }
}
