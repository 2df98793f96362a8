// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Typed views over leaf record bytes.
//!
//! [`LeafRecord`] is the read side used by traversal: it wraps a byte slice
//! and the count stored in its first byte, and computes every field position
//! from that count via [`RecordLayout`]. Values are stored in native byte
//! order and read with unaligned loads.

use glam::Vec3;
use smallvec::SmallVec;

use crate::frame::Normalization;
use crate::layout::{Field, RecordLayout, record_bytes};
use crate::quantize::{PackedPrimitive, QuantizedBounds, QuantizedSpace};
use crate::types::Axis;

#[inline]
fn read<T: bytemuck::AnyBitPattern>(
    bytes: &[u8],
    layout: RecordLayout,
    field: Field,
    i: usize,
) -> T {
    bytemuck::pod_read_unaligned(&bytes[layout.element(field, i)])
}

#[inline]
fn write<T: bytemuck::NoUninit>(
    bytes: &mut [u8],
    layout: RecordLayout,
    field: Field,
    i: usize,
    value: T,
) {
    bytes[layout.element(field, i)].copy_from_slice(bytemuck::bytes_of(&value));
}

/// Read-only view of one leaf record.
#[derive(Copy, Clone, Debug)]
pub struct LeafRecord<'a> {
    bytes: &'a [u8],
    layout: RecordLayout,
}

impl<'a> LeafRecord<'a> {
    /// View the record at the start of `bytes`.
    ///
    /// Returns `None` if the count byte is zero or `bytes` is shorter than the
    /// record it describes. Trailing bytes are ignored.
    pub fn new(bytes: &'a [u8]) -> Option<Self> {
        let count = usize::from(*bytes.first()?);
        if count == 0 || bytes.len() < record_bytes(count) {
            return None;
        }
        Some(Self {
            bytes: &bytes[..record_bytes(count)],
            layout: RecordLayout::new(count),
        })
    }

    /// Number of primitives in the record.
    #[inline]
    pub fn count(&self) -> usize {
        self.layout.count()
    }

    /// Size of the record in bytes.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    /// Geometry id shared by all primitives.
    pub fn geom_id(&self) -> u32 {
        read(self.bytes, self.layout, Field::GeomId, 0)
    }

    /// Primitive id of entry `i`. Panics if `i >= count()`.
    pub fn prim_id(&self, i: usize) -> u32 {
        read(self.bytes, self.layout, Field::PrimId, i)
    }

    /// All primitive ids in storage order.
    pub fn prim_ids(&self) -> SmallVec<[u32; 8]> {
        (0..self.count()).map(|i| self.prim_id(i)).collect()
    }

    /// Quantized aligned space of entry `i`.
    pub fn space(&self, i: usize) -> QuantizedSpace {
        let axis = |a: Axis| {
            Axis::ALL.map(|c| {
                read::<i8>(
                    self.bytes,
                    self.layout,
                    Field::Basis {
                        axis: a,
                        component: c,
                    },
                    i,
                )
            })
        };
        QuantizedSpace {
            vx: axis(Axis::X),
            vy: axis(Axis::Y),
            vz: axis(Axis::Z),
        }
    }

    /// Quantized local bounds of entry `i`.
    pub fn bounds(&self, i: usize) -> QuantizedBounds {
        QuantizedBounds {
            lower: Axis::ALL.map(|a| read(self.bytes, self.layout, Field::Lower(a), i)),
            upper: Axis::ALL.map(|a| read(self.bytes, self.layout, Field::Upper(a), i)),
        }
    }

    /// All packed fields of entry `i`.
    pub fn primitive(&self, i: usize) -> PackedPrimitive {
        PackedPrimitive {
            prim_id: self.prim_id(i),
            space: self.space(i),
            bounds: self.bounds(i),
        }
    }

    /// Iterate over the packed entries.
    pub fn primitives(&self) -> impl ExactSizeIterator<Item = PackedPrimitive> + '_ {
        (0..self.count()).map(|i| self.primitive(i))
    }

    /// Shared offset/scale normalization.
    pub fn normalization(&self) -> Normalization {
        let offset: [f32; 3] = read(self.bytes, self.layout, Field::Offset, 0);
        let scale: f32 = read(self.bytes, self.layout, Field::Scale, 0);
        Normalization::new(Vec3::from_array(offset), scale)
    }

    /// Whether world point `p` lies in the oriented box of entry `i`.
    pub fn contains_point(&self, i: usize, p: Vec3) -> bool {
        self.primitive(i).contains_point(self.normalization(), p)
    }
}

/// Writes the fields of one record into a byte slice.
#[derive(Debug)]
pub(crate) struct RecordWriter<'a> {
    bytes: &'a mut [u8],
    layout: RecordLayout,
}

impl<'a> RecordWriter<'a> {
    /// Start a record of `count` primitives at the front of `bytes`.
    ///
    /// `bytes` must hold at least `record_bytes(count)` bytes.
    pub(crate) fn new(bytes: &'a mut [u8], count: u8) -> Self {
        let layout = RecordLayout::new(usize::from(count));
        let bytes = &mut bytes[..layout.byte_len()];
        write(bytes, layout, Field::Count, 0, count);
        Self { bytes, layout }
    }

    pub(crate) fn set_geom_id(&mut self, geom_id: u32) {
        write(self.bytes, self.layout, Field::GeomId, 0, geom_id);
    }

    pub(crate) fn set_normalization(&mut self, norm: Normalization) {
        write(self.bytes, self.layout, Field::Offset, 0, norm.offset.to_array());
        write(self.bytes, self.layout, Field::Scale, 0, norm.scale);
    }

    pub(crate) fn set_primitive(&mut self, i: usize, prim: &PackedPrimitive) {
        write(self.bytes, self.layout, Field::PrimId, i, prim.prim_id);
        for axis in Axis::ALL {
            let comps = prim.space.axis(axis);
            for component in Axis::ALL {
                write(
                    self.bytes,
                    self.layout,
                    Field::Basis { axis, component },
                    i,
                    comps[component.index()],
                );
            }
            let (lower, upper) = prim.bounds.axis(axis);
            write(self.bytes, self.layout, Field::Lower(axis), i, lower);
            write(self.bytes, self.layout, Field::Upper(axis), i, upper);
        }
    }

    /// Bytes covered by the record.
    pub(crate) fn byte_len(&self) -> usize {
        self.bytes.len()
    }
}

/// Read-only view of the records written for one leaf, back to back.
#[derive(Copy, Clone, Debug)]
pub struct LeafBlock<'a> {
    bytes: &'a [u8],
    records: usize,
}

impl<'a> LeafBlock<'a> {
    /// View `records` consecutive records at the start of `bytes`.
    pub fn new(bytes: &'a [u8], records: usize) -> Self {
        Self { bytes, records }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records
    }

    /// Whether the block holds no records.
    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    /// Iterate over the records, skipping each by its size.
    ///
    /// Stops early if a record cannot be parsed.
    pub fn iter(&self) -> impl Iterator<Item = LeafRecord<'a>> + use<'a> {
        let mut rest = self.bytes;
        (0..self.records).map_while(move |_| {
            let record = LeafRecord::new(rest)?;
            rest = &rest[record.byte_len()..];
            Some(record)
        })
    }

    /// Total primitives over all records.
    pub fn primitive_count(&self) -> usize {
        self.iter().map(|r| r.count()).sum()
    }
}
