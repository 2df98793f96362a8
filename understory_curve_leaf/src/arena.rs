// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Storage for built leaves.
//!
//! The leaf builder asks a [`LeafAllocator`] for exactly the bytes a leaf
//! needs and fills them in place. [`LeafArena`] is a simple bump allocator
//! over one growable byte buffer; leaves are addressed by the [`LeafHandle`]
//! returned from the builder and freed all at once with the arena.

use alloc::vec::Vec;
use core::ops::Range;

use crate::error::AllocError;
use crate::record::LeafBlock;

/// Alignment of leaf allocations.
pub const LEAF_ALIGNMENT: usize = 16;

/// A block of zeroed bytes handed out by a [`LeafAllocator`].
#[derive(Debug)]
pub struct Allocation<'a> {
    /// Position of `bytes` within the allocator's storage.
    pub offset: usize,
    /// The allocated bytes.
    pub bytes: &'a mut [u8],
}

/// Source of leaf storage.
pub trait LeafAllocator {
    /// Allocate `byte_size` zeroed bytes at an offset that is a multiple of `alignment`.
    ///
    /// `alignment` must be a power of two.
    fn allocate(
        &mut self,
        byte_size: usize,
        alignment: usize,
    ) -> Result<Allocation<'_>, AllocError>;
}

impl<A: LeafAllocator + ?Sized> LeafAllocator for &mut A {
    #[inline]
    fn allocate(
        &mut self,
        byte_size: usize,
        alignment: usize,
    ) -> Result<Allocation<'_>, AllocError> {
        (**self).allocate(byte_size, alignment)
    }
}

/// Location and shape of one built leaf.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeafHandle {
    /// Bytes of the leaf within the allocator's storage.
    pub range: Range<usize>,
    /// Number of records written back to back.
    pub records: usize,
    /// Number of primitives over all records.
    pub primitives: usize,
}

impl LeafHandle {
    /// Size of the leaf in bytes.
    pub fn byte_len(&self) -> usize {
        self.range.len()
    }
}

/// Bump allocator over a single byte buffer.
///
/// Allocation offsets are aligned relative to the start of the arena.
#[derive(Clone, Debug, Default)]
pub struct LeafArena {
    bytes: Vec<u8>,
    limit: Option<usize>,
}

impl LeafArena {
    /// Create an empty, unbounded arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty arena that refuses to grow beyond `limit` bytes.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            bytes: Vec::new(),
            limit: Some(limit),
        }
    }

    /// Byte limit, if any.
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Bytes in use, including alignment padding.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether nothing has been allocated.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// All bytes in use.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Records of the leaf described by `handle`.
    ///
    /// Returns `None` if the handle does not lie inside this arena.
    pub fn leaf(&self, handle: &LeafHandle) -> Option<LeafBlock<'_>> {
        let bytes = self.bytes.get(handle.range.clone())?;
        Some(LeafBlock::new(bytes, handle.records))
    }

    /// Drop every leaf, keeping the buffer's capacity.
    pub fn clear(&mut self) {
        self.bytes.clear();
    }
}

impl LeafAllocator for LeafArena {
    fn allocate(
        &mut self,
        byte_size: usize,
        alignment: usize,
    ) -> Result<Allocation<'_>, AllocError> {
        debug_assert!(
            alignment.is_power_of_two(),
            "alignment {alignment} must be a power of two"
        );
        let used = self.bytes.len();
        let available = self.limit.map_or(usize::MAX, |l| l.saturating_sub(used));
        let start = used.next_multiple_of(alignment);
        let requested = (start - used).saturating_add(byte_size);
        let err = AllocError {
            requested,
            available,
        };
        if requested > available {
            tracing::debug!(requested, available, "leaf arena limit reached");
            return Err(err);
        }
        self.bytes.try_reserve(requested).map_err(|_| err)?;
        let end = used + requested;
        self.bytes.resize(end, 0);
        tracing::trace!(offset = start, byte_size, "allocated leaf bytes");
        Ok(Allocation {
            offset: start,
            bytes: &mut self.bytes[start..end],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocations_are_aligned_and_zeroed() {
        let mut arena = LeafArena::new();
        let a = arena.allocate(21, LEAF_ALIGNMENT).unwrap();
        assert_eq!(a.offset, 0);
        assert_eq!(a.bytes.len(), 21);
        a.bytes.fill(0xff);
        let b = arena.allocate(46, LEAF_ALIGNMENT).unwrap();
        assert_eq!(b.offset, 32);
        assert!(b.bytes.iter().all(|&x| x == 0));
        assert_eq!(arena.len(), 32 + 46);
        // Padding between allocations stays zeroed.
        assert!(arena.as_bytes()[21..32].iter().all(|&x| x == 0));
    }

    #[test]
    fn limit_is_enforced() {
        let mut arena = LeafArena::with_limit(64);
        assert!(arena.allocate(40, 16).is_ok());
        let err = arena.allocate(20, 16).unwrap_err();
        assert_eq!(
            err,
            AllocError {
                requested: 8 + 20,
                available: 24
            }
        );
        // A failed request leaves the arena untouched.
        assert_eq!(arena.len(), 40);
        assert!(arena.allocate(8, 8).is_ok());
        assert_eq!(arena.len(), 48);
    }

    #[test]
    fn leaf_lookup_checks_range() {
        let mut arena = LeafArena::new();
        arena.allocate(10, 1).unwrap();
        let inside = LeafHandle {
            range: 0..10,
            records: 0,
            primitives: 0,
        };
        assert!(arena.leaf(&inside).is_some());
        let outside = LeafHandle {
            range: 4..12,
            ..inside
        };
        assert!(arena.leaf(&outside).is_none());
        arena.clear();
        assert!(arena.is_empty());
    }
}
