// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Growable record buffers for pulse and point data.
//!
//! A [`RecordBuffer`] is an append-only, randomly indexable sequence of
//! fixed-layout records. Capacity grows in fixed increments and old records
//! are shed from the front in one of two ways:
//!
//! ```text
//!  drop_front(3)                      split_lower(3)
//! ┌───┬───┬───┬───┬───┐             ┌───┬───┬───┬───┬───┐
//! │ 0 │ 1 │ 2 │ 3 │ 4 │             │ 0 │ 1 │ 2 │ 3 │ 4 │
//! └───┴───┴───┴───┴───┘             └───┴───┴───┴───┴───┘
//!   discarded  ┌───┬───┐            ┌───┬───┬───┐ ┌───┬───┐
//!              │ 3 │ 4 │            │ 0 │ 1 │ 2 │ │ 3 │ 4 │
//!              └───┴───┘            └───┴───┴───┘ └───┴───┘
//!              index 0..            returned      kept, index 0..
//! ```
//!
//! # Example
//!
//! ```
//! use edgefirst_lidarscan::buffer::RecordBuffer;
//!
//! let mut buf = RecordBuffer::with_capacity(4, 2);
//! for i in 0..5u32 {
//!     buf.push(i);
//! }
//!
//! let lower = buf.split_lower(2);
//! assert_eq!(lower.as_slice(), &[0, 1]);
//! assert_eq!(buf.as_slice(), &[2, 3, 4]);
//! assert_eq!(buf.first(), Some(&2));
//! ```

/// Default initial capacity of the pulse and point buffers.
pub const DEFAULT_CAPACITY: usize = 200;

/// Default number of records added each time a buffer fills up.
pub const DEFAULT_GROW_BY: usize = 100;

/// Sizing of the record buffers owned by a pulse accumulator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferConfig {
    /// Initial pulse buffer capacity
    pub pulse_capacity: usize,
    /// Initial point buffer capacity
    pub point_capacity: usize,
    /// Fixed capacity increment when a buffer is full
    pub grow_by: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            pulse_capacity: DEFAULT_CAPACITY,
            point_capacity: DEFAULT_CAPACITY,
            grow_by: DEFAULT_GROW_BY,
        }
    }
}

/// Append-only record sequence with front compaction.
///
/// Logical indices always start at 0 for the oldest retained record. The
/// value stored at an index does not change until that index is removed by
/// [`Self::drop_front`] or [`Self::split_lower`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordBuffer<T> {
    data: Vec<T>,
    grow_by: usize,
}

impl<T> RecordBuffer<T> {
    /// Create a buffer with an initial capacity and a growth increment.
    ///
    /// A `grow_by` of zero is treated as one.
    pub fn with_capacity(capacity: usize, grow_by: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            grow_by: grow_by.max(1),
        }
    }

    /// Create an empty buffer with the default sizing.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, DEFAULT_GROW_BY)
    }

    /// Returns the number of records in the buffer.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the buffer holds no records.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the currently allocated capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Returns the growth increment.
    #[inline]
    pub fn grow_by(&self) -> usize {
        self.grow_by
    }

    /// Append a record, growing by `grow_by` records when full.
    #[inline]
    pub fn push(&mut self, record: T) {
        if self.data.len() == self.data.capacity() {
            self.data.reserve_exact(self.grow_by);
        }
        self.data.push(record);
    }

    /// Returns the record at `index`, or `None` when out of range.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.data.get(index)
    }

    /// Returns mutable access to the record at `index`.
    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.data.get_mut(index)
    }

    /// Returns the oldest record.
    #[inline]
    pub fn first(&self) -> Option<&T> {
        self.data.first()
    }

    /// Returns the newest record.
    #[inline]
    pub fn last(&self) -> Option<&T> {
        self.data.last()
    }

    /// Returns mutable access to the newest record.
    #[inline]
    pub fn last_mut(&mut self) -> Option<&mut T> {
        self.data.last_mut()
    }

    /// Discard the oldest `n` records and compact the rest to index 0.
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds the number of records.
    pub fn drop_front(&mut self, n: usize) {
        assert!(
            n <= self.data.len(),
            "RecordBuffer drop_front out of range: {} > {}",
            n,
            self.data.len()
        );
        self.data.drain(..n);
    }

    /// Remove the oldest `n` records and return them as a new buffer.
    ///
    /// `n` is clamped to the number of records. The returned buffer shares
    /// the growth increment of `self`; the remainder is compacted to index 0.
    pub fn split_lower(&mut self, n: usize) -> RecordBuffer<T> {
        let n = n.min(self.data.len());
        let upper = self.data.split_off(n);
        let lower = std::mem::replace(&mut self.data, upper);
        if self.data.capacity() == 0 {
            self.data.reserve_exact(self.grow_by);
        }

        RecordBuffer {
            data: lower,
            grow_by: self.grow_by,
        }
    }

    /// Remove all records, keeping the allocation.
    #[inline]
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Returns the records as a slice in buffer order.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Returns the records as a mutable slice in buffer order.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Iterate over the records in buffer order.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }

    /// Consume the buffer, returning the records.
    #[inline]
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}

impl<T> Default for RecordBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> IntoIterator for RecordBuffer<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a RecordBuffer<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}
