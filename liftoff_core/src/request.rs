// Copyright 2026 the Liftoff Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Staged atomic requests.
//!
//! A [`Request`] is an ordered list of property writes that a backend turns
//! into one atomic commit. Writes are appended with [`Request::add`];
//! [`Request::cursor`] snapshots the current length and
//! [`Request::set_cursor`] truncates back to a snapshot, so a write that was
//! rolled back never reaches the kernel.

use alloc::vec::Vec;

/// One staged `(object, property, value)` write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StagedWrite {
    /// KMS object id (plane, CRTC, connector).
    pub object_id: u32,
    /// KMS property id on that object.
    pub property_id: u32,
    /// Raw property value.
    pub value: u64,
}

/// An atomic request under construction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Request {
    writes: Vec<StagedWrite>,
}

impl Request {
    /// Creates an empty request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a property write.
    pub fn add(&mut self, object_id: u32, property_id: u32, value: u64) {
        self.writes.push(StagedWrite {
            object_id,
            property_id,
            value,
        });
    }

    /// Returns a snapshot of the current request length.
    #[inline]
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.writes.len()
    }

    /// Drops every write staged after `cursor` was taken.
    ///
    /// A cursor past the end is ignored.
    #[inline]
    pub fn set_cursor(&mut self, cursor: usize) {
        self.writes.truncate(cursor);
    }

    /// Removes all staged writes.
    pub fn clear(&mut self) {
        self.writes.clear();
    }

    /// Staged writes in submission order.
    #[must_use]
    pub fn writes(&self) -> &[StagedWrite] {
        &self.writes
    }

    /// Number of staged writes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Whether nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// The value the kernel would see for `(object_id, property_id)`: the last
    /// staged write wins.
    #[must_use]
    pub fn value(&self, object_id: u32, property_id: u32) -> Option<u64> {
        self.writes
            .iter()
            .rev()
            .find(|w| w.object_id == object_id && w.property_id == property_id)
            .map(|w| w.value)
    }
}
