//! Fixed-capacity circular FIFO used for the per-port RX and TX queues.
//!
//! The ring is **not** synchronized. When it is shared between interrupt and
//! task context every `insert`/`extract` must run inside the owner's critical
//! section (see [`DriverBridge`](crate::protocol::bridge::DriverBridge)).
use alloc::vec::Vec;

use crate::error::{RingError, ShimError};

//==================================================================================FRAME_RING
/// Circular buffer of `capacity` items with get/put cursors and a count.
///
/// Invariant: `0 <= count <= capacity`. Storage is reserved once and never
/// resized.
#[derive(Debug)]
pub struct FrameRing<T: Copy> {
    slots: Vec<Option<T>>,
    get: usize,
    put: usize,
    count: usize,
}

impl<T: Copy> FrameRing<T> {
    /// Reserves the backing storage.
    ///
    /// Returns [`ShimError::AllocationFailure`] when the allocator cannot
    /// provide `capacity` slots, or when `capacity` is zero.
    pub fn try_new(capacity: usize) -> Result<Self, ShimError> {
        if capacity == 0 {
            return Err(ShimError::AllocationFailure);
        }
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| ShimError::AllocationFailure)?;
        slots.resize(capacity, None);

        Ok(Self {
            slots,
            get: 0,
            put: 0,
            count: 0,
        })
    }

    /// Copies `item` into the next put slot.
    ///
    /// Returns the number of free slots left, or [`RingError::Full`] without
    /// touching the stored items.
    pub fn insert(&mut self, item: T) -> Result<usize, RingError> {
        let capacity = self.capacity();
        if self.count == capacity {
            return Err(RingError::Full);
        }
        self.slots[self.put] = Some(item);
        self.put = (self.put + 1) % capacity;
        self.count += 1;
        Ok(capacity - self.count)
    }

    /// Removes the oldest item.
    ///
    /// Returns it with the number of items still queued, or
    /// [`RingError::Empty`] without mutating state.
    pub fn extract(&mut self) -> Result<(T, usize), RingError> {
        if self.count == 0 {
            return Err(RingError::Empty);
        }
        let item = self.slots[self.get].take().ok_or(RingError::Empty)?;
        self.get = (self.get + 1) % self.capacity();
        self.count -= 1;
        Ok((item, self.count))
    }

    /// Oldest item without removing it.
    pub fn peek(&self) -> Option<&T> {
        if self.count == 0 {
            None
        } else {
            self.slots[self.get].as_ref()
        }
    }

    /// Queued items, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let capacity = self.capacity();
        (0..self.count).filter_map(move |offset| self.slots[(self.get + offset) % capacity].as_ref())
    }

    /// Drops every queued item.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.get = 0;
        self.put = 0;
        self.count = 0;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.count == self.capacity()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

//==================================================================================TESTS
#[cfg(test)]
#[path = "tests.rs"]
mod tests;
