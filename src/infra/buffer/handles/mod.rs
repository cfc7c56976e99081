//! Message handle pool tracking in-flight transmissions.
//!
//! A handle is allocated when a transmission is requested, updated from
//! interrupt context on completion or abort, and released by the caller once
//! the final status has been read.
use alloc::vec::Vec;

use bitflags::bitflags;

use crate::config::HandleTracking;
use crate::error::ShimError;
use crate::protocol::transport::UNTRACKED_HANDLE;

bitflags! {
    /// Per-message status bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct HandleStatus: u8 {
        const BUS_OFF = 0x01;
        const ERROR_WARNING = 0x04;
        /// Frame acknowledged on the bus.
        const TX_OK = 0x10;
    }
}

/// Opaque index into a [`HandleTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MessageHandle(pub u16);

impl MessageHandle {
    /// Handed out by tables (and backends) that do not track messages.
    pub const UNTRACKED: MessageHandle = MessageHandle(UNTRACKED_HANDLE);
}

#[derive(Debug, Clone, Copy, Default)]
struct HandleSlot {
    frames_transmitted: u16,
    status: HandleStatus,
    in_use: bool,
}

//==================================================================================HANDLE_TABLE
/// Fixed pool of handle slots.
#[derive(Debug)]
pub struct HandleTable {
    slots: Vec<HandleSlot>,
    tracking: HandleTracking,
}

impl HandleTable {
    /// Reserves `capacity` slots. A disabled table reserves nothing.
    pub fn try_new(capacity: usize, tracking: HandleTracking) -> Result<Self, ShimError> {
        let mut slots = Vec::new();
        if tracking == HandleTracking::Tracked {
            if capacity == 0 || capacity > UNTRACKED_HANDLE as usize {
                return Err(ShimError::AllocationFailure);
            }
            slots
                .try_reserve_exact(capacity)
                .map_err(|_| ShimError::AllocationFailure)?;
            slots.resize(capacity, HandleSlot::default());
        }
        Ok(Self { slots, tracking })
    }

    pub fn tracking(&self) -> HandleTracking {
        self.tracking
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of handles currently in flight.
    pub fn in_use(&self) -> usize {
        self.slots.iter().filter(|slot| slot.in_use).count()
    }

    /// Claims the first free slot (linear scan) and zeroes its counters.
    pub fn allocate(&mut self) -> Result<MessageHandle, ShimError> {
        if self.tracking == HandleTracking::Disabled {
            return Ok(MessageHandle::UNTRACKED);
        }
        let index = self
            .slots
            .iter()
            .position(|slot| !slot.in_use)
            .ok_or(ShimError::HandleNotAvailable)?;
        self.slots[index] = HandleSlot {
            frames_transmitted: 0,
            status: HandleStatus::empty(),
            in_use: true,
        };
        Ok(MessageHandle(index as u16))
    }

    /// Returns the slot to the pool.
    pub fn release(&mut self, handle: MessageHandle) -> Result<(), ShimError> {
        if self.tracking == HandleTracking::Disabled {
            return Ok(());
        }
        let slot = self.slot_mut(handle)?;
        slot.in_use = false;
        Ok(())
    }

    /// `(frames transmitted, status)` of an allocated handle.
    pub fn status(&self, handle: MessageHandle) -> Result<(u16, HandleStatus), ShimError> {
        if self.tracking == HandleTracking::Disabled {
            return Ok((1, HandleStatus::TX_OK));
        }
        match self.slots.get(handle.0 as usize) {
            Some(slot) if slot.in_use => Ok((slot.frames_transmitted, slot.status)),
            _ => Err(ShimError::InvalidHandle),
        }
    }

    /// Completion: one more frame on the bus, OK bit set.
    pub fn mark_transmitted(&mut self, handle: MessageHandle) -> Result<(), ShimError> {
        if self.tracking == HandleTracking::Disabled {
            return Ok(());
        }
        let slot = self.slot_mut(handle)?;
        slot.frames_transmitted = slot.frames_transmitted.saturating_add(1);
        slot.status.insert(HandleStatus::TX_OK);
        Ok(())
    }

    /// Abort: OK bit cleared, transmitted count untouched.
    pub fn mark_aborted(&mut self, handle: MessageHandle) -> Result<(), ShimError> {
        if self.tracking == HandleTracking::Disabled {
            return Ok(());
        }
        let slot = self.slot_mut(handle)?;
        slot.status.remove(HandleStatus::TX_OK);
        Ok(())
    }

    /// Mirrors the bus condition into a handle still in flight.
    pub fn flag_bus_condition(
        &mut self,
        handle: MessageHandle,
        flags: HandleStatus,
    ) -> Result<(), ShimError> {
        if self.tracking == HandleTracking::Disabled {
            return Ok(());
        }
        let slot = self.slot_mut(handle)?;
        slot.status.remove(HandleStatus::BUS_OFF | HandleStatus::ERROR_WARNING);
        slot.status.insert(flags & (HandleStatus::BUS_OFF | HandleStatus::ERROR_WARNING));
        Ok(())
    }

    fn slot_mut(&mut self, handle: MessageHandle) -> Result<&mut HandleSlot, ShimError> {
        match self.slots.get_mut(handle.0 as usize) {
            Some(slot) if slot.in_use => Ok(slot),
            _ => Err(ShimError::InvalidHandle),
        }
    }
}
