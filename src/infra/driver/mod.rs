//! Contract of the lowest-level CAN controller driver (one per target MCU).
//!
//! The shim never touches registers itself: the driver bridge consumes this
//! trait. Calls are issued from inside the bridge's critical section, either
//! from task context or from the interrupt entry point
//! [`DriverBridge::on_interrupt`](crate::protocol::bridge::DriverBridge::on_interrupt).
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::core::BitRate;
use crate::error::DriverError;
use crate::protocol::transport::can_frame::CanFrame;

pub mod simulated;

/// Hardware transmit mailbox index.
pub type TxSlot = u8;

/// Acceptance filter applied at init.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FilterMode {
    PassAll,
    PassNone,
}

/// Raw error state of one controller direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum HwStatus {
    #[default]
    Ok = 0,
    Warning = 1,
    /// Error passive.
    Error = 2,
    BusOff = 3,
    Invalid = 4,
}

/// Interrupt sources a handler can be installed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CallbackReason {
    Receive = 0,
    Overflow = 1,
    TxOk = 2,
    TxAbort = 3,
    Wakeup = 4,
    Status = 5,
}

impl CallbackReason {
    /// Number of reasons, size of any table keyed by them.
    pub const COUNT: usize = 6;

    pub fn index(self) -> usize {
        u8::from(self) as usize
    }
}

/// Register-level driver of a CAN controller.
pub trait HardwareDriver {
    /// Configures the controller for `bit_rate` with the given filter.
    fn init(&mut self, channel: u8, bit_rate: BitRate, filter: FilterMode) -> Result<(), DriverError>;

    fn set_filter(&mut self, channel: u8, filter_id: u8, id: u32, mask: u32) -> Result<(), DriverError>;

    fn enable(&mut self, channel: u8) -> Result<(), DriverError>;

    fn disable(&mut self, channel: u8) -> Result<(), DriverError>;

    fn sleep(&mut self, channel: u8, wake_on_traffic: bool) -> Result<(), DriverError>;

    fn wake_up(&mut self, channel: u8) -> Result<(), DriverError>;

    /// Pops one frame from the hardware FIFO; [`DriverError::NoData`] when empty.
    fn receive(&mut self, channel: u8) -> Result<CanFrame, DriverError>;

    /// `Ok` when a transmit slot is free, [`DriverError::TxBusy`] otherwise.
    fn transmit_ok(&mut self, channel: u8) -> Result<(), DriverError>;

    /// Loads `frame` into a free slot with the given local transmit priority.
    fn transmit(&mut self, channel: u8, frame: &CanFrame, priority: u16) -> Result<TxSlot, DriverError>;

    /// Requests cancellation of a pending slot. Completion is reported later
    /// through a [`CallbackReason::TxAbort`] interrupt.
    fn abort(&mut self, channel: u8, slot: TxSlot) -> Result<(), DriverError>;

    /// Transmit error state and error counter.
    fn tx_status(&mut self, channel: u8) -> (HwStatus, u16);

    /// Receive error state and error counter.
    fn rx_status(&mut self, channel: u8) -> (HwStatus, u16);

    /// Enables the interrupt source for `reason`.
    fn install_callback(&mut self, channel: u8, reason: CallbackReason) -> Result<(), DriverError>;

    /// ISR context: slot whose completion or abort raised the interrupt.
    fn completed_slot(&mut self, channel: u8) -> Option<TxSlot>;

    /// Whether a frame is currently being put on the wire.
    fn is_transmitting(&mut self, channel: u8) -> bool;

    /// Number of transmit mailboxes, at most
    /// [`MAX_TX_SLOTS`](crate::protocol::transport::MAX_TX_SLOTS).
    fn tx_slot_count(&self) -> usize;
}
