//! Shared vocabulary of the shim: bit rates, bus status levels, port indices
//! and receive-poll outcomes. Every layer (driver bridge, registry, backends)
//! speaks in these types.
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::protocol::transport::can_frame::CanFrame;

/// Number of logical ports a backend may expose.
pub const MAX_PORTS: usize = 4;

/// Logical port index (`0..MAX_PORTS`). One RX and one TX ring per port.
pub type Port = u8;

//==================================================================================BIT_RATE
/// Bus bit rates supported by the controllers and adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum BitRate {
    Kbps20 = 0,
    Kbps125 = 1,
    Kbps250 = 2,
    Kbps500 = 3,
    Mbps1 = 4,
}

impl BitRate {
    /// Bits per second.
    pub const fn bps(self) -> u32 {
        match self {
            BitRate::Kbps20 => 20_000,
            BitRate::Kbps125 => 125_000,
            BitRate::Kbps250 => 250_000,
            BitRate::Kbps500 => 500_000,
            BitRate::Mbps1 => 1_000_000,
        }
    }

    /// Selector character used by ASCII (`S<n>`) adapters.
    pub const fn ascii_code(self) -> u8 {
        match self {
            BitRate::Kbps20 => b'1',
            BitRate::Kbps125 => b'4',
            BitRate::Kbps250 => b'5',
            BitRate::Kbps500 => b'6',
            BitRate::Mbps1 => b'8',
        }
    }

    /// Inverse of [`BitRate::ascii_code`].
    pub const fn from_ascii_code(code: u8) -> Option<Self> {
        match code {
            b'1' => Some(BitRate::Kbps20),
            b'4' => Some(BitRate::Kbps125),
            b'5' => Some(BitRate::Kbps250),
            b'6' => Some(BitRate::Kbps500),
            b'8' => Some(BitRate::Mbps1),
            _ => None,
        }
    }
}

//==================================================================================BUS_STATUS
/// Filtered, three-level view of the bus health reported to callers.
///
/// `Warning` and `BusOff` are degraded states, not faults: transmissions keep
/// being accepted (and rejected with `DriverBusy` while bus-off lasts).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusStatus {
    #[default]
    Ok,
    Warning,
    BusOff,
}

//==================================================================================RECEIVE_OUTCOME
/// Result of a non-blocking receive poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// Nothing pending.
    NoData,
    /// A frame was pulled from the port.
    NewData(CanFrame),
}

impl ReceiveOutcome {
    /// Converts into an `Option`, dropping the poll vocabulary.
    pub fn into_frame(self) -> Option<CanFrame> {
        match self {
            ReceiveOutcome::NoData => None,
            ReceiveOutcome::NewData(frame) => Some(frame),
        }
    }
}
