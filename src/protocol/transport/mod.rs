//! Transport layer: CAN frame representation, 29-bit identifier codecs, and
//! the asynchronous bus abstraction traits.
//!
//! ## Timing and sizing constants
//!
//! These constants define the default sizes, timeouts and adapter parameters
//! used by the driver bridge and the hosted backends.

use core::net::Ipv4Addr;

pub mod can_frame;
pub mod can_id;
pub mod traits;

/// Periodic ticks a transmit slot may stay unacknowledged before it is aborted
/// (50 ms with a 1 ms status tick).
pub const DRIVER_TX_TIMEOUT_TICKS: u16 = 50;

/// Upper bound on the hardware transmit mailboxes a controller may expose.
///
/// TI parts expose seven, Motorola/NXP parts three.
pub const MAX_TX_SLOTS: usize = 8;

/// Default capacity of each RX/TX frame ring.
pub const DEFAULT_RING_CAPACITY: usize = 32;

/// Consecutive status samples needed before the filtered bus status changes.
pub const BUS_STATUS_DEBOUNCE: u8 = 3;

/// Default polling interval of [`RegistryBus`](crate::protocol::registry::RegistryBus)
/// when no frame is pending (ms).
pub const RECEIVE_POLL_INTERVAL_MS: u32 = 1;

/// Sentinel handle returned by backends that do not track messages.
pub const UNTRACKED_HANDLE: u16 = 1000;

//==================================================================================VIRTUAL_BUS
/// UDP port shared by every node of the virtual bus.
pub const UDP_CAN_PORT: u16 = 22594;

/// Broadcast address of the virtual bus segment.
pub const UDP_BROADCAST_ADDR: Ipv4Addr = Ipv4Addr::new(192, 168, 0, 255);

//==================================================================================ASCII_ADAPTER
/// Default serial device of USB-CAN ASCII adapters.
pub const SERIAL_DEVICE: &str = "/dev/ttyUSB0";

/// Serial line speed of USB-CAN ASCII adapters.
pub const SERIAL_BAUD: u32 = 230_400;

/// Delay between two polls of the version reply during init (ms).
pub const VERSION_TRY_MS: u64 = 100;

/// Version polls before init gives up (2 s total).
pub const VERSION_TRIES: u32 = 2000 / VERSION_TRY_MS as u32;

/// Status calls skipped between two `F` queries to the adapter.
pub const STATUS_SKIPS: u32 = 32;
