//! Runtime configuration of channels, codecs and backends.
//!
//! Every structure has a `Default` matching the constants of
//! [`crate::protocol::transport`] and fluent `with_*` setters.

use crate::protocol::transport::{
    BUS_STATUS_DEBOUNCE, DEFAULT_RING_CAPACITY, DRIVER_TX_TIMEOUT_TICKS,
};

//==================================================================================POLICIES
/// Width of the DataPage field inside the 29-bit identifier.
///
/// Most call sites treat it as one bit (bit 24); some adapters also fold the
/// reserved bit 25 into it. `One` is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataPageWidth {
    #[default]
    One,
    Two,
}

impl DataPageWidth {
    /// Mask applied to the DataPage value.
    pub const fn mask(self) -> u8 {
        match self {
            DataPageWidth::One => 0x01,
            DataPageWidth::Two => 0x03,
        }
    }
}

/// What a backend reports when the underlying write fails.
///
/// `Report` surfaces the failure. `ReportSuccess` swallows it, logging once
/// until a write succeeds again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SendFailurePolicy {
    #[default]
    Report,
    ReportSuccess,
}

/// Whether the handle table tracks every in-flight message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HandleTracking {
    #[default]
    Tracked,
    /// Allocation yields a sentinel and status always reads `(1, TX_OK)`.
    Disabled,
}

//==================================================================================CHANNEL_CONFIG
/// Sizing and timing of one driver-bridge channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChannelConfig {
    pub rx_capacity: usize,
    pub tx_capacity: usize,
    /// Handle pool size; matches the TX ring capacity by default.
    pub handle_capacity: usize,
    pub handle_tracking: HandleTracking,
    /// Ticks before an unacknowledged slot is aborted.
    pub tx_timeout_ticks: u16,
    /// Consecutive samples required before the filtered bus status moves.
    pub bus_status_debounce: u8,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            rx_capacity: DEFAULT_RING_CAPACITY,
            tx_capacity: DEFAULT_RING_CAPACITY,
            handle_capacity: DEFAULT_RING_CAPACITY,
            handle_tracking: HandleTracking::Tracked,
            tx_timeout_ticks: DRIVER_TX_TIMEOUT_TICKS,
            bus_status_debounce: BUS_STATUS_DEBOUNCE,
        }
    }
}

impl ChannelConfig {
    pub fn with_rx_capacity(mut self, capacity: usize) -> Self {
        self.rx_capacity = capacity;
        self
    }

    /// Also resizes the handle pool to the same capacity.
    pub fn with_tx_capacity(mut self, capacity: usize) -> Self {
        self.tx_capacity = capacity;
        self.handle_capacity = capacity;
        self
    }

    pub fn with_handle_capacity(mut self, capacity: usize) -> Self {
        self.handle_capacity = capacity;
        self
    }

    pub fn with_handle_tracking(mut self, tracking: HandleTracking) -> Self {
        self.handle_tracking = tracking;
        self
    }

    pub fn with_tx_timeout_ticks(mut self, ticks: u16) -> Self {
        self.tx_timeout_ticks = ticks;
        self
    }

    pub fn with_bus_status_debounce(mut self, samples: u8) -> Self {
        self.bus_status_debounce = samples.max(1);
        self
    }
}

//==================================================================================HOSTED_CONFIG
#[cfg(feature = "std")]
pub use hosted::*;

#[cfg(feature = "std")]
mod hosted {
    use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

    use super::{DataPageWidth, SendFailurePolicy};

    /// Radix of the two-digit code in the adapter's `F` status reply.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub enum StatusRadix {
        #[default]
        Decimal,
        Hex,
    }
    use crate::protocol::transport::{
        SERIAL_BAUD, SERIAL_DEVICE, STATUS_SKIPS, UDP_BROADCAST_ADDR, UDP_CAN_PORT,
        VERSION_TRIES, VERSION_TRY_MS,
    };

    /// UDP broadcast virtual bus.
    #[derive(Debug, Clone, PartialEq, Eq)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct UdpConfig {
        /// Local address the listen socket binds to.
        pub bind: SocketAddr,
        /// Destination of every transmitted record.
        pub destination: SocketAddr,
        pub send_failure: SendFailurePolicy,
    }

    impl Default for UdpConfig {
        fn default() -> Self {
            Self {
                bind: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, UDP_CAN_PORT)),
                destination: SocketAddr::V4(SocketAddrV4::new(UDP_BROADCAST_ADDR, UDP_CAN_PORT)),
                send_failure: SendFailurePolicy::Report,
            }
        }
    }

    impl UdpConfig {
        pub fn with_bind(mut self, bind: SocketAddr) -> Self {
            self.bind = bind;
            self
        }

        pub fn with_destination(mut self, destination: SocketAddr) -> Self {
            self.destination = destination;
            self
        }

        pub fn with_send_failure(mut self, policy: SendFailurePolicy) -> Self {
            self.send_failure = policy;
            self
        }
    }

    /// TCP virtual bus (point-to-point relay).
    #[derive(Debug, Clone, PartialEq, Eq)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct TcpConfig {
        pub peer: SocketAddr,
        pub connect_timeout_ms: u64,
        pub send_failure: SendFailurePolicy,
    }

    impl Default for TcpConfig {
        fn default() -> Self {
            Self {
                peer: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, UDP_CAN_PORT)),
                connect_timeout_ms: 500,
                send_failure: SendFailurePolicy::Report,
            }
        }
    }

    impl TcpConfig {
        pub fn with_peer(mut self, peer: SocketAddr) -> Self {
            self.peer = peer;
            self
        }
    }

    /// Linux SocketCAN interface.
    #[derive(Debug, Clone, PartialEq, Eq)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct SocketCanConfig {
        pub interface: String,
        pub data_page_width: DataPageWidth,
        pub send_failure: SendFailurePolicy,
    }

    impl Default for SocketCanConfig {
        fn default() -> Self {
            Self {
                interface: "can0".to_string(),
                data_page_width: DataPageWidth::One,
                send_failure: SendFailurePolicy::Report,
            }
        }
    }

    impl SocketCanConfig {
        pub fn with_interface(mut self, interface: &str) -> Self {
            self.interface = interface.to_string();
            self
        }

        pub fn with_data_page_width(mut self, width: DataPageWidth) -> Self {
            self.data_page_width = width;
            self
        }

        pub fn with_send_failure(mut self, policy: SendFailurePolicy) -> Self {
            self.send_failure = policy;
            self
        }
    }

    /// ASCII (Lawicel-style) USB-CAN adapter on a serial line.
    #[derive(Debug, Clone, PartialEq, Eq)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct AsciiSerialConfig {
        pub device: String,
        pub baud: u32,
        pub data_page_width: DataPageWidth,
        /// Polls of the version reply before init gives up.
        pub version_tries: u32,
        pub version_try_ms: u64,
        /// Status calls between two `F` queries.
        pub status_skips: u32,
        pub status_radix: StatusRadix,
    }

    impl Default for AsciiSerialConfig {
        fn default() -> Self {
            Self {
                device: SERIAL_DEVICE.to_string(),
                baud: SERIAL_BAUD,
                data_page_width: DataPageWidth::One,
                version_tries: VERSION_TRIES,
                version_try_ms: VERSION_TRY_MS,
                status_skips: STATUS_SKIPS,
                status_radix: StatusRadix::Decimal,
            }
        }
    }

    impl AsciiSerialConfig {
        pub fn with_device(mut self, device: &str) -> Self {
            self.device = device.to_string();
            self
        }

        pub fn with_version_retry(mut self, tries: u32, try_ms: u64) -> Self {
            self.version_tries = tries;
            self.version_try_ms = try_ms;
            self
        }

        pub fn with_status_skips(mut self, skips: u32) -> Self {
            self.status_skips = skips;
            self
        }

        pub fn with_status_radix(mut self, radix: StatusRadix) -> Self {
            self.status_radix = radix;
            self
        }
    }
}
