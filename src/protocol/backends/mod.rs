//! Transport backends registered with the
//! [`TransportRegistry`](crate::protocol::registry::TransportRegistry).
//!
//! * [`onchip`]: on-chip controllers through the driver bridge (`no_std`).
//! * [`loopback`]: in-memory virtual bus (`no_std`).
//! * [`datagram`]: 16-byte record shared by the network backends.
//! * [`udp`] and [`tcp`]: virtual bus over IP (`std`).
//! * [`ascii_serial`]: ASCII USB-CAN adapters (`std`).
//! * [`socket_can`]: Linux SocketCAN (`socketcan` feature).
pub mod datagram;
pub mod loopback;
pub mod onchip;

#[cfg(feature = "std")]
pub mod ascii_serial;
#[cfg(feature = "std")]
pub mod tcp;
#[cfg(feature = "std")]
pub mod udp;

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub mod socket_can;
