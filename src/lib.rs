//! `korri-canshim` library: a CAN transport shim sitting between a
//! J1939/NMEA 2000 protocol stack and the bus. The crate exposes the
//! infrastructure modules (frame rings, handle pool, hardware driver contract),
//! the protocol layer (identifier codec, driver bridge, backend registry), and
//! the hosted backends when the `std` feature is enabled.
#![cfg_attr(not(feature = "std"), no_std)]
//==================================================================================
extern crate alloc;
//==================================================================================
/// Core data types shared by the bridge, the registry, and every backend.
pub mod core;
/// Runtime configuration: ring sizes, handle policy, codec width, backend settings.
pub mod config;
/// Error taxonomy (ring, handle, driver, datagram, ASCII adapter).
pub mod error;
/// Frame rings, handle pool, and the hardware controller contract.
pub mod infra;
/// Identifier codec, driver bridge, transport registry, and backends.
pub mod protocol;
//==================================================================================
