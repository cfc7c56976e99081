//! Protocol-facing half of the shim: frame and identifier transport types,
//! the driver bridge of on-chip controllers, the backend registry, and the
//! backends themselves.
pub mod backends;
pub mod bridge;
pub mod registry;
pub mod transport;
