//! Infrastructure shared by every channel: frame rings, the message handle
//! pool, and the contract of the hardware controller drivers.
pub mod buffer;
pub mod driver;
