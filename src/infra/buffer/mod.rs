//! Fixed-capacity storage created once at channel setup.
pub mod handles;
pub mod ring;
