//! Per-channel counters, mutated from interrupt handlers and the status tick.
use crate::infra::driver::HwStatus;

/// Statistics exposed to callers by every backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelStatistics {
    /// Extended frames handed to the hardware (or the wire).
    pub tx_ext_frames: u32,
    /// Extended frames accepted into the receive path.
    pub rx_ext_frames: u32,
    pub tx_err_count: u16,
    pub rx_err_count: u16,
    pub bus_off_count: u16,
    /// Received frames lost because the RX ring was full or malformed.
    pub rx_dropped: u32,
    /// Transmit requests lost because the TX ring was full.
    pub tx_dropped: u32,
    pub last_tx_status: HwStatus,
    pub last_rx_status: HwStatus,
}

impl ChannelStatistics {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
