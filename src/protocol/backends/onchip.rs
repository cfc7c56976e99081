//! Backend over the on-chip CAN controllers, one [`DriverBridge`] per port.
//!
//! Bridges are borrowed so the interrupt vectors can reach the same
//! instances (typically `'static` cells) while the registry owns the backend.
use heapless::Vec;

use crate::core::{BitRate, BusStatus, Port, ReceiveOutcome, MAX_PORTS};
use crate::error::ShimError;
use crate::infra::buffer::handles::{HandleStatus, MessageHandle};
use crate::infra::driver::HardwareDriver;
use crate::protocol::bridge::{ChannelStatistics, DriverBridge};
use crate::protocol::registry::Transport;
use crate::protocol::transport::can_frame::CanFrame;

pub struct OnChipTransport<'a, D: HardwareDriver> {
    ports: Vec<&'a DriverBridge<D>, MAX_PORTS>,
}

impl<'a, D: HardwareDriver> OnChipTransport<'a, D> {
    /// Port `n` is served by `bridges[n]`. More than [`MAX_PORTS`] bridges is
    /// an [`ShimError::InvalidPort`].
    pub fn new(bridges: &[&'a DriverBridge<D>]) -> Result<Self, ShimError> {
        let ports = Vec::from_slice(bridges).map_err(|_| ShimError::InvalidPort)?;
        Ok(Self { ports })
    }

    pub fn bridge(&self, port: Port) -> Result<&'a DriverBridge<D>, ShimError> {
        self.ports.get(port as usize).copied().ok_or(ShimError::InvalidPort)
    }
}

impl<D: HardwareDriver> Transport for OnChipTransport<'_, D> {
    fn name(&self) -> &'static str {
        "onchip"
    }

    fn init(&mut self, bit_rate: BitRate) -> bool {
        !self.ports.is_empty() && self.ports.iter().all(|bridge| bridge.init(bit_rate).is_ok())
    }

    fn close(&mut self) {
        for bridge in &self.ports {
            let _ = bridge.disable();
        }
    }

    /// Filtered status of port 0.
    fn status(&mut self) -> BusStatus {
        self.ports
            .first()
            .map_or(BusStatus::BusOff, |bridge| bridge.bus_status())
    }

    fn receive(&mut self, port: Port) -> Result<ReceiveOutcome, ShimError> {
        Ok(self.bridge(port)?.receive_frame())
    }

    fn send(&mut self, port: Port, frame: &CanFrame) -> Result<MessageHandle, ShimError> {
        self.bridge(port)?.transmit_request(frame)
    }

    fn statistics(&self, port: Port) -> Result<ChannelStatistics, ShimError> {
        Ok(self.bridge(port)?.statistics())
    }

    fn clear_statistics(&mut self, port: Port) -> Result<(), ShimError> {
        self.bridge(port)?.clear_statistics();
        Ok(())
    }

    fn handle_status(&mut self, port: Port, handle: MessageHandle) -> Result<(u16, HandleStatus), ShimError> {
        self.bridge(port)?.handle_status(handle)
    }

    fn release_handle(&mut self, port: Port, handle: MessageHandle) -> Result<(), ShimError> {
        self.bridge(port)?.release_handle(handle)
    }

    fn tick(&mut self) {
        for bridge in &self.ports {
            bridge.status_tick();
        }
    }
}
