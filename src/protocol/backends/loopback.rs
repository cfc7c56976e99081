//! Virtual backend echoing every sent frame back on the same port.
//!
//! Used as the simulated bus of hosted tools and for registry probing: the
//! number of failed `init` attempts before it opens is configurable.
use alloc::vec::Vec;

use crate::config::ChannelConfig;
use crate::core::{BitRate, BusStatus, Port, ReceiveOutcome, MAX_PORTS};
use crate::error::ShimError;
use crate::infra::buffer::handles::{HandleStatus, HandleTable, MessageHandle};
use crate::infra::buffer::ring::FrameRing;
use crate::protocol::bridge::ChannelStatistics;
use crate::protocol::registry::Transport;
use crate::protocol::transport::can_frame::CanFrame;

struct LoopbackPort {
    ring: FrameRing<CanFrame>,
    handles: HandleTable,
    stats: ChannelStatistics,
}

pub struct LoopbackTransport {
    name: &'static str,
    ports: Vec<LoopbackPort>,
    /// Remaining `init` calls that fail; `u32::MAX` never opens.
    init_failures: u32,
    init_calls: u32,
    bit_rate: Option<BitRate>,
    open: bool,
}

impl LoopbackTransport {
    /// One ring and one handle pool per port, sized by `config`.
    pub fn new(name: &'static str, config: ChannelConfig) -> Result<Self, ShimError> {
        let mut ports = Vec::new();
        ports
            .try_reserve_exact(MAX_PORTS)
            .map_err(|_| ShimError::AllocationFailure)?;
        for _ in 0..MAX_PORTS {
            ports.push(LoopbackPort {
                ring: FrameRing::try_new(config.rx_capacity)?,
                handles: HandleTable::try_new(config.handle_capacity, config.handle_tracking)?,
                stats: ChannelStatistics::default(),
            });
        }
        Ok(Self {
            name,
            ports,
            init_failures: 0,
            init_calls: 0,
            bit_rate: None,
            open: false,
        })
    }

    /// Fails the first `attempts` calls to `init`.
    pub fn with_init_failures(mut self, attempts: u32) -> Self {
        self.init_failures = attempts;
        self
    }

    /// Never opens.
    pub fn unavailable(self) -> Self {
        self.with_init_failures(u32::MAX)
    }

    pub fn init_calls(&self) -> u32 {
        self.init_calls
    }

    pub fn bit_rate(&self) -> Option<BitRate> {
        self.bit_rate
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    fn port(&mut self, port: Port) -> Result<&mut LoopbackPort, ShimError> {
        self.ports.get_mut(port as usize).ok_or(ShimError::InvalidPort)
    }
}

impl Transport for LoopbackTransport {
    fn name(&self) -> &'static str {
        self.name
    }

    fn init(&mut self, bit_rate: BitRate) -> bool {
        self.init_calls = self.init_calls.saturating_add(1);
        if self.init_failures > 0 {
            if self.init_failures != u32::MAX {
                self.init_failures -= 1;
            }
            return false;
        }
        for port in &mut self.ports {
            port.ring.clear();
            port.stats.clear();
        }
        self.bit_rate = Some(bit_rate);
        self.open = true;
        true
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn status(&mut self) -> BusStatus {
        if self.open {
            BusStatus::Ok
        } else {
            BusStatus::BusOff
        }
    }

    fn receive(&mut self, port: Port) -> Result<ReceiveOutcome, ShimError> {
        let port = self.port(port)?;
        Ok(match port.ring.extract() {
            Ok((frame, _)) => {
                port.stats.rx_ext_frames = port.stats.rx_ext_frames.wrapping_add(1);
                ReceiveOutcome::NewData(frame)
            }
            Err(_) => ReceiveOutcome::NoData,
        })
    }

    fn send(&mut self, port: Port, frame: &CanFrame) -> Result<MessageHandle, ShimError> {
        let open = self.open;
        let port = self.port(port)?;
        if !open {
            return Err(ShimError::MessageNotHandled);
        }
        let handle = port.handles.allocate()?;
        if port.ring.insert(*frame).is_err() {
            port.stats.tx_dropped = port.stats.tx_dropped.wrapping_add(1);
            port.handles.release(handle)?;
            return Err(ShimError::MessageNotHandled);
        }
        port.handles.mark_transmitted(handle)?;
        port.stats.tx_ext_frames = port.stats.tx_ext_frames.wrapping_add(1);
        Ok(handle)
    }

    fn statistics(&self, port: Port) -> Result<ChannelStatistics, ShimError> {
        self.ports
            .get(port as usize)
            .map(|port| port.stats)
            .ok_or(ShimError::InvalidPort)
    }

    fn clear_statistics(&mut self, port: Port) -> Result<(), ShimError> {
        self.port(port)?.stats.clear();
        Ok(())
    }

    fn handle_status(&mut self, port: Port, handle: MessageHandle) -> Result<(u16, HandleStatus), ShimError> {
        self.port(port)?.handles.status(handle)
    }

    fn release_handle(&mut self, port: Port, handle: MessageHandle) -> Result<(), ShimError> {
        self.port(port)?.handles.release(handle)
    }
}
