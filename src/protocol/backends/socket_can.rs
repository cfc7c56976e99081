//! Linux SocketCAN backend.
//!
//! The interface must already be up at the wanted bit rate (`ip link set`);
//! the bit rate passed to `init` is only logged.
use std::io::ErrorKind;

use embedded_can::{ExtendedId, Id};
use socketcan::{CanDataFrame, CanFrame as RawFrame, CanSocket, EmbeddedFrame, Socket};
use tracing::{debug, info, warn};

use crate::config::{SendFailurePolicy, SocketCanConfig};
use crate::core::{BitRate, BusStatus, Port, ReceiveOutcome, MAX_PORTS};
use crate::error::ShimError;
use crate::infra::buffer::handles::MessageHandle;
use crate::protocol::bridge::ChannelStatistics;
use crate::protocol::registry::Transport;
use crate::protocol::transport::can_frame::CanFrame;
use crate::protocol::transport::can_id::CanId;

pub struct SocketCanTransport {
    config: SocketCanConfig,
    socket: Option<CanSocket>,
    stats: ChannelStatistics,
    failing: bool,
}

impl SocketCanTransport {
    pub fn new(config: SocketCanConfig) -> Self {
        Self {
            config,
            socket: None,
            stats: ChannelStatistics::default(),
            failing: false,
        }
    }

    fn check_port(port: Port) -> Result<(), ShimError> {
        if (port as usize) < MAX_PORTS {
            Ok(())
        } else {
            Err(ShimError::InvalidPort)
        }
    }

    /// Identifier as seen through the configured DataPage width.
    fn map_id(&self, raw: u32) -> CanId {
        let width = self.config.data_page_width;
        CanId::from_fields(&CanId(raw).fields(width), width)
    }

    fn to_raw(&self, frame: &CanFrame) -> Option<CanDataFrame> {
        let id = ExtendedId::new(self.map_id(frame.id.0).0)?;
        CanDataFrame::new(id, frame.payload())
    }

    fn from_raw(&self, frame: RawFrame) -> Option<CanFrame> {
        match frame {
            RawFrame::Data(data) => match data.id() {
                Id::Extended(id) => Some(CanFrame::new(self.map_id(id.as_raw()), data.data())),
                Id::Standard(_) => None,
            },
            RawFrame::Remote(_) | RawFrame::Error(_) => None,
        }
    }

    fn send_failed(&mut self) -> Result<MessageHandle, ShimError> {
        self.stats.tx_dropped = self.stats.tx_dropped.wrapping_add(1);
        match self.config.send_failure {
            SendFailurePolicy::Report => Err(ShimError::MessageNotHandled),
            SendFailurePolicy::ReportSuccess => {
                if !self.failing {
                    warn!(interface = %self.config.interface, "socketcan send failing, frames are discarded");
                    self.failing = true;
                }
                Ok(MessageHandle::UNTRACKED)
            }
        }
    }
}

impl Transport for SocketCanTransport {
    fn name(&self) -> &'static str {
        "socketcan"
    }

    fn init(&mut self, bit_rate: BitRate) -> bool {
        self.socket = None;
        let socket = match CanSocket::open(&self.config.interface) {
            Ok(socket) => socket,
            Err(err) => {
                warn!(interface = %self.config.interface, "could not open raw CAN socket: {err}");
                return false;
            }
        };
        if let Err(err) = socket.set_nonblocking(true) {
            warn!(interface = %self.config.interface, "could not make CAN socket non-blocking: {err}");
            return false;
        }
        info!(interface = %self.config.interface, bps = bit_rate.bps(), "socketcan interface open");
        self.socket = Some(socket);
        self.stats.clear();
        self.failing = false;
        true
    }

    fn close(&mut self) {
        self.socket = None;
    }

    fn status(&mut self) -> BusStatus {
        BusStatus::Ok
    }

    fn receive(&mut self, port: Port) -> Result<ReceiveOutcome, ShimError> {
        Self::check_port(port)?;
        loop {
            let Some(socket) = self.socket.as_ref() else {
                return Ok(ReceiveOutcome::NoData);
            };
            let raw = match socket.read_frame() {
                Ok(raw) => raw,
                Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(ReceiveOutcome::NoData),
                Err(err) => {
                    debug!("socketcan read failed: {err}");
                    return Ok(ReceiveOutcome::NoData);
                }
            };
            if let Some(frame) = self.from_raw(raw) {
                self.stats.rx_ext_frames = self.stats.rx_ext_frames.wrapping_add(1);
                return Ok(ReceiveOutcome::NewData(frame));
            }
        }
    }

    fn send(&mut self, port: Port, frame: &CanFrame) -> Result<MessageHandle, ShimError> {
        Self::check_port(port)?;
        let Some(raw) = self.to_raw(frame) else {
            return Err(ShimError::MessageNotHandled);
        };
        let Some(socket) = self.socket.as_ref() else {
            return self.send_failed();
        };
        match socket.write_frame(&raw) {
            Ok(()) => {
                if self.failing {
                    info!(interface = %self.config.interface, "socketcan send working again");
                    self.failing = false;
                }
                self.stats.tx_ext_frames = self.stats.tx_ext_frames.wrapping_add(1);
                Ok(MessageHandle::UNTRACKED)
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => Err(ShimError::DriverBusy),
            Err(err) => {
                debug!("socketcan write failed: {err}");
                self.send_failed()
            }
        }
    }

    fn statistics(&self, port: Port) -> Result<ChannelStatistics, ShimError> {
        Self::check_port(port)?;
        Ok(self.stats)
    }

    fn clear_statistics(&mut self, port: Port) -> Result<(), ShimError> {
        Self::check_port(port)?;
        self.stats.clear();
        Ok(())
    }
}
