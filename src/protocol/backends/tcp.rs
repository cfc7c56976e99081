//! Virtual CAN bus over a TCP connection to a relay.
//!
//! Same 16-byte records as the UDP backend, reassembled from the stream.
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use heapless::Vec;
use tracing::{debug, info, warn};

use super::datagram::{self, DATAGRAM_LEN};
use crate::config::{SendFailurePolicy, TcpConfig};
use crate::core::{BitRate, BusStatus, Port, ReceiveOutcome, MAX_PORTS};
use crate::error::ShimError;
use crate::infra::buffer::handles::MessageHandle;
use crate::protocol::bridge::ChannelStatistics;
use crate::protocol::registry::Transport;
use crate::protocol::transport::can_frame::CanFrame;

pub struct TcpTransport {
    config: TcpConfig,
    stream: Option<TcpStream>,
    /// Partial record carried over between polls.
    pending: Vec<u8, DATAGRAM_LEN>,
    last_sent_sa: Option<u8>,
    stats: ChannelStatistics,
    failing: bool,
}

impl TcpTransport {
    pub fn new(config: TcpConfig) -> Self {
        Self {
            config,
            stream: None,
            pending: Vec::new(),
            last_sent_sa: None,
            stats: ChannelStatistics::default(),
            failing: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn connect(&self) -> std::io::Result<TcpStream> {
        let timeout = Duration::from_millis(self.config.connect_timeout_ms.max(1));
        let stream = TcpStream::connect_timeout(&self.config.peer, timeout)?;
        stream.set_nodelay(true)?;
        stream.set_nonblocking(true)?;
        Ok(stream)
    }

    fn check_port(port: Port) -> Result<(), ShimError> {
        if (port as usize) < MAX_PORTS {
            Ok(())
        } else {
            Err(ShimError::InvalidPort)
        }
    }

    fn drop_stream(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        self.pending.clear();
    }

    fn send_failed(&mut self) -> Result<MessageHandle, ShimError> {
        self.stats.tx_dropped = self.stats.tx_dropped.wrapping_add(1);
        match self.config.send_failure {
            SendFailurePolicy::Report => Err(ShimError::MessageNotHandled),
            SendFailurePolicy::ReportSuccess => {
                if !self.failing {
                    warn!("tcp virtual CAN bus send failing, frames are discarded");
                    self.failing = true;
                }
                Ok(MessageHandle::UNTRACKED)
            }
        }
    }

    /// Completes the pending record from the stream. `Ok(true)` once 16
    /// bytes are buffered.
    fn fill_pending(&mut self) -> std::io::Result<bool> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(false);
        };
        let mut chunk = [0u8; DATAGRAM_LEN];
        while !self.pending.is_full() {
            let missing = DATAGRAM_LEN - self.pending.len();
            match stream.read(&mut chunk[..missing]) {
                Ok(0) => return Err(ErrorKind::UnexpectedEof.into()),
                Ok(read) => {
                    // Never exceeds capacity: at most `missing` bytes were read.
                    let _ = self.pending.extend_from_slice(&chunk[..read]);
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(false),
                Err(err) => return Err(err),
            }
        }
        Ok(true)
    }
}

impl Transport for TcpTransport {
    fn name(&self) -> &'static str {
        "tcp"
    }

    fn init(&mut self, _bit_rate: BitRate) -> bool {
        self.close();
        match self.connect() {
            Ok(stream) => {
                info!(peer = %self.config.peer, "tcp virtual CAN bus connected");
                self.stream = Some(stream);
                self.stats.clear();
                true
            }
            Err(err) => {
                warn!(peer = %self.config.peer, "tcp virtual CAN bus connect failed: {err}");
                false
            }
        }
    }

    fn close(&mut self) {
        self.drop_stream();
        self.last_sent_sa = None;
        self.failing = false;
    }

    fn status(&mut self) -> BusStatus {
        BusStatus::Ok
    }

    fn receive(&mut self, port: Port) -> Result<ReceiveOutcome, ShimError> {
        Self::check_port(port)?;
        loop {
            match self.fill_pending() {
                Ok(true) => {}
                Ok(false) => return Ok(ReceiveOutcome::NoData),
                Err(err) => {
                    warn!("tcp virtual CAN bus lost: {err}");
                    self.drop_stream();
                    return Ok(ReceiveOutcome::NoData);
                }
            }

            let decoded = datagram::decode(&self.pending);
            let echo = self.last_sent_sa.is_some()
                && datagram::source_address(&self.pending) == self.last_sent_sa;
            self.pending.clear();

            match decoded {
                Ok(_) if echo => continue,
                Ok(frame) => {
                    self.stats.rx_ext_frames = self.stats.rx_ext_frames.wrapping_add(1);
                    return Ok(ReceiveOutcome::NewData(frame));
                }
                Err(err) => {
                    debug!("dropping virtual CAN record: {err}");
                    self.stats.rx_dropped = self.stats.rx_dropped.wrapping_add(1);
                }
            }
        }
    }

    fn send(&mut self, port: Port, frame: &CanFrame) -> Result<MessageHandle, ShimError> {
        Self::check_port(port)?;
        let Some(stream) = self.stream.as_mut() else {
            return self.send_failed();
        };

        let record = datagram::encode(frame);
        self.last_sent_sa = Some(frame.id.source_address());
        match stream.write_all(&record) {
            Ok(()) => {
                if self.failing {
                    info!("tcp virtual CAN bus send working again");
                    self.failing = false;
                }
                self.stats.tx_ext_frames = self.stats.tx_ext_frames.wrapping_add(1);
                Ok(MessageHandle::UNTRACKED)
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => Err(ShimError::DriverBusy),
            Err(err) => {
                warn!("tcp send failed, connection shut down: {err}");
                self.drop_stream();
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
