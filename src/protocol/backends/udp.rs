//! Virtual CAN bus over UDP broadcast.
//!
//! Every node binds the same well-known port with address reuse, so several
//! processes on one host share the segment. Records are the 16-byte
//! [`datagram`](super::datagram) layout. A node hears its own broadcasts and
//! drops them by comparing the source address with the last one it sent.
use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info, trace, warn};

use super::datagram::{self, DATAGRAM_LEN};
use crate::config::{SendFailurePolicy, UdpConfig};
use crate::core::{BitRate, BusStatus, Port, ReceiveOutcome, MAX_PORTS};
use crate::error::ShimError;
use crate::infra::buffer::handles::MessageHandle;
use crate::protocol::bridge::ChannelStatistics;
use crate::protocol::registry::Transport;
use crate::protocol::transport::can_frame::CanFrame;

pub struct UdpTransport {
    config: UdpConfig,
    listen: Option<UdpSocket>,
    transmit: Option<UdpSocket>,
    last_sent_sa: Option<u8>,
    stats: ChannelStatistics,
    /// A send failure was swallowed and not yet followed by a success.
    failing: bool,
}

impl UdpTransport {
    pub fn new(config: UdpConfig) -> Self {
        Self {
            config,
            listen: None,
            transmit: None,
            last_sent_sa: None,
            stats: ChannelStatistics::default(),
            failing: false,
        }
    }

    /// Bound address of the listen socket once open.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listen.as_ref().and_then(|socket| socket.local_addr().ok())
    }

    fn open_listen(bind: SocketAddr) -> std::io::Result<UdpSocket> {
        let socket = Socket::new(Domain::for_address(bind), Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.set_broadcast(true)?;
        socket.set_nonblocking(true)?;
        socket.bind(&bind.into())?;
        Ok(socket.into())
    }

    fn open_transmit() -> std::io::Result<UdpSocket> {
        let socket = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0))?;
        socket.set_broadcast(true)?;
        socket.set_nonblocking(true)?;
        Ok(socket)
    }

    fn check_port(port: Port) -> Result<(), ShimError> {
        if (port as usize) < MAX_PORTS {
            Ok(())
        } else {
            Err(ShimError::InvalidPort)
        }
    }

    fn send_failed(&mut self) -> Result<MessageHandle, ShimError> {
        self.stats.tx_dropped = self.stats.tx_dropped.wrapping_add(1);
        match self.config.send_failure {
            SendFailurePolicy::Report => Err(ShimError::MessageNotHandled),
            SendFailurePolicy::ReportSuccess => {
                if !self.failing {
                    warn!("virtual CAN bus send failing, frames are discarded");
                    self.failing = true;
                }
                Ok(MessageHandle::UNTRACKED)
            }
        }
    }
}

impl Transport for UdpTransport {
    fn name(&self) -> &'static str {
        "udp"
    }

    fn init(&mut self, _bit_rate: BitRate) -> bool {
        self.close();
        let listen = match Self::open_listen(self.config.bind) {
            Ok(socket) => socket,
            Err(err) => {
                warn!(bind = %self.config.bind, "udp listen socket failed: {err}");
                return false;
            }
        };
        let transmit = match Self::open_transmit() {
            Ok(socket) => socket,
            Err(err) => {
                warn!("udp transmit socket failed: {err}");
                return false;
            }
        };
        info!(bind = %self.config.bind, destination = %self.config.destination, "udp virtual CAN bus open");
        self.listen = Some(listen);
        self.transmit = Some(transmit);
        self.stats.clear();
        true
    }

    fn close(&mut self) {
        self.listen = None;
        self.transmit = None;
        self.last_sent_sa = None;
        self.failing = false;
    }

    fn status(&mut self) -> BusStatus {
        BusStatus::Ok
    }

    fn receive(&mut self, port: Port) -> Result<ReceiveOutcome, ShimError> {
        Self::check_port(port)?;
        let Some(socket) = self.listen.as_ref() else {
            return Ok(ReceiveOutcome::NoData);
        };

        // Oversized records must still be seen as oversized.
        let mut buffer = [0u8; DATAGRAM_LEN * 2];
        loop {
            let len = match socket.recv(&mut buffer) {
                Ok(len) => len,
                Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(ReceiveOutcome::NoData),
                Err(err) => {
                    debug!("udp receive failed: {err}");
                    return Ok(ReceiveOutcome::NoData);
                }
            };
            let record = &buffer[..len];
            if self.last_sent_sa.is_some() && datagram::source_address(record) == self.last_sent_sa {
                trace!("dropping own broadcast");
                continue;
            }
            match datagram::decode(record) {
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
        let Some(socket) = self.transmit.as_ref() else {
            return self.send_failed();
        };

        let record = datagram::encode(frame);
        self.last_sent_sa = Some(frame.id.source_address());
        match socket.send_to(&record, self.config.destination) {
            Ok(_) => {
                if self.failing {
                    info!("virtual CAN bus send working again");
                    self.failing = false;
                }
                self.stats.tx_ext_frames = self.stats.tx_ext_frames.wrapping_add(1);
                Ok(MessageHandle::UNTRACKED)
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => Err(ShimError::DriverBusy),
            Err(err) => {
                warn!("udp send failed, transmit socket shut down: {err}");
                self.transmit = None;
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
