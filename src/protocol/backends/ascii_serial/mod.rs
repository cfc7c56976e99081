//! USB-CAN adapter speaking the ASCII line protocol over a serial port.
//!
//! The serial device is reopened on every `init` through a [`PortOpener`], so
//! the same transport runs over a real tty (`serial` feature) or an in-memory
//! port in tests. The port is expected to be non-blocking: reads returning
//! `WouldBlock`, `TimedOut` or zero bytes all mean "nothing yet".
use std::io::{ErrorKind, Read, Write};
use std::thread;
use std::time::Duration;

use heapless::{Deque, Vec};
use tracing::{debug, info, trace, warn};

use crate::config::AsciiSerialConfig;
use crate::core::{BitRate, BusStatus, Port, ReceiveOutcome, MAX_PORTS};
use crate::error::ShimError;
use crate::infra::buffer::handles::MessageHandle;
use crate::protocol::bridge::ChannelStatistics;
use crate::protocol::registry::Transport;
use crate::protocol::transport::can_frame::CanFrame;

pub mod codec;

use codec::{AdapterCommand, AdapterLine, AdapterStatus, BELL, CR, MAX_LINE_LENGTH};

/// Decoded frames waiting for `receive`.
const FRAME_BACKLOG: usize = 32;

//==================================================================================PORT_OPENER
/// Opens the serial device.
pub trait PortOpener {
    type Port: Read + Write;

    fn open(&mut self, device: &str, baud: u32) -> std::io::Result<Self::Port>;
}

impl<F, P> PortOpener for F
where
    F: FnMut(&str, u32) -> std::io::Result<P>,
    P: Read + Write,
{
    type Port = P;

    fn open(&mut self, device: &str, baud: u32) -> std::io::Result<P> {
        self(device, baud)
    }
}

/// Opens a tty through `tokio-serial` with a zero read timeout.
#[cfg(feature = "serial")]
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialPortOpener;

#[cfg(feature = "serial")]
impl PortOpener for SerialPortOpener {
    type Port = Box<dyn tokio_serial::SerialPort>;

    fn open(&mut self, device: &str, baud: u32) -> std::io::Result<Self::Port> {
        let port = tokio_serial::new(device, baud)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(Duration::ZERO)
            .open()?;
        port.clear(tokio_serial::ClearBuffer::Input)?;
        Ok(port)
    }
}

//==================================================================================LINE_ASSEMBLER
/// Accumulates bytes until CR or BELL.
#[derive(Debug, Default)]
struct LineAssembler {
    line: Vec<u8, MAX_LINE_LENGTH>,
    overflow: bool,
}

impl LineAssembler {
    /// Returns the completed line and its terminator. Overlong lines are
    /// discarded whole.
    fn push(&mut self, byte: u8) -> Option<(Vec<u8, MAX_LINE_LENGTH>, u8)> {
        if byte == CR || byte == BELL {
            let line = core::mem::take(&mut self.line);
            let overflow = core::mem::replace(&mut self.overflow, false);
            if overflow {
                warn!("adapter line too long, dropped");
                return None;
            }
            return Some((line, byte));
        }
        if self.line.push(byte).is_err() {
            self.overflow = true;
        }
        None
    }

    fn clear(&mut self) {
        self.line.clear();
        self.overflow = false;
    }
}

//==================================================================================TRANSPORT
pub struct AsciiSerialTransport<O: PortOpener> {
    config: AsciiSerialConfig,
    opener: O,
    port: Option<O::Port>,
    assembler: LineAssembler,
    frames: Deque<CanFrame, FRAME_BACKLOG>,
    bus_status: BusStatus,
    version_seen: bool,
    status_calls: u32,
    stats: ChannelStatistics,
}

impl<O: PortOpener> AsciiSerialTransport<O> {
    pub fn new(config: AsciiSerialConfig, opener: O) -> Self {
        Self {
            config,
            opener,
            port: None,
            assembler: LineAssembler::default(),
            frames: Deque::new(),
            bus_status: BusStatus::Ok,
            version_seen: false,
            status_calls: 0,
            stats: ChannelStatistics::default(),
        }
    }

    /// The open serial port, if any.
    pub fn port_mut(&mut self) -> Option<&mut O::Port> {
        self.port.as_mut()
    }

    fn check_port(port: Port) -> Result<(), ShimError> {
        if (port as usize) < MAX_PORTS {
            Ok(())
        } else {
            Err(ShimError::InvalidPort)
        }
    }

    fn write(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        match self.port.as_mut() {
            Some(port) => {
                port.write_all(bytes)?;
                port.flush()
            }
            None => Err(ErrorKind::NotConnected.into()),
        }
    }

    /// Reads whatever the adapter sent and dispatches complete lines.
    fn pump_input(&mut self) {
        let mut chunk = [0u8; 64];
        loop {
            let Some(port) = self.port.as_mut() else {
                return;
            };
            let read = match port.read(&mut chunk) {
                Ok(0) => return,
                Ok(read) => read,
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => return,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    warn!("adapter read failed: {err}");
                    return;
                }
            };
            for &byte in &chunk[..read] {
                if let Some((line, terminator)) = self.assembler.push(byte) {
                    self.dispatch(&line, terminator);
                }
            }
        }
    }

    fn dispatch(&mut self, line: &[u8], terminator: u8) {
        match codec::parse_line(line, terminator, self.config.data_page_width, self.config.status_radix) {
            Ok(AdapterLine::Frame(frame)) => {
                if self.frames.push_back(frame).is_err() {
                    self.stats.rx_dropped = self.stats.rx_dropped.wrapping_add(1);
                }
            }
            Ok(AdapterLine::Status(status)) => {
                if status.contains(AdapterStatus::BUS_ERROR) {
                    self.stats.rx_err_count = self.stats.rx_err_count.wrapping_add(1);
                }
                let bus_status = status.bus_status();
                if bus_status == BusStatus::BusOff && self.bus_status != BusStatus::BusOff {
                    self.stats.bus_off_count = self.stats.bus_off_count.wrapping_add(1);
                }
                if !status.is_empty() {
                    debug!(?status, "adapter status");
                }
                self.bus_status = bus_status;
            }
            Ok(AdapterLine::Version) => self.version_seen = true,
            Ok(AdapterLine::Ack) => trace!("adapter ack"),
            Ok(AdapterLine::Error) => {
                warn!("adapter transmit error");
                self.stats.tx_err_count = self.stats.tx_err_count.wrapping_add(1);
            }
            Err(err) => {
                warn!("unexpected adapter line: {err}");
                if line.first() == Some(&u8::from(AdapterCommand::TransmitExtended)) {
                    self.stats.rx_dropped = self.stats.rx_dropped.wrapping_add(1);
                }
            }
        }
    }

    fn handshake(&mut self, bit_rate: BitRate) -> std::io::Result<bool> {
        self.write(b"\r\r\r")?;
        self.write(&codec::command(AdapterCommand::Timestamp, Some(b'0')))?;
        self.write(&codec::command(AdapterCommand::Version, None))?;

        self.version_seen = false;
        for _ in 0..self.config.version_tries {
            self.pump_input();
            if self.version_seen {
                break;
            }
            thread::sleep(Duration::from_millis(self.config.version_try_ms));
        }
        if !self.version_seen {
            warn!(device = %self.config.device, "no version string from adapter");
            return Ok(false);
        }

        self.write(&codec::command(AdapterCommand::Close, None))?;
        thread::sleep(Duration::from_millis(self.config.version_try_ms));
        self.write(&codec::command(AdapterCommand::Speed, Some(bit_rate.ascii_code())))?;
        self.write(&codec::command(AdapterCommand::Open, None))?;
        Ok(true)
    }
}

impl<O: PortOpener> Transport for AsciiSerialTransport<O> {
    fn name(&self) -> &'static str {
        "ascii-serial"
    }

    fn init(&mut self, bit_rate: BitRate) -> bool {
        self.port = None;
        self.assembler.clear();
        self.frames.clear();
        self.bus_status = BusStatus::Ok;
        self.status_calls = 0;
        self.stats.clear();

        match self.opener.open(&self.config.device, self.config.baud) {
            Ok(port) => self.port = Some(port),
            Err(err) => {
                warn!(device = %self.config.device, "could not open adapter: {err}");
                return false;
            }
        }
        match self.handshake(bit_rate) {
            Ok(true) => {
                info!(device = %self.config.device, bps = bit_rate.bps(), "ascii CAN adapter open");
                true
            }
            Ok(false) => {
                self.port = None;
                false
            }
            Err(err) => {
                warn!(device = %self.config.device, "adapter handshake failed: {err}");
                self.port = None;
                false
            }
        }
    }

    fn close(&mut self) {
        if let Err(err) = self.write(&codec::command(AdapterCommand::Close, None)) {
            debug!("adapter close command failed: {err}");
        }
        self.port = None;
    }

    /// Queries the adapter flags once every `status_skips` calls and returns
    /// the last decoded status.
    fn status(&mut self) -> BusStatus {
        self.status_calls += 1;
        if self.status_calls >= self.config.status_skips.max(1) {
            self.status_calls = 0;
            if self.write(&codec::command(AdapterCommand::Status, None)).is_err() {
                return BusStatus::BusOff;
            }
        }
        self.pump_input();
        self.bus_status
    }

    fn receive(&mut self, port: Port) -> Result<ReceiveOutcome, ShimError> {
        Self::check_port(port)?;
        if self.frames.is_empty() {
            self.pump_input();
        }
        Ok(match self.frames.pop_front() {
            Some(frame) => {
                self.stats.rx_ext_frames = self.stats.rx_ext_frames.wrapping_add(1);
                ReceiveOutcome::NewData(frame)
            }
            None => ReceiveOutcome::NoData,
        })
    }

    fn send(&mut self, port: Port, frame: &CanFrame) -> Result<MessageHandle, ShimError> {
        Self::check_port(port)?;
        let line = codec::encode_frame(frame, self.config.data_page_width);
        match self.write(&line) {
            Ok(()) => {
                self.stats.tx_ext_frames = self.stats.tx_ext_frames.wrapping_add(1);
                Ok(MessageHandle::UNTRACKED)
            }
            Err(err) => {
                warn!("writing frame to adapter failed: {err}");
                self.stats.tx_dropped = self.stats.tx_dropped.wrapping_add(1);
                Err(ShimError::MessageNotHandled)
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
