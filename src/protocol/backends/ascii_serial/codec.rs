//! Line codec of ASCII (Lawicel-style) USB-CAN adapters.
//!
//! Extended frames travel as `T` + 8 hex identifier digits + 1 length digit +
//! 2 hex digits per data byte, terminated by CR. The adapter answers commands
//! with CR (ok) or BELL (error) and reports its status flags on `F` as a
//! two-digit code (decimal unless configured otherwise).
use bitflags::bitflags;
use heapless::Vec;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::config::{DataPageWidth, StatusRadix};
use crate::core::BusStatus;
use crate::error::AsciiParseError;
use crate::protocol::transport::can_frame::CanFrame;
use crate::protocol::transport::can_id::CanId;

/// Longest line exchanged with the adapter (`T` + 8 + 1 + 16 + CR).
pub const MAX_LINE_LENGTH: usize = 27;

/// `T` + 8 identifier digits + length digit.
pub const FRAME_MIN_LENGTH: usize = 10;

pub const CR: u8 = b'\r';
pub const BELL: u8 = 0x07;

/// Leading byte of adapter commands and replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[num_enum(error_type(name = AsciiParseError, constructor = AsciiParseError::UnknownCommand))]
#[repr(u8)]
pub enum AdapterCommand {
    TransmitExtended = b'T',
    Status = b'F',
    Version = b'V',
    Open = b'O',
    Close = b'C',
    Speed = b'S',
    /// Timestamp switch when sent, transmit acknowledge when received.
    Timestamp = b'Z',
    ExtendedAck = b'z',
}

bitflags! {
    /// Flags reported by the `F` command.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AdapterStatus: u8 {
        const RXQ_FULL = 0x01;
        const TXQ_FULL = 0x02;
        const ERR_WARNING = 0x04;
        const OVERRUN = 0x08;
        const ERR_PASSIVE = 0x20;
        const BUSOFF = 0x40;
        const BUS_ERROR = 0x80;
    }
}

impl AdapterStatus {
    pub fn bus_status(self) -> BusStatus {
        if self.contains(AdapterStatus::BUSOFF) {
            BusStatus::BusOff
        } else if self.intersects(
            AdapterStatus::ERR_WARNING | AdapterStatus::OVERRUN | AdapterStatus::ERR_PASSIVE,
        ) {
            BusStatus::Warning
        } else {
            BusStatus::Ok
        }
    }
}

/// One decoded line coming from the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterLine {
    Frame(CanFrame),
    Status(AdapterStatus),
    Version,
    /// Bare CR or transmit acknowledge.
    Ack,
    /// BELL: the adapter refused the previous command.
    Error,
}

//==================================================================================ENCODING
pub fn to_hex_digit(value: u32) -> u8 {
    const HEX_LUT: &[u8] = b"0123456789ABCDEF";

    HEX_LUT[(value & 0xF) as usize]
}

/// `T iiiiiiii l dd.. CR`. The identifier goes through `width` first, so a
/// one-bit DataPage never emits bit 25.
pub fn encode_frame(frame: &CanFrame, width: DataPageWidth) -> Vec<u8, MAX_LINE_LENGTH> {
    let raw = CanId::from_fields(&frame.id.fields(width), width).0;
    let payload = frame.payload();

    let mut line = Vec::new();
    // Capacity covers the longest frame line.
    let _ = line.push(u8::from(AdapterCommand::TransmitExtended));
    for shift in (0..8).rev() {
        let _ = line.push(to_hex_digit(raw >> (shift * 4)));
    }
    let _ = line.push(to_hex_digit(payload.len() as u32));
    for byte in payload {
        let _ = line.push(to_hex_digit(u32::from(byte >> 4)));
        let _ = line.push(to_hex_digit(u32::from(*byte)));
    }
    let _ = line.push(CR);
    line
}

/// Two-byte command such as `F\r`, or `S<code>\r` with an argument.
pub fn command(kind: AdapterCommand, argument: Option<u8>) -> Vec<u8, 3> {
    let mut line = Vec::new();
    let _ = line.push(u8::from(kind));
    if let Some(argument) = argument {
        let _ = line.push(argument);
    }
    let _ = line.push(CR);
    line
}

//==================================================================================DECODING
pub fn hex_digit_to_u8(byte: u8) -> Result<u8, AsciiParseError> {
    Ok(match byte {
        b'0'..=b'9' => byte - b'0',
        b'a'..=b'f' => byte - b'a' + 10,
        b'A'..=b'F' => byte - b'A' + 10,
        _ => return Err(AsciiParseError::IllegalHexDigit(byte)),
    })
}

pub fn u8_from_hex_nibbles(hex_nibbles: &[u8]) -> Result<u8, AsciiParseError> {
    match hex_nibbles {
        [msn, lsn] => Ok((hex_digit_to_u8(*msn)? << 4) | hex_digit_to_u8(*lsn)?),
        _ => Err(AsciiParseError::BadLength),
    }
}

/// Parses a `T` line without its terminator.
pub fn decode_frame(line: &[u8], width: DataPageWidth) -> Result<CanFrame, AsciiParseError> {
    if line.len() < FRAME_MIN_LENGTH {
        return Err(AsciiParseError::TooShort { len: line.len() });
    }
    let dlc = match line[FRAME_MIN_LENGTH - 1] {
        digit @ b'0'..=b'8' => (digit - b'0') as usize,
        _ => return Err(AsciiParseError::BadLength),
    };
    if line.len() < FRAME_MIN_LENGTH + 2 * dlc {
        return Err(AsciiParseError::BadLength);
    }

    let mut raw = 0u32;
    for nibble in &line[1..FRAME_MIN_LENGTH - 1] {
        raw = (raw << 4) | u32::from(hex_digit_to_u8(*nibble)?);
    }
    let mut data = [0u8; 8];
    for (index, pair) in line[FRAME_MIN_LENGTH..FRAME_MIN_LENGTH + 2 * dlc]
        .chunks(2)
        .enumerate()
    {
        data[index] = u8_from_hex_nibbles(pair)?;
    }

    let id = CanId::from_fields(&CanId(raw).fields(width), width);
    Ok(CanFrame::new(id, &data[..dlc]))
}

/// Parses an `F` line: two digits of [`AdapterStatus`] flags in `radix`.
///
/// In decimal a non-digit counts as zero in its place.
pub fn decode_status(line: &[u8], radix: StatusRadix) -> Result<AdapterStatus, AsciiParseError> {
    let Some(digits) = line.get(1..3) else {
        return Err(AsciiParseError::TooShort { len: line.len() });
    };
    let code = match radix {
        StatusRadix::Decimal => digits.iter().fold(0u8, |code, digit| {
            let value = if digit.is_ascii_digit() { digit - b'0' } else { 0 };
            code * 10 + value
        }),
        StatusRadix::Hex => u8_from_hex_nibbles(digits)?,
    };
    Ok(AdapterStatus::from_bits_retain(code))
}

/// Classifies one complete line. `terminator` is the CR or BELL that ended it.
pub fn parse_line(
    line: &[u8],
    terminator: u8,
    width: DataPageWidth,
    radix: StatusRadix,
) -> Result<AdapterLine, AsciiParseError> {
    if terminator == BELL {
        return Ok(AdapterLine::Error);
    }
    let Some(&first) = line.first() else {
        return Ok(AdapterLine::Ack);
    };
    match AdapterCommand::try_from(first)? {
        AdapterCommand::TransmitExtended => decode_frame(line, width).map(AdapterLine::Frame),
        AdapterCommand::Status => decode_status(line, radix).map(AdapterLine::Status),
        AdapterCommand::Version => Ok(AdapterLine::Version),
        AdapterCommand::Timestamp | AdapterCommand::ExtendedAck => Ok(AdapterLine::Ack),
        other => Err(AsciiParseError::UnknownCommand(other.into())),
    }
}
