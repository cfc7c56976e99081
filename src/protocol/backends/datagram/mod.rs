//! Virtual-bus record shared by the UDP and TCP backends.
//!
//! ```text
//! offset  0   1   2   3   4   5..13     13   14..16
//!         P   DP  PF  PS  SA  data[8]   len  checksum (u16, big endian)
//! ```
//!
//! The checksum is the wrapping sum of the first 14 bytes. Records whose
//! checksum, length or data length code do not match are rejected.
use crate::config::DataPageWidth;
use crate::error::DatagramError;
use crate::protocol::transport::can_frame::CanFrame;
use crate::protocol::transport::can_id::IdFields;

/// Size of one record on the wire.
pub const DATAGRAM_LEN: usize = 16;

/// Bytes covered by the checksum.
pub const PAYLOAD_LEN: usize = 14;

/// Offset of the source address, used for self-echo filtering.
pub const SA_OFFSET: usize = 4;

// The record has a whole byte for the data page, so both id bits survive.
const WIDTH: DataPageWidth = DataPageWidth::Two;

/// Wrapping 16-bit sum of `bytes`.
pub fn checksum(bytes: &[u8]) -> u16 {
    bytes
        .iter()
        .fold(0u16, |sum, &byte| sum.wrapping_add(u16::from(byte)))
}

pub fn encode(frame: &CanFrame) -> [u8; DATAGRAM_LEN] {
    let fields = frame.id.fields(WIDTH);
    let mut record = [0u8; DATAGRAM_LEN];
    record[0] = fields.priority;
    record[1] = fields.data_page;
    record[2] = fields.pf;
    record[3] = fields.ps;
    record[SA_OFFSET] = fields.sa;
    record[5..13].copy_from_slice(&frame.data);
    record[13] = frame.len.min(8) as u8;

    let sum = checksum(&record[..PAYLOAD_LEN]);
    record[PAYLOAD_LEN..].copy_from_slice(&sum.to_be_bytes());
    record
}

pub fn decode(record: &[u8]) -> Result<CanFrame, DatagramError> {
    if record.len() != DATAGRAM_LEN {
        return Err(DatagramError::WrongLength { len: record.len() });
    }
    let expected = checksum(&record[..PAYLOAD_LEN]);
    let found = u16::from_be_bytes([record[14], record[15]]);
    if expected != found {
        return Err(DatagramError::BadChecksum { expected, found });
    }
    let dlc = record[13];
    if dlc > 8 {
        return Err(DatagramError::BadLength { dlc });
    }

    let fields = IdFields {
        priority: record[0],
        data_page: record[1],
        pf: record[2],
        ps: record[3],
        sa: record[SA_OFFSET],
    };
    Ok(CanFrame::from_fields(&fields, WIDTH, &record[5..5 + dlc as usize]))
}

/// Source address carried by a raw record, if long enough.
pub fn source_address(record: &[u8]) -> Option<u8> {
    record.get(SA_OFFSET).copied()
}
