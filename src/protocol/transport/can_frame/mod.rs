//! In-memory representation of an SAE J1939 / NMEA 2000 CAN frame.
use embedded_can::{ExtendedId, Frame, Id};

use crate::config::DataPageWidth;
use crate::protocol::transport::can_id::{CanId, IdFields};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Raw extended frame as exchanged with controllers and backends.
pub struct CanFrame {
    /// Full 29-bit CAN identifier stored inside a `u32`.
    pub id: CanId,
    /// Payload buffer. Classic CAN frames always provide eight bytes.
    pub data: [u8; 8],
    /// Number of valid payload bytes (Data Length Code, 0 to 8).
    pub len: usize,
}

impl CanFrame {
    /// Copies at most eight bytes of `payload`; longer slices are truncated.
    pub fn new(id: CanId, payload: &[u8]) -> Self {
        let len = payload.len().min(8);
        let mut data = [0u8; 8];
        data[..len].copy_from_slice(&payload[..len]);
        Self {
            id: CanId(id.0 & CanId::MASK),
            data,
            len,
        }
    }

    /// Builds a frame from structured identifier fields.
    pub fn from_fields(fields: &IdFields, width: DataPageWidth, payload: &[u8]) -> Self {
        Self::new(CanId::from_fields(fields, width), payload)
    }

    /// Valid part of the payload.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len.min(8)]
    }
}

//==================================================================================EMBEDDED_CAN
// Only extended data frames exist on a J1939 segment.
impl Frame for CanFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        match id.into() {
            Id::Extended(ext) if data.len() <= 8 => Some(CanFrame::new(CanId(ext.as_raw()), data)),
            _ => None,
        }
    }

    fn new_remote(_id: impl Into<Id>, _dlc: usize) -> Option<Self> {
        None
    }

    fn is_extended(&self) -> bool {
        true
    }

    fn is_remote_frame(&self) -> bool {
        false
    }

    fn id(&self) -> Id {
        match ExtendedId::new(self.id.0 & CanId::MASK) {
            Some(ext) => Id::Extended(ext),
            None => Id::Extended(ExtendedId::ZERO),
        }
    }

    fn dlc(&self) -> usize {
        self.len
    }

    fn data(&self) -> &[u8] {
        self.payload()
    }
}

//==================================================================================TESTS
#[cfg(test)]
#[path = "tests.rs"]
mod tests;
