//! Encoding and decoding of the 29-bit extended identifiers used by
//! J1939 / NMEA 2000 (Priority, DataPage, PDU Format, PDU Specific, Source
//! Address).
//!
//! The bit layout lives behind [`IdCodec`]: alternate hardware register layouts
//! are additional codec implementations rather than bit-twiddling at call sites.
use crate::config::DataPageWidth;

//==================================================================================FIELDS
/// Structured view of an extended identifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IdFields {
    /// 3 bits, 0 (highest) to 7.
    pub priority: u8,
    /// 1 or 2 bits, see [`DataPageWidth`].
    pub data_page: u8,
    /// PDU Format.
    pub pf: u8,
    /// PDU Specific: destination address (PF < 240) or group extension.
    pub ps: u8,
    /// Source address.
    pub sa: u8,
}

//==================================================================================CAN_ID
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Encapsulates an extended CAN identifier (29 bits) and exposes accessors
/// for priority, PGN, destination, and source.
pub struct CanId(pub u32);

impl CanId {
    /// Mask of the 29 identifier bits.
    pub const MASK: u32 = 0x1FFF_FFFF;

    /// Builds the identifier from its fields with the given DataPage width.
    pub fn from_fields(fields: &IdFields, width: DataPageWidth) -> Self {
        CanId(J1939Codec::new(width).encode(fields))
    }

    /// Splits the identifier into its fields with the given DataPage width.
    pub fn fields(&self, width: DataPageWidth) -> IdFields {
        J1939Codec::new(width).decode(self.0)
    }

    /// Returns the priority (3 bits, value 0-7) encoded in the CAN ID.
    pub fn priority(&self) -> u8 {
        ((self.0 >> 26) & 0x07) as u8
    }

    /// Extracts the 18-bit PGN, handling the PDU1/PDU2 distinction.
    pub fn pgn(&self) -> u32 {
        let ps = (self.0 >> 8) & 0xFF;
        let pf = (self.0 >> 16) & 0xFF;
        let dp = (self.0 >> 24) & 0x03;

        if pf >= 240 {
            // PDU2: group extension is part of the PGN.
            (dp << 16) | (pf << 8) | ps
        } else {
            (dp << 16) | (pf << 8)
        }
    }

    /// Returns the destination address (PDU1) when the PGN carries one.
    pub fn destination(&self) -> Option<u8> {
        let pf = ((self.0 >> 16) & 0xFF) as u8;
        if pf >= 240 {
            None
        } else {
            Some(((self.0 >> 8) & 0xFF) as u8)
        }
    }

    /// Eight-bit source address.
    pub fn source_address(&self) -> u8 {
        (self.0 & 0xFF) as u8
    }
}

//==================================================================================CODECS
/// Pure bit manipulation between [`IdFields`] and a raw identifier layout.
///
/// No error path: any raw value decodes. Callers only encode in-range values;
/// out-of-range bits are masked off.
pub trait IdCodec {
    type Raw;
    fn encode(&self, fields: &IdFields) -> Self::Raw;
    fn decode(&self, raw: Self::Raw) -> IdFields;
}

/// `Priority<<26 | DataPage<<24 | PF<<16 | PS<<8 | SA` in a `u32`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct J1939Codec {
    width: DataPageWidth,
}

impl J1939Codec {
    pub const fn new(width: DataPageWidth) -> Self {
        Self { width }
    }
}

impl IdCodec for J1939Codec {
    type Raw = u32;

    fn encode(&self, fields: &IdFields) -> u32 {
        (((fields.priority & 0x07) as u32) << 26)
            | (((fields.data_page & self.width.mask()) as u32) << 24)
            | ((fields.pf as u32) << 16)
            | ((fields.ps as u32) << 8)
            | (fields.sa as u32)
    }

    fn decode(&self, raw: u32) -> IdFields {
        IdFields {
            priority: ((raw >> 26) & 0x07) as u8,
            data_page: ((raw >> 24) as u8) & self.width.mask(),
            pf: (raw >> 16) as u8,
            ps: (raw >> 8) as u8,
            sa: raw as u8,
        }
    }
}

/// Identifier register of controllers reserving flag bits next to the upper
/// identifier bits.
///
/// Byte 0 carries identifier bits 28..24 in its low five bits plus the flags:
/// IDE and SRR forced on, RTR forced off. Bytes 1..3 hold PF, PS and SA.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlaggedRegisterCodec {
    width: DataPageWidth,
}

impl FlaggedRegisterCodec {
    pub const IDE: u8 = 0x80;
    pub const SRR: u8 = 0x40;
    pub const RTR: u8 = 0x20;
    const ID_BITS: u8 = 0x1F;

    pub const fn new(width: DataPageWidth) -> Self {
        Self { width }
    }
}

impl IdCodec for FlaggedRegisterCodec {
    type Raw = [u8; 4];

    fn encode(&self, fields: &IdFields) -> [u8; 4] {
        let upper = ((fields.priority & 0x07) << 2) | (fields.data_page & self.width.mask());
        [
            (Self::IDE | Self::SRR | (upper & Self::ID_BITS)) & !Self::RTR,
            fields.pf,
            fields.ps,
            fields.sa,
        ]
    }

    fn decode(&self, raw: [u8; 4]) -> IdFields {
        let upper = raw[0] & Self::ID_BITS;
        IdFields {
            priority: (upper >> 2) & 0x07,
            data_page: upper & self.width.mask(),
            pf: raw[1],
            ps: raw[2],
            sa: raw[3],
        }
    }
}

//==================================================================================TESTS
#[cfg(test)]
#[path = "tests.rs"]
mod tests;
