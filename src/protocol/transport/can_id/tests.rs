//! Unit tests for the `CanId` accessors and the identifier codecs.
use super::*;

//==================================================================================CAN_ID
#[test]
/// Extracts the source address from the raw ID.
fn test_source_address() {
    let can_id = CanId(0x19F8_05D1);
    assert_eq!(can_id.source_address(), 0xD1);
}

#[test]
/// Verifies extraction of the 3-bit priority field.
fn test_priority() {
    let can_id = CanId(0x19F8_05D1);
    assert_eq!(can_id.priority(), 0b110)
}

#[test]
/// Rebuilds the correct PGN (PDU1/PDU2 cases).
fn test_pgn_and_destination() {
    // PDU2 broadcast 129029
    let broadcast = CanId(0x0DF8_0523);
    assert_eq!(broadcast.pgn(), 129029);
    assert_eq!(broadcast.destination(), None);

    // PDU1 request 59904 to address 0x50
    let addressed = CanId(0x18EA_5023);
    assert_eq!(addressed.pgn(), 59904);
    assert_eq!(addressed.destination(), Some(0x50));
}

//==================================================================================J1939_CODEC
#[test]
/// Decode(Encode(f)) == f over the whole field domain (data page included).
fn test_j1939_round_trip() {
    let codec = J1939Codec::new(DataPageWidth::One);
    for priority in 0..=7u8 {
        for data_page in 0..=1u8 {
            for pf in (0..=255u8).step_by(17) {
                for ps in [0u8, 1, 0x7F, 0xFE, 0xFF] {
                    for sa in [0u8, 0x10, 0x80, 0xFF] {
                        let fields = IdFields { priority, data_page, pf, ps, sa };
                        let raw = codec.encode(&fields);
                        assert!(raw <= CanId::MASK);
                        assert_eq!(codec.decode(raw), fields);
                    }
                }
            }
        }
    }
}

#[test]
/// Field layout of a known identifier.
fn test_j1939_layout() {
    let fields = IdFields { priority: 3, data_page: 0, pf: 0xEF, ps: 0x01, sa: 0x10 };
    let id = CanId::from_fields(&fields, DataPageWidth::One);
    assert_eq!(id.0, 0x0CEF_0110);
    assert_eq!(id.fields(DataPageWidth::One), fields);
}

#[test]
/// The one-bit width drops bit 25, the two-bit width keeps it.
fn test_data_page_width_masking() {
    let raw = 0x0300_0000 | 0x00EE_FF01;
    let narrow = CanId(raw).fields(DataPageWidth::One);
    let wide = CanId(raw).fields(DataPageWidth::Two);
    assert_eq!(narrow.data_page, 1);
    assert_eq!(wide.data_page, 3);

    // Two-bit width is lossless over the 29 bits.
    assert_eq!(CanId::from_fields(&wide, DataPageWidth::Two).0, raw);

    // Out-of-range data page never leaks into the priority bits.
    let fields = IdFields { priority: 0, data_page: 0xFF, ..Default::default() };
    assert_eq!(CanId::from_fields(&fields, DataPageWidth::One).0, 0x0100_0000);
    assert_eq!(CanId::from_fields(&fields, DataPageWidth::Two).0, 0x0300_0000);
}

#[test]
/// The priority must be capped to 3 bits to avoid touching bit 29.
fn test_priority_masks_extra_bits() {
    let fields = IdFields { priority: 0b1111_0000, ..Default::default() };
    let id = CanId::from_fields(&fields, DataPageWidth::One);
    assert_eq!(id.0 & !CanId::MASK, 0, "bits above 28 must remain clear");
    assert_eq!(id.priority(), 0);
}

//==================================================================================REGISTER_CODEC
#[test]
/// IDE and SRR set, RTR cleared, whatever the field values.
fn test_register_flags_forced() {
    let codec = FlaggedRegisterCodec::new(DataPageWidth::One);
    let raw = codec.encode(&IdFields { priority: 7, data_page: 1, pf: 0xFF, ps: 0xFF, sa: 0xFF });
    assert_eq!(raw[0] & FlaggedRegisterCodec::IDE, FlaggedRegisterCodec::IDE);
    assert_eq!(raw[0] & FlaggedRegisterCodec::SRR, FlaggedRegisterCodec::SRR);
    assert_eq!(raw[0] & FlaggedRegisterCodec::RTR, 0);
    assert_eq!(raw[0] & 0x1F, 0b111_01);
}

#[test]
/// Register layout decodes back, ignoring a stray RTR bit.
fn test_register_round_trip() {
    let codec = FlaggedRegisterCodec::new(DataPageWidth::One);
    let fields = IdFields { priority: 3, data_page: 1, pf: 0xEF, ps: 0x01, sa: 0x10 };
    let mut raw = codec.encode(&fields);
    assert_eq!(codec.decode(raw), fields);

    raw[0] |= FlaggedRegisterCodec::RTR;
    assert_eq!(codec.decode(raw), fields);

    // Both codecs agree on the upper identifier byte.
    let id = J1939Codec::new(DataPageWidth::One).encode(&fields);
    assert_eq!((id >> 24) as u8, raw[0] & 0x1F);
}
