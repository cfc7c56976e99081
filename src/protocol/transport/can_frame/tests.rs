use super::*;
use embedded_can::StandardId;

#[test]
fn test_payload_is_clamped() {
    let frame = CanFrame::new(CanId(0x0CEF_0110), &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
    assert_eq!(frame.len, 8);
    assert_eq!(frame.payload(), &[1, 2, 3, 4, 5, 6, 7, 8]);
}

#[test]
fn test_embedded_can_interop() {
    let ext = ExtendedId::new(0x0CEF_0110).expect("valid extended id");
    let frame = <CanFrame as Frame>::new(ext, &[0xAA, 0xBB]).expect("extended frame");
    assert!(frame.is_extended());
    assert_eq!(frame.dlc(), 2);
    assert_eq!(Frame::data(&frame), &[0xAA, 0xBB]);
    assert_eq!(Frame::id(&frame), Id::Extended(ext));

    // Standard identifiers and oversize payloads are rejected.
    let std_id = StandardId::new(0x123).expect("valid standard id");
    assert!(<CanFrame as Frame>::new(std_id, &[]).is_none());
    assert!(<CanFrame as Frame>::new(ext, &[0; 9]).is_none());
    assert!(<CanFrame as Frame>::new_remote(ext, 0).is_none());
}
