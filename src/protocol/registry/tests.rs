//! Selection order, lazy activation and dispatch defaults.
use super::*;
use crate::config::ChannelConfig;
use crate::protocol::backends::loopback::LoopbackTransport;
use crate::protocol::transport::can_id::CanId;

fn loopback(name: &'static str) -> LoopbackTransport {
    LoopbackTransport::new(name, ChannelConfig::default()).expect("loopback must allocate")
}

fn frame() -> CanFrame {
    CanFrame::new(CanId(0x0CEF_0110), &[1, 2, 3])
}

#[test]
/// Failing backends are skipped; the first one that opens becomes active.
fn test_selection_order() {
    let mut first = loopback("first").unavailable();
    let mut second = loopback("second").unavailable();
    let mut third = loopback("third");
    {
        let mut list: [&mut dyn Transport; 3] = [&mut first, &mut second, &mut third];
        let mut registry = TransportRegistry::new(&mut list, BitRate::Kbps250);

        assert_eq!(registry.init(), Ok(2));
        assert_eq!(registry.active_name(), Some("third"));
        assert_eq!(registry.state(0), Some(TransportState::Closed));
        assert_eq!(registry.state(1), Some(TransportState::Closed));
        assert_eq!(registry.state(2), Some(TransportState::Active));

        // Already active: the list is not walked again.
        assert_eq!(registry.init(), Ok(2));
    }
    assert_eq!(first.init_calls(), 1);
    assert_eq!(second.init_calls(), 1);
    assert_eq!(third.init_calls(), 1);
    assert_eq!(third.bit_rate(), Some(BitRate::Kbps250));
}

#[test]
/// Close then init walks the list again from its head.
fn test_close_restarts_from_first() {
    let mut first = loopback("first").with_init_failures(1);
    let mut second = loopback("second").unavailable();
    let mut third = loopback("third");
    {
        let mut list: [&mut dyn Transport; 3] = [&mut first, &mut second, &mut third];
        let mut registry = TransportRegistry::new(&mut list, BitRate::Kbps250);

        assert_eq!(registry.init(), Ok(2));
        registry.close();
        assert_eq!(registry.active_index(), None);
        assert_eq!(registry.state(2), Some(TransportState::Closed));

        assert_eq!(registry.init(), Ok(0));
        assert_eq!(registry.active_name(), Some("first"));
    }
    assert_eq!(first.init_calls(), 2);
    assert_eq!(second.init_calls(), 1);
    assert!(!third.is_open());
}

#[test]
fn test_all_backends_fail() {
    let mut first = loopback("first").unavailable();
    let mut second = loopback("second").unavailable();
    let mut list: [&mut dyn Transport; 2] = [&mut first, &mut second];
    let mut registry = TransportRegistry::new(&mut list, BitRate::Kbps125);

    assert_eq!(registry.init(), Err(ShimError::PortInitError));
    assert_eq!(registry.active_name(), None);
    assert_eq!(registry.send(0, &frame()), Err(ShimError::MessageNotHandled));
    assert_eq!(registry.receive(0), Ok(ReceiveOutcome::NoData));
    assert_eq!(registry.status(), BusStatus::BusOff);
}

#[test]
/// The first dispatched call initialises a never-initialised registry.
fn test_lazy_init_on_first_use() {
    let mut only = loopback("only");
    let mut list: [&mut dyn Transport; 1] = [&mut only];
    let mut registry = TransportRegistry::new(&mut list, BitRate::Kbps250);
    assert_eq!(registry.state(0), Some(TransportState::Uninitialized));

    let handle = registry.send(0, &frame()).expect("loopback accepts");
    assert_eq!(registry.active_index(), Some(0));
    assert_eq!(registry.handle_status(0, handle), Ok((1, HandleStatus::TX_OK)));
    assert_eq!(registry.receive(0), Ok(ReceiveOutcome::NewData(frame())));
    assert_eq!(registry.status(), BusStatus::Ok);
    registry.release_handle(0, handle).expect("allocated handle");
}

#[test]
/// After an explicit close nothing is reopened behind the caller's back.
fn test_no_lazy_init_after_close() {
    let mut only = loopback("only");
    let mut list: [&mut dyn Transport; 1] = [&mut only];
    let mut registry = TransportRegistry::new(&mut list, BitRate::Kbps250);

    registry.init().expect("loopback opens");
    registry.close();
    assert_eq!(registry.send(0, &frame()), Err(ShimError::MessageNotHandled));
    assert_eq!(registry.receive(0), Ok(ReceiveOutcome::NoData));
    assert_eq!(registry.status(), BusStatus::BusOff);
    assert_eq!(registry.active_index(), None);
}

#[test]
fn test_statistics_dispatch() {
    let mut only = loopback("only");
    let mut list: [&mut dyn Transport; 1] = [&mut only];
    let mut registry = TransportRegistry::new(&mut list, BitRate::Kbps250);

    registry.send(1, &frame()).expect("loopback accepts");
    assert_eq!(registry.statistics(1).map(|s| s.tx_ext_frames), Ok(1));
    assert_eq!(registry.statistics(0).map(|s| s.tx_ext_frames), Ok(0));
    registry.clear_statistics(1).expect("valid port");
    assert_eq!(registry.statistics(1), Ok(ChannelStatistics::default()));
    assert_eq!(registry.statistics(9), Err(ShimError::InvalidPort));
}

#[test]
fn test_bit_rate_change_applies_to_next_init() {
    let mut only = loopback("only");
    {
        let mut list: [&mut dyn Transport; 1] = [&mut only];
        let mut registry = TransportRegistry::new(&mut list, BitRate::Kbps250);
        registry.init().expect("loopback opens");
        registry.close();
        registry.set_bit_rate(BitRate::Mbps1);
        registry.init().expect("loopback opens");
        assert_eq!(registry.bit_rate(), BitRate::Mbps1);
    }
    assert_eq!(only.bit_rate(), Some(BitRate::Mbps1));
}
