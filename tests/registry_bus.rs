//! Async `CanBus` view of the registry, driven by the tokio timer.
mod helpers;

use helpers::{j1939_frame, MockCanBus, MockTimer};
use korri_canshim::{
    config::ChannelConfig,
    core::BitRate,
    error::ShimError,
    protocol::{
        backends::loopback::LoopbackTransport,
        registry::{recv_within, RegistryBus, Transport, TransportRegistry},
        transport::traits::{can_bus::CanBus, korri_timer::EmbassyTimer},
    },
};

fn loopback() -> LoopbackTransport {
    LoopbackTransport::new("loopback", ChannelConfig::default()).expect("loopback must allocate")
}

#[tokio::test]
async fn send_then_recv_through_registry() {
    let mut backend = loopback();
    let mut list: [&mut dyn Transport; 1] = [&mut backend];
    let mut registry = TransportRegistry::new(&mut list, BitRate::Kbps250);
    let mut bus = RegistryBus::new(&mut registry, 0, MockTimer).with_poll_interval(2);

    let frame = j1939_frame(2, 0xF8, 0x01, 0x23, &[0xA0, 0x0B, 1, 2, 3, 4, 5, 6]);
    bus.send(&frame).await.expect("loopback accepts");
    assert_eq!(bus.recv().await, Ok(frame));
    assert_eq!(bus.registry().active_name(), Some("loopback"));
}

#[tokio::test]
async fn recv_within_times_out_on_silent_bus() {
    let mut backend = loopback();
    let mut list: [&mut dyn Transport; 1] = [&mut backend];
    let mut registry = TransportRegistry::new(&mut list, BitRate::Kbps250);
    let mut bus = RegistryBus::new(&mut registry, 0, MockTimer);
    let mut timer = MockTimer;

    let started = tokio::time::Instant::now();
    assert_eq!(recv_within(&mut bus, &mut timer, 20).await, Ok(None));
    assert!(started.elapsed() >= tokio::time::Duration::from_millis(20));
}

#[tokio::test]
/// A closed registry never answers; the send is refused outright.
async fn closed_registry_refuses_send() {
    let mut backend = loopback();
    let mut list: [&mut dyn Transport; 1] = [&mut backend];
    let mut registry = TransportRegistry::new(&mut list, BitRate::Kbps250);
    registry.close();
    let mut bus = RegistryBus::new(&mut registry, 0, MockTimer);

    let frame = j1939_frame(6, 0xEF, 0x00, 0x01, &[]);
    assert_eq!(bus.send(&frame).await, Err(ShimError::MessageNotHandled));
    let mut timer = MockTimer;
    assert_eq!(recv_within(&mut bus, &mut timer, 5).await, Ok(None));
}

#[tokio::test]
async fn recv_within_returns_waiting_frame() {
    let (mut dut, mut host) = MockCanBus::create_pair();
    let frame = j1939_frame(3, 0xEF, 0x01, 0x10, &[1, 2, 3]);
    host.send(&frame).await.expect("peer alive");

    let mut timer = MockTimer;
    assert_eq!(recv_within(&mut dut, &mut timer, 50).await, Ok(Some(frame)));
}

#[tokio::test]
/// The embassy timer drives both the poll interval and the deadline.
async fn embassy_timer_paces_registry_bus() {
    let mut backend = loopback();
    let mut list: [&mut dyn Transport; 1] = [&mut backend];
    let mut registry = TransportRegistry::new(&mut list, BitRate::Kbps250);
    let mut bus = RegistryBus::new(&mut registry, 0, EmbassyTimer).with_poll_interval(1);
    let mut timer = EmbassyTimer;

    let started = std::time::Instant::now();
    assert_eq!(recv_within(&mut bus, &mut timer, 15).await, Ok(None));
    assert!(started.elapsed() >= std::time::Duration::from_millis(15));

    let frame = j1939_frame(6, 0xEF, 0x00, 0x01, &[9]);
    bus.send(&frame).await.expect("loopback accepts");
    assert_eq!(recv_within(&mut bus, &mut timer, 500).await, Ok(Some(frame)));
}
