//! End-to-end scenarios: protocol-stack calls going through the registry down
//! to a simulated controller, and backend fallback with real hosted backends.
mod helpers;

use helpers::{complete_next, j1939_frame};
use korri_canshim::{
    config::{AsciiSerialConfig, ChannelConfig, TcpConfig},
    core::{BitRate, BusStatus, ReceiveOutcome},
    error::ShimError,
    infra::{
        buffer::handles::HandleStatus,
        driver::{simulated::SimulatedController, CallbackReason, HwStatus},
    },
    protocol::{
        backends::{
            ascii_serial::AsciiSerialTransport, loopback::LoopbackTransport,
            onchip::OnChipTransport, tcp::TcpTransport,
        },
        bridge::DriverBridge,
        registry::{Transport, TransportRegistry, TransportState},
        transport::can_id::CanId,
    },
};
use static_cell::StaticCell;
use std::cell::Cell;
use std::io::{self, Cursor};
use std::net::TcpListener;
use std::rc::Rc;

type SimBridge = DriverBridge<SimulatedController>;

fn leak_bridge(cell: &'static StaticCell<SimBridge>, config: ChannelConfig) -> &'static SimBridge {
    cell.init(DriverBridge::new(0, SimulatedController::new(3), config).expect("bridge must allocate"))
}

#[test]
/// One frame sent through the registry is completed by the controller and
/// its handle reports exactly one frame transmitted OK.
fn single_frame_through_registry() {
    static BRIDGE: StaticCell<SimBridge> = StaticCell::new();
    let bridge = leak_bridge(&BRIDGE, ChannelConfig::default());

    let mut onchip = OnChipTransport::new(&[bridge]).expect("one port");
    let mut list: [&mut dyn Transport; 1] = [&mut onchip];
    let mut registry = TransportRegistry::new(&mut list, BitRate::Kbps250);
    assert_eq!(registry.init(), Ok(0));
    bridge.with_driver(|driver| assert_eq!(driver.bit_rate(), Some(BitRate::Kbps250)));

    let frame = j1939_frame(3, 0xEF, 0x01, 0x10, &[1, 2, 3]);
    assert_eq!(frame.id, CanId(0x0CEF_0110));

    let handle = registry.send(0, &frame).expect("accepted");
    complete_next(bridge);

    assert_eq!(registry.handle_status(0, handle), Ok((1, HandleStatus::TX_OK)));
    bridge.with_driver(|driver| assert_eq!(driver.on_bus(), &[frame]));
    registry.release_handle(0, handle).expect("allocated handle");
    assert_eq!(registry.statistics(0).map(|s| s.tx_ext_frames), Ok(1));
}

#[test]
/// Five received frames into a ring of four: one drop, FIFO kept.
fn rx_overflow_through_registry() {
    static BRIDGE: StaticCell<SimBridge> = StaticCell::new();
    let bridge = leak_bridge(&BRIDGE, ChannelConfig::default().with_rx_capacity(4));

    let mut onchip = OnChipTransport::new(&[bridge]).expect("one port");
    let mut list: [&mut dyn Transport; 1] = [&mut onchip];
    let mut registry = TransportRegistry::new(&mut list, BitRate::Kbps250);
    registry.init().expect("simulated controller opens");

    let frames: Vec<_> = (0..5u8).map(|i| j1939_frame(6, 0xFF, i, 0x42, &[i])).collect();
    bridge.with_driver(|driver| frames.iter().for_each(|frame| driver.inject_rx(*frame)));
    bridge.on_interrupt(CallbackReason::Receive);

    for expected in &frames[..4] {
        assert_eq!(registry.receive(0), Ok(ReceiveOutcome::NewData(*expected)));
    }
    assert_eq!(registry.receive(0), Ok(ReceiveOutcome::NoData));
    assert_eq!(registry.statistics(0).map(|s| s.rx_dropped), Ok(1));
}

#[test]
/// The registry tick drives the bridge status filter.
fn bus_off_seen_through_registry_tick() {
    static BRIDGE: StaticCell<SimBridge> = StaticCell::new();
    let bridge = leak_bridge(&BRIDGE, ChannelConfig::default().with_bus_status_debounce(2));

    let mut onchip = OnChipTransport::new(&[bridge]).expect("one port");
    let mut list: [&mut dyn Transport; 1] = [&mut onchip];
    let mut registry = TransportRegistry::new(&mut list, BitRate::Kbps250);
    registry.init().expect("simulated controller opens");

    bridge.with_driver(|driver| driver.set_tx_status(HwStatus::BusOff, 255));
    registry.tick();
    assert_eq!(registry.status(), BusStatus::Ok);
    registry.tick();
    assert_eq!(registry.status(), BusStatus::BusOff);
    assert_eq!(
        registry.send(0, &j1939_frame(6, 0xEF, 0x00, 0x01, &[])),
        Err(ShimError::DriverBusy)
    );
}

#[test]
/// An unreachable relay and a missing adapter are skipped; the loopback bus
/// takes over. After close, init walks the list again from the top.
fn fallback_to_third_backend() {
    let unreachable = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
        listener.local_addr().expect("bound address")
    };
    let mut tcp = TcpTransport::new(TcpConfig::default().with_peer(unreachable));

    let opens = Rc::new(Cell::new(0u32));
    let counter = Rc::clone(&opens);
    let missing_adapter = move |_device: &str, _baud: u32| -> io::Result<Cursor<Vec<u8>>> {
        counter.set(counter.get() + 1);
        Err(io::ErrorKind::NotFound.into())
    };
    let mut serial = AsciiSerialTransport::new(AsciiSerialConfig::default(), missing_adapter);
    let mut loopback =
        LoopbackTransport::new("loopback", ChannelConfig::default()).expect("loopback must allocate");

    let mut list: [&mut dyn Transport; 3] = [&mut tcp, &mut serial, &mut loopback];
    let mut registry = TransportRegistry::new(&mut list, BitRate::Kbps250);

    assert_eq!(registry.init(), Ok(2));
    assert_eq!(registry.active_name(), Some("loopback"));
    assert_eq!(registry.state(0), Some(TransportState::Closed));
    assert_eq!(registry.state(1), Some(TransportState::Closed));
    assert_eq!(opens.get(), 1);

    let frame = j1939_frame(6, 0xEA, 0xFF, 0x07, &[0x00, 0xEE, 0x00]);
    registry.send(0, &frame).expect("loopback accepts");
    assert_eq!(registry.receive(0), Ok(ReceiveOutcome::NewData(frame)));

    registry.close();
    assert_eq!(registry.state(2), Some(TransportState::Closed));
    assert_eq!(registry.init(), Ok(2));
    assert_eq!(opens.get(), 2);
}
