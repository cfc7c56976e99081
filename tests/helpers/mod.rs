/// Test doubles and builders shared by the integration tests.
use korri_canshim::{
    config::DataPageWidth,
    infra::driver::{simulated::SimulatedController, CallbackReason},
    protocol::{
        bridge::DriverBridge,
        transport::{
            can_frame::CanFrame,
            can_id::IdFields,
            traits::{can_bus::CanBus, korri_timer::KorriTimer},
        },
    },
};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{sleep, Duration};

#[allow(dead_code)]
/// Frame with a J1939 identifier built from its fields.
pub fn j1939_frame(priority: u8, pf: u8, ps: u8, sa: u8, payload: &[u8]) -> CanFrame {
    let fields = IdFields {
        priority,
        data_page: 0,
        pf,
        ps,
        sa,
    };
    CanFrame::from_fields(&fields, DataPageWidth::One, payload)
}

#[allow(dead_code)]
/// Puts the next pending slot on the simulated bus and raises the TxOk interrupt.
pub fn complete_next(bridge: &DriverBridge<SimulatedController>) {
    bridge
        .with_driver(|driver| driver.complete_next())
        .expect("a slot was pending");
    bridge.on_interrupt(CallbackReason::TxOk);
}

#[derive(Clone)]
#[allow(dead_code)]
/// In-memory CAN bus reproducing the `CanBus` trait behavior.
pub struct MockCanBus {
    tx: mpsc::UnboundedSender<CanFrame>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<CanFrame>>>,
}

#[allow(dead_code)]
impl MockCanBus {
    /// Construct a pair of interconnected buses (DUT ↔ host).
    pub fn create_pair() -> (Self, Self) {
        let (dut_tx, host_rx) = mpsc::unbounded_channel();
        let (host_tx, dut_rx) = mpsc::unbounded_channel();

        let dut_bus = Self {
            tx: dut_tx,
            rx: Arc::new(Mutex::new(dut_rx)),
        };

        let host_bus = Self {
            tx: host_tx,
            rx: Arc::new(Mutex::new(host_rx)),
        };

        (dut_bus, host_bus)
    }
}

impl CanBus for MockCanBus {
    type Error = ();

    async fn send<'a>(&'a mut self, frame: &'a CanFrame) -> Result<(), Self::Error> {
        self.tx.send(*frame).map_err(|_| ())?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<CanFrame, Self::Error> {
        let mut rx = self.rx.lock().await;
        rx.recv().await.ok_or(())
    }
}

#[allow(dead_code)]
/// Timer based on `tokio::time::sleep` to drive delays in tests.
pub struct MockTimer;

impl KorriTimer for MockTimer {
    async fn delay_ms(&mut self, millis: u32) {
        sleep(Duration::from_millis(millis as u64)).await;
    }
}
