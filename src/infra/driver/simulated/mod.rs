//! In-memory controller implementing [`HardwareDriver`].
//!
//! It backs the simulated backend and the tests: frames loaded into a slot
//! stay there until [`SimulatedController::complete_next`] puts them "on the
//! bus" (or the bridge aborts them), and the caller then raises the matching
//! interrupt on the bridge.
use alloc::collections::VecDeque;
use alloc::vec::Vec;

use super::{CallbackReason, FilterMode, HardwareDriver, HwStatus, TxSlot};
use crate::core::BitRate;
use crate::error::DriverError;
use crate::protocol::transport::{can_frame::CanFrame, MAX_TX_SLOTS};

#[derive(Debug, Clone, Copy)]
struct PendingTx {
    frame: CanFrame,
    priority: u16,
}

#[derive(Debug)]
pub struct SimulatedController {
    channels: u8,
    slots: Vec<Option<PendingTx>>,
    rx_fifo: VecDeque<CanFrame>,
    reports: VecDeque<TxSlot>,
    on_bus: Vec<CanFrame>,
    transmitted: Vec<(CanFrame, u16)>,
    aborted: Vec<TxSlot>,
    installed: Vec<CallbackReason>,
    filters: Vec<(u8, u32, u32)>,
    tx_status: (HwStatus, u16),
    rx_status: (HwStatus, u16),
    fail_init: Option<DriverError>,
    /// Remaining `abort` calls that fail.
    abort_failures: u32,
    bit_rate: Option<BitRate>,
    filter_mode: Option<FilterMode>,
    enabled: bool,
    asleep: bool,
    stalled: bool,
}

impl SimulatedController {
    /// Single-channel controller with `slot_count` transmit mailboxes
    /// (clamped to `1..=MAX_TX_SLOTS`).
    pub fn new(slot_count: usize) -> Self {
        Self::with_channels(1, slot_count)
    }

    pub fn with_channels(channels: u8, slot_count: usize) -> Self {
        let slot_count = slot_count.clamp(1, MAX_TX_SLOTS);
        Self {
            channels,
            slots: (0..slot_count).map(|_| None).collect(),
            rx_fifo: VecDeque::new(),
            reports: VecDeque::new(),
            on_bus: Vec::new(),
            transmitted: Vec::new(),
            aborted: Vec::new(),
            installed: Vec::new(),
            filters: Vec::new(),
            tx_status: (HwStatus::Ok, 0),
            rx_status: (HwStatus::Ok, 0),
            fail_init: None,
            abort_failures: 0,
            bit_rate: None,
            filter_mode: None,
            enabled: false,
            asleep: false,
            stalled: false,
        }
    }

    //==================================================================================TEST_CONTROLS
    /// Makes the next `init` fail with `error` (`None` restores success).
    pub fn fail_init(&mut self, error: Option<DriverError>) {
        self.fail_init = error;
    }

    /// Fails the next `count` abort requests with [`DriverError::Failure`].
    pub fn fail_aborts(&mut self, count: u32) {
        self.abort_failures = count;
    }

    /// Queues a frame in the hardware receive FIFO.
    pub fn inject_rx(&mut self, frame: CanFrame) {
        self.rx_fifo.push_back(frame);
    }

    /// Sends the highest-priority pending slot (lowest value, then lowest
    /// index) and queues its completion report.
    pub fn complete_next(&mut self) -> Option<TxSlot> {
        let (index, pending) = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.map(|p| (index, p)))
            .min_by_key(|(index, pending)| (pending.priority, *index))?;
        self.slots[index] = None;
        self.on_bus.push(pending.frame);
        self.reports.push_back(index as TxSlot);
        Some(index as TxSlot)
    }

    pub fn set_tx_status(&mut self, status: HwStatus, error_count: u16) {
        self.tx_status = (status, error_count);
    }

    pub fn set_rx_status(&mut self, status: HwStatus, error_count: u16) {
        self.rx_status = (status, error_count);
    }

    /// A stalled controller keeps its slots loaded but never reports transmitting.
    pub fn set_stalled(&mut self, stalled: bool) {
        self.stalled = stalled;
    }

    //==================================================================================INSPECTION
    /// Every frame loaded into a slot, with its local priority.
    pub fn transmitted(&self) -> &[(CanFrame, u16)] {
        &self.transmitted
    }

    /// Frames that completed, in bus order.
    pub fn on_bus(&self) -> &[CanFrame] {
        &self.on_bus
    }

    /// Slots the bridge asked to abort.
    pub fn aborted(&self) -> &[TxSlot] {
        &self.aborted
    }

    pub fn installed(&self) -> &[CallbackReason] {
        &self.installed
    }

    pub fn filters(&self) -> &[(u8, u32, u32)] {
        &self.filters
    }

    pub fn pending_slots(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn bit_rate(&self) -> Option<BitRate> {
        self.bit_rate
    }

    pub fn filter_mode(&self) -> Option<FilterMode> {
        self.filter_mode
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_asleep(&self) -> bool {
        self.asleep
    }

    fn check(&self, channel: u8) -> Result<(), DriverError> {
        if channel < self.channels {
            Ok(())
        } else {
            Err(DriverError::BadChannel)
        }
    }
}

//==================================================================================HARDWARE_DRIVER
impl HardwareDriver for SimulatedController {
    fn init(&mut self, channel: u8, bit_rate: BitRate, filter: FilterMode) -> Result<(), DriverError> {
        self.check(channel)?;
        if let Some(error) = self.fail_init {
            return Err(error);
        }
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.rx_fifo.clear();
        self.reports.clear();
        self.bit_rate = Some(bit_rate);
        self.filter_mode = Some(filter);
        Ok(())
    }

    fn set_filter(&mut self, channel: u8, filter_id: u8, id: u32, mask: u32) -> Result<(), DriverError> {
        self.check(channel)?;
        self.filters.push((filter_id, id, mask));
        Ok(())
    }

    fn enable(&mut self, channel: u8) -> Result<(), DriverError> {
        self.check(channel)?;
        self.enabled = true;
        Ok(())
    }

    fn disable(&mut self, channel: u8) -> Result<(), DriverError> {
        self.check(channel)?;
        self.enabled = false;
        Ok(())
    }

    fn sleep(&mut self, channel: u8, _wake_on_traffic: bool) -> Result<(), DriverError> {
        self.check(channel)?;
        if self.pending_slots() > 0 {
            return Err(DriverError::SleepFail);
        }
        self.asleep = true;
        Ok(())
    }

    fn wake_up(&mut self, channel: u8) -> Result<(), DriverError> {
        self.check(channel)?;
        self.asleep = false;
        Ok(())
    }

    fn receive(&mut self, channel: u8) -> Result<CanFrame, DriverError> {
        self.check(channel)?;
        self.rx_fifo.pop_front().ok_or(DriverError::NoData)
    }

    fn transmit_ok(&mut self, channel: u8) -> Result<(), DriverError> {
        self.check(channel)?;
        if self.enabled && !self.asleep && self.slots.iter().any(|slot| slot.is_none()) {
            Ok(())
        } else {
            Err(DriverError::TxBusy)
        }
    }

    fn transmit(&mut self, channel: u8, frame: &CanFrame, priority: u16) -> Result<TxSlot, DriverError> {
        self.check(channel)?;
        let index = self
            .slots
            .iter()
            .position(|slot| slot.is_none())
            .ok_or(DriverError::TxBusy)?;
        self.slots[index] = Some(PendingTx { frame: *frame, priority });
        self.transmitted.push((*frame, priority));
        Ok(index as TxSlot)
    }

    fn abort(&mut self, channel: u8, slot: TxSlot) -> Result<(), DriverError> {
        self.check(channel)?;
        if self.abort_failures > 0 {
            self.abort_failures -= 1;
            return Err(DriverError::Failure);
        }
        let pending = self
            .slots
            .get_mut(slot as usize)
            .ok_or(DriverError::Failure)?;
        if pending.take().is_some() {
            self.aborted.push(slot);
            self.reports.push_back(slot);
        }
        Ok(())
    }

    fn tx_status(&mut self, _channel: u8) -> (HwStatus, u16) {
        self.tx_status
    }

    fn rx_status(&mut self, _channel: u8) -> (HwStatus, u16) {
        self.rx_status
    }

    fn install_callback(&mut self, channel: u8, reason: CallbackReason) -> Result<(), DriverError> {
        self.check(channel)?;
        if !self.installed.contains(&reason) {
            self.installed.push(reason);
        }
        Ok(())
    }

    fn completed_slot(&mut self, _channel: u8) -> Option<TxSlot> {
        self.reports.pop_front()
    }

    fn is_transmitting(&mut self, _channel: u8) -> bool {
        !self.stalled && self.pending_slots() > 0
    }

    fn tx_slot_count(&self) -> usize {
        self.slots.len()
    }
}
