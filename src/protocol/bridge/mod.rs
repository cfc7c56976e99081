//! Driver bridge: couples one hardware channel to its RX/TX rings, its handle
//! pool and its statistics.
//!
//! The bridge is the explicit channel context. Everything an interrupt can
//! touch lives in one [`ChannelState`] guarded by an
//! [`embassy_sync::blocking_mutex::Mutex`] over a [`CriticalSectionRawMutex`]:
//! on bare-metal targets the guard masks interrupts for the duration of the
//! closure, on hosted targets it is a short-held lock. The guard is released
//! on every exit path of the closure.
//!
//! Task-context operations: [`DriverBridge::init`],
//! [`DriverBridge::transmit_request`], [`DriverBridge::receive_frame`],
//! [`DriverBridge::status_tick`]. Interrupt context enters through
//! [`DriverBridge::on_interrupt`].
use core::cell::RefCell;

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};

use crate::config::ChannelConfig;
use crate::core::{BitRate, BusStatus, ReceiveOutcome};
use crate::error::ShimError;
use crate::infra::buffer::handles::{HandleStatus, HandleTable, MessageHandle};
use crate::infra::buffer::ring::FrameRing;
use crate::infra::driver::{CallbackReason, FilterMode, HardwareDriver, TxSlot};
use crate::protocol::transport::{can_frame::CanFrame, can_id::CanId, MAX_TX_SLOTS};

mod bus_status;
mod isr;
mod sequencer;
mod stats;

pub use bus_status::BusStatusFilter;
pub use sequencer::PrioritySequencer;
pub use stats::ChannelStatistics;

use isr::CallbackTable;

//==================================================================================CHANNEL_STATE
/// Queued transmit request.
#[derive(Debug, Clone, Copy)]
struct TxRequest {
    frame: CanFrame,
    handle: MessageHandle,
    priority: u16,
}

/// Hardware mailbox bookkeeping.
#[derive(Debug, Clone, Copy, Default)]
struct SlotState {
    handle: Option<MessageHandle>,
    id: Option<CanId>,
    /// Remaining ticks before abort; 0 when disarmed.
    timeout: u16,
}

/// Everything shared between task and interrupt context for one channel.
pub(crate) struct ChannelState<D> {
    driver: D,
    config: ChannelConfig,
    rx: FrameRing<CanFrame>,
    tx: FrameRing<TxRequest>,
    handles: HandleTable,
    sequencer: PrioritySequencer,
    slots: [SlotState; MAX_TX_SLOTS],
    slot_count: usize,
    stats: ChannelStatistics,
    bus: BusStatusFilter,
    callbacks: CallbackTable<D>,
    /// Consecutive ticks with pending frames and an idle transmitter.
    stalled_ticks: u16,
    initialized: bool,
}

impl<D: HardwareDriver> ChannelState<D> {
    /// Loads queued frames into free slots, oldest first.
    fn pump(&mut self, channel: u8) {
        while let Some(request) = self.tx.peek().copied() {
            if self.driver.transmit_ok(channel).is_err() {
                break;
            }
            match self.driver.transmit(channel, &request.frame, request.priority) {
                Ok(slot) => {
                    let _ = self.tx.extract();
                    self.arm(slot, request.handle, request.frame.id);
                }
                Err(_) => break,
            }
        }
    }

    /// Records a loaded slot and starts its timeout.
    fn arm(&mut self, slot: TxSlot, handle: MessageHandle, id: CanId) {
        if let Some(state) = self.slots[..self.slot_count].get_mut(slot as usize) {
            *state = SlotState {
                handle: Some(handle),
                id: Some(id),
                timeout: self.config.tx_timeout_ticks,
            };
        }
        self.stats.tx_ext_frames = self.stats.tx_ext_frames.wrapping_add(1);
    }

    /// Frees the slot reported by the driver and returns its handle.
    fn free_completed_slot(&mut self, channel: u8) -> Option<MessageHandle> {
        let slot = self.driver.completed_slot(channel)?;
        let state = self.slots[..self.slot_count].get_mut(slot as usize)?;
        state.timeout = 0;
        state.id = None;
        state.handle.take()
    }

    fn flag_in_flight(&mut self, flags: HandleStatus) {
        for slot in &self.slots[..self.slot_count] {
            if let Some(handle) = slot.handle {
                let _ = self.handles.flag_bus_condition(handle, flags);
            }
        }
    }

    /// Whether a frame carrying `id` sits in a slot or in the TX ring.
    fn chain_pending(&self, id: CanId) -> bool {
        self.slots[..self.slot_count].iter().any(|slot| slot.id == Some(id))
            || self.tx.iter().any(|request| request.frame.id == id)
    }

    fn has_pending_tx(&self) -> bool {
        !self.tx.is_empty() || self.slots[..self.slot_count].iter().any(|s| s.handle.is_some())
    }

    fn reset_runtime(&mut self) {
        self.slots = [SlotState::default(); MAX_TX_SLOTS];
        self.stats.clear();
        self.stalled_ticks = 0;
        self.bus.reset();
        self.sequencer.reset();
    }
}

//==================================================================================DRIVER_BRIDGE
/// One hardware channel and its buffers.
pub struct DriverBridge<D: HardwareDriver> {
    channel: u8,
    state: Mutex<CriticalSectionRawMutex, RefCell<ChannelState<D>>>,
}

impl<D: HardwareDriver> DriverBridge<D> {
    /// Reserves rings and handle pool for `channel`.
    ///
    /// Fails with [`ShimError::AllocationFailure`] when backing storage is
    /// unavailable.
    pub fn new(channel: u8, driver: D, config: ChannelConfig) -> Result<Self, ShimError> {
        let rx = FrameRing::try_new(config.rx_capacity)?;
        let tx = FrameRing::try_new(config.tx_capacity)?;
        let handles = HandleTable::try_new(config.handle_capacity, config.handle_tracking)?;
        let slot_count = driver.tx_slot_count().clamp(1, MAX_TX_SLOTS);

        let state = ChannelState {
            driver,
            config,
            rx,
            tx,
            handles,
            sequencer: PrioritySequencer::new(),
            slots: [SlotState::default(); MAX_TX_SLOTS],
            slot_count,
            stats: ChannelStatistics::default(),
            bus: BusStatusFilter::new(config.bus_status_debounce),
            callbacks: CallbackTable::new(),
            stalled_ticks: 0,
            initialized: false,
        };
        Ok(Self {
            channel,
            state: Mutex::new(RefCell::new(state)),
        })
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ChannelState<D>) -> R) -> R {
        self.state.lock(|cell| f(&mut cell.borrow_mut()))
    }

    /// Runs `f` on the driver inside the critical section.
    pub fn with_driver<R>(&self, f: impl FnOnce(&mut D) -> R) -> R {
        self.with_state(|state| f(&mut state.driver))
    }

    //==================================================================================INIT
    /// Installs the receive, tx-complete, tx-abort and status handlers, resets
    /// timeouts and statistics, then brings the controller up at `bit_rate`
    /// with a pass-all filter and enables it.
    pub fn init(&self, bit_rate: BitRate) -> Result<(), ShimError> {
        let channel = self.channel;
        self.with_state(|state| {
            state.initialized = false;
            for (reason, handler) in CallbackTable::<D>::defaults() {
                state
                    .driver
                    .install_callback(channel, reason)
                    .map_err(|_| ShimError::PortInitError)?;
                state.callbacks.install(reason, handler);
            }
            state.reset_runtime();
            state
                .driver
                .init(channel, bit_rate, FilterMode::PassAll)
                .map_err(|_| ShimError::PortInitError)?;
            state
                .driver
                .enable(channel)
                .map_err(|_| ShimError::PortInitError)?;
            state.initialized = true;

            #[cfg(feature = "defmt")]
            defmt::info!("ch{}: initialised at {} bps", channel, bit_rate.bps());
            Ok(())
        })
    }

    //==================================================================================TRANSMIT
    /// Accepts a frame for transmission and returns the handle tracking it.
    ///
    /// The frame goes straight to a free hardware slot when nothing is queued
    /// ahead of it, otherwise it joins the TX ring. A full ring counts the
    /// frame as dropped and fails with [`ShimError::MessageNotHandled`]; a
    /// bus-off controller fails with [`ShimError::DriverBusy`].
    pub fn transmit_request(&self, frame: &CanFrame) -> Result<MessageHandle, ShimError> {
        let channel = self.channel;
        self.with_state(|state| {
            if !state.initialized {
                return Err(ShimError::MessageNotHandled);
            }
            if state.bus.current() == BusStatus::BusOff {
                return Err(ShimError::DriverBusy);
            }
            let handle = state.handles.allocate()?;
            let chain_pending = state.chain_pending(frame.id);
            let priority = state.sequencer.next(frame.id, chain_pending);

            state.pump(channel);
            if state.tx.is_empty() && state.driver.transmit_ok(channel).is_ok() {
                if let Ok(slot) = state.driver.transmit(channel, frame, priority) {
                    state.arm(slot, handle, frame.id);
                    return Ok(handle);
                }
            }

            let request = TxRequest {
                frame: *frame,
                handle,
                priority,
            };
            match state.tx.insert(request) {
                Ok(_) => Ok(handle),
                Err(_) => {
                    state.stats.tx_dropped = state.stats.tx_dropped.wrapping_add(1);
                    let _ = state.handles.release(handle);
                    #[cfg(feature = "defmt")]
                    defmt::warn!("ch{}: tx ring full, frame dropped", channel);
                    Err(ShimError::MessageNotHandled)
                }
            }
        })
    }

    /// `(frames transmitted, status)` of a handle returned by
    /// [`transmit_request`](Self::transmit_request).
    pub fn handle_status(&self, handle: MessageHandle) -> Result<(u16, HandleStatus), ShimError> {
        self.with_state(|state| state.handles.status(handle))
    }

    pub fn release_handle(&self, handle: MessageHandle) -> Result<(), ShimError> {
        self.with_state(|state| state.handles.release(handle))
    }

    //==================================================================================RECEIVE
    /// Pops the oldest received frame.
    pub fn receive_frame(&self) -> ReceiveOutcome {
        self.with_state(|state| match state.rx.extract() {
            Ok((frame, _)) => ReceiveOutcome::NewData(frame),
            Err(_) => ReceiveOutcome::NoData,
        })
    }

    //==================================================================================ISR
    /// Interrupt entry point: dispatches to the handler installed for `reason`.
    /// Reasons without a handler are ignored.
    pub fn on_interrupt(&self, reason: CallbackReason) {
        let channel = self.channel;
        self.with_state(|state| {
            if let Some(handler) = state.callbacks.get(reason) {
                handler(state, channel);
            }
        })
    }

    //==================================================================================TICK
    /// Periodic task-context housekeeping.
    ///
    /// Decrements every armed slot timeout and requests a hardware abort for
    /// those reaching zero, samples the bus status, tracks a stalled
    /// transmitter, and loads queued frames into free slots.
    pub fn status_tick(&self) {
        let channel = self.channel;
        self.with_state(|state| {
            for slot in 0..state.slot_count {
                let entry = &mut state.slots[slot];
                if entry.timeout == 0 {
                    continue;
                }
                entry.timeout -= 1;
                if entry.timeout == 0 {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("ch{}: slot {} timed out, aborting", channel, slot);
                    if let Err(_err) = state.driver.abort(channel, slot as TxSlot) {
                        // Retried on the next tick.
                        state.slots[slot].timeout = 1;
                        #[cfg(feature = "defmt")]
                        defmt::warn!("ch{}: abort of slot {} failed: {}", channel, slot, _err);
                    }
                }
            }

            let (tx, _) = state.driver.tx_status(channel);
            let (rx, _) = state.driver.rx_status(channel);
            state.bus.sample(BusStatusFilter::worst(tx, rx));

            if state.has_pending_tx() && !state.driver.is_transmitting(channel) {
                state.stalled_ticks = state.stalled_ticks.saturating_add(1);
            } else {
                state.stalled_ticks = 0;
            }

            state.pump(channel);
        })
    }

    //==================================================================================STATUS
    /// Filtered three-level bus status.
    pub fn bus_status(&self) -> BusStatus {
        self.with_state(|state| state.bus.current())
    }

    /// True only when the transmitter is idle and has been for a whole
    /// timeout window while frames were waiting.
    pub fn is_blocked(&self) -> bool {
        let channel = self.channel;
        self.with_state(|state| {
            state.stalled_ticks >= state.config.tx_timeout_ticks.max(1)
                && !state.driver.is_transmitting(channel)
        })
    }

    pub fn statistics(&self) -> ChannelStatistics {
        self.with_state(|state| state.stats)
    }

    pub fn clear_statistics(&self) {
        self.with_state(|state| state.stats.clear())
    }

    /// Frames waiting in the TX ring.
    pub fn queued_tx(&self) -> usize {
        self.with_state(|state| state.tx.len())
    }

    /// Frames waiting in the RX ring.
    pub fn queued_rx(&self) -> usize {
        self.with_state(|state| state.rx.len())
    }

    //==================================================================================CONTROLLER
    pub fn set_filter(&self, filter_id: u8, id: u32, mask: u32) -> Result<(), ShimError> {
        let channel = self.channel;
        self.with_driver(|driver| driver.set_filter(channel, filter_id, id, mask))
            .map_err(ShimError::from)
    }

    pub fn sleep(&self, wake_on_traffic: bool) -> Result<(), ShimError> {
        let channel = self.channel;
        self.with_driver(|driver| driver.sleep(channel, wake_on_traffic))
            .map_err(ShimError::from)
    }

    pub fn wake_up(&self) -> Result<(), ShimError> {
        let channel = self.channel;
        self.with_driver(|driver| driver.wake_up(channel))
            .map_err(ShimError::from)
    }

    /// Disables the controller; a new [`init`](Self::init) is needed afterwards.
    pub fn disable(&self) -> Result<(), ShimError> {
        let channel = self.channel;
        self.with_state(|state| {
            state.initialized = false;
            state.driver.disable(channel)
        })
        .map_err(ShimError::from)
    }
}
