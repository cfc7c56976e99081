//! Interrupt handlers and the reason-keyed table they are installed in.
//!
//! Handlers run inside the bridge critical section with the channel state
//! borrowed mutably; they never block nor retry, failures only bump counters.
use super::ChannelState;
use crate::infra::buffer::handles::HandleStatus;
use crate::infra::driver::{CallbackReason, HardwareDriver, HwStatus};

/// Signature of an installed handler.
pub(crate) type IsrHandler<D> = fn(&mut ChannelState<D>, u8);

/// One optional handler per [`CallbackReason`].
pub(crate) struct CallbackTable<D> {
    handlers: [Option<IsrHandler<D>>; CallbackReason::COUNT],
}

impl<D: HardwareDriver> CallbackTable<D> {
    pub(crate) fn new() -> Self {
        Self {
            handlers: [None; CallbackReason::COUNT],
        }
    }

    pub(crate) fn install(&mut self, reason: CallbackReason, handler: IsrHandler<D>) {
        self.handlers[reason.index()] = Some(handler);
    }

    pub(crate) fn get(&self, reason: CallbackReason) -> Option<IsrHandler<D>> {
        self.handlers[reason.index()]
    }

    /// The four handlers every channel installs at init.
    pub(crate) fn defaults() -> [(CallbackReason, IsrHandler<D>); 4] {
        [
            (CallbackReason::Receive, on_receive::<D> as IsrHandler<D>),
            (CallbackReason::TxOk, on_tx_complete::<D> as IsrHandler<D>),
            (CallbackReason::TxAbort, on_tx_abort::<D> as IsrHandler<D>),
            (CallbackReason::Status, on_status_change::<D> as IsrHandler<D>),
        ]
    }
}

//==================================================================================HANDLERS
/// Drains the hardware FIFO into the RX ring; overflow is counted and dropped.
pub(crate) fn on_receive<D: HardwareDriver>(state: &mut ChannelState<D>, channel: u8) {
    while let Ok(frame) = state.driver.receive(channel) {
        match state.rx.insert(frame) {
            Ok(_) => state.stats.rx_ext_frames = state.stats.rx_ext_frames.wrapping_add(1),
            Err(_) => {
                state.stats.rx_dropped = state.stats.rx_dropped.wrapping_add(1);
                #[cfg(feature = "defmt")]
                defmt::trace!("ch{}: rx ring full, frame dropped", channel);
            }
        }
    }
}

/// Marks the completed slot's handle OK and chains the next queued frame.
pub(crate) fn on_tx_complete<D: HardwareDriver>(state: &mut ChannelState<D>, channel: u8) {
    if let Some(handle) = state.free_completed_slot(channel) {
        // The caller may already have released the handle.
        let _ = state.handles.mark_transmitted(handle);
    }
    state.stalled_ticks = 0;
    state.pump(channel);
}

/// Clears the OK bit of the aborted slot's handle and chains the next frame.
pub(crate) fn on_tx_abort<D: HardwareDriver>(state: &mut ChannelState<D>, channel: u8) {
    if let Some(handle) = state.free_completed_slot(channel) {
        let _ = state.handles.mark_aborted(handle);
        #[cfg(feature = "defmt")]
        defmt::debug!("ch{}: transmission aborted, handle {}", channel, handle.0);
    }
    state.pump(channel);
}

/// Counts error-state transitions and feeds the bus-status filter.
pub(crate) fn on_status_change<D: HardwareDriver>(state: &mut ChannelState<D>, channel: u8) {
    let (tx, _tx_errors) = state.driver.tx_status(channel);
    let (rx, _rx_errors) = state.driver.rx_status(channel);

    if tx != state.stats.last_tx_status {
        match tx {
            HwStatus::Error => state.stats.tx_err_count = state.stats.tx_err_count.wrapping_add(1),
            HwStatus::BusOff => {
                state.stats.bus_off_count = state.stats.bus_off_count.wrapping_add(1);
                #[cfg(feature = "defmt")]
                defmt::warn!("ch{}: controller entered bus-off", channel);
            }
            _ => {}
        }
        let flags = match tx {
            HwStatus::BusOff => HandleStatus::BUS_OFF,
            HwStatus::Warning | HwStatus::Error => HandleStatus::ERROR_WARNING,
            _ => HandleStatus::empty(),
        };
        state.flag_in_flight(flags);
        state.stats.last_tx_status = tx;
    }
    if rx != state.stats.last_rx_status {
        if rx == HwStatus::Error {
            state.stats.rx_err_count = state.stats.rx_err_count.wrapping_add(1);
        }
        state.stats.last_rx_status = rx;
    }
    state.bus.sample(super::BusStatusFilter::worst(tx, rx));
}
