//! Backend registry: one transport contract, several implementations, exactly
//! one of them active.
//!
//! The registry owns an ordered list of [`Transport`] backends and probes
//! them in list order until one initialises. Every contract call is then
//! dispatched to that backend. Without an active backend the calls degrade
//! to fixed answers (`MessageNotHandled`, `NoData`, `BusOff`) instead of
//! failing loudly.
use alloc::vec::Vec;

use futures_util::future::{select, Either};
use futures_util::pin_mut;

use crate::core::{BitRate, BusStatus, Port, ReceiveOutcome};
use crate::error::ShimError;
use crate::infra::buffer::handles::{HandleStatus, MessageHandle};
use crate::protocol::bridge::ChannelStatistics;
use crate::protocol::transport::{
    can_frame::CanFrame,
    traits::{can_bus::CanBus, korri_timer::KorriTimer},
    RECEIVE_POLL_INTERVAL_MS,
};

//==================================================================================TRANSPORT
/// Uniform contract every backend implements.
pub trait Transport {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Opens the backend at `bit_rate`. `false` lets the registry move on to
    /// the next candidate.
    fn init(&mut self, bit_rate: BitRate) -> bool;

    fn close(&mut self);

    fn status(&mut self) -> BusStatus;

    /// Non-blocking poll of one port.
    fn receive(&mut self, port: Port) -> Result<ReceiveOutcome, ShimError>;

    /// Accepts a frame and returns the handle tracking it. Backends without
    /// tracking return [`MessageHandle::UNTRACKED`].
    fn send(&mut self, port: Port, frame: &CanFrame) -> Result<MessageHandle, ShimError>;

    fn statistics(&self, port: Port) -> Result<ChannelStatistics, ShimError>;

    fn clear_statistics(&mut self, port: Port) -> Result<(), ShimError>;

    /// `(frames transmitted, status)` of a handle returned by [`Transport::send`].
    fn handle_status(&mut self, port: Port, handle: MessageHandle) -> Result<(u16, HandleStatus), ShimError> {
        let _ = (port, handle);
        Ok((1, HandleStatus::TX_OK))
    }

    fn release_handle(&mut self, port: Port, handle: MessageHandle) -> Result<(), ShimError> {
        let _ = (port, handle);
        Ok(())
    }

    /// Periodic housekeeping hook.
    fn tick(&mut self) {}
}

/// Lifecycle of one registered backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportState {
    Uninitialized,
    /// Its `init` is running.
    Probing,
    Active,
    Closed,
}

//==================================================================================REGISTRY
/// Ordered backend list with at most one active entry.
pub struct TransportRegistry<'a, 'b> {
    backends: &'a mut [&'b mut dyn Transport],
    states: Vec<TransportState>,
    bit_rate: BitRate,
    active: Option<usize>,
    /// Set once an explicit or lazy probe ran; disables lazy probing.
    probed: bool,
}

impl<'a, 'b> TransportRegistry<'a, 'b> {
    /// Registers `backends` in probe order. Nothing is opened yet.
    pub fn new(backends: &'a mut [&'b mut dyn Transport], bit_rate: BitRate) -> Self {
        let states = backends.iter().map(|_| TransportState::Uninitialized).collect();
        Self {
            backends,
            states,
            bit_rate,
            active: None,
            probed: false,
        }
    }

    /// Opens the first backend that initialises, in list order.
    ///
    /// Returns the index of the active backend. An already active backend is
    /// kept as is. Fails with [`ShimError::PortInitError`] once every backend
    /// refused.
    pub fn init(&mut self) -> Result<usize, ShimError> {
        self.probed = true;
        if let Some(index) = self.active {
            return Ok(index);
        }

        for (index, backend) in self.backends.iter_mut().enumerate() {
            self.states[index] = TransportState::Probing;
            if backend.init(self.bit_rate) {
                self.states[index] = TransportState::Active;
                self.active = Some(index);

                #[cfg(feature = "std")]
                tracing::info!(backend = backend.name(), "using CAN interface");
                #[cfg(feature = "defmt")]
                defmt::info!("using CAN interface {}", backend.name());
                return Ok(index);
            }
            self.states[index] = TransportState::Closed;

            #[cfg(feature = "std")]
            tracing::warn!(backend = backend.name(), "CAN interface failed to open");
            #[cfg(feature = "defmt")]
            defmt::warn!("CAN interface {} failed to open", backend.name());
        }

        #[cfg(feature = "std")]
        tracing::error!("could not open any CAN interface device");
        #[cfg(feature = "defmt")]
        defmt::error!("could not open any CAN interface device");
        Err(ShimError::PortInitError)
    }

    /// Closes the active backend. The next [`init`](Self::init) probes again
    /// from the start of the list.
    pub fn close(&mut self) {
        self.probed = true;
        if let Some(index) = self.active.take() {
            self.backends[index].close();
            self.states[index] = TransportState::Closed;
        }
    }

    /// Changes the bit rate used by the next probe.
    pub fn set_bit_rate(&mut self, bit_rate: BitRate) {
        self.bit_rate = bit_rate;
    }

    pub fn bit_rate(&self) -> BitRate {
        self.bit_rate
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active_name(&self) -> Option<&'static str> {
        self.active.map(|index| self.backends[index].name())
    }

    pub fn state(&self, index: usize) -> Option<TransportState> {
        self.states.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    fn active_backend(&mut self) -> Option<&mut (dyn Transport + 'b)> {
        if self.active.is_none() && !self.probed {
            let _ = self.init();
        }
        let index = self.active?;
        Some(&mut *self.backends[index])
    }

    //==================================================================================DISPATCH
    pub fn send(&mut self, port: Port, frame: &CanFrame) -> Result<MessageHandle, ShimError> {
        match self.active_backend() {
            Some(backend) => backend.send(port, frame),
            None => Err(ShimError::MessageNotHandled),
        }
    }

    pub fn receive(&mut self, port: Port) -> Result<ReceiveOutcome, ShimError> {
        match self.active_backend() {
            Some(backend) => backend.receive(port),
            None => Ok(ReceiveOutcome::NoData),
        }
    }

    pub fn status(&mut self) -> BusStatus {
        match self.active_backend() {
            Some(backend) => backend.status(),
            None => BusStatus::BusOff,
        }
    }

    pub fn statistics(&mut self, port: Port) -> Result<ChannelStatistics, ShimError> {
        match self.active_backend() {
            Some(backend) => backend.statistics(port),
            None => Err(ShimError::InvalidPort),
        }
    }

    pub fn clear_statistics(&mut self, port: Port) -> Result<(), ShimError> {
        match self.active_backend() {
            Some(backend) => backend.clear_statistics(port),
            None => Err(ShimError::InvalidPort),
        }
    }

    pub fn handle_status(&mut self, port: Port, handle: MessageHandle) -> Result<(u16, HandleStatus), ShimError> {
        match self.active_backend() {
            Some(backend) => backend.handle_status(port, handle),
            None => Err(ShimError::InvalidHandle),
        }
    }

    pub fn release_handle(&mut self, port: Port, handle: MessageHandle) -> Result<(), ShimError> {
        match self.active_backend() {
            Some(backend) => backend.release_handle(port, handle),
            None => Err(ShimError::InvalidHandle),
        }
    }

    /// Forwards the periodic tick to the active backend only.
    pub fn tick(&mut self) {
        if let Some(index) = self.active {
            self.backends[index].tick();
        }
    }
}

//==================================================================================REGISTRY_BUS
/// Async [`CanBus`] view of one registry port.
///
/// `recv` polls the registry and sleeps `poll_interval_ms` between empty
/// polls, ticking the active backend each time.
pub struct RegistryBus<'r, 'a, 'b, T: KorriTimer> {
    registry: &'r mut TransportRegistry<'a, 'b>,
    port: Port,
    timer: T,
    poll_interval_ms: u32,
}

impl<'r, 'a, 'b, T: KorriTimer> RegistryBus<'r, 'a, 'b, T> {
    pub fn new(registry: &'r mut TransportRegistry<'a, 'b>, port: Port, timer: T) -> Self {
        Self {
            registry,
            port,
            timer,
            poll_interval_ms: RECEIVE_POLL_INTERVAL_MS,
        }
    }

    pub fn with_poll_interval(mut self, millis: u32) -> Self {
        self.poll_interval_ms = millis.max(1);
        self
    }

    pub fn registry(&mut self) -> &mut TransportRegistry<'a, 'b> {
        self.registry
    }
}

impl<T: KorriTimer> CanBus for RegistryBus<'_, '_, '_, T> {
    type Error = ShimError;

    async fn send<'f>(&'f mut self, frame: &'f CanFrame) -> Result<(), Self::Error> {
        self.registry.send(self.port, frame).map(|_| ())
    }

    async fn recv(&mut self) -> Result<CanFrame, Self::Error> {
        loop {
            if let Some(frame) = self.registry.receive(self.port)?.into_frame() {
                return Ok(frame);
            }
            self.registry.tick();
            self.timer.delay_ms(self.poll_interval_ms).await;
        }
    }
}

/// Waits at most `millis` for the next frame of `bus`. `Ok(None)` on timeout.
pub async fn recv_within<C: CanBus, T: KorriTimer>(
    bus: &mut C,
    timer: &mut T,
    millis: u32,
) -> Result<Option<CanFrame>, C::Error> {
    let deadline = timer.delay_ms(millis);
    pin_mut!(deadline);
    let recv = bus.recv();
    pin_mut!(recv);

    match select(deadline, recv).await {
        Either::Left(_) => Ok(None),
        Either::Right((received, _)) => received.map(Some),
    }
}

//==================================================================================TESTS
#[cfg(test)]
#[path = "tests.rs"]
mod tests;
