//! Asynchronous timer abstraction providing the delays required by the
//! polling bus adapter.

/// Timer trait abstraction; must remain thread-safe when applicable.
pub trait KorriTimer {
    /// Asynchronously wait for `millis` milliseconds.
    fn delay_ms<'a>(
        &'a mut self,
        millis: u32,
    ) -> impl core::future::Future<Output = ()> + 'a;
}

/// [`KorriTimer`] backed by the embassy time driver of the target.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbassyTimer;

impl KorriTimer for EmbassyTimer {
    async fn delay_ms(&mut self, millis: u32) {
        embassy_time::Timer::after_millis(millis as u64).await;
    }
}
