//! Asynchronous timer abstraction providing the timing primitives required
//! by the master schedule and response windows.

/// Timer trait abstraction; must remain thread-safe when applicable.
pub trait LinTimer {
    /// Asynchronously wait for `millis` milliseconds.
    fn delay_ms(&mut self, millis: u32) -> impl core::future::Future<Output = ()> + '_;
}
