//! Byte-stream abstraction for a LIN slave node: the runner pulls bus input
//! one character at a time and pushes responses back when the node publishes.
use crate::core::BusInput;
use futures_util::Future;

/// Contract to read raw bus input and answer headers asynchronously.
pub trait SlaveTransport {
    type Error: core::fmt::Debug;

    /// Retrieve the next bus event (break or character). Asynchronously
    /// waits until one is available.
    fn poll_input(&mut self) -> impl Future<Output = Result<BusInput, Self::Error>> + '_;

    /// Send the response field of a published frame: `data` then `checksum`.
    fn send_response<'a>(
        &'a mut self,
        data: &'a [u8],
        checksum: u8,
    ) -> impl Future<Output = Result<(), Self::Error>> + 'a;
}
