//! Minimal abstraction for the master side of a LIN bus. Allows the library to
//! plug into various implementations (UART + transceiver, USB interfaces,
//! simulated buses, etc.).
use crate::core::LinMessage;
use crate::protocol::frame::{ChecksumMode, ProtectedId};
use futures_util::Future;

/// Contract used by the master runner to emit headers and collect responses.
pub trait LinBus {
    type Error: core::fmt::Debug;

    /// Emit a full frame: break, sync, `pid`, `data` and the checksum
    /// computed with `checksum_mode`.
    fn transmit<'a>(
        &'a mut self,
        pid: ProtectedId,
        data: &'a [u8],
        checksum_mode: ChecksumMode,
    ) -> impl Future<Output = Result<(), Self::Error>> + 'a;

    /// Emit the header for `pid` and arm reception of a `expected_length`
    /// byte slave response protected with `checksum_mode`.
    fn prepare_receive(
        &mut self,
        pid: ProtectedId,
        expected_length: usize,
        checksum_mode: ChecksumMode,
    ) -> impl Future<Output = Result<(), Self::Error>> + '_;

    /// Wait for the slave response armed by [`LinBus::prepare_receive`].
    ///
    /// Transports that do not check the checksum themselves return it in
    /// [`LinMessage::checksum`]; the master validates it.
    fn recv_response(&mut self) -> impl Future<Output = Result<LinMessage, Self::Error>> + '_;

    /// Emit a wake-up pulse. Physical-layer concern; no-op by default.
    fn wakeup(&mut self) -> impl Future<Output = Result<(), Self::Error>> + '_ {
        async { Ok(()) }
    }

    /// Release the channel. No-op by default.
    fn shutdown(&mut self) -> impl Future<Output = ()> + '_ {
        async {}
    }
}
