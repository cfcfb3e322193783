//! Error definitions shared across library modules.
//! Each type models a specific failure scenario (frame construction, slave
//! protocol violations, schedule resolution, transport failures in runners).
use alloc::string::String;
use thiserror_no_std::Error;

//==================================================================================VALIDATION_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Construction-time errors for frame parameters.
///
/// These are raised before any bus activity starts and never mid-protocol.
pub enum ValidationError {
    /// Frame identifiers only use six bits.
    #[error("Frame id out of range: {id} (max 63)")]
    FrameIdOutOfRange { id: u8 },
    /// LIN 2.1 data fields are 2, 4 or 8 bytes long.
    #[error("Invalid data length: {len}")]
    InvalidDataLength { len: usize },
    /// Raw checksum mode is neither classic (0) nor enhanced (1).
    #[error("Unknown checksum mode: {raw}")]
    UnknownChecksumMode { raw: u8 },
    /// Parity bits of a protected identifier do not match its frame id.
    #[error("Protected id parity mismatch: {raw:#04X}")]
    PidParity { raw: u8 },
}

//==================================================================================SLAVE_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Protocol errors raised by the slave state machine.
///
/// Always recoverable: they are reported through the error hook and the
/// machine is back in `Idle` afterwards.
pub enum SlaveError {
    /// Break detected while a frame was still in progress.
    #[error("Break received in the middle of a frame")]
    InvalidBreak,
    /// Byte after the break is not the `0x55` sync field.
    #[error("Invalid sync field")]
    InvalidSync,
    /// PID parity bits are wrong.
    #[error("PID parity error")]
    PidParity,
    /// Frame id is not part of this node's registry.
    #[error("Frame id not handled by this node")]
    IdNotFound,
    /// The transport failed to send the response of a published frame.
    #[error("Hardware transmission failure")]
    HardwareTransmitFailure,
    /// Checksum byte does not match the received data.
    #[error("Invalid checksum")]
    InvalidChecksum,
    /// Byte received while none was expected.
    #[error("Unexpected data reception")]
    InvalidDataReception,
}

//==================================================================================SCHEDULE_DIAGNOSTIC
#[derive(Error, Debug, Clone, PartialEq, Eq)]
/// Non-fatal findings while turning a network description into schedule tables.
///
/// The offending entry is skipped and building carries on.
pub enum ScheduleDiagnostic {
    /// No schedule table with this name exists in the description.
    #[error("Schedule table '{table}' not found")]
    TableNotFound { table: String },
    /// A schedule entry references a frame the description does not define.
    #[error("Frame '{frame}' in schedule table '{table}' is not defined")]
    UnknownFrame { table: String, frame: String },
    /// The frame definition cannot be turned into a valid slot.
    #[error("Frame '{frame}' has an invalid definition: {reason}")]
    InvalidFrameDefinition {
        frame: String,
        reason: ValidationError,
    },
}

//==================================================================================RUNNER_ERRORS
#[derive(Error, Debug)]
/// Transport failures that stop the master runner.
pub enum MasterRunError<E: core::fmt::Debug> {
    /// Bus refused to send a header + data frame.
    #[error("LIN bus transmit error: {0:?}")]
    Transmit(E),
    /// Bus could not be armed for a slave response.
    #[error("LIN bus prepare-receive error: {0:?}")]
    PrepareReceive(E),
    /// Bus failed while waiting for a slave response.
    #[error("LIN bus receive error: {0:?}")]
    Receive(E),
    /// Wake-up pulse could not be emitted.
    #[error("LIN bus wake-up error: {0:?}")]
    Wakeup(E),
}

#[derive(Error, Debug)]
/// Transport failures that stop the slave runner.
pub enum SlaveRunError<E: core::fmt::Debug> {
    /// No more input could be read from the bus.
    #[error("LIN bus receive error: {0:?}")]
    Receive(E),
}
