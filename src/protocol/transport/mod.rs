//! LIN transport layer: abstraction traits for the physical collaborator and
//! the protocol constants shared by master and slave.
//!
//! ## LIN Timing Constants
//!
//! These constants define the defaults used when a network description or
//! the host does not provide its own values.

pub mod traits;

pub use crate::core::MAX_FRAME_DATA_LEN;

/// Sync field sent by the master right after the break.
pub const SYNC_BYTE: u8 = 0x55;

/// Mask isolating the six frame-id bits of a protected identifier.
pub const FRAME_ID_MASK: u8 = 0x3F;

/// Default time a master waits for a slave response before giving up on a
/// slot (ms).
///
/// LIN allows a response space of up to 1.4 times the nominal frame time.
/// An 8-byte frame at 19 200 bit/s is nominally about 6.4 ms, so 50 ms leaves
/// a wide margin for slow transceivers and for hosts that poll the transport
/// from a coarse loop.
///
/// # Implementation notes
///
/// Override it per network with
/// [`ScheduleBuilder::with_default_response_wait`](crate::protocol::schedule::ScheduleBuilder::with_default_response_wait).
pub const DEFAULT_RESPONSE_WAIT_MS: u32 = 50;

/// Default resolution of the master runner's timing loop (ms).
///
/// LDF schedule delays are expressed in multiples of the 5 ms / 10 ms time
/// base; a 1 ms tick keeps the jitter well under one time base.
pub const DEFAULT_MASTER_TICK_MS: u32 = 1;
