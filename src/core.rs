//! Plain data containers shared by the frame model, the schedulers and the
//! transport contracts.
//!
//! LIN payloads never exceed eight bytes, so every buffer here is a fixed
//! array plus a length: nothing in the per-byte or per-tick paths allocates.

use core::hash::{Hash, Hasher};

/// Largest data field a LIN frame can carry.
pub const MAX_FRAME_DATA_LEN: usize = 8;

/// Fixed-capacity byte buffer holding one LIN data field.
///
/// Equality and hashing only look at the populated bytes.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinBytes {
    len: usize,
    data: [u8; MAX_FRAME_DATA_LEN],
}

impl LinBytes {
    /// Create an empty buffer.
    pub const fn new() -> Self {
        Self {
            len: 0,
            data: [0; MAX_FRAME_DATA_LEN],
        }
    }

    /// Buffer of `len` bytes all set to `byte` (`len` is clamped to eight).
    pub const fn filled(len: usize, byte: u8) -> Self {
        let len = if len > MAX_FRAME_DATA_LEN {
            MAX_FRAME_DATA_LEN
        } else {
            len
        };
        Self {
            len,
            data: [byte; MAX_FRAME_DATA_LEN],
        }
    }

    /// Zero-filled buffer of `len` bytes.
    pub const fn zeroed(len: usize) -> Self {
        Self::filled(len, 0)
    }

    /// Copy at most eight bytes from `slice`.
    pub fn from_slice(slice: &[u8]) -> Self {
        let mut bytes = Self::new();
        bytes.copy_from_slice(slice);
        bytes
    }

    /// Number of valid bytes stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Checks whether the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reset the buffer.
    #[inline]
    pub fn clear(&mut self) {
        self.data = [0; MAX_FRAME_DATA_LEN];
        self.len = 0;
    }

    /// Replace the content with `slice`, clamped to eight bytes.
    #[inline]
    pub fn copy_from_slice(&mut self, slice: &[u8]) {
        let clamped = slice.len().min(MAX_FRAME_DATA_LEN);
        self.data[..clamped].copy_from_slice(&slice[..clamped]);
        self.len = clamped;
    }

    /// Append one byte. Returns `false` when the buffer is already full.
    #[inline]
    pub fn push(&mut self, byte: u8) -> bool {
        if self.len >= MAX_FRAME_DATA_LEN {
            return false;
        }
        self.data[self.len] = byte;
        self.len += 1;
        true
    }

    /// Immutable view over the populated bytes.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Mutable view over the populated bytes.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[..self.len]
    }
}

impl PartialEq for LinBytes {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for LinBytes {}

impl Hash for LinBytes {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_slice().hash(state);
    }
}

impl From<&[u8]> for LinBytes {
    fn from(slice: &[u8]) -> Self {
        Self::from_slice(slice)
    }
}

/// Data field handed over by a transport, stamped with the reception time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinMessage {
    /// Reception time in milliseconds, on the transport's own clock.
    pub timestamp_ms: u64,
    /// Received bytes (checksum excluded).
    pub data: LinBytes,
    /// Checksum byte as read from the bus. `None` when the transport already
    /// validated it in hardware.
    pub checksum: Option<u8>,
}

impl LinMessage {
    /// Message stamped `timestamp_ms`, without a checksum byte.
    pub fn new(timestamp_ms: u64, data: &[u8]) -> Self {
        Self {
            timestamp_ms,
            data: LinBytes::from_slice(data),
            checksum: None,
        }
    }

    /// Attach the checksum byte that followed the data on the bus.
    pub fn with_checksum(mut self, checksum: u8) -> Self {
        self.checksum = Some(checksum);
        self
    }

    /// Received payload.
    #[inline]
    pub fn data(&self) -> &[u8] {
        self.data.as_slice()
    }

    /// Data length code: number of payload bytes.
    #[inline]
    pub fn dlc(&self) -> usize {
        self.data.len()
    }
}

/// One unit of bus input as seen by a slave node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusInput {
    /// Break field detected (dominant level longer than a character).
    Break,
    /// Regular character received.
    Byte(u8),
}
