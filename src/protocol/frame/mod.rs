//! LIN frame model: 6-bit frame identifiers, protected identifiers (PID) with
//! their two parity bits, and the classic/enhanced checksums that make a
//! frame self-validating.
//!
//! # Protected identifier layout
//!
//! ```text
//! Bit   7    6    5    4    3    2    1    0
//!      P1   P0  ID5  ID4  ID3  ID2  ID1  ID0
//!
//! P0 =   ID0 ^ ID1 ^ ID2 ^ ID4
//! P1 = !(ID1 ^ ID3 ^ ID4 ^ ID5)
//! ```
//!
//! # Checksum
//!
//! Inverted eight-bit sum with carry folding (every overflow above `0xFF` is
//! added back into bit 0). The classic variant (LIN 1.x) sums the data bytes
//! only; the enhanced variant (LIN 2.x) seeds the sum with the PID.
use crate::core::{LinBytes, MAX_FRAME_DATA_LEN};
use crate::error::ValidationError;
use crate::protocol::transport::FRAME_ID_MASK;

/// Master request frame, used for diagnostics and the go-to-sleep command.
pub const MASTER_REQUEST_FRAME_ID: u8 = 0x3C;
/// Slave response frame (diagnostics).
pub const SLAVE_RESPONSE_FRAME_ID: u8 = 0x3D;
/// Highest valid frame identifier.
pub const MAX_FRAME_ID: u8 = 63;
/// Go-to-sleep command carried by the master request frame.
pub const SLEEP_COMMAND: [u8; 8] = [0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
/// Longest response field on the wire: eight data bytes plus the checksum,
/// preceded by the PID.
pub const MAX_WIRE_LEN: usize = 1 + MAX_FRAME_DATA_LEN + 1;

//==================================================================================FRAME_ID
/// Application-level frame identifier (0-63).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameId(u8);

impl FrameId {
    /// Validate a raw identifier.
    pub const fn new(id: u8) -> Result<Self, ValidationError> {
        if id > MAX_FRAME_ID {
            return Err(ValidationError::FrameIdOutOfRange { id });
        }
        Ok(Self(id))
    }

    /// Keep the six low bits of `raw`. Total, never fails.
    #[inline]
    pub const fn from_masked(raw: u8) -> Self {
        Self(raw & FRAME_ID_MASK)
    }

    #[inline]
    pub const fn raw(&self) -> u8 {
        self.0
    }

    /// Protected identifier for this frame.
    #[inline]
    pub const fn pid(&self) -> ProtectedId {
        compute_pid(*self)
    }

    /// Diagnostic frames (`0x3C..=0x3F`) always use the classic checksum.
    #[inline]
    pub const fn is_diagnostic(&self) -> bool {
        self.0 >= MASTER_REQUEST_FRAME_ID
    }
}

impl TryFrom<u8> for FrameId {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FrameId> for u8 {
    fn from(id: FrameId) -> Self {
        id.0
    }
}

//==================================================================================PROTECTED_ID
/// Frame identifier plus its two parity bits, as sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProtectedId(u8);

impl ProtectedId {
    #[inline]
    pub const fn from_frame_id(frame_id: FrameId) -> Self {
        compute_pid(frame_id)
    }

    /// Accept a received PID only when its parity bits are consistent.
    pub const fn try_from_raw(raw: u8) -> Result<Self, ValidationError> {
        if validate_pid(raw) {
            Ok(Self(raw))
        } else {
            Err(ValidationError::PidParity { raw })
        }
    }

    #[inline]
    pub const fn raw(&self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn frame_id(&self) -> FrameId {
        extract_frame_id(self.0)
    }
}

impl From<FrameId> for ProtectedId {
    fn from(frame_id: FrameId) -> Self {
        compute_pid(frame_id)
    }
}

impl TryFrom<u8> for ProtectedId {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::try_from_raw(value)
    }
}

impl From<ProtectedId> for u8 {
    fn from(pid: ProtectedId) -> Self {
        pid.0
    }
}

//==================================================================================PID_ALGORITHMS
/// Append the P0/P1 parity bits to a frame identifier.
pub const fn compute_pid(frame_id: FrameId) -> ProtectedId {
    let id = frame_id.0;
    let p0 = (id ^ (id >> 1) ^ (id >> 2) ^ (id >> 4)) & 0x01;
    let p1 = !((id >> 1) ^ (id >> 3) ^ (id >> 4) ^ (id >> 5)) & 0x01;
    ProtectedId(id | (p0 << 6) | (p1 << 7))
}

/// Strip the parity bits of a raw PID.
#[inline]
pub const fn extract_frame_id(pid: u8) -> FrameId {
    FrameId::from_masked(pid)
}

/// Recompute the parity from the embedded frame id and compare.
#[inline]
pub const fn validate_pid(pid: u8) -> bool {
    compute_pid(extract_frame_id(pid)).0 == pid
}

//==================================================================================CHECKSUM
/// Checksum flavour, fixed for the lifetime of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[repr(u8)]
pub enum ChecksumMode {
    /// LIN 1.x: data bytes only.
    Classic = 0,
    /// LIN 2.x: PID and data bytes.
    #[default]
    Enhanced = 1,
}

impl ChecksumMode {
    /// Mode mandated for `frame_id` on a network running `version`.
    pub const fn for_frame(frame_id: FrameId, version: ProtocolVersion) -> Self {
        if frame_id.is_diagnostic() {
            return Self::Classic;
        }
        match version {
            ProtocolVersion::V1_3 => Self::Classic,
            ProtocolVersion::V2_0 | ProtocolVersion::V2_1 => Self::Enhanced,
        }
    }
}

impl TryFrom<u8> for ChecksumMode {
    type Error = ValidationError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Self::Classic),
            1 => Ok(Self::Enhanced),
            _ => Err(ValidationError::UnknownChecksumMode { raw }),
        }
    }
}

/// LIN protocol revision announced by a network description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProtocolVersion {
    #[cfg_attr(feature = "serde", serde(rename = "1.3"))]
    V1_3,
    #[cfg_attr(feature = "serde", serde(rename = "2.0"))]
    V2_0,
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "2.1"))]
    V2_1,
}

/// Compute the checksum of `data` for the frame identified by `pid`.
pub fn compute_checksum(pid: ProtectedId, data: &[u8], mode: ChecksumMode) -> u8 {
    let mut sum: u16 = match mode {
        ChecksumMode::Enhanced => pid.0 as u16,
        ChecksumMode::Classic => 0,
    };
    for &byte in data {
        sum += byte as u16;
        if sum > 0xFF {
            sum = (sum & 0xFF) + 1;
        }
    }
    !(sum as u8)
}

/// Recompute the checksum and compare it with the received one.
#[inline]
pub fn validate_checksum(pid: ProtectedId, data: &[u8], mode: ChecksumMode, received: u8) -> bool {
    compute_checksum(pid, data, mode) == received
}

//==================================================================================DATA_LENGTH
/// Data field sizes allowed by the LIN 2.1 profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DataLength {
    Two = 2,
    Four = 4,
    Eight = 8,
}

impl DataLength {
    #[inline]
    pub const fn bytes(self) -> usize {
        self as usize
    }
}

impl TryFrom<usize> for DataLength {
    type Error = ValidationError;

    fn try_from(len: usize) -> Result<Self, Self::Error> {
        match len {
            2 => Ok(Self::Two),
            4 => Ok(Self::Four),
            8 => Ok(Self::Eight),
            _ => Err(ValidationError::InvalidDataLength { len }),
        }
    }
}

//==================================================================================PDU
/// LIN 2.1 protocol data unit: a validated frame id, a 2/4/8-byte data field
/// and the checksum mode used to protect it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Pdu {
    pid: ProtectedId,
    data: LinBytes,
    mode: ChecksumMode,
}

impl Pdu {
    /// Strict constructor: `frame_id` must fit in six bits and `data` must be
    /// exactly 2, 4 or 8 bytes.
    pub fn new(frame_id: u8, data: &[u8], mode: ChecksumMode) -> Result<Self, ValidationError> {
        let frame_id = FrameId::new(frame_id)?;
        DataLength::try_from(data.len())?;
        Ok(Self {
            pid: frame_id.pid(),
            data: LinBytes::from_slice(data),
            mode,
        })
    }

    /// Convenience constructor: `data` is truncated to `length`, or padded with
    /// `0xFF` (recessive filler) when shorter.
    pub fn padded(frame_id: FrameId, data: &[u8], length: DataLength, mode: ChecksumMode) -> Self {
        let mut buffer = LinBytes::filled(length.bytes(), 0xFF);
        let copy_len = data.len().min(length.bytes());
        buffer.as_mut_slice()[..copy_len].copy_from_slice(&data[..copy_len]);
        Self {
            pid: frame_id.pid(),
            data: buffer,
            mode,
        }
    }

    /// Go-to-sleep command on the master request frame.
    pub fn sleep_command() -> Self {
        Self {
            pid: FrameId::from_masked(MASTER_REQUEST_FRAME_ID).pid(),
            data: LinBytes::from_slice(&SLEEP_COMMAND),
            mode: ChecksumMode::Classic,
        }
    }

    #[inline]
    pub fn pid(&self) -> ProtectedId {
        self.pid
    }

    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.pid.frame_id()
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        self.data.as_slice()
    }

    #[inline]
    pub fn bytes(&self) -> LinBytes {
        self.data
    }

    #[inline]
    pub fn checksum_mode(&self) -> ChecksumMode {
        self.mode
    }

    pub fn checksum(&self) -> u8 {
        compute_checksum(self.pid, self.data(), self.mode)
    }

    /// Check a received checksum against this PDU's data.
    pub fn validate(&self, received: u8) -> bool {
        validate_checksum(self.pid, self.data(), self.mode, received)
    }

    /// Bytes following break and sync on the bus: PID, data, checksum.
    ///
    /// Returns the buffer and the number of meaningful bytes in it.
    pub fn to_wire(&self) -> ([u8; MAX_WIRE_LEN], usize) {
        let mut wire = [0u8; MAX_WIRE_LEN];
        let len = self.data.len();
        wire[0] = self.pid.raw();
        wire[1..1 + len].copy_from_slice(self.data());
        wire[1 + len] = self.checksum();
        (wire, len + 2)
    }
}

//==================================================================================LIN_FRAME
/// Plain LIN frame kept for LIN 1.x style traffic: any data field from one to
/// eight bytes, classic checksum unless told otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinFrame {
    frame_id: FrameId,
    data: LinBytes,
    mode: ChecksumMode,
}

impl LinFrame {
    pub fn new(frame_id: u8, data: &[u8]) -> Result<Self, ValidationError> {
        let frame_id = FrameId::new(frame_id)?;
        if data.is_empty() || data.len() > MAX_FRAME_DATA_LEN {
            return Err(ValidationError::InvalidDataLength { len: data.len() });
        }
        Ok(Self {
            frame_id,
            data: LinBytes::from_slice(data),
            mode: ChecksumMode::Classic,
        })
    }

    /// Switch to the LIN 2.x checksum.
    pub fn with_enhanced_checksum(mut self) -> Self {
        self.mode = ChecksumMode::Enhanced;
        self
    }

    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    #[inline]
    pub fn pid(&self) -> ProtectedId {
        self.frame_id.pid()
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        self.data.as_slice()
    }

    #[inline]
    pub fn checksum_mode(&self) -> ChecksumMode {
        self.mode
    }

    pub fn checksum(&self) -> u8 {
        compute_checksum(self.pid(), self.data(), self.mode)
    }
}
