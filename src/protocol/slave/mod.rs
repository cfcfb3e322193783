//! LIN slave state machine: turns the raw bus input of one node into received
//! frames and response requests.
//!
//! ```text
//!  break         0x55          PID             data[0..n]        checksum
//! ───────▶ SyncReceived ──▶ PidReceived ──┬─▶ ReceivingData ───────────────▶ Idle (FrameReceived)
//!                                         │
//!                                         └─▶ TransmittingData ──────────────▶ Idle (transmit_complete)
//!                                              (ResponseRequested)
//! ```
//!
//! Every protocol violation is reported once through the error hook, after
//! which the machine is back in `Idle` with an empty buffer. The hook is any
//! `FnMut(SlaveError)`; [`SlaveStateMachine::new`] installs one that logs
//! through `defmt`.
use crate::core::{BusInput, LinBytes};
use crate::error::SlaveError;
use crate::protocol::frame::{
    compute_checksum, validate_checksum, ChecksumMode, DataLength, FrameId, ProtectedId,
    MAX_FRAME_ID,
};
use crate::protocol::schedule::NetworkDescription;
use crate::protocol::transport::SYNC_BYTE;

pub mod runner;

//==================================================================================REGISTRY
/// Direction of a frame from the slave's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlaveDirection {
    /// This node answers the header with its own data.
    Publish,
    /// This node consumes the data published by someone else.
    Subscribe,
}

/// What a slave knows about one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameDescriptor {
    pub frame_id: FrameId,
    pub length: DataLength,
    pub direction: SlaveDirection,
    pub checksum_mode: ChecksumMode,
}

impl FrameDescriptor {
    pub fn publish(frame_id: FrameId, length: DataLength, checksum_mode: ChecksumMode) -> Self {
        Self {
            frame_id,
            length,
            direction: SlaveDirection::Publish,
            checksum_mode,
        }
    }

    pub fn subscribe(frame_id: FrameId, length: DataLength, checksum_mode: ChecksumMode) -> Self {
        Self {
            frame_id,
            length,
            direction: SlaveDirection::Subscribe,
            checksum_mode,
        }
    }
}

const REGISTRY_SLOTS: usize = MAX_FRAME_ID as usize + 1;

/// Frames recognised by one slave node, indexed by frame id.
#[derive(Debug, Clone)]
pub struct SlaveFrameRegistry {
    frames: [Option<FrameDescriptor>; REGISTRY_SLOTS],
}

impl Default for SlaveFrameRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SlaveFrameRegistry {
    pub const fn new() -> Self {
        Self {
            frames: [None; REGISTRY_SLOTS],
        }
    }

    /// Register `descriptor`, returning the one it replaces.
    pub fn insert(&mut self, descriptor: FrameDescriptor) -> Option<FrameDescriptor> {
        self.frames[descriptor.frame_id.raw() as usize].replace(descriptor)
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, descriptor: FrameDescriptor) -> Self {
        self.insert(descriptor);
        self
    }

    pub fn remove(&mut self, frame_id: FrameId) -> Option<FrameDescriptor> {
        self.frames[frame_id.raw() as usize].take()
    }

    #[inline]
    pub fn get(&self, frame_id: FrameId) -> Option<&FrameDescriptor> {
        self.frames[frame_id.raw() as usize].as_ref()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameDescriptor> {
        self.frames.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Registry of `node_name`: the frames it publishes and the ones it
    /// subscribes to. Frames with an invalid id or length are left out.
    pub fn from_description(description: &NetworkDescription, node_name: &str) -> Self {
        let mut registry = Self::new();

        for (_name, frame) in description.frames.iter() {
            let direction = if frame.publisher == node_name {
                SlaveDirection::Publish
            } else if frame.subscribers.iter().any(|subscriber| subscriber == node_name) {
                SlaveDirection::Subscribe
            } else {
                continue;
            };

            let resolved = FrameId::new(frame.id).and_then(|frame_id| {
                DataLength::try_from(frame.length).map(|length| (frame_id, length))
            });
            match resolved {
                Ok((frame_id, length)) => {
                    registry.insert(FrameDescriptor {
                        frame_id,
                        length,
                        direction,
                        checksum_mode: description.checksum_mode(frame_id, frame),
                    });
                }
                Err(_err) => {
                    #[cfg(feature = "defmt")]
                    defmt::warn!(
                        "Frame '{=str}' skipped for node '{=str}': {}",
                        _name.as_str(),
                        node_name,
                        _err
                    );
                }
            }
        }

        registry
    }
}

//==================================================================================EVENTS
/// Subscribed frame received with a valid checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReceivedFrame {
    pub pid: ProtectedId,
    pub data: LinBytes,
    pub checksum_mode: ChecksumMode,
}

impl ReceivedFrame {
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.pid.frame_id()
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        self.data.as_slice()
    }
}

/// Header of a published frame: the node must now send its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ResponseRequest {
    pub pid: ProtectedId,
    pub length: DataLength,
    pub checksum_mode: ChecksumMode,
}

impl ResponseRequest {
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.pid.frame_id()
    }

    /// Checksum to append after `data`.
    pub fn checksum(&self, data: &[u8]) -> u8 {
        compute_checksum(self.pid, data, self.checksum_mode)
    }
}

/// Outcome of one input, when it completes something.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlaveEvent {
    FrameReceived(ReceivedFrame),
    ResponseRequested(ResponseRequest),
}

//==================================================================================STATE_MACHINE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlaveState {
    #[default]
    Idle,
    /// Break seen, waiting for the `0x55` sync field.
    SyncReceived,
    /// Waiting for the protected identifier.
    PidReceived,
    /// Collecting the data bytes then the checksum of a subscribed frame.
    ReceivingData,
    /// Response of a published frame handed to the transport.
    TransmittingData,
}

/// Behaviour switches of the slave machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SlaveConfig {
    /// The receiver swallows the sync byte after a break (auto-baud UARTs):
    /// a break is followed directly by the PID.
    pub sync_consumed_by_hardware: bool,
}

/// Default error hook: log and carry on.
pub fn log_slave_error(_error: SlaveError) {
    #[cfg(feature = "defmt")]
    defmt::warn!("LIN slave protocol error: {}", _error);
}

/// Byte-driven slave state machine.
pub struct SlaveStateMachine<H = fn(SlaveError)>
where
    H: FnMut(SlaveError),
{
    registry: SlaveFrameRegistry,
    config: SlaveConfig,
    state: SlaveState,
    current: Option<(ProtectedId, FrameDescriptor)>,
    buffer: LinBytes,
    error_handler: H,
}

impl SlaveStateMachine {
    /// Machine reporting errors through [`log_slave_error`].
    pub fn new(registry: SlaveFrameRegistry) -> Self {
        Self::with_error_handler(registry, log_slave_error as fn(SlaveError))
    }
}

impl<H> SlaveStateMachine<H>
where
    H: FnMut(SlaveError),
{
    pub fn with_error_handler(registry: SlaveFrameRegistry, error_handler: H) -> Self {
        Self {
            registry,
            config: SlaveConfig::default(),
            state: SlaveState::Idle,
            current: None,
            buffer: LinBytes::new(),
            error_handler,
        }
    }

    pub fn with_config(mut self, config: SlaveConfig) -> Self {
        self.config = config;
        self
    }

    /// Break field detected: a new header starts.
    ///
    /// A break in the middle of a frame aborts it with
    /// [`SlaveError::InvalidBreak`] before the new header is tracked.
    pub fn rx_break(&mut self) {
        if self.state != SlaveState::Idle {
            self.report(SlaveError::InvalidBreak);
        }
        self.state = if self.config.sync_consumed_by_hardware {
            SlaveState::PidReceived
        } else {
            SlaveState::SyncReceived
        };
    }

    /// Process one received character.
    pub fn rx_header(&mut self, byte: u8) -> Option<SlaveEvent> {
        match self.state {
            SlaveState::Idle | SlaveState::SyncReceived => {
                if byte == SYNC_BYTE {
                    self.state = SlaveState::PidReceived;
                } else {
                    self.report(SlaveError::InvalidSync);
                }
                None
            }
            SlaveState::PidReceived => self.on_pid(byte),
            SlaveState::ReceivingData => self.on_data(byte),
            SlaveState::TransmittingData => {
                self.report(SlaveError::InvalidDataReception);
                None
            }
        }
    }

    /// Single entry point for transports delivering [`BusInput`].
    pub fn feed(&mut self, input: BusInput) -> Option<SlaveEvent> {
        match input {
            BusInput::Break => {
                self.rx_break();
                None
            }
            BusInput::Byte(byte) => self.rx_header(byte),
        }
    }

    /// Outcome of the response sent after a [`SlaveEvent::ResponseRequested`].
    pub fn transmit_complete(&mut self, ok: bool) {
        if self.state != SlaveState::TransmittingData {
            return;
        }
        if ok {
            self.reset();
        } else {
            self.report(SlaveError::HardwareTransmitFailure);
        }
    }

    /// Drop any frame in progress and go back to `Idle`.
    pub fn reset(&mut self) {
        self.state = SlaveState::Idle;
        self.current = None;
        self.buffer.clear();
    }

    #[inline]
    pub fn state(&self) -> SlaveState {
        self.state
    }

    #[inline]
    pub fn config(&self) -> SlaveConfig {
        self.config
    }

    #[inline]
    pub fn registry(&self) -> &SlaveFrameRegistry {
        &self.registry
    }

    /// Data bytes collected so far for the frame in progress.
    #[inline]
    pub fn buffered(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    fn on_pid(&mut self, byte: u8) -> Option<SlaveEvent> {
        let Ok(pid) = ProtectedId::try_from_raw(byte) else {
            self.report(SlaveError::PidParity);
            return None;
        };
        let Some(descriptor) = self.registry.get(pid.frame_id()).copied() else {
            self.report(SlaveError::IdNotFound);
            return None;
        };

        self.current = Some((pid, descriptor));
        self.buffer.clear();

        match descriptor.direction {
            SlaveDirection::Publish => {
                self.state = SlaveState::TransmittingData;
                Some(SlaveEvent::ResponseRequested(ResponseRequest {
                    pid,
                    length: descriptor.length,
                    checksum_mode: descriptor.checksum_mode,
                }))
            }
            SlaveDirection::Subscribe => {
                self.state = SlaveState::ReceivingData;
                None
            }
        }
    }

    fn on_data(&mut self, byte: u8) -> Option<SlaveEvent> {
        let Some((pid, descriptor)) = self.current else {
            self.report(SlaveError::InvalidDataReception);
            return None;
        };

        if self.buffer.len() < descriptor.length.bytes() {
            self.buffer.push(byte);
            return None;
        }

        // Data field complete: `byte` is the checksum.
        if !validate_checksum(pid, self.buffer.as_slice(), descriptor.checksum_mode, byte) {
            self.report(SlaveError::InvalidChecksum);
            return None;
        }

        let frame = ReceivedFrame {
            pid,
            data: self.buffer,
            checksum_mode: descriptor.checksum_mode,
        };
        #[cfg(feature = "defmt")]
        defmt::trace!("Frame {=u8:#X} received", frame.frame_id().raw());
        self.reset();
        Some(SlaveEvent::FrameReceived(frame))
    }

    fn report(&mut self, error: SlaveError) {
        (self.error_handler)(error);
        self.reset();
    }
}
