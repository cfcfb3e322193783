//! Schedule tables: the decoded network description (LDF structure) and the
//! builder turning it into the ordered, cyclic slot list driven by the master.
//!
//! ```text
//! NetworkDescription ──ScheduleBuilder──▶ MasterScheduleTable ──▶ MasterScheduler
//!   frames{name → id, length, publisher}      [entry, entry, …] (cyclic)
//!   schedule_tables{name → [(frame, delay)]}
//! ```
//!
//! Building never fails: entries that cannot be resolved are skipped and
//! reported as [`ScheduleDiagnostic`]s.
use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::core::LinBytes;
use crate::error::{ScheduleDiagnostic, ValidationError};
use crate::protocol::frame::{ChecksumMode, DataLength, FrameId, ProtectedId, ProtocolVersion};
use crate::protocol::transport::DEFAULT_RESPONSE_WAIT_MS;

//==================================================================================DESCRIPTION
/// Decoded LIN description file: nodes, frames and schedule tables.
///
/// Mirrors the structure produced by an LDF parser. With the `serde` feature
/// it deserialises from documents shaped like:
///
/// ```json
/// {
///   "protocol_version": "2.1",
///   "nodes": { "master_node_name": "Gateway", "slave_nodes": ["Door"] },
///   "frames": {
///     "DoorCmd":    { "id": 16, "length": 2, "publisher": "Gateway", "subscribers": ["Door"] },
///     "DoorStatus": { "id": 18, "length": 4, "publisher": "Door" }
///   },
///   "schedule_tables": {
///     "Normal": [ { "frame_name": "DoorCmd", "delay_ms": 10 },
///                 { "frame_name": "DoorStatus", "delay_ms": 10 } ]
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NetworkDescription {
    #[cfg_attr(feature = "serde", serde(default))]
    pub protocol_version: ProtocolVersion,
    #[cfg_attr(feature = "serde", serde(default))]
    pub nodes: NodesDescription,
    #[cfg_attr(feature = "serde", serde(default))]
    pub frames: BTreeMap<String, FrameDefinition>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub schedule_tables: BTreeMap<String, Vec<ScheduleSlotDefinition>>,
}

/// Node section of the description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodesDescription {
    #[cfg_attr(feature = "serde", serde(default))]
    pub master_node_name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub slave_nodes: Vec<String>,
}

/// Unconditional frame as declared in the description.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameDefinition {
    /// Raw frame identifier (validated when used).
    pub id: u8,
    /// Data field length in bytes (validated when used).
    pub length: usize,
    /// Node publishing the response.
    pub publisher: String,
    /// Nodes consuming the response.
    #[cfg_attr(feature = "serde", serde(default))]
    pub subscribers: Vec<String>,
    /// Explicit checksum model; derived from the protocol version otherwise.
    #[cfg_attr(feature = "serde", serde(default))]
    pub checksum: Option<ChecksumMode>,
}

impl FrameDefinition {
    pub fn new(id: u8, length: usize, publisher: &str) -> Self {
        Self {
            id,
            length,
            publisher: publisher.to_string(),
            subscribers: Vec::new(),
            checksum: None,
        }
    }

    pub fn with_subscribers(mut self, subscribers: &[&str]) -> Self {
        self.subscribers = subscribers.iter().map(|name| name.to_string()).collect();
        self
    }

    pub fn with_checksum(mut self, mode: ChecksumMode) -> Self {
        self.checksum = Some(mode);
        self
    }
}

/// One line of a schedule table: a frame and the delay before it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScheduleSlotDefinition {
    pub frame_name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub delay_ms: u32,
}

impl ScheduleSlotDefinition {
    pub fn new(frame_name: &str, delay_ms: u32) -> Self {
        Self {
            frame_name: frame_name.to_string(),
            delay_ms,
        }
    }
}

impl NetworkDescription {
    /// Empty description for a network running `version`.
    pub fn new(version: ProtocolVersion) -> Self {
        Self {
            protocol_version: version,
            ..Self::default()
        }
    }

    pub fn with_master(mut self, name: &str) -> Self {
        self.nodes.master_node_name = name.to_string();
        self
    }

    pub fn with_slave(mut self, name: &str) -> Self {
        self.nodes.slave_nodes.push(name.to_string());
        self
    }

    pub fn with_frame(mut self, name: &str, frame: FrameDefinition) -> Self {
        self.frames.insert(name.to_string(), frame);
        self
    }

    pub fn with_schedule_table(mut self, name: &str, slots: Vec<ScheduleSlotDefinition>) -> Self {
        self.schedule_tables.insert(name.to_string(), slots);
        self
    }

    /// Checksum model of `frame`: explicit value, or the one mandated by the
    /// protocol version.
    pub fn checksum_mode(&self, frame_id: FrameId, frame: &FrameDefinition) -> ChecksumMode {
        frame
            .checksum
            .unwrap_or_else(|| ChecksumMode::for_frame(frame_id, self.protocol_version))
    }
}

//==================================================================================SCHEDULE_TYPES
/// Direction of a slot, from the master's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// The master publishes the response itself.
    Transmit,
    /// A slave publishes the response; the master listens.
    Receive,
}

/// One frame occurrence in a schedule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameSlot {
    pid: ProtectedId,
    direction: Direction,
    data_length: DataLength,
    checksum_mode: ChecksumMode,
    data: LinBytes,
}

impl FrameSlot {
    /// Slot published by the master with `data` as response (2, 4 or 8 bytes).
    pub fn transmit(
        pid: ProtectedId,
        data: &[u8],
        checksum_mode: ChecksumMode,
    ) -> Result<Self, ValidationError> {
        let data_length = DataLength::try_from(data.len())?;
        Ok(Self {
            pid,
            direction: Direction::Transmit,
            data_length,
            checksum_mode,
            data: LinBytes::from_slice(data),
        })
    }

    /// Slot whose `data_length` byte response comes from a slave.
    pub fn receive(pid: ProtectedId, data_length: DataLength, checksum_mode: ChecksumMode) -> Self {
        Self {
            pid,
            direction: Direction::Receive,
            data_length,
            checksum_mode,
            data: LinBytes::new(),
        }
    }

    #[inline]
    pub fn pid(&self) -> ProtectedId {
        self.pid
    }

    #[inline]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    #[inline]
    pub fn data_length(&self) -> DataLength {
        self.data_length
    }

    #[inline]
    pub fn checksum_mode(&self) -> ChecksumMode {
        self.checksum_mode
    }

    /// Data to send; `None` for receive slots.
    pub fn data(&self) -> Option<&[u8]> {
        match self.direction {
            Direction::Transmit => Some(self.data.as_slice()),
            Direction::Receive => None,
        }
    }
}

/// A slot plus its timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScheduleTableEntry {
    pub slot: FrameSlot,
    /// Delay after the previous dispatch before this slot becomes eligible.
    pub offset_ms: u32,
    /// Receive slots only: how long to wait for the slave response.
    pub response_wait_ms: u32,
}

/// Ordered, cyclic schedule. Replaced wholesale, never edited in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MasterScheduleTable {
    name: String,
    entries: Vec<ScheduleTableEntry>,
}

impl MasterScheduleTable {
    pub fn new(name: &str, entries: Vec<ScheduleTableEntry>) -> Self {
        Self {
            name: name.to_string(),
            entries,
        }
    }

    pub fn empty(name: &str) -> Self {
        Self::new(name, Vec::new())
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn entries(&self) -> &[ScheduleTableEntry] {
        &self.entries
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&ScheduleTableEntry> {
        self.entries.get(index)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of every slot offset: duration of one full cycle when no slot
    /// waits for a response.
    pub fn cycle_time_ms(&self) -> u32 {
        self.entries
            .iter()
            .fold(0u32, |acc, entry| acc.saturating_add(entry.offset_ms))
    }
}

/// Every schedule table of a description, by name.
pub type MasterFrameTable = BTreeMap<String, MasterScheduleTable>;

//==================================================================================BUILDER
/// Result of a build: the table plus what was skipped along the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleBuild {
    pub table: MasterScheduleTable,
    pub diagnostics: Vec<ScheduleDiagnostic>,
}

/// Converts a [`NetworkDescription`] into master schedule tables.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleBuilder<'a> {
    description: &'a NetworkDescription,
    master_node_name: &'a str,
    default_response_wait_ms: u32,
}

impl<'a> ScheduleBuilder<'a> {
    /// `master_node_name` decides the direction of every slot: frames it
    /// publishes become transmit slots, the others receive slots.
    pub fn new(description: &'a NetworkDescription, master_node_name: &'a str) -> Self {
        Self {
            description,
            master_node_name,
            default_response_wait_ms: DEFAULT_RESPONSE_WAIT_MS,
        }
    }

    /// Response window applied to every receive slot.
    pub fn with_default_response_wait(mut self, millis: u32) -> Self {
        self.default_response_wait_ms = millis;
        self
    }

    /// Build `table_name`, collecting diagnostics instead of failing.
    ///
    /// An empty name yields an empty table without diagnostics; an unknown
    /// name yields an empty table and a [`ScheduleDiagnostic::TableNotFound`].
    pub fn build_with_diagnostics(&self, table_name: &str) -> ScheduleBuild {
        let mut diagnostics = Vec::new();

        if table_name.is_empty() {
            return ScheduleBuild {
                table: MasterScheduleTable::empty(table_name),
                diagnostics,
            };
        }

        let Some(slots) = self.description.schedule_tables.get(table_name) else {
            diagnostics.push(ScheduleDiagnostic::TableNotFound {
                table: table_name.to_string(),
            });
            return ScheduleBuild {
                table: MasterScheduleTable::empty(table_name),
                diagnostics,
            };
        };

        let mut entries = Vec::with_capacity(slots.len());
        for slot_definition in slots {
            let Some(frame) = self.description.frames.get(&slot_definition.frame_name) else {
                diagnostics.push(ScheduleDiagnostic::UnknownFrame {
                    table: table_name.to_string(),
                    frame: slot_definition.frame_name.clone(),
                });
                continue;
            };

            match self.resolve_slot(frame) {
                Ok(slot) => entries.push(ScheduleTableEntry {
                    slot,
                    offset_ms: slot_definition.delay_ms,
                    response_wait_ms: self.default_response_wait_ms,
                }),
                Err(reason) => diagnostics.push(ScheduleDiagnostic::InvalidFrameDefinition {
                    frame: slot_definition.frame_name.clone(),
                    reason,
                }),
            }
        }

        ScheduleBuild {
            table: MasterScheduleTable::new(table_name, entries),
            diagnostics,
        }
    }

    /// Build `table_name`, logging diagnostics.
    pub fn build(&self, table_name: &str) -> MasterScheduleTable {
        let build = self.build_with_diagnostics(table_name);
        for _diagnostic in &build.diagnostics {
            #[cfg(feature = "defmt")]
            log_diagnostic(_diagnostic);
        }
        build.table
    }

    /// Build every table of the description.
    pub fn build_all(&self) -> MasterFrameTable {
        self.description
            .schedule_tables
            .keys()
            .map(|name| (name.clone(), self.build(name)))
            .collect()
    }

    /// Turn a frame definition into a slot from the master's perspective.
    fn resolve_slot(&self, frame: &FrameDefinition) -> Result<FrameSlot, ValidationError> {
        let frame_id = FrameId::new(frame.id)?;
        let data_length = DataLength::try_from(frame.length)?;
        let pid = frame_id.pid();
        let checksum_mode = self.description.checksum_mode(frame_id, frame);

        if frame.publisher == self.master_node_name {
            // Signal initial values are applied by the application layer.
            let initial = LinBytes::zeroed(data_length.bytes());
            FrameSlot::transmit(pid, initial.as_slice(), checksum_mode)
        } else {
            Ok(FrameSlot::receive(pid, data_length, checksum_mode))
        }
    }
}

/// Build one schedule table from `description`.
///
/// Unresolvable entries are skipped (and logged); an empty or unknown
/// `table_name` produces an empty table.
pub fn build_schedule_table(
    description: &NetworkDescription,
    master_node_name: &str,
    table_name: &str,
    default_response_wait_ms: u32,
) -> MasterScheduleTable {
    ScheduleBuilder::new(description, master_node_name)
        .with_default_response_wait(default_response_wait_ms)
        .build(table_name)
}

#[cfg(feature = "defmt")]
fn log_diagnostic(diagnostic: &ScheduleDiagnostic) {
    match diagnostic {
        ScheduleDiagnostic::TableNotFound { table } => {
            defmt::warn!("Schedule table '{=str}' not found", table.as_str());
        }
        ScheduleDiagnostic::UnknownFrame { table, frame } => {
            defmt::warn!(
                "Frame '{=str}' in schedule table '{=str}' not defined, skipped",
                frame.as_str(),
                table.as_str()
            );
        }
        ScheduleDiagnostic::InvalidFrameDefinition { frame, reason } => {
            defmt::warn!(
                "Frame '{=str}' has an invalid definition ({}), skipped",
                frame.as_str(),
                reason
            );
        }
    }
}
