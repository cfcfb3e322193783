//! LIN master scheduler: walks the active schedule table cyclically and tells
//! the host which header to emit and when.
//!
//! ```text
//!            elapsed >= offset (transmit slot)
//!   ┌──────┐ ─────────────────────────────────▶ ┌──────────────────┐
//!   │ Idle │                                     │ TransmittingData │
//!   └──────┘ ◀───────────────────────────────── └──────────────────┘
//!     │  ▲        transmit_done / next tick (advance)
//!     │  │
//!     │  │ handle_rx_data / response timeout (advance)
//!     │  │
//!     ▼  │   elapsed >= offset (receive slot)
//!   ┌───────────────────┐
//!   │ AwaitingSlaveData │
//!   └───────────────────┘
//! ```
//!
//! The scheduler is a pure state machine: it performs no I/O and never
//! blocks. Each call returns the [`MasterEvent`] the transport has to carry
//! out, if any. [`runner`] wires it to a [`LinBus`](crate::protocol::transport::traits::lin_bus::LinBus).
use crate::core::{LinBytes, LinMessage};
use crate::protocol::frame::{compute_checksum, ChecksumMode, Pdu, ProtectedId};
use crate::protocol::schedule::{Direction, MasterScheduleTable, ScheduleTableEntry};

pub mod runner;

//==================================================================================STATE
/// Position of the scheduler within the current slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MasterState {
    /// Counting down the offset of the current slot.
    #[default]
    Idle,
    /// The current slot's frame has been handed to the transport.
    TransmittingData,
    /// Header sent, waiting for the slave response of the current slot.
    AwaitingSlaveData,
}

/// Action or outcome reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MasterEvent {
    /// Send a complete frame (header and master-published response).
    Transmit {
        pid: ProtectedId,
        data: LinBytes,
        checksum_mode: ChecksumMode,
    },
    /// Send the header for `pid` and arm reception of a slave response.
    PrepareReceive {
        pid: ProtectedId,
        expected_length: usize,
        checksum_mode: ChecksumMode,
    },
    /// Slave answered with the expected number of bytes.
    ResponseReceived { pid: ProtectedId, data: LinBytes },
    /// Slave answered with a wrong number of bytes.
    ResponseRejected {
        pid: ProtectedId,
        expected_length: usize,
        received_length: usize,
    },
    /// Slave answered with a checksum that does not match its data.
    ResponseChecksumMismatch {
        pid: ProtectedId,
        expected_checksum: u8,
        received_checksum: u8,
    },
    /// No response within the slot's response window.
    ResponseTimeout { pid: ProtectedId },
}

//==================================================================================SCHEDULER
/// Timer-driven master schedule.
///
/// `time_since_last_frame` accumulates the deltas fed to
/// [`handle_timing`](Self::handle_timing) and restarts from zero whenever a
/// new slot becomes current.
#[derive(Debug, Clone)]
pub struct MasterScheduler {
    table: MasterScheduleTable,
    state: MasterState,
    index: usize,
    time_since_last_frame: u32,
    asleep: bool,
}

impl MasterScheduler {
    /// Start in `Idle` with the first entry of `table` as current slot.
    pub fn new(table: MasterScheduleTable) -> Self {
        Self {
            table,
            state: MasterState::Idle,
            index: 0,
            time_since_last_frame: 0,
            asleep: false,
        }
    }

    /// Feed `elapsed_ms` of wall-clock time.
    ///
    /// Returns the event to execute when the current slot fires, or a
    /// [`MasterEvent::ResponseTimeout`] when a slave stayed silent for longer
    /// than the slot's response window. Does nothing while asleep or with an
    /// empty table.
    pub fn handle_timing(&mut self, elapsed_ms: u32) -> Option<MasterEvent> {
        if self.asleep || self.table.is_empty() {
            return None;
        }

        // The frame handed out at the previous tick is on the bus by now.
        if self.state == MasterState::TransmittingData {
            self.advance();
        }

        self.time_since_last_frame = self.time_since_last_frame.saturating_add(elapsed_ms);
        let entry = *self.table.get(self.index)?;

        match self.state {
            MasterState::Idle if self.time_since_last_frame >= entry.offset_ms => {
                Some(self.fire(&entry))
            }
            MasterState::AwaitingSlaveData
                if self.time_since_last_frame >= entry.response_wait_ms =>
            {
                let pid = entry.slot.pid();
                #[cfg(feature = "defmt")]
                defmt::warn!(
                    "No response for PID {=u8:#X} within {=u32} ms",
                    pid.raw(),
                    entry.response_wait_ms
                );
                self.advance();
                Some(MasterEvent::ResponseTimeout { pid })
            }
            _ => None,
        }
    }

    /// Acknowledge that the frame of the current transmit slot left the bus.
    pub fn transmit_done(&mut self) {
        if self.state == MasterState::TransmittingData {
            self.advance();
        }
    }

    /// Deliver the response bytes (checksum excluded) of the awaited slot.
    ///
    /// Ignored unless the scheduler is waiting for slave data. The slot is
    /// consumed either way: a response of the wrong length is reported as
    /// [`MasterEvent::ResponseRejected`].
    pub fn handle_rx_data(&mut self, data: &[u8]) -> Option<MasterEvent> {
        if self.state != MasterState::AwaitingSlaveData {
            #[cfg(feature = "defmt")]
            defmt::debug!("Unexpected slave data ignored ({=usize} bytes)", data.len());
            return None;
        }

        let entry = *self.table.get(self.index)?;
        let pid = entry.slot.pid();
        let expected_length = entry.slot.data_length().bytes();
        self.advance();

        if data.len() == expected_length {
            Some(MasterEvent::ResponseReceived {
                pid,
                data: LinBytes::from_slice(data),
            })
        } else {
            #[cfg(feature = "defmt")]
            defmt::warn!(
                "Response for PID {=u8:#X} rejected: {=usize} bytes, expected {=usize}",
                pid.raw(),
                data.len(),
                expected_length
            );
            Some(MasterEvent::ResponseRejected {
                pid,
                expected_length,
                received_length: data.len(),
            })
        }
    }

    /// Deliver a response as read from the transport.
    ///
    /// When the message carries its checksum byte, it is checked against the
    /// slot's checksum mode first; a mismatch consumes the slot and is
    /// reported as [`MasterEvent::ResponseChecksumMismatch`]. Otherwise this
    /// behaves like [`handle_rx_data`](Self::handle_rx_data).
    pub fn handle_rx_message(&mut self, message: &LinMessage) -> Option<MasterEvent> {
        if self.state == MasterState::AwaitingSlaveData {
            if let (Some(received_checksum), Some(entry)) =
                (message.checksum, self.table.get(self.index).copied())
            {
                let pid = entry.slot.pid();
                let expected_checksum =
                    compute_checksum(pid, message.data(), entry.slot.checksum_mode());
                if message.dlc() == entry.slot.data_length().bytes()
                    && received_checksum != expected_checksum
                {
                    #[cfg(feature = "defmt")]
                    defmt::warn!(
                        "Response for PID {=u8:#X} rejected: checksum {=u8:#X}, expected {=u8:#X}",
                        pid.raw(),
                        received_checksum,
                        expected_checksum
                    );
                    self.advance();
                    return Some(MasterEvent::ResponseChecksumMismatch {
                        pid,
                        expected_checksum,
                        received_checksum,
                    });
                }
            }
        }
        self.handle_rx_data(message.data())
    }

    /// Suspend the schedule and return the go-to-sleep frame to send.
    ///
    /// The table position is kept: the sleep command is not a table slot and
    /// can be repeated.
    pub fn go_to_sleep(&mut self) -> MasterEvent {
        #[cfg(feature = "defmt")]
        defmt::info!("Master going to sleep");

        self.state = MasterState::Idle;
        self.time_since_last_frame = 0;
        self.asleep = true;

        let pdu = Pdu::sleep_command();
        MasterEvent::Transmit {
            pid: pdu.pid(),
            data: pdu.bytes(),
            checksum_mode: pdu.checksum_mode(),
        }
    }

    /// Resume cycling from the next slot.
    pub fn wakeup(&mut self) {
        #[cfg(feature = "defmt")]
        defmt::info!("Master waking up");

        self.asleep = false;
        self.advance();
    }

    /// Replace the active table wholesale and restart from its first entry.
    pub fn set_table(&mut self, table: MasterScheduleTable) {
        #[cfg(feature = "defmt")]
        defmt::info!(
            "Switching to schedule table '{=str}' ({=usize} entries)",
            table.name(),
            table.len()
        );

        self.table = table;
        self.index = 0;
        self.state = MasterState::Idle;
        self.time_since_last_frame = 0;
    }

    #[inline]
    pub fn state(&self) -> MasterState {
        self.state
    }

    #[inline]
    pub fn current_index(&self) -> usize {
        self.index
    }

    /// Entry currently counted down or in progress; `None` for an empty table.
    #[inline]
    pub fn current_entry(&self) -> Option<&ScheduleTableEntry> {
        self.table.get(self.index)
    }

    #[inline]
    pub fn table(&self) -> &MasterScheduleTable {
        &self.table
    }

    #[inline]
    pub fn is_asleep(&self) -> bool {
        self.asleep
    }

    #[inline]
    pub fn time_since_last_frame(&self) -> u32 {
        self.time_since_last_frame
    }

    fn fire(&mut self, entry: &ScheduleTableEntry) -> MasterEvent {
        let pid = entry.slot.pid();
        self.time_since_last_frame = 0;

        match entry.slot.direction() {
            Direction::Transmit => {
                #[cfg(feature = "defmt")]
                defmt::trace!("Slot {=usize}: transmit PID {=u8:#X}", self.index, pid.raw());

                self.state = MasterState::TransmittingData;
                MasterEvent::Transmit {
                    pid,
                    data: entry.slot.data().map(LinBytes::from_slice).unwrap_or_default(),
                    checksum_mode: entry.slot.checksum_mode(),
                }
            }
            Direction::Receive => {
                #[cfg(feature = "defmt")]
                defmt::trace!("Slot {=usize}: header PID {=u8:#X}", self.index, pid.raw());

                self.state = MasterState::AwaitingSlaveData;
                MasterEvent::PrepareReceive {
                    pid,
                    expected_length: entry.slot.data_length().bytes(),
                    checksum_mode: entry.slot.checksum_mode(),
                }
            }
        }
    }

    fn advance(&mut self) {
        if !self.table.is_empty() {
            self.index = (self.index + 1) % self.table.len();
        }
        self.state = MasterState::Idle;
        self.time_since_last_frame = 0;
    }
}
