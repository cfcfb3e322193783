//! `korri-lin` library: LIN (Local Interconnect Network) data-link logic in a
//! `no_std` environment. The crate exposes the frame model (protected
//! identifiers, classic/enhanced checksums), the schedule-table builder fed by
//! decoded LDF descriptions, the master scheduler and the slave state machine,
//! plus async runners that drive them over a pluggable transport.
#![no_std]
//==================================================================================
extern crate alloc;
//==================================================================================
/// Fixed-size buffers and bus input types shared by every layer.
pub mod core;
/// Construction, protocol, scheduling, and transport errors.
pub mod error;
/// LIN protocol implementation: frames, schedule tables, master and slave
/// state machines, and transport abstraction traits.
pub mod protocol;
//==================================================================================
