//! # Quickstart Example
//!
//! Minimal example demonstrating the basics of korri-lin:
//! - Compute protected identifiers and checksums
//! - Build a master schedule from a network description
//! - Drive the scheduler with elapsed time
//! - Parse the resulting byte stream on a slave node
//!
//! This example uses `std` for a quick trial run.
//!
//! ```bash
//! cargo run --example quickstart
//! ```

use korri_lin::core::BusInput;
use korri_lin::protocol::frame::{ChecksumMode, DataLength, FrameId, Pdu, ProtocolVersion};
use korri_lin::protocol::master::{MasterEvent, MasterScheduler};
use korri_lin::protocol::schedule::{
    FrameDefinition, NetworkDescription, ScheduleBuilder, ScheduleSlotDefinition,
};
use korri_lin::protocol::slave::{SlaveEvent, SlaveFrameRegistry, SlaveStateMachine};
use korri_lin::protocol::transport::SYNC_BYTE;

fn main() {
    println!("=== korri-lin Quickstart ===\n");

    // ======================================================================
    // 1. Protected identifiers and checksums
    // ======================================================================
    println!("1. Frame model");

    let frame_id = FrameId::new(0x10).expect("0x10 is a valid frame id");
    let pdu = Pdu::new(frame_id.raw(), &[0x01, 0x02], ChecksumMode::Enhanced)
        .expect("two data bytes are valid");
    println!("   Frame id {:#04X} -> PID {:#04X}", frame_id.raw(), pdu.pid().raw());
    println!("   Enhanced checksum: {:#04X}", pdu.checksum());

    let (wire, len) = pdu.to_wire();
    print!("   On the wire after break + sync: ");
    for byte in &wire[..len] {
        print!("{:02X} ", byte);
    }
    println!("\n");

    // ======================================================================
    // 2. Schedule table from a network description
    // ======================================================================
    println!("2. Building the schedule");

    let description = NetworkDescription::new(ProtocolVersion::V2_1)
        .with_master("Gateway")
        .with_slave("Door")
        .with_frame(
            "DoorCmd",
            FrameDefinition::new(0x10, 2, "Gateway").with_subscribers(&["Door"]),
        )
        .with_frame(
            "DoorStatus",
            FrameDefinition::new(0x12, 4, "Door").with_subscribers(&["Gateway"]),
        )
        .with_schedule_table(
            "Normal",
            vec![
                ScheduleSlotDefinition::new("DoorCmd", 10),
                ScheduleSlotDefinition::new("DoorStatus", 10),
            ],
        );

    let table = ScheduleBuilder::new(&description, "Gateway")
        .with_default_response_wait(5)
        .build("Normal");
    for (index, entry) in table.entries().iter().enumerate() {
        println!(
            "   Slot {}: PID {:#04X} {:?}, {} ms",
            index,
            entry.slot.pid().raw(),
            entry.slot.direction(),
            entry.offset_ms
        );
    }
    println!();

    // ======================================================================
    // 3. Drive master and slave together
    // ======================================================================
    println!("3. Running one schedule cycle");

    let mut master = MasterScheduler::new(table);
    let registry = SlaveFrameRegistry::from_description(&description, "Door");
    let mut door = SlaveStateMachine::new(registry);

    for now in 1..=20u32 {
        match master.handle_timing(1) {
            Some(MasterEvent::Transmit { pid, data, checksum_mode }) => {
                println!("   t={:>2} ms  master transmits PID {:#04X}", now, pid.raw());
                let pdu = Pdu::padded(
                    pid.frame_id(),
                    data.as_slice(),
                    data_length(data.len()),
                    checksum_mode,
                );
                let (wire, len) = pdu.to_wire();
                let inputs = [BusInput::Break, BusInput::Byte(SYNC_BYTE)]
                    .into_iter()
                    .chain(wire[..len].iter().map(|&byte| BusInput::Byte(byte)));
                for input in inputs {
                    if let Some(SlaveEvent::FrameReceived(frame)) = door.feed(input) {
                        println!("            door received {:02X?}", frame.data());
                    }
                }
                master.transmit_done();
            }
            Some(MasterEvent::PrepareReceive { pid, .. }) => {
                println!("   t={:>2} ms  master polls PID {:#04X}", now, pid.raw());
                door.feed(BusInput::Break);
                door.feed(BusInput::Byte(SYNC_BYTE));
                if let Some(SlaveEvent::ResponseRequested(request)) =
                    door.feed(BusInput::Byte(pid.raw()))
                {
                    let status = [0x01, 0x00, 0x00, 0x42];
                    println!(
                        "            door answers {:02X?} (checksum {:#04X})",
                        status,
                        request.checksum(&status)
                    );
                    door.transmit_complete(true);
                    if let Some(event) = master.handle_rx_data(&status) {
                        println!("            master: {:?}", event);
                    }
                }
            }
            _ => {}
        }
    }

    println!("\n=== Done ===");
}

/// Scheduled frames always carry 2, 4 or 8 bytes.
fn data_length(len: usize) -> DataLength {
    DataLength::try_from(len).unwrap_or(DataLength::Eight)
}
