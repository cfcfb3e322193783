//! Master runner scenarios on a simulated bus: schedule execution, slave
//! responses and timeouts, and the command channel (table switch, sleep,
//! wakeup).
mod helpers {
    include!("helpers/mod.rs");
}

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use helpers::{BusRecord, MockLinBus, MockTimer};
use korri_lin::core::LinBytes;
use korri_lin::error::MasterRunError;
use korri_lin::protocol::frame::{
    compute_checksum, ChecksumMode, FrameId, ProtocolVersion, SLEEP_COMMAND,
};
use korri_lin::protocol::master::runner::{MasterCommand, MasterService};
use korri_lin::protocol::master::{MasterEvent, MasterScheduler};
use korri_lin::protocol::schedule::{
    build_schedule_table, FrameDefinition, MasterScheduleTable, NetworkDescription,
    ScheduleSlotDefinition,
};
use static_cell::StaticCell;
use tokio::time::{timeout, Duration, Instant};

type CommandChannel = Channel<CriticalSectionRawMutex, MasterCommand, 4>;
type ResponseChannel = Channel<CriticalSectionRawMutex, MasterEvent, 4>;

static RESPONSES_IN_ORDER: StaticCell<ResponseChannel> = StaticCell::new();
static RESPONSES_TIMEOUT: StaticCell<ResponseChannel> = StaticCell::new();
static COMMANDS_SLEEP: StaticCell<CommandChannel> = StaticCell::new();
static COMMANDS_SWITCH: StaticCell<CommandChannel> = StaticCell::new();
static RESPONSES_CLASSIC: StaticCell<ResponseChannel> = StaticCell::new();

fn pid(id: u8) -> u8 {
    FrameId::new(id).unwrap().pid().raw()
}

/// Gateway sends `DoorCmd` then polls `DoorStatus`, 10 ms apart.
fn door_network() -> NetworkDescription {
    NetworkDescription::new(ProtocolVersion::V2_1)
        .with_master("Gateway")
        .with_slave("Door")
        .with_frame(
            "DoorCmd",
            FrameDefinition::new(0x10, 2, "Gateway").with_subscribers(&["Door"]),
        )
        .with_frame("DoorStatus", FrameDefinition::new(0x12, 4, "Door"))
        .with_frame("SeatCmd", FrameDefinition::new(0x20, 2, "Gateway"))
        .with_schedule_table(
            "Normal",
            vec![
                ScheduleSlotDefinition::new("DoorCmd", 10),
                ScheduleSlotDefinition::new("DoorStatus", 10),
            ],
        )
        .with_schedule_table("Seat", vec![ScheduleSlotDefinition::new("SeatCmd", 5)])
}

/// Same cluster on a LIN 1.3 network: every frame uses the classic checksum.
fn legacy_door_network() -> NetworkDescription {
    let mut description = door_network();
    description.protocol_version = ProtocolVersion::V1_3;
    description
}

fn table(name: &str) -> MasterScheduleTable {
    build_schedule_table(&door_network(), "Gateway", name, 5)
}

#[tokio::test(start_paused = true)]
async fn master_runs_schedule_in_order() {
    let responses_channel = RESPONSES_IN_ORDER.init(Channel::new());
    let (bus, mut host) = MockLinBus::create_pair();

    let parts = MasterService::<_, _, 1, 4>::new(
        MasterScheduler::new(table("Normal")),
        bus,
        MockTimer,
        None,
        Some(&*responses_channel),
    )
    .into_parts();
    assert!(parts.handle.is_none());
    let mut responses = parts
        .responses
        .expect("receiver must exist when a response channel is provided");
    let runner = parts.runner.drive();
    tokio::pin!(runner);

    tokio::select! {
        result = &mut runner => {
            panic!("master runner ended unexpectedly: {:?}", result);
        }
        _ = async {
            let start = Instant::now();
            assert_eq!(
                host.recv().await,
                Some(BusRecord::Transmit { pid: pid(0x10), data: vec![0, 0], checksum_mode: ChecksumMode::Enhanced })
            );
            assert!(start.elapsed() >= Duration::from_millis(10));

            assert_eq!(
                host.recv().await,
                Some(BusRecord::PrepareReceive {
                    pid: pid(0x12),
                    expected_length: 4,
                    checksum_mode: ChecksumMode::Enhanced,
                })
            );
            assert!(start.elapsed() >= Duration::from_millis(20));
            host.respond(&[0xDE, 0xAD, 0xBE, 0xEF]);

            assert_eq!(
                responses.recv().await,
                MasterEvent::ResponseReceived {
                    pid: FrameId::new(0x12).unwrap().pid(),
                    data: LinBytes::from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]),
                }
            );

            // Cyclic: back to the first slot.
            assert_eq!(
                host.recv().await,
                Some(BusRecord::Transmit { pid: pid(0x10), data: vec![0, 0], checksum_mode: ChecksumMode::Enhanced })
            );
        } => {}
    }
}

#[tokio::test(start_paused = true)]
async fn master_reports_silent_slave_and_moves_on() {
    let responses_channel = RESPONSES_TIMEOUT.init(Channel::new());
    let (bus, mut host) = MockLinBus::create_pair();

    let parts = MasterService::<_, _, 1, 4>::new(
        MasterScheduler::new(table("Normal")),
        bus,
        MockTimer,
        None,
        Some(&*responses_channel),
    )
    .into_parts();
    let mut responses = parts.responses.expect("receiver must exist");
    let runner = parts.runner.drive();
    tokio::pin!(runner);

    tokio::select! {
        result = &mut runner => {
            panic!("master runner ended unexpectedly: {:?}", result);
        }
        _ = async {
            assert!(matches!(host.recv().await, Some(BusRecord::Transmit { .. })));
            assert!(matches!(host.recv().await, Some(BusRecord::PrepareReceive { .. })));

            // Nobody answers.
            let waited_from = Instant::now();
            assert_eq!(
                responses.recv().await,
                MasterEvent::ResponseTimeout { pid: FrameId::new(0x12).unwrap().pid() }
            );
            assert!(waited_from.elapsed() >= Duration::from_millis(5));

            assert_eq!(
                host.recv().await,
                Some(BusRecord::Transmit { pid: pid(0x10), data: vec![0, 0], checksum_mode: ChecksumMode::Enhanced })
            );
        } => {}
    }
}

#[tokio::test(start_paused = true)]
async fn master_sleeps_and_wakes_up_on_command() {
    let command_channel = COMMANDS_SLEEP.init(Channel::new());
    let (bus, mut host) = MockLinBus::create_pair();

    let parts = MasterService::<_, _, 4, 1>::new(
        MasterScheduler::new(table("Normal")),
        bus,
        MockTimer,
        Some(&*command_channel),
        None,
    )
    .into_parts();
    let handle = parts
        .handle
        .expect("handle must exist when a command channel is provided");
    let runner = parts.runner.drive();
    tokio::pin!(runner);

    tokio::select! {
        result = &mut runner => {
            panic!("master runner ended unexpectedly: {:?}", result);
        }
        _ = async {
            assert_eq!(
                host.recv().await,
                Some(BusRecord::Transmit { pid: pid(0x10), data: vec![0, 0], checksum_mode: ChecksumMode::Enhanced })
            );

            handle.go_to_sleep().await;
            assert_eq!(
                host.recv().await,
                Some(BusRecord::Transmit {
                    pid: 0x3C,
                    data: SLEEP_COMMAND.to_vec(),
                    checksum_mode: ChecksumMode::Classic,
                })
            );

            // Schedule suspended.
            assert!(timeout(Duration::from_millis(200), host.recv()).await.is_err());

            handle.wakeup().await;
            assert_eq!(host.recv().await, Some(BusRecord::Wakeup));
            // The slot interrupted by the sleep command is skipped.
            assert_eq!(
                host.recv().await,
                Some(BusRecord::Transmit { pid: pid(0x10), data: vec![0, 0], checksum_mode: ChecksumMode::Enhanced })
            );
        } => {}
    }
}

#[tokio::test(start_paused = true)]
async fn master_switches_table_between_slots() {
    let command_channel = COMMANDS_SWITCH.init(Channel::new());
    let (bus, mut host) = MockLinBus::create_pair();

    let parts = MasterService::<_, _, 4, 1>::new(
        MasterScheduler::new(table("Normal")),
        bus,
        MockTimer,
        Some(&*command_channel),
        None,
    )
    .into_parts();
    let handle = parts.handle.expect("handle must exist");
    let runner = parts.runner.drive();
    tokio::pin!(runner);

    tokio::select! {
        result = &mut runner => {
            panic!("master runner ended unexpectedly: {:?}", result);
        }
        _ = async {
            assert!(matches!(host.recv().await, Some(BusRecord::Transmit { .. })));

            handle.switch_table(table("Seat")).await;
            for _ in 0..3 {
                assert_eq!(
                    host.recv().await,
                    Some(BusRecord::Transmit { pid: pid(0x20), data: vec![0, 0], checksum_mode: ChecksumMode::Enhanced })
                );
            }
        } => {}
    }
}

#[tokio::test(start_paused = true)]
async fn master_stops_on_transport_failure() {
    let (bus, host) = MockLinBus::create_pair();
    drop(host);

    let parts = MasterService::<_, _, 1, 1>::new(
        MasterScheduler::new(table("Normal")),
        bus,
        MockTimer,
        None,
        None,
    )
    .into_parts();

    let result = parts.runner.drive().await;
    assert!(matches!(result, Err(MasterRunError::Transmit(()))));
}

#[tokio::test(start_paused = true)]
/// One `step` per tick: nothing happens until the slot offset is reached.
async fn master_step_by_step() {
    let (bus, mut host) = MockLinBus::create_pair();
    let parts = MasterService::<_, _, 1, 1>::new(
        MasterScheduler::new(table("Normal")),
        bus,
        MockTimer,
        None,
        None,
    )
    .with_tick_ms(5)
    .into_parts();
    let mut runner = parts.runner;

    runner.step().await.expect("tick must succeed");
    assert_eq!(runner.scheduler().time_since_last_frame(), 5);
    assert!(timeout(Duration::from_millis(1), host.recv()).await.is_err());

    runner.step().await.expect("tick must succeed");
    assert_eq!(
        host.recv().await,
        Some(BusRecord::Transmit { pid: pid(0x10), data: vec![0, 0], checksum_mode: ChecksumMode::Enhanced })
    );
    assert_eq!(runner.scheduler().current_index(), 1);
}

#[tokio::test(start_paused = true)]
/// LIN 1.3 frames reach the bus in classic mode and responses are checked with it.
async fn master_uses_classic_checksum_on_legacy_network() {
    let responses_channel = RESPONSES_CLASSIC.init(Channel::new());
    let (bus, mut host) = MockLinBus::create_pair();

    let parts = MasterService::<_, _, 1, 4>::new(
        MasterScheduler::new(build_schedule_table(&legacy_door_network(), "Gateway", "Normal", 5)),
        bus,
        MockTimer,
        None,
        Some(&*responses_channel),
    )
    .into_parts();
    let mut responses = parts.responses.expect("receiver must exist");
    let runner = parts.runner.drive();
    tokio::pin!(runner);

    let status_pid = FrameId::new(0x12).unwrap().pid();
    let status = [0xDE, 0xAD, 0xBE, 0xEF];
    let checksum = compute_checksum(status_pid, &status, ChecksumMode::Classic);

    tokio::select! {
        result = &mut runner => {
            panic!("master runner ended unexpectedly: {:?}", result);
        }
        _ = async {
            assert_eq!(
                host.recv().await,
                Some(BusRecord::Transmit { pid: pid(0x10), data: vec![0, 0], checksum_mode: ChecksumMode::Classic })
            );
            assert_eq!(
                host.recv().await,
                Some(BusRecord::PrepareReceive {
                    pid: pid(0x12),
                    expected_length: 4,
                    checksum_mode: ChecksumMode::Classic,
                })
            );
            host.respond_with_checksum(&status, checksum);
            assert_eq!(
                responses.recv().await,
                MasterEvent::ResponseReceived {
                    pid: status_pid,
                    data: LinBytes::from_slice(&status),
                }
            );

            // Next cycle: the slave corrupts its checksum.
            assert!(matches!(host.recv().await, Some(BusRecord::Transmit { .. })));
            assert!(matches!(host.recv().await, Some(BusRecord::PrepareReceive { .. })));
            host.respond_with_checksum(&status, checksum ^ 0xFF);
            assert_eq!(
                responses.recv().await,
                MasterEvent::ResponseChecksumMismatch {
                    pid: status_pid,
                    expected_checksum: checksum,
                    received_checksum: checksum ^ 0xFF,
                }
            );
        } => {}
    }
}
