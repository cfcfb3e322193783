//! Async driver for [`MasterScheduler`].
//!
//! The runner ticks the scheduler with a [`LinTimer`], performs the frames it
//! asks for on a [`LinBus`] and bounds every slave response with the slot's
//! response window. Two optional channels extend it:
//!
//! * a command handle (`MasterHandle`) to switch tables or put the cluster
//!   to sleep from another task;
//! * a response receiver (`MasterResponses`) yielding slave responses,
//!   rejections (length or checksum) and timeouts.
//!
//! Both channels are pre-allocated by the firmware; the runner only borrows
//! them. Commands are applied between ticks, so a table is never replaced
//! while one of its slots is in flight.
use core::fmt::Debug;

use embassy_sync::{
    blocking_mutex::raw::CriticalSectionRawMutex,
    channel::{Channel, Receiver, Sender},
};
use futures_util::{future::select, future::Either, pin_mut};

use super::{MasterEvent, MasterScheduler};
use crate::error::MasterRunError;
use crate::protocol::schedule::MasterScheduleTable;
use crate::protocol::transport::traits::lin_bus::LinBus;
use crate::protocol::transport::traits::lin_timer::LinTimer;
use crate::protocol::transport::DEFAULT_MASTER_TICK_MS;

/// Commands queued by producer tasks.
#[derive(Debug, Clone)]
pub enum MasterCommand {
    /// Replace the active schedule table.
    SwitchTable(MasterScheduleTable),
    /// Send the go-to-sleep command and suspend the schedule.
    GoToSleep,
    /// Wake the cluster and resume the schedule.
    Wakeup,
}

/// Service assembling the scheduler, the transport and the optional channels.
pub struct MasterService<'a, B, T, const CMD_CAP: usize, const RESP_CAP: usize>
where
    B: LinBus,
    B::Error: Debug,
    T: LinTimer,
{
    scheduler: MasterScheduler,
    bus: B,
    timer: T,
    tick_ms: u32,
    command_channel: Option<&'a Channel<CriticalSectionRawMutex, MasterCommand, CMD_CAP>>,
    response_channel: Option<&'a Channel<CriticalSectionRawMutex, MasterEvent, RESP_CAP>>,
}

impl<'a, B, T, const CMD_CAP: usize, const RESP_CAP: usize> MasterService<'a, B, T, CMD_CAP, RESP_CAP>
where
    B: LinBus,
    B::Error: Debug,
    T: LinTimer,
{
    pub fn new(
        scheduler: MasterScheduler,
        bus: B,
        timer: T,
        command_channel: Option<&'a Channel<CriticalSectionRawMutex, MasterCommand, CMD_CAP>>,
        response_channel: Option<&'a Channel<CriticalSectionRawMutex, MasterEvent, RESP_CAP>>,
    ) -> Self {
        Self {
            scheduler,
            bus,
            timer,
            tick_ms: DEFAULT_MASTER_TICK_MS,
            command_channel,
            response_channel,
        }
    }

    /// Scheduler resolution; every tick feeds `millis` to the scheduler.
    pub fn with_tick_ms(mut self, millis: u32) -> Self {
        self.tick_ms = millis.max(1);
        self
    }

    /// Split into handle/receiver/runner components.
    pub fn into_parts(self) -> MasterServiceParts<'a, B, T, CMD_CAP, RESP_CAP> {
        let handle = self.command_channel.map(|channel| MasterHandle {
            sender: channel.sender(),
        });
        let responses = self.response_channel.map(|channel| MasterResponses {
            receiver: channel.receiver(),
        });
        MasterServiceParts {
            handle,
            responses,
            runner: MasterRunner {
                scheduler: self.scheduler,
                bus: self.bus,
                timer: self.timer,
                tick_ms: self.tick_ms,
                command_channel: self.command_channel,
                response_channel: self.response_channel,
            },
        }
    }
}

/// Bundle returned by [`MasterService::into_parts`].
pub struct MasterServiceParts<'a, B, T, const CMD_CAP: usize, const RESP_CAP: usize>
where
    B: LinBus,
    B::Error: Debug,
    T: LinTimer,
{
    pub handle: Option<MasterHandle<'a, CMD_CAP>>,
    pub responses: Option<MasterResponses<'a, RESP_CAP>>,
    pub runner: MasterRunner<'a, B, T, CMD_CAP, RESP_CAP>,
}

/// Runner that drives the master schedule.
pub struct MasterRunner<'a, B, T, const CMD_CAP: usize, const RESP_CAP: usize>
where
    B: LinBus,
    B::Error: Debug,
    T: LinTimer,
{
    scheduler: MasterScheduler,
    bus: B,
    timer: T,
    tick_ms: u32,
    command_channel: Option<&'a Channel<CriticalSectionRawMutex, MasterCommand, CMD_CAP>>,
    response_channel: Option<&'a Channel<CriticalSectionRawMutex, MasterEvent, RESP_CAP>>,
}

impl<'a, B, T, const CMD_CAP: usize, const RESP_CAP: usize> MasterRunner<'a, B, T, CMD_CAP, RESP_CAP>
where
    B: LinBus,
    B::Error: Debug,
    T: LinTimer,
{
    /// Run the schedule until the transport fails.
    pub async fn drive(mut self) -> Result<(), MasterRunError<B::Error>> {
        loop {
            if let Some(cmd_ch) = self.command_channel {
                if self.scheduler.is_asleep() {
                    // Nothing to schedule: block until someone wakes us up.
                    let command = cmd_ch.receive().await;
                    self.apply_command(command).await?;
                    continue;
                }
                while let Ok(command) = cmd_ch.try_receive() {
                    self.apply_command(command).await?;
                }
            }
            self.step().await?;
        }
    }

    /// Wait one tick, feed it to the scheduler and execute the resulting event.
    pub async fn step(&mut self) -> Result<(), MasterRunError<B::Error>> {
        self.timer.delay_ms(self.tick_ms).await;
        match self.scheduler.handle_timing(self.tick_ms) {
            Some(event) => self.execute(event).await,
            None => Ok(()),
        }
    }

    pub fn scheduler(&self) -> &MasterScheduler {
        &self.scheduler
    }

    async fn execute(&mut self, event: MasterEvent) -> Result<(), MasterRunError<B::Error>> {
        match event {
            MasterEvent::Transmit {
                pid,
                data,
                checksum_mode,
            } => {
                self.bus
                    .transmit(pid, data.as_slice(), checksum_mode)
                    .await
                    .map_err(MasterRunError::Transmit)?;
                self.scheduler.transmit_done();
                Ok(())
            }
            MasterEvent::PrepareReceive {
                pid,
                expected_length,
                checksum_mode,
            } => {
                self.bus
                    .prepare_receive(pid, expected_length, checksum_mode)
                    .await
                    .map_err(MasterRunError::PrepareReceive)?;
                self.await_response().await
            }
            MasterEvent::ResponseReceived { .. }
            | MasterEvent::ResponseRejected { .. }
            | MasterEvent::ResponseChecksumMismatch { .. }
            | MasterEvent::ResponseTimeout { .. } => {
                self.forward(event);
                Ok(())
            }
        }
    }

    /// Race the slave response against the slot's response window.
    async fn await_response(&mut self) -> Result<(), MasterRunError<B::Error>> {
        let wait_ms = self
            .scheduler
            .current_entry()
            .map(|entry| entry.response_wait_ms)
            .unwrap_or_default();

        let outcome = {
            let response = self.bus.recv_response();
            let timeout = self.timer.delay_ms(wait_ms);
            pin_mut!(response);
            pin_mut!(timeout);

            match select(response, timeout).await {
                Either::Left((result, _)) => Some(result),
                Either::Right(_) => None,
            }
        };

        let event = match outcome {
            Some(Ok(message)) => self.scheduler.handle_rx_message(&message),
            Some(Err(err)) => return Err(MasterRunError::Receive(err)),
            None => self.scheduler.handle_timing(wait_ms),
        };
        if let Some(event) = event {
            self.forward(event);
        }
        Ok(())
    }

    async fn apply_command(&mut self, command: MasterCommand) -> Result<(), MasterRunError<B::Error>> {
        match command {
            MasterCommand::SwitchTable(table) => {
                self.scheduler.set_table(table);
                Ok(())
            }
            MasterCommand::GoToSleep => {
                let event = self.scheduler.go_to_sleep();
                if let MasterEvent::Transmit {
                    pid,
                    data,
                    checksum_mode,
                } = event
                {
                    self.bus
                        .transmit(pid, data.as_slice(), checksum_mode)
                        .await
                        .map_err(MasterRunError::Transmit)?;
                }
                Ok(())
            }
            MasterCommand::Wakeup => {
                self.bus.wakeup().await.map_err(MasterRunError::Wakeup)?;
                self.scheduler.wakeup();
                Ok(())
            }
        }
    }

    /// Hand a response outcome to the application without stalling the schedule.
    fn forward(&self, event: MasterEvent) {
        if let Some(resp_ch) = self.response_channel {
            if resp_ch.try_send(event).is_err() {
                #[cfg(feature = "defmt")]
                defmt::warn!("Response channel full, dropping {}", event);
            }
        }
    }
}

/// Command handle (optional).
pub struct MasterHandle<'a, const CMD_CAP: usize> {
    sender: Sender<'a, CriticalSectionRawMutex, MasterCommand, CMD_CAP>,
}

impl<'a, const CMD_CAP: usize> MasterHandle<'a, CMD_CAP> {
    pub async fn switch_table(&self, table: MasterScheduleTable) {
        self.sender.send(MasterCommand::SwitchTable(table)).await;
    }

    pub async fn go_to_sleep(&self) {
        self.sender.send(MasterCommand::GoToSleep).await;
    }

    pub async fn wakeup(&self) {
        self.sender.send(MasterCommand::Wakeup).await;
    }
}

/// Optional receiver returning slave response outcomes.
pub struct MasterResponses<'a, const RESP_CAP: usize> {
    receiver: Receiver<'a, CriticalSectionRawMutex, MasterEvent, RESP_CAP>,
}

impl<'a, const RESP_CAP: usize> MasterResponses<'a, RESP_CAP> {
    pub async fn recv(&mut self) -> MasterEvent {
        self.receiver.receive().await
    }
}
