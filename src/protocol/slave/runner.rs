//! Async driver for [`SlaveStateMachine`]: pulls bus input from a
//! [`SlaveTransport`], answers the headers this node publishes and hands
//! received frames to the application.
use core::fmt::Debug;

use super::{ReceivedFrame, SlaveEvent, SlaveStateMachine};
use crate::core::LinBytes;
use crate::error::{SlaveError, SlaveRunError};
use crate::protocol::frame::{FrameId, Pdu};
use crate::protocol::transport::traits::slave_transport::SlaveTransport;

/// Application side of a slave node.
pub trait SlaveApplication {
    /// Current data of a published frame, or `None` to stay silent.
    ///
    /// Data shorter than the frame length is padded with `0xFF`, longer data
    /// is truncated.
    fn response(&mut self, frame_id: FrameId) -> Option<LinBytes>;

    /// A subscribed frame was received with a valid checksum.
    fn on_frame(&mut self, frame: &ReceivedFrame);
}

/// Runner owning the transport, the state machine and the application.
pub struct SlaveRunner<S, A, H>
where
    S: SlaveTransport,
    S::Error: Debug,
    A: SlaveApplication,
    H: FnMut(SlaveError),
{
    transport: S,
    machine: SlaveStateMachine<H>,
    application: A,
}

impl<S, A, H> SlaveRunner<S, A, H>
where
    S: SlaveTransport,
    S::Error: Debug,
    A: SlaveApplication,
    H: FnMut(SlaveError),
{
    pub fn new(transport: S, machine: SlaveStateMachine<H>, application: A) -> Self {
        Self {
            transport,
            machine,
            application,
        }
    }

    /// Process bus input until the transport fails.
    pub async fn drive(mut self) -> Result<(), SlaveRunError<S::Error>> {
        loop {
            self.step().await?;
        }
    }

    /// Process one unit of bus input and return what it completed.
    pub async fn step(&mut self) -> Result<Option<SlaveEvent>, SlaveRunError<S::Error>> {
        let input = self
            .transport
            .poll_input()
            .await
            .map_err(SlaveRunError::Receive)?;

        let event = self.machine.feed(input);
        match event {
            Some(SlaveEvent::FrameReceived(ref frame)) => self.application.on_frame(frame),
            Some(SlaveEvent::ResponseRequested(request)) => {
                match self.application.response(request.frame_id()) {
                    Some(data) => {
                        let pdu = Pdu::padded(
                            request.frame_id(),
                            data.as_slice(),
                            request.length,
                            request.checksum_mode,
                        );
                        let sent = self
                            .transport
                            .send_response(pdu.data(), pdu.checksum())
                            .await;
                        if let Err(_err) = &sent {
                            #[cfg(feature = "defmt")]
                            defmt::error!("Slave response send failed: {}", defmt::Debug2Format(_err));
                        }
                        self.machine.transmit_complete(sent.is_ok());
                    }
                    None => {
                        #[cfg(feature = "defmt")]
                        defmt::debug!(
                            "No data for frame {=u8:#X}, staying silent",
                            request.frame_id().raw()
                        );
                        self.machine.reset();
                    }
                }
            }
            None => {}
        }
        Ok(event)
    }

    pub fn machine(&self) -> &SlaveStateMachine<H> {
        &self.machine
    }

    pub fn application(&self) -> &A {
        &self.application
    }

    pub fn application_mut(&mut self) -> &mut A {
        &mut self.application
    }

    /// Give back the parts, e.g. to reconfigure the node.
    pub fn into_inner(self) -> (S, SlaveStateMachine<H>, A) {
        (self.transport, self.machine, self.application)
    }
}
