/// Test doubles simulating the LIN transports and timer during integration tests.
use korri_lin::core::{BusInput, LinMessage};
use korri_lin::protocol::frame::{ChecksumMode, ProtectedId};
use korri_lin::protocol::transport::traits::{
    lin_bus::LinBus, lin_timer::LinTimer, slave_transport::SlaveTransport,
};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{sleep, Duration};

#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(dead_code)]
/// What the master put on the bus, as observed by the host side.
pub enum BusRecord {
    Transmit {
        pid: u8,
        data: Vec<u8>,
        checksum_mode: ChecksumMode,
    },
    PrepareReceive {
        pid: u8,
        expected_length: usize,
        checksum_mode: ChecksumMode,
    },
    Wakeup,
}

#[derive(Clone)]
#[allow(dead_code)]
/// In-memory master transport reproducing the `LinBus` trait behavior.
pub struct MockLinBus {
    tx: mpsc::UnboundedSender<BusRecord>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<LinMessage>>>,
}

#[allow(dead_code)]
/// Host end of a [`MockLinBus`]: observes the master and plays the slaves.
pub struct LinBusHost {
    rx: mpsc::UnboundedReceiver<BusRecord>,
    tx: mpsc::UnboundedSender<LinMessage>,
}

#[allow(dead_code)]
impl MockLinBus {
    /// Construct an interconnected pair (DUT ↔ host).
    pub fn create_pair() -> (Self, LinBusHost) {
        let (dut_tx, host_rx) = mpsc::unbounded_channel();
        let (host_tx, dut_rx) = mpsc::unbounded_channel();

        let dut_bus = Self {
            tx: dut_tx,
            rx: Arc::new(Mutex::new(dut_rx)),
        };
        let host = LinBusHost {
            rx: host_rx,
            tx: host_tx,
        };
        (dut_bus, host)
    }
}

#[allow(dead_code)]
impl LinBusHost {
    pub async fn recv(&mut self) -> Option<BusRecord> {
        self.rx.recv().await
    }

    /// Answer the pending header with `data` (checksum already validated).
    pub fn respond(&self, data: &[u8]) {
        let _ = self.tx.send(LinMessage::new(0, data));
    }

    /// Answer with `data` followed by the raw `checksum` byte.
    pub fn respond_with_checksum(&self, data: &[u8], checksum: u8) {
        let _ = self.tx.send(LinMessage::new(0, data).with_checksum(checksum));
    }
}

impl LinBus for MockLinBus {
    type Error = ();

    async fn transmit<'a>(
        &'a mut self,
        pid: ProtectedId,
        data: &'a [u8],
        checksum_mode: ChecksumMode,
    ) -> Result<(), Self::Error> {
        self.tx
            .send(BusRecord::Transmit {
                pid: pid.raw(),
                data: data.to_vec(),
                checksum_mode,
            })
            .map_err(|_| ())
    }

    async fn prepare_receive(
        &mut self,
        pid: ProtectedId,
        expected_length: usize,
        checksum_mode: ChecksumMode,
    ) -> Result<(), Self::Error> {
        self.tx
            .send(BusRecord::PrepareReceive {
                pid: pid.raw(),
                expected_length,
                checksum_mode,
            })
            .map_err(|_| ())
    }

    async fn recv_response(&mut self) -> Result<LinMessage, Self::Error> {
        let mut rx = self.rx.lock().await;
        rx.recv().await.ok_or(())
    }

    async fn wakeup(&mut self) -> Result<(), Self::Error> {
        self.tx.send(BusRecord::Wakeup).map_err(|_| ())
    }
}

#[allow(dead_code)]
/// Timer based on `tokio::time::sleep` to drive delays in tests.
pub struct MockTimer;

impl LinTimer for MockTimer {
    async fn delay_ms(&mut self, millis: u32) {
        sleep(Duration::from_millis(millis as u64)).await;
    }
}

#[allow(dead_code)]
/// In-memory slave transport: bus input comes from the host, responses go back to it.
pub struct MockSlaveTransport {
    input: mpsc::UnboundedReceiver<BusInput>,
    responses: mpsc::UnboundedSender<(Vec<u8>, u8)>,
    fail_sends: bool,
}

#[allow(dead_code)]
/// Host end of a [`MockSlaveTransport`]: plays the master's headers.
pub struct SlaveBusHost {
    input: mpsc::UnboundedSender<BusInput>,
    responses: mpsc::UnboundedReceiver<(Vec<u8>, u8)>,
}

#[allow(dead_code)]
impl MockSlaveTransport {
    pub fn create_pair() -> (Self, SlaveBusHost) {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (resp_tx, resp_rx) = mpsc::unbounded_channel();
        (
            Self {
                input: input_rx,
                responses: resp_tx,
                fail_sends: false,
            },
            SlaveBusHost {
                input: input_tx,
                responses: resp_rx,
            },
        )
    }

    /// Make every `send_response` fail, as a transceiver fault would.
    pub fn failing(mut self) -> Self {
        self.fail_sends = true;
        self
    }
}

#[allow(dead_code)]
impl SlaveBusHost {
    /// Break, sync and `pid`, then any `tail` bytes.
    pub fn send_frame(&self, pid: u8, tail: &[u8]) {
        let _ = self.input.send(BusInput::Break);
        let _ = self.input.send(BusInput::Byte(0x55));
        let _ = self.input.send(BusInput::Byte(pid));
        for &byte in tail {
            let _ = self.input.send(BusInput::Byte(byte));
        }
    }

    pub fn send_bytes(&self, bytes: &[u8]) {
        for &byte in bytes {
            let _ = self.input.send(BusInput::Byte(byte));
        }
    }

    pub async fn recv_response(&mut self) -> Option<(Vec<u8>, u8)> {
        self.responses.recv().await
    }

    pub fn try_recv_response(&mut self) -> Option<(Vec<u8>, u8)> {
        self.responses.try_recv().ok()
    }
}

impl SlaveTransport for MockSlaveTransport {
    type Error = ();

    async fn poll_input(&mut self) -> Result<BusInput, Self::Error> {
        self.input.recv().await.ok_or(())
    }

    async fn send_response<'a>(&'a mut self, data: &'a [u8], checksum: u8) -> Result<(), Self::Error> {
        if self.fail_sends {
            return Err(());
        }
        self.responses.send((data.to_vec(), checksum)).map_err(|_| ())
    }
}
