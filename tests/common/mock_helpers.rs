//! In-memory stand-ins for the device link and the sinks
//!
//! Each fake shares its state through `Arc`s so a test can keep a handle
//! after handing the fake itself to a session or backend.

use crossbeam_channel::Sender;
use dendron_rs::error::{DendronError, Result};
use dendron_rs::protocol::{DeviceCommand, SampleRecord, CHANNEL_COUNT};
use dendron_rs::sinks::{BroadcastSink, RecordingSink};
use dendron_rs::transport::{ByteTransport, CommandSink, TransportEvent};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Commands written by a [`FakeLink`]
pub type SentCommands = Arc<Mutex<Vec<DeviceCommand>>>;

/// Link that records every command
pub struct FakeLink {
    sent: SentCommands,
    closed: Arc<AtomicBool>,
}

impl CommandSink for FakeLink {
    fn send_command(&mut self, command: DeviceCommand) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DendronError::Link("fake link closed".to_string()));
        }
        self.sent.lock().unwrap().push(command);
        Ok(())
    }

    fn shutdown(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Test-side view of a [`FakeTransport`]
#[derive(Clone, Default)]
pub struct FakeDevice {
    sent: SentCommands,
    closed: Arc<AtomicBool>,
    events: Arc<Mutex<Option<Sender<TransportEvent>>>>,
    opens: Arc<Mutex<usize>>,
}

impl FakeDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport that opens links onto this device
    pub fn transport(&self) -> FakeTransport {
        FakeTransport {
            device: self.clone(),
        }
    }

    /// Link for driving a session directly
    pub fn link(&self) -> FakeLink {
        self.closed.store(false, Ordering::SeqCst);
        FakeLink {
            sent: self.sent.clone(),
            closed: self.closed.clone(),
        }
    }

    pub fn sent(&self) -> Vec<DeviceCommand> {
        self.sent.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        *self.opens.lock().unwrap()
    }

    /// Deliver bytes as if read from the link. False if no link is open.
    pub fn push(&self, bytes: &[u8]) -> bool {
        match self.events.lock().unwrap().as_ref() {
            Some(tx) => tx.send(TransportEvent::Data(bytes.to_vec())).is_ok(),
            None => false,
        }
    }

    /// Simulate the device going away
    pub fn hang_up(&self) {
        if let Some(tx) = self.events.lock().unwrap().take() {
            let _ = tx.send(TransportEvent::Disconnected);
        }
    }
}

/// Transport whose links are [`FakeLink`]s onto a [`FakeDevice`]
pub struct FakeTransport {
    device: FakeDevice,
}

impl ByteTransport for FakeTransport {
    fn open(&mut self, events: Sender<TransportEvent>) -> Result<Box<dyn CommandSink>> {
        *self.device.opens.lock().unwrap() += 1;
        *self.device.events.lock().unwrap() = Some(events);
        Ok(Box::new(self.device.link()))
    }

    fn describe(&self) -> String {
        "fake device".to_string()
    }
}

/// Recorder keeping samples in memory, optionally failing after N writes
#[derive(Clone, Default)]
pub struct MemoryRecorder {
    samples: Arc<Mutex<Vec<SampleRecord>>>,
    closed: Arc<AtomicBool>,
    fail_after: Option<usize>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_after(writes: usize) -> Self {
        Self {
            fail_after: Some(writes),
            ..Self::default()
        }
    }

    pub fn samples(&self) -> Vec<SampleRecord> {
        self.samples.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl RecordingSink for MemoryRecorder {
    fn write_sample(&mut self, record: &SampleRecord) -> Result<()> {
        let mut samples = self.samples.lock().unwrap();
        if self.fail_after.is_some_and(|n| samples.len() >= n) {
            return Err(DendronError::Io(std::io::Error::other("disk full")));
        }
        samples.push(*record);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn lines_written(&self) -> u64 {
        self.samples.lock().unwrap().len() as u64
    }

    fn path(&self) -> Option<PathBuf> {
        None
    }
}

/// Broadcaster that keeps every message
#[derive(Clone)]
pub struct CapturingBroadcaster {
    messages: Arc<Mutex<Vec<(String, [i32; CHANNEL_COUNT])>>>,
    configured: bool,
}

impl CapturingBroadcaster {
    pub fn new() -> Self {
        Self {
            messages: Arc::default(),
            configured: true,
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::new()
        }
    }

    pub fn messages(&self) -> Vec<(String, [i32; CHANNEL_COUNT])> {
        self.messages.lock().unwrap().clone()
    }
}

impl BroadcastSink for CapturingBroadcaster {
    fn send(&mut self, path: &str, values: &[i32; CHANNEL_COUNT]) -> bool {
        self.messages.lock().unwrap().push((path.to_string(), *values));
        true
    }

    fn set_destination(&mut self, _host: &str, _port: u16) -> Result<()> {
        self.configured = true;
        Ok(())
    }

    fn is_configured(&self) -> bool {
        self.configured
    }
}
