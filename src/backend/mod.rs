//! Backend module driving a streaming session on its own thread
//!
//! The session, the device link and both sinks live on a single worker
//! thread so the frontend never blocks on the device. Everything crosses the
//! thread boundary through crossbeam channels.
//!
//! # Architecture
//!
//! - [`ControlCommand`] - Messages sent from the frontend to the backend
//! - [`SessionMessage`] - Messages sent from the backend to the frontend
//! - [`ControlHandle`] - Frontend-side handle for sending commands and receiving messages
//! - [`DendronBackend`] - Entry point that owns the worker until it is run
//!
//! Transport events arrive on a third, per-link channel that only the worker
//! sees. The worker waits on commands and link events together and handles
//! them one at a time, so the session is never touched concurrently.
//!
//! # Example
//!
//! ```ignore
//! use dendron_rs::backend::{DendronBackend, SessionMessage};
//! use dendron_rs::config::DendronConfig;
//! use dendron_rs::sinks::OscBroadcaster;
//! use dendron_rs::transport::TcpTransport;
//!
//! let (backend, handle) = DendronBackend::new(
//!     DendronConfig::default(),
//!     Box::new(TcpTransport::new("127.0.0.1:7000")),
//!     Box::new(OscBroadcaster::new()),
//! )?;
//! let worker = backend.spawn()?;
//!
//! handle.connect();
//! handle.start_streaming();
//!
//! for msg in handle.drain() {
//!     if let SessionMessage::Frame(frame) = msg {
//!         // redraw
//!     }
//! }
//! ```

pub mod worker;

pub use worker::BackendWorker;

use crate::config::DendronConfig;
use crate::error::Result;
use crate::protocol::ChannelMode;
use crate::scope::ScopeFrame;
use crate::session::{SessionEvent, SessionFlags, SessionStats, StreamingSession};
use crate::sinks::BroadcastSink;
use crate::transport::ByteTransport;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Bound of the backend-to-frontend message queue
const MESSAGE_QUEUE_SIZE: usize = 4096;

/// Message sent from the frontend to the backend
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    /// Open the device link
    Connect,
    /// Close the device link
    Disconnect,
    /// Tell the device to start streaming
    StartStreaming,
    /// Tell the device to stop streaming
    StopStreaming,
    /// Start or stop streaming depending on the current state
    ToggleStreaming,
    /// Open a recording file in the data directory
    StartRecording,
    /// Close the recording file
    StopRecording,
    /// Start or stop recording depending on the current state
    ToggleRecording,
    /// Enable or disable the OSC feed
    SetBroadcasting(bool),
    /// Flip the OSC feed
    ToggleBroadcasting,
    /// Change the OSC destination
    ConfigureBroadcast { host: String, port: u16 },
    /// Change the OSC address pattern
    SetBroadcastPath(String),
    /// Change the directory for the next recording
    SetDataPath(PathBuf),
    /// Mark an event in the device stream
    Mark,
    /// Ask the device for a battery reading
    QueryBattery,
    /// Switch one channel's input mode
    SetChannelMode { mode: ChannelMode, channel: u8 },
    /// Request current statistics
    RequestStats,
    /// Request a scope frame right away
    RequestFrame,
    /// Shutdown the backend
    Shutdown,
}

/// Message sent from the backend to the frontend
#[derive(Debug, Clone, PartialEq)]
pub enum SessionMessage {
    /// Session flags changed
    State(SessionFlags),
    /// New scope content to draw
    Frame(ScopeFrame),
    /// Any other session notification
    Event(SessionEvent),
    /// Statistics update
    Stats(SessionStats),
    /// A command failed
    Error(String),
    /// Backend is shutting down
    Shutdown,
}

/// Frontend handle for the backend
pub struct ControlHandle {
    /// Receiver for backend messages
    pub receiver: Receiver<SessionMessage>,
    /// Sender for commands to the backend
    pub command_sender: Sender<ControlCommand>,
}

impl ControlHandle {
    /// Try to receive a message without blocking
    pub fn try_recv(&self) -> Option<SessionMessage> {
        self.receiver.try_recv().ok()
    }

    /// Wait up to `timeout` for the next message
    pub fn recv_timeout(&self, timeout: Duration) -> Option<SessionMessage> {
        match self.receiver.recv_timeout(timeout) {
            Ok(msg) => Some(msg),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Receive all pending messages
    pub fn drain(&self) -> Vec<SessionMessage> {
        self.receiver.try_iter().collect()
    }

    /// Send a command to the backend
    pub fn send_command(&self, cmd: ControlCommand) -> bool {
        self.command_sender.send(cmd).is_ok()
    }

    pub fn connect(&self) {
        let _ = self.command_sender.send(ControlCommand::Connect);
    }

    pub fn disconnect(&self) {
        let _ = self.command_sender.send(ControlCommand::Disconnect);
    }

    pub fn start_streaming(&self) {
        let _ = self.command_sender.send(ControlCommand::StartStreaming);
    }

    pub fn stop_streaming(&self) {
        let _ = self.command_sender.send(ControlCommand::StopStreaming);
    }

    pub fn toggle_streaming(&self) {
        let _ = self.command_sender.send(ControlCommand::ToggleStreaming);
    }

    pub fn toggle_recording(&self) {
        let _ = self.command_sender.send(ControlCommand::ToggleRecording);
    }

    pub fn set_broadcasting(&self, enabled: bool) {
        let _ = self
            .command_sender
            .send(ControlCommand::SetBroadcasting(enabled));
    }

    pub fn toggle_broadcasting(&self) {
        let _ = self.command_sender.send(ControlCommand::ToggleBroadcasting);
    }

    /// Change the OSC destination
    pub fn configure_broadcast(&self, host: impl Into<String>, port: u16) {
        let _ = self.command_sender.send(ControlCommand::ConfigureBroadcast {
            host: host.into(),
            port,
        });
    }

    /// Change the OSC address pattern used for subsequent messages
    pub fn set_broadcast_path(&self, path: impl Into<String>) {
        let _ = self
            .command_sender
            .send(ControlCommand::SetBroadcastPath(path.into()));
    }

    pub fn mark(&self) {
        let _ = self.command_sender.send(ControlCommand::Mark);
    }

    pub fn query_battery(&self) {
        let _ = self.command_sender.send(ControlCommand::QueryBattery);
    }

    /// Switch one channel's input mode
    pub fn set_channel_mode(&self, mode: ChannelMode, channel: u8) {
        let _ = self
            .command_sender
            .send(ControlCommand::SetChannelMode { mode, channel });
    }

    pub fn request_stats(&self) {
        let _ = self.command_sender.send(ControlCommand::RequestStats);
    }

    /// Request shutdown
    pub fn shutdown(&self) {
        let _ = self.command_sender.send(ControlCommand::Shutdown);
    }
}

/// Backend that owns a session until its worker is run
pub struct DendronBackend {
    session: StreamingSession,
    transport: Box<dyn ByteTransport>,
    /// Receiver for commands from the frontend
    command_receiver: Receiver<ControlCommand>,
    /// Sender for messages to the frontend
    message_sender: Sender<SessionMessage>,
    /// Running flag
    running: Arc<AtomicBool>,
}

impl DendronBackend {
    /// Create a backend and the matching frontend handle.
    ///
    /// Fails if `config` does not validate.
    pub fn new(
        config: DendronConfig,
        transport: Box<dyn ByteTransport>,
        broadcaster: Box<dyn BroadcastSink>,
    ) -> Result<(Self, ControlHandle)> {
        let (cmd_tx, cmd_rx) = bounded(config.session.command_queue_size);
        let (msg_tx, msg_rx) = bounded(MESSAGE_QUEUE_SIZE);
        let session = StreamingSession::new(config, broadcaster)?;

        let backend = Self {
            session,
            transport,
            command_receiver: cmd_rx,
            message_sender: msg_tx,
            running: Arc::new(AtomicBool::new(true)),
        };

        let handle = ControlHandle {
            receiver: msg_rx,
            command_sender: cmd_tx,
        };

        Ok((backend, handle))
    }

    /// Run the backend loop on the current thread
    pub fn run(self) {
        let mut worker = BackendWorker::new(
            self.session,
            self.transport,
            self.command_receiver,
            self.message_sender,
            self.running,
        );
        worker.run();
    }

    /// Run the backend loop on a new named thread
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("dendron-backend".to_string())
            .spawn(move || self.run())
    }

    /// Get a handle to stop the backend
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }
}
