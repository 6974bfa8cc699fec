//! Backend Worker Thread Implementation
//!
//! This module contains the loop that owns the [`StreamingSession`]. It
//! waits on two channels at once:
//!
//! - **Commands** from the frontend ([`ControlCommand`])
//! - **Link events** from the transport's reader thread ([`TransportEvent`])
//!
//! A fresh link channel is created on every connect and dropped on every
//! disconnect, so bytes from a previous link can never reach the session.
//! After each handled message the session's event outbox is forwarded to the
//! frontend; render notifications become owned [`ScopeFrame`] snapshots.
//!
//! [`ScopeFrame`]: crate::scope::ScopeFrame

use crate::backend::{ControlCommand, SessionMessage};
use crate::error::Result;
use crate::session::{SessionEvent, StreamingSession};
use crate::transport::{ByteTransport, TransportEvent};
use crossbeam_channel::{bounded, never, select, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Interval between statistics updates while connected
const STATS_INTERVAL: Duration = Duration::from_millis(500);

/// The backend worker that runs the session loop
pub struct BackendWorker {
    session: StreamingSession,
    transport: Box<dyn ByteTransport>,
    /// Command receiver from the frontend
    command_rx: Receiver<ControlCommand>,
    /// Message sender to the frontend
    message_tx: Sender<SessionMessage>,
    /// Events of the open link, if any
    link_rx: Option<Receiver<TransportEvent>>,
    /// Running flag
    running: Arc<AtomicBool>,
    /// Last time stats were sent to the frontend
    last_stats_time: Instant,
    /// Frames dropped because the frontend was not draining
    frames_dropped: u64,
}

impl BackendWorker {
    /// Create a new backend worker
    pub fn new(
        session: StreamingSession,
        transport: Box<dyn ByteTransport>,
        command_rx: Receiver<ControlCommand>,
        message_tx: Sender<SessionMessage>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            session,
            transport,
            command_rx,
            message_tx,
            link_rx: None,
            running,
            last_stats_time: Instant::now(),
            frames_dropped: 0,
        }
    }

    /// Run the main worker loop
    pub fn run(&mut self) {
        tracing::info!("Backend worker started for {}", self.transport.describe());

        while self.running.load(Ordering::SeqCst) {
            let command_rx = self.command_rx.clone();
            let link_rx = self.link_rx.clone().unwrap_or_else(never);

            select! {
                recv(command_rx) -> cmd => match cmd {
                    Ok(cmd) => self.handle_command(cmd),
                    Err(_) => {
                        tracing::debug!("Frontend handle dropped");
                        self.running.store(false, Ordering::SeqCst);
                    }
                },
                recv(link_rx) -> event => match event {
                    Ok(event) => self.handle_transport_event(event),
                    Err(_) => self.handle_transport_event(TransportEvent::Disconnected),
                },
                default(STATS_INTERVAL) => {}
            }

            self.forward_events();

            if self.session.state().is_connected() && self.last_stats_time.elapsed() >= STATS_INTERVAL {
                self.send_stats();
                self.last_stats_time = Instant::now();
            }
        }

        // Cleanup
        self.session.disconnect();
        self.link_rx = None;
        self.forward_events();

        if self.frames_dropped > 0 {
            tracing::debug!("{} scope frames dropped", self.frames_dropped);
        }
        let _ = self.message_tx.send(SessionMessage::Shutdown);
        tracing::info!("Backend worker stopped");
    }

    /// Handle a single command
    fn handle_command(&mut self, cmd: ControlCommand) {
        tracing::trace!("Handling {:?}", cmd);
        match cmd {
            ControlCommand::Connect => self.handle_connect(),
            ControlCommand::Disconnect => {
                self.session.disconnect();
                self.link_rx = None;
            }
            ControlCommand::StartStreaming => {
                let result = self.session.start_streaming();
                self.report("start streaming", result);
            }
            ControlCommand::StopStreaming => {
                let result = self.session.stop_streaming();
                self.report("stop streaming", result);
            }
            ControlCommand::ToggleStreaming => {
                let result = self.session.toggle_streaming();
                self.report("toggle streaming", result);
            }
            ControlCommand::StartRecording => {
                let result = self.session.start_recording();
                self.report("start recording", result);
            }
            ControlCommand::StopRecording => {
                let result = self.session.stop_recording();
                self.report("stop recording", result);
            }
            ControlCommand::ToggleRecording => {
                let result = self.session.toggle_recording();
                self.report("toggle recording", result);
            }
            ControlCommand::SetBroadcasting(enabled) => {
                let applied = self.session.set_broadcasting(enabled);
                self.report("set broadcasting", Ok(applied));
            }
            ControlCommand::ToggleBroadcasting => {
                let applied = self.session.toggle_broadcasting();
                self.report("toggle broadcasting", Ok(applied));
            }
            ControlCommand::ConfigureBroadcast { host, port } => {
                let result = self.session.configure_broadcast(&host, port).map(|_| true);
                self.report("configure broadcast", result);
            }
            ControlCommand::SetBroadcastPath(path) => self.session.set_broadcast_path(path),
            ControlCommand::SetDataPath(path) => self.session.set_data_path(path),
            ControlCommand::Mark => {
                let result = self.session.mark();
                self.report("mark", result);
            }
            ControlCommand::QueryBattery => {
                let result = self.session.query_battery();
                self.report("query battery", result);
            }
            ControlCommand::SetChannelMode { mode, channel } => {
                let result = self.session.set_channel_mode(mode, channel);
                self.report("set channel mode", result);
            }
            ControlCommand::RequestStats => self.send_stats(),
            ControlCommand::RequestFrame => {
                let frame = self.session.buffer().frame();
                let _ = self.message_tx.send(SessionMessage::Frame(frame));
            }
            ControlCommand::Shutdown => {
                self.running.store(false, Ordering::SeqCst);
            }
        }
    }

    /// Open the transport with a fresh event channel
    fn handle_connect(&mut self) {
        if self.session.state().is_connected() {
            tracing::debug!("Connect ignored: link already open");
            return;
        }

        let queue_size = self.session.config().session.transport_queue_size;
        let (events_tx, events_rx) = bounded(queue_size);
        match self.transport.open(events_tx) {
            Ok(link) => {
                self.link_rx = Some(events_rx);
                self.session.on_connected(link);
            }
            Err(e) => {
                tracing::error!("Failed to connect to {}: {}", self.transport.describe(), e);
                let _ = self.message_tx.send(SessionMessage::Error(e.to_string()));
            }
        }
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Data(bytes) => {
                self.session.on_bytes(&bytes);
            }
            TransportEvent::Disconnected => {
                self.link_rx = None;
                self.session.on_link_error("device closed the link");
            }
            TransportEvent::Error(message) => {
                self.link_rx = None;
                self.session.on_link_error(message);
            }
        }
    }

    /// Log rejected commands and forward failures to the frontend
    fn report(&self, action: &str, result: Result<bool>) {
        match result {
            Ok(true) => {}
            Ok(false) => tracing::debug!("Ignored {} in state {}", action, self.session.state()),
            Err(e) => {
                tracing::warn!("Failed to {}: {}", action, e);
                let _ = self
                    .message_tx
                    .send(SessionMessage::Error(format!("Failed to {}: {}", action, e)));
            }
        }
    }

    /// Forward the session outbox to the frontend
    fn forward_events(&mut self) {
        for event in self.session.drain_events() {
            match event {
                SessionEvent::StateChanged(flags) => {
                    let _ = self.message_tx.send(SessionMessage::State(flags));
                }
                SessionEvent::RenderReady => {
                    let frame = self.session.buffer().frame();
                    match self.message_tx.try_send(SessionMessage::Frame(frame)) {
                        Ok(()) | Err(TrySendError::Disconnected(_)) => {}
                        Err(TrySendError::Full(_)) => self.frames_dropped += 1,
                    }
                }
                other => {
                    let _ = self.message_tx.send(SessionMessage::Event(other));
                }
            }
        }
    }

    fn send_stats(&self) {
        let _ = self
            .message_tx
            .send(SessionMessage::Stats(self.session.stats().clone()));
    }
}
