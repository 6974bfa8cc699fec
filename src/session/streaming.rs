//! The streaming session state machine
//!
//! One [`StreamingSession`] owns everything a connected device touches: the
//! command side of the link, the packet framer, the scope buffer and both
//! optional sinks. It is driven from a single thread and never blocks on
//! anything but the sinks themselves.
//!
//! ```text
//!                on_connected            start_streaming
//! Disconnected ───────────────▶ Idle ─────────────────────▶ Streaming
//!      ▲                         │ ◀───────────────────────   │
//!      │  disconnect/link error  │     stop_streaming         │
//!      └─────────────────────────┴────────────────────────────┘
//! ```
//!
//! Recording can only be switched on while streaming and is forced off when
//! streaming stops. Broadcasting is independent of streaming unless
//! `session.broadcast_requires_streaming` is set.

use super::types::{LinkState, SessionEvent, SessionFlags, SessionStats};
use crate::config::DendronConfig;
use crate::error::{DendronError, Result, ResultExt};
use crate::protocol::{ChannelMode, DeviceCommand, PacketFramer, SampleRecord};
use crate::scope::ScopeBuffer;
use crate::sinks::{BroadcastSink, CsvRecorder, RecordingSink};
use crate::transport::CommandSink;
use std::path::PathBuf;

/// Streaming session for one Dendron device
pub struct StreamingSession {
    config: DendronConfig,
    state: LinkState,
    link: Option<Box<dyn CommandSink>>,
    framer: PacketFramer,
    buffer: ScopeBuffer,
    recorder: Option<Box<dyn RecordingSink>>,
    broadcaster: Box<dyn BroadcastSink>,
    broadcasting: bool,
    stats: SessionStats,
    events: Vec<SessionEvent>,
    render_pending: bool,
}

impl StreamingSession {
    /// Create a disconnected session
    pub fn new(config: DendronConfig, broadcaster: Box<dyn BroadcastSink>) -> Result<Self> {
        config.validate()?;
        let buffer = ScopeBuffer::from_config(&config.scope)?;
        Ok(Self {
            config,
            state: LinkState::Disconnected,
            link: None,
            framer: PacketFramer::new(),
            buffer,
            recorder: None,
            broadcaster,
            broadcasting: false,
            stats: SessionStats::default(),
            events: Vec::new(),
            render_pending: false,
        })
    }

    pub fn config(&self) -> &DendronConfig {
        &self.config
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Current flags as one value
    pub fn flags(&self) -> SessionFlags {
        SessionFlags {
            is_connected: self.state.is_connected(),
            is_streaming: self.state.is_streaming(),
            is_recording: self.recorder.is_some(),
            is_broadcasting: self.broadcasting,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }

    pub fn is_broadcasting(&self) -> bool {
        self.broadcasting
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn buffer(&self) -> &ScopeBuffer {
        &self.buffer
    }

    /// Directory used by the next recording
    pub fn set_data_path(&mut self, path: impl Into<PathBuf>) {
        self.config.data.path = path.into();
    }

    /// Take every event produced since the last call.
    ///
    /// Render notifications are coalesced: however many arrived, at most one
    /// `RenderReady` is returned, after the other events.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        let mut events = std::mem::take(&mut self.events);
        if std::mem::take(&mut self.render_pending) {
            events.push(SessionEvent::RenderReady);
        }
        events
    }

    fn emit_state(&mut self) {
        let flags = self.flags();
        self.events.push(SessionEvent::StateChanged(flags));
    }

    // ==================== Link ====================

    /// Adopt a freshly opened link. Any previous link is torn down first.
    pub fn on_connected(&mut self, link: Box<dyn CommandSink>) {
        if self.state.is_connected() {
            tracing::warn!("New device link replaces the open one");
            self.teardown(false);
        }
        self.link = Some(link);
        self.state = LinkState::Idle;
        self.framer.clear();
        self.stats.last_sequence = None;
        tracing::info!("Device link open");
        self.emit_state();
    }

    /// Close the link, stopping the device first if it is streaming
    pub fn disconnect(&mut self) {
        if self.state.is_connected() {
            self.teardown(true);
        }
    }

    /// The transport reported a failure or an unexpected hang-up
    pub fn on_link_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("Device link failed: {}", message);
        self.events.push(SessionEvent::LinkError(message));
        if self.state.is_connected() {
            self.teardown(false);
        }
    }

    fn teardown(&mut self, send_stop: bool) {
        if send_stop && self.state.is_streaming() {
            if let Some(link) = self.link.as_mut() {
                if let Err(e) = link.send_command(DeviceCommand::Stop) {
                    tracing::warn!("Could not stop device before disconnecting: {}", e);
                }
            }
        }
        if let Err(e) = self.close_recorder() {
            tracing::warn!("{}", e);
        }
        if let Some(mut link) = self.link.take() {
            link.shutdown();
        }
        self.state = LinkState::Disconnected;
        self.broadcasting = false;
        self.framer.clear();
        tracing::info!("Device link closed");
        self.emit_state();
    }

    fn send(&mut self, command: DeviceCommand) -> Result<()> {
        if command.to_bytes().is_none() {
            return Err(DendronError::InvalidCommand(command.to_string()));
        }
        let link = self
            .link
            .as_mut()
            .ok_or_else(|| DendronError::Link("no device link".to_string()))?;
        link.send_command(command)
            .with_context(|| format!("Failed to send {} command", command))
    }

    // ==================== Streaming ====================

    /// `Idle -> Streaming`. Returns `Ok(false)` when not idle.
    ///
    /// If the start command cannot be sent the session stays idle.
    pub fn start_streaming(&mut self) -> Result<bool> {
        match self.state {
            LinkState::Disconnected => {
                tracing::debug!("Start ignored: no device link");
                return Ok(false);
            }
            LinkState::Streaming => return Ok(false),
            LinkState::Idle => {}
        }
        self.send(DeviceCommand::Start)?;
        self.state = LinkState::Streaming;
        tracing::info!("Streaming started");
        self.emit_state();
        Ok(true)
    }

    /// `Streaming -> Idle`, closing any recording.
    ///
    /// The transition happens even if the stop command fails; the send error
    /// is returned afterwards.
    pub fn stop_streaming(&mut self) -> Result<bool> {
        if !self.state.is_streaming() {
            return Ok(false);
        }
        let sent = self.send(DeviceCommand::Stop);
        self.state = LinkState::Idle;
        let closed = self.close_recorder();
        tracing::info!("Streaming stopped");
        self.emit_state();
        sent?;
        closed?;
        Ok(true)
    }

    pub fn toggle_streaming(&mut self) -> Result<bool> {
        if self.state.is_streaming() {
            self.stop_streaming()
        } else {
            self.start_streaming()
        }
    }

    // ==================== Recording ====================

    fn can_start_recording(&self) -> bool {
        if !self.state.is_streaming() {
            tracing::debug!("Recording rejected: not streaming");
            return false;
        }
        !self.is_recording()
    }

    /// Open a new CSV file in the data directory and start recording.
    ///
    /// Returns `Ok(false)` when not streaming or already recording.
    pub fn start_recording(&mut self) -> Result<bool> {
        if !self.can_start_recording() {
            return Ok(false);
        }
        match CsvRecorder::open_now(&self.config.data.path) {
            Ok(recorder) => Ok(self.start_recording_with(Box::new(recorder))),
            Err(e) => {
                tracing::error!("Could not start recording: {}", e);
                self.events.push(SessionEvent::RecordingFailed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Start recording into an already opened sink
    pub fn start_recording_with(&mut self, recorder: Box<dyn RecordingSink>) -> bool {
        if !self.can_start_recording() {
            return false;
        }
        let path = recorder.path();
        self.recorder = Some(recorder);
        self.events.push(SessionEvent::RecordingStarted { path });
        self.emit_state();
        true
    }

    pub fn stop_recording(&mut self) -> Result<bool> {
        if !self.is_recording() {
            return Ok(false);
        }
        let closed = self.close_recorder();
        self.emit_state();
        closed
    }

    pub fn toggle_recording(&mut self) -> Result<bool> {
        if self.is_recording() {
            self.stop_recording()
        } else {
            self.start_recording()
        }
    }

    fn close_recorder(&mut self) -> Result<bool> {
        let Some(mut recorder) = self.recorder.take() else {
            return Ok(false);
        };
        let result = recorder.close();
        self.events.push(SessionEvent::RecordingStopped {
            path: recorder.path(),
            lines: recorder.lines_written(),
        });
        result.context("Recording closed with errors").map(|_| true)
    }

    // ==================== Broadcasting ====================

    /// Switch broadcasting. Returns whether the flag now matches `enabled`.
    ///
    /// Enabling needs a configured destination and, if the session is set up
    /// that way, an active stream.
    pub fn set_broadcasting(&mut self, enabled: bool) -> bool {
        if enabled == self.broadcasting {
            return true;
        }
        if enabled {
            if self.config.session.broadcast_requires_streaming && !self.state.is_streaming() {
                tracing::debug!("Broadcast rejected: not streaming");
                return false;
            }
            if !self.broadcaster.is_configured() {
                tracing::warn!("Broadcast rejected: no destination configured");
                return false;
            }
        }
        self.broadcasting = enabled;
        tracing::info!(
            "Broadcasting {}",
            if enabled { "enabled" } else { "disabled" }
        );
        self.emit_state();
        true
    }

    pub fn toggle_broadcasting(&mut self) -> bool {
        self.set_broadcasting(!self.broadcasting)
    }

    /// Point the broadcaster at `host:port`. On failure broadcasting is
    /// switched off.
    pub fn configure_broadcast(&mut self, host: &str, port: u16) -> Result<()> {
        match self.broadcaster.set_destination(host, port) {
            Ok(()) => {
                self.config.osc.host = host.to_string();
                self.config.osc.port = port;
                Ok(())
            }
            Err(e) => {
                self.events.push(SessionEvent::BroadcastFailed(e.to_string()));
                if self.broadcasting {
                    self.broadcasting = false;
                    self.emit_state();
                }
                Err(e)
            }
        }
    }

    /// OSC address used for subsequent messages
    pub fn set_broadcast_path(&mut self, path: impl Into<String>) {
        self.config.osc.path = path.into();
    }

    // ==================== Device commands ====================

    /// Ask the device to flag the current sample. Streaming only.
    pub fn mark(&mut self) -> Result<bool> {
        if !self.state.is_streaming() {
            return Ok(false);
        }
        self.send(DeviceCommand::Mark)?;
        Ok(true)
    }

    pub fn query_battery(&mut self) -> Result<bool> {
        if !self.state.is_connected() {
            return Ok(false);
        }
        self.send(DeviceCommand::QueryBattery)?;
        Ok(true)
    }

    pub fn set_channel_mode(&mut self, mode: ChannelMode, channel: u8) -> Result<bool> {
        if !self.state.is_connected() {
            return Ok(false);
        }
        self.send(DeviceCommand::SetChannelMode { mode, channel })?;
        Ok(true)
    }

    // ==================== Data ====================

    /// Feed raw bytes from the link.
    ///
    /// Complete packets are always decoded so framing stays aligned; they
    /// only reach the buffer and sinks while streaming. Returns how many
    /// samples were dispatched.
    pub fn on_bytes(&mut self, bytes: &[u8]) -> usize {
        self.framer.extend(bytes);

        let mut dispatched = 0;
        let mut render_ready = false;
        while let Some(record) = self.framer.next_record() {
            self.stats
                .observe_packet(record.sequence_number, record.battery_level);
            if self.state.is_streaming() {
                render_ready |= self.dispatch(&record);
                dispatched += 1;
            } else {
                self.stats.packets_discarded += 1;
            }
        }

        self.render_pending |= render_ready;
        dispatched
    }

    /// Buffer, then recorder, then broadcaster. A failing sink never keeps
    /// the sample out of the buffer.
    fn dispatch(&mut self, record: &SampleRecord) -> bool {
        self.buffer.push(&record.channel_values);
        let render_ready = self.buffer.should_notify_render();

        let written = self.recorder.as_mut().map(|r| r.write_sample(record));
        match written {
            Some(Ok(())) => self.stats.lines_recorded += 1,
            Some(Err(e)) => {
                tracing::error!("Recording aborted: {}", e);
                self.events.push(SessionEvent::RecordingFailed(e.to_string()));
                if let Err(e) = self.close_recorder() {
                    tracing::warn!("{}", e);
                }
                self.emit_state();
            }
            None => {}
        }

        if self.broadcasting {
            if self
                .broadcaster
                .send(&self.config.osc.path, &record.channel_values)
            {
                self.stats.broadcasts_sent += 1;
            } else {
                self.stats.broadcasts_failed += 1;
            }
        }

        render_ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::broadcast::MockBroadcastSink;
    use crate::sinks::recording::MockRecordingSink;
    use crate::transport::MockCommandSink;

    const SCENARIO: [i32; 8] = [1, -1, 100, -100, 0, 0, 0, 0];

    fn config(broadcast_requires_streaming: bool) -> DendronConfig {
        let mut config = DendronConfig::default();
        config.scope.capacity = 8;
        config.session.broadcast_requires_streaming = broadcast_requires_streaming;
        config
    }

    fn configured_broadcaster() -> MockBroadcastSink {
        let mut broadcaster = MockBroadcastSink::new();
        broadcaster.expect_is_configured().return_const(true);
        broadcaster
    }

    fn session_with(broadcaster: MockBroadcastSink, requires_streaming: bool) -> StreamingSession {
        StreamingSession::new(config(requires_streaming), Box::new(broadcaster)).unwrap()
    }

    fn session() -> StreamingSession {
        session_with(configured_broadcaster(), false)
    }

    fn link_expecting(expected: &[(DeviceCommand, usize)]) -> MockCommandSink {
        let mut link = MockCommandSink::new();
        for &(command, times) in expected {
            link.expect_send_command()
                .withf(move |c| *c == command)
                .times(times)
                .returning(|_| Ok(()));
        }
        link.expect_shutdown().return_const(());
        link
    }

    fn recorder_expecting(writes: usize) -> MockRecordingSink {
        let mut recorder = MockRecordingSink::new();
        recorder
            .expect_write_sample()
            .times(writes)
            .returning(|_| Ok(()));
        recorder.expect_close().times(1).returning(|| Ok(()));
        recorder.expect_path().returning(|| None);
        recorder.expect_lines_written().return_const(writes as u64);
        recorder
    }

    fn packet(sequence: u32, values: [i32; 8]) -> [u8; 48] {
        SampleRecord::new(sequence, values).encode()
    }

    fn streaming_session(link: MockCommandSink) -> StreamingSession {
        let mut session = session();
        session.on_connected(Box::new(link));
        assert!(session.start_streaming().unwrap());
        session.drain_events();
        session
    }

    #[test]
    fn test_new_session_is_disconnected() {
        let session = session();
        assert_eq!(session.state(), LinkState::Disconnected);
        assert_eq!(session.flags(), SessionFlags::default());
    }

    #[test]
    fn test_start_requires_link() {
        let mut session = session();
        assert!(!session.start_streaming().unwrap());
        assert!(!session.query_battery().unwrap());
        assert!(session.drain_events().is_empty());
    }

    #[test]
    fn test_connect_start_stop() {
        let mut session = session();
        session.on_connected(Box::new(link_expecting(&[
            (DeviceCommand::Start, 1),
            (DeviceCommand::Stop, 1),
        ])));
        assert_eq!(session.state(), LinkState::Idle);

        assert!(session.start_streaming().unwrap());
        assert!(!session.start_streaming().unwrap());
        assert!(session.flags().is_streaming);

        assert!(session.stop_streaming().unwrap());
        assert!(!session.stop_streaming().unwrap());
        assert_eq!(session.state(), LinkState::Idle);

        let states: Vec<_> = session
            .drain_events()
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::StateChanged(flags) => Some(flags.is_streaming),
                _ => None,
            })
            .collect();
        assert_eq!(states, vec![false, true, false]);
    }

    #[test]
    fn test_failed_start_stays_idle() {
        let mut link = MockCommandSink::new();
        link.expect_send_command()
            .returning(|_| Err(DendronError::Link("broken pipe".to_string())));
        link.expect_shutdown().return_const(());

        let mut session = session();
        session.on_connected(Box::new(link));
        let err = session.start_streaming().unwrap_err();
        assert!(err.is_link_error());
        assert_eq!(session.state(), LinkState::Idle);
    }

    #[test]
    fn test_failed_stop_still_goes_idle() {
        let mut link = MockCommandSink::new();
        link.expect_send_command()
            .withf(|c| *c == DeviceCommand::Start)
            .returning(|_| Ok(()));
        link.expect_send_command()
            .withf(|c| *c == DeviceCommand::Stop)
            .returning(|_| Err(DendronError::Link("broken pipe".to_string())));
        link.expect_shutdown().return_const(());

        let mut session = streaming_session(link);
        assert!(session.start_recording_with(Box::new(recorder_expecting(0))));
        assert!(session.stop_streaming().is_err());
        assert_eq!(session.state(), LinkState::Idle);
        assert!(!session.is_recording());
    }

    #[test]
    fn test_recording_rejected_while_not_streaming() {
        let mut session = session();
        assert!(!session.start_recording().unwrap());
        assert!(!session.start_recording_with(Box::new(MockRecordingSink::new())));

        session.on_connected(Box::new(link_expecting(&[])));
        assert!(!session.start_recording().unwrap());
        assert!(!session.toggle_recording().unwrap());
        assert!(!session.is_recording());
    }

    #[test]
    fn test_stop_streaming_forces_recording_off() {
        let mut session = streaming_session(link_expecting(&[
            (DeviceCommand::Start, 1),
            (DeviceCommand::Stop, 1),
        ]));
        assert!(session.start_recording_with(Box::new(recorder_expecting(0))));
        assert!(session.flags().is_recording);

        session.stop_streaming().unwrap();
        assert!(!session.is_recording());
        assert!(session
            .drain_events()
            .contains(&SessionEvent::RecordingStopped { path: None, lines: 0 }));
    }

    #[test]
    fn test_second_recording_rejected() {
        let mut session = streaming_session(link_expecting(&[(DeviceCommand::Start, 1)]));
        assert!(session.start_recording_with(Box::new(recorder_expecting(0))));
        assert!(!session.start_recording_with(Box::new(MockRecordingSink::new())));
        assert!(session.stop_recording().unwrap());
        assert!(!session.stop_recording().unwrap());
    }

    #[test]
    fn test_packets_discarded_while_idle() {
        let mut session = session();
        session.on_connected(Box::new(link_expecting(&[])));

        assert_eq!(session.on_bytes(&packet(0, SCENARIO)), 0);
        assert_eq!(session.stats().packets_decoded, 1);
        assert_eq!(session.stats().packets_discarded, 1);
        assert_eq!(session.buffer().total_pushes(), 0);
    }

    #[test]
    fn test_sample_reaches_buffer_recorder_and_broadcaster() {
        let mut broadcaster = configured_broadcaster();
        broadcaster
            .expect_send()
            .withf(|path, values| path == "/dendron" && *values == SCENARIO)
            .times(1)
            .return_const(true);
        let mut session = session_with(broadcaster, false);
        session.on_connected(Box::new(link_expecting(&[(DeviceCommand::Start, 1)])));
        session.start_streaming().unwrap();

        let mut recorder = MockRecordingSink::new();
        recorder
            .expect_write_sample()
            .withf(|r| r.sequence_number == 7 && r.channel_values == SCENARIO)
            .times(1)
            .returning(|_| Ok(()));
        recorder.expect_close().times(1).returning(|| Ok(()));
        recorder.expect_path().returning(|| None);
        recorder.expect_lines_written().return_const(1u64);

        assert!(session.start_recording_with(Box::new(recorder)));
        assert!(session.set_broadcasting(true));
        assert_eq!(session.on_bytes(&packet(7, SCENARIO)), 1);

        let (_, ch1) = session.buffer().snapshot(1).unwrap();
        assert_eq!(ch1[0], -1.0);
        let (_, ch3) = session.buffer().snapshot(3).unwrap();
        assert_eq!(ch3[0], -100.0);
        assert_eq!(session.stats().lines_recorded, 1);
        assert_eq!(session.stats().broadcasts_sent, 1);
        assert_eq!(session.stats().last_sequence, Some(7));

        session.stop_recording().unwrap();
    }

    #[test]
    fn test_recording_write_failure_keeps_buffer_updated() {
        let mut session = streaming_session(link_expecting(&[(DeviceCommand::Start, 1)]));
        let mut recorder = MockRecordingSink::new();
        recorder
            .expect_write_sample()
            .times(1)
            .returning(|_| Err(DendronError::Io(std::io::Error::other("disk full"))));
        recorder.expect_close().times(1).returning(|| Ok(()));
        recorder.expect_path().returning(|| None);
        recorder.expect_lines_written().return_const(0u64);
        session.start_recording_with(Box::new(recorder));

        session.on_bytes(&packet(0, SCENARIO));
        session.on_bytes(&packet(1, SCENARIO));

        assert!(!session.is_recording());
        assert_eq!(session.buffer().total_pushes(), 2);
        assert!(session
            .drain_events()
            .iter()
            .any(|e| matches!(e, SessionEvent::RecordingFailed(msg) if msg.contains("disk full"))));
    }

    #[test]
    fn test_failed_broadcast_is_counted() {
        let mut broadcaster = configured_broadcaster();
        broadcaster.expect_send().return_const(false);
        let mut session = session_with(broadcaster, false);
        session.on_connected(Box::new(link_expecting(&[(DeviceCommand::Start, 1)])));
        session.start_streaming().unwrap();
        session.set_broadcasting(true);

        assert_eq!(session.on_bytes(&packet(0, SCENARIO)), 1);
        assert_eq!(session.stats().broadcasts_failed, 1);
        assert_eq!(session.buffer().total_pushes(), 1);
    }

    #[test]
    fn test_broadcast_allowed_in_any_state_by_default() {
        let mut session = session();
        assert!(session.set_broadcasting(true));
        assert!(session.is_broadcasting());
        assert!(session.toggle_broadcasting());
        assert!(!session.is_broadcasting());
    }

    #[test]
    fn test_broadcast_can_require_streaming() {
        let mut session = session_with(configured_broadcaster(), true);
        session.on_connected(Box::new(link_expecting(&[(DeviceCommand::Start, 1)])));
        assert!(!session.set_broadcasting(true));
        assert!(!session.is_broadcasting());

        session.start_streaming().unwrap();
        assert!(session.set_broadcasting(true));
        assert!(session.is_broadcasting());
    }

    #[test]
    fn test_broadcast_needs_destination() {
        let mut broadcaster = MockBroadcastSink::new();
        broadcaster.expect_is_configured().return_const(false);
        let mut session = session_with(broadcaster, false);
        assert!(!session.set_broadcasting(true));
        assert!(session.set_broadcasting(false));
    }

    #[test]
    fn test_failed_destination_disables_broadcast() {
        let mut broadcaster = configured_broadcaster();
        broadcaster
            .expect_set_destination()
            .returning(|host, _| Err(DendronError::Address(host.to_string())));
        let mut session = session_with(broadcaster, false);
        session.set_broadcasting(true);

        assert!(session.configure_broadcast("nowhere.invalid", 9000).is_err());
        assert!(!session.is_broadcasting());
        assert_eq!(session.config().osc.port, 5000);
        assert!(session
            .drain_events()
            .iter()
            .any(|e| matches!(e, SessionEvent::BroadcastFailed(_))));
    }

    #[test]
    fn test_mark_only_while_streaming() {
        let mut session = session();
        session.on_connected(Box::new(link_expecting(&[
            (DeviceCommand::Start, 1),
            (DeviceCommand::Mark, 1),
        ])));
        assert!(!session.mark().unwrap());
        session.start_streaming().unwrap();
        assert!(session.mark().unwrap());
    }

    #[test]
    fn test_battery_and_channel_mode_while_idle() {
        let mut session = session();
        session.on_connected(Box::new(link_expecting(&[
            (DeviceCommand::QueryBattery, 1),
            (
                DeviceCommand::SetChannelMode {
                    mode: ChannelMode::Test,
                    channel: 1,
                },
                1,
            ),
        ])));
        assert!(session.query_battery().unwrap());
        assert!(session.set_channel_mode(ChannelMode::Test, 1).unwrap());

        let err = session.set_channel_mode(ChannelMode::Ground, 9).unwrap_err();
        assert!(matches!(err, DendronError::InvalidCommand(_)));
    }

    #[test]
    fn test_disconnect_while_streaming_stops_device() {
        let mut link = MockCommandSink::new();
        link.expect_send_command()
            .withf(|c| *c == DeviceCommand::Start)
            .times(1)
            .returning(|_| Ok(()));
        link.expect_send_command()
            .withf(|c| *c == DeviceCommand::Stop)
            .times(1)
            .returning(|_| Ok(()));
        link.expect_shutdown().times(1).return_const(());

        let mut session = streaming_session(link);
        session.start_recording_with(Box::new(recorder_expecting(0)));
        session.set_broadcasting(true);

        session.disconnect();
        assert_eq!(session.flags(), SessionFlags::default());
        session.disconnect();
    }

    #[test]
    fn test_link_error_clears_everything_without_stop() {
        let mut session = streaming_session(link_expecting(&[(DeviceCommand::Start, 1)]));
        session.start_recording_with(Box::new(recorder_expecting(0)));
        session.set_broadcasting(true);

        session.on_link_error("connection reset");
        assert_eq!(session.flags(), SessionFlags::default());
        let events = session.drain_events();
        assert!(events.contains(&SessionEvent::LinkError("connection reset".to_string())));
        assert!(!session.start_streaming().unwrap());
    }

    #[test]
    fn test_render_ready_every_fourth_sample() {
        let mut session = streaming_session(link_expecting(&[(DeviceCommand::Start, 1)]));
        let ready: Vec<bool> = (0..9)
            .map(|seq| {
                session.on_bytes(&packet(seq, SCENARIO));
                session.drain_events().contains(&SessionEvent::RenderReady)
            })
            .collect();
        assert_eq!(
            ready,
            vec![true, false, false, false, true, false, false, false, true]
        );
    }

    #[test]
    fn test_undrained_render_notifications_coalesce() {
        let mut session = streaming_session(link_expecting(&[(DeviceCommand::Start, 1)]));
        for seq in 0..100 {
            session.on_bytes(&packet(seq, SCENARIO));
        }
        let events = session.drain_events();
        assert_eq!(events, vec![SessionEvent::RenderReady]);
        assert!(session.drain_events().is_empty());
    }

    #[test]
    fn test_packet_split_across_chunks() {
        let mut session = streaming_session(link_expecting(&[(DeviceCommand::Start, 1)]));
        let bytes = packet(3, SCENARIO);
        assert_eq!(session.on_bytes(&bytes[..20]), 0);
        assert_eq!(session.on_bytes(&bytes[20..]), 1);
        assert_eq!(session.stats().last_sequence, Some(3));
    }

    #[test]
    fn test_reconnect_discards_partial_packet() {
        let mut session = session();
        session.on_connected(Box::new(link_expecting(&[])));
        session.on_bytes(&[0u8; 20]);
        session.on_connected(Box::new(link_expecting(&[(DeviceCommand::Start, 1)])));
        session.start_streaming().unwrap();

        assert_eq!(session.on_bytes(&packet(0, SCENARIO)), 1);
        let (_, ch0) = session.buffer().snapshot(0).unwrap();
        assert_eq!(ch0[0], 1.0);
    }

    #[test]
    fn test_csv_recording_in_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = streaming_session(link_expecting(&[(DeviceCommand::Start, 1)]));
        session.set_data_path(dir.path());

        assert!(session.start_recording().unwrap());
        session.on_bytes(&packet(5, SCENARIO));
        assert!(session.stop_recording().unwrap());

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
        let content = std::fs::read_to_string(files[0].as_ref().unwrap().path()).unwrap();
        assert_eq!(content, "5,1,-1,100,-100,0,0,0,0\n");
    }

    #[test]
    fn test_recording_into_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = streaming_session(link_expecting(&[(DeviceCommand::Start, 1)]));
        session.set_data_path(dir.path().join("missing"));

        assert!(session.start_recording().is_err());
        assert!(!session.is_recording());
        assert!(session
            .drain_events()
            .iter()
            .any(|e| matches!(e, SessionEvent::RecordingFailed(_))));
    }
}
