//! Session data types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// State of the device link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LinkState {
    /// No device link
    #[default]
    Disconnected,
    /// Link open, device not sending samples
    Idle,
    /// Link open and the device was told to stream
    Streaming,
}

impl LinkState {
    /// Check if a link is open
    pub fn is_connected(&self) -> bool {
        !matches!(self, LinkState::Disconnected)
    }

    /// Check if streaming
    pub fn is_streaming(&self) -> bool {
        matches!(self, LinkState::Streaming)
    }

    /// Display name for the state
    pub fn display_name(&self) -> &'static str {
        match self {
            LinkState::Disconnected => "Disconnected",
            LinkState::Idle => "Connected",
            LinkState::Streaming => "Streaming",
        }
    }
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Snapshot of the four session flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionFlags {
    pub is_connected: bool,
    pub is_streaming: bool,
    pub is_recording: bool,
    pub is_broadcasting: bool,
}

/// Running counters for one session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Complete packets decoded from the link
    pub packets_decoded: u64,
    /// Packets decoded while not streaming and dropped
    pub packets_discarded: u64,
    /// Packets whose sequence number did not follow the previous one
    pub sequence_gaps: u64,
    /// Samples written to recordings
    pub lines_recorded: u64,
    /// Broadcast messages that left the process
    pub broadcasts_sent: u64,
    /// Broadcast messages that could not be sent
    pub broadcasts_failed: u64,
    /// Sequence number of the most recent packet
    pub last_sequence: Option<u32>,
    /// Battery level reported by the most recent packet
    pub last_battery: Option<f64>,
}

impl SessionStats {
    /// Account for a freshly decoded packet.
    ///
    /// Gaps are counted with wrapping arithmetic, so `u32::MAX -> 0` is
    /// not a gap.
    pub fn observe_packet(&mut self, sequence_number: u32, battery_level: f64) {
        self.packets_decoded += 1;
        if let Some(previous) = self.last_sequence {
            if sequence_number != previous.wrapping_add(1) {
                self.sequence_gaps += 1;
            }
        }
        self.last_sequence = Some(sequence_number);
        self.last_battery = Some(battery_level);
    }
}

/// Notification produced by the session for the frontend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
    /// One of the session flags changed
    StateChanged(SessionFlags),
    /// A recording file was opened
    RecordingStarted { path: Option<PathBuf> },
    /// The recording file was closed
    RecordingStopped { path: Option<PathBuf>, lines: u64 },
    /// Recording could not start or was aborted by a write failure
    RecordingFailed(String),
    /// Broadcast destination could not be set
    BroadcastFailed(String),
    /// The device link failed
    LinkError(String),
    /// The scope buffer has new content worth drawing
    RenderReady,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_state_predicates() {
        assert!(!LinkState::Disconnected.is_connected());
        assert!(LinkState::Idle.is_connected());
        assert!(!LinkState::Idle.is_streaming());
        assert!(LinkState::Streaming.is_streaming());
        assert_eq!(LinkState::default(), LinkState::Disconnected);
        assert_eq!(LinkState::Streaming.to_string(), "Streaming");
    }

    #[test]
    fn test_sequence_gap_counting() {
        let mut stats = SessionStats::default();
        stats.observe_packet(10, 3.7);
        stats.observe_packet(11, 3.7);
        assert_eq!(stats.sequence_gaps, 0);
        stats.observe_packet(13, 3.6);
        assert_eq!(stats.sequence_gaps, 1);
        assert_eq!(stats.last_sequence, Some(13));
        assert_eq!(stats.last_battery, Some(3.6));
        assert_eq!(stats.packets_decoded, 3);
    }

    #[test]
    fn test_sequence_wrap_is_not_a_gap() {
        let mut stats = SessionStats::default();
        stats.observe_packet(u32::MAX, 0.0);
        stats.observe_packet(0, 0.0);
        assert_eq!(stats.sequence_gaps, 0);
    }

    #[test]
    fn test_flags_serialize() {
        let flags = SessionFlags {
            is_connected: true,
            is_streaming: true,
            is_recording: false,
            is_broadcasting: true,
        };
        let json = serde_json::to_string(&flags).unwrap();
        assert!(json.contains("\"is_broadcasting\":true"));
        let back: SessionFlags = serde_json::from_str(&json).unwrap();
        assert_eq!(back, flags);
    }
}
