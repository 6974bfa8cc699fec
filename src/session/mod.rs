//! Streaming session module
//!
//! This module owns the device lifecycle: connecting, starting and stopping
//! the stream, and routing every decoded sample to the scope buffer and the
//! optional recording and broadcast sinks.
//!
//! # Features
//!
//! - Explicit link state (`Disconnected`, `Idle`, `Streaming`)
//! - Recording gated on streaming, forced off when streaming stops
//! - Configurable broadcast precondition
//! - Per-session counters and an event outbox for frontends

pub mod streaming;
pub mod types;

pub use streaming::StreamingSession;
pub use types::{LinkState, SessionEvent, SessionFlags, SessionStats};
