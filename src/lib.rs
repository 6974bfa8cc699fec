//! # dendron-rs: Dendron biosignal streaming core
//!
//! Receives the fixed-size binary telemetry stream of a Dendron device,
//! decodes it into eight-channel samples and fans every sample out to a
//! rolling scope buffer, an optional CSV recording and an optional OSC
//! broadcast. The device link and the UI are kept behind narrow seams so the
//! core runs the same against a Bluetooth bridge, a TTY or a simulator.
//!
//! ## Architecture
//!
//! - **Protocol**: 48-byte packet decoder, stream framer and device commands
//! - **Scope**: fixed-capacity multi-channel ring with render decimation
//! - **Sinks**: CSV recorder and OSC/UDP broadcaster
//! - **Session**: link/streaming state machine that routes samples to sinks
//! - **Backend**: worker thread owning the session, driven over crossbeam channels
//! - **Transport**: TCP, device file and (optionally) simulated links
//!
//! ## Configuration
//!
//! Settings are read from `config.toml` in the platform config directory
//! under `dev.medialab.dendron`; see [`config`] for the recognized keys.
//!
//! ## Example
//!
//! ```ignore
//! use dendron_rs::{
//!     backend::{DendronBackend, SessionMessage},
//!     config::DendronConfig,
//!     sinks::OscBroadcaster,
//!     transport::DeviceFileTransport,
//! };
//!
//! let config = DendronConfig::load_or_default();
//! let broadcaster = OscBroadcaster::connect(&config.osc.host, config.osc.port)?;
//! let (backend, handle) = DendronBackend::new(
//!     config,
//!     Box::new(DeviceFileTransport::new("/dev/rfcomm0")),
//!     Box::new(broadcaster),
//! )?;
//! let worker = backend.spawn()?;
//!
//! handle.connect();
//! handle.start_streaming();
//! handle.toggle_recording();
//!
//! while let Some(msg) = handle.recv_timeout(std::time::Duration::from_secs(1)) {
//!     if let SessionMessage::Frame(frame) = msg {
//!         // draw frame.traces
//!     }
//! }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod protocol;
pub mod scope;
pub mod session;
pub mod sinks;
pub mod transport;

// Re-export commonly used types
pub use backend::{ControlCommand, ControlHandle, DendronBackend, SessionMessage};
pub use config::DendronConfig;
pub use error::{DendronError, Result};
pub use protocol::{decode, DeviceCommand, PacketFramer, SampleRecord};
pub use scope::{ScopeBuffer, ScopeFrame};
pub use session::{LinkState, SessionEvent, SessionFlags, StreamingSession};
