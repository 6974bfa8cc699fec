//! Device transport boundary
//!
//! The core never talks to Bluetooth directly. A [`ByteTransport`] opens a
//! link and from then on delivers everything through a bounded channel of
//! [`TransportEvent`]s; the returned [`CommandSink`] is the only way to write
//! to the device. Delivery happens on the transport's own reader thread and
//! never waits on session logic beyond the channel bound.
//!
//! # Implementations
//!
//! - [`TcpTransport`] - RFCOMM-to-TCP bridges and device emulators
//! - [`DeviceFileTransport`] - bound RFCOMM TTYs such as `/dev/rfcomm0`
//! - [`SimulatedTransport`] - synthetic device (`simulator` feature)

pub mod stream;
#[cfg(feature = "simulator")]
pub mod simulated;

pub use stream::{DeviceFileTransport, DuplexStream, StreamCommandSink, TcpTransport};
#[cfg(feature = "simulator")]
pub use simulated::{SimulatedTransport, SignalPattern};

use crate::error::Result;
use crate::protocol::DeviceCommand;
use crossbeam_channel::Sender;

/// Notification from an open link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Opaque chunk of bytes, arbitrary length, in arrival order
    Data(Vec<u8>),
    /// Peer closed the link
    Disconnected,
    /// Link failed; no further events follow
    Error(String),
}

/// Write side of an open link
#[cfg_attr(test, mockall::automock)]
pub trait CommandSink: Send {
    /// Write one command to the device
    fn send_command(&mut self, command: DeviceCommand) -> Result<()>;

    /// Tear the link down. Safe to call more than once.
    fn shutdown(&mut self);
}

/// Something that can open a link to a Dendron device
#[cfg_attr(test, mockall::automock)]
pub trait ByteTransport: Send {
    /// Open the link. Received bytes and link notifications are pushed into
    /// `events` until the link ends or the receiver is dropped.
    fn open(&mut self, events: Sender<TransportEvent>) -> Result<Box<dyn CommandSink>>;

    /// Human readable description of the endpoint, for logs and status text
    fn describe(&self) -> String;
}
