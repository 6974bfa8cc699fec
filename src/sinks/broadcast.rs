//! OSC broadcast sink
//!
//! Each decoded sample becomes one OSC 1.0 message carrying the eight
//! channel values as `int32` arguments, sent as a single UDP datagram:
//!
//! ```text
//! [address, NUL padded to 4] [",iiiiiiii", NUL padded to 4] [8 x i32 big-endian]
//! ```
//!
//! Delivery is fire-and-forget. Send failures are counted and logged at
//! debug level but never surfaced, matching a best-effort telemetry feed.

use crate::error::{DendronError, Result};
use crate::protocol::CHANNEL_COUNT;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

/// Destination for decoded samples while broadcasting is active
#[cfg_attr(test, mockall::automock)]
pub trait BroadcastSink: Send {
    /// Send one message to `path`.
    ///
    /// Returns whether the message left the process. A lost datagram is
    /// never an error.
    fn send(&mut self, path: &str, values: &[i32; CHANNEL_COUNT]) -> bool;

    /// Point the sink at a new destination. On failure the sink is left
    /// unconfigured.
    fn set_destination(&mut self, host: &str, port: u16) -> Result<()>;

    /// Whether a destination has been configured
    fn is_configured(&self) -> bool;
}

fn push_osc_string(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(s.as_bytes());
    // At least one NUL, then pad to a 4-byte boundary
    let padding = 4 - (s.len() % 4);
    buf.extend(std::iter::repeat(0u8).take(padding));
}

/// Encode an OSC message whose arguments are all `int32`
pub fn encode_osc_message(address: &str, args: &[i32]) -> Vec<u8> {
    let mut type_tags = String::with_capacity(args.len() + 1);
    type_tags.push(',');
    type_tags.extend(std::iter::repeat('i').take(args.len()));

    let mut buf = Vec::with_capacity(address.len() + type_tags.len() + 8 + args.len() * 4);
    push_osc_string(&mut buf, address);
    push_osc_string(&mut buf, &type_tags);
    for arg in args {
        buf.extend_from_slice(&arg.to_be_bytes());
    }
    buf
}

/// UDP sender for OSC messages
#[derive(Debug, Default)]
pub struct OscBroadcaster {
    socket: Option<UdpSocket>,
    target: Option<SocketAddr>,
    sent: u64,
    failed: u64,
}

impl OscBroadcaster {
    /// Create an unconfigured broadcaster; `send` is a no-op until configured
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a broadcaster bound for `host:port`
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        let mut broadcaster = Self::new();
        broadcaster.configure(host, port)?;
        Ok(broadcaster)
    }

    /// Resolve and bind for a (new) destination.
    ///
    /// On failure the broadcaster is left unconfigured.
    pub fn configure(&mut self, host: &str, port: u16) -> Result<SocketAddr> {
        self.socket = None;
        self.target = None;

        let target = (host, port)
            .to_socket_addrs()
            .map_err(|e| DendronError::Address(format!("{}:{}: {}", host, port, e)))?
            .next()
            .ok_or_else(|| {
                DendronError::Address(format!("{}:{} did not resolve to an address", host, port))
            })?;

        let bind_addr: SocketAddr = if target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(bind_addr)
            .map_err(|e| DendronError::Address(format!("Failed to bind UDP socket: {}", e)))?;

        tracing::info!("OSC broadcast destination set to {}", target);
        self.socket = Some(socket);
        self.target = Some(target);
        Ok(target)
    }

    /// Configured destination
    pub fn target(&self) -> Option<SocketAddr> {
        self.target
    }

    /// Messages handed to the OS successfully
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Messages the OS refused
    pub fn failed(&self) -> u64 {
        self.failed
    }
}

impl BroadcastSink for OscBroadcaster {
    fn send(&mut self, path: &str, values: &[i32; CHANNEL_COUNT]) -> bool {
        let (Some(socket), Some(target)) = (self.socket.as_ref(), self.target) else {
            return false;
        };
        let message = encode_osc_message(path, values);
        match socket.send_to(&message, target) {
            Ok(_) => {
                self.sent += 1;
                true
            }
            Err(e) => {
                self.failed += 1;
                tracing::debug!("OSC send to {} failed: {}", target, e);
                false
            }
        }
    }

    fn set_destination(&mut self, host: &str, port: u16) -> Result<()> {
        self.configure(host, port).map(|_| ())
    }

    fn is_configured(&self) -> bool {
        self.target.is_some()
    }
}
