//! Fixed-length packet framing over an unframed byte stream
//!
//! The Dendron link carries no start-of-frame marker, checksum or length
//! prefix. Packet boundaries are recovered purely by counting bytes from the
//! moment the link came up. A single dropped or duplicated byte therefore
//! shifts every following packet and the channel values decode as noise
//! until the link is re-established. The framer does not try to detect or
//! repair this; it must be [`cleared`](PacketFramer::clear) whenever the
//! transport reconnects so counting restarts at a true packet boundary.

use super::packet::{decode, SampleRecord, PACKET_SIZE};
use std::collections::VecDeque;

/// Accumulates transport chunks and yields whole packets
#[derive(Debug, Default)]
pub struct PacketFramer {
    pending: VecDeque<u8>,
}

impl PacketFramer {
    /// Create an empty framer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes delivered by the transport
    pub fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend(bytes.iter().copied());
    }

    /// Number of bytes waiting for a complete packet
    pub fn buffered_len(&self) -> usize {
        self.pending.len()
    }

    /// Take exactly one packet's worth of bytes, if available.
    ///
    /// Anything beyond the first [`PACKET_SIZE`] bytes stays buffered.
    pub fn next_packet(&mut self) -> Option<[u8; PACKET_SIZE]> {
        if self.pending.len() < PACKET_SIZE {
            return None;
        }
        let mut packet = [0u8; PACKET_SIZE];
        for (slot, byte) in packet.iter_mut().zip(self.pending.drain(..PACKET_SIZE)) {
            *slot = byte;
        }
        Some(packet)
    }

    /// Decode the next complete packet, if available
    pub fn next_record(&mut self) -> Option<SampleRecord> {
        self.next_packet().map(|packet| decode(&packet))
    }

    /// Drop any partial packet (call on every reconnection)
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

impl Iterator for PacketFramer {
    type Item = SampleRecord;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record()
    }
}
