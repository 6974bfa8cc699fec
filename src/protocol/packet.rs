//! Dendron telemetry packet decoding
//!
//! Every packet is exactly [`PACKET_SIZE`] bytes, little-endian throughout:
//!
//! ```text
//! offset  size  field
//!      0     4  sequence number (u32)
//!      4     4  status flags (u32, opaque)
//!      8    32  8 x channel value (u32 container, low 24 bits, two's complement)
//!     44     4  battery (i32, hundredths)
//! ```
//!
//! Decoding consumes every byte as a fixed field, so it cannot fail on
//! content. The only precondition is length, which the type system enforces
//! through `&[u8; PACKET_SIZE]`.

use serde::{Deserialize, Serialize};

/// Size of one telemetry packet in bytes
pub const PACKET_SIZE: usize = 48;

/// Number of analog channels carried by every packet
pub const CHANNEL_COUNT: usize = 8;

const CHANNELS_OFFSET: usize = 8;
const BATTERY_OFFSET: usize = 44;
const SIGN_BIT_24: u32 = 0x0080_0000;
const SIGN_EXTEND_24: u32 = 0xFF00_0000;

/// One decoded telemetry packet
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    /// Per-session packet counter, wraps at 2^32. Display and recording only.
    pub sequence_number: u32,
    /// Opaque device status word
    pub status: u32,
    /// Sign-extended 24-bit readings for all eight channels
    pub channel_values: [i32; CHANNEL_COUNT],
    /// Battery level in volts (raw hundredths / 100)
    pub battery_level: f64,
}

impl SampleRecord {
    /// Build a record from already-decoded values (tests, simulators)
    pub fn new(sequence_number: u32, channel_values: [i32; CHANNEL_COUNT]) -> Self {
        Self {
            sequence_number,
            status: 0,
            channel_values,
            battery_level: 0.0,
        }
    }

    /// Encode back into the wire layout.
    ///
    /// Channel values are truncated to their low 24 bits and the battery is
    /// rounded to hundredths, so `decode(&r.encode()) == r` only holds for
    /// records that came from the wire in the first place.
    pub fn encode(&self) -> [u8; PACKET_SIZE] {
        let mut out = [0u8; PACKET_SIZE];
        out[0..4].copy_from_slice(&self.sequence_number.to_le_bytes());
        out[4..8].copy_from_slice(&self.status.to_le_bytes());
        for (i, value) in self.channel_values.iter().enumerate() {
            let start = CHANNELS_OFFSET + i * 4;
            let raw = (*value as u32) & 0x00FF_FFFF;
            out[start..start + 4].copy_from_slice(&raw.to_le_bytes());
        }
        let battery_raw = (self.battery_level * 100.0).round() as i32;
        out[BATTERY_OFFSET..PACKET_SIZE].copy_from_slice(&battery_raw.to_le_bytes());
        out
    }
}

/// Widen a 24-bit two's-complement field stored in a 32-bit container.
///
/// Only the low 24 bits are meaningful. When bit 23 is set the upper byte is
/// filled with ones; otherwise the container is taken as-is, matching the
/// device firmware which always sends a zero upper byte.
#[inline]
pub fn sign_extend_24(raw: u32) -> i32 {
    if raw & SIGN_BIT_24 != 0 {
        (raw | SIGN_EXTEND_24) as i32
    } else {
        raw as i32
    }
}

#[inline]
fn read_u32(bytes: &[u8; PACKET_SIZE], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// Decode one packet. Total and deterministic.
pub fn decode(bytes: &[u8; PACKET_SIZE]) -> SampleRecord {
    let mut channel_values = [0i32; CHANNEL_COUNT];
    for (i, slot) in channel_values.iter_mut().enumerate() {
        *slot = sign_extend_24(read_u32(bytes, CHANNELS_OFFSET + i * 4));
    }

    let battery_raw = read_u32(bytes, BATTERY_OFFSET) as i32;

    SampleRecord {
        sequence_number: read_u32(bytes, 0),
        status: read_u32(bytes, 4),
        channel_values,
        battery_level: f64::from(battery_raw) / 100.0,
    }
}

/// Decode from a slice, returning `None` unless it is exactly one packet long.
///
/// A short slice is the "wait for more data" condition, never a partial
/// decode.
pub fn decode_slice(bytes: &[u8]) -> Option<SampleRecord> {
    let packet: &[u8; PACKET_SIZE] = bytes.try_into().ok()?;
    Some(decode(packet))
}
