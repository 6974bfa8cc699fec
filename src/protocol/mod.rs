//! Dendron wire protocol
//!
//! - [`packet`] - 48-byte telemetry packet layout and decoder
//! - [`framer`] - recovers packet boundaries from the raw byte stream
//! - [`command`] - single-byte host-to-device commands

pub mod command;
pub mod framer;
pub mod packet;

pub use command::{is_dendron_device, ChannelMode, DeviceCommand};
pub use framer::PacketFramer;
pub use packet::{decode, decode_slice, sign_extend_24, SampleRecord, CHANNEL_COUNT, PACKET_SIZE};
