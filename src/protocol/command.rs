//! Device command bytes
//!
//! Commands are plain ASCII written to the link with no framing or reply.

use serde::{Deserialize, Serialize};

use super::packet::CHANNEL_COUNT;

/// Start pushing packets
pub const CMD_START: u8 = b'l';
/// Stop pushing packets
pub const CMD_STOP: u8 = b's';
/// Insert an event mark in the device stream
pub const CMD_MARK: u8 = b'm';
/// Request a battery reading
pub const CMD_BATTERY: u8 = b'b';

/// Substring identifying Dendron units in Bluetooth discovery results
pub const DEVICE_NAME_TAG: &str = "DENDRON";

/// Whether a discovered device name belongs to a Dendron unit
pub fn is_dendron_device(name: &str) -> bool {
    name.contains(DEVICE_NAME_TAG)
}

/// Front-end configuration of a single analog channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelMode {
    /// Internal test signal
    Test,
    /// Input shorted to ground
    Ground,
    /// Normal electrode input
    Normal,
}

impl ChannelMode {
    /// Mode letter sent on the wire
    pub fn as_byte(self) -> u8 {
        match self {
            ChannelMode::Test => b't',
            ChannelMode::Ground => b'g',
            ChannelMode::Normal => b'n',
        }
    }

    /// Parse a mode letter (`t`, `g` or `n`)
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b't' => Some(ChannelMode::Test),
            b'g' => Some(ChannelMode::Ground),
            b'n' => Some(ChannelMode::Normal),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChannelMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelMode::Test => write!(f, "test"),
            ChannelMode::Ground => write!(f, "ground"),
            ChannelMode::Normal => write!(f, "normal"),
        }
    }
}

/// A command the host can send to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceCommand {
    /// Begin streaming (`l`)
    Start,
    /// Stop streaming (`s`)
    Stop,
    /// Mark an event (`m`)
    Mark,
    /// Ask for a battery reading (`b`)
    QueryBattery,
    /// Switch one channel's input mode (`t1`, `g4`, `n0`, ...)
    SetChannelMode {
        /// Target mode
        mode: ChannelMode,
        /// Channel index, `0..8`
        channel: u8,
    },
}

impl DeviceCommand {
    /// Wire bytes for this command, or `None` for an out-of-range channel
    pub fn to_bytes(self) -> Option<Vec<u8>> {
        match self {
            DeviceCommand::Start => Some(vec![CMD_START]),
            DeviceCommand::Stop => Some(vec![CMD_STOP]),
            DeviceCommand::Mark => Some(vec![CMD_MARK]),
            DeviceCommand::QueryBattery => Some(vec![CMD_BATTERY]),
            DeviceCommand::SetChannelMode { mode, channel } => {
                if usize::from(channel) >= CHANNEL_COUNT {
                    return None;
                }
                Some(vec![mode.as_byte(), b'0' + channel])
            }
        }
    }
}

impl std::fmt::Display for DeviceCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceCommand::Start => write!(f, "start"),
            DeviceCommand::Stop => write!(f, "stop"),
            DeviceCommand::Mark => write!(f, "mark"),
            DeviceCommand::QueryBattery => write!(f, "battery"),
            DeviceCommand::SetChannelMode { mode, channel } => {
                write!(f, "mode {} ch{}", mode, channel)
            }
        }
    }
}
