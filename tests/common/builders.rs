//! Test data builders for creating packets and configs

use dendron_rs::config::DendronConfig;
use dendron_rs::protocol::{SampleRecord, CHANNEL_COUNT, PACKET_SIZE};
use std::path::Path;

/// Builder for wire packets
pub struct PacketBuilder {
    record: SampleRecord,
}

impl PacketBuilder {
    pub fn new(sequence_number: u32) -> Self {
        Self {
            record: SampleRecord::new(sequence_number, [0; CHANNEL_COUNT]),
        }
    }

    pub fn channels(mut self, values: [i32; CHANNEL_COUNT]) -> Self {
        self.record.channel_values = values;
        self
    }

    pub fn status(mut self, status: u32) -> Self {
        self.record.status = status;
        self
    }

    pub fn battery(mut self, level: f64) -> Self {
        self.record.battery_level = level;
        self
    }

    pub fn record(&self) -> SampleRecord {
        self.record
    }

    pub fn bytes(&self) -> [u8; PACKET_SIZE] {
        self.record.encode()
    }
}

/// `count` consecutive packets starting at sequence 0, all carrying `values`
pub fn packet_stream(count: u32, values: [i32; CHANNEL_COUNT]) -> Vec<u8> {
    (0..count)
        .flat_map(|seq| PacketBuilder::new(seq).channels(values).bytes())
        .collect()
}

/// Config with a small scope and recordings going to `data_dir`
pub fn test_config(data_dir: &Path) -> DendronConfig {
    let mut config = DendronConfig::default();
    config.data.path = data_dir.to_path_buf();
    config.scope.capacity = 16;
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use dendron_rs::protocol::decode;

    #[test]
    fn test_packet_builder() {
        let bytes = PacketBuilder::new(9)
            .channels([1, 2, 3, 4, 5, 6, 7, 8])
            .battery(3.75)
            .bytes();
        let record = decode(&bytes);
        assert_eq!(record.sequence_number, 9);
        assert_eq!(record.channel_values[7], 8);
        assert_eq!(record.battery_level, 3.75);
    }
}
