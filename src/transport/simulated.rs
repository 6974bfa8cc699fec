//! Simulated Dendron device for running without hardware
//!
//! The simulator obeys the start/stop/mark commands and emits well-formed
//! 48-byte packets at a fixed rate, each channel following a configurable
//! [`SignalPattern`] with a per-channel phase offset.
//!
//! ```bash
//! cargo run --features simulator -- --simulate
//! ```

use super::{ByteTransport, CommandSink, TransportEvent};
use crate::error::{DendronError, Result};
use crate::protocol::{DeviceCommand, SampleRecord, CHANNEL_COUNT};
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Status bit set on the first packet after a mark command
pub const STATUS_MARK: u32 = 0x0000_0001;

/// Largest magnitude a 24-bit channel can carry
const MAX_24_BIT: f64 = 8_388_607.0;

/// Waveform generated on every channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SignalPattern {
    /// Constant value
    Constant(i32),
    /// Sine wave
    Sine { frequency: f64, amplitude: f64 },
    /// Square wave
    Square { period: f64, amplitude: f64 },
    /// Linear ramp that resets every period
    Sawtooth { period: f64, amplitude: f64 },
}

impl Default for SignalPattern {
    fn default() -> Self {
        SignalPattern::Sine {
            frequency: 10.0,
            amplitude: 100_000.0,
        }
    }
}

impl SignalPattern {
    /// Value at `elapsed_secs`, clamped to the 24-bit range
    pub fn value_at(&self, elapsed_secs: f64) -> i32 {
        let value = match *self {
            SignalPattern::Constant(v) => f64::from(v),
            SignalPattern::Sine {
                frequency,
                amplitude,
            } => amplitude * (2.0 * std::f64::consts::PI * frequency * elapsed_secs).sin(),
            SignalPattern::Square { period, amplitude } => {
                if elapsed_secs % period < period / 2.0 {
                    amplitude
                } else {
                    -amplitude
                }
            }
            SignalPattern::Sawtooth { period, amplitude } => {
                amplitude * ((elapsed_secs % period) / period)
            }
        };
        value.clamp(-MAX_24_BIT - 1.0, MAX_24_BIT) as i32
    }
}

#[derive(Debug, Default)]
struct DeviceState {
    running: AtomicBool,
    streaming: AtomicBool,
    mark_pending: AtomicBool,
}

/// Transport backed by an in-process synthetic device
#[derive(Debug, Clone)]
pub struct SimulatedTransport {
    pattern: SignalPattern,
    sample_rate_hz: u32,
    battery_level: f64,
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self {
            pattern: SignalPattern::default(),
            sample_rate_hz: 250,
            battery_level: 3.9,
        }
    }
}

impl SimulatedTransport {
    /// Simulated device with default pattern and 250 Hz sample rate
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific waveform
    pub fn with_pattern(mut self, pattern: SignalPattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Packets per second while streaming
    pub fn with_sample_rate(mut self, hz: u32) -> Self {
        self.sample_rate_hz = hz.max(1);
        self
    }

    fn packet(&self, sequence: u32, elapsed_secs: f64, status: u32) -> [u8; crate::protocol::PACKET_SIZE] {
        let mut channel_values = [0i32; CHANNEL_COUNT];
        for (i, slot) in channel_values.iter_mut().enumerate() {
            let phase = i as f64 / (CHANNEL_COUNT as f64 * 10.0);
            *slot = self.pattern.value_at(elapsed_secs + phase);
        }
        let mut record = SampleRecord::new(sequence, channel_values);
        record.status = status;
        record.battery_level = self.battery_level;
        record.encode()
    }
}

impl ByteTransport for SimulatedTransport {
    fn open(&mut self, events: Sender<TransportEvent>) -> Result<Box<dyn CommandSink>> {
        let state = Arc::new(DeviceState::default());
        state.running.store(true, Ordering::SeqCst);

        let device = self.clone();
        let thread_state = state.clone();
        let interval = Duration::from_secs_f64(1.0 / f64::from(self.sample_rate_hz));

        std::thread::Builder::new()
            .name("dendron-simulator".to_string())
            .spawn(move || {
                let start = Instant::now();
                let mut sequence = 0u32;
                while thread_state.running.load(Ordering::SeqCst) {
                    if thread_state.streaming.load(Ordering::SeqCst) {
                        let status = if thread_state.mark_pending.swap(false, Ordering::SeqCst) {
                            STATUS_MARK
                        } else {
                            0
                        };
                        let packet =
                            device.packet(sequence, start.elapsed().as_secs_f64(), status);
                        if events.send(TransportEvent::Data(packet.to_vec())).is_err() {
                            break;
                        }
                        sequence = sequence.wrapping_add(1);
                    }
                    std::thread::sleep(interval);
                }
                tracing::debug!("Simulated device stopped after {} packets", sequence);
            })
            .map_err(|e| DendronError::Link(format!("Failed to start simulator: {}", e)))?;

        tracing::info!("Simulated device at {} Hz", self.sample_rate_hz);
        Ok(Box::new(SimulatedCommandSink { state }))
    }

    fn describe(&self) -> String {
        format!("simulated device ({} Hz)", self.sample_rate_hz)
    }
}

struct SimulatedCommandSink {
    state: Arc<DeviceState>,
}

impl CommandSink for SimulatedCommandSink {
    fn send_command(&mut self, command: DeviceCommand) -> Result<()> {
        if !self.state.running.load(Ordering::SeqCst) {
            return Err(DendronError::Link("simulated link closed".to_string()));
        }
        if command.to_bytes().is_none() {
            return Err(DendronError::InvalidCommand(command.to_string()));
        }
        match command {
            DeviceCommand::Start => self.state.streaming.store(true, Ordering::SeqCst),
            DeviceCommand::Stop => self.state.streaming.store(false, Ordering::SeqCst),
            DeviceCommand::Mark => self.state.mark_pending.store(true, Ordering::SeqCst),
            other => tracing::debug!("Simulator ignoring {}", other),
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        self.state.running.store(false, Ordering::SeqCst);
    }
}

impl Drop for SimulatedCommandSink {
    fn drop(&mut self) {
        self.shutdown();
    }
}
