//! Rolling scope buffer for live visualization
//!
//! The buffer mirrors an oscilloscope trace rather than a time series: one
//! fixed-length y-array per displayed channel, a shared write cursor that
//! sweeps left to right and wraps, and a constant x-axis `0..capacity`.
//! Readers always get arrays in storage order, so after the first wrap the
//! oldest sample sits just after the cursor, not at index 0.
//!
//! # Render decimation
//!
//! Packets arrive far faster than a display needs to redraw. Every push
//! advances a decimation counter and [`ScopeBuffer::should_notify_render`]
//! reports true once per `render_division` pushes (pushes 1, D+1, 2D+1, ...).
//!
//! # Consistency
//!
//! `push` writes every channel before moving the cursor and `&mut self`
//! guarantees no reader can observe the middle of that sequence. Readers on
//! another thread receive an owned [`ScopeFrame`] instead of a reference.

use crate::config::ScopeConfig;
use crate::error::{DendronError, Result};
use crate::protocol::CHANNEL_COUNT;
use serde::{Deserialize, Serialize};

/// Default number of samples per trace
pub const DEFAULT_CAPACITY: usize = 1024;

/// Default number of plotted channels
pub const DEFAULT_DISPLAY_CHANNELS: usize = 6;

/// Default push count between render notifications
pub const DEFAULT_RENDER_DIVISION: usize = 4;

/// Fixed-capacity multi-channel ring used as the scope trace
#[derive(Debug, Clone)]
pub struct ScopeBuffer {
    /// Immutable x-axis, `0.0..capacity`
    x_axis: Vec<f64>,
    /// One trace per displayed channel, each `capacity` long
    traces: Vec<Vec<f64>>,
    /// Next write position, always `< capacity`
    cursor: usize,
    /// Pushes between render notifications
    render_division: usize,
    /// Position within the current decimation period
    decimation_counter: usize,
    /// Set by `push`, cleared by `should_notify_render`
    render_pending: bool,
    /// Total pushes since construction or `clear`
    total_pushes: u64,
}

impl ScopeBuffer {
    /// Create a zero-filled buffer
    pub fn new(channel_count: usize, capacity: usize, render_division: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(DendronError::Config(
                "scope capacity must be greater than zero".to_string(),
            ));
        }
        if channel_count == 0 || channel_count > CHANNEL_COUNT {
            return Err(DendronError::Config(format!(
                "scope channel count must be between 1 and {}, got {}",
                CHANNEL_COUNT, channel_count
            )));
        }
        if render_division == 0 {
            return Err(DendronError::Config(
                "render division must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            x_axis: (0..capacity).map(|i| i as f64).collect(),
            traces: vec![vec![0.0; capacity]; channel_count],
            cursor: 0,
            render_division,
            decimation_counter: 0,
            render_pending: false,
            total_pushes: 0,
        })
    }

    /// Create a buffer from the `[scope]` configuration section
    pub fn from_config(config: &ScopeConfig) -> Result<Self> {
        Self::new(config.channels, config.capacity, config.render_division)
    }

    /// Number of samples per trace
    pub fn capacity(&self) -> usize {
        self.x_axis.len()
    }

    /// Number of displayed channels
    pub fn channel_count(&self) -> usize {
        self.traces.len()
    }

    /// Next write position
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Total pushes since construction or the last `clear`
    pub fn total_pushes(&self) -> u64 {
        self.total_pushes
    }

    /// Write one sample for every displayed channel and advance the cursor.
    ///
    /// Only the first `channel_count()` decoded channels are stored.
    pub fn push(&mut self, channel_values: &[i32; CHANNEL_COUNT]) {
        for (trace, value) in self.traces.iter_mut().zip(channel_values.iter()) {
            trace[self.cursor] = f64::from(*value);
        }
        self.cursor = (self.cursor + 1) % self.capacity();

        if self.decimation_counter == 0 {
            self.render_pending = true;
        }
        self.decimation_counter = (self.decimation_counter + 1) % self.render_division;
        self.total_pushes += 1;
    }

    /// True once per `render_division` pushes; resets after reporting
    pub fn should_notify_render(&mut self) -> bool {
        std::mem::take(&mut self.render_pending)
    }

    /// Shared x-axis and the full trace of one channel, in storage order
    pub fn snapshot(&self, channel: usize) -> Option<(&[f64], &[f64])> {
        self.traces
            .get(channel)
            .map(|trace| (self.x_axis.as_slice(), trace.as_slice()))
    }

    /// Trace of one channel as `[x, y]` pairs for plotting libraries
    pub fn plot_points(&self, channel: usize) -> Vec<[f64; 2]> {
        match self.snapshot(channel) {
            Some((x, y)) => x.iter().zip(y).map(|(x, y)| [*x, *y]).collect(),
            None => Vec::new(),
        }
    }

    /// Owned copy of every trace, safe to hand to another thread
    pub fn frame(&self) -> ScopeFrame {
        ScopeFrame {
            cursor: self.cursor,
            traces: self.traces.clone(),
        }
    }

    /// Zero every trace and rewind the cursor and decimation counter
    pub fn clear(&mut self) {
        for trace in &mut self.traces {
            trace.fill(0.0);
        }
        self.cursor = 0;
        self.decimation_counter = 0;
        self.render_pending = false;
        self.total_pushes = 0;
    }
}

/// Owned snapshot of the scope, published to render consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeFrame {
    /// Write cursor at the time of the snapshot
    pub cursor: usize,
    /// One trace per displayed channel, storage order
    pub traces: Vec<Vec<f64>>,
}

impl ScopeFrame {
    /// Samples per trace
    pub fn capacity(&self) -> usize {
        self.traces.first().map(Vec::len).unwrap_or(0)
    }

    /// The x-axis matching these traces
    pub fn x_axis(&self) -> Vec<f64> {
        (0..self.capacity()).map(|i| i as f64).collect()
    }
}
