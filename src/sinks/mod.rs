//! Optional consumers of decoded samples
//!
//! - [`recording`] - append-only CSV file per recording session
//! - [`broadcast`] - OSC over UDP, one message per sample
//!
//! Both are reached through small traits so the session can be driven by
//! in-memory fakes in tests.

pub mod broadcast;
pub mod recording;

pub use broadcast::{encode_osc_message, BroadcastSink, OscBroadcaster};
pub use recording::{csv_line, recording_file_name, CsvRecorder, RecordingSink};
