//! CSV recording sink
//!
//! One file per recording session, created in the configured data directory
//! and named after the local time the recording started:
//!
//! ```text
//! 2024_3_7-9_5_2-41.csv      year_month_day-hour_minute_second-millis
//! ```
//!
//! Fields are not zero padded, so lexical order of file names does not match
//! chronological order. Each line is `seq,ch0,ch1,ch2,ch3,ch4,ch5,ch6,ch7`
//! with no header row; all eight decoded channels are written no matter how
//! many the scope displays.

use crate::error::{DendronError, Result, ResultExt};
use crate::protocol::SampleRecord;
use chrono::{Datelike, Local, NaiveDateTime, Timelike};
use std::fmt::Write as FmtWrite;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Destination for decoded samples while recording is active
#[cfg_attr(test, mockall::automock)]
pub trait RecordingSink: Send {
    /// Append one sample. `Ok` means the line reached the OS.
    fn write_sample(&mut self, record: &SampleRecord) -> Result<()>;

    /// Flush and release the output. Closing twice is a no-op.
    fn close(&mut self) -> Result<()>;

    /// Number of samples written so far
    fn lines_written(&self) -> u64;

    /// Backing file, if the sink has one
    fn path(&self) -> Option<PathBuf>;
}

/// File name for a recording started at `timestamp`
pub fn recording_file_name<T: Datelike + Timelike>(timestamp: &T) -> String {
    // nanosecond() exceeds 1e9 during a leap second
    let millis = (timestamp.nanosecond() % 1_000_000_000) / 1_000_000;
    format!(
        "{}_{}_{}-{}_{}_{}-{}.csv",
        timestamp.year(),
        timestamp.month(),
        timestamp.day(),
        timestamp.hour(),
        timestamp.minute(),
        timestamp.second(),
        millis
    )
}

/// One CSV line for a sample, including the trailing newline
pub fn csv_line(record: &SampleRecord) -> String {
    let mut line = record.sequence_number.to_string();
    for value in &record.channel_values {
        let _ = write!(line, ",{}", value);
    }
    line.push('\n');
    line
}

/// Append-only CSV writer bound to a single file
#[derive(Debug)]
pub struct CsvRecorder {
    writer: Option<BufWriter<File>>,
    path: PathBuf,
    lines_written: u64,
}

impl CsvRecorder {
    /// Open a new recording file in `directory` named after `timestamp`.
    ///
    /// The directory must already exist.
    pub fn open(directory: impl AsRef<Path>, timestamp: &NaiveDateTime) -> Result<Self> {
        let path = directory.as_ref().join(recording_file_name(timestamp));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Could not open {} for writing", path.display()))?;

        tracing::info!("Recording to {}", path.display());
        Ok(Self {
            writer: Some(BufWriter::new(file)),
            path,
            lines_written: 0,
        })
    }

    /// Open a new recording file named after the current local time
    pub fn open_now(directory: impl AsRef<Path>) -> Result<Self> {
        Self::open(directory, &Local::now().naive_local())
    }

    /// Whether the file is still open
    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }
}

impl RecordingSink for CsvRecorder {
    fn write_sample(&mut self, record: &SampleRecord) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(DendronError::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "recording already closed",
            )));
        };
        writer
            .write_all(csv_line(record).as_bytes())
            .and_then(|_| writer.flush())
            .with_context(|| format!("Failed to write to {}", self.path.display()))?;
        self.lines_written += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .with_context(|| format!("Failed to flush {}", self.path.display()))?;
            tracing::info!(
                "Closed recording {} ({} samples)",
                self.path.display(),
                self.lines_written
            );
        }
        Ok(())
    }

    fn lines_written(&self) -> u64 {
        self.lines_written
    }

    fn path(&self) -> Option<PathBuf> {
        Some(self.path.clone())
    }
}

impl Drop for CsvRecorder {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("Recording not flushed cleanly: {}", e);
        }
    }
}
