//! Error handling for the Dendron streaming core
//!
//! All failures live at the I/O boundaries: the recording file, the
//! broadcast endpoint and the device link. Decoding and buffering never
//! fail once the caller honours the 48-byte framing precondition, so an
//! incomplete packet is represented as `None` rather than as an error.

use thiserror::Error;

/// Main error type for Dendron operations
#[derive(Error, Debug)]
pub enum DendronError {
    /// Recording file could not be opened, written or flushed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Broadcast endpoint could not be resolved or bound
    #[error("Address error: {0}")]
    Address(String),

    /// Device transport reported an error or dropped the link
    #[error("Link error: {0}")]
    Link(String),

    /// Command that has no wire encoding (e.g. channel index out of range)
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// Errors related to configuration loading/saving/validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to channel communication
    #[error("Channel error: {0}")]
    Channel(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<DendronError>,
    },
}

impl DendronError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        DendronError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// True if this error (or the error it wraps) came from the device link
    pub fn is_link_error(&self) -> bool {
        match self {
            DendronError::Link(_) => true,
            DendronError::WithContext { source, .. } => source.is_link_error(),
            _ => false,
        }
    }
}

/// Result type alias for Dendron operations
pub type Result<T> = std::result::Result<T, DendronError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| DendronError::Io(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| DendronError::Io(e).with_context(f()))
    }
}
