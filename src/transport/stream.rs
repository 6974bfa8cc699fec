//! Transports over ordinary byte streams
//!
//! Any duplex stream that can be cloned into an independent read handle
//! works: a reader thread owns one handle and forwards chunks as
//! [`TransportEvent::Data`], the [`StreamCommandSink`] owns the other.

use super::{ByteTransport, CommandSink, TransportEvent};
use crate::error::{DendronError, Result};
use crate::protocol::DeviceCommand;
use crossbeam_channel::Sender;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::Duration;

/// Size of a single read from the link
const READ_CHUNK_SIZE: usize = 4096;

/// Default TCP connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// A byte stream that can be split into independent read and write handles
pub trait DuplexStream: Read + Write + Send + Sized + 'static {
    /// Second handle onto the same underlying stream
    fn try_clone_stream(&self) -> std::io::Result<Self>;

    /// Unblock pending reads and close the stream, if the OS supports it
    fn shutdown_stream(&self) {}
}

impl DuplexStream for TcpStream {
    fn try_clone_stream(&self) -> std::io::Result<Self> {
        self.try_clone()
    }

    fn shutdown_stream(&self) {
        let _ = self.shutdown(Shutdown::Both);
    }
}

impl DuplexStream for File {
    fn try_clone_stream(&self) -> std::io::Result<Self> {
        self.try_clone()
    }
}

/// Forward everything read from `reader` into `events` on a new thread.
///
/// The thread exits on EOF, on a read error, or once the receiving side of
/// `events` is dropped.
pub fn spawn_reader<R>(mut reader: R, events: Sender<TransportEvent>) -> std::io::Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    std::thread::Builder::new()
        .name("dendron-link-reader".to_string())
        .spawn(move || {
            let mut buf = [0u8; READ_CHUNK_SIZE];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => {
                        tracing::debug!("Link reader reached end of stream");
                        let _ = events.send(TransportEvent::Disconnected);
                        break;
                    }
                    Ok(n) => {
                        if events.send(TransportEvent::Data(buf[..n].to_vec())).is_err() {
                            tracing::debug!("Link event receiver dropped, reader exiting");
                            break;
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => {
                        tracing::debug!("Link read failed: {}", e);
                        let _ = events.send(TransportEvent::Error(e.to_string()));
                        break;
                    }
                }
            }
        })
}

/// Command writer for a [`DuplexStream`]
#[derive(Debug)]
pub struct StreamCommandSink<S: DuplexStream> {
    stream: S,
    closed: bool,
}

impl<S: DuplexStream> StreamCommandSink<S> {
    /// Wrap the write handle of a link
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            closed: false,
        }
    }
}

impl<S: DuplexStream> CommandSink for StreamCommandSink<S> {
    fn send_command(&mut self, command: DeviceCommand) -> Result<()> {
        if self.closed {
            return Err(DendronError::Link("link already closed".to_string()));
        }
        let bytes = command
            .to_bytes()
            .ok_or_else(|| DendronError::InvalidCommand(command.to_string()))?;
        self.stream
            .write_all(&bytes)
            .and_then(|_| self.stream.flush())
            .map_err(|e| DendronError::Link(format!("Failed to send {}: {}", command, e)))?;
        tracing::trace!("Sent device command {}", command);
        Ok(())
    }

    fn shutdown(&mut self) {
        if !self.closed {
            self.stream.shutdown_stream();
            self.closed = true;
        }
    }
}

impl<S: DuplexStream> Drop for StreamCommandSink<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn open_duplex<S: DuplexStream>(stream: S, events: Sender<TransportEvent>) -> Result<Box<dyn CommandSink>> {
    let reader = stream
        .try_clone_stream()
        .map_err(|e| DendronError::Link(format!("Failed to clone link handle: {}", e)))?;
    spawn_reader(reader, events)
        .map_err(|e| DendronError::Link(format!("Failed to spawn link reader: {}", e)))?;
    Ok(Box::new(StreamCommandSink::new(stream)))
}

/// Link over TCP, e.g. an RFCOMM bridge or a device emulator
#[derive(Debug, Clone)]
pub struct TcpTransport {
    address: String,
    connect_timeout: Duration,
}

impl TcpTransport {
    /// Transport for `host:port`
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl ByteTransport for TcpTransport {
    fn open(&mut self, events: Sender<TransportEvent>) -> Result<Box<dyn CommandSink>> {
        let addr = self
            .address
            .to_socket_addrs()
            .map_err(|e| DendronError::Link(format!("{}: {}", self.address, e)))?
            .next()
            .ok_or_else(|| DendronError::Link(format!("{} did not resolve", self.address)))?;

        let stream = TcpStream::connect_timeout(&addr, self.connect_timeout)
            .map_err(|e| DendronError::Link(format!("Failed to connect to {}: {}", addr, e)))?;
        let _ = stream.set_nodelay(true);

        tracing::info!("Connected to {}", addr);
        open_duplex(stream, events)
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.address)
    }
}

/// Link over a character device such as a bound RFCOMM TTY.
///
/// Closing a file does not interrupt a blocked read, so after a disconnect
/// the reader thread lingers until the device delivers its next byte or
/// hangs up; its output is discarded because the event receiver is gone.
#[derive(Debug, Clone)]
pub struct DeviceFileTransport {
    path: PathBuf,
}

impl DeviceFileTransport {
    /// Transport for the device node at `path`
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ByteTransport for DeviceFileTransport {
    fn open(&mut self, events: Sender<TransportEvent>) -> Result<Box<dyn CommandSink>> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(|e| DendronError::Link(format!("Failed to open {}: {}", self.path.display(), e)))?;

        tracing::info!("Opened {}", self.path.display());
        open_duplex(file, events)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
