//! Transport abstraction — any byte-oriented channel to a gateway.
//!
//! Concrete implementations:
//! - Bluetooth classic RFCOMM / USB serial (`SerialTransport`, `serial` feature)
//! - TCP socket to the gateway's Wi-Fi bridge (`TcpTransport`)
//!
//! The connection manager is generic over [`TransportProvider`], so adding
//! a new transport requires zero changes to the link logic.

use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// A discovered endpoint.  Identity is `id`; immutable once discovered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Device {
    /// Stable address (MAC, `host:port`, tty path).
    pub id: String,
    pub display_name: Option<String>,
}

impl Device {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
        }
    }

    pub fn named(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: Some(name.into()),
        }
    }

    /// Name for humans: the display name if known, else the address.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

/// Byte-oriented stream to one gateway.
///
/// Owned exclusively by the connection manager for the session lifetime.
pub trait ByteStream: Send {
    /// Read up to `buf.len()` bytes into `buf`.
    /// Returns the number of bytes actually read.
    /// Returns 0 if no data arrived within the stream's poll interval;
    /// end of stream is reported as [`TransportError::Closed`].
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Write `data` to the stream.
    /// Returns the number of bytes actually written.
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError>;

    /// Flush any buffered output.
    fn flush(&mut self) -> Result<(), TransportError>;

    /// Release the underlying channel.  Called exactly once per session.
    fn close(&mut self);

    /// Write all of `data`, retrying short writes.
    fn write_all(&mut self, mut data: &[u8]) -> Result<(), TransportError> {
        while !data.is_empty() {
            match self.write(data)? {
                0 => return Err(TransportError::Closed),
                n => data = &data[n..],
            }
        }
        self.flush()
    }
}

/// Discovers devices and opens streams to them (the OS radio stack,
/// a serial port enumerator, a list of TCP endpoints...).
pub trait TransportProvider: Send + Sync + 'static {
    /// Enumerate reachable devices.  May return a different set each call.
    fn scan(&self) -> Result<Vec<Device>, TransportError>;

    /// Open a stream to `device`.
    fn open(&self, device: &Device) -> Result<Box<dyn ByteStream>, TransportError>;
}

/// A stream that discards all writes and never reads.
/// Useful as a placeholder when no gateway is attached.
pub struct NullStream;

impl ByteStream for NullStream {
    fn read(&mut self, _buf: &mut [u8]) -> Result<usize, TransportError> {
        Ok(0)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn close(&mut self) {}
}
