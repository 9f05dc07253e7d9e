//! TCP transport adapter.
//!
//! Implements [`TransportProvider`] for the gateway's Wi-Fi bridge, which
//! speaks the same line protocol over a plain TCP socket.  There is no
//! discovery: `scan` returns the endpoints registered up front.
//!
//! Device ids are `host:port`; a bare host gets the configured default
//! gateway port.  Reads use a socket read timeout equal to the link poll
//! interval, so `read()` returns `Ok(0)` when nothing arrived.

use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::{info, warn};

use crate::config::LinkConfig;
use crate::error::TransportError;
use crate::link::transport::{ByteStream, Device, TransportProvider};

pub struct TcpTransport {
    endpoints: Vec<Device>,
    connect_timeout: Duration,
    read_poll: Duration,
    write_timeout: Duration,
    default_port: u16,
}

impl TcpTransport {
    pub fn new(config: &LinkConfig) -> Self {
        Self {
            endpoints: Vec::new(),
            connect_timeout: config.connect_timeout(),
            read_poll: config.read_poll(),
            write_timeout: config.send_timeout(),
            default_port: config.default_tcp_port,
        }
    }

    /// Register an endpoint returned by [`scan`](TransportProvider::scan).
    pub fn with_endpoint(mut self, device: Device) -> Self {
        self.endpoints.push(device);
        self
    }

    fn resolve(&self, id: &str) -> Result<SocketAddr, TransportError> {
        if let Ok(addr) = id.parse::<SocketAddr>() {
            return Ok(addr);
        }
        let mut candidates = match id.to_socket_addrs() {
            Ok(addrs) => addrs,
            Err(_) => (id, self.default_port)
                .to_socket_addrs()
                .map_err(|_| TransportError::NotFound)?,
        };
        candidates.next().ok_or(TransportError::NotFound)
    }
}

impl TransportProvider for TcpTransport {
    fn scan(&self) -> Result<Vec<Device>, TransportError> {
        Ok(self.endpoints.clone())
    }

    fn open(&self, device: &Device) -> Result<Box<dyn ByteStream>, TransportError> {
        let addr = self.resolve(&device.id)?;
        let stream = TcpStream::connect_timeout(&addr, self.connect_timeout)?;
        stream.set_read_timeout(Some(self.read_poll))?;
        stream.set_write_timeout(Some(self.write_timeout))?;
        if stream.set_nodelay(true).is_err() {
            warn!("tcp: could not disable Nagle on {}", addr);
        }
        info!("tcp: connected to {}", addr);
        Ok(Box::new(TcpByteStream { stream, peer: addr }))
    }
}

struct TcpByteStream {
    stream: TcpStream,
    peer: SocketAddr,
}

impl ByteStream for TcpByteStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        match self.stream.read(buf) {
            Ok(0) => Err(TransportError::Closed),
            Ok(n) => Ok(n),
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                Ok(0)
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        Ok(self.stream.write(data)?)
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        Ok(self.stream.flush()?)
    }

    fn close(&mut self) {
        // NotConnected here just means the peer went first.
        let _ = self.stream.shutdown(Shutdown::Both);
        info!("tcp: closed {}", self.peer);
    }
}
