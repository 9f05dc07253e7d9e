//! Connection manager — owns the single transport session.
//!
//! ```text
//!            connect()                 open ok
//!   Idle ───────────────▶ Connecting ───────────▶ Open
//!    ▲                        │ open failed /       │ disconnect()
//!    │                        │ cancelled           ▼
//!    ├────────────────────────┘                  Closing
//!    │                                              │ workers joined,
//!    ├──────────────────────────────────────────────┘ stream closed
//!    │  read error / peer close (ConnectionLost)
//!    └──────────────────────────────────────────── Open
//! ```
//!
//! Each session runs two worker threads:
//!
//! 1. **Read** — polls the stream, frames and parses lines, and calls the
//!    registered handler for every decoded response in arrival order.
//! 2. **Write** — drains a request channel and acknowledges each write,
//!    so `send` can give up after the configured timeout without leaving
//!    the stream half-owned.
//!
//! A session counter tags every session; a worker that fails after its
//! session was already torn down leaves the new state alone.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use super::transport::{ByteStream, Device, TransportProvider};
use crate::app::events::LinkEvent;
use crate::app::ports::EventSink;
use crate::config::LinkConfig;
use crate::error::{Error, Result, TransportError, UsageError};
use crate::protocol::response::{Response, ResponseParser};

/// Back-off when a stream read returns no data immediately.
const IDLE_BACKOFF: Duration = Duration::from_millis(1);

/// Called on the read thread for every decoded response.
pub type ResponseHandler = Box<dyn FnMut(Response) + Send + 'static>;

/// Session lifecycle state.  `Closed` is folded into `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closing,
}

type SharedStream = Arc<Mutex<Box<dyn ByteStream>>>;

struct WriteRequest {
    data: Vec<u8>,
    /// The caller has given up after this; the frame must not go out.
    deadline: Instant,
    ack: mpsc::SyncSender<core::result::Result<(), TransportError>>,
}

/// The one open session.
struct Connection {
    device: Device,
    stream: SharedStream,
    stop: Arc<AtomicBool>,
    writer_tx: mpsc::Sender<WriteRequest>,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

struct Slot {
    state: ConnectionState,
    connection: Option<Connection>,
    /// Bumped whenever a session starts or is torn down.
    session: u64,
}

struct Shared {
    slot: Mutex<Slot>,
    sink: Arc<dyn EventSink>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read-loop failure path: tear the session down if it is still ours.
    fn connection_lost(&self, session: u64, cause: TransportError) {
        let connection = {
            let mut slot = self.lock();
            if slot.session != session || slot.state != ConnectionState::Open {
                return;
            }
            slot.session += 1;
            slot.state = ConnectionState::Idle;
            slot.connection.take()
        };

        if let Some(connection) = connection {
            let cause = Error::TransportRead(cause);
            warn!("link: connection to {} lost: {}", connection.device.label(), cause);
            release(connection);
        }
        self.sink.emit(&LinkEvent::ConnectionLost);
    }
}

/// Single-session connection manager over a [`TransportProvider`].
pub struct ConnectionManager<P: TransportProvider> {
    provider: Arc<P>,
    config: LinkConfig,
    shared: Arc<Shared>,
}

impl<P: TransportProvider> ConnectionManager<P> {
    pub fn new(provider: P, config: LinkConfig, sink: Arc<dyn EventSink>) -> Self {
        Self {
            provider: Arc::new(provider),
            config,
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot {
                    state: ConnectionState::Idle,
                    connection: None,
                    session: 0,
                }),
                sink,
            }),
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// The device of the open session, if any.
    pub fn connected_device(&self) -> Option<Device> {
        self.shared
            .lock()
            .connection
            .as_ref()
            .map(|c| c.device.clone())
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Enumerate devices through the transport provider.
    pub fn scan(&self) -> Result<Vec<Device>> {
        self.provider.scan().map_err(Error::TransportOpen)
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Open a session to `device` and start the read loop.
    ///
    /// Only valid from `Idle`, and only with a valid [`LinkConfig`].
    /// `handler` runs on the read thread for every decoded response until
    /// the session ends; a panicking handler ends the session as lost.
    pub fn connect(&self, device: &Device, handler: ResponseHandler) -> Result<()> {
        self.config.validate()?;
        let session = {
            let mut slot = self.shared.lock();
            match slot.state {
                ConnectionState::Idle => {}
                ConnectionState::Connecting => return Err(UsageError::AlreadyConnecting.into()),
                ConnectionState::Open => return Err(UsageError::AlreadyConnected.into()),
                ConnectionState::Closing => return Err(UsageError::Closing.into()),
            }
            slot.state = ConnectionState::Connecting;
            slot.session += 1;
            slot.session
        };

        info!("link: connecting to {} ({})", device.label(), device.id);
        let opened = open_with_timeout(&self.provider, device, self.config.connect_timeout());

        let mut slot = self.shared.lock();
        if slot.session != session || slot.state != ConnectionState::Connecting {
            // disconnect() cancelled this attempt while the transport was busy.
            drop(slot);
            if let Ok(mut stream) = opened {
                stream.close();
            }
            info!("link: connect to {} cancelled", device.label());
            return Err(Error::TransportOpen(TransportError::Disconnected));
        }

        let stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                slot.state = ConnectionState::Idle;
                drop(slot);
                warn!("link: connect to {} failed: {}", device.label(), e);
                self.shared.sink.emit(&LinkEvent::ConnectionError(format!(
                    "Failed to connect to {}: {}",
                    device.label(),
                    e
                )));
                return Err(Error::TransportOpen(e));
            }
        };

        let connection = match self.spawn_workers(session, device, stream, handler) {
            Ok(connection) => connection,
            Err(e) => {
                slot.state = ConnectionState::Idle;
                drop(slot);
                self.shared
                    .sink
                    .emit(&LinkEvent::ConnectionError(format!("Failed to start link: {}", e)));
                return Err(Error::TransportOpen(e));
            }
        };

        slot.connection = Some(connection);
        slot.state = ConnectionState::Open;
        drop(slot);

        info!("link: connected to {}", device.label());
        self.shared.sink.emit(&LinkEvent::Connected(device.clone()));
        Ok(())
    }

    /// Write one encoded frame to the open session.
    ///
    /// A failed or timed-out write is reported but does not change the
    /// connection state; escalating to `disconnect` is the caller's call.
    /// A frame still queued when its send times out is discarded.
    pub fn send(&self, bytes: &[u8]) -> Result<()> {
        let writer_tx = {
            let slot = self.shared.lock();
            match (slot.state, slot.connection.as_ref()) {
                (ConnectionState::Open, Some(connection)) => connection.writer_tx.clone(),
                (ConnectionState::Closing, _) => return Err(UsageError::Closing.into()),
                _ => return Err(UsageError::NotConnected.into()),
            }
        };

        let (ack_tx, ack_rx) = mpsc::sync_channel(1);
        let request = WriteRequest {
            data: bytes.to_vec(),
            deadline: Instant::now() + self.config.send_timeout(),
            ack: ack_tx,
        };
        if writer_tx.send(request).is_err() {
            return Err(Error::TransportWrite(TransportError::Disconnected));
        }
        drop(writer_tx);

        match ack_rx.recv_timeout(self.config.send_timeout()) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(Error::TransportWrite(e)),
            Err(RecvTimeoutError::Timeout) => {
                warn!("link: write timed out after {:?}", self.config.send_timeout());
                Err(Error::TransportWrite(TransportError::Timeout))
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(Error::TransportWrite(TransportError::Disconnected))
            }
        }
    }

    /// Close the session (or cancel a pending connect).
    ///
    /// Rejects new sends, stops and joins both workers, then closes the
    /// stream.  Returns `false` if there was nothing to close.
    pub fn disconnect(&self) -> bool {
        let connection = {
            let mut slot = self.shared.lock();
            match slot.state {
                ConnectionState::Idle | ConnectionState::Closing => return false,
                ConnectionState::Connecting => {
                    slot.session += 1;
                    slot.state = ConnectionState::Idle;
                    return true;
                }
                ConnectionState::Open => {
                    slot.session += 1;
                    slot.state = ConnectionState::Closing;
                    slot.connection.take()
                }
            }
        };

        if let Some(connection) = connection {
            info!("link: disconnecting from {}", connection.device.label());
            release(connection);
        }

        self.shared.lock().state = ConnectionState::Idle;
        self.shared.sink.emit(&LinkEvent::Disconnected);
        true
    }

    // ── Internal ──────────────────────────────────────────────

    fn spawn_workers(
        &self,
        session: u64,
        device: &Device,
        stream: Box<dyn ByteStream>,
        handler: ResponseHandler,
    ) -> core::result::Result<Connection, TransportError> {
        let stream: SharedStream = Arc::new(Mutex::new(stream));
        let stop = Arc::new(AtomicBool::new(false));
        let (writer_tx, writer_rx) = mpsc::channel::<WriteRequest>();

        let writer = {
            let stream = Arc::clone(&stream);
            thread::Builder::new()
                .name("link-tx".into())
                .spawn(move || write_loop(&stream, &writer_rx))
        };
        let writer = match writer {
            Ok(handle) => handle,
            Err(e) => {
                lock_stream(&stream).close();
                return Err(e.into());
            }
        };

        let reader = {
            let stream = Arc::clone(&stream);
            let stop = Arc::clone(&stop);
            let shared = Arc::clone(&self.shared);
            let chunk_size = self.config.read_chunk_size;
            thread::Builder::new()
                .name("link-rx".into())
                .spawn(move || read_loop(session, &stream, &stop, &shared, handler, chunk_size))
        };
        let reader = match reader {
            Ok(handle) => handle,
            Err(e) => {
                drop(writer_tx);
                join_worker(Some(writer));
                lock_stream(&stream).close();
                return Err(e.into());
            }
        };

        Ok(Connection {
            device: device.clone(),
            stream,
            stop,
            writer_tx,
            reader: Some(reader),
            writer: Some(writer),
        })
    }
}

impl<P: TransportProvider> Drop for ConnectionManager<P> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

// ── Workers ──────────────────────────────────────────────────

fn read_loop(
    session: u64,
    stream: &SharedStream,
    stop: &AtomicBool,
    shared: &Shared,
    mut handler: ResponseHandler,
    chunk_size: usize,
) {
    let mut parser = ResponseParser::new();
    let mut buf = vec![0u8; chunk_size];

    while !stop.load(Ordering::Acquire) {
        let read = lock_stream(stream).read(&mut buf);
        match read {
            Ok(0) => thread::sleep(IDLE_BACKOFF),
            Ok(n) => {
                for parsed in parser.feed(&buf[..n]) {
                    let response = match parsed {
                        Ok(response) => response,
                        Err(e) => {
                            warn!("link: dropping frame: {}", Error::Parse(e));
                            continue;
                        }
                    };
                    if panic::catch_unwind(AssertUnwindSafe(|| handler(response))).is_err() {
                        warn!("link: response handler panicked; dropping session");
                        shared.connection_lost(session, TransportError::Disconnected);
                        return;
                    }
                }
            }
            Err(e) => {
                if stop.load(Ordering::Acquire) {
                    break;
                }
                shared.connection_lost(session, e);
                return;
            }
        }
    }
    debug!("link: read loop stopped");
}

fn write_loop(stream: &SharedStream, requests: &mpsc::Receiver<WriteRequest>) {
    while let Ok(request) = requests.recv() {
        let mut guard = lock_stream(stream);
        if Instant::now() >= request.deadline {
            drop(guard);
            debug!("link: discarding {} byte frame past its send deadline", request.data.len());
            let _ = request.ack.send(Err(TransportError::Timeout));
            continue;
        }
        let result = guard.write_all(&request.data);
        drop(guard);
        if let Err(e) = &result {
            warn!("link: write failed: {}", e);
        }
        // The sender may have timed out and gone away; nothing to do then.
        let _ = request.ack.send(result);
    }
    debug!("link: write loop stopped");
}

/// Stop both workers, wait for them, and close the stream.
fn release(mut connection: Connection) {
    connection.stop.store(true, Ordering::Release);
    drop(connection.writer_tx);
    join_worker(connection.reader.take());
    join_worker(connection.writer.take());
    lock_stream(&connection.stream).close();
    info!("link: released stream to {}", connection.device.label());
}

fn join_worker(handle: Option<JoinHandle<()>>) {
    let Some(handle) = handle else { return };
    // The read loop tears itself down on failure; it cannot join itself.
    if handle.thread().id() == thread::current().id() {
        return;
    }
    if handle.join().is_err() {
        warn!("link: worker thread panicked");
    }
}

fn lock_stream(stream: &SharedStream) -> MutexGuard<'_, Box<dyn ByteStream>> {
    stream.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run `provider.open` on a helper thread and wait at most `timeout`.
///
/// A stream that arrives after the deadline is closed by the helper.
fn open_with_timeout<P: TransportProvider>(
    provider: &Arc<P>,
    device: &Device,
    timeout: Duration,
) -> core::result::Result<Box<dyn ByteStream>, TransportError> {
    let (tx, rx) = mpsc::sync_channel(1);
    let provider = Arc::clone(provider);
    let target = device.clone();

    thread::Builder::new()
        .name("link-open".into())
        .spawn(move || {
            let result = provider.open(&target);
            if let Err(mpsc::SendError(Ok(mut late))) = tx.send(result) {
                info!("link: closing late stream to {}", target.label());
                late.close();
            }
        })
        .map_err(TransportError::from)?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(TransportError::Timeout),
        Err(RecvTimeoutError::Disconnected) => Err(TransportError::Disconnected),
    }
}
