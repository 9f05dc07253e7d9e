//! Unified error types for the BusBridge link engine.
//!
//! A single `Error` enum that every subsystem converts into, so callers of
//! [`GatewayClient`](crate::app::service::GatewayClient) and
//! [`ConnectionManager`](crate::link::manager::ConnectionManager) handle
//! one type.  Session-terminal failures (`TransportOpen`, `TransportRead`)
//! are kept apart from the per-frame and per-call ones so the caller can
//! tell them apart without string matching.

use core::fmt;

use crate::config::ConfigError;
use crate::protocol::command::CommandError;
use crate::protocol::response::ParseError;

// ---------------------------------------------------------------------------
// Top-level link error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The transport could not open a stream to the device.
    TransportOpen(TransportError),
    /// Writing a command to the open stream failed or timed out.
    TransportWrite(TransportError),
    /// Reading from the open stream failed; fatal to the session.
    TransportRead(TransportError),
    /// An inbound frame could not be decoded.
    Parse(ParseError),
    /// The gateway answered `ok:false`.
    Protocol(String),
    /// The call is not valid in the current connection state.
    Usage(UsageError),
    /// A command failed construction-time validation.
    InvalidCommand(CommandError),
    /// A command could not be serialised.
    Encode(String),
    /// Link configuration is invalid.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransportOpen(e) => write!(f, "open failed: {e}"),
            Self::TransportWrite(e) => write!(f, "write failed: {e}"),
            Self::TransportRead(e) => write!(f, "read failed: {e}"),
            Self::Parse(e) => write!(f, "parse: {e}"),
            Self::Protocol(msg) => write!(f, "gateway error: {msg}"),
            Self::Usage(e) => write!(f, "{e}"),
            Self::InvalidCommand(e) => write!(f, "invalid command: {e}"),
            Self::Encode(msg) => write!(f, "encode: {msg}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Whether the error ended the session it happened in.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, Self::TransportOpen(_) | Self::TransportRead(_))
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

/// Failure reported by a [`ByteStream`](crate::link::transport::ByteStream)
/// or [`TransportProvider`](crate::link::transport::TransportProvider).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// The device address could not be resolved or is not paired.
    NotFound,
    /// The peer closed the stream (EOF).
    Closed,
    /// The operation did not finish within the configured timeout.
    Timeout,
    /// The stream worker is gone (session already torn down).
    Disconnected,
    /// Underlying OS I/O failure.
    Io(std::io::ErrorKind),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "device not found"),
            Self::Closed => write!(f, "stream closed by peer"),
            Self::Timeout => write!(f, "timed out"),
            Self::Disconnected => write!(f, "stream worker stopped"),
            Self::Io(kind) => write!(f, "I/O error ({kind})"),
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => Self::Timeout,
            std::io::ErrorKind::NotFound => Self::NotFound,
            std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::BrokenPipe => Self::Closed,
            kind => Self::Io(kind),
        }
    }
}

// ---------------------------------------------------------------------------
// Usage errors
// ---------------------------------------------------------------------------

/// Local, non-fatal misuse of the connection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageError {
    /// `send` with no open connection.
    NotConnected,
    /// `connect` while a connection is being opened.
    AlreadyConnecting,
    /// `connect` while a connection is open.
    AlreadyConnected,
    /// `connect`/`send` while a disconnect is in progress.
    Closing,
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "no device connected"),
            Self::AlreadyConnecting => write!(f, "already connecting"),
            Self::AlreadyConnected => write!(f, "already connected"),
            Self::Closing => write!(f, "disconnect in progress"),
        }
    }
}

impl From<UsageError> for Error {
    fn from(e: UsageError) -> Self {
        Self::Usage(e)
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

impl From<CommandError> for Error {
    fn from(e: CommandError) -> Self {
        Self::InvalidCommand(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
