//! Outbound link notifications.
//!
//! The connection manager and the [`ResponseDispatcher`](super::dispatcher::ResponseDispatcher)
//! emit these through the [`EventSink`](super::ports::EventSink) port.
//! Adapters on the other side decide what to do with them — log them,
//! queue them for a UI, show an alert, etc.

use crate::app::history::HistoryEntry;
use crate::link::transport::Device;
use crate::protocol::response::{WifiResult, WifiStatus};

/// Structured notifications surfaced to the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A session was opened to `Device`.
    Connected(Device),

    /// The caller closed the session.
    Disconnected,

    /// Opening a session failed.
    ConnectionError(String),

    /// An open session died on a read error or peer close.
    ConnectionLost,

    /// Result of a `wifi_connect` command.
    WifiResult(WifiResult),

    /// Answer to a `wifi_status` command.
    WifiStatus(WifiStatus),

    /// Bytes received on an RS-485 bus; already appended to history.
    Telemetry(HistoryEntry),

    /// Generic success acknowledgement (baud change, tx echo, ...).
    Ack { cmd: Option<String>, bus: Option<u8> },

    /// Unsolicited gateway event (e.g. `tcp_client_connected`).
    GatewayEvent(String),

    /// `ok:false` from the gateway, or a failed send.
    GenericError(String),
}
