//! Gateway client — the façade callers talk to.
//!
//! [`GatewayClient`] wires the connection manager, the response
//! dispatcher and the history store together.  It exposes a typed command
//! API and owns no I/O of its own; everything flows through the injected
//! [`TransportProvider`] and [`EventSink`].
//!
//! ```text
//!   Command ──▶ ┌───────────────────────────┐ ──▶ TransportProvider
//!               │       GatewayClient       │
//!  EventSink ◀──│ Link · Dispatcher · History│ ◀── read loop
//!               └───────────────────────────┘
//! ```

use std::sync::Arc;

use log::{debug, info};

use super::dispatcher::ResponseDispatcher;
use super::events::LinkEvent;
use super::history::{HistoryEntry, HistoryStore};
use super::ports::EventSink;
use crate::config::LinkConfig;
use crate::error::{Error, Result};
use crate::link::manager::{ConnectionManager, ConnectionState};
use crate::link::transport::{Device, TransportProvider};
use crate::protocol::command::Command;
use crate::protocol::hex::to_hex_line;

pub struct GatewayClient<P: TransportProvider> {
    link: ConnectionManager<P>,
    dispatcher: Arc<ResponseDispatcher>,
    history: Arc<HistoryStore>,
    sink: Arc<dyn EventSink>,
}

impl<P: TransportProvider> GatewayClient<P> {
    pub fn new(provider: P, config: LinkConfig, sink: Arc<dyn EventSink>) -> Self {
        let history = Arc::new(HistoryStore::new());
        let dispatcher = Arc::new(ResponseDispatcher::new(
            Arc::clone(&history),
            Arc::clone(&sink),
        ));
        Self {
            link: ConnectionManager::new(provider, config, Arc::clone(&sink)),
            dispatcher,
            history,
            sink,
        }
    }

    // ── Connection ────────────────────────────────────────────

    pub fn scan(&self) -> Result<Vec<Device>> {
        self.link.scan()
    }

    /// Open a session; every inbound response is dispatched on the read thread.
    pub fn connect(&self, device: &Device) -> Result<()> {
        let dispatcher = Arc::clone(&self.dispatcher);
        self.link
            .connect(device, Box::new(move |response| dispatcher.dispatch(response)))
    }

    pub fn disconnect(&self) -> bool {
        self.link.disconnect()
    }

    pub fn state(&self) -> ConnectionState {
        self.link.state()
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_open()
    }

    pub fn connected_device(&self) -> Option<Device> {
        self.link.connected_device()
    }

    // ── Commands ──────────────────────────────────────────────

    /// Validate, encode and write `command`.
    ///
    /// Any failure is also surfaced as a `GenericError` notification so a
    /// UI listening only to the sink still sees it.
    pub fn send_command(&self, command: &Command) -> Result<()> {
        let result = command
            .validate()
            .map_err(Error::from)
            .and_then(|()| command.encode())
            .and_then(|frame| self.link.send(&frame));

        match &result {
            Ok(()) => debug!("sent {}", command.name()),
            Err(e) => {
                info!("{} not sent: {}", command.name(), e);
                self.sink.emit(&LinkEvent::GenericError(e.to_string()));
            }
        }
        result
    }

    pub fn send_bus_data(&self, bus: u8, tx_hex: impl Into<String>) -> Result<()> {
        self.send_command(&Command::SendBusData {
            bus,
            tx_hex: tx_hex.into(),
        })
    }

    /// Like [`send_bus_data`](Self::send_bus_data), formatting raw bytes
    /// the way the gateway reports them.
    pub fn send_bus_bytes(&self, bus: u8, data: &[u8]) -> Result<()> {
        self.send_bus_data(bus, to_hex_line(data))
    }

    pub fn set_baud_rate(&self, bus: u8, baud: u32) -> Result<()> {
        self.send_command(&Command::SetBaudRate { bus, baud })
    }

    /// Ask the gateway to join a Wi-Fi network.  `port` defaults to the
    /// configured gateway TCP port.
    pub fn wifi_connect(&self, ssid: &str, password: &str, port: Option<u16>) -> Result<()> {
        self.send_command(&Command::WifiConnect {
            ssid: ssid.to_string(),
            password: password.to_string(),
            port: port.unwrap_or(self.link.config().default_tcp_port),
        })
    }

    pub fn wifi_status(&self) -> Result<()> {
        self.send_command(&Command::WifiStatus)
    }

    pub fn wifi_disconnect(&self) -> Result<()> {
        self.send_command(&Command::WifiDisconnect)
    }

    pub fn tcp_stop(&self) -> Result<()> {
        self.send_command(&Command::TcpStop)
    }

    // ── History ───────────────────────────────────────────────

    /// Snapshot, newest first.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.all()
    }

    pub fn clear_history(&self) {
        self.history.clear();
    }
}
