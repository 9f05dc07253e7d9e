//! Response dispatcher — routes each decoded response to its side effect.
//!
//! Invoked once per response, from the read loop.
//!
//! | Message        | Side effect                                   |
//! |----------------|-----------------------------------------------|
//! | `Error`        | `GenericError` notification                   |
//! | `WifiResult`   | `WifiResult` notification                     |
//! | `WifiStatus`   | `WifiStatus` notification                     |
//! | `Telemetry`    | history append + `Telemetry` notification     |
//! | `Event`        | `GatewayEvent` notification                   |
//! | `Ack`          | `Ack` notification                            |
//! | `Unrecognized` | none                                          |

use std::sync::Arc;

use log::{debug, info, warn};

use super::events::LinkEvent;
use super::history::HistoryStore;
use super::ports::EventSink;
use crate::error::Error;
use crate::protocol::response::{GatewayMessage, Response};

/// Message used when the gateway reports failure without a reason.
pub const UNKNOWN_ERROR: &str = "Unknown error";

pub struct ResponseDispatcher {
    history: Arc<HistoryStore>,
    sink: Arc<dyn EventSink>,
}

impl ResponseDispatcher {
    pub fn new(history: Arc<HistoryStore>, sink: Arc<dyn EventSink>) -> Self {
        Self { history, sink }
    }

    /// Classify `response` and apply its side effect.
    pub fn dispatch(&self, response: Response) {
        match response.classify() {
            GatewayMessage::Error { cmd, message } => {
                let message = message.unwrap_or_else(|| UNKNOWN_ERROR.to_string());
                warn!("{} (cmd={:?})", Error::Protocol(message.clone()), cmd);
                self.sink.emit(&LinkEvent::GenericError(message));
            }
            GatewayMessage::WifiResult(result) => {
                info!("wifi_connect: ok={} ip={:?} port={:?}", result.ok, result.ip, result.port);
                self.sink.emit(&LinkEvent::WifiResult(result));
            }
            GatewayMessage::WifiStatus(status) => {
                self.sink.emit(&LinkEvent::WifiStatus(status));
            }
            GatewayMessage::Telemetry { bus, rx_hex } => {
                let entry = self.history.record(bus, rx_hex);
                debug!("bus {} rx: {}", entry.bus, entry.data);
                self.sink.emit(&LinkEvent::Telemetry(entry));
            }
            GatewayMessage::Event { name } => {
                info!("gateway event: {}", name);
                self.sink.emit(&LinkEvent::GatewayEvent(name));
            }
            GatewayMessage::Ack { cmd, bus } => {
                self.sink.emit(&LinkEvent::Ack { cmd, bus });
            }
            GatewayMessage::Unrecognized => {
                debug!("ignoring response with no recognised shape");
            }
        }
    }
}
