//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing every link notification to the
//! `log` facade.  Useful on its own for headless runs and as one arm of a
//! [`FanoutSink`](super::fanout::FanoutSink) next to a UI queue.

use log::{debug, info, warn};

use crate::app::events::LinkEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`LinkEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&self, event: &LinkEvent) {
        match event {
            LinkEvent::Connected(device) => {
                info!("LINK  | connected to {} ({})", device.label(), device.id);
            }
            LinkEvent::Disconnected => info!("LINK  | disconnected"),
            LinkEvent::ConnectionError(msg) => warn!("LINK  | {}", msg),
            LinkEvent::ConnectionLost => warn!("LINK  | connection lost"),
            LinkEvent::WifiResult(r) if r.ok => {
                info!(
                    "WIFI  | connected ip={} port={}",
                    r.ip.as_deref().unwrap_or("?"),
                    r.port.map_or_else(|| "?".to_string(), |p| p.to_string()),
                );
            }
            LinkEvent::WifiResult(r) => {
                warn!("WIFI  | connect failed: {}", r.err.as_deref().unwrap_or("unknown"));
            }
            LinkEvent::WifiStatus(s) => {
                info!(
                    "WIFI  | connected={:?} ip={:?} rssi={:?} tcp={:?}",
                    s.connected, s.ip, s.rssi, s.tcp_running
                );
            }
            LinkEvent::Telemetry(entry) => {
                info!("RX    | bus={} id={} data={}", entry.bus, entry.id, entry.data);
            }
            LinkEvent::Ack { cmd, bus } => debug!("ACK   | cmd={:?} bus={:?}", cmd, bus),
            LinkEvent::GatewayEvent(name) => info!("EVENT | {}", name),
            LinkEvent::GenericError(msg) => warn!("ERROR | {}", msg),
        }
    }
}
