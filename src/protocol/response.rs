//! Inbound gateway responses.
//!
//! Decoding happens in two steps:
//!
//! 1. [`parse_frame`] turns one line into a loosely-typed [`Response`]
//!    (every field optional, unknown fields ignored, absent ≠ `false`).
//! 2. [`Response::classify`] folds that record into the closed
//!    [`GatewayMessage`] set, applying the routing priority once so no
//!    caller has to test field presence ad hoc.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::codec::{FrameError, LineDecoder};
use super::command::{CMD_WIFI_CONNECT, CMD_WIFI_STATUS};

/// One decoded frame, exactly as the gateway sent it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rssi: Option<i32>,
    #[serde(
        default,
        rename = "tcp",
        alias = "tcpRunning",
        alias = "tcp_running",
        skip_serializing_if = "Option::is_none"
    )]
    pub tcp_running: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bus: Option<u8>,
    #[serde(default, alias = "rxHex", skip_serializing_if = "Option::is_none")]
    pub rx_hex: Option<String>,
    /// Echo of a transmitted payload.
    #[serde(default, alias = "txHex", skip_serializing_if = "Option::is_none")]
    pub tx_hex: Option<String>,
    /// Echo of an applied baud rate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baud: Option<u32>,
    /// Unsolicited gateway event name (e.g. `tcp_client_connected`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
}

/// Result of a `wifi_connect` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiResult {
    pub ok: bool,
    pub ip: Option<String>,
    pub port: Option<u16>,
    pub err: Option<String>,
}

/// Answer to a `wifi_status` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiStatus {
    pub connected: Option<bool>,
    pub ip: Option<String>,
    pub rssi: Option<i32>,
    pub tcp_running: Option<bool>,
}

/// The closed set of shapes a [`Response`] can take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayMessage {
    /// `ok:false`.
    Error {
        cmd: Option<String>,
        message: Option<String>,
    },
    /// `cmd:"wifi_connect"`.
    WifiResult(WifiResult),
    /// `cmd:"wifi_status"`.
    WifiStatus(WifiStatus),
    /// `bus` + `rx_hex`: bytes received on an RS-485 bus.
    Telemetry { bus: u8, rx_hex: String },
    /// `event`: unsolicited notice from the gateway.
    Event { name: String },
    /// `ok:true` with no more specific shape.
    Ack { cmd: Option<String>, bus: Option<u8> },
    /// Nothing actionable.
    Unrecognized,
}

impl Response {
    /// Apply the routing priority; the first matching rule wins.
    pub fn classify(self) -> GatewayMessage {
        if self.ok == Some(false) {
            return GatewayMessage::Error {
                cmd: self.cmd,
                message: self.err,
            };
        }

        match self.cmd.as_deref() {
            Some(CMD_WIFI_CONNECT) => {
                return GatewayMessage::WifiResult(WifiResult {
                    ok: self.ok == Some(true),
                    ip: self.ip,
                    port: self.port,
                    err: self.err,
                });
            }
            Some(CMD_WIFI_STATUS) => {
                return GatewayMessage::WifiStatus(WifiStatus {
                    connected: self.connected,
                    ip: self.ip,
                    rssi: self.rssi,
                    tcp_running: self.tcp_running,
                });
            }
            _ => {}
        }

        if let (Some(bus), Some(rx_hex)) = (self.bus, self.rx_hex) {
            return GatewayMessage::Telemetry { bus, rx_hex };
        }

        if let Some(name) = self.event {
            return GatewayMessage::Event { name };
        }

        if self.ok == Some(true) {
            return GatewayMessage::Ack {
                cmd: self.cmd,
                bus: self.bus,
            };
        }

        GatewayMessage::Unrecognized
    }
}

// ── Parse errors ──────────────────────────────────────────────

/// Why one frame could not be decoded.  Never fatal to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The line exceeded the frame limit and was dropped.
    FrameTooLong,
    /// The line is not valid UTF-8.
    Utf8,
    /// The line is valid JSON but not an object.
    NotAnObject,
    /// The line is not valid JSON, or a field has the wrong type.
    Json(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FrameTooLong => write!(f, "frame too long"),
            Self::Utf8 => write!(f, "frame is not UTF-8"),
            Self::NotAnObject => write!(f, "frame is not a JSON object"),
            Self::Json(msg) => write!(f, "malformed frame: {msg}"),
        }
    }
}

impl From<FrameError> for ParseError {
    fn from(e: FrameError) -> Self {
        match e {
            FrameError::TooLong => Self::FrameTooLong,
        }
    }
}

/// Decode one complete frame (delimiter already stripped).
pub fn parse_frame(frame: &[u8]) -> Result<Response, ParseError> {
    let text = core::str::from_utf8(frame).map_err(|_| ParseError::Utf8)?;
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| ParseError::Json(e.to_string()))?;
    if !value.is_object() {
        return Err(ParseError::NotAnObject);
    }
    serde_json::from_value(value).map_err(|e| ParseError::Json(e.to_string()))
}

// ── Streaming parser ──────────────────────────────────────────

/// Frames an inbound byte stream and decodes every complete line.
pub struct ResponseParser {
    decoder: LineDecoder,
}

impl ResponseParser {
    pub fn new() -> Self {
        Self {
            decoder: LineDecoder::new(),
        }
    }

    /// Feed one chunk; returns one result per completed frame, in order.
    ///
    /// Malformed frames come back as `Err` for the caller to log or count;
    /// they never disturb later frames.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Result<Response, ParseError>> {
        let mut out = Vec::new();
        self.decoder.feed(chunk, |frame| {
            out.push(frame.map_err(ParseError::from).and_then(parse_frame));
        });
        out
    }

    /// Bytes buffered while waiting for a delimiter.
    pub fn pending(&self) -> usize {
        self.decoder.pending()
    }

    pub fn reset(&mut self) {
        self.decoder.reset();
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}
