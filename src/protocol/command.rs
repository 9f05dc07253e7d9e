//! Outbound gateway commands and their wire encoding.
//!
//! Each variant maps to exactly one JSON shape the gateway firmware
//! understands; only the fields of that variant are emitted, in a fixed
//! order, so encoding is deterministic.
//!
//! | Variant          | Wire                                                      |
//! |------------------|-----------------------------------------------------------|
//! | `SendBusData`    | `{"bus":1,"tx_hex":"01 02"}`                              |
//! | `SetBaudRate`    | `{"bus":1,"baud":9600}`                                   |
//! | `WifiConnect`    | `{"cmd":"wifi_connect","ssid":"..","pwd":"..","port":3333}` |
//! | `WifiStatus`     | `{"cmd":"wifi_status"}`                                   |
//! | `WifiDisconnect` | `{"cmd":"wifi_disconnect"}`                               |
//! | `TcpStop`        | `{"cmd":"tcp_stop"}`                                      |

use core::fmt;

use serde::Serialize;

use super::codec::{MAX_FRAME_LEN, encode_frame};
use super::hex::{HexError, parse_hex_bytes};
use crate::error::{Error, Result};

/// RS-485 buses wired on the gateway.
pub const BUS_RANGE: core::ops::RangeInclusive<u8> = 1..=2;

pub const CMD_WIFI_CONNECT: &str = "wifi_connect";
pub const CMD_WIFI_STATUS: &str = "wifi_status";
pub const CMD_WIFI_DISCONNECT: &str = "wifi_disconnect";
pub const CMD_TCP_STOP: &str = "tcp_stop";

/// A request to the gateway.  Transient: built, encoded, sent, dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Transmit raw bytes (hex text) on an RS-485 bus.
    SendBusData { bus: u8, tx_hex: String },
    /// Change the UART line rate of an RS-485 bus.
    SetBaudRate { bus: u8, baud: u32 },
    /// Join a Wi-Fi network and start the TCP bridge on `port`.
    WifiConnect {
        ssid: String,
        password: String,
        port: u16,
    },
    /// Ask for Wi-Fi / TCP bridge status.
    WifiStatus,
    /// Leave the Wi-Fi network and stop the TCP bridge.
    WifiDisconnect,
    /// Stop the TCP bridge, staying on Wi-Fi.
    TcpStop,
}

#[derive(Serialize)]
#[serde(untagged)]
enum WireCommand<'a> {
    BusData { bus: u8, tx_hex: &'a str },
    BaudRate { bus: u8, baud: u32 },
    WifiConnect {
        cmd: &'static str,
        ssid: &'a str,
        pwd: &'a str,
        port: u16,
    },
    Control { cmd: &'static str },
}

impl Command {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SendBusData { .. } => "tx_hex",
            Self::SetBaudRate { .. } => "baud",
            Self::WifiConnect { .. } => CMD_WIFI_CONNECT,
            Self::WifiStatus => CMD_WIFI_STATUS,
            Self::WifiDisconnect => CMD_WIFI_DISCONNECT,
            Self::TcpStop => CMD_TCP_STOP,
        }
    }

    /// Construction-time checks the caller owns before sending.
    ///
    /// [`encode`](Self::encode) does not call this, but every command that
    /// passes it also encodes: the frame length is checked here too.
    pub fn validate(&self) -> core::result::Result<(), CommandError> {
        self.check_fields()?;
        match serde_json::to_vec(&self.wire()) {
            Ok(payload) if payload.len() <= MAX_FRAME_LEN => Ok(()),
            _ => Err(CommandError::TooLong),
        }
    }

    fn check_fields(&self) -> core::result::Result<(), CommandError> {
        match self {
            Self::SendBusData { bus, tx_hex } => {
                check_bus(*bus)?;
                let bytes = parse_hex_bytes(tx_hex).map_err(CommandError::BadHex)?;
                if bytes.is_empty() {
                    return Err(CommandError::EmptyHex);
                }
                Ok(())
            }
            Self::SetBaudRate { bus, baud } => {
                check_bus(*bus)?;
                if *baud == 0 {
                    return Err(CommandError::InvalidBaud);
                }
                Ok(())
            }
            Self::WifiConnect { ssid, port, .. } => {
                if ssid.trim().is_empty() {
                    return Err(CommandError::EmptySsid);
                }
                if *port == 0 {
                    return Err(CommandError::InvalidPort);
                }
                Ok(())
            }
            Self::WifiStatus | Self::WifiDisconnect | Self::TcpStop => Ok(()),
        }
    }

    /// Serialise to one delimiter-terminated frame.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload =
            serde_json::to_vec(&self.wire()).map_err(|e| Error::Encode(e.to_string()))?;
        encode_frame(&payload).ok_or_else(|| Error::Encode("command exceeds frame limit".into()))
    }

    fn wire(&self) -> WireCommand<'_> {
        match self {
            Self::SendBusData { bus, tx_hex } => WireCommand::BusData { bus: *bus, tx_hex },
            Self::SetBaudRate { bus, baud } => WireCommand::BaudRate {
                bus: *bus,
                baud: *baud,
            },
            Self::WifiConnect {
                ssid,
                password,
                port,
            } => WireCommand::WifiConnect {
                cmd: CMD_WIFI_CONNECT,
                ssid,
                pwd: password,
                port: *port,
            },
            Self::WifiStatus => WireCommand::Control {
                cmd: CMD_WIFI_STATUS,
            },
            Self::WifiDisconnect => WireCommand::Control {
                cmd: CMD_WIFI_DISCONNECT,
            },
            Self::TcpStop => WireCommand::Control { cmd: CMD_TCP_STOP },
        }
    }
}

fn check_bus(bus: u8) -> core::result::Result<(), CommandError> {
    if BUS_RANGE.contains(&bus) {
        Ok(())
    } else {
        Err(CommandError::InvalidBus(bus))
    }
}

// ── Error type ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    InvalidBus(u8),
    EmptyHex,
    BadHex(HexError),
    InvalidBaud,
    EmptySsid,
    InvalidPort,
    /// Encoded form would not fit in one frame.
    TooLong,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBus(bus) => write!(
                f,
                "bus {bus} out of range ({}..={})",
                BUS_RANGE.start(),
                BUS_RANGE.end()
            ),
            Self::EmptyHex => write!(f, "hex payload is empty"),
            Self::BadHex(e) => write!(f, "hex payload: {e}"),
            Self::InvalidBaud => write!(f, "baud rate must be > 0"),
            Self::EmptySsid => write!(f, "Wi-Fi SSID is empty"),
            Self::InvalidPort => write!(f, "TCP port must be > 0"),
            Self::TooLong => write!(f, "command exceeds {MAX_FRAME_LEN} byte frame limit"),
        }
    }
}
