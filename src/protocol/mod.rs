//! Gateway wire protocol.
//!
//! Newline-delimited JSON in both directions: one object per line, no
//! length prefix, no checksum.
//!
//! ```text
//!  controller                                   gateway
//!  ──────────                                   ───────
//!  Command ──encode──▶ {"bus":1,"tx_hex":"01 02"}\n ──▶
//!                                                       RS-485 bus 1
//!  Response ◀─parse── {"bus":2,"rx_hex":"0A 0B"}\n ◀──  RS-485 bus 2
//!
//!  ┌──────────────┐   ┌──────────────┐   ┌──────────────────────┐
//!  │ byte chunks  │──▶│ LineDecoder  │──▶│ parse_frame →        │
//!  │ (any split)  │   │ (framing)    │   │ Response → Message   │
//!  └──────────────┘   └──────────────┘   └──────────────────────┘
//! ```

pub mod codec;
pub mod command;
pub mod hex;
pub mod response;

pub use codec::{DELIMITER, LineDecoder, MAX_FRAME_LEN};
pub use command::{Command, CommandError};
pub use response::{GatewayMessage, ParseError, Response, ResponseParser, WifiResult, WifiStatus};
