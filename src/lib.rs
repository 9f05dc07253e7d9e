//! BusBridge controller library.
//!
//! Talks to an ESP32 RS-485 gateway over any byte stream (RFCOMM serial,
//! TCP): encodes commands, frames and decodes line-delimited JSON
//! responses, routes them to notifications and keeps a bounded telemetry
//! history.  All transport specifics live in [`adapters`]; everything
//! else runs against the [`link::TransportProvider`] trait.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod error;
pub mod link;
pub mod protocol;

pub use app::service::GatewayClient;
pub use error::{Error, Result};
