//! Application core — routing, history and the client façade.
//!
//! Nothing here touches a socket or a tty.  Transports come in through
//! [`TransportProvider`](crate::link::transport::TransportProvider) and
//! notifications leave through the [`EventSink`](ports::EventSink) port,
//! so the whole layer runs against mocks in tests.

pub mod dispatcher;
pub mod events;
pub mod history;
pub mod ports;
pub mod service;
