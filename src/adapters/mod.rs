//! Adapters — concrete implementations of the link and app port traits.
//!
//! | Adapter            | Implements         | Connects to                 |
//! |--------------------|--------------------|-----------------------------|
//! | `event_queue`      | EventSink          | bounded queue for a UI      |
//! | `fanout`           | EventSink          | several sinks at once       |
//! | `log_sink`         | EventSink          | `log` facade                |
//! | `serial_transport` | TransportProvider  | RFCOMM / USB serial tty     |
//! | `tcp_transport`    | TransportProvider  | gateway Wi-Fi TCP bridge    |

pub mod event_queue;
pub mod fanout;
pub mod log_sink;
#[cfg(feature = "serial")]
pub mod serial_transport;
pub mod tcp_transport;
