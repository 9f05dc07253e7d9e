//! Link layer — transports and the single-session connection manager.
//!
//! ```text
//!   TransportProvider ──open──▶ ByteStream ◀──┬── read loop  ──▶ ResponseHandler
//!                                              └── write loop ◀── ConnectionManager::send
//! ```

pub mod manager;
pub mod transport;

pub use manager::{ConnectionManager, ConnectionState, ResponseHandler};
pub use transport::{ByteStream, Device, TransportProvider};
