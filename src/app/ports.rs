//! Port traits — the boundary between the link core and the UI layer.
//!
//! ```text
//!   ConnectionManager ──▶ EventSink ──▶ Adapter (log, queue, UI alert)
//!   ResponseDispatcher ─┘
//! ```
//!
//! Sinks are shared between the caller's thread and the read loop, so
//! `emit` takes `&self` and implementations synchronise internally.

use super::events::LinkEvent;

/// The link core emits every [`LinkEvent`] through this port.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &LinkEvent);
}
