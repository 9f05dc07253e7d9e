//! Bounded notification queue for a UI thread.
//!
//! Uses an `embassy-sync` bounded channel so the read loop never blocks
//! on a slow consumer.  When the queue is full the new event is dropped
//! and a warning logged; the history store still holds every telemetry
//! entry, so a UI that falls behind can resynchronise from it.
//!
//! ```text
//! ┌────────────┐  LinkEvent  ┌────────────┐
//! │ read loop  │────────────▶│  UI drain  │
//! └────────────┘ try_send    └────────────┘ try_recv
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

use crate::app::events::LinkEvent;
use crate::app::ports::EventSink;

/// Queue depth.
pub const EVENT_QUEUE_DEPTH: usize = 64;

pub struct EventQueue {
    channel: Channel<CriticalSectionRawMutex, LinkEvent, EVENT_QUEUE_DEPTH>,
}

impl EventQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Next queued event, if any.
    pub fn try_recv(&self) -> Option<LinkEvent> {
        self.channel.try_receive().ok()
    }

    /// Take everything queued right now, oldest first.
    pub fn drain(&self) -> Vec<LinkEvent> {
        core::iter::from_fn(|| self.try_recv()).collect()
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for EventQueue {
    fn emit(&self, event: &LinkEvent) {
        if self.channel.try_send(event.clone()).is_err() {
            warn!("event queue full; dropping {:?}", event);
        }
    }
}
