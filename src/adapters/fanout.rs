//! Sink that forwards every event to several sinks, in registration order.

use std::sync::Arc;

use crate::app::events::LinkEvent;
use crate::app::ports::EventSink;

#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: &LinkEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}
