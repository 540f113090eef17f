//! Event sink that forwards lifecycle events to the log.

use motion::event::{EventKind, EventSink, MotionEvent};
use tracing::{debug, info};

/// Writes every posted event as a tracing record.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn post(&self, event: MotionEvent) {
        match event.kind {
            EventKind::Activate | EventKind::Deactivate => {
                info!(source = %event.source, kind = ?event.kind, tick = event.tick, "motion event")
            }
            EventKind::Status => debug!(source = %event.source, tick = event.tick, "motion status"),
        }
    }
}
