//! Lifecycle events posted by the motion manager.
//!
//! Every event carries the manager as generator and the command's `McId`
//! as source, so monitors (and client wrappers that track auto-added
//! motions) can follow a command from activation to removal.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::ids::McId;

/// Subsystem that generated an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventGenerator {
    MotionManager = 0,
}

/// What happened to the source command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum EventKind {
    /// Command registered and started.
    Activate = 0,
    /// Command removed, explicitly or by pruning.
    Deactivate = 1,
    /// Command-reported progress (e.g. completion of a trajectory).
    Status = 2,
}

/// Lifecycle notification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionEvent {
    pub generator: EventGenerator,
    pub source: McId,
    pub kind: EventKind,
    /// Manager tick counter when the event was posted.
    pub tick: u64,
}

impl MotionEvent {
    #[inline]
    pub const fn new(source: McId, kind: EventKind, tick: u64) -> Self {
        Self {
            generator: EventGenerator::MotionManager,
            source,
            kind,
            tick,
        }
    }
}

/// Event-routing collaborator.
///
/// Called without any manager lock held; implementations may call back
/// into the manager.
pub trait EventSink: Send + Sync {
    fn post(&self, event: MotionEvent);
}

/// In-memory sink that records every event, for monitors and tests.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<MotionEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all recorded events, oldest first.
    pub fn drain(&self) -> Vec<MotionEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Copy of the recorded events for one source.
    pub fn for_source(&self, source: McId) -> Vec<MotionEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.source == source)
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for EventLog {
    fn post(&self, event: MotionEvent) {
        tracing::trace!(source = %event.source, kind = ?event.kind, "motion event");
        self.events.lock().push(event);
    }
}
