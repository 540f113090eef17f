//! Prelude module for common re-exports.
//!
//! ```rust
//! use motion_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig, Validate};

// ─── Limits ─────────────────────────────────────────────────────────
pub use crate::consts::{MAX_ACCESS, MAX_MOTIONS, NUM_FRAMES, NUM_OUTPUTS, NUM_PID_JOINTS};

// ─── Identity & blending ────────────────────────────────────────────
pub use crate::ids::{AccessorId, McId};
pub use crate::output::{OutputCmd, OutputPid};
pub use crate::priority::{self, PriorityTier};

// ─── Events ─────────────────────────────────────────────────────────
pub use crate::event::{EventKind, EventLog, EventSink, MotionEvent};
