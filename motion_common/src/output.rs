//! Output blend units.
//!
//! A command never writes an actuator directly. It submits an `OutputCmd`
//! (or an `OutputPid` for gain tuning) and the manager blends all
//! submissions for a channel. A weight of zero means "not contributing".

use serde::{Deserialize, Serialize};

/// Requested value for one output channel in one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutputCmd {
    /// Target value (joint angle, wheel speed, LED duty...).
    pub value: f32,
    /// Blend weight within the winning priority tier. `0.0` = unused.
    pub weight: f32,
}

impl OutputCmd {
    /// Non-contributing command.
    pub const UNUSED: Self = Self {
        value: 0.0,
        weight: 0.0,
    };

    /// Full-weight request.
    #[inline]
    pub const fn new(value: f32) -> Self {
        Self { value, weight: 1.0 }
    }

    #[inline]
    pub const fn weighted(value: f32, weight: f32) -> Self {
        Self { value, weight }
    }

    /// True if this submission takes part in blending.
    #[inline]
    pub fn is_contributing(&self) -> bool {
        self.weight > 0.0
    }

    /// Mark as unused without discarding the last value.
    #[inline]
    pub fn unset(&mut self) {
        self.weight = 0.0;
    }
}

impl Default for OutputCmd {
    fn default() -> Self {
        Self::UNUSED
    }
}

/// Requested PID gains for one joint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutputPid {
    /// `[p, i, d]`
    pub pid: [f32; 3],
    /// Blend weight within the winning priority tier. `0.0` = unused.
    pub weight: f32,
}

impl OutputPid {
    pub const UNUSED: Self = Self {
        pid: [0.0; 3],
        weight: 0.0,
    };

    #[inline]
    pub const fn new(p: f32, i: f32, d: f32) -> Self {
        Self {
            pid: [p, i, d],
            weight: 1.0,
        }
    }

    #[inline]
    pub const fn weighted(pid: [f32; 3], weight: f32) -> Self {
        Self { pid, weight }
    }

    #[inline]
    pub fn is_contributing(&self) -> bool {
        self.weight > 0.0
    }
}

impl Default for OutputPid {
    fn default() -> Self {
        Self::UNUSED
    }
}
