//! Committed output buffer.
//!
//! Written only by the motion accessor inside `get_outputs` / `update_pids`,
//! read everywhere else. Values persist until a later tick overrides them;
//! nothing resets a channel when its driver goes away.

use motion::consts::{NUM_FRAMES, NUM_OUTPUTS, NUM_PID_JOINTS};
use motion_shared_memory::OutputFrameBlock;

use crate::arbitration::{OutputFrames, PidGains};

/// Gains of one joint that changed in the last PID pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidUpdate {
    pub joint: usize,
    pub pid: [f32; 3],
}

/// Bitmask of the joints in `updates`, as published in
/// [`OutputFrameBlock::pid_changed`].
pub fn changed_mask(updates: &[PidUpdate]) -> u64 {
    updates.iter().fold(0, |mask, update| mask | (1 << update.joint))
}

/// Result of the most recent resolution passes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommittedOutputs {
    /// Ticks resolved so far.
    pub tick: u64,
    pub frames: OutputFrames,
    pub pids: PidGains,
}

impl Default for CommittedOutputs {
    fn default() -> Self {
        Self {
            tick: 0,
            frames: [[0.0; NUM_OUTPUTS]; NUM_FRAMES],
            pids: [[0.0; 3]; NUM_PID_JOINTS],
        }
    }
}

impl CommittedOutputs {
    /// Value of `channel` at the end of the last tick.
    #[inline]
    pub fn latest(&self, channel: usize) -> Option<f32> {
        self.frames[NUM_FRAMES - 1].get(channel).copied()
    }

    /// Look-ahead stream of one channel.
    pub fn channel_frames(&self, channel: usize) -> Option<[f32; NUM_FRAMES]> {
        if channel >= NUM_OUTPUTS {
            return None;
        }
        Some(core::array::from_fn(|frame| self.frames[frame][channel]))
    }

    /// Shared-memory form for publication; no joint is flagged as changed.
    pub fn to_block(&self) -> OutputFrameBlock {
        OutputFrameBlock {
            tick: self.tick,
            values: self.frames,
            pids: self.pids,
            pid_changed: 0,
        }
    }
}
