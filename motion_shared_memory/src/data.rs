//! Payloads published through output segments

use crate::segment::ShmPod;
use motion::consts::{NUM_FRAMES, NUM_OUTPUTS, NUM_PID_JOINTS};
use static_assertions::const_assert;

const_assert!(NUM_PID_JOINTS <= u64::BITS as usize);

/// Committed output stream of one tick
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputFrameBlock {
    /// Tick that produced the block
    pub tick: u64,
    /// `values[frame][channel]`
    pub values: [[f32; NUM_OUTPUTS]; NUM_FRAMES],
    /// Last resolved PID gains per PID-capable joint
    pub pids: [[f32; 3]; NUM_PID_JOINTS],
    /// Bit `j` set when joint `j`'s gains changed in this tick's PID pass.
    /// Readers push gains downstream only for flagged joints.
    pub pid_changed: u64,
}

impl Default for OutputFrameBlock {
    fn default() -> Self {
        Self {
            tick: 0,
            values: [[0.0; NUM_OUTPUTS]; NUM_FRAMES],
            pids: [[0.0; 3]; NUM_PID_JOINTS],
            pid_changed: 0,
        }
    }
}

impl OutputFrameBlock {
    /// Value of `channel` in the last frame of the tick
    pub fn latest(&self, channel: usize) -> Option<f32> {
        self.values[NUM_FRAMES - 1].get(channel).copied()
    }

    /// Gains of `joint` if they changed in this block's tick
    pub fn changed_pid(&self, joint: usize) -> Option<[f32; 3]> {
        let gains = self.pids.get(joint)?;
        (self.pid_changed & (1 << joint) != 0).then_some(*gains)
    }
}

// SAFETY: repr(C), only u64 and f32 arrays without padding, every bit pattern is valid.
unsafe impl ShmPod for OutputFrameBlock {}
