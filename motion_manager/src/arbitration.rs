//! Output arbitration.
//!
//! Every command that submits a request for a channel gets one row in
//! that channel's table. Once per tick the rows are resolved per frame:
//!
//! 1. Rows at or below `priority::IGNORED` are skipped.
//! 2. The highest priority present forms the winning tier.
//! 3. A single row in the tier wins outright; several rows blend as
//!    `Σ(v·w) / Σw` over rows with positive weight.
//! 4. If the tier's total weight is zero, or nobody submitted, the channel
//!    holds: frame 0 keeps the last frame of the previous tick, frame `f`
//!    keeps frame `f - 1`. Lower tiers are never consulted.
//!
//! PID gains use the same rule over a single frame.

use heapless::Vec as FixedVec;
use motion::consts::{MAX_MOTIONS, NUM_FRAMES, NUM_OUTPUTS, NUM_PID_JOINTS};
use motion::ids::McId;
use motion::output::{OutputCmd, OutputPid};
use motion::priority;
use tracing::debug;

/// Committed values, `frames[frame][channel]`.
pub type OutputFrames = [[f32; NUM_OUTPUTS]; NUM_FRAMES];

/// Resolved gains, `pids[joint] = [p, i, d]`.
pub type PidGains = [[f32; 3]; NUM_PID_JOINTS];

// ─── Blending ───────────────────────────────────────────────────────

/// Quantity that can be weighted and averaged.
pub trait Blend: Copy {
    const ZERO: Self;

    fn add_weighted(&mut self, other: &Self, weight: f32);

    fn scaled(self, factor: f32) -> Self;
}

impl Blend for f32 {
    const ZERO: Self = 0.0;

    #[inline]
    fn add_weighted(&mut self, other: &Self, weight: f32) {
        *self += other * weight;
    }

    #[inline]
    fn scaled(self, factor: f32) -> Self {
        self * factor
    }
}

impl Blend for [f32; 3] {
    const ZERO: Self = [0.0; 3];

    #[inline]
    fn add_weighted(&mut self, other: &Self, weight: f32) {
        for (acc, v) in self.iter_mut().zip(other) {
            *acc += v * weight;
        }
    }

    #[inline]
    fn scaled(self, factor: f32) -> Self {
        self.map(|v| v * factor)
    }
}

/// Resolve `(priority, value, weight)` submissions for one channel/frame.
///
/// Returns `None` when the channel must hold its previous value.
pub fn blend<T: Blend>(submissions: impl IntoIterator<Item = (f32, T, f32)>) -> Option<T> {
    let mut top = f32::NEG_INFINITY;
    let mut sum = T::ZERO;
    let mut total_weight = 0.0f32;
    let mut contributors = 0usize;
    let mut single = T::ZERO;

    for (prio, value, weight) in submissions {
        if !priority::is_effective(prio) {
            continue;
        }
        if prio > top {
            top = prio;
            sum = T::ZERO;
            total_weight = 0.0;
            contributors = 0;
        }
        if prio == top && weight > 0.0 {
            sum.add_weighted(&value, weight);
            total_weight += weight;
            contributors += 1;
            single = value;
        }
    }

    match contributors {
        0 => None,
        1 => Some(single),
        _ => Some(sum.scaled(1.0 / total_weight)),
    }
}

// ─── Tables ─────────────────────────────────────────────────────────

/// One command's requests for one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CmdSubmission {
    pub source: McId,
    /// `None` for frames the command left untouched.
    pub frames: [Option<OutputCmd>; NUM_FRAMES],
}

/// One command's gains for one joint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidSubmission {
    pub source: McId,
    pub pid: OutputPid,
}

/// Per-channel submissions collected between two resolutions.
#[derive(Debug, Clone)]
pub struct OutputTables {
    cmds: [FixedVec<CmdSubmission, MAX_MOTIONS>; NUM_OUTPUTS],
    pids: [FixedVec<PidSubmission, MAX_MOTIONS>; NUM_PID_JOINTS],
}

impl Default for OutputTables {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputTables {
    pub fn new() -> Self {
        Self {
            cmds: core::array::from_fn(|_| FixedVec::new()),
            pids: core::array::from_fn(|_| FixedVec::new()),
        }
    }

    /// Record `cmd` from `source` on `channel` in `frame`.
    ///
    /// A later request from the same source for the same frame replaces
    /// the earlier one.
    pub fn record_frame(&mut self, source: McId, channel: usize, frame: usize, cmd: OutputCmd) -> bool {
        if frame >= NUM_FRAMES {
            debug!(%source, channel, frame, "frame out of range");
            return false;
        }
        let Some(rows) = self.cmds.get_mut(channel) else {
            debug!(%source, channel, "channel out of range");
            return false;
        };

        if let Some(row) = rows.iter_mut().find(|row| row.source == source) {
            row.frames[frame] = Some(cmd);
            return true;
        }

        let mut frames = [None; NUM_FRAMES];
        frames[frame] = Some(cmd);
        if rows.push(CmdSubmission { source, frames }).is_err() {
            debug!(%source, channel, "channel table full");
            return false;
        }
        true
    }

    /// Record `pid` from `source` for `joint`, replacing any earlier request.
    pub fn record_pid(&mut self, source: McId, joint: usize, pid: OutputPid) -> bool {
        let Some(rows) = self.pids.get_mut(joint) else {
            debug!(%source, joint, "PID joint out of range");
            return false;
        };

        if let Some(row) = rows.iter_mut().find(|row| row.source == source) {
            row.pid = pid;
            return true;
        }
        if rows.push(PidSubmission { source, pid }).is_err() {
            debug!(%source, joint, "PID table full");
            return false;
        }
        true
    }

    /// Drop every row submitted by `source`.
    pub fn forget(&mut self, source: McId) {
        for rows in &mut self.cmds {
            rows.retain(|row| row.source != source);
        }
        for rows in &mut self.pids {
            rows.retain(|row| row.source != source);
        }
    }

    pub fn submissions(&self, channel: usize) -> &[CmdSubmission] {
        self.cmds.get(channel).map(|rows| rows.as_slice()).unwrap_or(&[])
    }

    pub fn pid_submissions(&self, joint: usize) -> &[PidSubmission] {
        self.pids.get(joint).map(|rows| rows.as_slice()).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.cmds.iter().all(|rows| rows.is_empty()) && self.pids.iter().all(|rows| rows.is_empty())
    }

    pub fn clear_outputs(&mut self) {
        self.cmds.iter_mut().for_each(|rows| rows.clear());
    }

    pub fn clear_pids(&mut self) {
        self.pids.iter_mut().for_each(|rows| rows.clear());
    }

    /// Resolve every channel and frame against `previous`.
    ///
    /// `priority_of` returns the live priority of a source, or `None` if it
    /// is no longer registered; rows of unknown sources are ignored.
    pub fn resolve_outputs(
        &self,
        priority_of: impl Fn(McId) -> Option<f32>,
        previous: &OutputFrames,
    ) -> OutputFrames {
        let mut out = [[0.0; NUM_OUTPUTS]; NUM_FRAMES];
        for (channel, rows) in self.cmds.iter().enumerate() {
            let mut held = previous[NUM_FRAMES - 1][channel];
            for (frame, out_frame) in out.iter_mut().enumerate() {
                let value = blend(rows.iter().filter_map(|row| {
                    let cmd = row.frames[frame]?;
                    let prio = priority_of(row.source)?;
                    Some((prio, cmd.value, cmd.weight))
                }))
                .unwrap_or(held);
                out_frame[channel] = value;
                held = value;
            }
        }
        out
    }

    /// Resolve PID gains against `previous`.
    pub fn resolve_pids(&self, priority_of: impl Fn(McId) -> Option<f32>, previous: &PidGains) -> PidGains {
        let mut out = *previous;
        for (joint, rows) in self.pids.iter().enumerate() {
            if let Some(gains) = blend(rows.iter().filter_map(|row| {
                let prio = priority_of(row.source)?;
                Some((prio, row.pid.pid, row.pid.weight))
            })) {
                out[joint] = gains;
            }
        }
        out
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
