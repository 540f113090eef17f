//! Built-in motions.

use heapless::Vec as FixedVec;
use motion::consts::{NUM_OUTPUTS, NUM_PID_JOINTS};
use motion::output::{OutputCmd, OutputPid};

use crate::command::{CommandCore, MotionCommand, OutputSink};
use crate::config::PostureConfig;
use crate::error::BoxError;

/// Holds fixed targets on a set of channels.
///
/// With a lifetime the posture stops being alive after that many updates;
/// registered as prunable it is then removed on its next evaluation.
#[derive(Debug, Clone)]
pub struct PostureMotion {
    core: CommandCore,
    targets: FixedVec<(usize, OutputCmd), NUM_OUTPUTS>,
    pids: FixedVec<(usize, OutputPid), NUM_PID_JOINTS>,
    lifetime: Option<u64>,
    ticks: u64,
    report_completion: bool,
    completed: bool,
    dirty: bool,
}

impl Default for PostureMotion {
    fn default() -> Self {
        Self::new()
    }
}

impl PostureMotion {
    pub fn new() -> Self {
        Self {
            core: CommandCore::new(),
            targets: FixedVec::new(),
            pids: FixedVec::new(),
            lifetime: None,
            ticks: 0,
            report_completion: false,
            completed: false,
            dirty: true,
        }
    }

    /// Build from a configured posture; out-of-range entries are skipped.
    pub fn from_config(config: &PostureConfig) -> Self {
        let mut posture = Self::new();
        for target in &config.targets {
            posture = posture.with_target(target.channel, OutputCmd::weighted(target.value, target.weight));
        }
        for pid in &config.pids {
            posture = posture.with_pid(pid.joint, OutputPid::weighted([pid.p, pid.i, pid.d], pid.weight));
        }
        posture.lifetime = config.lifetime_ticks;
        posture.report_completion = config.report_completion;
        posture
    }

    pub fn with_target(mut self, channel: usize, cmd: OutputCmd) -> Self {
        self.set_target(channel, cmd);
        self
    }

    pub fn with_pid(mut self, joint: usize, pid: OutputPid) -> Self {
        if joint < NUM_PID_JOINTS {
            match self.pids.iter_mut().find(|(j, _)| *j == joint) {
                Some(slot) => slot.1 = pid,
                None => {
                    let _ = self.pids.push((joint, pid));
                }
            }
        }
        self
    }

    /// Stop being alive after `ticks` updates.
    pub fn with_lifetime(mut self, ticks: u64) -> Self {
        self.lifetime = Some(ticks);
        self
    }

    /// Post a status event on the update that exhausts the lifetime.
    pub fn with_completion_status(mut self) -> Self {
        self.report_completion = true;
        self
    }

    /// Change or add the target of `channel`. Returns `false` if out of range.
    pub fn set_target(&mut self, channel: usize, cmd: OutputCmd) -> bool {
        if channel >= NUM_OUTPUTS {
            return false;
        }
        self.dirty = true;
        match self.targets.iter_mut().find(|(c, _)| *c == channel) {
            Some(slot) => slot.1 = cmd,
            None => {
                let _ = self.targets.push((channel, cmd));
            }
        }
        true
    }

    pub fn target(&self, channel: usize) -> Option<OutputCmd> {
        self.targets.iter().find(|(c, _)| *c == channel).map(|(_, cmd)| *cmd)
    }

    /// Updates run since the last start.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

impl MotionCommand for PostureMotion {
    fn core(&self) -> &CommandCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CommandCore {
        &mut self.core
    }

    fn update_outputs(&mut self, sink: &mut OutputSink) -> u32 {
        for (channel, cmd) in &self.targets {
            sink.set_output(*channel, *cmd);
        }
        for (joint, pid) in &self.pids {
            sink.set_pid(*joint, *pid);
        }
        self.ticks += 1;
        self.dirty = false;

        if !self.completed && !self.is_alive() {
            self.completed = true;
            if self.report_completion {
                sink.post_status();
            }
        }
        self.targets.len() as u32
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn is_alive(&self) -> bool {
        self.lifetime.is_none_or(|lifetime| self.ticks < lifetime)
    }

    fn do_start(&mut self) -> Result<(), BoxError> {
        self.ticks = 0;
        self.completed = false;
        self.dirty = true;
        Ok(())
    }
}
