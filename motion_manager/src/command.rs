//! Motion command contract.
//!
//! A motion command is any type that can produce output requests once per
//! tick. The manager owns registered commands through a shared region and
//! calls into them with its own lock released, handing each call an
//! [`OutputSink`] bound to the command's id.
//!
//! ## Lifecycle
//!
//! ```text
//! Unstarted ──add──► Started ──remove/prune──► Stopped
//!                       ▲                          │
//!                       └──────────add─────────────┘
//! ```
//!
//! `do_start` runs once per add, `do_stop` once per remove. While started,
//! the manager calls `update_outputs` every tick until the command is
//! removed or `should_prune()` becomes true.

use std::any::{Any, TypeId};

use bitflags::bitflags;
use motion::consts::{NUM_FRAMES, NUM_OUTPUTS, NUM_PID_JOINTS};
use motion::ids::McId;
use motion::output::{OutputCmd, OutputPid};
use motion_shared_memory::SharedObject;
use tracing::debug;

use crate::error::BoxError;

/// Registered form of a command: a region handle holding the trait object.
pub type MotionObject = SharedObject<dyn MotionCommand>;

/// Construct `cmd` in a fresh region, ready for `add_*_motion`.
pub fn motion_object<T: MotionCommand>(cmd: T) -> MotionObject {
    SharedObject::new(Box::new(cmd) as Box<dyn MotionCommand>)
}

// ─── Downcasting ────────────────────────────────────────────────────

/// Upcast to `Any` for typed access to registered commands.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl dyn MotionCommand {
    /// Typed view of a registered command.
    pub fn downcast_ref<T: MotionCommand>(&self) -> Option<&T> {
        AsAny::as_any(self).downcast_ref()
    }

    /// Typed mutable view of a registered command.
    pub fn downcast_mut<T: MotionCommand>(&mut self) -> Option<&mut T> {
        AsAny::as_any_mut(self).downcast_mut()
    }

    /// `TypeId` of the concrete command behind the trait object.
    pub fn command_type(&self) -> TypeId {
        Any::type_id(AsAny::as_any(self))
    }
}

// ─── Command state ──────────────────────────────────────────────────

bitflags! {
    /// Lifecycle flags of a command.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MotionFlags: u8 {
        /// Remove automatically once `is_alive()` is false.
        const AUTOPRUNE = 0x01;
        /// `do_start` succeeded and `do_stop` has not run yet.
        const STARTED   = 0x02;
    }
}

/// State every command embeds and exposes through [`MotionCommand::core`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandCore {
    id: McId,
    flags: MotionFlags,
}

impl CommandCore {
    pub const fn new() -> Self {
        Self {
            id: McId::INVALID,
            flags: MotionFlags::empty(),
        }
    }

    /// Id assigned by the manager; `McId::INVALID` while unregistered.
    #[inline]
    pub fn id(&self) -> McId {
        self.id
    }

    #[inline]
    pub fn flags(&self) -> MotionFlags {
        self.flags
    }

    #[inline]
    pub fn is_started(&self) -> bool {
        self.flags.contains(MotionFlags::STARTED)
    }

    #[inline]
    pub fn autoprune(&self) -> bool {
        self.flags.contains(MotionFlags::AUTOPRUNE)
    }
}

impl Default for CommandCore {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Trait ──────────────────────────────────────────────────────────

/// A unit of motion registered with the manager.
///
/// Implementors must not lock their own region from inside
/// `update_outputs`; they already run under it.
pub trait MotionCommand: AsAny + Send {
    fn core(&self) -> &CommandCore;
    fn core_mut(&mut self) -> &mut CommandCore;

    /// Push this tick's requests into `sink`.
    ///
    /// The return value is advisory (conventionally the number of
    /// channels touched) and is only logged.
    fn update_outputs(&mut self, sink: &mut OutputSink) -> u32;

    /// Cheap hint that outputs changed since the last update.
    fn is_dirty(&self) -> bool;

    /// `false` once the command has nothing left to do.
    fn is_alive(&self) -> bool;

    /// Called once when the command is added.
    fn do_start(&mut self) -> Result<(), BoxError> {
        Ok(())
    }

    /// Called once when the command is removed.
    fn do_stop(&mut self) {}

    #[inline]
    fn id(&self) -> McId {
        self.core().id()
    }

    #[inline]
    fn is_started(&self) -> bool {
        self.core().is_started()
    }

    #[inline]
    fn autoprune(&self) -> bool {
        self.core().autoprune()
    }

    /// `autoprune && !is_alive()`.
    #[inline]
    fn should_prune(&self) -> bool {
        self.autoprune() && !self.is_alive()
    }
}

/// Assign `id`, run `do_start` and mark the command started.
///
/// On failure the command is left unstarted and unregistered.
pub(crate) fn start(cmd: &mut dyn MotionCommand, id: McId, autoprune: bool) -> Result<(), BoxError> {
    let core = cmd.core_mut();
    core.id = id;
    core.flags.set(MotionFlags::AUTOPRUNE, autoprune);

    match cmd.do_start() {
        Ok(()) => {
            cmd.core_mut().flags.insert(MotionFlags::STARTED);
            Ok(())
        }
        Err(e) => {
            *cmd.core_mut() = CommandCore::new();
            Err(e)
        }
    }
}

/// Run `do_stop` once and return the command to its unregistered state.
pub(crate) fn stop(cmd: &mut dyn MotionCommand) {
    if cmd.is_started() {
        cmd.do_stop();
    }
    *cmd.core_mut() = CommandCore::new();
}

// ─── Output sink ────────────────────────────────────────────────────

/// Caller-bound buffer for one command's requests during one update.
///
/// The manager flushes it into the arbitration tables after the command
/// returns, so commands never need the manager lock to submit values.
#[derive(Debug, Clone)]
pub struct OutputSink {
    caller: McId,
    cmds: [[Option<OutputCmd>; NUM_FRAMES]; NUM_OUTPUTS],
    pids: [Option<OutputPid>; NUM_PID_JOINTS],
    status: bool,
}

impl OutputSink {
    pub fn new(caller: McId) -> Self {
        Self {
            caller,
            cmds: [[None; NUM_FRAMES]; NUM_OUTPUTS],
            pids: [None; NUM_PID_JOINTS],
            status: false,
        }
    }

    /// Rebind to `caller` and drop every recorded request.
    pub fn reset(&mut self, caller: McId) {
        *self = Self::new(caller);
    }

    /// Command this sink is bound to.
    #[inline]
    pub fn caller(&self) -> McId {
        self.caller
    }

    /// Request `cmd` on `output` for every look-ahead frame.
    pub fn set_output(&mut self, output: usize, cmd: OutputCmd) -> bool {
        self.set_output_frames(output, &[cmd; NUM_FRAMES])
    }

    /// Request `cmd` on `output` for one frame.
    pub fn set_output_frame(&mut self, output: usize, cmd: OutputCmd, frame: usize) -> bool {
        if output >= NUM_OUTPUTS || frame >= NUM_FRAMES {
            debug!(caller = %self.caller, output, frame, "output request out of range");
            return false;
        }
        self.cmds[output][frame] = Some(cmd);
        true
    }

    /// Request a short trajectory on `output`, one value per frame.
    pub fn set_output_frames(&mut self, output: usize, frames: &[OutputCmd; NUM_FRAMES]) -> bool {
        let Some(slot) = self.cmds.get_mut(output) else {
            debug!(caller = %self.caller, output, "output request out of range");
            return false;
        };
        for (dst, cmd) in slot.iter_mut().zip(frames) {
            *dst = Some(*cmd);
        }
        true
    }

    /// Request PID gains for `joint`.
    pub fn set_pid(&mut self, joint: usize, pid: OutputPid) -> bool {
        let Some(slot) = self.pids.get_mut(joint) else {
            debug!(caller = %self.caller, joint, "PID request out of range");
            return false;
        };
        *slot = Some(pid);
        true
    }

    /// Report completion; posted as a `Status` event after the update.
    pub fn post_status(&mut self) {
        self.status = true;
    }

    pub fn status_posted(&self) -> bool {
        self.status
    }

    /// Request recorded for `output` in `frame`, if any.
    pub fn requested(&self, output: usize, frame: usize) -> Option<OutputCmd> {
        self.cmds.get(output)?.get(frame).copied().flatten()
    }

    pub fn requested_pid(&self, joint: usize) -> Option<OutputPid> {
        self.pids.get(joint).copied().flatten()
    }

    /// Every recorded output request as `(output, frame, cmd)`.
    pub fn output_requests(&self) -> impl Iterator<Item = (usize, usize, OutputCmd)> + '_ {
        self.cmds.iter().enumerate().flat_map(|(output, frames)| {
            frames
                .iter()
                .enumerate()
                .filter_map(move |(frame, cmd)| cmd.map(|c| (output, frame, c)))
        })
    }

    /// Every recorded PID request as `(joint, pid)`.
    pub fn pid_requests(&self) -> impl Iterator<Item = (usize, OutputPid)> + '_ {
        self.pids
            .iter()
            .enumerate()
            .filter_map(|(joint, pid)| pid.map(|p| (joint, p)))
    }
}
