//! The motion manager: registry, checkout and the per-tick scheduler.
//!
//! ## Locks
//!
//! ```text
//! state (Mutex)        registry, inboxes, arbitration tables
//!   └─ attachments     per-entry handle cache, may be taken under `state`
//! entry lock           per-command recursive lock keyed by accessor
//!   └─ payload         the command itself, taken under the entry lock
//! committed (RwLock)   last resolved outputs, may be read under `state`
//! ```
//!
//! `state` is never held while an entry lock is awaited or while command
//! code runs, so commands may call back into the manager from their own
//! update.
//!
//! Checkout never takes the payload: typed checkout compares against the
//! type recorded at registration, so it nests inside a running update or
//! a held [`MotionAccessor::lock`] guard.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use heapless::Vec as FixedVec;
use motion::consts::{MAX_ACCESS, MAX_MOTIONS, NUM_FRAMES, NUM_OUTPUTS, NUM_PID_JOINTS};
use motion::event::{EventKind, EventSink, MotionEvent};
use motion::ids::{AccessorId, McId};
use motion::output::{OutputCmd, OutputPid};
use motion_shared_memory::OutputFrameBlock;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, trace, warn};

use crate::accessor::{MotionAccessor, MotionGuard};
use crate::arbitration::{OutputFrames, OutputTables};
use crate::command::{self, MotionCommand, MotionObject, OutputSink};
use crate::entry::CommandEntry;
use crate::error::MotionError;
use crate::lock::LockResult;
use crate::output::{CommittedOutputs, PidUpdate};

/// Entries snapshotted for one pass.
type EntryBatch = FixedVec<Arc<CommandEntry>, MAX_MOTIONS>;

// ─── Registry state ─────────────────────────────────────────────────

struct ManagerState {
    /// Occupied until removal has finished, not just until retirement.
    slots: [Option<Arc<CommandEntry>>; MAX_MOTIONS],
    generations: [u16; MAX_MOTIONS],
    /// Slots of active entries, in registration order.
    order: FixedVec<u16, MAX_MOTIONS>,
    /// Ids broadcast to each accessor and not attached yet.
    inboxes: [FixedVec<McId, MAX_MOTIONS>; MAX_ACCESS],
    tables: OutputTables,
    /// Self-removals requested during an update, finished after the pass.
    deferred: EntryBatch,
}

impl ManagerState {
    fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
            generations: [0; MAX_MOTIONS],
            order: FixedVec::new(),
            inboxes: core::array::from_fn(|_| FixedVec::new()),
            tables: OutputTables::new(),
            deferred: FixedVec::new(),
        }
    }

    /// Entry currently stored for `id`, whatever its status.
    fn find(&self, id: McId) -> Option<&Arc<CommandEntry>> {
        self.slots
            .get(id.slot())?
            .as_ref()
            .filter(|entry| entry.id() == id)
    }

    /// Registered entry for `id`.
    fn lookup(&self, id: McId) -> Option<&Arc<CommandEntry>> {
        self.find(id).filter(|entry| entry.is_active())
    }

    fn priority_of(&self, id: McId) -> Option<f32> {
        self.lookup(id).map(|entry| entry.priority())
    }

    fn active(&self) -> impl Iterator<Item = &Arc<CommandEntry>> + '_ {
        self.order
            .iter()
            .filter_map(|slot| self.slots[*slot as usize].as_ref())
    }
}

/// What one update pass did with an entry.
enum Serviced {
    Skipped,
    Prune,
    /// Requests are in the pass's sink.
    Updated,
}

// ─── Manager ────────────────────────────────────────────────────────

/// Registry and scheduler of motion commands.
///
/// Shared between accessors behind an `Arc`. Every operation names the
/// accessor it runs for; only [`AccessorId::MOTION`] may resolve outputs.
pub struct MotionManager {
    state: Mutex<ManagerState>,
    committed: RwLock<CommittedOutputs>,
    /// Raw id of the command inside `update_outputs`, or `INVALID`.
    servicing: AtomicU32,
    events: Option<Arc<dyn EventSink>>,
}

static_assertions::assert_impl_all!(MotionManager: Send, Sync);

impl Default for MotionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionManager {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ManagerState::new()),
            committed: RwLock::new(CommittedOutputs::default()),
            servicing: AtomicU32::new(McId::INVALID.raw()),
            events: None,
        }
    }

    /// Route lifecycle events to `sink`.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    // ─── Registration ───────────────────────────────────────────────

    /// Register a command that is removed once `is_alive()` turns false.
    ///
    /// Returns `McId::INVALID` when the registry is full.
    pub fn add_prunable_motion(
        &self,
        accessor: AccessorId,
        obj: MotionObject,
        priority: f32,
    ) -> Result<McId, MotionError> {
        self.add_motion(accessor, obj, priority, true)
    }

    /// Register a command that stays until explicitly removed.
    pub fn add_persistent_motion(
        &self,
        accessor: AccessorId,
        obj: MotionObject,
        priority: f32,
    ) -> Result<McId, MotionError> {
        self.add_motion(accessor, obj, priority, false)
    }

    /// [`add_prunable_motion`](Self::add_prunable_motion) or
    /// [`add_persistent_motion`](Self::add_persistent_motion), wrapped in a
    /// guard that removes the motion when dropped.
    pub fn add_guarded(
        self: &Arc<Self>,
        accessor: AccessorId,
        obj: MotionObject,
        priority: f32,
        prunable: bool,
    ) -> Result<MotionGuard, MotionError> {
        let id = self.add_motion(accessor, obj, priority, prunable)?;
        Ok(MotionGuard::new(Arc::clone(self), accessor, id))
    }

    fn add_motion(
        &self,
        accessor: AccessorId,
        obj: MotionObject,
        priority: f32,
        autoprune: bool,
    ) -> Result<McId, MotionError> {
        let Some(command_type) = obj.lock().map(|cmd| cmd.command_type()) else {
            warn!(%accessor, "motion payload already destructed");
            return Err(MotionError::StartFailed {
                id: McId::INVALID,
                source: "command payload already destructed".into(),
            });
        };
        let handle = obj.clone();
        let (slot, entry) = {
            let mut state = self.state.lock();
            let Some(slot) = state.slots.iter().position(Option::is_none) else {
                warn!(%accessor, capacity = MAX_MOTIONS, "motion registry full");
                return Ok(McId::INVALID);
            };
            let generation = state.generations[slot].wrapping_add(1);
            state.generations[slot] = generation;

            let id = McId::new(slot as u16, generation);
            let entry = Arc::new(CommandEntry::new(id, priority, accessor, obj, command_type));
            state.slots[slot] = Some(Arc::clone(&entry));
            (slot, entry)
        };
        let id = entry.id();

        let started = match handle.lock() {
            Some(mut cmd) => command::start(&mut *cmd, id, autoprune),
            None => Err("command payload already destructed".into()),
        };
        drop(handle);

        if let Err(source) = started {
            let detached = {
                let mut state = self.state.lock();
                entry.abandon();
                state.slots[slot] = None;
                entry.attachments().detach_all()
            };
            drop(detached);
            warn!(%id, %accessor, error = %source, "motion failed to start, registration rolled back");
            return Err(MotionError::StartFailed { id, source });
        }

        {
            let mut state = self.state.lock();
            entry.activate();
            if state.order.push(slot as u16).is_err() {
                error!(%id, "registration order overflow");
            }
            for other in AccessorId::all().filter(|other| *other != accessor) {
                if state.inboxes[other.index()].push(id).is_err() {
                    error!(%id, accessor = %other, "inbox overflow");
                }
            }
        }

        info!(%id, %accessor, priority, autoprune, "motion added");
        self.post(id, EventKind::Activate);
        Ok(id)
    }

    /// Stop and unregister `id`, dropping every accessor's reference.
    ///
    /// Stale or already removed ids are ignored. When a command removes
    /// itself from inside its own update, the stop runs once the update
    /// has returned. Must not be called while `accessor` holds the
    /// command's payload through [`MotionAccessor::lock`].
    pub fn remove_motion(&self, accessor: AccessorId, id: McId) {
        let Some(entry) = self.retire(id) else {
            debug!(%id, %accessor, "remove of unregistered motion ignored");
            return;
        };

        if accessor == AccessorId::MOTION && self.servicing.load(Ordering::Acquire) == id.raw() {
            if self.state.lock().deferred.push(entry).is_err() {
                error!(%id, "deferred removal queue overflow");
            }
            debug!(%id, "removal deferred until update returns");
            return;
        }

        self.finish_removal(accessor, entry);
    }

    /// Unlink `id` from everything lookups see. Only one caller wins.
    fn retire(&self, id: McId) -> Option<Arc<CommandEntry>> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let entry = Arc::clone(state.lookup(id)?);
        if !entry.retire() {
            return None;
        }

        let slot = id.slot();
        state.order.retain(|s| *s as usize != slot);
        for inbox in &mut state.inboxes {
            inbox.retain(|pending| *pending != id);
        }
        state.tables.forget(id);
        Some(entry)
    }

    fn finish_removal(&self, accessor: AccessorId, entry: Arc<CommandEntry>) {
        let id = entry.id();

        entry.lock().lock(accessor);
        let handle = entry.attachments().any().cloned();
        if let Some(mut cmd) = handle.as_ref().and_then(|h| h.lock()) {
            command::stop(&mut *cmd);
        }
        self.release(&entry, accessor);

        let detached = entry.attachments().detach_all();
        {
            let mut state = self.state.lock();
            let slot = id.slot();
            if state.slots[slot]
                .as_ref()
                .is_some_and(|stored| Arc::ptr_eq(stored, &entry))
            {
                state.slots[slot] = None;
            }
        }

        drop(handle);
        let destructed = detached
            .into_iter()
            .fold(false, |last, obj| obj.release() || last);
        info!(%id, %accessor, destructed, "motion removed");
        self.post(id, EventKind::Deactivate);
    }

    fn release(&self, entry: &CommandEntry, accessor: AccessorId) {
        if let Err(e) = entry.lock().unlock(accessor) {
            error!(id = %entry.id(), error = %e, "entry lock release failed");
        }
    }

    // ─── Lookup & iteration ─────────────────────────────────────────

    fn entry(&self, id: McId) -> Option<Arc<CommandEntry>> {
        self.state.lock().lookup(id).cloned()
    }

    /// Whether `id` names a registered motion.
    pub fn is_registered(&self, id: McId) -> bool {
        self.state.lock().lookup(id).is_some()
    }

    /// Number of registered motions.
    pub fn size(&self) -> usize {
        self.state.lock().order.len()
    }

    /// First motion visible to `accessor`, or [`end`](Self::end).
    pub fn begin(&self, accessor: AccessorId) -> McId {
        let state = self.state.lock();
        state
            .active()
            .find(|entry| entry.is_attached(accessor))
            .map_or(McId::INVALID, |entry| entry.id())
    }

    /// Motion after `id` in registration order, skipping entries
    /// `accessor` has not attached yet.
    ///
    /// Returns [`end`](Self::end) if `id` is no longer registered.
    pub fn next(&self, accessor: AccessorId, id: McId) -> McId {
        let state = self.state.lock();
        state
            .active()
            .skip_while(|entry| entry.id() != id)
            .skip(1)
            .find(|entry| entry.is_attached(accessor))
            .map_or(McId::INVALID, |entry| entry.id())
    }

    /// Iteration sentinel.
    #[inline]
    pub const fn end(&self) -> McId {
        McId::INVALID
    }

    /// Snapshot of the motions visible to `accessor`.
    pub fn motions(&self, accessor: AccessorId) -> Vec<McId> {
        let state = self.state.lock();
        state
            .active()
            .filter(|entry| entry.is_attached(accessor))
            .map(|entry| entry.id())
            .collect()
    }

    /// Attach every motion broadcast to `accessor` since the last call.
    ///
    /// Returns the number of motions attached.
    pub fn process_pending(&self, accessor: AccessorId) -> usize {
        let pending = std::mem::take(&mut self.state.lock().inboxes[accessor.index()]);
        let mut attached = 0;
        for id in pending {
            let Some(entry) = self.entry(id) else {
                continue;
            };
            if let Some((_, true)) = Self::attach(&entry, accessor) {
                attached += 1;
            }
        }
        if attached > 0 {
            debug!(%accessor, attached, "pending motions attached");
        }
        attached
    }

    /// Resolve `accessor`'s handle, attaching it from another accessor's
    /// handle the first time. The flag is `true` when this call attached.
    fn attach(entry: &CommandEntry, accessor: AccessorId) -> Option<(MotionObject, bool)> {
        let mut attachments = entry.attachments();
        if let Ok(handle) = attachments.resolve(accessor) {
            return Some((handle.clone(), false));
        }
        // Retirement happens before detach, so checking here keeps a late
        // attach from outliving the removal.
        if !entry.is_active() {
            return None;
        }
        let handle = attachments.any()?.clone();
        attachments.attach(accessor, handle.clone());
        trace!(id = %entry.id(), %accessor, "motion attached");
        Some((handle, true))
    }

    // ─── Checkout ───────────────────────────────────────────────────

    /// Lock `id` for `accessor` and return its handle.
    ///
    /// With `block == false`, returns `None` instead of waiting when the
    /// other accessor holds the motion. Each successful checkout must be
    /// matched by [`checkin_motion`](Self::checkin_motion).
    pub fn checkout_motion(&self, accessor: AccessorId, id: McId, block: bool) -> Option<MotionObject> {
        let entry = self.entry(id)?;
        self.checkout_entry(&entry, accessor, block)
    }

    fn checkout_entry(&self, entry: &CommandEntry, accessor: AccessorId, block: bool) -> Option<MotionObject> {
        self.lock_entry(entry, accessor, block)?;

        if !entry.is_active() {
            self.release(entry, accessor);
            return None;
        }
        let Some((handle, attached)) = Self::attach(entry, accessor) else {
            self.release(entry, accessor);
            return None;
        };
        if attached {
            let id = entry.id();
            self.state.lock().inboxes[accessor.index()].retain(|pending| *pending != id);
        }
        Some(handle)
    }

    /// Release one checkout of `id` by `accessor`.
    ///
    /// Stale ids are ignored; a checkin without a matching checkout is an
    /// error.
    pub fn checkin_motion(&self, accessor: AccessorId, id: McId) -> Result<(), MotionError> {
        let Some(entry) = self.state.lock().find(id).cloned() else {
            debug!(%id, %accessor, "checkin of unregistered motion ignored");
            return Ok(());
        };
        entry
            .lock()
            .unlock(accessor)
            .map(|_| ())
            .map_err(|_| MotionError::NotCheckedOut { id, accessor })
    }

    /// Blocking typed checkout; `None` if `id` is stale or not a `T`.
    pub fn checkout<T: MotionCommand>(&self, accessor: AccessorId, id: McId) -> Option<MotionAccessor<T>> {
        self.typed_checkout(accessor, id, true)
    }

    /// Non-blocking typed checkout.
    pub fn try_checkout<T: MotionCommand>(&self, accessor: AccessorId, id: McId) -> Option<MotionAccessor<T>> {
        self.typed_checkout(accessor, id, false)
    }

    fn typed_checkout<T: MotionCommand>(
        &self,
        accessor: AccessorId,
        id: McId,
        block: bool,
    ) -> Option<MotionAccessor<T>> {
        let entry = self.entry(id)?;
        if !entry.holds::<T>() {
            debug!(%id, %accessor, "checkout type mismatch");
            return None;
        }
        let obj = self.checkout_entry(&entry, accessor, block)?;
        Some(MotionAccessor::new(entry, obj, accessor))
    }

    fn lock_entry(&self, entry: &CommandEntry, accessor: AccessorId, block: bool) -> Option<u32> {
        if block {
            return Some(entry.lock().lock(accessor));
        }
        match entry.lock().try_lock(accessor) {
            LockResult::Acquired { depth } => Some(depth),
            LockResult::Rejected { held_by } => {
                trace!(id = %entry.id(), %accessor, %held_by, "checkout rejected");
                None
            }
        }
    }

    // ─── Output submission ──────────────────────────────────────────

    /// Request `cmd` on `output` for every frame of the current tick.
    pub fn set_output(&self, caller: McId, output: usize, cmd: OutputCmd) -> bool {
        self.set_output_frames(caller, output, &[cmd; NUM_FRAMES])
    }

    /// Request `cmd` on `output` for one look-ahead frame.
    pub fn set_output_frame(&self, caller: McId, output: usize, cmd: OutputCmd, frame: usize) -> bool {
        let mut state = self.state.lock();
        if state.lookup(caller).is_none() {
            debug!(%caller, output, "output from unregistered motion ignored");
            return false;
        }
        state.tables.record_frame(caller, output, frame, cmd)
    }

    /// Request one value per look-ahead frame on `output`.
    pub fn set_output_frames(&self, caller: McId, output: usize, frames: &[OutputCmd; NUM_FRAMES]) -> bool {
        if output >= NUM_OUTPUTS {
            debug!(%caller, output, "output request out of range");
            return false;
        }
        let mut state = self.state.lock();
        if state.lookup(caller).is_none() {
            debug!(%caller, output, "output from unregistered motion ignored");
            return false;
        }
        frames
            .iter()
            .enumerate()
            .all(|(frame, cmd)| state.tables.record_frame(caller, output, frame, *cmd))
    }

    /// Request PID gains for `joint`.
    pub fn set_pid(&self, caller: McId, joint: usize, pid: OutputPid) -> bool {
        if joint >= NUM_PID_JOINTS {
            debug!(%caller, joint, "PID request out of range");
            return false;
        }
        let mut state = self.state.lock();
        if state.lookup(caller).is_none() {
            debug!(%caller, joint, "PID from unregistered motion ignored");
            return false;
        }
        state.tables.record_pid(caller, joint, pid)
    }

    // ─── Priority ───────────────────────────────────────────────────

    pub fn get_priority(&self, id: McId) -> Option<f32> {
        self.state.lock().priority_of(id)
    }

    /// Change the priority of `id`; takes effect at the next resolution.
    pub fn set_priority(&self, id: McId, priority: f32) -> bool {
        let Some(entry) = self.entry(id) else {
            debug!(%id, "priority change for unregistered motion ignored");
            return false;
        };
        entry.set_priority(priority);
        debug!(%id, priority, "priority changed");
        true
    }

    // ─── Resolution ─────────────────────────────────────────────────

    /// Run one tick: update every attached motion, prune the expired ones
    /// and resolve all channels.
    ///
    /// Reserved to [`AccessorId::MOTION`].
    pub fn get_outputs(&self, accessor: AccessorId) -> Result<OutputFrames, MotionError> {
        if accessor != AccessorId::MOTION {
            return Err(MotionError::WrongAccessor {
                operation: "get_outputs",
                accessor,
            });
        }
        self.process_pending(accessor);

        let entries: EntryBatch = {
            let state = self.state.lock();
            state
                .active()
                .filter(|entry| entry.is_attached(accessor))
                .cloned()
                .collect()
        };

        let mut prune = EntryBatch::new();
        let mut sink = OutputSink::new(McId::INVALID);
        for entry in entries {
            entry.lock().lock(accessor);
            let serviced = self.update_entry(&entry, accessor, &mut sink);
            self.release(&entry, accessor);

            match serviced {
                Serviced::Skipped => {}
                Serviced::Prune => {
                    if prune.push(entry).is_err() {
                        error!("prune list overflow");
                    }
                }
                Serviced::Updated => {
                    let id = entry.id();
                    {
                        let mut state = self.state.lock();
                        if entry.is_active() {
                            for (output, frame, cmd) in sink.output_requests() {
                                state.tables.record_frame(id, output, frame, cmd);
                            }
                            for (joint, pid) in sink.pid_requests() {
                                state.tables.record_pid(id, joint, pid);
                            }
                        }
                    }
                    if sink.status_posted() {
                        self.post(id, EventKind::Status);
                    }
                }
            }
        }

        let (frames, deferred) = {
            let mut state = self.state.lock();
            let previous = self.committed.read().frames;
            let frames = state.tables.resolve_outputs(|id| state.priority_of(id), &previous);
            state.tables.clear_outputs();
            (frames, std::mem::take(&mut state.deferred))
        };
        {
            let mut committed = self.committed.write();
            committed.frames = frames;
            committed.tick += 1;
        }

        for entry in deferred {
            self.finish_removal(accessor, entry);
        }
        for entry in prune {
            if let Some(entry) = self.retire(entry.id()) {
                debug!(id = %entry.id(), "pruning expired motion");
                self.finish_removal(accessor, entry);
            }
        }
        Ok(frames)
    }

    /// Run one command's update into `sink`. The caller holds the entry lock.
    fn update_entry(&self, entry: &CommandEntry, accessor: AccessorId, sink: &mut OutputSink) -> Serviced {
        if !entry.is_active() {
            return Serviced::Skipped;
        }
        let Some(handle) = entry.handle(accessor) else {
            return Serviced::Skipped;
        };
        let Some(mut cmd) = handle.lock() else {
            return Serviced::Skipped;
        };
        if cmd.should_prune() {
            return Serviced::Prune;
        }

        let id = entry.id();
        sink.reset(id);
        self.servicing.store(id.raw(), Ordering::Release);
        let touched = cmd.update_outputs(sink);
        let dirty = cmd.is_dirty();
        self.servicing.store(McId::INVALID.raw(), Ordering::Release);
        trace!(%id, touched, dirty, "motion updated");
        Serviced::Updated
    }

    /// Resolve PID gains and return the joints whose gains changed since
    /// the previous call.
    ///
    /// Reserved to [`AccessorId::MOTION`].
    pub fn update_pids(&self, accessor: AccessorId) -> Result<FixedVec<PidUpdate, NUM_PID_JOINTS>, MotionError> {
        if accessor != AccessorId::MOTION {
            return Err(MotionError::WrongAccessor {
                operation: "update_pids",
                accessor,
            });
        }

        let (previous, pids) = {
            let mut state = self.state.lock();
            let previous = self.committed.read().pids;
            let pids = state.tables.resolve_pids(|id| state.priority_of(id), &previous);
            state.tables.clear_pids();
            (previous, pids)
        };
        self.committed.write().pids = pids;

        let mut updates = FixedVec::new();
        for (joint, (new, old)) in pids.iter().zip(previous.iter()).enumerate() {
            if new != old {
                // One slot per joint, cannot overflow.
                let _ = updates.push(PidUpdate { joint, pid: *new });
            }
        }
        if !updates.is_empty() {
            debug!(changed = updates.len(), "PID gains updated");
        }
        Ok(updates)
    }

    // ─── Committed outputs ──────────────────────────────────────────

    /// Value committed on `channel` by the last tick.
    pub fn committed_output(&self, channel: usize) -> Option<f32> {
        self.committed.read().latest(channel)
    }

    /// Look-ahead frames committed by the last tick.
    pub fn committed_frames(&self) -> OutputFrames {
        self.committed.read().frames
    }

    pub fn committed(&self) -> CommittedOutputs {
        *self.committed.read()
    }

    /// Committed outputs in their shared-memory layout.
    pub fn output_block(&self) -> OutputFrameBlock {
        self.committed.read().to_block()
    }

    /// Ticks resolved so far.
    pub fn tick(&self) -> u64 {
        self.committed.read().tick
    }

    fn post(&self, source: McId, kind: EventKind) {
        if let Some(sink) = &self.events {
            sink.post(MotionEvent::new(source, kind, self.tick()));
        }
    }
}

impl std::fmt::Debug for MotionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotionManager")
            .field("size", &self.size())
            .field("tick", &self.tick())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandCore, motion_object};
    use motion::priority;

    struct Constant {
        core: CommandCore,
        channel: usize,
        value: f32,
    }

    impl Constant {
        fn new(channel: usize, value: f32) -> Self {
            Self {
                core: CommandCore::new(),
                channel,
                value,
            }
        }
    }

    impl MotionCommand for Constant {
        fn core(&self) -> &CommandCore {
            &self.core
        }
        fn core_mut(&mut self) -> &mut CommandCore {
            &mut self.core
        }
        fn update_outputs(&mut self, sink: &mut OutputSink) -> u32 {
            sink.set_output(self.channel, OutputCmd::new(self.value));
            1
        }
        fn is_dirty(&self) -> bool {
            true
        }
        fn is_alive(&self) -> bool {
            true
        }
    }

    #[test]
    fn generation_changes_on_slot_reuse() {
        let mgr = MotionManager::new();
        let a = mgr
            .add_persistent_motion(AccessorId::MAIN, motion_object(Constant::new(0, 1.0)), priority::STD)
            .unwrap();
        mgr.remove_motion(AccessorId::MAIN, a);
        let b = mgr
            .add_persistent_motion(AccessorId::MAIN, motion_object(Constant::new(0, 1.0)), priority::STD)
            .unwrap();
        assert_eq!(a.slot(), b.slot());
        assert_ne!(a, b);
        assert!(!mgr.is_registered(a));
        assert!(mgr.is_registered(b));
    }

    #[test]
    fn owner_sees_motion_before_other_accessor() {
        let mgr = MotionManager::new();
        let id = mgr
            .add_persistent_motion(AccessorId::MAIN, motion_object(Constant::new(0, 1.0)), priority::STD)
            .unwrap();
        assert_eq!(mgr.begin(AccessorId::MAIN), id);
        assert_eq!(mgr.begin(AccessorId::MOTION), mgr.end());

        assert_eq!(mgr.process_pending(AccessorId::MOTION), 1);
        assert_eq!(mgr.begin(AccessorId::MOTION), id);
        assert_eq!(mgr.process_pending(AccessorId::MOTION), 0);
    }

    #[test]
    fn submissions_from_unknown_callers_are_ignored() {
        let mgr = MotionManager::new();
        assert!(!mgr.set_output(McId::new(3, 1), 0, OutputCmd::new(1.0)));
        assert!(!mgr.set_pid(McId::INVALID, 0, OutputPid::new(1.0, 0.0, 0.0)));
        assert_eq!(mgr.get_priority(McId::new(3, 1)), None);
        assert!(!mgr.set_priority(McId::new(3, 1), priority::HIGH));
    }

    #[test]
    fn direct_submission_counts_for_next_tick() {
        let mgr = MotionManager::new();
        let id = mgr
            .add_persistent_motion(AccessorId::MAIN, motion_object(Constant::new(0, 1.0)), priority::LOW)
            .unwrap();
        assert!(mgr.set_output_frame(id, 4, OutputCmd::new(2.0), NUM_FRAMES - 1));
        assert!(!mgr.set_output_frame(id, 4, OutputCmd::new(2.0), NUM_FRAMES));
        assert!(!mgr.set_output(id, NUM_OUTPUTS, OutputCmd::new(2.0)));

        let frames = mgr.get_outputs(AccessorId::MOTION).unwrap();
        assert_eq!(frames[NUM_FRAMES - 1][4], 2.0);
        assert_eq!(frames[0][4], 0.0);
        assert_eq!(frames[0][0], 1.0);
    }
}
