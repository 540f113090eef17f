//! Registry entry of one motion command.
//!
//! The manager keeps one `Arc<CommandEntry>` per occupied slot. Cloning the
//! `Arc` lets the manager release its own lock before touching the entry's
//! lock or running the command.

use std::any::TypeId;
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};

use motion::ids::{AccessorId, McId};
use motion_shared_memory::Attachments;
use parking_lot::Mutex;

use crate::command::{MotionCommand, MotionObject};
use crate::lock::MotionLock;

/// Registration state of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EntryStatus {
    /// Slot reserved, `do_start` running.
    Starting = 0,
    /// Registered and visible to lookups.
    Active = 1,
    /// Unlinked from the registry; only in-flight holders still see it.
    Removed = 2,
}

impl EntryStatus {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Starting,
            1 => Self::Active,
            _ => Self::Removed,
        }
    }
}

/// Bookkeeping for one registered command.
pub struct CommandEntry {
    id: McId,
    priority: AtomicU32,
    status: AtomicU8,
    lock: MotionLock,
    attachments: Mutex<Attachments<dyn MotionCommand>>,
    /// Concrete type of the command, fixed at registration.
    command_type: TypeId,
}

impl CommandEntry {
    pub(crate) fn new(id: McId, priority: f32, owner: AccessorId, obj: MotionObject, command_type: TypeId) -> Self {
        Self {
            id,
            priority: AtomicU32::new(priority.to_bits()),
            status: AtomicU8::new(EntryStatus::Starting as u8),
            lock: MotionLock::new(),
            attachments: Mutex::new(Attachments::with_owner(owner, obj)),
            command_type,
        }
    }

    #[inline]
    pub fn id(&self) -> McId {
        self.id
    }

    #[inline]
    pub fn priority(&self) -> f32 {
        f32::from_bits(self.priority.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn set_priority(&self, priority: f32) {
        self.priority.store(priority.to_bits(), Ordering::Release);
    }

    #[inline]
    pub fn status(&self) -> EntryStatus {
        EntryStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.status() == EntryStatus::Active
    }

    pub(crate) fn activate(&self) {
        self.status.store(EntryStatus::Active as u8, Ordering::Release);
    }

    /// Flip `Active` to `Removed`. Only one caller ever wins.
    pub(crate) fn retire(&self) -> bool {
        self.status
            .compare_exchange(
                EntryStatus::Active as u8,
                EntryStatus::Removed as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Mark a failed registration as removed.
    pub(crate) fn abandon(&self) {
        self.status.store(EntryStatus::Removed as u8, Ordering::Release);
    }

    /// Whether the registered command is a `T`. Never touches the payload.
    #[inline]
    pub fn holds<T: MotionCommand>(&self) -> bool {
        self.command_type == TypeId::of::<T>()
    }

    #[inline]
    pub fn lock(&self) -> &MotionLock {
        &self.lock
    }

    /// Per-accessor handle cache.
    pub(crate) fn attachments(&self) -> parking_lot::MutexGuard<'_, Attachments<dyn MotionCommand>> {
        self.attachments.lock()
    }

    /// Handle resolved by `accessor`, if it has attached.
    pub(crate) fn handle(&self, accessor: AccessorId) -> Option<MotionObject> {
        self.attachments.lock().resolve(accessor).ok().cloned()
    }

    /// Whether `accessor` has attached.
    pub fn is_attached(&self, accessor: AccessorId) -> bool {
        self.attachments.lock().is_attached(accessor)
    }
}

impl std::fmt::Debug for CommandEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandEntry")
            .field("id", &self.id)
            .field("priority", &self.priority())
            .field("status", &self.status())
            .field("lock_owner", &self.lock.owner())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandCore, OutputSink, motion_object};

    struct Idle(CommandCore);

    impl MotionCommand for Idle {
        fn core(&self) -> &CommandCore {
            &self.0
        }
        fn core_mut(&mut self) -> &mut CommandCore {
            &mut self.0
        }
        fn update_outputs(&mut self, _sink: &mut OutputSink) -> u32 {
            0
        }
        fn is_dirty(&self) -> bool {
            false
        }
        fn is_alive(&self) -> bool {
            true
        }
    }

    fn entry() -> CommandEntry {
        CommandEntry::new(
            McId::new(0, 1),
            motion::priority::STD,
            AccessorId::MAIN,
            motion_object(Idle(CommandCore::new())),
            TypeId::of::<Idle>(),
        )
    }

    #[test]
    fn status_transitions() {
        let entry = entry();
        assert_eq!(entry.status(), EntryStatus::Starting);
        assert!(!entry.retire());

        entry.activate();
        assert!(entry.is_active());
        assert!(entry.retire());
        assert_eq!(entry.status(), EntryStatus::Removed);
        assert!(!entry.retire());
    }

    #[test]
    fn priority_is_live() {
        let entry = entry();
        assert_eq!(entry.priority(), motion::priority::STD);
        entry.set_priority(12.5);
        assert_eq!(entry.priority(), 12.5);
    }

    #[test]
    fn only_owner_is_attached() {
        let entry = entry();
        assert!(entry.is_attached(AccessorId::MAIN));
        assert!(!entry.is_attached(AccessorId::MOTION));
        assert!(entry.handle(AccessorId::MOTION).is_none());

        let handle = entry.handle(AccessorId::MAIN).unwrap();
        // Slot reference plus the clone.
        assert_eq!(handle.ref_count(), 2);
    }

    #[test]
    fn type_check_uses_registered_type() {
        let entry = entry();
        let handle = entry.handle(AccessorId::MAIN).unwrap();
        let _payload = handle.lock().unwrap();
        // Answered while the payload is held.
        assert!(entry.holds::<Idle>());
        assert!(!entry.holds::<crate::motions::PostureMotion>());
    }
}
