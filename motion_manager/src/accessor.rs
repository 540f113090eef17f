//! Scoped access to registered motions.
//!
//! [`MotionAccessor`] is the checkout/checkin pair as a guard: it holds the
//! entry lock for its accessor and checks in when dropped. [`MotionGuard`]
//! is the client-side owner of a registration and removes it when dropped.

use std::marker::PhantomData;
use std::sync::Arc;

use motion::ids::{AccessorId, McId};
use parking_lot::MappedMutexGuard;
use tracing::error;

use crate::command::{MotionCommand, MotionObject};
use crate::entry::CommandEntry;
use crate::manager::MotionManager;

/// Checked-out motion of type `T`.
pub struct MotionAccessor<T: MotionCommand> {
    entry: Arc<CommandEntry>,
    obj: MotionObject,
    accessor: AccessorId,
    _marker: PhantomData<fn() -> T>,
}

impl<T: MotionCommand> MotionAccessor<T> {
    pub(crate) fn new(entry: Arc<CommandEntry>, obj: MotionObject, accessor: AccessorId) -> Self {
        Self {
            entry,
            obj,
            accessor,
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> McId {
        self.entry.id()
    }

    pub fn accessor(&self) -> AccessorId {
        self.accessor
    }

    /// Typed access to the command.
    ///
    /// `None` once the payload has been destructed. Release the guard
    /// before calling back into the manager for the same motion.
    pub fn lock(&self) -> Option<MappedMutexGuard<'_, T>> {
        let cmd = self.obj.lock()?;
        MappedMutexGuard::try_map(cmd, |cmd| cmd.downcast_mut::<T>()).ok()
    }

    /// Untyped handle held by this checkout.
    pub fn object(&self) -> &MotionObject {
        &self.obj
    }
}

impl<T: MotionCommand> Drop for MotionAccessor<T> {
    fn drop(&mut self) {
        if let Err(e) = self.entry.lock().unlock(self.accessor) {
            error!(id = %self.entry.id(), error = %e, "checkin on drop failed");
        }
    }
}

/// Owner of one registration; removes the motion when dropped.
///
/// The manager may remove the motion first (pruning, another accessor);
/// [`is_active`](Self::is_active) tracks that.
pub struct MotionGuard {
    manager: Arc<MotionManager>,
    accessor: AccessorId,
    id: McId,
}

impl MotionGuard {
    pub fn new(manager: Arc<MotionManager>, accessor: AccessorId, id: McId) -> Self {
        Self { manager, accessor, id }
    }

    /// `McId::INVALID` if the registry was full.
    pub fn id(&self) -> McId {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.id.is_valid() && self.manager.is_registered(self.id)
    }

    /// Give up ownership without removing the motion.
    pub fn into_id(mut self) -> McId {
        std::mem::replace(&mut self.id, McId::INVALID)
    }
}

impl Drop for MotionGuard {
    fn drop(&mut self) {
        if self.id.is_valid() {
            self.manager.remove_motion(self.accessor, self.id);
        }
    }
}

impl std::fmt::Debug for MotionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotionGuard")
            .field("accessor", &self.accessor)
            .field("id", &self.id)
            .finish()
    }
}
