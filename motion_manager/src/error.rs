//! Error types of the motion manager.

use motion::ids::{AccessorId, McId};
use motion_shared_memory::ShmError;
use thiserror::Error;

/// Error returned by a command's start hook.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Misuse of the per-entry lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LockError {
    /// Release attempted by an accessor that does not hold the lock.
    #[error("lock release by {caller}, but lock is held by {held_by:?}")]
    NotOwner {
        /// Current owner, `None` if unlocked.
        held_by: Option<AccessorId>,
        /// Accessor that attempted the release.
        caller: AccessorId,
    },
}

/// Manager-level errors.
///
/// Registry exhaustion and stale ids are not errors: the former returns
/// `McId::INVALID`, the latter is a no-op.
#[derive(Debug, Error)]
pub enum MotionError {
    /// `do_start` failed; the registration was rolled back.
    #[error("motion {id} failed to start: {source}")]
    StartFailed {
        /// Id that had been reserved for the command.
        id: McId,
        /// Error raised by the command.
        #[source]
        source: BoxError,
    },

    /// Checkin without a matching checkout.
    #[error("accessor {accessor} has not checked out motion {id}")]
    NotCheckedOut {
        /// Motion being checked in.
        id: McId,
        /// Accessor that attempted the checkin.
        accessor: AccessorId,
    },

    /// Real-time operation called from the wrong accessor.
    #[error("{operation} is reserved to the motion accessor, called from {accessor}")]
    WrongAccessor {
        /// Operation name.
        operation: &'static str,
        /// Offending accessor.
        accessor: AccessorId,
    },

    /// Per-entry lock misuse.
    #[error(transparent)]
    Lock(#[from] LockError),

    /// Region error while resolving a command.
    #[error(transparent)]
    Shm(#[from] ShmError),
}
