//! Per-entry recursive lock keyed by accessor.
//!
//! Each registered command has its own lock, independent of the
//! manager-wide lock, so unrelated commands never contend. The owner is a
//! logical accessor rather than an OS thread: the same accessor may lock
//! again while it already holds the lock (a command calling back into the
//! manager during its own update), and every lock must be matched by an
//! unlock from the same accessor.

use motion::ids::AccessorId;
use parking_lot::{Condvar, Mutex};
use tracing::error;

use crate::error::LockError;

/// Result of a non-blocking acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockResult {
    /// Lock held by the caller; `depth` counts nested acquisitions.
    Acquired {
        depth: u32,
    },
    /// Operation rejected, another accessor holds the lock.
    Rejected {
        /// Who holds the lock.
        held_by: AccessorId,
    },
}

#[derive(Debug, Default)]
struct LockState {
    owner: Option<AccessorId>,
    depth: u32,
}

/// Recursive, owner-tracking lock.
#[derive(Debug, Default)]
pub struct MotionLock {
    state: Mutex<LockState>,
    released: Condvar,
}

impl MotionLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire for `accessor`, waiting while another accessor holds it.
    ///
    /// Returns the nesting depth after acquisition.
    pub fn lock(&self, accessor: AccessorId) -> u32 {
        let mut state = self.state.lock();
        loop {
            let owner = state.owner;
            match owner {
                None => {
                    state.owner = Some(accessor);
                    state.depth = 1;
                    return 1;
                }
                Some(owner) if owner == accessor => {
                    state.depth += 1;
                    return state.depth;
                }
                Some(_) => self.released.wait(&mut state),
            }
        }
    }

    /// Acquire for `accessor` without waiting.
    pub fn try_lock(&self, accessor: AccessorId) -> LockResult {
        let mut state = self.state.lock();
        let owner = state.owner;
        match owner {
            None => {
                state.owner = Some(accessor);
                state.depth = 1;
                LockResult::Acquired { depth: 1 }
            }
            Some(owner) if owner == accessor => {
                state.depth += 1;
                LockResult::Acquired { depth: state.depth }
            }
            Some(owner) => LockResult::Rejected { held_by: owner },
        }
    }

    /// Release one level held by `accessor`.
    ///
    /// Returns the remaining depth; waiters are woken when it reaches zero.
    pub fn unlock(&self, accessor: AccessorId) -> Result<u32, LockError> {
        let mut state = self.state.lock();
        if state.owner != Some(accessor) {
            error!(caller = %accessor, held_by = ?state.owner, "unlock by non-owner");
            return Err(LockError::NotOwner {
                held_by: state.owner,
                caller: accessor,
            });
        }

        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            drop(state);
            self.released.notify_all();
            return Ok(0);
        }
        Ok(state.depth)
    }

    /// Current owner, if locked.
    pub fn owner(&self) -> Option<AccessorId> {
        self.state.lock().owner
    }

    /// Nesting depth of the current owner (0 if unlocked).
    pub fn depth(&self) -> u32 {
        self.state.lock().depth
    }

    pub fn is_locked(&self) -> bool {
        self.owner().is_some()
    }

    /// Whether `accessor` holds the lock.
    pub fn is_held_by(&self, accessor: AccessorId) -> bool {
        self.owner() == Some(accessor)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[test]
    fn acquire_and_release() {
        let lock = MotionLock::new();
        assert_eq!(lock.lock(AccessorId::MAIN), 1);
        assert!(lock.is_held_by(AccessorId::MAIN));

        assert_eq!(lock.unlock(AccessorId::MAIN), Ok(0));
        assert!(!lock.is_locked());
    }

    #[test]
    fn same_accessor_nests() {
        let lock = MotionLock::new();
        lock.lock(AccessorId::MOTION);
        assert_eq!(lock.lock(AccessorId::MOTION), 2);
        assert_eq!(lock.try_lock(AccessorId::MOTION), LockResult::Acquired { depth: 3 });

        assert_eq!(lock.unlock(AccessorId::MOTION), Ok(2));
        assert_eq!(lock.unlock(AccessorId::MOTION), Ok(1));
        assert!(lock.is_locked());
        assert_eq!(lock.unlock(AccessorId::MOTION), Ok(0));
        assert!(!lock.is_locked());
    }

    #[test]
    fn reject_different_accessor() {
        let lock = MotionLock::new();
        lock.lock(AccessorId::MAIN);
        assert_eq!(
            lock.try_lock(AccessorId::MOTION),
            LockResult::Rejected {
                held_by: AccessorId::MAIN
            }
        );
    }

    #[test]
    fn release_wrong_accessor_is_an_error() {
        let lock = MotionLock::new();
        lock.lock(AccessorId::MAIN);
        assert_eq!(
            lock.unlock(AccessorId::MOTION),
            Err(LockError::NotOwner {
                held_by: Some(AccessorId::MAIN),
                caller: AccessorId::MOTION
            })
        );
        assert!(lock.is_held_by(AccessorId::MAIN));
    }

    #[test]
    fn release_unlocked_is_an_error() {
        let lock = MotionLock::new();
        assert!(matches!(
            lock.unlock(AccessorId::MAIN),
            Err(LockError::NotOwner { held_by: None, .. })
        ));
    }

    #[test]
    fn blocked_accessor_proceeds_after_release() {
        let lock = Arc::new(MotionLock::new());
        lock.lock(AccessorId::MAIN);

        let acquired = Arc::new(AtomicBool::new(false));
        let waiter = {
            let lock = Arc::clone(&lock);
            let acquired = Arc::clone(&acquired);
            std::thread::spawn(move || {
                lock.lock(AccessorId::MOTION);
                acquired.store(true, Ordering::SeqCst);
                lock.unlock(AccessorId::MOTION).unwrap();
            })
        };

        std::thread::sleep(Duration::from_millis(20));
        assert!(!acquired.load(Ordering::SeqCst));

        lock.unlock(AccessorId::MAIN).unwrap();
        waiter.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
        assert!(!lock.is_locked());
    }
}
