//! Per-accessor resolution cache
//!
//! A region handle is only meaningful to the accessor that resolved it.
//! [`Attachments`] keeps one slot per accessor; asking for an accessor's
//! handle before that accessor attached is an error, never a fallback to
//! another accessor's handle.

use crate::error::{ShmError, ShmResult};
use crate::region::SharedObject;
use motion::consts::MAX_ACCESS;
use motion::ids::AccessorId;

/// One optional resolved handle per accessor
pub struct Attachments<P: ?Sized + Send + 'static> {
    slots: [Option<SharedObject<P>>; MAX_ACCESS],
}

impl<P: ?Sized + Send + 'static> Attachments<P> {
    /// No accessor attached
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }

    /// Attached for `owner` only
    pub fn with_owner(owner: AccessorId, obj: SharedObject<P>) -> Self {
        let mut attachments = Self::new();
        attachments.attach(owner, obj);
        attachments
    }

    /// Record `accessor`'s handle, returning the one it replaces
    pub fn attach(&mut self, accessor: AccessorId, obj: SharedObject<P>) -> Option<SharedObject<P>> {
        self.slots[accessor.index()].replace(obj)
    }

    /// Handle previously attached by `accessor`
    pub fn resolve(&self, accessor: AccessorId) -> ShmResult<&SharedObject<P>> {
        self.slots[accessor.index()]
            .as_ref()
            .ok_or(ShmError::NotAttached { accessor })
    }

    /// Any attached handle, in accessor order
    pub fn any(&self) -> Option<&SharedObject<P>> {
        self.slots.iter().flatten().next()
    }

    /// Whether `accessor` holds a handle
    pub fn is_attached(&self, accessor: AccessorId) -> bool {
        self.slots[accessor.index()].is_some()
    }

    /// Number of accessors holding a handle
    pub fn attached_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Remove `accessor`'s handle without dropping it
    pub fn detach(&mut self, accessor: AccessorId) -> Option<SharedObject<P>> {
        self.slots[accessor.index()].take()
    }

    /// Remove every handle without dropping them.
    ///
    /// Callers drop the result outside their own locks; the last drop
    /// destructs the payload.
    pub fn detach_all(&mut self) -> Vec<SharedObject<P>> {
        self.slots.iter_mut().filter_map(Option::take).collect()
    }
}

impl<P: ?Sized + Send + 'static> Default for Attachments<P> {
    fn default() -> Self {
        Self::new()
    }
}
