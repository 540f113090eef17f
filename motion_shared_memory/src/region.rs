//! Reference-counted regions shared between accessors
//!
//! An [`RcRegion`] is a block that owns at most one payload. Every handle
//! is one reference; the count is the sum of holders across all accessors.
//! Dropping the handle that takes the count to zero destructs the payload
//! and releases the block.
//!
//! Regions created with a name are entered in a process-wide directory so
//! another accessor can [`RcRegion::attach`] to them by name.
//!
//! [`SharedObject`] is a handle to a region whose payload has been
//! constructed. It is the unit the manager stores per accessor.

use crate::error::{ShmError, ShmResult};
use crate::platform::round_to_page;
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, LazyLock, Weak};
use tracing::{debug, trace};

// ─── Directory ──────────────────────────────────────────────────────

type DirectoryEntry = Weak<dyn Any + Send + Sync>;

static DIRECTORY: LazyLock<Mutex<HashMap<String, DirectoryEntry>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Names of every live named region
pub fn list_named_regions() -> Vec<String> {
    let dir = DIRECTORY.lock();
    let mut names: Vec<String> = dir
        .iter()
        .filter(|(_, weak)| weak.strong_count() > 0)
        .map(|(name, _)| name.clone())
        .collect();
    names.sort();
    names
}

// ─── Region ─────────────────────────────────────────────────────────

struct RegionInner<P: ?Sized> {
    name: Option<String>,
    payload_size: usize,
    capacity: usize,
    refs: AtomicU32,
    payload: Mutex<Option<Box<P>>>,
}

impl<P: ?Sized> RegionInner<P> {
    /// Take one more reference unless the region already hit zero
    fn try_acquire(&self) -> bool {
        self.refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                if n == 0 { None } else { n.checked_add(1) }
            })
            .is_ok()
    }

    /// Drop one reference; the holder that observed the last one destructs.
    fn release(&self) -> bool {
        let prev = self.refs.fetch_sub(1, Ordering::AcqRel);
        if prev != 1 {
            trace!(refs = prev - 1, "region reference released");
            return false;
        }

        let payload = self.payload.lock().take();
        if let Some(name) = &self.name {
            let mut dir = DIRECTORY.lock();
            let ours = dir
                .get(name)
                .is_some_and(|weak| std::ptr::addr_eq(weak.as_ptr(), self as *const Self));
            if ours {
                dir.remove(name);
            }
        }
        debug!(name = ?self.name, constructed = payload.is_some(), "region released");
        drop(payload);
        true
    }
}

/// One reference to a reference-counted region
pub struct RcRegion<P: ?Sized + Send + 'static> {
    inner: Arc<RegionInner<P>>,
}

impl<P: ?Sized + Send + 'static> RcRegion<P> {
    /// Anonymous region for a payload of `payload_size` bytes.
    ///
    /// Capacity is rounded up to the OS page size. The caller holds the
    /// only reference.
    pub fn create(payload_size: usize) -> Self {
        Self::with_name(None, payload_size)
    }

    /// Region entered in the named directory.
    pub fn create_named(name: &str, payload_size: usize) -> ShmResult<Self> {
        if name.is_empty() {
            return Err(ShmError::NotFound {
                name: name.to_string(),
            });
        }

        let mut dir = DIRECTORY.lock();
        if dir.get(name).is_some_and(|weak| weak.strong_count() > 0) {
            return Err(ShmError::AlreadyExists {
                name: name.to_string(),
            });
        }

        let region = Self::with_name(Some(name.to_string()), payload_size);
        let erased: Arc<dyn Any + Send + Sync> = region.inner.clone();
        dir.insert(name.to_string(), Arc::downgrade(&erased));
        debug!(name, payload_size, capacity = region.capacity(), "named region created");
        Ok(region)
    }

    /// Attach to a named region, taking one reference.
    pub fn attach(name: &str) -> ShmResult<Self> {
        let not_found = || ShmError::NotFound {
            name: name.to_string(),
        };

        let erased = DIRECTORY
            .lock()
            .get(name)
            .and_then(Weak::upgrade)
            .ok_or_else(not_found)?;
        let inner = erased
            .downcast::<RegionInner<P>>()
            .map_err(|_| ShmError::TypeMismatch {
                name: name.to_string(),
            })?;

        if !inner.try_acquire() {
            return Err(not_found());
        }
        trace!(name, "attached to named region");
        Ok(Self { inner })
    }

    fn with_name(name: Option<String>, payload_size: usize) -> Self {
        Self {
            inner: Arc::new(RegionInner {
                name,
                payload_size,
                capacity: round_to_page(payload_size),
                refs: AtomicU32::new(1),
                payload: Mutex::new(None),
            }),
        }
    }

    /// Take an additional reference
    pub fn add_reference(&self) -> Self {
        self.inner.refs.fetch_add(1, Ordering::AcqRel);
        Self {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Give up this reference.
    ///
    /// Returns `true` if it was the last one and the payload was destructed.
    pub fn remove_reference(self) -> bool {
        let this = std::mem::ManuallyDrop::new(self);
        // SAFETY: `this` is never touched again, so the Arc moves out exactly once.
        let inner = unsafe { std::ptr::read(&this.inner) };
        inner.release()
    }

    /// References held across all accessors
    pub fn ref_count(&self) -> u32 {
        self.inner.refs.load(Ordering::Acquire)
    }

    /// Directory name, if any
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// Declared payload size in bytes
    pub fn payload_size(&self) -> usize {
        self.inner.payload_size
    }

    /// Page-rounded capacity in bytes
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Whether a payload has been constructed
    pub fn is_constructed(&self) -> bool {
        self.inner.payload.lock().is_some()
    }

    /// Whether both handles refer to the same region
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<P: ?Sized + Send + 'static> Clone for RcRegion<P> {
    fn clone(&self) -> Self {
        self.add_reference()
    }
}

impl<P: ?Sized + Send + 'static> Drop for RcRegion<P> {
    fn drop(&mut self) {
        self.inner.release();
    }
}

impl<P: ?Sized + Send + 'static> fmt::Debug for RcRegion<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RcRegion")
            .field("name", &self.inner.name)
            .field("payload_size", &self.inner.payload_size)
            .field("capacity", &self.inner.capacity)
            .field("refs", &self.ref_count())
            .finish()
    }
}

// ─── Shared object ──────────────────────────────────────────────────

/// Handle to a region holding a constructed payload
pub struct SharedObject<P: ?Sized + Send + 'static> {
    region: RcRegion<P>,
}

impl<P: ?Sized + Send + 'static> SharedObject<P> {
    /// Construct `payload` inside `region`.
    ///
    /// The payload must be exactly the size the region was created for.
    pub fn construct(region: RcRegion<P>, payload: Box<P>) -> ShmResult<Self> {
        let found = std::mem::size_of_val(&*payload);
        if found != region.payload_size() {
            tracing::error!(
                expected = region.payload_size(),
                found,
                "payload does not fit its region"
            );
            return Err(ShmError::SizeMismatch {
                expected: region.payload_size(),
                found,
            });
        }

        {
            let mut slot = region.inner.payload.lock();
            if slot.is_some() {
                return Err(ShmError::AlreadyConstructed);
            }
            *slot = Some(payload);
        }
        Ok(Self { region })
    }

    /// Fresh anonymous region sized for `payload`, constructed in place
    pub fn new(payload: Box<P>) -> Self {
        let region = RcRegion::create(std::mem::size_of_val(&*payload));
        *region.inner.payload.lock() = Some(payload);
        Self { region }
    }

    /// Wrap an attached region whose payload already exists
    pub fn from_region(region: RcRegion<P>) -> ShmResult<Self> {
        if !region.is_constructed() {
            return Err(ShmError::NotConstructed);
        }
        Ok(Self { region })
    }

    /// Attach to a named, constructed region
    pub fn attach(name: &str) -> ShmResult<Self> {
        Self::from_region(RcRegion::attach(name)?)
    }

    /// Lock the payload; `None` once the payload has been destructed
    pub fn lock(&self) -> Option<MappedMutexGuard<'_, P>> {
        MutexGuard::try_map(self.region.inner.payload.lock(), |slot| slot.as_deref_mut()).ok()
    }

    /// Non-blocking [`lock`](Self::lock)
    pub fn try_lock(&self) -> Option<MappedMutexGuard<'_, P>> {
        let guard = self.region.inner.payload.try_lock()?;
        MutexGuard::try_map(guard, |slot| slot.as_deref_mut()).ok()
    }

    /// Underlying region
    pub fn region(&self) -> &RcRegion<P> {
        &self.region
    }

    /// References held across all accessors
    pub fn ref_count(&self) -> u32 {
        self.region.ref_count()
    }

    /// Whether both handles refer to the same region
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.region.ptr_eq(&other.region)
    }

    /// Give up this reference; `true` if the payload was destructed
    pub fn release(self) -> bool {
        self.region.remove_reference()
    }
}

impl<P: ?Sized + Send + 'static> Clone for SharedObject<P> {
    fn clone(&self) -> Self {
        Self {
            region: self.region.add_reference(),
        }
    }
}

impl<P: ?Sized + Send + 'static> fmt::Debug for SharedObject<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedObject")
            .field("region", &self.region)
            .finish()
    }
}
