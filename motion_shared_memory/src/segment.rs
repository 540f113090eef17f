//! Output segment layout and mapping
//!
//! A segment is `[SegmentHeader | payload]` in one `/dev/shm` file. The
//! payload is a plain-old-data type; its layout hash is stored in the
//! header so a reader built against a different layout refuses to attach.

use crate::error::{ShmError, ShmResult};
use crate::version::Sequence;
use memmap2::MmapMut;
use static_assertions::const_assert_eq;
use std::sync::atomic::{AtomicU64, Ordering};

/// Magic bytes identifying a motion output segment: `"MOTNSEG\0"`
pub const SEGMENT_MAGIC: [u8; 8] = *b"MOTNSEG\0";

/// Marker for payloads that may be copied byte-wise into shared memory.
///
/// # Safety
///
/// Implementors must be `#[repr(C)]`, contain no pointers or references,
/// and accept every bit pattern a writer of the same type can produce.
pub unsafe trait ShmPod: Copy + Send + 'static {}

macro_rules! impl_pod {
    ($($t:ty),*) => {
        // SAFETY: primitive numbers accept every bit pattern.
        $(unsafe impl ShmPod for $t {})*
    };
}

impl_pod!(u8, u16, u32, u64, i32, i64, f32, f64);

/// Hash of the payload's size and alignment
///
/// Does not catch field reordering within the same size and alignment;
/// `#[repr(C)]` payloads keep their declared order.
pub const fn layout_hash<T>() -> u32 {
    let size = core::mem::size_of::<T>() as u32;
    let align = core::mem::align_of::<T>() as u32;
    size.wrapping_mul(0x9E37_79B9) ^ align.wrapping_mul(0x517C_C1B7)
}

/// Segment header, one cache line
#[repr(C, align(64))]
pub struct SegmentHeader {
    /// Must equal [`SEGMENT_MAGIC`]
    pub magic: [u8; 8],
    /// [`layout_hash`] of the payload type
    pub layout_hash: u32,
    /// PID of the single writer
    pub writer_pid: u32,
    /// Payload size in bytes
    pub payload_size: u64,
    /// Even/odd write sequence
    pub sequence: AtomicU64,
    /// Incremented once per committed write
    pub heartbeat: AtomicU64,
    _padding: [u8; 24],
}

const_assert_eq!(core::mem::size_of::<SegmentHeader>(), 64);

impl SegmentHeader {
    /// Header for a freshly created segment
    pub fn new(layout_hash: u32, payload_size: usize, writer_pid: u32) -> Self {
        Self {
            magic: SEGMENT_MAGIC,
            layout_hash,
            writer_pid,
            payload_size: payload_size as u64,
            sequence: AtomicU64::new(0),
            heartbeat: AtomicU64::new(0),
            _padding: [0; 24],
        }
    }

    /// Validate magic and payload layout against `T`
    pub fn validate<T>(&self, name: &str) -> ShmResult<()> {
        if self.magic != SEGMENT_MAGIC {
            return Err(ShmError::InvalidHeader {
                name: name.to_string(),
            });
        }
        let expected = layout_hash::<T>();
        if self.layout_hash != expected {
            return Err(ShmError::LayoutMismatch {
                expected,
                found: self.layout_hash,
            });
        }
        if self.payload_size != core::mem::size_of::<T>() as u64 {
            return Err(ShmError::SizeMismatch {
                expected: core::mem::size_of::<T>(),
                found: self.payload_size as usize,
            });
        }
        Ok(())
    }

    /// Sequence word accessor
    pub fn sequence(&self) -> Sequence<'_> {
        Sequence::new(&self.sequence)
    }

    /// Committed writes so far
    pub fn heartbeat(&self) -> u64 {
        self.heartbeat.load(Ordering::Acquire)
    }
}

/// Mapped segment file
pub struct MappedSegment {
    /// Segment name (without prefix)
    pub name: String,
    mmap: MmapMut,
}

impl MappedSegment {
    /// Total bytes needed for header plus a `T` payload
    pub const fn total_size<T>() -> usize {
        core::mem::size_of::<SegmentHeader>() + core::mem::size_of::<T>()
    }

    /// Wrap a mapping, checking it is large enough for a `T` payload
    pub fn new<T>(name: String, mmap: MmapMut) -> ShmResult<Self> {
        if mmap.len() < Self::total_size::<T>() {
            return Err(ShmError::InvalidSize { size: mmap.len() });
        }
        Ok(Self { name, mmap })
    }

    /// Header view
    pub fn header(&self) -> &SegmentHeader {
        // SAFETY: the mapping is page-aligned and at least header-sized (checked in `new`).
        unsafe { &*(self.mmap.as_ptr() as *const SegmentHeader) }
    }

    /// Payload start
    pub fn payload_ptr(&self) -> *const u8 {
        // SAFETY: offset stays within the mapping (checked in `new`).
        unsafe { self.mmap.as_ptr().add(core::mem::size_of::<SegmentHeader>()) }
    }

    /// Payload start, writer side
    pub fn payload_ptr_mut(&mut self) -> *mut u8 {
        // SAFETY: as `payload_ptr`.
        unsafe {
            self.mmap
                .as_mut_ptr()
                .add(core::mem::size_of::<SegmentHeader>())
        }
    }

    /// Give back the mapping
    pub fn into_mmap(self) -> MmapMut {
        self.mmap
    }

    /// Raw header pointer for in-place initialisation
    pub(crate) fn header_ptr_mut(&mut self) -> *mut SegmentHeader {
        self.mmap.as_mut_ptr() as *mut SegmentHeader
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C)]
    #[derive(Clone, Copy)]
    struct Sample {
        a: u64,
        b: [f32; 4],
    }

    #[test]
    fn header_is_one_cache_line() {
        assert_eq!(core::mem::size_of::<SegmentHeader>(), 64);
        assert_eq!(core::mem::align_of::<SegmentHeader>(), 64);
    }

    #[test]
    fn validate_accepts_matching_layout() {
        let header = SegmentHeader::new(layout_hash::<Sample>(), core::mem::size_of::<Sample>(), 1);
        assert!(header.validate::<Sample>("s").is_ok());
    }

    #[test]
    fn validate_rejects_other_layout() {
        let header = SegmentHeader::new(layout_hash::<Sample>(), core::mem::size_of::<Sample>(), 1);
        assert!(matches!(
            header.validate::<u8>("s"),
            Err(ShmError::LayoutMismatch { .. })
        ));
    }

    #[test]
    fn validate_rejects_bad_magic() {
        let mut header =
            SegmentHeader::new(layout_hash::<Sample>(), core::mem::size_of::<Sample>(), 1);
        header.magic[0] = b'X';
        assert!(matches!(
            header.validate::<Sample>("s"),
            Err(ShmError::InvalidHeader { .. })
        ));
    }

    #[test]
    fn layout_hash_differs_by_type() {
        assert_ne!(layout_hash::<Sample>(), layout_hash::<u64>());
        assert_eq!(layout_hash::<Sample>(), layout_hash::<Sample>());
    }
}
