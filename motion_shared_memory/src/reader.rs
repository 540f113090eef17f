//! Lock-free reader with conflict detection

use crate::error::{ShmError, ShmResult};
use crate::platform::{attach_segment_mmap, is_process_alive, segment_path};
use crate::segment::{MappedSegment, ShmPod};
use crate::version::Sequence;
use std::marker::PhantomData;
use std::sync::atomic::{Ordering, fence};
use tracing::trace;

/// Attempts before a read gives up with [`ShmError::VersionConflict`]
pub const MAX_READ_RETRIES: usize = 10;

/// Reader of a `T` payload segment
pub struct SegmentReader<T: ShmPod> {
    segment: MappedSegment,
    last_seen_version: u64,
    _payload: PhantomData<T>,
}

impl<T: ShmPod> SegmentReader<T> {
    /// Attach to an existing segment, validating its layout against `T`
    pub fn attach(name: &str) -> ShmResult<Self> {
        let mmap = attach_segment_mmap(&segment_path(name)).map_err(|e| match e {
            ShmError::NotFound { .. } => ShmError::NotFound {
                name: name.to_string(),
            },
            other => other,
        })?;
        let header_only = MappedSegment::new::<()>(name.to_string(), mmap)?;
        header_only.header().validate::<T>(name)?;

        // Header says the payload fits; re-check against the mapping itself.
        let segment = MappedSegment::new::<T>(name.to_string(), header_only.into_mmap())?;
        let last_seen_version = segment.header().sequence().load();

        Ok(Self {
            segment,
            last_seen_version,
            _payload: PhantomData,
        })
    }

    /// Consistent copy of the payload
    pub fn read(&mut self) -> ShmResult<T> {
        let header = self.segment.header();
        let seq = header.sequence();
        let src = self.segment.payload_ptr() as *const T;

        for _attempt in 0..MAX_READ_RETRIES {
            let before = seq.load();
            if !Sequence::is_stable(before) {
                std::thread::yield_now();
                continue;
            }

            // SAFETY: payload region is sized for T (checked in attach).
            let value = unsafe { src.read_unaligned() };
            fence(Ordering::Acquire);

            let after = seq.load();
            if before == after {
                self.last_seen_version = after;
                return Ok(value);
            }
            trace!(before, after, "segment changed during read, retrying");
            std::thread::yield_now();
        }

        Err(ShmError::VersionConflict)
    }

    /// Get last seen version
    pub fn version(&self) -> u64 {
        self.last_seen_version
    }

    /// Check if data has changed since last read
    pub fn has_changed(&self) -> bool {
        let current = self.segment.header().sequence().load();
        current != self.last_seen_version && Sequence::is_stable(current)
    }

    /// Writes committed so far
    pub fn heartbeat(&self) -> u64 {
        self.segment.header().heartbeat()
    }

    /// Check if the writer process is still alive
    pub fn is_writer_alive(&self) -> bool {
        is_process_alive(self.segment.header().writer_pid)
    }

    /// Get segment name
    pub fn name(&self) -> &str {
        &self.segment.name
    }
}
