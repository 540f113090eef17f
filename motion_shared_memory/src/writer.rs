//! Single writer with exclusive segment ownership

use crate::error::{ShmError, ShmResult};
use crate::platform::{
    MappingConfig, attach_segment_mmap, create_segment_mmap, get_current_pid, is_process_alive,
    metadata_path, segment_path,
};
use crate::segment::{MappedSegment, SegmentHeader, ShmPod, layout_hash};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::marker::PhantomData;
use std::os::unix::fs::OpenOptionsExt;
use std::sync::atomic::{Ordering, fence};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// JSON sidecar describing a segment, written next to it
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SegmentInfo {
    /// Segment name
    pub name: String,
    /// Payload size in bytes
    pub size: usize,
    /// Layout hash of the payload type
    pub layout_hash: u32,
    /// Writer process ID
    pub writer_pid: u32,
    /// Creation timestamp
    pub created_at: SystemTime,
}

impl SegmentInfo {
    /// Read the sidecar of `name`
    pub fn load(name: &str) -> ShmResult<Self> {
        let path = metadata_path(name);
        let text = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ShmError::NotFound {
                name: name.to_string(),
            },
            _ => ShmError::Io { source: e },
        })?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Single writer of a `T` payload segment
pub struct SegmentWriter<T: ShmPod> {
    segment: MappedSegment,
    writer_pid: u32,
    _payload: PhantomData<T>,
}

impl<T: ShmPod> SegmentWriter<T> {
    /// Create the segment, reclaiming it if its previous writer died
    pub fn create(name: &str) -> ShmResult<Self> {
        let writer_pid = get_current_pid();
        let path = segment_path(name);

        if path.exists() {
            Self::reclaim_stale(name)?;
        }

        let total = MappedSegment::total_size::<T>();
        let mut mmap = create_segment_mmap(&path, total, &MappingConfig::default())?;
        mmap.fill(0);
        let mut segment = MappedSegment::new::<T>(name.to_string(), mmap)?;

        // SAFETY: mapping is page-aligned and sized for the header (checked above).
        unsafe {
            segment.header_ptr_mut().write(SegmentHeader::new(
                layout_hash::<T>(),
                core::mem::size_of::<T>(),
                writer_pid,
            ));
        }
        fence(Ordering::Release);

        Self::write_metadata(name, writer_pid)?;
        info!(name, writer_pid, bytes = total, "output segment created");

        Ok(Self {
            segment,
            writer_pid,
            _payload: PhantomData,
        })
    }

    /// Remove leftovers of a dead writer; refuse if the writer is alive
    fn reclaim_stale(name: &str) -> ShmResult<()> {
        let path = segment_path(name);
        let owner = attach_segment_mmap(&path)
            .ok()
            .and_then(|mmap| MappedSegment::new::<()>(name.to_string(), mmap).ok())
            .map(|seg| seg.header().writer_pid);

        match owner {
            Some(pid) if pid != 0 && is_process_alive(pid) => Err(ShmError::AlreadyExists {
                name: name.to_string(),
            }),
            owner => {
                warn!(name, ?owner, "reclaiming stale output segment");
                let _ = std::fs::remove_file(&path);
                let _ = std::fs::remove_file(metadata_path(name));
                Ok(())
            }
        }
    }

    fn write_metadata(name: &str, writer_pid: u32) -> ShmResult<()> {
        let info = SegmentInfo {
            name: name.to_string(),
            size: core::mem::size_of::<T>(),
            layout_hash: layout_hash::<T>(),
            writer_pid,
            created_at: SystemTime::now(),
        };
        let json = serde_json::to_string_pretty(&info)?;

        let mut file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .mode(0o600)
            .open(metadata_path(name))?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    /// Publish `value`; readers see either the old or the new payload
    pub fn write(&mut self, value: &T) {
        let header_ptr = self.segment.header() as *const SegmentHeader;
        let dst = self.segment.payload_ptr_mut() as *mut T;

        // SAFETY: header lives in the mapping we own for the lifetime of self.
        let header = unsafe { &*header_ptr };
        let seq = header.sequence();
        seq.begin_write();
        // SAFETY: payload region is sized for T; unaligned write since the
        // payload follows a 64-byte header and T's alignment may be larger.
        unsafe { dst.write_unaligned(*value) };
        let version = seq.end_write();
        header.heartbeat.fetch_add(1, Ordering::Release);
        debug!(name = %self.segment.name, version, "segment written");
    }

    /// Current sequence value (even once a write completed)
    pub fn current_version(&self) -> u64 {
        self.segment.header().sequence().load()
    }

    /// Get writer process ID
    pub fn writer_pid(&self) -> u32 {
        self.writer_pid
    }

    /// Get segment name
    pub fn name(&self) -> &str {
        &self.segment.name
    }
}

impl<T: ShmPod> Drop for SegmentWriter<T> {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(segment_path(&self.segment.name));
        let _ = std::fs::remove_file(metadata_path(&self.segment.name));
        debug!(name = %self.segment.name, "output segment removed");
    }
}
