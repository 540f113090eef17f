//! Linux-specific shared memory operations

use crate::error::{ShmError, ShmResult};
use memmap2::{MmapMut, MmapOptions};
use nix::unistd::getpid;
use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Directory backing all segments (tmpfs, RAM only)
pub const SHM_DIR: &str = "/dev/shm";

/// Prefix of every file this crate creates under [`SHM_DIR`]
pub const SEGMENT_PREFIX: &str = "motion_";

/// Page size used when nothing better is known
const FALLBACK_PAGE_SIZE: usize = 4096;

/// Mapping options for a new segment
#[derive(Debug, Clone, Copy)]
pub struct MappingConfig {
    /// Prefault pages with MAP_POPULATE so the RT loop never page-faults
    pub populate: bool,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self { populate: true }
    }
}

/// OS page size, queried once
pub fn page_size() -> usize {
    static PAGE: OnceLock<usize> = OnceLock::new();
    *PAGE.get_or_init(|| {
        // SAFETY: sysconf has no preconditions.
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size > 0 {
            size as usize
        } else {
            FALLBACK_PAGE_SIZE
        }
    })
}

/// Round `size` up to a whole number of pages (at least one)
pub fn round_to_page(size: usize) -> usize {
    let page = page_size();
    size.max(1).div_ceil(page) * page
}

/// Path of the segment file for `name`
pub fn segment_path(name: &str) -> PathBuf {
    Path::new(SHM_DIR).join(format!("{SEGMENT_PREFIX}{name}"))
}

/// Path of the JSON metadata sidecar for `name`
pub fn metadata_path(name: &str) -> PathBuf {
    Path::new(SHM_DIR).join(format!("{SEGMENT_PREFIX}{name}.meta"))
}

/// Create (or truncate) and map a segment file
pub fn create_segment_mmap(path: &Path, size: usize, config: &MappingConfig) -> ShmResult<MmapMut> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .read(true)
        .write(true)
        .mode(0o600)
        .open(path)
        .map_err(|e| map_open_error(path, e))?;

    file.set_len(size as u64)?;

    let mut options = MmapOptions::new();
    if config.populate {
        options.populate();
    }

    // SAFETY: the file was just sized; other processes only map it read/write
    // through this crate, which serialises access with the header sequence.
    let mmap = unsafe { options.map_mut(&file)? };
    Ok(mmap)
}

/// Map an existing segment file
pub fn attach_segment_mmap(path: &Path) -> ShmResult<MmapMut> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| map_open_error(path, e))?;

    // SAFETY: see `create_segment_mmap`.
    let mmap = unsafe { MmapOptions::new().map_mut(&file)? };
    Ok(mmap)
}

fn map_open_error(path: &Path, e: std::io::Error) -> ShmError {
    let name = path.display().to_string();
    match e.kind() {
        std::io::ErrorKind::NotFound => ShmError::NotFound { name },
        std::io::ErrorKind::PermissionDenied => ShmError::PermissionDenied { name },
        _ => ShmError::Io { source: e },
    }
}

/// Check if process is alive using kill(pid, 0)
pub fn is_process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    match kill(Pid::from_raw(pid as i32), None) {
        Ok(_) => true,
        Err(nix::Error::ESRCH) => false,
        // Exists, but owned by someone else.
        Err(nix::Error::EPERM) => true,
        Err(_) => false,
    }
}

/// Get current process ID
pub fn get_current_pid() -> u32 {
    getpid().as_raw() as u32
}

/// Lock all current and future pages of the process
pub fn lock_all_memory() -> ShmResult<()> {
    // SAFETY: plain syscall, no pointers involved.
    let ret = unsafe { libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) };
    if ret != 0 {
        return Err(ShmError::Io {
            source: std::io::Error::last_os_error(),
        });
    }
    Ok(())
}
