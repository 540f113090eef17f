//! Fixed-period tick loop around [`MotionManager::get_outputs`].
//!
//! The manager owns no threads; [`TickRunner`] is the real-time accessor's
//! driver. Each tick:
//!
//! 1. `get_outputs(MOTION)` updates every motion and resolves all channels.
//! 2. Every `pid_update_divider` ticks, `update_pids(MOTION)` resolves gains.
//! 3. The committed block is published to the output segment, if any,
//!    with the joints whose gains changed flagged in `pid_changed`.
//!
//! ## RT Setup
//! 1. `mlockall(MCL_CURRENT | MCL_FUTURE)`
//! 2. Prefault stack pages.
//! 3. `sched_setaffinity` to the configured core.
//! 4. `sched_setscheduler(SCHED_FIFO, priority)`.
//!
//! All four are no-ops without the `rt` feature.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use motion::ids::AccessorId;
use motion_shared_memory::{OutputSegmentWriter, ShmError};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::arbitration::OutputFrames;
use crate::config::{MotionManagerConfig, OverrunPolicy};
use crate::error::MotionError;
use crate::manager::MotionManager;
use crate::output::changed_mask;

// ─── Tick Statistics ────────────────────────────────────────────────

/// O(1) per-tick timing statistics.
#[derive(Debug, Clone)]
pub struct CycleStats {
    /// Total ticks executed.
    pub cycle_count: u64,
    /// Last tick duration [ns].
    pub last_cycle_ns: i64,
    pub min_cycle_ns: i64,
    pub max_cycle_ns: i64,
    /// Running sum for average computation.
    pub sum_cycle_ns: i64,
    /// Ticks that exceeded the period.
    pub overruns: u64,
    /// Maximum wake-up latency [ns].
    pub max_latency_ns: i64,
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: i64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            overruns: 0,
            max_latency_ns: 0,
        }
    }

    /// Record one tick. O(1), no allocation.
    #[inline]
    pub fn record(&mut self, duration_ns: i64, latency_ns: i64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        self.min_cycle_ns = self.min_cycle_ns.min(duration_ns);
        self.max_cycle_ns = self.max_cycle_ns.max(duration_ns);
        self.sum_cycle_ns += duration_ns;
        self.max_latency_ns = self.max_latency_ns.max(latency_ns);
    }

    /// Average tick time [ns] (0 if no ticks).
    #[inline]
    pub fn avg_cycle_ns(&self) -> i64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count as i64
        }
    }
}

// ─── Errors ─────────────────────────────────────────────────────────

/// Errors during RT setup or the tick loop.
#[derive(Debug, Error)]
pub enum CycleError {
    /// RT system call failed.
    #[error("RT setup error: {0}")]
    RtSetup(String),

    #[error(transparent)]
    Motion(#[from] MotionError),

    /// Output segment could not be created.
    #[error("segment error: {0}")]
    Segment(#[from] ShmError),

    /// Tick exceeded its period under [`OverrunPolicy::Abort`].
    #[error("tick overrun: {actual_ns}ns > {budget_ns}ns budget")]
    CycleOverrun {
        /// Actual tick duration [ns].
        actual_ns: i64,
        /// Configured tick period [ns].
        budget_ns: i64,
    },
}

// ─── RT Setup ───────────────────────────────────────────────────────

#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), CycleError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| CycleError::RtSetup(format!("mlockall failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), CycleError> {
    Ok(())
}

/// Touch 256 KiB of stack so the loop does not fault it in.
fn prefault_stack() {
    let mut buf = [0u8; 256 * 1024];
    for byte in buf.iter_mut() {
        // SAFETY: `byte` is a valid, exclusive reference into `buf`.
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), CycleError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| CycleError::RtSetup(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| CycleError::RtSetup(format!("sched_setaffinity failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> Result<(), CycleError> {
    Ok(())
}

#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), CycleError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: `param` outlives the call; pid 0 is the calling thread.
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(CycleError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), CycleError> {
    Ok(())
}

/// Full RT setup sequence; call on the thread that will run the loop.
pub fn rt_setup(cpu_core: Option<usize>, rt_priority: i32) -> Result<(), CycleError> {
    rt_mlockall()?;
    prefault_stack();
    if let Some(cpu) = cpu_core {
        rt_set_affinity(cpu)?;
    }
    rt_set_scheduler(rt_priority)?;
    debug!(?cpu_core, rt_priority, rt = cfg!(feature = "rt"), "RT setup done");
    Ok(())
}

// ─── Tick Runner ────────────────────────────────────────────────────

/// Drives the real-time accessor of a [`MotionManager`].
pub struct TickRunner {
    manager: Arc<MotionManager>,
    period_ns: i64,
    overrun_policy: OverrunPolicy,
    pid_divider: u64,
    publisher: Option<OutputSegmentWriter>,
    stats: CycleStats,
    running: Arc<AtomicBool>,
}

impl TickRunner {
    /// Build a runner; creates the output segment if one is configured.
    pub fn new(manager: Arc<MotionManager>, config: &MotionManagerConfig) -> Result<Self, CycleError> {
        let publisher = match &config.publish_segment {
            Some(name) => {
                let writer = OutputSegmentWriter::create(name)?;
                info!(segment = name.as_str(), "publishing committed outputs");
                Some(writer)
            }
            None => None,
        };

        Ok(Self {
            manager,
            period_ns: (config.tick_period_us * 1_000) as i64,
            overrun_policy: config.overrun_policy,
            pid_divider: u64::from(config.pid_update_divider.max(1)),
            publisher,
            stats: CycleStats::new(),
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Flag that stops [`run`](Self::run) after the current tick when cleared.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    pub fn manager(&self) -> &Arc<MotionManager> {
        &self.manager
    }

    /// One tick without pacing.
    pub fn tick_once(&mut self) -> Result<OutputFrames, CycleError> {
        let frames = self.manager.get_outputs(AccessorId::MOTION)?;
        let tick = self.manager.tick();

        let mut pid_changed = 0;
        if tick % self.pid_divider == 0 {
            let updates = self.manager.update_pids(AccessorId::MOTION)?;
            if !updates.is_empty() {
                pid_changed = changed_mask(&updates);
                trace!(tick, changed = updates.len(), "PID gains pushed");
            }
        }
        if let Some(writer) = &mut self.publisher {
            // Gains are always present in full; readers apply only the
            // flagged joints.
            let mut block = self.manager.output_block();
            block.pid_changed = pid_changed;
            writer.write(&block);
        }
        Ok(frames)
    }

    /// Tick at the configured period until stopped or `max_ticks` ran.
    pub fn run(&mut self, max_ticks: Option<u64>) -> Result<(), CycleError> {
        info!(
            period_us = self.period_ns / 1_000,
            ?max_ticks,
            motions = self.manager.size(),
            "tick loop starting"
        );

        #[cfg(feature = "rt")]
        let result = self.run_rt_loop(max_ticks);

        #[cfg(not(feature = "rt"))]
        let result = self.run_sim_loop(max_ticks);

        info!(
            ticks = self.stats.cycle_count,
            avg_ns = self.stats.avg_cycle_ns(),
            max_ns = self.stats.max_cycle_ns,
            overruns = self.stats.overruns,
            "tick loop stopped"
        );
        result
    }

    fn should_continue(&self, max_ticks: Option<u64>) -> bool {
        self.running.load(Ordering::SeqCst) && max_ticks.is_none_or(|max| self.stats.cycle_count < max)
    }

    fn check_overrun(&mut self, duration_ns: i64) -> Result<(), CycleError> {
        if duration_ns <= self.period_ns {
            return Ok(());
        }
        self.stats.overruns += 1;
        match self.overrun_policy {
            OverrunPolicy::Warn => {
                warn!(actual_ns = duration_ns, budget_ns = self.period_ns, "tick overrun");
                Ok(())
            }
            OverrunPolicy::Abort => Err(CycleError::CycleOverrun {
                actual_ns: duration_ns,
                budget_ns: self.period_ns,
            }),
        }
    }

    /// Absolute-deadline loop on `CLOCK_MONOTONIC`.
    #[cfg(feature = "rt")]
    fn run_rt_loop(&mut self, max_ticks: Option<u64>) -> Result<(), CycleError> {
        use nix::time::{ClockId, ClockNanosleepFlags, clock_gettime, clock_nanosleep};

        let clock = ClockId::CLOCK_MONOTONIC;
        let now = || clock_gettime(clock).map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")));
        let mut next_wake = now()?;

        while self.should_continue(max_ticks) {
            next_wake = timespec_add_ns(next_wake, self.period_ns);

            let start = now()?;
            self.tick_once()?;
            let end = now()?;

            let duration_ns = timespec_diff_ns(&end, &start);
            self.stats.record(duration_ns, 0);
            self.check_overrun(duration_ns)?;

            let _ = clock_nanosleep(clock, ClockNanosleepFlags::TIMER_ABSTIME, &next_wake);
            let woke = now()?;
            self.stats.max_latency_ns = self.stats.max_latency_ns.max(timespec_diff_ns(&woke, &next_wake));
        }
        Ok(())
    }

    /// Approximate pacing with `std::thread::sleep`.
    #[cfg(not(feature = "rt"))]
    fn run_sim_loop(&mut self, max_ticks: Option<u64>) -> Result<(), CycleError> {
        use std::time::{Duration, Instant};

        let period = Duration::from_nanos(self.period_ns as u64);
        while self.should_continue(max_ticks) {
            let start = Instant::now();
            self.tick_once()?;
            let elapsed = start.elapsed();
            let duration_ns = elapsed.as_nanos() as i64;

            self.stats.record(duration_ns, 0);
            self.check_overrun(duration_ns)?;

            if let Some(remaining) = period.checked_sub(elapsed) {
                std::thread::sleep(remaining);
            }
        }
        Ok(())
    }
}

#[cfg(feature = "rt")]
fn timespec_add_ns(ts: nix::sys::time::TimeSpec, ns: i64) -> nix::sys::time::TimeSpec {
    use nix::sys::time::TimeSpec;
    let mut secs = ts.tv_sec();
    let mut nanos = ts.tv_nsec() + ns;
    while nanos >= 1_000_000_000 {
        secs += 1;
        nanos -= 1_000_000_000;
    }
    TimeSpec::new(secs, nanos)
}

/// `a - b` in nanoseconds.
#[cfg(feature = "rt")]
fn timespec_diff_ns(a: &nix::sys::time::TimeSpec, b: &nix::sys::time::TimeSpec) -> i64 {
    (a.tv_sec() - b.tv_sec()) * 1_000_000_000 + (a.tv_nsec() - b.tv_nsec())
}

// ─── Tests ──────────────────────────────────────────────────────────
