//! # Motion Manager
//!
//! Loads the manager configuration, registers the configured postures
//! and drives the real-time accessor at the configured tick period,
//! optionally publishing committed outputs to shared memory.

use clap::Parser;
use motion::config::ConfigLoader;
use motion::ids::AccessorId;
use motion_manager::cycle::{TickRunner, rt_setup};
use motion_manager::{LogEventSink, MotionManager, MotionManagerConfig, PostureMotion, motion_object};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Motion Manager: priority-based motion arbitration
#[derive(Parser, Debug)]
#[command(name = "motion_manager")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Resolve motion command requests into per-channel output streams")]
struct Args {
    /// Path to the manager configuration TOML.
    #[arg(default_value = "config/motion.toml")]
    config: PathBuf,

    /// Stop after this many ticks (runs until Ctrl-C otherwise).
    #[arg(long)]
    ticks: Option<u64>,

    /// CPU core to pin the tick thread to (overrides the config).
    #[arg(long)]
    cpu_core: Option<usize>,

    /// SCHED_FIFO priority (overrides the config).
    #[arg(long)]
    rt_priority: Option<i32>,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    info!("Motion Manager v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("Motion Manager shutdown complete");
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = MotionManagerConfig::load_validated(&args.config)?;
    info!(
        "Config OK: service={}, tick={}µs, postures={}",
        config.shared.service_name,
        config.tick_period_us,
        config.postures.len()
    );

    let cpu_core = args.cpu_core.or(config.rt.cpu_core);
    let rt_priority = args.rt_priority.unwrap_or(config.rt.priority);
    rt_setup(cpu_core, rt_priority)?;

    let manager = Arc::new(MotionManager::new().with_event_sink(Arc::new(LogEventSink)));
    for posture in &config.postures {
        let obj = motion_object(PostureMotion::from_config(posture));
        let priority = posture.priority.value();
        let id = if posture.prunable {
            manager.add_prunable_motion(AccessorId::MAIN, obj, priority)?
        } else {
            manager.add_persistent_motion(AccessorId::MAIN, obj, priority)?
        };
        if id.is_valid() {
            info!(name = posture.name.as_str(), %id, priority, "posture registered");
        } else {
            warn!(name = posture.name.as_str(), "posture skipped, registry full");
        }
    }

    let mut runner = TickRunner::new(Arc::clone(&manager), &config)?;

    let running = runner.stop_handle();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    runner.run(args.ticks)?;

    let stats = runner.stats();
    info!(
        "Ran {} ticks: avg={}ns max={}ns overruns={}",
        stats.cycle_count,
        stats.avg_cycle_ns(),
        stats.max_cycle_ns,
        stats.overruns
    );

    for id in manager.motions(AccessorId::MAIN) {
        manager.remove_motion(AccessorId::MAIN, id);
    }
    Ok(())
}

fn setup_tracing(args: &Args) {
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
