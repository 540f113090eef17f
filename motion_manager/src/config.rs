//! Configuration of the motion manager binary.
//!
//! Loaded from TOML through [`ConfigLoader`](motion::config::ConfigLoader).
//! Numeric parameters have `MIN`/`MAX` bounds; optional fields use
//! `#[serde(default)]`.

use std::collections::HashSet;

use motion::config::{ConfigError, SharedConfig, Validate};
use motion::consts::{NUM_OUTPUTS, NUM_PID_JOINTS, TICK_PERIOD_US};
use motion::priority::PriorityTier;
use serde::{Deserialize, Serialize};

/// Shortest accepted tick period [µs].
pub const TICK_PERIOD_US_MIN: u64 = 1_000;
/// Longest accepted tick period [µs].
pub const TICK_PERIOD_US_MAX: u64 = 1_000_000;
/// Largest accepted PID divider.
pub const PID_DIVIDER_MAX: u32 = 1_000;

// ─── Top-Level Config ───────────────────────────────────────────────

/// Top-level configuration.
///
/// # TOML Example
///
/// ```toml
/// tick_period_us = 32000
/// overrun_policy = "warn"
/// publish_segment = "outputs"
///
/// [shared]
/// service_name = "motion"
///
/// [[postures]]
/// name = "stand"
/// priority = "background"
/// targets = [{ channel = 0, value = 0.0 }]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionManagerConfig {
    pub shared: SharedConfig,

    /// Tick period in microseconds (default: one frame window).
    #[serde(default = "default_tick_period_us")]
    pub tick_period_us: u64,

    /// What to do when a tick misses its deadline.
    #[serde(default)]
    pub overrun_policy: OverrunPolicy,

    /// Shared-memory segment the committed outputs are published to.
    #[serde(default)]
    pub publish_segment: Option<String>,

    /// Resolve PID gains every N ticks (default: 1).
    #[serde(default = "default_pid_divider")]
    pub pid_update_divider: u32,

    #[serde(default)]
    pub rt: RtConfig,

    /// Motions registered at startup.
    #[serde(default)]
    pub postures: Vec<PostureConfig>,
}

fn default_tick_period_us() -> u64 {
    TICK_PERIOD_US
}
fn default_pid_divider() -> u32 {
    1
}

/// Reaction to a missed tick deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrunPolicy {
    /// Log and keep going.
    #[default]
    Warn,
    /// Stop the runner with an error.
    Abort,
}

/// Real-time scheduling, only applied with the `rt` feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RtConfig {
    /// CPU core to pin the tick thread to.
    #[serde(default)]
    pub cpu_core: Option<usize>,

    /// SCHED_FIFO priority (1..=99).
    #[serde(default = "default_rt_priority")]
    pub priority: i32,
}

fn default_rt_priority() -> i32 {
    80
}

impl Default for RtConfig {
    fn default() -> Self {
        Self {
            cpu_core: None,
            priority: default_rt_priority(),
        }
    }
}

// ─── Postures ───────────────────────────────────────────────────────

/// Priority given either as a tier name or as a raw value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrioritySpec {
    Tier(PriorityTier),
    Value(f32),
}

impl PrioritySpec {
    pub fn value(self) -> f32 {
        match self {
            Self::Tier(tier) => tier.value(),
            Self::Value(value) => value,
        }
    }
}

impl Default for PrioritySpec {
    fn default() -> Self {
        Self::Tier(PriorityTier::Std)
    }
}

/// A fixed posture registered at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostureConfig {
    pub name: String,

    #[serde(default)]
    pub priority: PrioritySpec,

    /// Remove once the lifetime is over.
    #[serde(default)]
    pub prunable: bool,

    /// Number of ticks the posture stays alive; forever if absent.
    #[serde(default)]
    pub lifetime_ticks: Option<u64>,

    /// Post a status event when the lifetime runs out.
    #[serde(default)]
    pub report_completion: bool,

    #[serde(default)]
    pub targets: Vec<TargetConfig>,

    #[serde(default)]
    pub pids: Vec<PidConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    pub channel: usize,
    pub value: f32,
    #[serde(default = "default_weight")]
    pub weight: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PidConfig {
    pub joint: usize,
    pub p: f32,
    #[serde(default)]
    pub i: f32,
    #[serde(default)]
    pub d: f32,
    #[serde(default = "default_weight")]
    pub weight: f32,
}

fn default_weight() -> f32 {
    1.0
}

// ─── Validation ─────────────────────────────────────────────────────

impl Validate for MotionManagerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        if !(TICK_PERIOD_US_MIN..=TICK_PERIOD_US_MAX).contains(&self.tick_period_us) {
            return Err(ConfigError::ValidationError(format!(
                "tick_period_us {} out of range [{TICK_PERIOD_US_MIN}, {TICK_PERIOD_US_MAX}]",
                self.tick_period_us
            )));
        }
        if !(1..=PID_DIVIDER_MAX).contains(&self.pid_update_divider) {
            return Err(ConfigError::ValidationError(format!(
                "pid_update_divider {} out of range [1, {PID_DIVIDER_MAX}]",
                self.pid_update_divider
            )));
        }
        if !(1..=99).contains(&self.rt.priority) {
            return Err(ConfigError::ValidationError(format!(
                "rt.priority {} out of range [1, 99]",
                self.rt.priority
            )));
        }
        if let Some(segment) = &self.publish_segment {
            if segment.is_empty() || segment.contains('/') {
                return Err(ConfigError::ValidationError(format!(
                    "publish_segment '{segment}' must be a non-empty name without '/'"
                )));
            }
        }

        let mut names = HashSet::new();
        for posture in &self.postures {
            if !names.insert(posture.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate posture '{}'",
                    posture.name
                )));
            }
            posture.validate()?;
        }
        Ok(())
    }
}

impl Validate for PostureConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let fail = |msg: String| -> Result<(), ConfigError> {
            Err(ConfigError::ValidationError(format!("posture '{}': {msg}", self.name)))
        };

        if self.name.trim().is_empty() {
            return Err(ConfigError::ValidationError("posture name cannot be empty".into()));
        }
        if !self.priority.value().is_finite() {
            return fail("priority must be finite".into());
        }
        if self.lifetime_ticks == Some(0) {
            return fail("lifetime_ticks must be > 0".into());
        }
        for target in &self.targets {
            if target.channel >= NUM_OUTPUTS {
                return fail(format!("channel {} out of range [0, {NUM_OUTPUTS})", target.channel));
            }
            if !target.value.is_finite() || !target.weight.is_finite() || target.weight < 0.0 {
                return fail(format!("channel {} has invalid value or weight", target.channel));
            }
        }
        for pid in &self.pids {
            if pid.joint >= NUM_PID_JOINTS {
                return fail(format!("joint {} out of range [0, {NUM_PID_JOINTS})", pid.joint));
            }
            if !pid.weight.is_finite() || pid.weight < 0.0 {
                return fail(format!("joint {} has invalid weight", pid.joint));
            }
        }
        Ok(())
    }
}
