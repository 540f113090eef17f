//! System-wide constants for the motion workspace.
//!
//! Single source of truth for registry capacity, accessor count, output
//! channel layout and tick timing. Imported by all crates.

use static_assertions::const_assert;

/// Maximum number of simultaneously registered motion commands.
pub const MAX_MOTIONS: usize = 64;

/// Number of accessors (processes) that may attach to a command region.
///
/// Index 0 is the behavior process, index 1 the real-time actuation process.
pub const MAX_ACCESS: usize = 2;

/// Number of addressable output channels (joints, wheels, LEDs...).
pub const NUM_OUTPUTS: usize = 32;

/// Look-ahead frames resolved per tick.
pub const NUM_FRAMES: usize = 4;

/// Duration of one look-ahead frame in microseconds.
pub const FRAME_TIME_US: u64 = 8_000;

/// Default tick period: one tick produces `NUM_FRAMES` frames.
pub const TICK_PERIOD_US: u64 = FRAME_TIME_US * NUM_FRAMES as u64;

/// Number of output channels that accept PID gains.
pub const NUM_PID_JOINTS: usize = 18;

/// Index of the first PID-capable output channel.
pub const PID_JOINT_OFFSET: usize = 0;

const_assert!(MAX_MOTIONS < u16::MAX as usize);
const_assert!(MAX_ACCESS <= u8::MAX as usize);
const_assert!(PID_JOINT_OFFSET + NUM_PID_JOINTS <= NUM_OUTPUTS);
const_assert!(NUM_FRAMES > 0);
