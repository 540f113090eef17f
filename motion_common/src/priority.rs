//! Named priority tiers.
//!
//! Tiers are guidance for motion authors. Arbitration compares the raw
//! `f32` values only, so any value between two tiers is legal.

use serde::{Deserialize, Serialize};

/// Commands at or below this priority never contribute to an output.
pub const IGNORED: f32 = -1.0;
/// Idle postures and fallbacks.
pub const BACKGROUND: f32 = 0.0;
pub const LOW: f32 = 5.0;
/// Default for ordinary motions.
pub const STD: f32 = 10.0;
pub const HIGH: f32 = 50.0;
/// Fall recovery, emergency stop.
pub const EMERGENCY: f32 = 100.0;

/// Tier view of a priority value, for logging and configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityTier {
    Ignored,
    Background,
    Low,
    Std,
    High,
    Emergency,
}

impl PriorityTier {
    /// Nominal value of the tier.
    #[inline]
    pub const fn value(self) -> f32 {
        match self {
            Self::Ignored => IGNORED,
            Self::Background => BACKGROUND,
            Self::Low => LOW,
            Self::Std => STD,
            Self::High => HIGH,
            Self::Emergency => EMERGENCY,
        }
    }

    /// Highest tier whose nominal value is `<= priority`.
    pub fn classify(priority: f32) -> Self {
        if priority >= EMERGENCY {
            Self::Emergency
        } else if priority >= HIGH {
            Self::High
        } else if priority >= STD {
            Self::Std
        } else if priority >= LOW {
            Self::Low
        } else if priority >= BACKGROUND {
            Self::Background
        } else {
            Self::Ignored
        }
    }
}

impl Default for PriorityTier {
    fn default() -> Self {
        Self::Std
    }
}

/// True if a command at `priority` may contribute to outputs at all.
#[inline]
pub fn is_effective(priority: f32) -> bool {
    priority > IGNORED
}
