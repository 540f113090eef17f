//! Identifiers shared between the manager and its clients.
//!
//! `McId` names a registered motion command. It packs the registry slot
//! with a generation counter so that an id held past `remove_motion` can
//! never resolve to the next command stored in the same slot.
//!
//! `AccessorId` names the process on whose behalf an operation runs.
//! Resolved handles are cached per accessor and never shared between them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::consts::MAX_ACCESS;

/// Opaque identifier of a registered motion command.
///
/// Compare-only for clients. `McId::INVALID` is returned when the
/// registry is full and is never assigned to a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct McId(u32);

impl McId {
    /// Sentinel for "no motion".
    pub const INVALID: Self = Self(u32::MAX);

    /// Build an id from a registry slot and its generation.
    #[inline]
    pub const fn new(slot: u16, generation: u16) -> Self {
        Self(((slot as u32) << 16) | generation as u32)
    }

    /// Rebuild an id from its raw representation (e.g. an event source).
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Registry slot index.
    #[inline]
    pub const fn slot(self) -> usize {
        (self.0 >> 16) as usize
    }

    #[inline]
    pub const fn generation(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }

    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }
}

impl Default for McId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for McId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "mc#{}.{}", self.slot(), self.generation())
        } else {
            f.write_str("mc#invalid")
        }
    }
}

/// Process on whose behalf a manager operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct AccessorId(u8);

impl AccessorId {
    /// Behavior / client process.
    pub const MAIN: Self = Self(0);
    /// Real-time actuation process; the only caller of `get_outputs`.
    pub const MOTION: Self = Self(1);

    /// Returns `None` if `index >= MAX_ACCESS`.
    #[inline]
    pub const fn new(index: u8) -> Option<Self> {
        if (index as usize) < MAX_ACCESS {
            Some(Self(index))
        } else {
            None
        }
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Every accessor, in index order.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..MAX_ACCESS as u8).map(Self)
    }
}

impl fmt::Display for AccessorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::MAIN => f.write_str("main"),
            Self::MOTION => f.write_str("motion"),
            Self(n) => write!(f, "accessor{n}"),
        }
    }
}
