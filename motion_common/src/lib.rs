//! Motion Common Library
//!
//! Shared vocabulary for every crate of the motion workspace: registry
//! limits, identifiers, priority tiers, output blend units, lifecycle
//! events, and TOML configuration loading.
//!
//! # Module Structure
//!
//! - [`consts`] - Registry, channel and frame limits
//! - [`ids`] - `McId` and `AccessorId`
//! - [`priority`] - Named priority tiers
//! - [`output`] - `OutputCmd` / `OutputPid` blend units
//! - [`event`] - Lifecycle events and the `EventSink` collaborator
//! - [`config`] - Configuration loading traits and types
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use motion_common::prelude::*;
//!
//! let cmd = OutputCmd::new(0.5);
//! assert!(cmd.is_contributing());
//! assert!(priority::HIGH > priority::STD);
//! ```

pub mod config;
pub mod consts;
pub mod event;
pub mod ids;
pub mod output;
pub mod prelude;
pub mod priority;
