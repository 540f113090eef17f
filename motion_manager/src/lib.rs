//! # Motion Manager
//!
//! Priority-based arbitration of motion commands for a legged / wheeled
//! robot. Many independently written commands request values on the same
//! output channels; once per tick the manager resolves them into one
//! multi-frame stream per channel.
//!
//! ## Accessors
//!
//! Two processes share the manager: the behavior side ([`AccessorId::MAIN`])
//! adds, removes and tunes motions, the real-time side
//! ([`AccessorId::MOTION`]) calls [`MotionManager::get_outputs`] once per
//! tick. Command handles are reference-counted regions resolved per
//! accessor; neither side ever uses the other's handle.
//!
//! ## Resolution
//!
//! Per channel and frame, the highest priority wins; equal priorities blend
//! by weight; a tier with zero total weight, or no request at all, holds the
//! previously committed value. See [`arbitration`].
//!
//! ## Example
//!
//! ```rust
//! use motion::prelude::*;
//! use motion_manager::{MotionManager, PostureMotion, motion_object};
//!
//! let manager = MotionManager::new();
//! let stand = PostureMotion::new().with_target(0, OutputCmd::new(0.5));
//! let id = manager
//!     .add_persistent_motion(AccessorId::MAIN, motion_object(stand), priority::STD)
//!     .unwrap();
//!
//! let frames = manager.get_outputs(AccessorId::MOTION).unwrap();
//! assert_eq!(frames[0][0], 0.5);
//! manager.remove_motion(AccessorId::MAIN, id);
//! ```
//!
//! [`AccessorId::MAIN`]: motion::ids::AccessorId::MAIN
//! [`AccessorId::MOTION`]: motion::ids::AccessorId::MOTION

pub mod accessor;
pub mod arbitration;
pub mod command;
pub mod config;
pub mod cycle;
pub mod entry;
pub mod error;
pub mod events;
pub mod lock;
pub mod manager;
pub mod motions;
pub mod output;

pub use accessor::{MotionAccessor, MotionGuard};
pub use command::{CommandCore, MotionCommand, MotionFlags, MotionObject, OutputSink, motion_object};
pub use config::MotionManagerConfig;
pub use cycle::{CycleError, CycleStats, TickRunner, rt_setup};
pub use error::{BoxError, LockError, MotionError};
pub use events::LogEventSink;
pub use manager::MotionManager;
pub use motions::PostureMotion;
pub use output::{CommittedOutputs, PidUpdate};
