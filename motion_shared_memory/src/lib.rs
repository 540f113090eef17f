//! # Motion Shared Memory
//!
//! Memory primitives the motion manager is built on:
//!
//! - **Reference-counted regions** ([`RcRegion`], [`SharedObject`]): a block
//!   owning one payload, usable from several accessors. The reference count
//!   is the sum of holders across accessors and the holder that drops the
//!   last reference destructs the payload.
//! - **Per-accessor resolution** ([`Attachments`]): a handle is only valid
//!   for the accessor that resolved it; everyone else gets
//!   [`ShmError::NotAttached`].
//! - **Output segments** ([`SegmentWriter`], [`SegmentReader`]): one writer,
//!   many readers, `/dev/shm` backed, sequence-validated copies.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────┐    ┌─────────────────┐    ┌─────────────────┐
//! │ Tick runner     │    │ /dev/shm        │    │ Actuation side  │
//! │                 │    │ motion_<name>   │    │                 │
//! │ SegmentWriter   ├───►│ [Header|Frames] ├───►│ SegmentReader   │
//! │                 │    │ Sequence word   │    │                 │
//! └─────────────────┘    └─────────────────┘    └─────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use motion_shared_memory::{RcRegion, SharedObject};
//!
//! let region = RcRegion::<u32>::create(4);
//! let obj = SharedObject::construct(region, Box::new(42u32)).unwrap();
//! let other = obj.clone();
//! assert_eq!(obj.ref_count(), 2);
//! drop(other);
//! assert_eq!(*obj.lock().unwrap(), 42);
//! ```
//!
//! ```rust,no_run
//! use motion_shared_memory::{OutputFrameBlock, SegmentReader, SegmentWriter};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut writer = SegmentWriter::<OutputFrameBlock>::create("outputs")?;
//! writer.write(&OutputFrameBlock::default());
//!
//! let mut reader = SegmentReader::<OutputFrameBlock>::attach("outputs")?;
//! if reader.has_changed() {
//!     let block = reader.read()?;
//!     println!("tick {}", block.tick);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Thread Safety
//!
//! - **RcRegion / SharedObject**: `Send + Sync`; payload access is serialised
//!   by the region's own mutex
//! - **SegmentWriter**: single writer per segment
//! - **SegmentReader**: one per reading thread

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod attach;
pub mod data;
pub mod error;
pub mod platform;
pub mod reader;
pub mod region;
pub mod segment;
pub mod version;
pub mod writer;

pub use attach::Attachments;
pub use data::OutputFrameBlock;
pub use error::{ShmError, ShmResult};
pub use reader::SegmentReader;
pub use region::{RcRegion, SharedObject, list_named_regions};
pub use segment::{SegmentHeader, ShmPod, layout_hash};
pub use version::Sequence;
pub use writer::{SegmentInfo, SegmentWriter};

/// Writer of the committed output stream
pub type OutputSegmentWriter = SegmentWriter<OutputFrameBlock>;

/// Reader of the committed output stream
pub type OutputSegmentReader = SegmentReader<OutputFrameBlock>;

/// Install a default `tracing` subscriber filtered by `RUST_LOG`
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
