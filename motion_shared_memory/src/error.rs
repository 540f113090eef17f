//! Error types for shared memory operations

use motion::ids::AccessorId;
use thiserror::Error;

/// Errors that can occur during region and segment operations
#[derive(Error, Debug)]
pub enum ShmError {
    /// Named region or segment already exists
    #[error("Segment already exists: {name}")]
    AlreadyExists {
        /// Region or segment name
        name: String,
    },

    /// Named region or segment not found
    #[error("Segment not found: {name}")]
    NotFound {
        /// Region or segment name
        name: String,
    },

    /// Invalid segment size
    #[error("Invalid segment size: {size} bytes")]
    InvalidSize {
        /// Attempted size in bytes
        size: usize,
    },

    /// Payload does not match the size the region was created for
    #[error("Region payload size mismatch: region expects {expected} bytes, payload is {found}")]
    SizeMismatch {
        /// Declared payload size
        expected: usize,
        /// Size of the offered payload
        found: usize,
    },

    /// Named region holds a different payload type
    #[error("Region '{name}' holds a different payload type")]
    TypeMismatch {
        /// Region name
        name: String,
    },

    /// Region payload was already constructed
    #[error("Region payload already constructed")]
    AlreadyConstructed,

    /// Region has no payload yet
    #[error("Region payload not constructed")]
    NotConstructed,

    /// Resolution attempted by an accessor that never attached
    #[error("Region not attached by accessor {accessor}")]
    NotAttached {
        /// Accessor that tried to resolve
        accessor: AccessorId,
    },

    /// Segment header layout hash differs from the reader's type
    #[error("Segment layout mismatch: expected {expected:#x}, found {found:#x}")]
    LayoutMismatch {
        /// Hash of the reader's payload type
        expected: u32,
        /// Hash stored in the segment header
        found: u32,
    },

    /// Segment header magic is wrong
    #[error("Segment '{name}' has an invalid header")]
    InvalidHeader {
        /// Segment name
        name: String,
    },

    /// Version conflict persisted through every read retry
    #[error("Version conflict detected - retry recommended")]
    VersionConflict,

    /// Permission denied
    #[error("Permission denied accessing segment: {name}")]
    PermissionDenied {
        /// Segment name
        name: String,
    },

    /// IO error
    #[error("IO error: {source}")]
    Io {
        /// Source IO error
        #[from]
        source: std::io::Error,
    },

    /// Nix system call error
    #[error("System call error: {source}")]
    Nix {
        /// Source nix error
        #[from]
        source: nix::Error,
    },

    /// Metadata sidecar (de)serialization error
    #[error("JSON error: {source}")]
    Json {
        /// Source JSON error
        #[from]
        source: serde_json::Error,
    },
}

/// Result type for shared memory operations
pub type ShmResult<T> = Result<T, ShmError>;
