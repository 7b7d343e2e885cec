//! Error types for pool operations.

use thiserror::Error;

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// Pool operation errors.
///
/// The first four variants are the runtime failure conditions of
/// [`ChunkPool::allocate`](crate::ChunkPool::allocate) and
/// [`ChunkPool::deallocate`](crate::ChunkPool::deallocate); the remaining
/// ones are construction-time validation failures.
/// [`PoolError::LockInvariantViolation`] appears here for its diagnostic
/// message but is never returned: it indicates concurrent corruption of
/// pool state and is always raised as a panic, regardless of the
/// configured [`ErrorMode`](crate::config::ErrorMode).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// Requested size exceeds every configured size class. Detected before
    /// any freelist mutation.
    #[error("requested {requested} bytes but the largest size class is {max}")]
    RequestTooLarge {
        /// Requested allocation size in bytes.
        requested: usize,
        /// Largest configured size class.
        max: usize,
    },

    /// No size class had chunks available after the configured retry
    /// budget. Reached only after repeated scans observed every eligible
    /// freelist empty or contended.
    #[error("no free chunks in any eligible size class after {attempts} attempts")]
    PoolExhausted {
        /// Number of scan rounds spent before giving up.
        attempts: usize,
    },

    /// A deallocated range does not lie fully within the pool's backing
    /// region. Indicates a caller bug, not a resource condition.
    #[error("range at offset {offset:#x} with size {size} escapes the {len}-byte pool region")]
    AddressOutOfRange {
        /// Byte offset of the pointer from the region base (wrapping if
        /// the pointer precedes the region).
        offset: usize,
        /// Size passed to deallocate.
        size: usize,
        /// Total region length.
        len: usize,
    },

    /// A deallocated size exceeds every configured size class. Unreachable
    /// when callers pass back the size they allocated with.
    #[error("deallocated size {size} exceeds the largest size class {max}")]
    ChunkTooLarge {
        /// Size passed to deallocate.
        size: usize,
        /// Largest configured size class.
        max: usize,
    },

    /// The unlock step of the pop protocol found the freelist head changed
    /// while it was locked. No other thread may touch a locked head, so
    /// this means pool state is corrupt. Always fatal.
    #[error("freelist head for class {class} changed while locked")]
    LockInvariantViolation {
        /// Index of the size class whose head was corrupted.
        class: usize,
    },

    /// The size-class table failed validation.
    #[error("invalid size class table: {reason}")]
    InvalidSizeClasses {
        /// Which validation rule was violated.
        reason: String,
    },

    /// The requested capacity cannot hold even one chunk of the largest
    /// size class.
    #[error("capacity {capacity} cannot hold one chunk of the largest class {largest}")]
    CapacityTooSmall {
        /// Requested region capacity in bytes.
        capacity: usize,
        /// Largest configured size class.
        largest: usize,
    },

    /// The requested capacity exceeds the largest region the freelist
    /// word encoding can address.
    #[error("capacity {capacity} exceeds the maximum addressable region size {max}")]
    CapacityTooLarge {
        /// Requested region capacity in bytes.
        capacity: usize,
        /// Maximum addressable capacity.
        max: usize,
    },
}

impl PoolError {
    /// Create an invalid size-class table error.
    pub fn invalid_size_classes(reason: impl Into<String>) -> Self {
        Self::InvalidSizeClasses { reason: reason.into() }
    }
}
