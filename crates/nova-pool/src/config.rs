//! Pool configuration.

/// How the pool reports runtime failures.
///
/// The allocation and deallocation failure conditions
/// ([`PoolError::RequestTooLarge`](crate::PoolError::RequestTooLarge),
/// [`PoolError::PoolExhausted`](crate::PoolError::PoolExhausted),
/// [`PoolError::AddressOutOfRange`](crate::PoolError::AddressOutOfRange),
/// [`PoolError::ChunkTooLarge`](crate::PoolError::ChunkTooLarge)) are
/// surfaced either as `Err` values or as a panic with the same
/// diagnostic, chosen here at construction time. Lock-invariant
/// violations panic in both modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// Return failures to the caller as `Err` values.
    #[default]
    Propagate,
    /// Panic with a diagnostic on any failure.
    Abort,
}

/// Configuration for a [`ChunkPool`](crate::ChunkPool).
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// How runtime failures are reported.
    pub error_mode: ErrorMode,

    /// Maximum number of full freelist scan rounds an allocation may spend
    /// before failing with `PoolExhausted`. A round ends when every
    /// eligible class was observed empty, or a non-empty class was found
    /// but the pop lost a race.
    pub max_scan_attempts: usize,

    /// Use exponential backoff between failed scan rounds.
    pub use_backoff: bool,

    /// Enable statistics tracking.
    pub track_stats: bool,

    /// Fill patterns for debugging.
    pub alloc_pattern: Option<u8>,
    /// Pattern written over a chunk when it is returned to the pool.
    pub dealloc_pattern: Option<u8>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            error_mode: ErrorMode::Propagate,
            max_scan_attempts: 100_000,
            use_backoff: true,
            track_stats: cfg!(debug_assertions),
            alloc_pattern: if cfg!(debug_assertions) { Some(0xBB) } else { None },
            dealloc_pattern: if cfg!(debug_assertions) { Some(0xDD) } else { None },
        }
    }
}

impl PoolConfig {
    /// Production configuration - optimized for performance.
    pub fn production() -> Self {
        Self {
            error_mode: ErrorMode::Propagate,
            max_scan_attempts: 100_000,
            use_backoff: true,
            track_stats: false,
            alloc_pattern: None,
            dealloc_pattern: None,
        }
    }

    /// Debug configuration - optimized for debugging.
    pub fn debug() -> Self {
        Self {
            error_mode: ErrorMode::Abort,
            max_scan_attempts: 1_000,
            use_backoff: false,
            track_stats: true,
            alloc_pattern: Some(0xBB),
            dealloc_pattern: Some(0xDD),
        }
    }

    /// Performance configuration - minimal overhead.
    pub fn performance() -> Self {
        Self {
            error_mode: ErrorMode::Propagate,
            max_scan_attempts: 100_000,
            use_backoff: false,
            track_stats: false,
            alloc_pattern: None,
            dealloc_pattern: None,
        }
    }
}
