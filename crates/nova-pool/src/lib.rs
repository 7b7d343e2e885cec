//! Lock-free size-classed chunk pool over a pre-reserved memory region.
//!
//! This crate provides a concurrent pool that hands out fixed-size chunks
//! from one contiguous region without touching the global allocator or
//! the OS after construction:
//!
//! - One lock-free freelist per size class, coordinated purely through
//!   compare-and-swap on a tagged atomic head word
//! - Upward size-class search with opportunistic chunk splitting when
//!   only an oversized chunk is available
//! - A bounded retry budget instead of blocking, suited to execution
//!   targets where mutexes are unavailable or too costly
//! - Runtime-selected failure reporting: propagate errors or abort with
//!   a diagnostic
//!
//! # Example
//!
//! ```
//! use nova_pool::{ChunkPool, SizeClassTable};
//!
//! let classes = SizeClassTable::geometric(64, 1024, 4)?;
//! let pool = ChunkPool::new(classes, 64 * 1024)?;
//!
//! let chunk = pool.allocate(100)?;
//! // The chunk is exclusively ours until we hand it back.
//! unsafe { pool.deallocate(chunk, 100)? };
//! # Ok::<(), nova_pool::PoolError>(())
//! ```
//!
//! # Concurrency model
//!
//! Any number of threads may allocate and deallocate concurrently. There
//! is no blocking primitive anywhere: a thread that observes a freelist
//! head mid-pop simply retries. The pop protocol briefly parks a head in
//! a `Locked` state that no other thread will overwrite, which makes the
//! head-and-successor handoff atomic without a mutex. Interleaving
//! coverage is model-checked with loom (`RUSTFLAGS="--cfg loom" cargo
//! test --lib`).

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod observer;
pub mod size_class;
pub mod stats;
pub mod utils;

mod freelist;
mod pool;
mod sync;


pub use config::{ErrorMode, PoolConfig};
pub use error::{PoolError, PoolResult};
pub use observer::{NoOpObserver, PoolEvent, PoolObserver};
pub use pool::ChunkPool;
pub use size_class::{MIN_CHUNK_SIZE, SizeClassTable};
pub use stats::PoolStats;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
