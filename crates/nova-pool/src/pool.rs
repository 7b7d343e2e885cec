//! The chunk pool: backing region, bootstrap, and the allocation and
//! deallocation engines.

use std::alloc::{self, Layout};
use std::ptr::{self, NonNull};
use std::sync::Arc;

use tracing::{debug, error, trace, warn};

use crate::config::{ErrorMode, PoolConfig};
use crate::error::{PoolError, PoolResult};
use crate::freelist::{Freelists, MAX_REGION, PopAttempt, Slot};
use crate::observer::PoolObserver;
use crate::size_class::SizeClassTable;
use crate::stats::PoolStats;
use crate::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use crate::utils::Backoff;

/// Region alignment. One cache line, so the first chunk of every class
/// grid starts on a line boundary.
const REGION_ALIGN: usize = 64;

/// Owned backing region, released only on drop.
struct Region {
    base: NonNull<u8>,
    layout: Layout,
}

impl Region {
    fn new(len: usize) -> PoolResult<Self> {
        let layout = Layout::from_size_align(len, REGION_ALIGN)
            .map_err(|_| PoolError::CapacityTooLarge { capacity: len, max: MAX_REGION })?;
        // SAFETY: len is non-zero (a validated pool holds at least one
        // chunk of the largest class).
        let raw = unsafe { alloc::alloc(layout) };
        let Some(base) = NonNull::new(raw) else {
            alloc::handle_alloc_error(layout);
        };
        Ok(Self { base, layout })
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        // SAFETY: base/layout are exactly what alloc returned.
        unsafe { alloc::dealloc(self.base.as_ptr(), self.layout) };
    }
}

/// A concurrent, size-classed chunk pool over one contiguous region.
///
/// The pool hands out fixed-size chunks without calling into the global
/// allocator or the OS after construction. Any number of threads may call
/// [`allocate`](Self::allocate) and [`deallocate`](Self::deallocate)
/// concurrently with no external synchronization: all coordination is a
/// compare-and-swap protocol on one atomic head word per size class.
///
/// # Memory layout
/// ```text
/// region:  [1024-chunk][1024-chunk][1024-chunk]...
/// split:   [64][64][64]...[64]                     (carved on demand)
/// ```
///
/// At construction the whole region is seeded into the coarsest class;
/// requests for smaller classes are served by popping an oversized chunk
/// and splitting it, with the remainder pushed back in one batch.
///
/// # Example
/// ```
/// use nova_pool::{ChunkPool, PoolConfig, SizeClassTable};
///
/// let classes = SizeClassTable::new([64, 256, 1024])?;
/// let pool = ChunkPool::with_config(classes, 4096, PoolConfig::default())?;
///
/// let chunk = pool.allocate(50)?;
/// // ... use the chunk ...
/// unsafe { pool.deallocate(chunk, 50)? };
/// # Ok::<(), nova_pool::PoolError>(())
/// ```
pub struct ChunkPool {
    /// Owned backing region.
    region: Region,

    /// Region length in bytes.
    capacity: usize,

    /// Ascending chunk sizes, immutable after construction.
    classes: SizeClassTable,

    /// One lock-free stack head per size class.
    freelists: Freelists,

    /// Free chunks per class (atomic estimate, exact in absence of races).
    free_counts: Box<[AtomicUsize]>,

    /// Configuration.
    config: PoolConfig,

    /// Injected diagnostics sink.
    observer: Option<Arc<dyn PoolObserver>>,

    /// Statistics (only tracked if enabled).
    total_allocs: AtomicU64,
    total_deallocs: AtomicU64,
    total_splits: AtomicU64,
    failed_allocs: AtomicU64,
}

// SAFETY: the region is owned by the pool and all shared mutation goes
// through the atomic freelist protocol; allocated chunks are exclusively
// owned by their callers and never touched by the pool.
unsafe impl Send for ChunkPool {}

// SAFETY: see Send. Freelist heads are only mutated via CAS, link words
// only while the holding thread has exclusive access to the chunk.
unsafe impl Sync for ChunkPool {}

impl ChunkPool {
    /// Creates a pool with the default configuration.
    pub fn new(classes: SizeClassTable, capacity: usize) -> PoolResult<Self> {
        Self::with_config(classes, capacity, PoolConfig::default())
    }

    /// Creates a pool over a freshly reserved region of `capacity` bytes.
    ///
    /// The region is carved into `capacity / classes.max_size()` chunks of
    /// the coarsest class; a trailing remainder smaller than that class
    /// stays unregistered. Smaller classes start empty and fill up through
    /// splitting and deallocation.
    ///
    /// # Errors
    /// Returns [`PoolError::CapacityTooSmall`] if the region cannot hold
    /// one coarsest chunk, or [`PoolError::CapacityTooLarge`] if offsets
    /// into it would not survive the freelist word encoding.
    pub fn with_config(
        classes: SizeClassTable,
        capacity: usize,
        config: PoolConfig,
    ) -> PoolResult<Self> {
        let largest = classes.max_size();
        if capacity > MAX_REGION {
            return Err(PoolError::CapacityTooLarge { capacity, max: MAX_REGION });
        }
        if capacity < largest {
            return Err(PoolError::CapacityTooSmall { capacity, largest });
        }

        let region = Region::new(capacity)?;

        if let Some(pattern) = config.alloc_pattern {
            // SAFETY: the region is freshly allocated and private.
            unsafe { ptr::write_bytes(region.base.as_ptr(), pattern, capacity) };
        }

        let freelists = Freelists::new(classes.len(), region.base, capacity);
        let free_counts = (0..classes.len())
            .map(|_| AtomicUsize::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        let pool = Self {
            region,
            capacity,
            classes,
            freelists,
            free_counts,
            config,
            observer: None,
            total_allocs: AtomicU64::new(0),
            total_deallocs: AtomicU64::new(0),
            total_splits: AtomicU64::new(0),
            failed_allocs: AtomicU64::new(0),
        };
        pool.seed();

        debug!(
            capacity,
            classes = pool.classes.len(),
            seeded = pool.free_counts[pool.classes.len() - 1].load(Ordering::Relaxed),
            "chunk pool created"
        );

        Ok(pool)
    }

    /// Attaches an observer that receives every pool event.
    pub fn with_observer(mut self, observer: Arc<dyn PoolObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Links every whole coarsest-class chunk into one chain and publishes
    /// it on the coarsest freelist.
    fn seed(&self) {
        let largest = self.classes.max_size();
        let coarsest = self.classes.len() - 1;
        let count = self.capacity / largest;

        for index in 1..count {
            // SAFETY: the region is still private to this thread.
            unsafe {
                self.freelists
                    .write_link((index - 1) * largest, Slot::Chunk(index * largest));
            }
        }
        // SAFETY: as above; the tail link is written by push itself.
        unsafe { self.freelists.push(coarsest, 0, (count - 1) * largest) };
        self.free_counts[coarsest].store(count, Ordering::Relaxed);

        let remainder = self.capacity % largest;
        if remainder != 0 {
            debug!(remainder, "trailing bytes below the coarsest class left unregistered");
        }
    }

    /// Allocates a chunk large enough for `size` bytes.
    ///
    /// The request maps to the smallest class that fits. If that class's
    /// freelist is empty, successively larger classes are tried; an
    /// oversized chunk is split and the remainder republished at the
    /// requested granularity. The returned chunk is exclusively owned by
    /// the caller until passed back to [`deallocate`](Self::deallocate).
    ///
    /// # Errors
    /// [`PoolError::RequestTooLarge`] if `size` exceeds every class (no
    /// freelist is touched), or [`PoolError::PoolExhausted`] once the scan
    /// budget is spent. With [`ErrorMode::Abort`] both panic instead.
    pub fn allocate(&self, size: usize) -> PoolResult<NonNull<u8>> {
        let Some(ideal) = self.classes.class_for(size) else {
            self.count_failed();
            return self.fail(PoolError::RequestTooLarge {
                requested: size,
                max: self.classes.max_size(),
            });
        };

        let mut backoff = self.config.use_backoff.then(Backoff::new);
        let mut attempts = 0usize;

        loop {
            // Upward scan: first class at or above the ideal one with a
            // chunk to give. A contended pop restarts the scan from the
            // ideal class, since a smaller chunk may have been freed in
            // the meantime.
            let mut popped = None;
            for class in ideal..self.classes.len() {
                match self.freelists.try_pop(class) {
                    PopAttempt::Popped(offset) => {
                        popped = Some((class, offset));
                        break;
                    }
                    PopAttempt::Empty => {}
                    PopAttempt::Contended => break,
                }
            }

            if let Some((used, offset)) = popped {
                self.free_counts[used].fetch_sub(1, Ordering::Relaxed);
                if used > ideal {
                    self.split(offset, used, ideal);
                }
                if self.config.track_stats {
                    self.total_allocs.fetch_add(1, Ordering::Relaxed);
                }
                if let Some(observer) = &self.observer {
                    observer.on_allocated(ideal, offset, size);
                }
                trace!(size, class = ideal, offset, "allocated chunk");
                // SAFETY: offset lies within the owned region.
                return Ok(unsafe {
                    NonNull::new_unchecked(self.region.base.as_ptr().add(offset))
                });
            }

            attempts += 1;
            if attempts >= self.config.max_scan_attempts {
                self.count_failed();
                if let Some(observer) = &self.observer {
                    observer.on_exhausted(attempts);
                }
                warn!(size, attempts, "pool exhausted");
                return self.fail(PoolError::PoolExhausted { attempts });
            }
            if let Some(backoff) = &mut backoff {
                backoff.spin();
            }
        }
    }

    /// Returns a chunk to the pool.
    ///
    /// `size` must be the size originally passed to
    /// [`allocate`](Self::allocate) for this chunk; the same class lookup
    /// resolves the freelist it goes back to.
    ///
    /// # Errors
    /// [`PoolError::AddressOutOfRange`] if the range escapes the region,
    /// [`PoolError::ChunkTooLarge`] if `size` exceeds every class. With
    /// [`ErrorMode::Abort`] both panic instead. A failure means the
    /// deallocation was not applied.
    ///
    /// # Safety
    /// `ptr` must have been returned by `allocate` on this pool with the
    /// same `size`, and must not have been deallocated since. Double
    /// frees are not detected.
    pub unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize) -> PoolResult<()> {
        let base = self.region.base.as_ptr() as usize;
        let addr = ptr.as_ptr() as usize;

        let in_bounds = addr >= base
            && (addr - base)
                .checked_add(size)
                .is_some_and(|end| end <= self.capacity);
        if !in_bounds {
            return self.fail(PoolError::AddressOutOfRange {
                offset: addr.wrapping_sub(base),
                size,
                len: self.capacity,
            });
        }

        let Some(class) = self.classes.class_for(size) else {
            return self.fail(PoolError::ChunkTooLarge {
                size,
                max: self.classes.max_size(),
            });
        };

        if let Some(pattern) = self.config.dealloc_pattern {
            // SAFETY: the chunk is exclusively owned by the caller and
            // spans a full class size from ptr.
            unsafe { ptr::write_bytes(ptr.as_ptr(), pattern, self.classes.size(class)) };
        }

        let offset = addr - base;
        // SAFETY: the chunk belongs to the caller until this push lands.
        unsafe { self.freelists.push(class, offset, offset) };
        self.free_counts[class].fetch_add(1, Ordering::Relaxed);

        if self.config.track_stats {
            self.total_deallocs.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(observer) = &self.observer {
            observer.on_deallocated(class, offset);
        }
        trace!(size, class, offset, "deallocated chunk");
        Ok(())
    }

    /// Subdivides an oversized chunk: the first `ideal`-sized piece stays
    /// with the caller, the rest go back onto the ideal class's freelist
    /// in one batch.
    fn split(&self, offset: usize, used: usize, ideal: usize) {
        let used_size = self.classes.size(used);
        let ideal_size = self.classes.size(ideal);
        let pieces = used_size / ideal_size;
        if pieces < 2 {
            // A non-dividing table leaves no whole remainder; the slack
            // tail rides along with the caller's chunk.
            return;
        }

        for index in 2..pieces {
            // SAFETY: the popped chunk is private to this thread until
            // the batch push publishes it.
            unsafe {
                self.freelists.write_link(
                    offset + (index - 1) * ideal_size,
                    Slot::Chunk(offset + index * ideal_size),
                );
            }
        }
        // SAFETY: as above; push writes the tail link.
        unsafe {
            self.freelists.push(
                ideal,
                offset + ideal_size,
                offset + (pieces - 1) * ideal_size,
            );
        }
        self.free_counts[ideal].fetch_add(pieces - 1, Ordering::Relaxed);

        if self.config.track_stats {
            self.total_splits.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(observer) = &self.observer {
            observer.on_split(used, ideal, pieces - 1);
        }
        trace!(from = used, to = ideal, produced = pieces - 1, "split oversized chunk");
    }

    fn count_failed(&self) {
        if self.config.track_stats {
            self.failed_allocs.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn fail<T>(&self, err: PoolError) -> PoolResult<T> {
        match self.config.error_mode {
            ErrorMode::Abort => {
                error!("pool failure: {err}");
                panic!("{err}");
            }
            ErrorMode::Propagate => Err(err),
        }
    }

    /// Region capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The size-class table this pool serves.
    pub fn classes(&self) -> &SizeClassTable {
        &self.classes
    }

    /// Checks if a pointer lies within this pool's region.
    pub fn contains(&self, ptr: *const u8) -> bool {
        let base = self.region.base.as_ptr() as usize;
        let addr = ptr as usize;
        addr >= base && addr < base + self.capacity
    }

    /// Free chunks currently on the given class's freelist (atomic
    /// estimate, exact in absence of races).
    pub fn free_chunks(&self, class: usize) -> usize {
        self.free_counts[class].load(Ordering::Relaxed)
    }

    /// Free chunks across all classes.
    pub fn free_chunks_total(&self) -> usize {
        self.free_counts
            .iter()
            .map(|count| count.load(Ordering::Relaxed))
            .sum()
    }

    /// Statistics snapshot, if tracking is enabled.
    pub fn stats(&self) -> Option<PoolStats> {
        if !self.config.track_stats {
            return None;
        }

        Some(PoolStats {
            total_allocs: self.total_allocs.load(Ordering::Relaxed),
            total_deallocs: self.total_deallocs.load(Ordering::Relaxed),
            total_splits: self.total_splits.load(Ordering::Relaxed),
            failed_allocs: self.failed_allocs.load(Ordering::Relaxed),
            capacity: self.capacity,
            free_chunks: self
                .free_counts
                .iter()
                .map(|count| count.load(Ordering::Relaxed))
                .collect(),
        })
    }
}

impl core::fmt::Debug for ChunkPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ChunkPool")
            .field("capacity", &self.capacity)
            .field("classes", &self.classes.sizes())
            .field("free_chunks_total", &self.free_chunks_total())
            .finish_non_exhaustive()
    }
}
