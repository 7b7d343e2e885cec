//! Pool statistics snapshot.

/// Statistics for a [`ChunkPool`](crate::ChunkPool).
///
/// Counters are sampled independently of one another; under concurrent
/// traffic the snapshot is a consistent estimate, exact once the pool is
/// quiescent.
#[derive(Debug, Clone)]
pub struct PoolStats {
    /// Total successful allocations.
    pub total_allocs: u64,
    /// Total successful deallocations.
    pub total_deallocs: u64,
    /// Total chunk splits performed.
    pub total_splits: u64,
    /// Allocations that failed (oversize or exhausted).
    pub failed_allocs: u64,
    /// Region capacity in bytes.
    pub capacity: usize,
    /// Free chunks currently on each class's freelist, ascending by class.
    pub free_chunks: Vec<usize>,
}

impl PoolStats {
    /// Total free chunks across all classes.
    pub fn free_chunks_total(&self) -> usize {
        self.free_chunks.iter().sum()
    }
}
