//! Integration tests for the chunk pool.
#![cfg(not(loom))]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::thread;

use nova_pool::{
    ChunkPool, ErrorMode, PoolConfig, PoolError, PoolEvent, PoolObserver, SizeClassTable,
};

fn classes() -> SizeClassTable {
    SizeClassTable::new([64, 256, 1024]).expect("valid table")
}

fn test_config() -> PoolConfig {
    PoolConfig {
        max_scan_attempts: 256,
        use_backoff: false,
        track_stats: true,
        ..PoolConfig::default()
    }
}

#[test]
fn test_pool_basic() {
    let pool = ChunkPool::with_config(classes(), 4096, test_config()).expect("pool");

    let ptr = pool.allocate(128).expect("allocation");
    assert!(pool.contains(ptr.as_ptr()));

    unsafe {
        // The chunk belongs to us; write and read it back.
        std::ptr::write_bytes(ptr.as_ptr(), 0x42, 128);
        assert_eq!(*ptr.as_ptr(), 0x42);

        pool.deallocate(ptr, 128).expect("deallocation");
    }
}

#[test]
fn test_pool_reuse() {
    // A single 64-byte chunk: a free/allocate cycle must hand the same
    // chunk back.
    let table = SizeClassTable::new([64]).expect("valid table");
    let pool = ChunkPool::with_config(table, 64, test_config()).expect("pool");

    let first = pool.allocate(64).expect("first allocation");
    let addr = first.as_ptr() as usize;

    unsafe { pool.deallocate(first, 64).expect("deallocation") };

    let second = pool.allocate(64).expect("second allocation");
    assert_eq!(second.as_ptr() as usize, addr, "pool should reuse freed chunks");

    unsafe { pool.deallocate(second, 64).expect("deallocation") };
}

#[test]
fn test_pool_distinct_chunks() {
    let pool = ChunkPool::with_config(classes(), 16 * 1024, test_config()).expect("pool");

    let mut ptrs = Vec::new();
    for index in 0..10 {
        let ptr = pool.allocate(64).expect("allocation");
        unsafe { std::ptr::write_bytes(ptr.as_ptr(), index as u8, 64) };
        ptrs.push(ptr);
    }

    // All chunks distinct and non-overlapping (class spacing).
    let addrs: HashSet<usize> = ptrs.iter().map(|p| p.as_ptr() as usize).collect();
    assert_eq!(addrs.len(), 10);
    let mut sorted: Vec<usize> = addrs.into_iter().collect();
    sorted.sort_unstable();
    for pair in sorted.windows(2) {
        assert!(pair[1] - pair[0] >= 64);
    }

    // Patterns survived neighboring writes.
    for (index, ptr) in ptrs.iter().enumerate() {
        assert_eq!(unsafe { *ptr.as_ptr() }, index as u8);
    }

    for ptr in ptrs {
        unsafe { pool.deallocate(ptr, 64).expect("deallocation") };
    }
}

#[test]
fn test_split_counts_and_disjointness() {
    // 4096 bytes seeded as four 1024-chunks. A 200-byte request maps to
    // class 256 and splits one 1024-chunk into four pieces.
    let pool = ChunkPool::with_config(classes(), 4096, test_config()).expect("pool");

    let ptr = pool.allocate(200).expect("allocation");
    assert_eq!(pool.free_chunks(1), 3, "1024/256 - 1 remainder chunks");
    assert_eq!(pool.free_chunks(2), 3, "one coarse chunk consumed");

    // The remainder chunks are adjacent to the returned one, disjoint
    // from it and from each other.
    let base = ptr.as_ptr() as usize;
    let mut seen = HashSet::new();
    for _ in 0..3 {
        let next = pool.allocate(200).expect("remainder allocation");
        let delta = next.as_ptr() as usize - base;
        assert!(delta >= 256 && delta <= 768);
        assert_eq!(delta % 256, 0);
        assert!(seen.insert(delta));
    }
    assert_eq!(pool.free_chunks(1), 0);
}

#[test]
fn test_larger_class_serves_when_ideal_empty() {
    let pool = ChunkPool::with_config(classes(), 2048, test_config()).expect("pool");

    // Drain class 64 allocations out of the first coarse chunk: one split
    // yields 16 pieces.
    let mut small = Vec::new();
    for _ in 0..16 {
        small.push(pool.allocate(64).expect("allocation"));
    }
    assert_eq!(pool.free_chunks(0), 0);
    assert_eq!(pool.free_chunks(2), 1);

    // The next small request has to come from the second coarse chunk.
    let from_coarse = pool.allocate(64).expect("allocation from larger class");
    assert!(pool.contains(from_coarse.as_ptr()));
    assert_eq!(pool.free_chunks(0), 15);
    assert_eq!(pool.free_chunks(2), 0);

    unsafe {
        pool.deallocate(from_coarse, 64).expect("deallocation");
        for ptr in small {
            pool.deallocate(ptr, 64).expect("deallocation");
        }
    }
}

#[test]
fn test_request_too_large() {
    let pool = ChunkPool::with_config(classes(), 4096, test_config()).expect("pool");

    let err = pool.allocate(4096).expect_err("oversize must fail");
    assert_eq!(err, PoolError::RequestTooLarge { requested: 4096, max: 1024 });

    // No freelist was touched.
    assert_eq!(pool.free_chunks_total(), 4);
}

#[test]
fn test_exhaustion_and_recovery() {
    let table = SizeClassTable::new([64]).expect("valid table");
    let pool = ChunkPool::with_config(table, 128, test_config()).expect("pool");

    let a = pool.allocate(64).expect("allocation");
    let b = pool.allocate(64).expect("allocation");

    let err = pool.allocate(64).expect_err("drained pool must fail");
    assert!(matches!(err, PoolError::PoolExhausted { .. }));

    unsafe { pool.deallocate(a, 64).expect("deallocation") };
    let c = pool.allocate(64).expect("freed chunk is visible again");

    unsafe {
        pool.deallocate(b, 64).expect("deallocation");
        pool.deallocate(c, 64).expect("deallocation");
    }
    assert_eq!(pool.free_chunks_total(), 2);
}

#[test]
fn test_abort_mode_panics() {
    let config = PoolConfig { error_mode: ErrorMode::Abort, ..test_config() };
    let pool = ChunkPool::with_config(classes(), 4096, config).expect("pool");

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _ = pool.allocate(1_000_000);
    }));
    assert!(result.is_err(), "abort mode must panic on failure");
}

#[test]
fn test_stats_tracking() {
    let pool = ChunkPool::with_config(classes(), 4096, test_config()).expect("pool");

    let ptr = pool.allocate(50).expect("allocation");
    unsafe { pool.deallocate(ptr, 50).expect("deallocation") };
    let _ = pool.allocate(4096);

    let stats = pool.stats().expect("stats enabled");
    assert_eq!(stats.total_allocs, 1);
    assert_eq!(stats.total_deallocs, 1);
    assert_eq!(stats.total_splits, 1);
    assert_eq!(stats.failed_allocs, 1);
    assert_eq!(stats.capacity, 4096);
    assert_eq!(stats.free_chunks_total(), pool.free_chunks_total());

    let silent = ChunkPool::with_config(classes(), 4096, PoolConfig::production()).expect("pool");
    assert!(silent.stats().is_none());
}

struct RecordingObserver {
    events: Mutex<Vec<PoolEvent>>,
}

impl PoolObserver for RecordingObserver {
    fn on_event(&self, event: PoolEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[test]
fn test_observer_receives_events() {
    let observer = Arc::new(RecordingObserver { events: Mutex::new(Vec::new()) });
    let pool = ChunkPool::with_config(classes(), 1024, test_config())
        .expect("pool")
        .with_observer(observer.clone());

    let ptr = pool.allocate(50).expect("allocation");
    unsafe { pool.deallocate(ptr, 50).expect("deallocation") };

    let events = observer.events.lock().unwrap();
    assert!(events.iter().any(|e| matches!(
        e,
        PoolEvent::Split { from_class: 2, to_class: 0, produced: 15 }
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        PoolEvent::Allocated { class: 0, requested: 50, .. }
    )));
    assert!(events.iter().any(|e| matches!(e, PoolEvent::Deallocated { class: 0, .. })));
}

#[test]
fn test_concurrent_disjointness() {
    // Interleaved allocate/deallocate from many threads; every live chunk
    // must be exclusively owned, which the per-thread fill patterns
    // verify, and the global occupancy must balance out at the end.
    const THREADS: usize = 8;
    const ROUNDS: usize = 200;

    let table = SizeClassTable::new([64, 256, 1024]).expect("valid table");
    let pool = Arc::new(
        ChunkPool::with_config(table, 256 * 1024, PoolConfig::production()).expect("pool"),
    );

    let handles: Vec<_> = (0..THREADS)
        .map(|thread_id| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                let sizes = [17usize, 64, 200, 256, 900];
                let mut live: Vec<(std::ptr::NonNull<u8>, usize)> = Vec::new();

                for round in 0..ROUNDS {
                    let size = sizes[(round + thread_id) % sizes.len()];
                    match pool.allocate(size) {
                        Ok(ptr) => {
                            unsafe { std::ptr::write_bytes(ptr.as_ptr(), thread_id as u8, size) };
                            live.push((ptr, size));
                        }
                        Err(PoolError::PoolExhausted { .. }) => {}
                        Err(err) => panic!("unexpected failure: {err}"),
                    }

                    // Free roughly half of what we hold, verifying our
                    // pattern first: a torn handout would show another
                    // thread's byte.
                    if round % 2 == 1 {
                        if let Some((ptr, size)) = live.pop() {
                            for offset in 0..size {
                                let byte = unsafe { *ptr.as_ptr().add(offset) };
                                assert_eq!(byte, thread_id as u8, "chunk ownership violated");
                            }
                            unsafe { pool.deallocate(ptr, size).expect("deallocation") };
                        }
                    }
                }

                for (ptr, size) in live {
                    unsafe { pool.deallocate(ptr, size).expect("deallocation") };
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("worker thread");
    }

    // Everything was returned; capacity is conserved across classes.
    let total_bytes: usize = (0..pool.classes().len())
        .map(|class| pool.free_chunks(class) * pool.classes().size(class))
        .sum();
    assert_eq!(total_bytes, pool.capacity());
}

#[test]
fn test_version_exported() {
    assert!(!nova_pool::VERSION.is_empty());
}
