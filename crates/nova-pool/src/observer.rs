//! Injected observation of pool activity.
//!
//! Diagnostics such as allocation counting are not kept in process-wide
//! globals; callers that want them attach an observer at construction
//! time and receive every event through it.

/// A single pool event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolEvent {
    /// A chunk was handed out.
    Allocated {
        /// Size class the chunk was served from after any split.
        class: usize,
        /// Byte offset of the chunk within the region.
        offset: usize,
        /// Size the caller asked for.
        requested: usize,
    },
    /// A chunk was returned to its freelist.
    Deallocated {
        /// Size class the chunk was pushed onto.
        class: usize,
        /// Byte offset of the chunk within the region.
        offset: usize,
    },
    /// An oversized chunk was subdivided to serve a smaller class.
    Split {
        /// Class the chunk was popped from.
        from_class: usize,
        /// Class the remainder chunks were pushed onto.
        to_class: usize,
        /// Number of remainder chunks produced.
        produced: usize,
    },
    /// An allocation gave up after exhausting its retry budget.
    Exhausted {
        /// Scan rounds spent before failing.
        attempts: usize,
    },
}

/// Observer for pool events.
pub trait PoolObserver: Send + Sync + 'static {
    /// Handles one pool event.
    fn on_event(&self, event: PoolEvent);

    /// Handles a successful allocation.
    fn on_allocated(&self, class: usize, offset: usize, requested: usize) {
        self.on_event(PoolEvent::Allocated { class, offset, requested });
    }

    /// Handles a successful deallocation.
    fn on_deallocated(&self, class: usize, offset: usize) {
        self.on_event(PoolEvent::Deallocated { class, offset });
    }

    /// Handles a chunk split.
    fn on_split(&self, from_class: usize, to_class: usize, produced: usize) {
        self.on_event(PoolEvent::Split { from_class, to_class, produced });
    }

    /// Handles pool exhaustion.
    fn on_exhausted(&self, attempts: usize) {
        self.on_event(PoolEvent::Exhausted { attempts });
    }
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpObserver;

impl PoolObserver for NoOpObserver {
    fn on_event(&self, _event: PoolEvent) {}
}
