//! Synchronization primitive shim.
//!
//! Under `cfg(loom)`, re-exports from `loom` so the model checker can
//! schedule every atomic access. Otherwise, re-exports from `std`.
//!
//! Every file in the crate must import atomics and fences through this
//! module. A single direct `use std::sync::atomic::*` would bypass loom's
//! scheduler and silently break exhaustive testing. This module is also
//! the seam through which the pool receives its compare-and-swap and
//! fence primitives, keeping the algorithm itself platform-agnostic.
#![allow(unused_imports)]

pub(crate) mod atomic {
    #[cfg(loom)]
    pub(crate) use loom::sync::atomic::{AtomicU64, AtomicUsize, Ordering, fence};

    #[cfg(not(loom))]
    pub(crate) use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering, fence};
}

pub(crate) mod hint {
    #[cfg(loom)]
    pub(crate) use loom::hint::spin_loop;

    #[cfg(not(loom))]
    pub(crate) use std::hint::spin_loop;
}
