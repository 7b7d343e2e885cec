//! Size-class table: the ordered set of chunk sizes a pool serves.

use crate::error::{PoolError, PoolResult};
use crate::utils::{align_up, is_aligned};

/// Smallest admissible chunk size. A free chunk stores its freelist link
/// in its first machine word, so every chunk must be able to hold one.
pub const MIN_CHUNK_SIZE: usize = core::mem::size_of::<usize>();

/// Ascending table of chunk sizes, fixed at pool construction and
/// read-only thereafter.
///
/// The same [`class_for`](Self::class_for) lookup maps a byte size to a
/// class index at allocation and deallocation time, so chunks need no
/// embedded metadata: consistency is structural.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeClassTable {
    sizes: Vec<usize>,
}

impl SizeClassTable {
    /// Builds a table from explicit chunk sizes.
    ///
    /// # Errors
    /// Returns [`PoolError::InvalidSizeClasses`] unless the sizes are
    /// non-empty, strictly increasing, at least [`MIN_CHUNK_SIZE`] bytes,
    /// and word-aligned (link words live at chunk starts).
    pub fn new(sizes: impl Into<Vec<usize>>) -> PoolResult<Self> {
        let sizes = sizes.into();

        if sizes.is_empty() {
            return Err(PoolError::invalid_size_classes("table must not be empty"));
        }
        if sizes[0] < MIN_CHUNK_SIZE {
            return Err(PoolError::invalid_size_classes(format!(
                "smallest class {} cannot hold a {}-byte link word",
                sizes[0], MIN_CHUNK_SIZE
            )));
        }
        if !sizes.windows(2).all(|w| w[0] < w[1]) {
            return Err(PoolError::invalid_size_classes(
                "sizes must be strictly increasing",
            ));
        }
        if let Some(&bad) = sizes
            .iter()
            .find(|&&s| !is_aligned(s, core::mem::align_of::<usize>()))
        {
            return Err(PoolError::invalid_size_classes(format!(
                "class size {bad} is not word-aligned"
            )));
        }

        Ok(Self { sizes })
    }

    /// Builds a geometric table: sizes grow by `factor` from `min` (rounded
    /// up to a word boundary) while they stay at or below `max`.
    ///
    /// # Errors
    /// Returns [`PoolError::InvalidSizeClasses`] if `factor < 2` or the
    /// range admits no class.
    pub fn geometric(min: usize, max: usize, factor: usize) -> PoolResult<Self> {
        if factor < 2 {
            return Err(PoolError::invalid_size_classes(
                "growth factor must be at least 2",
            ));
        }

        let mut sizes = Vec::new();
        let mut size = align_up(min.max(MIN_CHUNK_SIZE), core::mem::align_of::<usize>());
        while size <= max {
            sizes.push(size);
            size = match size.checked_mul(factor) {
                Some(next) => next,
                None => break,
            };
        }

        if sizes.is_empty() {
            return Err(PoolError::invalid_size_classes(format!(
                "no class fits between {min} and {max}"
            )));
        }

        Self::new(sizes)
    }

    /// Number of size classes.
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    /// Always `false`; a validated table has at least one class.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Chunk size of the given class.
    ///
    /// # Panics
    /// Panics if `class` is out of range.
    pub fn size(&self, class: usize) -> usize {
        self.sizes[class]
    }

    /// Largest chunk size the table supports.
    pub fn max_size(&self) -> usize {
        *self.sizes.last().expect("validated table is non-empty")
    }

    /// The configured sizes, ascending.
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// Index of the smallest class whose chunk size is at least `size`,
    /// or `None` when `size` exceeds every class.
    #[inline]
    pub fn class_for(&self, size: usize) -> Option<usize> {
        self.sizes.iter().position(|&s| size <= s)
    }
}
