//! The allocator itself.

use core::fmt;

use log::{debug, trace};
use snafu::ensure;

use crate::{
    bitmap,
    error::{HeapError, MisalignedSnafu, OutOfBoundsSnafu, OutOfMemorySnafu, RegionTooSmallSnafu},
    geometry::{
        Align, BITMAP_WORDS, CAPACITY, GRANULE_BYTES, HEAP_GRANULES, HEAP_START, PAGE_BYTES,
        SizeClass, granule_offset, page_offset, zero_size_sentinel,
    },
    large,
    memory::LinearMemory,
    small,
};

/// Bitmap bits that were cleared by a successful release.
///
/// Kept so that a failed resize can put the old allocation back.
#[derive(Debug, Clone, Copy)]
enum Released {
    Granules { first: usize, count: usize },
    Pages { first: usize, count: usize },
}

impl Released {
    fn restore<M>(self, memory: &mut M)
    where
        M: LinearMemory + ?Sized,
    {
        match self {
            Self::Granules { first, count } => small::occupy(memory, first, count),
            Self::Pages { first, count } => large::occupy(memory, first..first + count),
        }
    }
}

/// A bitmap-tracked heap over a fixed-size linear memory region.
///
/// The first [`PAGE_BYTES`] bytes of the region hold the bitmap; the heap
/// occupies `[HEAP_START, CAPACITY)`. Allocations are identified only by
/// their offset: callers must pass the same size and alignment back to
/// [`release`](Self::release).
///
/// The allocator never moves an allocation and has no internal locking.
/// Callers sharing one heap between threads must serialize every call.
///
/// # Examples
///
/// ```
/// use bitmap_heap::{BitmapHeap, HEAP_START};
///
/// let mut heap = BitmapHeap::zeroed();
/// let offset = heap.allocate(8, 24).unwrap();
/// assert_eq!(offset, HEAP_START);
///
/// heap.write_i32s(offset, &[1, 2, 3], 0, 3);
/// heap.release(offset, 24, 8).unwrap();
/// assert!(heap.release(offset, 24, 8).is_err());
/// ```
pub struct BitmapHeap<M> {
    memory: M,
}

impl BitmapHeap<[u8; CAPACITY]> {
    /// Creates a heap over an inline, zero-initialized region.
    ///
    /// Usable in `static` initializers.
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            memory: [0; CAPACITY],
        }
    }
}

impl Default for BitmapHeap<[u8; CAPACITY]> {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl<M> fmt::Debug for BitmapHeap<M>
where
    M: LinearMemory,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitmapHeap")
            .field("allocated_granules", &self.allocated_granules())
            .field("free_granules", &self.free_granules())
            .finish_non_exhaustive()
    }
}

impl<M> BitmapHeap<M>
where
    M: LinearMemory,
{
    /// Creates a heap over `memory`.
    ///
    /// Only the first [`CAPACITY`] bytes are managed. The bitmap region is
    /// cleared, so every previous allocation in `memory` is forgotten.
    pub fn new(mut memory: M) -> Result<Self, HeapError> {
        let len = memory.as_bytes().len();
        ensure!(len >= CAPACITY, RegionTooSmallSnafu { len });
        bitmap::clear(&mut memory);
        Ok(Self { memory })
    }

    /// Releases an old allocation, then allocates a new one.
    ///
    /// If `old_size` is non-zero, `old_offset` must name a live allocation
    /// of exactly `old_size` bytes; it is released first. The contents of
    /// the old allocation are **not** copied to the new one.
    ///
    /// A `new_size` of zero returns [`zero_size_sentinel`] without touching
    /// the bitmap.
    ///
    /// On error nothing is changed: if the old allocation was released but
    /// the new request cannot be satisfied, the old allocation is restored.
    ///
    /// # Panics
    ///
    /// Panics if the computed allocation would overrun the heap, which can
    /// only happen if the bitmap has been corrupted.
    pub fn allocate_or_resize(
        &mut self,
        old_offset: usize,
        old_size: usize,
        align: usize,
        new_size: usize,
    ) -> Result<usize, HeapError> {
        let align = Align::new(align)?;

        let released = if old_size > 0 {
            Some(self.release_region(old_offset, old_size)?)
        } else {
            None
        };

        if new_size == 0 {
            return Ok(zero_size_sentinel(align));
        }

        if let Some(offset) = self.claim(new_size) {
            return Ok(offset);
        }

        if let Some(released) = released {
            released.restore(&mut self.memory);
        }
        debug!(
            "out of memory: {new_size} bytes requested, {} granules free",
            self.free_granules()
        );
        OutOfMemorySnafu { size: new_size }.fail()
    }

    /// Allocates `size` bytes aligned to `align`.
    pub fn allocate(&mut self, align: usize, size: usize) -> Result<usize, HeapError> {
        self.allocate_or_resize(0, 0, align, size)
    }

    /// Releases the allocation of `size` bytes at `offset`.
    ///
    /// A `size` of zero is a no-op for any `offset`. Otherwise the bits
    /// covering `offset..offset + size` must all be set, exactly as the
    /// matching allocation left them.
    pub fn release(&mut self, offset: usize, size: usize, align: usize) -> Result<(), HeapError> {
        Align::new(align)?;
        if size == 0 {
            return Ok(());
        }
        self.release_region(offset, size)?;
        Ok(())
    }

    fn claim(&mut self, size: usize) -> Option<usize> {
        let class = SizeClass::of(size);
        let offset = match class {
            SizeClass::Small { granules } => {
                granule_offset(small::claim(&mut self.memory, granules)?)
            }
            SizeClass::Large { pages } => page_offset(large::claim(&mut self.memory, pages)?),
        };
        assert!(
            offset + size <= CAPACITY,
            "allocation {offset:#x}+{size} overruns the heap"
        );
        trace!("allocated {size} bytes at {offset:#x} ({class:?})");
        Some(offset)
    }

    fn release_region(&mut self, offset: usize, size: usize) -> Result<Released, HeapError> {
        self.try_release_region(offset, size)
            .inspect(|_| trace!("released {size} bytes at {offset:#x}"))
            .inspect_err(|err| debug!("rejected release: {err}"))
    }

    fn try_release_region(&mut self, offset: usize, size: usize) -> Result<Released, HeapError> {
        let in_heap =
            offset >= HEAP_START && offset.checked_add(size).is_some_and(|end| end <= CAPACITY);
        ensure!(in_heap, OutOfBoundsSnafu { offset, size });

        let relative = offset - HEAP_START;
        match SizeClass::of(size) {
            SizeClass::Small { granules } => {
                ensure!(
                    relative.is_multiple_of(GRANULE_BYTES),
                    MisalignedSnafu {
                        offset,
                        unit: GRANULE_BYTES
                    }
                );
                let first = relative / GRANULE_BYTES;
                small::release(&mut self.memory, first, granules, offset, size)?;
                Ok(Released::Granules {
                    first,
                    count: granules,
                })
            }
            SizeClass::Large { pages } => {
                ensure!(
                    relative.is_multiple_of(PAGE_BYTES),
                    MisalignedSnafu {
                        offset,
                        unit: PAGE_BYTES
                    }
                );
                let first = relative / PAGE_BYTES;
                large::release(&mut self.memory, first, pages, offset, size)?;
                Ok(Released::Pages {
                    first,
                    count: pages,
                })
            }
        }
    }

    /// Returns bitmap word `index`, or `None` past the bitmap.
    #[must_use]
    pub fn bitmap_word(&self, index: usize) -> Option<u64> {
        (index < BITMAP_WORDS).then(|| bitmap::word(&self.memory, index))
    }

    /// Returns whether heap granule `granule` belongs to a live allocation.
    #[must_use]
    pub fn is_granule_allocated(&self, granule: usize) -> bool {
        granule < HEAP_GRANULES && bitmap::is_set(&self.memory, granule)
    }

    #[must_use]
    pub fn allocated_granules(&self) -> usize {
        bitmap::words(&self.memory)
            .map(|word| word.count_ones() as usize)
            .sum()
    }

    #[must_use]
    pub fn free_granules(&self) -> usize {
        HEAP_GRANULES - self.allocated_granules()
    }

    #[must_use]
    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub(crate) fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }

    #[must_use]
    pub fn into_memory(self) -> M {
        self.memory
    }
}
