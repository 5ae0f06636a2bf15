//! Fixed layout of the managed region.
//!
//! ```text
//! 0            PAGE_BYTES                                     CAPACITY
//! ┌────────────┬──────────┬──────────┬─────────┬──────────────┐
//! │ bitmap     │ page 0   │ page 1   │   ...   │ page 63      │
//! │ 64 x u64   │ 64 gran. │ 64 gran. │         │ 64 granules  │
//! └────────────┴──────────┴──────────┴─────────┴──────────────┘
//!   word i  ──tracks──▶  page i (bit j ⇔ granule i*64 + j)
//! ```

use snafu::ensure;

use crate::error::{HeapError, UnsupportedAlignSnafu};

/// Size of the allocation unit tracked by a single bitmap bit.
pub const GRANULE_BYTES: usize = 8;

/// Number of granules tracked by one bitmap word.
pub const GRANULES_PER_PAGE: usize = u64::BITS as usize;

/// Size of a page, the unit of large allocations.
pub const PAGE_BYTES: usize = GRANULE_BYTES * GRANULES_PER_PAGE;

/// Size of one bitmap word.
pub const WORD_BYTES: usize = size_of::<u64>();

/// Number of words in the bitmap region.
pub const BITMAP_WORDS: usize = PAGE_BYTES / WORD_BYTES;

/// First byte offset of the heap region.
pub const HEAP_START: usize = PAGE_BYTES;

/// Number of granules in the heap region.
pub const HEAP_GRANULES: usize = BITMAP_WORDS * GRANULES_PER_PAGE;

/// Total size of the managed region, bitmap included.
pub const CAPACITY: usize = HEAP_START + HEAP_GRANULES * GRANULE_BYTES;

const _: () = assert!(PAGE_BYTES == 512);
const _: () = assert!(BITMAP_WORDS == 64);
const _: () = assert!(CAPACITY == 65 * PAGE_BYTES);
const _: () = assert!(CAPACITY <= u32::MAX as usize);

/// Bitmap word of a page owned by a large allocation.
pub(crate) const FULL_WORD: u64 = u64::MAX;

/// Returns a mask with the low `len` bits set.
///
/// `len` may be the full word width.
pub(crate) const fn run_mask(len: usize) -> u64 {
    if len >= GRANULES_PER_PAGE {
        FULL_WORD
    } else {
        (1 << len) - 1
    }
}

/// Byte offset of heap granule `granule`.
#[must_use]
pub const fn granule_offset(granule: usize) -> usize {
    HEAP_START + granule * GRANULE_BYTES
}

/// Byte offset of the first granule of heap page `page`.
#[must_use]
pub const fn page_offset(page: usize) -> usize {
    granule_offset(page * GRANULES_PER_PAGE)
}

/// Alignment accepted by the allocator.
///
/// Only 1, 2, 4 and 8 are supported. Every granule already satisfies the
/// strongest of them, so the value only affects the zero-size sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Align(usize);

impl Align {
    /// Validates `align`.
    pub fn new(align: usize) -> Result<Self, HeapError> {
        ensure!(
            matches!(align, 1 | 2 | 4 | 8),
            UnsupportedAlignSnafu { align }
        );
        Ok(Self(align))
    }

    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }

    /// Rounds `offset` up to a multiple of this alignment.
    #[must_use]
    pub const fn align_up(self, offset: usize) -> usize {
        offset.next_multiple_of(self.0)
    }
}

/// Offset returned for zero-sized requests.
///
/// This is the end of the managed region rounded up to `align`: it is the
/// same for every call, never dereferenceable and never handed out for a
/// real allocation.
#[must_use]
pub const fn zero_size_sentinel(align: Align) -> usize {
    align.align_up(CAPACITY)
}

/// Search strategy selected by request size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::IsVariant)]
pub enum SizeClass {
    /// Less than one page: a run of granules inside a single bitmap word.
    Small { granules: usize },
    /// One page or more: a run of whole pages.
    Large { pages: usize },
}

impl SizeClass {
    /// Classifies a non-zero request size.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero.
    #[must_use]
    pub fn of(size: usize) -> Self {
        assert!(size > 0, "zero-sized requests have no size class");
        if size < PAGE_BYTES {
            Self::Small {
                granules: size.div_ceil(GRANULE_BYTES),
            }
        } else {
            Self::Large {
                pages: size.div_ceil(PAGE_BYTES),
            }
        }
    }

    /// Number of heap bytes actually reserved for a request of this class.
    #[must_use]
    pub const fn footprint(self) -> usize {
        match self {
            Self::Small { granules } => granules * GRANULE_BYTES,
            Self::Large { pages } => pages * PAGE_BYTES,
        }
    }
}
