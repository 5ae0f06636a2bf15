//! Whole-page allocations: runs of zero bitmap words.

use core::ops::Range;

use snafu::ensure;

use crate::{
    bitmap,
    error::{HeapError, NotAllocatedSnafu},
    geometry::{BITMAP_WORDS, FULL_WORD},
    memory::LinearMemory,
};

/// Claims the first run of `pages` completely free pages.
///
/// Returns the index of the first page, or `None` if no such run exists.
pub(crate) fn claim<M>(memory: &mut M, pages: usize) -> Option<usize>
where
    M: LinearMemory + ?Sized,
{
    assert!(pages > 0, "large run of zero pages");

    let mut count = 0;
    for index in 0..BITMAP_WORDS {
        if bitmap::word(memory, index) != 0 {
            count = 0;
            continue;
        }
        count += 1;
        if count == pages {
            let first = index + 1 - count;
            occupy(memory, first..index + 1);
            return Some(first);
        }
    }
    None
}

/// Marks every page in `pages` as owned by a large allocation.
pub(crate) fn occupy<M>(memory: &mut M, pages: Range<usize>)
where
    M: LinearMemory + ?Sized,
{
    for index in pages {
        debug_assert_eq!(bitmap::word(memory, index), 0, "page {index} already in use");
        bitmap::set_word(memory, index, FULL_WORD);
    }
}

/// Releases `pages` pages starting at page `first`.
///
/// All covered words are checked before any of them is cleared.
pub(crate) fn release<M>(
    memory: &mut M,
    first: usize,
    pages: usize,
    offset: usize,
    size: usize,
) -> Result<(), HeapError>
where
    M: LinearMemory + ?Sized,
{
    let covered = first..first + pages;
    ensure!(
        covered.end <= BITMAP_WORDS
            && covered
                .clone()
                .all(|index| bitmap::word(memory, index) == FULL_WORD),
        NotAllocatedSnafu { offset, size }
    );

    for index in covered {
        bitmap::set_word(memory, index, 0);
    }
    Ok(())
}
