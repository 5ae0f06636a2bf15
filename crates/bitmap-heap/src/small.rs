//! Sub-page allocations: runs of granules inside one bitmap word.
//!
//! Words are scanned in ascending order and each word's bits from least to
//! most significant. The first run of free bits long enough for the request
//! wins. A run never continues into the next word, so a request can fail
//! even when two neighbouring words together hold enough trailing and
//! leading free bits.

use snafu::ensure;

use crate::{
    bitmap,
    error::{HeapError, NotAllocatedSnafu},
    geometry::{BITMAP_WORDS, FULL_WORD, GRANULES_PER_PAGE, run_mask},
    memory::LinearMemory,
};

/// Finds the lowest bit index starting `len` consecutive zero bits.
fn find_run(word: u64, len: usize) -> Option<usize> {
    let mut count = 0;
    for bit in 0..GRANULES_PER_PAGE {
        if (word >> bit) & 1 == 0 {
            count += 1;
            if count == len {
                return Some(bit + 1 - count);
            }
        } else {
            count = 0;
        }
    }
    None
}

/// Claims the first free run of `granules` granules.
///
/// Returns the index of the first granule, or `None` if no single word has
/// such a run.
pub(crate) fn claim<M>(memory: &mut M, granules: usize) -> Option<usize>
where
    M: LinearMemory + ?Sized,
{
    assert!(
        (1..=GRANULES_PER_PAGE).contains(&granules),
        "small run of {granules} granules"
    );

    for index in 0..BITMAP_WORDS {
        let word = bitmap::word(memory, index);
        if word == FULL_WORD {
            continue;
        }
        if let Some(start) = find_run(word, granules) {
            let granule = index * GRANULES_PER_PAGE + start;
            occupy(memory, granule, granules);
            return Some(granule);
        }
    }
    None
}

/// Marks `granules` granules starting at `granule` as allocated.
///
/// The run must be free and must not cross a word boundary.
pub(crate) fn occupy<M>(memory: &mut M, granule: usize, granules: usize)
where
    M: LinearMemory + ?Sized,
{
    let index = granule / GRANULES_PER_PAGE;
    let shift = granule % GRANULES_PER_PAGE;
    let mask = run_mask(granules) << shift;
    let word = bitmap::word(memory, index);
    debug_assert_eq!(word & mask, 0, "granule run already in use");
    bitmap::set_word(memory, index, word | mask);
}

/// Releases the run of `granules` granules starting at `granule`.
///
/// Every bit of the run must currently be set, otherwise nothing changes and
/// `NotAllocated` is reported for the caller's `offset` and `size`.
pub(crate) fn release<M>(
    memory: &mut M,
    granule: usize,
    granules: usize,
    offset: usize,
    size: usize,
) -> Result<(), HeapError>
where
    M: LinearMemory + ?Sized,
{
    let index = granule / GRANULES_PER_PAGE;
    let shift = granule % GRANULES_PER_PAGE;
    let mask = run_mask(granules);
    let word = bitmap::word(memory, index);

    ensure!(
        shift + granules <= GRANULES_PER_PAGE && (word >> shift) & mask == mask,
        NotAllocatedSnafu { offset, size }
    );

    bitmap::set_word(memory, index, word & !(mask << shift));
    Ok(())
}
