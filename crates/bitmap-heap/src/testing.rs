//! Helpers shared by the unit tests.

extern crate alloc;

use alloc::vec::Vec;

use crate::{
    BitmapHeap,
    geometry::{BITMAP_WORDS, GRANULE_BYTES, GRANULES_PER_PAGE, HEAP_START, SizeClass},
    memory::LinearMemory,
};

/// Small deterministic generator for randomized workloads.
pub(crate) struct Lcg(u64);

impl Lcg {
    pub(crate) fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub(crate) fn next_below(&mut self, bound: usize) -> usize {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        #[expect(clippy::cast_possible_truncation)]
        let high = (self.0 >> 33) as usize;
        high % bound
    }
}

pub(crate) fn snapshot<M>(heap: &BitmapHeap<M>) -> Vec<u64>
where
    M: LinearMemory,
{
    (0..BITMAP_WORDS)
        .map(|index| heap.bitmap_word(index).unwrap())
        .collect()
}

/// Bitmap implied by a set of live `(offset, size)` allocations.
fn expected_words(live: &[(usize, usize)]) -> Vec<u64> {
    let mut words = alloc::vec![0_u64; BITMAP_WORDS];
    for &(offset, size) in live {
        let first = (offset - HEAP_START) / GRANULE_BYTES;
        let count = SizeClass::of(size).footprint() / GRANULE_BYTES;
        for granule in first..first + count {
            let bit = 1 << (granule % GRANULES_PER_PAGE);
            let word = &mut words[granule / GRANULES_PER_PAGE];
            assert_eq!(*word & bit, 0, "granule {granule} owned twice");
            *word |= bit;
        }
    }
    words
}

/// Checks that the heap's bitmap matches `live` exactly and that no two
/// live allocations overlap.
#[track_caller]
pub(crate) fn assert_consistent<M>(heap: &BitmapHeap<M>, live: &[(usize, usize)])
where
    M: LinearMemory,
{
    let mut sorted = live.to_vec();
    sorted.sort_unstable();
    for pair in sorted.windows(2) {
        let (a, a_size) = pair[0];
        let (b, _) = pair[1];
        assert!(a + a_size <= b, "{a:#x}+{a_size} overlaps {b:#x}");
    }

    assert_eq!(snapshot(heap), expected_words(live));
}
