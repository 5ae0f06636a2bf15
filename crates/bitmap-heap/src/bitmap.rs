//! Access to the bitmap words stored at the start of the region.

use crate::{
    geometry::{BITMAP_WORDS, GRANULES_PER_PAGE, WORD_BYTES},
    memory::LinearMemory,
};

#[track_caller]
pub(crate) fn word<M>(memory: &M, index: usize) -> u64
where
    M: LinearMemory + ?Sized,
{
    assert!(index < BITMAP_WORDS, "bitmap word {index} out of range");
    memory.load::<u64>(index * WORD_BYTES)
}

#[track_caller]
pub(crate) fn set_word<M>(memory: &mut M, index: usize, value: u64)
where
    M: LinearMemory + ?Sized,
{
    assert!(index < BITMAP_WORDS, "bitmap word {index} out of range");
    memory.store::<u64>(index * WORD_BYTES, value);
}

pub(crate) fn words<M>(memory: &M) -> impl Iterator<Item = u64> + '_
where
    M: LinearMemory + ?Sized,
{
    (0..BITMAP_WORDS).map(move |index| word(memory, index))
}

pub(crate) fn is_set<M>(memory: &M, granule: usize) -> bool
where
    M: LinearMemory + ?Sized,
{
    let index = granule / GRANULES_PER_PAGE;
    let bit = granule % GRANULES_PER_PAGE;
    (word(memory, index) >> bit) & 1 == 1
}

pub(crate) fn clear<M>(memory: &mut M)
where
    M: LinearMemory + ?Sized,
{
    for index in 0..BITMAP_WORDS {
        set_word(memory, index, 0);
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::CAPACITY;

    #[test]
    fn test_word_addressing() {
        let mut mem = [0_u8; CAPACITY];
        set_word(&mut mem, 1, 0b101);
        assert_eq!(mem[8], 0b101);
        assert_eq!(word(&mem, 1), 0b101);
        assert!(is_set(&mem, 64));
        assert!(!is_set(&mem, 65));
        assert!(is_set(&mem, 66));
        assert_eq!(words(&mem).filter(|w| *w != 0).count(), 1);

        clear(&mut mem);
        assert!(words(&mem).all(|w| w == 0));
    }

    #[test]
    #[should_panic = "bitmap word 64 out of range"]
    fn test_word_index_past_bitmap() {
        let mem = [0_u8; CAPACITY];
        let _ = word(&mem, BITMAP_WORDS);
    }
}
