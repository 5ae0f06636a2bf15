//! Boundary entry points for a [`BitmapHeap`].
//!
//! Foreign callers see four functions: `cabi_realloc` and `cabi_free`, plus
//! the legacy `canonical_abi_realloc` and `canonical_abi_free` names kept for
//! callers built against the older naming of the same contract. Offsets are
//! 32-bit addresses into the linear memory; sizes and alignments are signed
//! 32-bit integers, so negative values are rejected here before the heap
//! sees them.
//!
//! How these functions are exported as symbols is up to the embedder. A
//! typical setup keeps one [`SharedHeap`] in a `static`:
//!
//! ```rust
//! use bitmap_heap::{BitmapHeap, CAPACITY};
//! use heap_abi::SharedHeap;
//!
//! static HEAP: SharedHeap<[u8; CAPACITY]> = SharedHeap::new(BitmapHeap::zeroed());
//!
//! let offset = HEAP.cabi_realloc(0, 0, 8, 64).unwrap();
//! HEAP.with_heap(|heap| heap.write_bytes(offset.try_into().unwrap(), b"hi", 0, 2));
//! HEAP.cabi_free(offset, 64, 8).unwrap();
//! ```

#![no_std]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use bitmap_heap::{BitmapHeap, CAPACITY, ErrorKind, HeapError, LinearMemory};
use log::debug;
use platform_cast::CastFrom as _;
use snafu::{Location, OptionExt as _, ResultExt as _, Snafu};
use spin::Mutex;

/// Errors returned by the boundary entry points.
#[derive(Debug, Snafu)]
#[snafu(module)]
pub enum AbiError {
    #[snafu(display("negative size {size}"))]
    NegativeSize {
        size: i32,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("negative alignment {align}"))]
    NegativeAlign {
        align: i32,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("heap operation failed: {source}"))]
    Heap {
        #[snafu(source)]
        source: HeapError,
        #[snafu(implicit)]
        location: Location,
    },
}

impl AbiError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NegativeSize { .. } | Self::NegativeAlign { .. } => ErrorKind::InvalidArgument,
            Self::Heap { source, .. } => source.kind(),
        }
    }
}

#[track_caller]
fn size_arg(size: i32) -> Result<usize, AbiError> {
    usize::try_from(size)
        .ok()
        .context(abi_error::NegativeSizeSnafu { size })
}

#[track_caller]
fn align_arg(align: i32) -> Result<usize, AbiError> {
    usize::try_from(align)
        .ok()
        .context(abi_error::NegativeAlignSnafu { align })
}

fn boundary_offset(offset: usize) -> u32 {
    assert!(offset <= CAPACITY, "offset {offset:#x} past the region");
    #[expect(clippy::cast_possible_truncation)]
    let offset = offset as u32;
    offset
}

/// A [`BitmapHeap`] behind a spin lock.
///
/// Every entry point takes the lock for the duration of one heap operation,
/// which serializes callers from different threads.
pub struct SharedHeap<M> {
    heap: Mutex<BitmapHeap<M>>,
}

impl<M> SharedHeap<M> {
    pub const fn new(heap: BitmapHeap<M>) -> Self {
        Self {
            heap: Mutex::new(heap),
        }
    }

    pub fn into_inner(self) -> BitmapHeap<M> {
        self.heap.into_inner()
    }
}

impl<M> SharedHeap<M>
where
    M: LinearMemory,
{
    /// Runs `f` with exclusive access to the heap.
    ///
    /// Used for bulk copies in and out of allocated buffers.
    pub fn with_heap<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut BitmapHeap<M>) -> R,
    {
        f(&mut self.heap.lock())
    }

    /// Releases `old_size` bytes at `old_offset` (if non-zero) and allocates
    /// `new_size` bytes. Contents are not preserved.
    pub fn cabi_realloc(
        &self,
        old_offset: u32,
        old_size: i32,
        align: i32,
        new_size: i32,
    ) -> Result<u32, AbiError> {
        let old_size = size_arg(old_size)?;
        let new_size = size_arg(new_size)?;
        let align = align_arg(align)?;

        let offset = self
            .heap
            .lock()
            .allocate_or_resize(usize::cast_from(old_offset), old_size, align, new_size)
            .context(abi_error::HeapSnafu)
            .inspect_err(|err| debug!("cabi_realloc failed: {err}"))?;
        Ok(boundary_offset(offset))
    }

    /// Releases `size` bytes at `offset`.
    pub fn cabi_free(&self, offset: u32, size: i32, align: i32) -> Result<(), AbiError> {
        let size = size_arg(size)?;
        let align = align_arg(align)?;

        self.heap
            .lock()
            .release(usize::cast_from(offset), size, align)
            .context(abi_error::HeapSnafu)
            .inspect_err(|err| debug!("cabi_free failed: {err}"))
    }

    /// Legacy name for [`cabi_realloc`](Self::cabi_realloc).
    pub fn canonical_abi_realloc(
        &self,
        old_offset: u32,
        old_size: i32,
        align: i32,
        new_size: i32,
    ) -> Result<u32, AbiError> {
        self.cabi_realloc(old_offset, old_size, align, new_size)
    }

    /// Legacy name for [`cabi_free`](Self::cabi_free).
    pub fn canonical_abi_free(&self, offset: u32, size: i32, align: i32) -> Result<(), AbiError> {
        self.cabi_free(offset, size, align)
    }

    /// Allocates `size` bytes; shorthand for a realloc with no old buffer.
    pub fn malloc(&self, size: i32, align: i32) -> Result<u32, AbiError> {
        self.cabi_realloc(0, 0, align, size)
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    extern crate alloc;
    extern crate std;

    use alloc::{vec, vec::Vec};
    use std::thread;

    use bitmap_heap::HEAP_START;

    use super::*;

    fn shared() -> SharedHeap<Vec<u8>> {
        SharedHeap::new(BitmapHeap::new(vec![0; CAPACITY]).unwrap())
    }

    #[test]
    fn test_realloc_and_free() {
        let heap = shared();
        let offset = heap.cabi_realloc(0, 0, 4, 10).unwrap();
        assert_eq!(offset, 512);

        let moved = heap.cabi_realloc(offset, 10, 4, 700).unwrap();
        assert_eq!(moved, 512);
        assert_eq!(heap.with_heap(|h| h.bitmap_word(1)), Some(u64::MAX));

        heap.cabi_free(moved, 700, 4).unwrap();
        assert_eq!(heap.with_heap(|h| h.allocated_granules()), 0);
    }

    #[test]
    fn test_negative_arguments_are_rejected() {
        let heap = shared();
        let err = heap.cabi_realloc(0, -1, 8, 8).unwrap_err();
        assert!(matches!(err, AbiError::NegativeSize { size: -1, .. }));
        let err = heap.cabi_realloc(0, 0, 8, i32::MIN).unwrap_err();
        assert!(matches!(err, AbiError::NegativeSize { .. }));
        let err = heap.cabi_realloc(0, 0, -8, 8).unwrap_err();
        assert!(matches!(err, AbiError::NegativeAlign { .. }));
        let err = heap.cabi_free(512, -8, 8).unwrap_err();
        assert!(err.kind().is_invalid_argument());

        let err = heap.cabi_realloc(0, 0, 3, 8).unwrap_err();
        assert!(matches!(
            err,
            AbiError::Heap {
                source: HeapError::UnsupportedAlign { align: 3, .. },
                ..
            }
        ));
        assert_eq!(heap.with_heap(|h| h.allocated_granules()), 0);
    }

    #[test]
    fn test_legacy_aliases_share_state() {
        let heap = shared();
        let a = heap.canonical_abi_realloc(0, 0, 8, 16).unwrap();
        let b = heap.cabi_realloc(0, 0, 8, 16).unwrap();
        assert_eq!(b, a + 16);

        heap.cabi_free(a, 16, 8).unwrap();
        let err = heap.canonical_abi_free(a, 16, 8).unwrap_err();
        assert!(err.kind().is_invalid_argument());
        heap.canonical_abi_free(b, 16, 8).unwrap();
    }

    #[test]
    fn test_zero_size_round_trip() {
        let heap = shared();
        let sentinel = heap.malloc(0, 2).unwrap();
        assert_eq!(sentinel, heap.malloc(0, 2).unwrap());
        assert!(usize::cast_from(sentinel) >= CAPACITY);
        heap.cabi_free(sentinel, 0, 2).unwrap();
        heap.cabi_free(u32::MAX, 0, 1).unwrap();
    }

    #[test]
    fn test_out_of_memory_is_reported() {
        let heap = shared();
        let whole = i32::try_from(CAPACITY - HEAP_START).unwrap();
        let offset = heap.malloc(whole, 8).unwrap();
        let err = heap.malloc(1, 1).unwrap_err();
        assert!(err.kind().is_out_of_memory());
        heap.cabi_free(offset, whole, 8).unwrap();
        assert!(heap.malloc(1, 1).is_ok());
    }

    #[test]
    fn test_bulk_copy_through_lock() {
        let heap = shared();
        let offset = heap.malloc(12, 4).unwrap();
        let at = usize::cast_from(offset);
        heap.with_heap(|h| h.write_i32s(at, &[7, 8, 9], 0, 3));
        let mut out = [0; 3];
        heap.with_heap(|h| h.read_i32s(at, &mut out, 0, 3));
        assert_eq!(out, [7, 8, 9]);
    }

    #[test]
    fn test_concurrent_callers_never_share_granules() {
        static HEAP: SharedHeap<[u8; CAPACITY]> = SharedHeap::new(BitmapHeap::zeroed());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                thread::spawn(|| {
                    let mut mine = Vec::new();
                    for round in 0..30 {
                        let size = if round % 10 == 0 { 600 } else { 24 };
                        let offset = HEAP.malloc(size, 8).unwrap();
                        mine.push((offset, size));
                    }
                    for (offset, size) in mine {
                        HEAP.cabi_free(offset, size, 8).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(HEAP.with_heap(|h| h.allocated_granules()), 0);
    }
}
