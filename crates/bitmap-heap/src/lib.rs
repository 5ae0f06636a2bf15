//! Bitmap-tracked heap for a fixed-size linear memory region.
//!
//! The allocator hands out buffers that never move: callers on the far side
//! of a foreign-call boundary ask for a buffer, receive its byte offset in
//! the region, and must release it explicitly with the same size and
//! alignment. It is intentionally simple, trading packing efficiency for a
//! tiny, fully reconstructible state.
//!
//! # Region layout
//!
//! The region is [`CAPACITY`] bytes long (65 pages of [`PAGE_BYTES`]). The
//! first page holds the bitmap, 64 little-endian `u64` words; the rest is
//! the heap, 4096 granules of [`GRANULE_BYTES`]. Bit `j` of word `i` is set
//! iff granule `i * 64 + j` is allocated, so each word describes exactly
//! one heap page.
//!
//! # Allocation strategies
//!
//! | Request size | Unit | Search |
//! |--------------|------|--------|
//! | `< PAGE_BYTES` | granule | first run of free bits inside one word |
//! | `>= PAGE_BYTES` | page | first run of all-zero words |
//!
//! Small runs never straddle two words. Large allocations set their words
//! to all ones.
//!
//! There is no side table of live allocations. [`BitmapHeap::release`]
//! recomputes the bit window from `(offset, size)` and refuses to clear it
//! unless every bit is set, which catches double frees and size mismatches.
//!
//! # Resizing
//!
//! [`BitmapHeap::allocate_or_resize`] releases the old allocation and then
//! allocates a new one. Contents are not copied.
//!
//! # Usage
//!
//! ```rust
//! use bitmap_heap::{BitmapHeap, ErrorKind, PAGE_BYTES};
//!
//! let mut heap = BitmapHeap::zeroed();
//!
//! let small = heap.allocate(4, 100).unwrap();
//! let large = heap.allocate(8, 3 * PAGE_BYTES).unwrap();
//! assert_eq!(heap.bitmap_word(1), Some(u64::MAX));
//!
//! heap.write_bytes(small, b"payload", 0, 7);
//!
//! heap.release(large, 3 * PAGE_BYTES, 8).unwrap();
//! let err = heap.release(large, 3 * PAGE_BYTES, 8).unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::InvalidArgument);
//! # heap.release(small, 100, 4).unwrap();
//! ```
//!
//! # Thread Safety
//!
//! [`BitmapHeap`] performs no locking. Every mutating operation takes
//! `&mut self`; callers that share a heap must wrap it in a lock.

#![no_std]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

#[cfg(feature = "alloc")]
extern crate alloc;

mod bitmap;
mod copy;
mod error;
pub mod geometry;
mod heap;
mod large;
pub mod memory;
mod small;
#[cfg(test)]
mod testing;

pub use self::{
    error::{ErrorKind, HeapError},
    geometry::{Align, CAPACITY, GRANULE_BYTES, HEAP_START, PAGE_BYTES, SizeClass},
    heap::BitmapHeap,
    memory::{LinearMemory, Scalar},
};
