use snafu::{Location, Snafu};

use crate::geometry::CAPACITY;

/// Coarse classification of allocator failures.
///
/// Boundary callers only distinguish these two outcomes; the variants of
/// [`HeapError`] carry the details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display, derive_more::IsVariant)]
pub enum ErrorKind {
    #[display("invalid argument")]
    InvalidArgument,
    #[display("out of memory")]
    OutOfMemory,
}

/// Errors returned by [`BitmapHeap`](crate::BitmapHeap) operations.
///
/// A call that returns an error has not modified the bitmap.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum HeapError {
    #[snafu(display("unsupported alignment {align}, expected 1, 2, 4 or 8"))]
    UnsupportedAlign {
        align: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("range {offset:#x}+{size} lies outside the heap region"))]
    OutOfBounds {
        offset: usize,
        size: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("offset {offset:#x} is not on a {unit}-byte boundary"))]
    Misaligned {
        offset: usize,
        unit: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("no live {size}-byte allocation at offset {offset:#x}"))]
    NotAllocated {
        offset: usize,
        size: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("no free run large enough for {size} bytes"))]
    OutOfMemory {
        size: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("linear memory holds {len} bytes, at least {CAPACITY} required"))]
    RegionTooSmall {
        len: usize,
        #[snafu(implicit)]
        location: Location,
    },
}

impl HeapError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::OutOfMemory { .. } => ErrorKind::OutOfMemory,
            Self::UnsupportedAlign { .. }
            | Self::OutOfBounds { .. }
            | Self::Misaligned { .. }
            | Self::NotAllocated { .. }
            | Self::RegionTooSmall { .. } => ErrorKind::InvalidArgument,
        }
    }
}
