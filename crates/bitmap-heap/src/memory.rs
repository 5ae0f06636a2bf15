//! Byte-addressed access to the managed region.
//!
//! The allocator only needs one capability from its environment: reading and
//! writing fixed-width scalars at arbitrary byte offsets. [`LinearMemory`]
//! expresses that capability over any byte buffer. Values are stored in
//! little-endian byte order, like a WebAssembly linear memory, and offsets
//! do not need to be aligned to the value width.

#[cfg(feature = "alloc")]
use alloc::{boxed::Box, vec::Vec};

use dataview::{DataView, Pod};

/// Fixed-width value that can be stored in linear memory.
pub trait Scalar: Pod + Copy {
    /// Converts a value read in little-endian byte order to native order.
    #[must_use]
    fn from_le(raw: Self) -> Self;

    /// Converts a native value to little-endian byte order for storage.
    #[must_use]
    fn to_le(self) -> Self;
}

macro_rules! impl_int_scalar {
    ($($t:ty),+) => {
        $(
            impl Scalar for $t {
                fn from_le(raw: Self) -> Self {
                    <$t>::from_le(raw)
                }

                fn to_le(self) -> Self {
                    <$t>::to_le(self)
                }
            }
        )+
    };
}

impl_int_scalar!(u8, u16, u32, u64);
impl_int_scalar!(i8, i16, i32, i64);

macro_rules! impl_float_scalar {
    ($($t:ty => $bits:ty),+) => {
        $(
            impl Scalar for $t {
                fn from_le(raw: Self) -> Self {
                    <$t>::from_bits(<$bits>::from_le(raw.to_bits()))
                }

                fn to_le(self) -> Self {
                    <$t>::from_bits(self.to_bits().to_le())
                }
            }
        )+
    };
}

impl_float_scalar!(f32 => u32, f64 => u64);

/// A flat, byte-addressed memory region.
///
/// Implementors only expose their bytes; scalar access is provided.
pub trait LinearMemory {
    fn as_bytes(&self) -> &[u8];

    fn as_bytes_mut(&mut self) -> &mut [u8];

    /// Reads the value stored at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if `offset..offset + size_of::<T>()` is outside the region.
    #[track_caller]
    fn load<T: Scalar>(&self, offset: usize) -> T {
        T::from_le(DataView::from(self.as_bytes()).read::<T>(offset))
    }

    /// Writes `value` at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if `offset..offset + size_of::<T>()` is outside the region.
    #[track_caller]
    fn store<T: Scalar>(&mut self, offset: usize, value: T) {
        DataView::from_mut(self.as_bytes_mut()).write(offset, &value.to_le());
    }
}

impl LinearMemory for [u8] {
    fn as_bytes(&self) -> &[u8] {
        self
    }

    fn as_bytes_mut(&mut self) -> &mut [u8] {
        self
    }
}

impl<const N: usize> LinearMemory for [u8; N] {
    fn as_bytes(&self) -> &[u8] {
        self
    }

    fn as_bytes_mut(&mut self) -> &mut [u8] {
        self
    }
}

impl<T> LinearMemory for &mut T
where
    T: LinearMemory + ?Sized,
{
    fn as_bytes(&self) -> &[u8] {
        (**self).as_bytes()
    }

    fn as_bytes_mut(&mut self) -> &mut [u8] {
        (**self).as_bytes_mut()
    }
}

#[cfg(feature = "alloc")]
impl LinearMemory for Vec<u8> {
    fn as_bytes(&self) -> &[u8] {
        self
    }

    fn as_bytes_mut(&mut self) -> &mut [u8] {
        self
    }
}

#[cfg(feature = "alloc")]
impl LinearMemory for Box<[u8]> {
    fn as_bytes(&self) -> &[u8] {
        self
    }

    fn as_bytes_mut(&mut self) -> &mut [u8] {
        self
    }
}
