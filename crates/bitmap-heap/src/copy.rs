//! Bulk copies between the managed region and ordinary buffers.
//!
//! These helpers do not consult the bitmap. Callers are responsible for only
//! touching memory they have allocated.

use crate::{
    BitmapHeap,
    memory::{LinearMemory, Scalar},
};

impl<M> BitmapHeap<M>
where
    M: LinearMemory,
{
    /// Fills `dst` with consecutive values starting at byte `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the source range lies outside the managed region.
    #[track_caller]
    pub fn read_slice<T: Scalar>(&self, offset: usize, dst: &mut [T]) {
        for (i, value) in dst.iter_mut().enumerate() {
            *value = self.memory().load(offset + i * size_of::<T>());
        }
    }

    /// Stores `src` as consecutive values starting at byte `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the destination range lies outside the managed region.
    #[track_caller]
    pub fn write_slice<T: Scalar>(&mut self, offset: usize, src: &[T]) {
        let memory = self.memory_mut();
        for (i, value) in src.iter().enumerate() {
            memory.store(offset + i * size_of::<T>(), *value);
        }
    }
}

macro_rules! typed_copies {
    ($($t:ty => $read:ident, $write:ident;)+) => {
        impl<M> BitmapHeap<M>
        where
            M: LinearMemory,
        {
            $(
                #[doc = concat!(
                    "Copies `length` `", stringify!($t), "` values at byte `offset` into ",
                    "`buf[start..start + length]`.\n\n",
                    "# Panics\n\n",
                    "Panics if either range is out of bounds."
                )]
                #[track_caller]
                pub fn $read(&self, offset: usize, buf: &mut [$t], start: usize, length: usize) {
                    self.read_slice(offset, &mut buf[start..start + length]);
                }

                #[doc = concat!(
                    "Copies `buf[start..start + length]` to consecutive `", stringify!($t),
                    "` values at byte `offset`.\n\n",
                    "# Panics\n\n",
                    "Panics if either range is out of bounds."
                )]
                #[track_caller]
                pub fn $write(&mut self, offset: usize, buf: &[$t], start: usize, length: usize) {
                    self.write_slice(offset, &buf[start..start + length]);
                }
            )+
        }
    };
}

typed_copies! {
    u8 => read_bytes, write_bytes;
    i16 => read_i16s, write_i16s;
    i32 => read_i32s, write_i32s;
    i64 => read_i64s, write_i64s;
    f32 => read_f32s, write_f32s;
    f64 => read_f64s, write_f64s;
}
