//! Big-endian primitive reading and writing for class-file bytecode.
//!
//! The [`ByteIO`] trait provides a unified interface for converting primitive values from and
//! to their big-endian byte representation. [`read_be_at`] performs bounds-checked reads with an
//! auto-advancing offset; [`write_be`] appends encoded values to a growing buffer.
//!
//! # Examples
//!
//! ```rust
//! use jreify::file::io::{read_be_at, write_be};
//!
//! let mut buffer = Vec::new();
//! write_be(&mut buffer, 0x0102_u16);
//! write_be(&mut buffer, -1_i32);
//!
//! let mut offset = 0;
//! assert_eq!(read_be_at::<u16>(&buffer, &mut offset)?, 0x0102);
//! assert_eq!(read_be_at::<i32>(&buffer, &mut offset)?, -1);
//! assert_eq!(offset, 6);
//! # Ok::<(), jreify::Error>(())
//! ```

use crate::{Error::OutOfBounds, Result};

/// Trait for primitive types that can be read from and written to big-endian byte buffers.
pub trait ByteIO: Sized + Copy {
    /// Associated type representing the byte array type for this numeric type.
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Read T from a byte buffer in big-endian
    fn from_be_bytes(bytes: Self::Bytes) -> Self;

    /// Write T to a byte buffer in big-endian
    fn to_be_bytes(self) -> Self::Bytes;
}

macro_rules! impl_byte_io {
    ($($ty:ty => $len:expr),* $(,)?) => {
        $(
            impl ByteIO for $ty {
                type Bytes = [u8; $len];

                fn from_be_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_be_bytes(bytes)
                }

                fn to_be_bytes(self) -> Self::Bytes {
                    <$ty>::to_be_bytes(self)
                }
            }
        )*
    };
}

impl_byte_io!(
    u8 => 1,
    i8 => 1,
    u16 => 2,
    i16 => 2,
    u32 => 4,
    i32 => 4,
    u64 => 8,
    i64 => 8,
    f32 => 4,
    f64 => 8,
);

/// Safely reads a value of type `T` in big-endian byte order at a specific offset.
///
/// The offset is advanced by the number of bytes read.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_be_at<T: ByteIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(OutOfBounds);
    };
    if end > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(OutOfBounds);
    };

    *offset = end;

    Ok(T::from_be_bytes(read))
}

/// Appends a value of type `T` in big-endian byte order.
pub fn write_be<T: ByteIO>(data: &mut Vec<u8>, value: T) {
    data.extend_from_slice(value.to_be_bytes().as_ref());
}

/// Overwrites a value of type `T` in big-endian byte order at `offset`.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if the value does not fit at `offset`.
pub fn write_be_at<T: ByteIO>(data: &mut [u8], offset: usize, value: T) -> Result<()> {
    let bytes = value.to_be_bytes();
    let bytes = bytes.as_ref();
    let Some(end) = offset.checked_add(bytes.len()) else {
        return Err(OutOfBounds);
    };
    if end > data.len() {
        return Err(OutOfBounds);
    }

    data[offset..end].copy_from_slice(bytes);
    Ok(())
}
