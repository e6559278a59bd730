//! Cursor-based byte stream parser for method bytecode.
//!
//! This module provides the [`crate::file::Parser`] type, a bounds-checked cursor over a
//! method's raw code array. All multi-byte reads are big-endian as mandated by the class-file
//! format.
//!
//! # Navigation Methods
//! - [`crate::file::Parser::seek`] - Move to specific position
//! - [`crate::file::Parser::advance_by`] - Move forward by specified bytes
//! - [`crate::file::Parser::pos`] - Get current position
//! - [`crate::file::Parser::align`] - Align to byte boundaries (switch padding)
//!
//! # Examples
//!
//! ```rust
//! use jreify::file::Parser;
//!
//! // tableswitch at offset 1, padded to offset 4
//! let data = [0x00, 0xAA, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10];
//! let mut parser = Parser::new(&data);
//! parser.seek(1)?;
//! assert_eq!(parser.read_be::<u8>()?, 0xAA);
//! parser.align(4)?;
//! assert_eq!(parser.read_be::<i32>()?, 0x10);
//! # Ok::<(), jreify::Error>(())
//! ```

use crate::{
    file::io::{read_be_at, ByteIO},
    Error::OutOfBounds,
    Result,
};

/// A generic binary data parser for reading big-endian bytecode.
///
/// The parser maintains an internal position cursor and provides bounds checking to prevent
/// buffer overruns when reading malformed or truncated instruction streams.
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`crate::file::Parser`] from a byte slice.
    ///
    /// # Arguments
    /// * `data` - The byte slice to read from
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the parser has no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Check if there is more data available to parse.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Move the cursor to an absolute position.
    ///
    /// Seeking to exactly `len()` is allowed and leaves the parser exhausted.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `pos` is beyond the end of the data.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(OutOfBounds);
        }

        self.position = pos;
        Ok(())
    }

    /// Advance the cursor by `step` bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the new position would exceed the data length.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        match self.position.checked_add(step) {
            Some(end) if end <= self.data.len() => {
                self.position = end;
                Ok(())
            }
            _ => Err(OutOfBounds),
        }
    }

    /// Get the current position of the parser.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Align the cursor to the next multiple of `alignment`, measured from the start of the data.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the aligned position is beyond the data.
    pub fn align(&mut self, alignment: usize) -> Result<()> {
        let padding = (alignment - (self.position % alignment)) % alignment;
        self.advance_by(padding)
    }

    /// Peek at the byte at the current position without advancing.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the parser is exhausted.
    pub fn peek_byte(&self) -> Result<u8> {
        self.data.get(self.position).copied().ok_or(OutOfBounds)
    }

    /// Read a big-endian value of type `T` and advance past it.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if there is insufficient data.
    pub fn read_be<T: ByteIO>(&mut self) -> Result<T> {
        read_be_at::<T>(self.data, &mut self.position)
    }
}
