//! A forward-only cursor over metadata blobs.
//!
//! Signatures, custom attribute values and constant blobs are all read through [`Parser`], which
//! understands the compressed integer forms from ECMA-335 II.23.2.

use crate::{
    file::io::{read_le_at, CilIO},
    metadata::token::Token,
    Error::OutOfBounds,
    Result,
};

/// Sequential reader over a byte slice.
pub struct Parser<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new parser positioned at the start of `data`
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Total length of the underlying slice
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if the underlying slice is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// True while unread bytes remain
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Current read position
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Bytes left to read
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Skip `step` bytes
    ///
    /// # Errors
    /// Returns [`OutOfBounds`] when skipping past the end.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        if step > self.remaining() {
            return Err(OutOfBounds);
        }

        self.position += step;
        Ok(())
    }

    /// Look at the next byte without consuming it
    ///
    /// # Errors
    /// Returns [`OutOfBounds`] at the end of the data.
    pub fn peek_byte(&self) -> Result<u8> {
        self.data.get(self.position).copied().ok_or(OutOfBounds)
    }

    /// Read a little-endian value and advance
    ///
    /// # Errors
    /// Returns [`OutOfBounds`] if the value is truncated.
    pub fn read_le<T: CilIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
    }

    /// Read `length` raw bytes
    ///
    /// # Errors
    /// Returns [`OutOfBounds`] if fewer than `length` bytes remain.
    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        if length > self.remaining() {
            return Err(OutOfBounds);
        }

        let bytes = &self.data[self.position..self.position + length];
        self.position += length;
        Ok(bytes)
    }

    /// Read a compressed unsigned integer (1, 2 or 4 bytes)
    ///
    /// # Errors
    /// Returns an error for an invalid lead byte or truncated data.
    pub fn read_compressed_uint(&mut self) -> Result<u32> {
        let first_byte = self.read_le::<u8>()?;

        // 0xxxxxxx
        if (first_byte & 0x80) == 0 {
            return Ok(u32::from(first_byte));
        }

        // 10xxxxxx xxxxxxxx
        if (first_byte & 0xC0) == 0x80 {
            let second_byte = self.read_le::<u8>()?;
            return Ok(((u32::from(first_byte) & 0x3F) << 8) | u32::from(second_byte));
        }

        // 110xxxxx xxxxxxxx xxxxxxxx xxxxxxxx
        if (first_byte & 0xE0) == 0xC0 {
            let rest = self.read_bytes(3)?;
            return Ok(((u32::from(first_byte) & 0x1F) << 24)
                | (u32::from(rest[0]) << 16)
                | (u32::from(rest[1]) << 8)
                | u32::from(rest[2]));
        }

        Err(malformed_error!("Invalid compressed uint - {}", first_byte))
    }

    /// Read a compressed signed integer
    ///
    /// The value is rotated: bit 0 carries the sign, the width of the encoding decides how many
    /// bits the sign extends into.
    ///
    /// # Errors
    /// Returns an error for an invalid lead byte or truncated data.
    pub fn read_compressed_int(&mut self) -> Result<i32> {
        let start = self.position;
        let unsigned = self.read_compressed_uint()?;
        let width = self.position - start;

        let magnitude = unsigned >> 1;
        if unsigned & 1 == 0 {
            #[allow(clippy::cast_possible_wrap)]
            return Ok(magnitude as i32);
        }

        let sign_extension: u32 = match width {
            1 => 0xFFFF_FFC0,
            2 => 0xFFFF_E000,
            _ => 0xF000_0000,
        };

        #[allow(clippy::cast_possible_wrap)]
        Ok((magnitude | sign_extension) as i32)
    }

    /// Read a compressed `TypeDefOrRefOrSpecEncoded` token
    ///
    /// # Errors
    /// Returns an error if the tag selects no valid table.
    pub fn read_compressed_token(&mut self) -> Result<Token> {
        let compressed_token = self.read_compressed_uint()?;

        let table: u32 = match compressed_token & 0x3 {
            0x0 => 0x0200_0000,
            0x1 => 0x0100_0000,
            0x2 => 0x1B00_0000,
            _ => {
                return Err(malformed_error!(
                    "Invalid compressed token - {}",
                    compressed_token
                ))
            }
        };

        Ok(Token::new(table | (compressed_token >> 2)))
    }

    /// Read a `SerString`: a compressed length followed by UTF-8 bytes, or `0xFF` for null
    ///
    /// # Errors
    /// Returns an error for truncated or non UTF-8 data.
    pub fn read_ser_string(&mut self) -> Result<Option<String>> {
        if self.peek_byte()? == 0xFF {
            self.position += 1;
            return Ok(None);
        }

        let length = self.read_compressed_uint()? as usize;
        let start = self.position;
        let bytes = self.read_bytes(length)?;

        match std::str::from_utf8(bytes) {
            Ok(value) => Ok(Some(value.to_string())),
            Err(_) => Err(malformed_error!(
                "Invalid UTF-8 string at offset {}-{}",
                start,
                start + length
            )),
        }
    }
}
