use std::ffi::CStr;

use crate::{Error::OutOfBounds, Result};

/// The `#Strings` heap: NUL terminated UTF-8 identifiers, addressed by byte offset.
///
/// Offset 0 is always the empty string, including for images that omit the stream.
pub struct Strings<'a> {
    data: &'a [u8],
}

impl<'a> Strings<'a> {
    /// Wrap the heap bytes
    ///
    /// # Errors
    /// Returns an error if a non-empty heap does not start with the empty string.
    pub fn from(data: &'a [u8]) -> Result<Strings<'a>> {
        if !data.is_empty() && data[0] != 0 {
            return Err(malformed_error!("#Strings heap does not start with a NUL byte"));
        }

        Ok(Strings { data })
    }

    /// The string at byte offset `index`
    ///
    /// # Errors
    /// Returns an error if the offset is outside the heap or the bytes are not valid UTF-8.
    pub fn get(&self, index: usize) -> Result<&'a str> {
        if index == 0 {
            return Ok("");
        }

        if index >= self.data.len() {
            return Err(OutOfBounds);
        }

        CStr::from_bytes_until_nul(&self.data[index..])
            .ok()
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| malformed_error!("Invalid string at index - {}", index))
    }
}
