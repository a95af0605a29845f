use widestring::U16String;

use crate::{file::parser::Parser, Error::OutOfBounds, Result};

/// The `#US` heap: length-prefixed UTF-16LE literals addressed by byte offset.
///
/// Each entry is a compressed byte count, the UTF-16 code units and a trailing flag byte that
/// marks strings needing special handling. The flag is not part of the decoded value.
pub struct UserStrings<'a> {
    data: &'a [u8],
}

impl<'a> UserStrings<'a> {
    /// Wrap the heap bytes
    ///
    /// # Errors
    /// Returns an error if a non-empty heap does not start with the empty entry.
    pub fn from(data: &'a [u8]) -> Result<UserStrings<'a>> {
        if !data.is_empty() && data[0] != 0 {
            return Err(malformed_error!("#US heap does not start with a NUL byte"));
        }

        Ok(UserStrings { data })
    }

    /// The literal at byte offset `index`
    ///
    /// Unpaired surrogates are replaced with U+FFFD.
    ///
    /// # Errors
    /// Returns an error if the entry exceeds the heap or has an odd payload length.
    pub fn get(&self, index: usize) -> Result<String> {
        if index == 0 {
            return Ok(String::new());
        }

        if index >= self.data.len() {
            return Err(OutOfBounds);
        }

        let mut parser = Parser::new(&self.data[index..]);
        let length = parser.read_compressed_uint()? as usize;
        if length == 0 {
            return Ok(String::new());
        }

        let bytes = parser.read_bytes(length)?;
        let payload = &bytes[..length - 1];
        if payload.len() % 2 != 0 {
            return Err(malformed_error!(
                "Invalid user string length at index - {}",
                index
            ));
        }

        let units: Vec<u16> = payload
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        Ok(U16String::from_vec(units).to_string_lossy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let data = [
            0x00,
            0x0B, 0x48, 0x00, 0x65, 0x00, 0x6c, 0x00, 0x6c, 0x00, 0x6f, 0x00, 0x00,
            0x01, 0x00,
        ];

        let strings = UserStrings::from(&data).unwrap();
        assert_eq!(strings.get(1).unwrap(), "Hello");
        assert_eq!(strings.get(13).unwrap(), "");
        assert_eq!(strings.get(0).unwrap(), "");
    }

    #[test]
    fn invalid() {
        let data = [0x00, 0x04, 0x48, 0x00, 0x65, 0x00];
        let strings = UserStrings::from(&data).unwrap();
        assert!(strings.get(1).is_err());
        assert!(matches!(strings.get(9), Err(OutOfBounds)));
    }
}
