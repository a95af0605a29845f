use crate::{file::parser::Parser, Result};

/// One entry of the stream directory in the metadata root
pub struct StreamHeader {
    /// Offset of the stream from the start of the metadata root
    pub offset: u32,
    /// Size of the stream in bytes
    pub size: u32,
    /// Stream name, e.g. `#~` or `#Strings`
    pub name: String,
}

impl StreamHeader {
    /// Read one header and skip the padding after its name
    ///
    /// # Errors
    /// Returns an error for truncated data or a name longer than 32 bytes.
    pub fn read(parser: &mut Parser) -> Result<StreamHeader> {
        let offset = parser.read_le::<u32>()?;
        let size = parser.read_le::<u32>()?;

        let mut name = String::with_capacity(8);
        loop {
            let name_char = parser.read_le::<u8>()?;
            if name_char == 0 {
                break;
            }

            if name.len() == 32 {
                return Err(malformed_error!("Stream header name exceeds 32 bytes"));
            }
            name.push(char::from(name_char));
        }

        // The name including its terminator is padded to a 4 byte boundary
        let consumed = name.len() + 1;
        let aligned = (consumed + 3) & !3;
        parser.advance_by(aligned - consumed)?;

        Ok(StreamHeader { offset, size, name })
    }
}
