//! The metadata root (ECMA-335 II.24.2.1) and its stream directory.

use crate::{
    file::parser::Parser,
    metadata::streams::StreamHeader,
    Error::OutOfBounds,
    Result,
};

/// Magic signature of the metadata root, `BSJB`
pub const CIL_HEADER_MAGIC: u32 = 0x424A_5342;

/// The metadata root
pub struct Root {
    /// Major version, 1
    pub major_version: u16,
    /// Minor version, 1
    pub minor_version: u16,
    /// Runtime version string, e.g. `v4.0.30319`
    pub version: String,
    /// One header per stream
    pub stream_headers: Vec<StreamHeader>,
}

impl Root {
    /// Parse the root from the start of the metadata block
    ///
    /// # Errors
    /// Returns an error for a wrong signature, truncated data or stream headers pointing outside
    /// of the metadata block.
    pub fn read(data: &[u8]) -> Result<Root> {
        if data.len() < 20 {
            return Err(OutOfBounds);
        }

        let mut parser = Parser::new(data);

        let signature = parser.read_le::<u32>()?;
        if signature != CIL_HEADER_MAGIC {
            return Err(malformed_error!(
                "CIL_HEADER_MAGIC does not match - {:#x}",
                signature
            ));
        }

        let major_version = parser.read_le::<u16>()?;
        let minor_version = parser.read_le::<u16>()?;
        let _reserved = parser.read_le::<u32>()?;

        let version_length = parser.read_le::<u32>()? as usize;
        let version_bytes = parser.read_bytes(version_length)?;
        let version = String::from_utf8_lossy(version_bytes)
            .trim_end_matches('\0')
            .to_string();

        let _flags = parser.read_le::<u16>()?;
        let stream_count = parser.read_le::<u16>()?;
        if stream_count == 0 {
            return Err(malformed_error!("Metadata root declares no streams"));
        }

        let mut stream_headers = Vec::with_capacity(usize::from(stream_count));
        for _ in 0..stream_count {
            let header = StreamHeader::read(&mut parser)?;

            match header.offset.checked_add(header.size) {
                Some(end) if end as usize <= data.len() => {}
                Some(_) => return Err(OutOfBounds),
                None => {
                    return Err(malformed_error!(
                        "Stream offset and size cause integer overflow - {} + {}",
                        header.offset,
                        header.size
                    ))
                }
            }

            if stream_headers
                .iter()
                .any(|existing: &StreamHeader| existing.name == header.name)
            {
                return Err(malformed_error!("Duplicate stream - {}", header.name));
            }

            stream_headers.push(header);
        }

        Ok(Root {
            major_version,
            minor_version,
            version,
            stream_headers,
        })
    }
}
