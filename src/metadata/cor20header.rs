//! The CLI header (ECMA-335 II.25.3.3), the entry into managed metadata.

use crate::{file::parser::Parser, Error::OutOfBounds, Result};

/// The fields of the 72 byte CLI header the reader relies on.
pub struct Cor20Header {
    /// Size of the header in bytes, always 72
    pub cb: u32,
    /// Major runtime version required
    pub major_runtime_version: u16,
    /// Minor runtime version required
    pub minor_runtime_version: u16,
    /// RVA of the metadata root
    pub meta_data_rva: u32,
    /// Size of the metadata in bytes
    pub meta_data_size: u32,
    /// `COMIMAGE_FLAGS_*`
    pub flags: u32,
    /// Entry point token or RVA
    pub entry_point_token: u32,
    /// RVA of the strong name signature, 0 if unsigned
    pub strong_name_signature_rva: u32,
}

impl Cor20Header {
    /// Parse the header from the start of `data`
    ///
    /// # Errors
    /// Returns an error if `data` is short or the size and metadata fields are inconsistent.
    pub fn read(data: &[u8]) -> Result<Cor20Header> {
        if data.len() < 72 {
            return Err(OutOfBounds);
        }

        let mut parser = Parser::new(data);

        let cb = parser.read_le::<u32>()?;
        if cb != 72 {
            return Err(malformed_error!(
                "Invalid CLR header size: expected 72, got {}",
                cb
            ));
        }

        let major_runtime_version = parser.read_le::<u16>()?;
        let minor_runtime_version = parser.read_le::<u16>()?;

        let meta_data_rva = parser.read_le::<u32>()?;
        let meta_data_size = parser.read_le::<u32>()?;
        if meta_data_rva == 0 || meta_data_size == 0 {
            return Err(malformed_error!("CLR header carries no metadata directory"));
        }

        let flags = parser.read_le::<u32>()?;
        let entry_point_token = parser.read_le::<u32>()?;

        // Resources
        parser.advance_by(8)?;
        let strong_name_signature_rva = parser.read_le::<u32>()?;

        Ok(Cor20Header {
            cb,
            major_runtime_version,
            minor_runtime_version,
            meta_data_rva,
            meta_data_size,
            flags,
            entry_point_token,
            strong_name_signature_rva,
        })
    }
}
