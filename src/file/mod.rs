//! Access to the raw bytes of a PE image.
//!
//! [`File`] owns the image bytes (memory-mapped from disk, or an owned buffer) together with the
//! `goblin` view of its PE headers, and answers the two questions the metadata layer has: where
//! the CLI header lives, and which file offset an RVA maps to.

pub mod io;
pub mod parser;

mod memory;
mod physical;

use std::path::Path;

use goblin::pe::PE;
use memory::Memory;
use ouroboros::self_referencing;
use physical::Physical;

use crate::{
    Error::{GoblinErr, OutOfBounds},
    Result,
};

/// Source of the image bytes.
pub trait Backend: Send + Sync {
    /// Bounds-checked sub slice
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range exceeds the data.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]>;

    /// The complete image
    fn data(&self) -> &[u8];

    /// Image length in bytes
    fn len(&self) -> usize;
}

/// A parsed PE image carrying a CLI header.
#[self_referencing]
pub struct File {
    data: Box<dyn Backend>,
    #[borrows(data)]
    #[not_covariant]
    pe: PE<'this>,
}

impl File {
    /// Map and parse the file at `file`
    ///
    /// # Errors
    /// I/O errors, PE parse errors, or a PE without CLI header.
    pub fn from_file(file: &Path) -> Result<File> {
        let input = Physical::new(file)?;

        Self::load(input)
    }

    /// Parse an image from an owned buffer
    ///
    /// # Errors
    /// PE parse errors, or a PE without CLI header.
    pub fn from_mem(data: Vec<u8>) -> Result<File> {
        let input = Memory::new(data);

        Self::load(input)
    }

    fn load<T: Backend + 'static>(data: T) -> Result<File> {
        if data.len() == 0 {
            return Err(malformed_error!("Provided input was empty"));
        }

        let data = Box::new(data);

        File::try_new(data, |data| {
            let pe = PE::parse(data.data()).map_err(GoblinErr)?;

            match pe.header.optional_header {
                Some(optional_header) => {
                    if optional_header
                        .data_directories
                        .get_clr_runtime_header()
                        .is_none()
                    {
                        Err(malformed_error!(
                            "File does not have a CLR runtime header directory"
                        ))
                    } else {
                        Ok(pe)
                    }
                }
                None => Err(malformed_error!("File does not have an OptionalHeader")),
            }
        })
    }

    /// Image length in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.with_data(|data| data.len())
    }

    /// True for an empty image, which `load` never produces
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The complete image
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.borrow_data().data()
    }

    /// Bounds-checked sub slice of the image
    ///
    /// # Errors
    /// Returns [`OutOfBounds`] if the range exceeds the image.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.borrow_data().data_slice(offset, len)
    }

    /// RVA and size of the CLI header
    ///
    /// # Errors
    /// Returns an error if the CLR data directory is missing.
    pub fn clr(&self) -> Result<(usize, usize)> {
        self.with_pe(|pe| {
            let clr_dir = pe
                .header
                .optional_header
                .and_then(|optional_header| {
                    optional_header
                        .data_directories
                        .get_clr_runtime_header()
                        .as_ref()
                        .map(|dir| (dir.virtual_address as usize, dir.size as usize))
                })
                .ok_or_else(|| malformed_error!("File does not have a CLR runtime header"))?;

            Ok(clr_dir)
        })
    }

    /// Translate an RVA into a file offset using the section table
    ///
    /// # Errors
    /// Returns an error if no section contains `rva`.
    pub fn rva_to_offset(&self, rva: usize) -> Result<usize> {
        let rva_u32 =
            u32::try_from(rva).map_err(|_| malformed_error!("RVA too large to fit in u32: {}", rva))?;

        self.with_pe(|pe| {
            for section in &pe.sections {
                let Some(section_max) = section.virtual_address.checked_add(section.virtual_size)
                else {
                    return Err(malformed_error!(
                        "Section malformed, causing integer overflow - {} + {}",
                        section.virtual_address,
                        section.virtual_size
                    ));
                };

                if section.virtual_address <= rva_u32 && rva_u32 < section_max {
                    return Ok((rva_u32 - section.virtual_address) as usize
                        + section.pointer_to_raw_data as usize);
                }
            }

            Err(malformed_error!(
                "RVA could not be converted to offset - {}",
                rva
            ))
        })
    }

    /// Slice of `size` bytes starting at `rva`
    ///
    /// # Errors
    /// Returns an error if the RVA is unmapped or the range exceeds the image.
    pub fn rva_slice(&self, rva: usize, size: usize) -> Result<&[u8]> {
        let offset = self.rva_to_offset(rva)?;
        self.data_slice(offset, size).map_err(|_| OutOfBounds)
    }
}
