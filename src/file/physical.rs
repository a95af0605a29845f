use super::Backend;
use crate::{Error::OutOfBounds, Result};

use memmap2::Mmap;
use std::{fs, path::Path};

/// A module image mapped from disk.
///
/// The whole file is mapped at open time and the file handle is released together with the
/// mapping when this value is dropped.
#[derive(Debug)]
pub struct Physical {
    data: Mmap,
}

impl Physical {
    /// Map the file at `path` into memory
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file can not be opened or mapped.
    pub fn new(path: impl AsRef<Path>) -> Result<Physical> {
        let file = fs::File::open(path)?;

        // The mapping stays valid as long as nobody truncates the file underneath us
        let mmap = unsafe { Mmap::map(&file) }?;

        // Prefetch, so later table and heap reads do not fault back into the filesystem
        #[cfg(unix)]
        if let Err(error) = mmap.advise(memmap2::Advice::WillNeed) {
            log::trace!("madvise(WILLNEED) failed - {error}");
        }

        Ok(Physical { data: mmap })
    }
}

impl Backend for Physical {
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let Some(offset_end) = offset.checked_add(len) else {
            return Err(OutOfBounds);
        };

        if offset_end > self.data.len() {
            return Err(OutOfBounds);
        }

        Ok(&self.data[offset..offset_end])
    }

    fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}
