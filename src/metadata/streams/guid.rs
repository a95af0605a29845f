use crate::{Error::OutOfBounds, Result};

/// The `#GUID` heap: a sequence of 16 byte GUIDs addressed by 1-based index.
pub struct Guid<'a> {
    data: &'a [u8],
}

impl<'a> Guid<'a> {
    /// Wrap the heap bytes
    ///
    /// # Errors
    /// Returns an error if the heap length is not a multiple of 16.
    pub fn from(data: &'a [u8]) -> Result<Guid<'a>> {
        if data.len() % 16 != 0 {
            return Err(malformed_error!(
                "#GUID heap length {} is not a multiple of 16",
                data.len()
            ));
        }

        Ok(Guid { data })
    }

    /// The GUID at 1-based `index`
    ///
    /// # Errors
    /// Returns [`OutOfBounds`] for index 0 or past the end of the heap.
    pub fn get(&self, index: usize) -> Result<uguid::Guid> {
        if index == 0 || index * 16 > self.data.len() {
            return Err(OutOfBounds);
        }

        let start = (index - 1) * 16;
        let mut buffer = [0u8; 16];
        buffer.copy_from_slice(&self.data[start..start + 16]);

        Ok(uguid::Guid::from_bytes(buffer))
    }
}
