use crate::{
    file::io::read_le_at,
    metadata::{
        tables::{read_blob, read_str, RowReadable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// A row of the `Assembly` table (at most one)
#[derive(Clone, Debug)]
pub struct AssemblyRaw {
    /// Row id
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// `AssemblyHashAlgorithm` used for the strong name
    pub hash_alg_id: u32,
    /// Major version
    pub major_version: u16,
    /// Minor version
    pub minor_version: u16,
    /// Build number
    pub build_number: u16,
    /// Revision number
    pub revision_number: u16,
    /// `AssemblyFlags`
    pub flags: u32,
    /// `#Blob` index of the full public key
    pub public_key: u32,
    /// `#Strings` index of the name
    pub name: u32,
    /// `#Strings` index of the culture
    pub culture: u32,
}

impl RowReadable for AssemblyRaw {
    const TABLE_ID: TableId = TableId::Assembly;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(AssemblyRaw {
            rid,
            token: Token::from_parts(Self::TABLE_ID as u8, rid),
            hash_alg_id: read_le_at::<u32>(data, offset)?,
            major_version: read_le_at::<u16>(data, offset)?,
            minor_version: read_le_at::<u16>(data, offset)?,
            build_number: read_le_at::<u16>(data, offset)?,
            revision_number: read_le_at::<u16>(data, offset)?,
            flags: read_le_at::<u32>(data, offset)?,
            public_key: read_blob(data, offset, sizes)?,
            name: read_str(data, offset, sizes)?,
            culture: read_str(data, offset, sizes)?,
        })
    }
}

/// A row of the `AssemblyRef` table
#[derive(Clone, Debug)]
pub struct AssemblyRefRaw {
    /// Row id
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// Major version
    pub major_version: u16,
    /// Minor version
    pub minor_version: u16,
    /// Build number
    pub build_number: u16,
    /// Revision number
    pub revision_number: u16,
    /// `AssemblyFlags`; `PUBLIC_KEY` decides whether the blob is a key or a token
    pub flags: u32,
    /// `#Blob` index of the public key or token
    pub public_key_or_token: u32,
    /// `#Strings` index of the name
    pub name: u32,
    /// `#Strings` index of the culture
    pub culture: u32,
    /// `#Blob` index of the hash value
    pub hash_value: u32,
}

impl RowReadable for AssemblyRefRaw {
    const TABLE_ID: TableId = TableId::AssemblyRef;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(AssemblyRefRaw {
            rid,
            token: Token::from_parts(Self::TABLE_ID as u8, rid),
            major_version: read_le_at::<u16>(data, offset)?,
            minor_version: read_le_at::<u16>(data, offset)?,
            build_number: read_le_at::<u16>(data, offset)?,
            revision_number: read_le_at::<u16>(data, offset)?,
            flags: read_le_at::<u32>(data, offset)?,
            public_key_or_token: read_blob(data, offset, sizes)?,
            name: read_str(data, offset, sizes)?,
            culture: read_str(data, offset, sizes)?,
            hash_value: read_blob(data, offset, sizes)?,
        })
    }
}
