use crate::{
    file::io::read_le_at,
    metadata::{
        tables::{read_blob, read_index, read_str, RowReadable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// A row of the `PropertyMap` table, linking a type to its first property
#[derive(Clone, Debug)]
pub struct PropertyMapRaw {
    /// Row id
    pub rid: u32,
    /// Owning `TypeDef` row
    pub parent: u32,
    /// First `Property` row owned by `parent`
    pub property_list: u32,
}

impl RowReadable for PropertyMapRaw {
    const TABLE_ID: TableId = TableId::PropertyMap;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(PropertyMapRaw {
            rid,
            parent: read_index(data, offset, sizes, TableId::TypeDef)?,
            property_list: read_index(data, offset, sizes, TableId::Property)?,
        })
    }
}

/// A row of the `Property` table
#[derive(Clone, Debug)]
pub struct PropertyRaw {
    /// Row id
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// `PropertyAttributes`
    pub flags: u16,
    /// `#Strings` index of the name
    pub name: u32,
    /// `#Blob` index of the property signature
    pub signature: u32,
}

impl RowReadable for PropertyRaw {
    const TABLE_ID: TableId = TableId::Property;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(PropertyRaw {
            rid,
            token: Token::from_parts(Self::TABLE_ID as u8, rid),
            flags: read_le_at::<u16>(data, offset)?,
            name: read_str(data, offset, sizes)?,
            signature: read_blob(data, offset, sizes)?,
        })
    }
}
