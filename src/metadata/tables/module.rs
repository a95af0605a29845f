use crate::{
    file::io::read_le_at,
    metadata::{
        tables::{read_guid, read_str, RowReadable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// A row of the `Module` table (always exactly one)
#[derive(Clone, Debug)]
pub struct ModuleRaw {
    /// Row id
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// Offset of the row in the table
    pub offset: usize,
    /// Reserved, zero
    pub generation: u16,
    /// `#Strings` index of the module name
    pub name: u32,
    /// `#GUID` index of the module version id
    pub mvid: u32,
}

impl RowReadable for ModuleRaw {
    const TABLE_ID: TableId = TableId::Module;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        let offset_org = *offset;

        let generation = read_le_at::<u16>(data, offset)?;
        let name = read_str(data, offset, sizes)?;
        let mvid = read_guid(data, offset, sizes)?;
        // EncId, EncBaseId
        read_guid(data, offset, sizes)?;
        read_guid(data, offset, sizes)?;

        Ok(ModuleRaw {
            rid,
            token: Token::from_parts(Self::TABLE_ID as u8, rid),
            offset: offset_org,
            generation,
            name,
            mvid,
        })
    }
}

/// A row of the `ModuleRef` table
#[derive(Clone, Debug)]
pub struct ModuleRefRaw {
    /// Row id
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// `#Strings` index of the referenced module's file name
    pub name: u32,
}

impl RowReadable for ModuleRefRaw {
    const TABLE_ID: TableId = TableId::ModuleRef;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(ModuleRefRaw {
            rid,
            token: Token::from_parts(Self::TABLE_ID as u8, rid),
            name: read_str(data, offset, sizes)?,
        })
    }
}
