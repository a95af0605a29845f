use crate::{
    metadata::{
        tables::{read_index, CodedIndex, CodedIndexType, RowReadable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// A row of the `InterfaceImpl` table
#[derive(Clone, Debug)]
pub struct InterfaceImplRaw {
    /// Row id
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// Implementing `TypeDef` row
    pub class: u32,
    /// The implemented interface
    pub interface: CodedIndex,
}

impl RowReadable for InterfaceImplRaw {
    const TABLE_ID: TableId = TableId::InterfaceImpl;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(InterfaceImplRaw {
            rid,
            token: Token::from_parts(Self::TABLE_ID as u8, rid),
            class: read_index(data, offset, sizes, TableId::TypeDef)?,
            interface: CodedIndex::read(data, offset, sizes, CodedIndexType::TypeDefOrRef)?,
        })
    }
}
