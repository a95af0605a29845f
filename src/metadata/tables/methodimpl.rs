use crate::{
    metadata::{
        tables::{read_index, CodedIndex, CodedIndexType, RowReadable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// A row of the `MethodImpl` table: an explicit override record
#[derive(Clone, Debug)]
pub struct MethodImplRaw {
    /// Row id
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// `TypeDef` row the override lives in
    pub class: u32,
    /// The implementing method
    pub method_body: CodedIndex,
    /// The overridden declaration
    pub method_declaration: CodedIndex,
}

impl RowReadable for MethodImplRaw {
    const TABLE_ID: TableId = TableId::MethodImpl;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(MethodImplRaw {
            rid,
            token: Token::from_parts(Self::TABLE_ID as u8, rid),
            class: read_index(data, offset, sizes, TableId::TypeDef)?,
            method_body: CodedIndex::read(data, offset, sizes, CodedIndexType::MethodDefOrRef)?,
            method_declaration: CodedIndex::read(data, offset, sizes, CodedIndexType::MethodDefOrRef)?,
        })
    }
}
