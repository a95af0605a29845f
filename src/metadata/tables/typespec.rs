use crate::{
    metadata::{
        tables::{read_blob, RowReadable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// A row of the `TypeSpec` table
#[derive(Clone, Debug)]
pub struct TypeSpecRaw {
    /// Row id
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// `#Blob` index of the type signature
    pub signature: u32,
}

impl RowReadable for TypeSpecRaw {
    const TABLE_ID: TableId = TableId::TypeSpec;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(TypeSpecRaw {
            rid,
            token: Token::from_parts(Self::TABLE_ID as u8, rid),
            signature: read_blob(data, offset, sizes)?,
        })
    }
}
