use crate::{
    metadata::{
        tables::{read_blob, read_str, CodedIndex, CodedIndexType, RowReadable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// A row of the `MemberRef` table
#[derive(Clone, Debug)]
pub struct MemberRefRaw {
    /// Row id
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// Declaring type, module reference or vararg method definition
    pub class: CodedIndex,
    /// `#Strings` index of the name
    pub name: u32,
    /// `#Blob` index of the method or field signature
    pub signature: u32,
}

impl RowReadable for MemberRefRaw {
    const TABLE_ID: TableId = TableId::MemberRef;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(MemberRefRaw {
            rid,
            token: Token::from_parts(Self::TABLE_ID as u8, rid),
            class: CodedIndex::read(data, offset, sizes, CodedIndexType::MemberRefParent)?,
            name: read_str(data, offset, sizes)?,
            signature: read_blob(data, offset, sizes)?,
        })
    }
}
