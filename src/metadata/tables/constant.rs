use crate::{
    file::io::read_le_at,
    metadata::{
        tables::{read_blob, CodedIndex, CodedIndexType, RowReadable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// A row of the `Constant` table
#[derive(Clone, Debug)]
pub struct ConstantRaw {
    /// Row id
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// `ELEMENT_TYPE_*` code of the value
    pub base: u8,
    /// Owning field, parameter or property
    pub parent: CodedIndex,
    /// `#Blob` index of the value bytes
    pub value: u32,
}

impl RowReadable for ConstantRaw {
    const TABLE_ID: TableId = TableId::Constant;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        let base = read_le_at::<u8>(data, offset)?;
        // padding
        read_le_at::<u8>(data, offset)?;

        Ok(ConstantRaw {
            rid,
            token: Token::from_parts(Self::TABLE_ID as u8, rid),
            base,
            parent: CodedIndex::read(data, offset, sizes, CodedIndexType::HasConstant)?,
            value: read_blob(data, offset, sizes)?,
        })
    }
}
