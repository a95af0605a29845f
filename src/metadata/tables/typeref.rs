use crate::{
    metadata::{
        tables::{read_str, CodedIndex, CodedIndexType, RowReadable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// A row of the `TypeRef` table
#[derive(Clone, Debug)]
pub struct TypeRefRaw {
    /// Row id
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// `Module`, `ModuleRef`, `AssemblyRef` or (for nested types) `TypeRef`
    pub resolution_scope: CodedIndex,
    /// `#Strings` index of the simple name
    pub type_name: u32,
    /// `#Strings` index of the namespace
    pub type_namespace: u32,
}

impl RowReadable for TypeRefRaw {
    const TABLE_ID: TableId = TableId::TypeRef;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(TypeRefRaw {
            rid,
            token: Token::from_parts(Self::TABLE_ID as u8, rid),
            resolution_scope: CodedIndex::read(data, offset, sizes, CodedIndexType::ResolutionScope)?,
            type_name: read_str(data, offset, sizes)?,
            type_namespace: read_str(data, offset, sizes)?,
        })
    }
}
