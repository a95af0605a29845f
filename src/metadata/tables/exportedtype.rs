use crate::{
    file::io::read_le_at,
    metadata::{
        tables::{read_str, CodedIndex, CodedIndexType, RowReadable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// A row of the `ExportedType` table
///
/// Type forwarders point `implementation` at the `AssemblyRef` now defining the type; types
/// nested in a forwarded type point at their enclosing `ExportedType` row.
#[derive(Clone, Debug)]
pub struct ExportedTypeRaw {
    /// Row id
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// `TypeAttributes`, `0x0020_0000` marks a forwarder
    pub flags: u32,
    /// Hint for the `TypeDef` row in the target module
    pub type_def_id: u32,
    /// `#Strings` index of the simple name
    pub type_name: u32,
    /// `#Strings` index of the namespace
    pub type_namespace: u32,
    /// `File`, `AssemblyRef` or enclosing `ExportedType`
    pub implementation: CodedIndex,
}

impl RowReadable for ExportedTypeRaw {
    const TABLE_ID: TableId = TableId::ExportedType;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(ExportedTypeRaw {
            rid,
            token: Token::from_parts(Self::TABLE_ID as u8, rid),
            flags: read_le_at::<u32>(data, offset)?,
            type_def_id: read_le_at::<u32>(data, offset)?,
            type_name: read_str(data, offset, sizes)?,
            type_namespace: read_str(data, offset, sizes)?,
            implementation: CodedIndex::read(data, offset, sizes, CodedIndexType::Implementation)?,
        })
    }
}
