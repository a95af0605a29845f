use crate::{
    metadata::tables::{read_index, RowReadable, TableId, TableInfoRef},
    Result,
};

/// A row of the `NestedClass` table
#[derive(Clone, Debug)]
pub struct NestedClassRaw {
    /// Row id
    pub rid: u32,
    /// The nested `TypeDef` row
    pub nested_class: u32,
    /// The enclosing `TypeDef` row
    pub enclosing_class: u32,
}

impl RowReadable for NestedClassRaw {
    const TABLE_ID: TableId = TableId::NestedClass;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(NestedClassRaw {
            rid,
            nested_class: read_index(data, offset, sizes, TableId::TypeDef)?,
            enclosing_class: read_index(data, offset, sizes, TableId::TypeDef)?,
        })
    }
}
