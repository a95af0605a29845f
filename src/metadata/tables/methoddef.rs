use crate::{
    file::io::read_le_at,
    metadata::{
        tables::{read_blob, read_index, read_str, RowReadable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Flags of the `MethodDef` table, ECMA-335 II.23.1.10
#[allow(non_snake_case)]
pub mod MethodAttributes {
    /// Mask of the access bits
    pub const MEMBER_ACCESS_MASK: u16 = 0x0007;
    /// Method is static
    pub const STATIC: u16 = 0x0010;
    /// Method cannot be overridden
    pub const FINAL: u16 = 0x0020;
    /// Method is virtual
    pub const VIRTUAL: u16 = 0x0040;
    /// Method hides by name and signature
    pub const HIDE_BY_SIG: u16 = 0x0080;
    /// Method always gets a new vtable slot
    pub const NEW_SLOT: u16 = 0x0100;
    /// Method can only be overridden where accessible
    pub const STRICT: u16 = 0x0200;
    /// Method has no implementation
    pub const ABSTRACT: u16 = 0x0400;
    /// Name is special
    pub const SPECIAL_NAME: u16 = 0x0800;
    /// Runtime checks the name
    pub const RT_SPECIAL_NAME: u16 = 0x1000;
    /// Implementation is forwarded through P/Invoke
    pub const PINVOKE_IMPL: u16 = 0x2000;
}

/// A row of the `MethodDef` table
#[derive(Clone, Debug)]
pub struct MethodDefRaw {
    /// Row id
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// RVA of the method body, 0 for abstract and extern methods
    pub rva: u32,
    /// `MethodImplAttributes`
    pub impl_flags: u16,
    /// `MethodAttributes`
    pub flags: u16,
    /// `#Strings` index of the name
    pub name: u32,
    /// `#Blob` index of the method signature
    pub signature: u32,
    /// First `Param` row owned by this method
    pub param_list: u32,
}

impl RowReadable for MethodDefRaw {
    const TABLE_ID: TableId = TableId::MethodDef;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(MethodDefRaw {
            rid,
            token: Token::from_parts(Self::TABLE_ID as u8, rid),
            rva: read_le_at::<u32>(data, offset)?,
            impl_flags: read_le_at::<u16>(data, offset)?,
            flags: read_le_at::<u16>(data, offset)?,
            name: read_str(data, offset, sizes)?,
            signature: read_blob(data, offset, sizes)?,
            param_list: read_index(data, offset, sizes, TableId::Param)?,
        })
    }
}
