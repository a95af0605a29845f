use crate::{
    file::io::read_le_at,
    metadata::{
        tables::{read_blob, read_str, RowReadable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Flags of the `Field` table, ECMA-335 II.23.1.5
#[allow(non_snake_case)]
pub mod FieldAttributes {
    /// Mask of the access bits
    pub const FIELD_ACCESS_MASK: u16 = 0x0007;
    /// Field is static
    pub const STATIC: u16 = 0x0010;
    /// Field is only written by constructors
    pub const INIT_ONLY: u16 = 0x0020;
    /// Value is a compile time constant
    pub const LITERAL: u16 = 0x0040;
    /// Field is not serialized
    pub const NOT_SERIALIZED: u16 = 0x0080;
    /// Name is special
    pub const SPECIAL_NAME: u16 = 0x0200;
    /// Runtime checks the name
    pub const RT_SPECIAL_NAME: u16 = 0x0400;
    /// Field has a marshalling descriptor
    pub const HAS_FIELD_MARSHAL: u16 = 0x1000;
    /// Field has a `Constant` row
    pub const HAS_DEFAULT: u16 = 0x8000;
    /// Field has an RVA
    pub const HAS_FIELD_RVA: u16 = 0x0100;
}

/// A row of the `Field` table
#[derive(Clone, Debug)]
pub struct FieldRaw {
    /// Row id
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// `FieldAttributes`
    pub flags: u16,
    /// `#Strings` index of the name
    pub name: u32,
    /// `#Blob` index of the field signature
    pub signature: u32,
}

impl RowReadable for FieldRaw {
    const TABLE_ID: TableId = TableId::Field;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(FieldRaw {
            rid,
            token: Token::from_parts(Self::TABLE_ID as u8, rid),
            flags: read_le_at::<u16>(data, offset)?,
            name: read_str(data, offset, sizes)?,
            signature: read_blob(data, offset, sizes)?,
        })
    }
}
