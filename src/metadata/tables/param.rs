use crate::{
    file::io::read_le_at,
    metadata::{
        tables::{read_str, RowReadable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Flags of the `Param` table, ECMA-335 II.23.1.13
#[allow(non_snake_case)]
pub mod ParamAttributes {
    /// Input parameter
    pub const IN: u16 = 0x0001;
    /// Output parameter
    pub const OUT: u16 = 0x0002;
    /// Optional parameter
    pub const OPTIONAL: u16 = 0x0010;
    /// Parameter has a `Constant` row
    pub const HAS_DEFAULT: u16 = 0x1000;
    /// Parameter has a marshalling descriptor
    pub const HAS_FIELD_MARSHAL: u16 = 0x2000;
}

/// A row of the `Param` table
#[derive(Clone, Debug)]
pub struct ParamRaw {
    /// Row id
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// `ParamAttributes`
    pub flags: u16,
    /// Position in the signature, 0 for the return value
    pub sequence: u16,
    /// `#Strings` index of the name
    pub name: u32,
}

impl RowReadable for ParamRaw {
    const TABLE_ID: TableId = TableId::Param;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(ParamRaw {
            rid,
            token: Token::from_parts(Self::TABLE_ID as u8, rid),
            flags: read_le_at::<u16>(data, offset)?,
            sequence: read_le_at::<u16>(data, offset)?,
            name: read_str(data, offset, sizes)?,
        })
    }
}
