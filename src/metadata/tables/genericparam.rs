use crate::{
    file::io::read_le_at,
    metadata::{
        tables::{read_index, read_str, CodedIndex, CodedIndexType, RowReadable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Flags of the `GenericParam` table, ECMA-335 II.23.1.7
#[allow(non_snake_case)]
pub mod GenericParamAttributes {
    /// Mask of the variance bits
    pub const VARIANCE_MASK: u16 = 0x0003;
    /// Covariant (`out`)
    pub const COVARIANT: u16 = 0x0001;
    /// Contravariant (`in`)
    pub const CONTRAVARIANT: u16 = 0x0002;
    /// Mask of the special constraint bits
    pub const SPECIAL_CONSTRAINT_MASK: u16 = 0x001C;
    /// `class` constraint
    pub const REFERENCE_TYPE_CONSTRAINT: u16 = 0x0004;
    /// `struct` constraint
    pub const NOT_NULLABLE_VALUE_TYPE_CONSTRAINT: u16 = 0x0008;
    /// `new()` constraint
    pub const DEFAULT_CONSTRUCTOR_CONSTRAINT: u16 = 0x0010;
    /// `allows ref struct` anti-constraint
    pub const ALLOW_BY_REF_LIKE: u16 = 0x0020;
}

/// A row of the `GenericParam` table
#[derive(Clone, Debug)]
pub struct GenericParamRaw {
    /// Row id
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// Ordinal position in the owner's parameter list
    pub number: u16,
    /// `GenericParamAttributes`
    pub flags: u16,
    /// Owning `TypeDef` or `MethodDef`
    pub owner: CodedIndex,
    /// `#Strings` index of the name
    pub name: u32,
}

impl RowReadable for GenericParamRaw {
    const TABLE_ID: TableId = TableId::GenericParam;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(GenericParamRaw {
            rid,
            token: Token::from_parts(Self::TABLE_ID as u8, rid),
            number: read_le_at::<u16>(data, offset)?,
            flags: read_le_at::<u16>(data, offset)?,
            owner: CodedIndex::read(data, offset, sizes, CodedIndexType::TypeOrMethodDef)?,
            name: read_str(data, offset, sizes)?,
        })
    }
}

/// A row of the `GenericParamConstraint` table
#[derive(Clone, Debug)]
pub struct GenericParamConstraintRaw {
    /// Row id
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// Constrained `GenericParam` row
    pub owner: u32,
    /// The constraint type
    pub constraint: CodedIndex,
}

impl RowReadable for GenericParamConstraintRaw {
    const TABLE_ID: TableId = TableId::GenericParamConstraint;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(GenericParamConstraintRaw {
            rid,
            token: Token::from_parts(Self::TABLE_ID as u8, rid),
            owner: read_index(data, offset, sizes, TableId::GenericParam)?,
            constraint: CodedIndex::read(data, offset, sizes, CodedIndexType::TypeDefOrRef)?,
        })
    }
}
