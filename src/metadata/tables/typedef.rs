use crate::{
    file::io::read_le_at,
    metadata::{
        tables::{
            read_index, read_str, CodedIndex, CodedIndexType, RowReadable, TableId, TableInfoRef,
        },
        token::Token,
    },
    Result,
};

/// Flags of the `TypeDef` and `ExportedType` tables, ECMA-335 II.23.1.15
#[allow(non_snake_case)]
pub mod TypeAttributes {
    /// Mask of the visibility bits
    pub const VISIBILITY_MASK: u32 = 0x0000_0007;
    /// Top-level type, not visible outside the assembly
    pub const NOT_PUBLIC: u32 = 0x0000_0000;
    /// Top-level public type
    pub const PUBLIC: u32 = 0x0000_0001;
    /// Nested, public
    pub const NESTED_PUBLIC: u32 = 0x0000_0002;
    /// Nested, private
    pub const NESTED_PRIVATE: u32 = 0x0000_0003;
    /// Nested, family
    pub const NESTED_FAMILY: u32 = 0x0000_0004;
    /// Nested, assembly
    pub const NESTED_ASSEMBLY: u32 = 0x0000_0005;
    /// Nested, family and assembly
    pub const NESTED_FAM_AND_ASSEM: u32 = 0x0000_0006;
    /// Nested, family or assembly
    pub const NESTED_FAM_OR_ASSEM: u32 = 0x0000_0007;
    /// Mask of the class semantics bit
    pub const CLASS_SEMANTICS_MASK: u32 = 0x0000_0020;
    /// Type is an interface
    pub const INTERFACE: u32 = 0x0000_0020;
    /// Type is abstract
    pub const ABSTRACT: u32 = 0x0000_0080;
    /// Type cannot be derived from
    pub const SEALED: u32 = 0x0000_0100;
    /// Name is special
    pub const SPECIAL_NAME: u32 = 0x0000_0400;
    /// Type is imported
    pub const IMPORT: u32 = 0x0000_1000;
    /// Type is serializable
    pub const SERIALIZABLE: u32 = 0x0000_2000;
    /// Type is a Windows Runtime type
    pub const WINDOWS_RUNTIME: u32 = 0x0000_4000;
    /// Type initializer may run before first static field access
    pub const BEFORE_FIELD_INIT: u32 = 0x0010_0000;
    /// `ExportedType` only, the type is forwarded to another assembly
    pub const FORWARDER: u32 = 0x0020_0000;
}

/// A row of the `TypeDef` table
///
/// `field_list` and `method_list` are the first row of a run that ends where the next type's run
/// starts (or at the end of the table).
#[derive(Clone, Debug)]
pub struct TypeDefRaw {
    /// Row id
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// Offset of the row in the table
    pub offset: usize,
    /// `TypeAttributes`
    pub flags: u32,
    /// `#Strings` index of the simple name
    pub type_name: u32,
    /// `#Strings` index of the namespace
    pub type_namespace: u32,
    /// Base type, null for interfaces and `System.Object`
    pub extends: CodedIndex,
    /// First `Field` row owned by this type
    pub field_list: u32,
    /// First `MethodDef` row owned by this type
    pub method_list: u32,
}

impl RowReadable for TypeDefRaw {
    const TABLE_ID: TableId = TableId::TypeDef;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        let offset_org = *offset;

        Ok(TypeDefRaw {
            rid,
            token: Token::from_parts(Self::TABLE_ID as u8, rid),
            offset: offset_org,
            flags: read_le_at::<u32>(data, offset)?,
            type_name: read_str(data, offset, sizes)?,
            type_namespace: read_str(data, offset, sizes)?,
            extends: CodedIndex::read(data, offset, sizes, CodedIndexType::TypeDefOrRef)?,
            field_list: read_index(data, offset, sizes, TableId::Field)?,
            method_list: read_index(data, offset, sizes, TableId::MethodDef)?,
        })
    }
}
