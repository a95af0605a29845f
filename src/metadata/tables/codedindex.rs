use strum::{EnumCount, EnumIter};

use crate::{
    file::io::read_le_at,
    metadata::{
        tables::{TableId, TableInfoRef},
        token::Token,
    },
    Error::OutOfBounds,
    Result,
};

/// The coded index kinds of ECMA-335 II.24.2.6.
///
/// A coded index stores a table tag in its low bits and a row number in the remaining bits.
#[derive(Debug, Hash, Eq, PartialEq, Clone, Copy, EnumIter, EnumCount)]
#[repr(usize)]
pub enum CodedIndexType {
    /// `TypeDef`, `TypeRef` or `TypeSpec`
    TypeDefOrRef,
    /// `Field`, `Param` or `Property`
    HasConstant,
    /// Anything that can carry a custom attribute
    HasCustomAttribute,
    /// `Field` or `Param`
    HasFieldMarshal,
    /// `TypeDef`, `MethodDef` or `Assembly`
    HasDeclSecurity,
    /// Parent of a `MemberRef`
    MemberRefParent,
    /// `Event` or `Property`
    HasSemantics,
    /// `MethodDef` or `MemberRef`
    MethodDefOrRef,
    /// `Field` or `MethodDef`
    MemberForwarded,
    /// `File`, `AssemblyRef` or `ExportedType`
    Implementation,
    /// Constructor of a custom attribute
    CustomAttributeType,
    /// Scope a `TypeRef` is resolved in
    ResolutionScope,
    /// Owner of a generic parameter
    TypeOrMethodDef,
}

impl CodedIndexType {
    /// Tables addressed by this kind, indexed by tag.
    ///
    /// `CustomAttributeType` reserves tags 0, 1 and 4; they are `None` here.
    #[must_use]
    pub fn tags(&self) -> &'static [Option<TableId>] {
        match self {
            CodedIndexType::TypeDefOrRef => &[
                Some(TableId::TypeDef),
                Some(TableId::TypeRef),
                Some(TableId::TypeSpec),
            ],
            CodedIndexType::HasConstant => &[
                Some(TableId::Field),
                Some(TableId::Param),
                Some(TableId::Property),
            ],
            CodedIndexType::HasCustomAttribute => &[
                Some(TableId::MethodDef),
                Some(TableId::Field),
                Some(TableId::TypeRef),
                Some(TableId::TypeDef),
                Some(TableId::Param),
                Some(TableId::InterfaceImpl),
                Some(TableId::MemberRef),
                Some(TableId::Module),
                Some(TableId::DeclSecurity),
                Some(TableId::Property),
                Some(TableId::Event),
                Some(TableId::StandAloneSig),
                Some(TableId::ModuleRef),
                Some(TableId::TypeSpec),
                Some(TableId::Assembly),
                Some(TableId::AssemblyRef),
                Some(TableId::File),
                Some(TableId::ExportedType),
                Some(TableId::ManifestResource),
                Some(TableId::GenericParam),
                Some(TableId::GenericParamConstraint),
                Some(TableId::MethodSpec),
            ],
            CodedIndexType::HasFieldMarshal => &[Some(TableId::Field), Some(TableId::Param)],
            CodedIndexType::HasDeclSecurity => &[
                Some(TableId::TypeDef),
                Some(TableId::MethodDef),
                Some(TableId::Assembly),
            ],
            CodedIndexType::MemberRefParent => &[
                Some(TableId::TypeDef),
                Some(TableId::TypeRef),
                Some(TableId::ModuleRef),
                Some(TableId::MethodDef),
                Some(TableId::TypeSpec),
            ],
            CodedIndexType::HasSemantics => &[Some(TableId::Event), Some(TableId::Property)],
            CodedIndexType::MethodDefOrRef => {
                &[Some(TableId::MethodDef), Some(TableId::MemberRef)]
            }
            CodedIndexType::MemberForwarded => &[Some(TableId::Field), Some(TableId::MethodDef)],
            CodedIndexType::Implementation => &[
                Some(TableId::File),
                Some(TableId::AssemblyRef),
                Some(TableId::ExportedType),
            ],
            CodedIndexType::CustomAttributeType => &[
                None,
                None,
                Some(TableId::MethodDef),
                Some(TableId::MemberRef),
                None,
            ],
            CodedIndexType::ResolutionScope => &[
                Some(TableId::Module),
                Some(TableId::ModuleRef),
                Some(TableId::AssemblyRef),
                Some(TableId::TypeRef),
            ],
            CodedIndexType::TypeOrMethodDef => &[Some(TableId::TypeDef), Some(TableId::MethodDef)],
        }
    }

    /// Number of low bits holding the tag
    #[must_use]
    pub fn tag_bits(&self) -> u8 {
        let tags = self.tags().len();
        // Smallest b with 2^b >= tags
        (usize::BITS - (tags - 1).leading_zeros()) as u8
    }
}

/// A decoded coded index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CodedIndex {
    /// The table the index points into
    pub tag: TableId,
    /// The 1-based row, 0 for a null reference
    pub row: u32,
    /// `tag` and `row` as a token
    pub token: Token,
}

impl CodedIndex {
    /// Read and decode a coded index of kind `ci_type`
    ///
    /// # Errors
    /// Returns an error for truncated data or a reserved tag.
    pub fn read(
        data: &[u8],
        offset: &mut usize,
        info: &TableInfoRef,
        ci_type: CodedIndexType,
    ) -> Result<Self> {
        let coded_index = if info.coded_index_bytes(ci_type) == 4 {
            read_le_at::<u32>(data, offset)?
        } else {
            u32::from(read_le_at::<u16>(data, offset)?)
        };

        Self::decode(coded_index, ci_type)
    }

    /// Split a raw coded index value into table and row
    ///
    /// # Errors
    /// Returns an error if the tag is outside the kind or reserved.
    pub fn decode(value: u32, ci_type: CodedIndexType) -> Result<Self> {
        let tag_bits = ci_type.tag_bits();
        let tag = (value & ((1 << tag_bits) - 1)) as usize;
        let row = value >> tag_bits;

        match ci_type.tags().get(tag) {
            Some(Some(table)) => Ok(CodedIndex::new(*table, row)),
            Some(None) => Err(malformed_error!(
                "Reserved tag {} in {:?} coded index",
                tag,
                ci_type
            )),
            None => Err(OutOfBounds),
        }
    }

    /// Create a coded index from table and row
    #[must_use]
    pub fn new(tag: TableId, row: u32) -> CodedIndex {
        CodedIndex {
            tag,
            row,
            token: Token::from_parts(tag as u8, row),
        }
    }

    /// True for a null reference
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.row == 0
    }
}
