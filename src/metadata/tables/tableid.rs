use strum::{EnumCount, EnumIter};

/// Identifiers of the metadata tables defined by ECMA-335 II.22.
///
/// The discriminant is the table number used in tokens and in the `valid` bit vector of the
/// tables stream.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, PartialOrd, Ord, EnumIter, EnumCount)]
#[repr(u8)]
pub enum TableId {
    /// `0x00`
    Module = 0x00,
    /// `0x01`
    TypeRef = 0x01,
    /// `0x02`
    TypeDef = 0x02,
    /// `0x03`
    FieldPtr = 0x03,
    /// `0x04`
    Field = 0x04,
    /// `0x05`
    MethodPtr = 0x05,
    /// `0x06`
    MethodDef = 0x06,
    /// `0x07`
    ParamPtr = 0x07,
    /// `0x08`
    Param = 0x08,
    /// `0x09`
    InterfaceImpl = 0x09,
    /// `0x0A`
    MemberRef = 0x0A,
    /// `0x0B`
    Constant = 0x0B,
    /// `0x0C`
    CustomAttribute = 0x0C,
    /// `0x0D`
    FieldMarshal = 0x0D,
    /// `0x0E`
    DeclSecurity = 0x0E,
    /// `0x0F`
    ClassLayout = 0x0F,
    /// `0x10`
    FieldLayout = 0x10,
    /// `0x11`
    StandAloneSig = 0x11,
    /// `0x12`
    EventMap = 0x12,
    /// `0x13`
    EventPtr = 0x13,
    /// `0x14`
    Event = 0x14,
    /// `0x15`
    PropertyMap = 0x15,
    /// `0x16`
    PropertyPtr = 0x16,
    /// `0x17`
    Property = 0x17,
    /// `0x18`
    MethodSemantics = 0x18,
    /// `0x19`
    MethodImpl = 0x19,
    /// `0x1A`
    ModuleRef = 0x1A,
    /// `0x1B`
    TypeSpec = 0x1B,
    /// `0x1C`
    ImplMap = 0x1C,
    /// `0x1D`
    FieldRVA = 0x1D,
    /// `0x1E`
    EncLog = 0x1E,
    /// `0x1F`
    EncMap = 0x1F,
    /// `0x20`
    Assembly = 0x20,
    /// `0x21`
    AssemblyProcessor = 0x21,
    /// `0x22`
    AssemblyOS = 0x22,
    /// `0x23`
    AssemblyRef = 0x23,
    /// `0x24`
    AssemblyRefProcessor = 0x24,
    /// `0x25`
    AssemblyRefOS = 0x25,
    /// `0x26`
    File = 0x26,
    /// `0x27`
    ExportedType = 0x27,
    /// `0x28`
    ManifestResource = 0x28,
    /// `0x29`
    NestedClass = 0x29,
    /// `0x2A`
    GenericParam = 0x2A,
    /// `0x2B`
    MethodSpec = 0x2B,
    /// `0x2C`
    GenericParamConstraint = 0x2C,
}

/// Layout of one column of a table row.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Column {
    /// Fixed 2 byte value
    U16,
    /// Fixed 4 byte value
    U32,
    /// Index into `#Strings`
    Str,
    /// Index into `#GUID`
    Guid,
    /// Index into `#Blob`
    Blob,
    /// Simple index into another table
    Table(TableId),
    /// Coded index over several tables
    Coded(super::CodedIndexType),
}

impl TableId {
    /// Map a table number to its id, `None` for numbers this reader does not know
    #[must_use]
    pub fn from_u8(value: u8) -> Option<TableId> {
        use strum::IntoEnumIterator;

        TableId::iter().find(|id| *id as u8 == value)
    }

    /// Column layout of a row of this table
    #[must_use]
    pub fn columns(self) -> &'static [Column] {
        use super::CodedIndexType as C;
        use Column::{Blob, Coded, Guid, Str, Table, U16, U32};

        match self {
            TableId::Module => &[U16, Str, Guid, Guid, Guid],
            TableId::TypeRef => &[Coded(C::ResolutionScope), Str, Str],
            TableId::TypeDef => &[
                U32,
                Str,
                Str,
                Coded(C::TypeDefOrRef),
                Table(TableId::Field),
                Table(TableId::MethodDef),
            ],
            TableId::FieldPtr => &[Table(TableId::Field)],
            TableId::Field => &[U16, Str, Blob],
            TableId::MethodPtr => &[Table(TableId::MethodDef)],
            TableId::MethodDef => &[U32, U16, U16, Str, Blob, Table(TableId::Param)],
            TableId::ParamPtr => &[Table(TableId::Param)],
            TableId::Param => &[U16, U16, Str],
            TableId::InterfaceImpl => &[Table(TableId::TypeDef), Coded(C::TypeDefOrRef)],
            TableId::MemberRef => &[Coded(C::MemberRefParent), Str, Blob],
            TableId::Constant => &[U16, Coded(C::HasConstant), Blob],
            TableId::CustomAttribute => &[
                Coded(C::HasCustomAttribute),
                Coded(C::CustomAttributeType),
                Blob,
            ],
            TableId::FieldMarshal => &[Coded(C::HasFieldMarshal), Blob],
            TableId::DeclSecurity => &[U16, Coded(C::HasDeclSecurity), Blob],
            TableId::ClassLayout => &[U16, U32, Table(TableId::TypeDef)],
            TableId::FieldLayout => &[U32, Table(TableId::Field)],
            TableId::StandAloneSig => &[Blob],
            TableId::EventMap => &[Table(TableId::TypeDef), Table(TableId::Event)],
            TableId::EventPtr => &[Table(TableId::Event)],
            TableId::Event => &[U16, Str, Coded(C::TypeDefOrRef)],
            TableId::PropertyMap => &[Table(TableId::TypeDef), Table(TableId::Property)],
            TableId::PropertyPtr => &[Table(TableId::Property)],
            TableId::Property => &[U16, Str, Blob],
            TableId::MethodSemantics => &[U16, Table(TableId::MethodDef), Coded(C::HasSemantics)],
            TableId::MethodImpl => &[
                Table(TableId::TypeDef),
                Coded(C::MethodDefOrRef),
                Coded(C::MethodDefOrRef),
            ],
            TableId::ModuleRef => &[Str],
            TableId::TypeSpec => &[Blob],
            TableId::ImplMap => &[U16, Coded(C::MemberForwarded), Str, Table(TableId::ModuleRef)],
            TableId::FieldRVA => &[U32, Table(TableId::Field)],
            TableId::EncLog => &[U32, U32],
            TableId::EncMap => &[U32],
            TableId::Assembly => &[U32, U16, U16, U16, U16, U32, Blob, Str, Str],
            TableId::AssemblyProcessor => &[U32],
            TableId::AssemblyOS => &[U32, U32, U32],
            TableId::AssemblyRef => &[U16, U16, U16, U16, U32, Blob, Str, Str, Blob],
            TableId::AssemblyRefProcessor => &[U32, Table(TableId::AssemblyRef)],
            TableId::AssemblyRefOS => &[U32, U32, U32, Table(TableId::AssemblyRef)],
            TableId::File => &[U32, Str, Blob],
            TableId::ExportedType => &[U32, U32, Str, Str, Coded(C::Implementation)],
            TableId::ManifestResource => &[U32, U32, Str, Coded(C::Implementation)],
            TableId::NestedClass => &[Table(TableId::TypeDef), Table(TableId::TypeDef)],
            TableId::GenericParam => &[U16, U16, Coded(C::TypeOrMethodDef), Str],
            TableId::MethodSpec => &[Coded(C::MethodDefOrRef), Blob],
            TableId::GenericParamConstraint => {
                &[Table(TableId::GenericParam), Coded(C::TypeDefOrRef)]
            }
        }
    }
}
