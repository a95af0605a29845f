//! Emits small PE32 images from a declarative description of their metadata.
//!
//! Only what the tests need is modelled: one `.text` section holding the CLI header and the
//! metadata root, the five standard streams, and the tables describing types, members, generic
//! parameters, attributes, type references, assembly references and forwarders. Every index is
//! written with the width the reader computes from the row counts, so images stay valid as they
//! grow.
//!
//! Type names in signatures are looked up among the declared types first, then among the
//! declared type references. Anything else becomes a reference into `mscorlib`, which is added
//! on first use.

use std::collections::HashMap;

use strum::{EnumCount, IntoEnumIterator};

use crate::metadata::tables::{
    CodedIndexType, Column, FieldAttributes, MethodAttributes, MethodSemanticsAttributes, TableId,
    TableInfo, TypeAttributes,
};

/// Public key token of the ECMA key `mscorlib` is signed with
pub const MSCORLIB_TOKEN: [u8; 8] = [0xb7, 0x7a, 0x5c, 0x56, 0x19, 0x34, 0xe0, 0x89];

const SECTION_RVA: u32 = 0x2000;
const FILE_ALIGNMENT: usize = 0x200;
const CLI_HEADER_SIZE: usize = 72;

/// A type as written into a signature blob
#[derive(Clone, Debug)]
pub enum SigType {
    Void,
    Bool,
    Char,
    I1,
    U1,
    I2,
    U2,
    I4,
    U4,
    I8,
    U8,
    R4,
    R8,
    String,
    Object,
    IntPtr,
    UIntPtr,
    TypedRef,
    /// A reference type by full name
    Class(String),
    /// A value type by full name
    ValueType(String),
    SzArray(Box<SigType>),
    Array {
        element: Box<SigType>,
        rank: u32,
        sizes: Vec<u32>,
        lower_bounds: Vec<i32>,
    },
    ByRef(Box<SigType>),
    Ptr(Box<SigType>),
    Pinned(Box<SigType>),
    /// A `Class` or `ValueType` instantiated with arguments
    Generic(Box<SigType>, Vec<SigType>),
    Var(u32),
    MVar(u32),
    ModReq(String, Box<SigType>),
    ModOpt(String, Box<SigType>),
    /// `void*()` function pointer without parameters
    FnPtr,
}

impl SigType {
    pub fn class(name: &str) -> SigType {
        SigType::Class(name.to_string())
    }

    pub fn value_type(name: &str) -> SigType {
        SigType::ValueType(name.to_string())
    }

    pub fn sz_array(element: SigType) -> SigType {
        SigType::SzArray(Box::new(element))
    }

    pub fn by_ref(element: SigType) -> SigType {
        SigType::ByRef(Box::new(element))
    }

    pub fn generic(definition: SigType, arguments: Vec<SigType>) -> SigType {
        SigType::Generic(Box::new(definition), arguments)
    }
}

/// A `Constant` row: element type and value bytes
#[derive(Clone, Debug)]
pub struct ConstantDecl {
    pub element_type: u8,
    pub value: Vec<u8>,
}

impl ConstantDecl {
    pub fn i4(value: i32) -> ConstantDecl {
        ConstantDecl {
            element_type: 0x08,
            value: value.to_le_bytes().to_vec(),
        }
    }

    pub fn u1(value: u8) -> ConstantDecl {
        ConstantDecl {
            element_type: 0x05,
            value: vec![value],
        }
    }

    pub fn string(value: &str) -> ConstantDecl {
        ConstantDecl {
            element_type: 0x0E,
            value: value.encode_utf16().flat_map(u16::to_le_bytes).collect(),
        }
    }

    pub fn null() -> ConstantDecl {
        ConstantDecl {
            element_type: 0x12,
            value: vec![0, 0, 0, 0],
        }
    }
}

/// Bytes of a custom attribute value blob
#[derive(Clone, Debug)]
pub struct AttributeBlob(Vec<u8>);

impl AttributeBlob {
    /// Start with the `0x0001` prolog
    pub fn new() -> AttributeBlob {
        AttributeBlob(vec![0x01, 0x00])
    }

    pub fn u8(mut self, value: u8) -> Self {
        self.0.push(value);
        self
    }

    pub fn bool(self, value: bool) -> Self {
        self.u8(u8::from(value))
    }

    pub fn i32(mut self, value: i32) -> Self {
        self.0.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn string(mut self, value: Option<&str>) -> Self {
        match value {
            Some(value) => {
                compress(value.len() as u32, &mut self.0);
                self.0.extend_from_slice(value.as_bytes());
            }
            None => self.0.push(0xFF),
        }
        self
    }

    pub fn u8_array(mut self, values: &[u8]) -> Self {
        self.0.extend_from_slice(&(values.len() as u32).to_le_bytes());
        self.0.extend_from_slice(values);
        self
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.0.extend_from_slice(bytes);
        self
    }

    /// Close with the named argument count, followed by `named` already encoded
    pub fn named(mut self, count: u16, named: &[u8]) -> Vec<u8> {
        self.0.extend_from_slice(&count.to_le_bytes());
        self.0.extend_from_slice(named);
        self.0
    }

    /// Close without named arguments
    pub fn build(self) -> Vec<u8> {
        self.named(0, &[])
    }
}

/// One attribute application
#[derive(Clone, Debug)]
pub struct AttributeDecl {
    pub type_name: String,
    pub parameters: Vec<SigType>,
    pub blob: Vec<u8>,
}

impl AttributeDecl {
    pub fn new(type_name: &str, parameters: Vec<SigType>, blob: Vec<u8>) -> AttributeDecl {
        AttributeDecl {
            type_name: type_name.to_string(),
            parameters,
            blob,
        }
    }

    /// An attribute with a parameterless constructor
    pub fn marker(type_name: &str) -> AttributeDecl {
        Self::new(type_name, Vec::new(), AttributeBlob::new().build())
    }

    pub fn nullable(value: u8) -> AttributeDecl {
        Self::new(
            "System.Runtime.CompilerServices.NullableAttribute",
            vec![SigType::U1],
            AttributeBlob::new().u8(value).build(),
        )
    }

    pub fn nullable_bytes(values: &[u8]) -> AttributeDecl {
        Self::new(
            "System.Runtime.CompilerServices.NullableAttribute",
            vec![SigType::sz_array(SigType::U1)],
            AttributeBlob::new().u8_array(values).build(),
        )
    }

    pub fn nullable_context(value: u8) -> AttributeDecl {
        Self::new(
            "System.Runtime.CompilerServices.NullableContextAttribute",
            vec![SigType::U1],
            AttributeBlob::new().u8(value).build(),
        )
    }

    pub fn default_member(name: &str) -> AttributeDecl {
        Self::new(
            "System.Reflection.DefaultMemberAttribute",
            vec![SigType::String],
            AttributeBlob::new().string(Some(name)).build(),
        )
    }
}

/// A generic parameter of a type or method
#[derive(Clone, Debug)]
pub struct GenericParamDecl {
    pub name: String,
    pub flags: u16,
    pub constraints: Vec<SigType>,
    pub attributes: Vec<AttributeDecl>,
}

impl GenericParamDecl {
    pub fn new(name: &str) -> GenericParamDecl {
        GenericParamDecl {
            name: name.to_string(),
            flags: 0,
            constraints: Vec::new(),
            attributes: Vec::new(),
        }
    }

    pub fn flags(mut self, flags: u16) -> Self {
        self.flags |= flags;
        self
    }

    pub fn constraint(mut self, constraint: SigType) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn attribute(mut self, attribute: AttributeDecl) -> Self {
        self.attributes.push(attribute);
        self
    }
}

#[derive(Clone, Debug)]
pub struct FieldDecl {
    pub name: String,
    pub field_type: SigType,
    pub flags: u16,
    pub constant: Option<ConstantDecl>,
    pub attributes: Vec<AttributeDecl>,
}

impl FieldDecl {
    /// A public instance field
    pub fn new(name: &str, field_type: SigType) -> FieldDecl {
        FieldDecl {
            name: name.to_string(),
            field_type,
            flags: 0x0006,
            constant: None,
            attributes: Vec::new(),
        }
    }

    /// Replace the access and modifier flags
    pub fn flags(mut self, flags: u16) -> Self {
        self.flags = flags;
        self
    }

    /// A public `const`
    pub fn literal(mut self, constant: ConstantDecl) -> Self {
        self.flags = 0x0006 | FieldAttributes::STATIC | FieldAttributes::LITERAL | FieldAttributes::HAS_DEFAULT;
        self.constant = Some(constant);
        self
    }

    pub fn attribute(mut self, attribute: AttributeDecl) -> Self {
        self.attributes.push(attribute);
        self
    }
}

#[derive(Clone, Debug)]
pub struct ParamDecl {
    pub name: String,
    pub param_type: SigType,
    pub flags: u16,
    pub constant: Option<ConstantDecl>,
    pub attributes: Vec<AttributeDecl>,
}

impl ParamDecl {
    pub fn new(name: &str, param_type: SigType) -> ParamDecl {
        ParamDecl {
            name: name.to_string(),
            param_type,
            flags: 0,
            constant: None,
            attributes: Vec::new(),
        }
    }

    pub fn flags(mut self, flags: u16) -> Self {
        self.flags |= flags;
        self
    }

    pub fn default_value(mut self, constant: ConstantDecl) -> Self {
        self.flags |= 0x0010 | 0x1000;
        self.constant = Some(constant);
        self
    }

    pub fn attribute(mut self, attribute: AttributeDecl) -> Self {
        self.attributes.push(attribute);
        self
    }
}

#[derive(Clone, Debug)]
pub struct MethodDecl {
    pub name: String,
    pub return_type: SigType,
    pub flags: u16,
    pub parameters: Vec<ParamDecl>,
    pub generic_parameters: Vec<GenericParamDecl>,
    pub attributes: Vec<AttributeDecl>,
    pub return_attributes: Vec<AttributeDecl>,
    pub explicit_override: bool,
}

impl MethodDecl {
    /// A public instance method
    pub fn new(name: &str, return_type: SigType) -> MethodDecl {
        MethodDecl {
            name: name.to_string(),
            return_type,
            flags: 0x0006 | MethodAttributes::HIDE_BY_SIG,
            parameters: Vec::new(),
            generic_parameters: Vec::new(),
            attributes: Vec::new(),
            return_attributes: Vec::new(),
            explicit_override: false,
        }
    }

    /// A public instance constructor
    pub fn constructor() -> MethodDecl {
        Self::new(".ctor", SigType::Void)
            .flags(MethodAttributes::SPECIAL_NAME | MethodAttributes::RT_SPECIAL_NAME)
    }

    /// Add to the flags
    pub fn flags(mut self, flags: u16) -> Self {
        self.flags |= flags;
        self
    }

    /// Replace the access bits
    pub fn access(mut self, access: u16) -> Self {
        self.flags = (self.flags & !MethodAttributes::MEMBER_ACCESS_MASK) | access;
        self
    }

    pub fn param(mut self, parameter: ParamDecl) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn generic_param(mut self, parameter: GenericParamDecl) -> Self {
        self.generic_parameters.push(parameter);
        self
    }

    pub fn attribute(mut self, attribute: AttributeDecl) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn return_attribute(mut self, attribute: AttributeDecl) -> Self {
        self.return_attributes.push(attribute);
        self
    }

    /// Record a `MethodImpl` row with this method as the body
    pub fn explicit_override(mut self) -> Self {
        self.explicit_override = true;
        self
    }

    fn is_static(&self) -> bool {
        self.flags & MethodAttributes::STATIC != 0
    }
}

#[derive(Clone, Debug)]
pub struct PropertyDecl {
    pub name: String,
    pub property_type: SigType,
    pub parameters: Vec<SigType>,
    pub getter: Option<String>,
    pub setter: Option<String>,
    pub is_static: bool,
    pub attributes: Vec<AttributeDecl>,
}

impl PropertyDecl {
    pub fn new(name: &str, property_type: SigType) -> PropertyDecl {
        PropertyDecl {
            name: name.to_string(),
            property_type,
            parameters: Vec::new(),
            getter: None,
            setter: None,
            is_static: false,
            attributes: Vec::new(),
        }
    }

    pub fn getter(mut self, method: &str) -> Self {
        self.getter = Some(method.to_string());
        self
    }

    pub fn setter(mut self, method: &str) -> Self {
        self.setter = Some(method.to_string());
        self
    }

    pub fn parameter(mut self, parameter: SigType) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn static_(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn attribute(mut self, attribute: AttributeDecl) -> Self {
        self.attributes.push(attribute);
        self
    }
}

#[derive(Clone, Debug)]
pub struct EventDecl {
    pub name: String,
    pub event_type: SigType,
    pub adder: Option<String>,
    pub remover: Option<String>,
    pub attributes: Vec<AttributeDecl>,
}

impl EventDecl {
    pub fn new(name: &str, event_type: SigType) -> EventDecl {
        EventDecl {
            name: name.to_string(),
            event_type,
            adder: None,
            remover: None,
            attributes: Vec::new(),
        }
    }

    pub fn adder(mut self, method: &str) -> Self {
        self.adder = Some(method.to_string());
        self
    }

    pub fn remover(mut self, method: &str) -> Self {
        self.remover = Some(method.to_string());
        self
    }
}

/// One `TypeDef` row and everything it owns
#[derive(Clone, Debug)]
pub struct TypeDecl {
    pub namespace: String,
    pub name: String,
    pub flags: u32,
    pub extends: Option<SigType>,
    pub enclosing: Option<String>,
    pub interfaces: Vec<SigType>,
    pub generic_parameters: Vec<GenericParamDecl>,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<MethodDecl>,
    pub properties: Vec<PropertyDecl>,
    pub events: Vec<EventDecl>,
    pub attributes: Vec<AttributeDecl>,
}

impl TypeDecl {
    /// An internal class deriving from `System.Object`
    pub fn class(namespace: &str, name: &str) -> TypeDecl {
        TypeDecl {
            namespace: namespace.to_string(),
            name: name.to_string(),
            flags: TypeAttributes::BEFORE_FIELD_INIT,
            extends: Some(SigType::class("System.Object")),
            enclosing: None,
            interfaces: Vec::new(),
            generic_parameters: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            properties: Vec::new(),
            events: Vec::new(),
            attributes: Vec::new(),
        }
    }

    pub fn struct_(namespace: &str, name: &str) -> TypeDecl {
        let mut declaration = Self::class(namespace, name);
        declaration.flags |= TypeAttributes::SEALED;
        declaration.extends = Some(SigType::class("System.ValueType"));
        declaration
    }

    /// An enum with the `value__` field of `underlying`
    pub fn enum_(namespace: &str, name: &str, underlying: SigType) -> TypeDecl {
        let mut declaration = Self::class(namespace, name);
        declaration.flags = TypeAttributes::SEALED;
        declaration.extends = Some(SigType::class("System.Enum"));
        declaration.fields.push(FieldDecl::new("value__", underlying).flags(
            0x0006 | FieldAttributes::SPECIAL_NAME | FieldAttributes::RT_SPECIAL_NAME,
        ));
        declaration
    }

    pub fn interface(namespace: &str, name: &str) -> TypeDecl {
        let mut declaration = Self::class(namespace, name);
        declaration.flags = TypeAttributes::INTERFACE | TypeAttributes::ABSTRACT;
        declaration.extends = None;
        declaration
    }

    /// A delegate with an `Invoke` of `return_type` over `parameters`
    pub fn delegate(namespace: &str, name: &str, return_type: SigType, parameters: Vec<ParamDecl>) -> TypeDecl {
        let mut declaration = Self::class(namespace, name);
        declaration.flags = TypeAttributes::SEALED;
        declaration.extends = Some(SigType::class("System.MulticastDelegate"));
        declaration.methods.push(MethodDecl::constructor().param(ParamDecl::new("object", SigType::Object)).param(ParamDecl::new("method", SigType::IntPtr)));
        let mut invoke = MethodDecl::new("Invoke", return_type).flags(MethodAttributes::VIRTUAL | MethodAttributes::NEW_SLOT);
        invoke.parameters = parameters;
        declaration.methods.push(invoke);
        declaration
    }

    pub fn public(mut self) -> Self {
        self.flags = (self.flags & !TypeAttributes::VISIBILITY_MASK) | TypeAttributes::PUBLIC;
        self
    }

    pub fn nested_public(self) -> Self {
        self.visibility(TypeAttributes::NESTED_PUBLIC)
    }

    /// Replace the visibility bits
    pub fn visibility(mut self, visibility: u32) -> Self {
        self.flags = (self.flags & !TypeAttributes::VISIBILITY_MASK) | visibility;
        self
    }

    /// Add to the flags
    pub fn flags(mut self, flags: u32) -> Self {
        self.flags |= flags;
        self
    }

    /// Nest inside the type declared earlier as `enclosing`
    pub fn nested_in(mut self, enclosing: &str) -> Self {
        self.enclosing = Some(enclosing.to_string());
        self
    }

    pub fn extends(mut self, base: SigType) -> Self {
        self.extends = Some(base);
        self
    }

    pub fn implements(mut self, interface: SigType) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn generic_param(mut self, parameter: GenericParamDecl) -> Self {
        self.generic_parameters.push(parameter);
        self
    }

    pub fn field(mut self, field: FieldDecl) -> Self {
        self.fields.push(field);
        self
    }

    pub fn method(mut self, method: MethodDecl) -> Self {
        self.methods.push(method);
        self
    }

    pub fn property(mut self, property: PropertyDecl) -> Self {
        self.properties.push(property);
        self
    }

    pub fn event(mut self, event: EventDecl) -> Self {
        self.events.push(event);
        self
    }

    pub fn attribute(mut self, attribute: AttributeDecl) -> Self {
        self.attributes.push(attribute);
        self
    }

    fn full_name(&self, enclosing_full_name: Option<&str>) -> String {
        match enclosing_full_name {
            Some(outer) => format!("{outer}.{}", self.name),
            None if self.namespace.is_empty() => self.name.clone(),
            None => format!("{}.{}", self.namespace, self.name),
        }
    }
}

#[derive(Clone, Debug)]
enum TypeRefDecl {
    InAssembly { namespace: String, name: String, assembly: String },
    Nested { name: String, enclosing: String },
}

/// Builder for a complete module image
#[derive(Clone, Debug)]
pub struct ImageBuilder {
    name: String,
    version: (u16, u16, u16, u16),
    assembly_references: Vec<(String, (u16, u16, u16, u16), Option<[u8; 8]>)>,
    type_references: Vec<TypeRefDecl>,
    types: Vec<TypeDecl>,
    forwarders: Vec<(String, String, String)>,
    assembly_attributes: Vec<AttributeDecl>,
    user_strings: Vec<String>,
}

impl ImageBuilder {
    /// An assembly `name` in module `name.dll`, version 1.0.0.0
    pub fn new(name: &str) -> ImageBuilder {
        ImageBuilder {
            name: name.to_string(),
            version: (1, 0, 0, 0),
            assembly_references: Vec::new(),
            type_references: Vec::new(),
            types: Vec::new(),
            forwarders: Vec::new(),
            assembly_attributes: Vec::new(),
            user_strings: Vec::new(),
        }
    }

    pub fn version(mut self, major: u16, minor: u16, build: u16, revision: u16) -> Self {
        self.version = (major, minor, build, revision);
        self
    }

    pub fn assembly_reference(mut self, name: &str, version: (u16, u16, u16, u16)) -> Self {
        self.assembly_references.push((name.to_string(), version, None));
        self
    }

    pub fn strong_named_reference(mut self, name: &str, version: (u16, u16, u16, u16), token: [u8; 8]) -> Self {
        self.assembly_references.push((name.to_string(), version, Some(token)));
        self
    }

    /// A reference to `namespace.name` in the referenced assembly `assembly`
    pub fn type_reference(mut self, namespace: &str, name: &str, assembly: &str) -> Self {
        self.type_references.push(TypeRefDecl::InAssembly {
            namespace: namespace.to_string(),
            name: name.to_string(),
            assembly: assembly.to_string(),
        });
        self
    }

    /// A reference to `name` nested in the reference declared earlier as `enclosing`
    pub fn nested_type_reference(mut self, name: &str, enclosing: &str) -> Self {
        self.type_references.push(TypeRefDecl::Nested {
            name: name.to_string(),
            enclosing: enclosing.to_string(),
        });
        self
    }

    pub fn add_type(mut self, declaration: TypeDecl) -> Self {
        self.types.push(declaration);
        self
    }

    /// Forward `namespace.name` to the referenced assembly `assembly`
    pub fn forwarded_type(mut self, namespace: &str, name: &str, assembly: &str) -> Self {
        self.forwarders
            .push((namespace.to_string(), name.to_string(), assembly.to_string()));
        self
    }

    pub fn assembly_attribute(mut self, attribute: AttributeDecl) -> Self {
        self.assembly_attributes.push(attribute);
        self
    }

    pub fn user_string(mut self, value: &str) -> Self {
        self.user_strings.push(value.to_string());
        self
    }

    /// Emit the PE image
    pub fn build(&self) -> Vec<u8> {
        let mut emitter = Emitter::new(self);
        emitter.emit();
        let metadata = emitter.metadata_root();
        pe_image(&metadata)
    }
}

impl Default for AttributeBlob {
    fn default() -> Self {
        Self::new()
    }
}

struct Heaps {
    strings: Vec<u8>,
    string_offsets: HashMap<String, u32>,
    blobs: Vec<u8>,
    blob_offsets: HashMap<Vec<u8>, u32>,
    guids: Vec<u8>,
    user_strings: Vec<u8>,
}

impl Heaps {
    fn new() -> Self {
        Heaps {
            strings: vec![0],
            string_offsets: HashMap::new(),
            blobs: vec![0],
            blob_offsets: HashMap::new(),
            guids: Vec::new(),
            user_strings: vec![0],
        }
    }

    fn string(&mut self, value: &str) -> u32 {
        if value.is_empty() {
            return 0;
        }
        if let Some(offset) = self.string_offsets.get(value) {
            return *offset;
        }
        let offset = self.strings.len() as u32;
        self.strings.extend_from_slice(value.as_bytes());
        self.strings.push(0);
        self.string_offsets.insert(value.to_string(), offset);
        offset
    }

    fn blob(&mut self, value: &[u8]) -> u32 {
        if value.is_empty() {
            return 0;
        }
        if let Some(offset) = self.blob_offsets.get(value) {
            return *offset;
        }
        let offset = self.blobs.len() as u32;
        compress(value.len() as u32, &mut self.blobs);
        self.blobs.extend_from_slice(value);
        self.blob_offsets.insert(value.to_vec(), offset);
        offset
    }

    fn guid(&mut self, value: [u8; 16]) -> u32 {
        self.guids.extend_from_slice(&value);
        (self.guids.len() / 16) as u32
    }

    fn user_string(&mut self, value: &str) -> u32 {
        let offset = self.user_strings.len() as u32;
        let units: Vec<u8> = value.encode_utf16().flat_map(u16::to_le_bytes).collect();
        compress(units.len() as u32 + 1, &mut self.user_strings);
        self.user_strings.extend_from_slice(&units);
        self.user_strings.push(0);
        offset
    }
}

fn compress(value: u32, out: &mut Vec<u8>) {
    if value < 0x80 {
        out.push(value as u8);
    } else if value < 0x4000 {
        out.extend_from_slice(&((value as u16) | 0x8000).to_be_bytes());
    } else {
        out.extend_from_slice(&(value | 0xC000_0000).to_be_bytes());
    }
}

fn compress_signed(value: i32, out: &mut Vec<u8>) {
    // Rotated two's complement in the narrowest of 7, 14 or 29 bits
    let sign = u32::from(value < 0);
    if (-0x40..0x40).contains(&value) {
        out.push((((value << 1) & 0x7E) as u32 | sign) as u8);
    } else if (-0x2000..0x2000).contains(&value) {
        let encoded = ((value << 1) & 0x3FFE) as u32 | sign;
        out.extend_from_slice(&((encoded as u16) | 0x8000).to_be_bytes());
    } else {
        let encoded = ((value << 1) & 0x1FFF_FFFE) as u32 | sign;
        out.extend_from_slice(&(encoded | 0xC000_0000).to_be_bytes());
    }
}

fn coded(kind: CodedIndexType, table: TableId, row: u32) -> u32 {
    let tag = kind
        .tags()
        .iter()
        .position(|candidate| *candidate == Some(table))
        .unwrap_or_else(|| panic!("{table:?} is not part of {kind:?}"));
    (row << kind.tag_bits()) | tag as u32
}

struct Emitter<'b> {
    builder: &'b ImageBuilder,
    heaps: Heaps,
    rows: Vec<Vec<Vec<u32>>>,
    local_types: HashMap<String, u32>,
    type_refs: HashMap<String, u32>,
    assembly_refs: HashMap<String, u32>,
    type_specs: HashMap<Vec<u8>, u32>,
    member_refs: HashMap<(u32, Vec<u8>), u32>,
}

impl<'b> Emitter<'b> {
    fn new(builder: &'b ImageBuilder) -> Self {
        Emitter {
            builder,
            heaps: Heaps::new(),
            rows: vec![Vec::new(); TableId::COUNT],
            local_types: HashMap::new(),
            type_refs: HashMap::new(),
            assembly_refs: HashMap::new(),
            type_specs: HashMap::new(),
            member_refs: HashMap::new(),
        }
    }

    fn push(&mut self, table: TableId, row: Vec<u32>) -> u32 {
        let rows = &mut self.rows[table as usize];
        rows.push(row);
        rows.len() as u32
    }

    fn count(&self, table: TableId) -> u32 {
        self.rows[table as usize].len() as u32
    }

    fn emit(&mut self) {
        let builder = self.builder;

        let module_name = self.heaps.string(&format!("{}.dll", builder.name));
        let mut mvid = [0_u8; 16];
        for (position, byte) in builder.name.bytes().take(16).enumerate() {
            mvid[position] = byte;
        }
        mvid[15] = 0x42;
        let mvid = self.heaps.guid(mvid);
        self.push(TableId::Module, vec![0, module_name, mvid, 0, 0]);

        let (major, minor, build, revision) = builder.version;
        let assembly_name = self.heaps.string(&builder.name);
        self.push(
            TableId::Assembly,
            vec![
                0x8004,
                u32::from(major),
                u32::from(minor),
                u32::from(build),
                u32::from(revision),
                0,
                0,
                assembly_name,
                0,
            ],
        );

        for (name, version, token) in &builder.assembly_references {
            self.add_assembly_reference(name, *version, *token);
        }

        for reference in &builder.type_references {
            match reference {
                TypeRefDecl::InAssembly { namespace, name, assembly } => {
                    let scope = self.assembly_refs[assembly.as_str()];
                    let full_name = if namespace.is_empty() {
                        name.clone()
                    } else {
                        format!("{namespace}.{name}")
                    };
                    let row = vec![
                        coded(CodedIndexType::ResolutionScope, TableId::AssemblyRef, scope),
                        self.heaps.string(name),
                        self.heaps.string(namespace),
                    ];
                    let rid = self.push(TableId::TypeRef, row);
                    self.type_refs.insert(full_name, rid);
                }
                TypeRefDecl::Nested { name, enclosing } => {
                    let outer = self.type_refs[enclosing.as_str()];
                    let row = vec![
                        coded(CodedIndexType::ResolutionScope, TableId::TypeRef, outer),
                        self.heaps.string(name),
                        0,
                    ];
                    let rid = self.push(TableId::TypeRef, row);
                    self.type_refs.insert(format!("{enclosing}.{name}"), rid);
                }
            }
        }

        // Row numbers of every declared type, <Module> takes row 1
        let mut full_names = Vec::with_capacity(builder.types.len());
        for (position, declaration) in builder.types.iter().enumerate() {
            let full_name = declaration.full_name(declaration.enclosing.as_deref());
            self.local_types.insert(full_name.clone(), position as u32 + 2);
            full_names.push(full_name);
        }

        let module_type = self.heaps.string("<Module>");
        self.push(TableId::TypeDef, vec![0, module_type, 0, 0, 1, 1]);

        let mut pending_attributes = Vec::new();
        for (position, declaration) in builder.types.iter().enumerate() {
            let type_rid = position as u32 + 2;
            self.emit_type(type_rid, declaration, &mut pending_attributes);
        }

        let mut generic_owner_rows = Vec::new();
        for (position, declaration) in builder.types.iter().enumerate() {
            let owner = coded(CodedIndexType::TypeOrMethodDef, TableId::TypeDef, position as u32 + 2);
            generic_owner_rows.push((owner, &declaration.generic_parameters));
        }
        let mut method_rid = 0;
        for declaration in &builder.types {
            for method in &declaration.methods {
                method_rid += 1;
                let owner = coded(CodedIndexType::TypeOrMethodDef, TableId::MethodDef, method_rid);
                generic_owner_rows.push((owner, &method.generic_parameters));
            }
        }
        generic_owner_rows.sort_by_key(|(owner, _)| *owner);
        for (owner, parameters) in generic_owner_rows {
            for (number, parameter) in parameters.iter().enumerate() {
                let name = self.heaps.string(&parameter.name);
                let rid = self.push(
                    TableId::GenericParam,
                    vec![number as u32, u32::from(parameter.flags), owner, name],
                );
                for constraint in &parameter.constraints {
                    let constraint = self.type_def_or_ref(constraint);
                    self.push(TableId::GenericParamConstraint, vec![rid, constraint]);
                }
                for attribute in &parameter.attributes {
                    pending_attributes.push((TableId::GenericParam, rid, attribute.clone()));
                }
            }
        }

        for (namespace, name, assembly) in &builder.forwarders {
            let implementation = coded(
                CodedIndexType::Implementation,
                TableId::AssemblyRef,
                self.assembly_refs[assembly.as_str()],
            );
            let row = vec![
                TypeAttributes::FORWARDER,
                0,
                self.heaps.string(name),
                self.heaps.string(namespace),
                implementation,
            ];
            self.push(TableId::ExportedType, row);
        }

        for attribute in &builder.assembly_attributes {
            pending_attributes.push((TableId::Assembly, 1, attribute.clone()));
        }

        for value in &builder.user_strings {
            self.heaps.user_string(value);
        }

        pending_attributes
            .sort_by_key(|(table, rid, _)| coded(CodedIndexType::HasCustomAttribute, *table, *rid));
        for (table, rid, attribute) in pending_attributes {
            self.emit_attribute(table, rid, &attribute);
        }

        // Nothing points into these, so they can be put in key order afterwards
        for (table, key) in [
            (TableId::InterfaceImpl, 0),
            (TableId::Constant, 1),
            (TableId::MethodSemantics, 2),
            (TableId::MethodImpl, 0),
            (TableId::NestedClass, 0),
            (TableId::GenericParamConstraint, 0),
        ] {
            self.rows[table as usize].sort_by_key(|row| row[key]);
        }
    }

    fn add_assembly_reference(&mut self, name: &str, version: (u16, u16, u16, u16), token: Option<[u8; 8]>) -> u32 {
        let (major, minor, build, revision) = version;
        let token = token.map_or(0, |token| self.heaps.blob(&token));
        let row = vec![
            u32::from(major),
            u32::from(minor),
            u32::from(build),
            u32::from(revision),
            0,
            token,
            self.heaps.string(name),
            0,
            0,
        ];
        let rid = self.push(TableId::AssemblyRef, row);
        self.assembly_refs.insert(name.to_string(), rid);
        rid
    }

    fn emit_type(
        &mut self,
        type_rid: u32,
        declaration: &TypeDecl,
        pending_attributes: &mut Vec<(TableId, u32, AttributeDecl)>,
    ) {
        let extends = match &declaration.extends {
            Some(base) => self.type_def_or_ref(base),
            None => 0,
        };
        let name = self.heaps.string(&declaration.name);
        let namespace = if declaration.enclosing.is_some() {
            0
        } else {
            self.heaps.string(&declaration.namespace)
        };
        let field_list = self.count(TableId::Field) + 1;
        let method_list = self.count(TableId::MethodDef) + 1;
        self.push(
            TableId::TypeDef,
            vec![declaration.flags, name, namespace, extends, field_list, method_list],
        );

        if let Some(enclosing) = &declaration.enclosing {
            let outer = self.local_types[enclosing.as_str()];
            self.push(TableId::NestedClass, vec![type_rid, outer]);
        }

        for interface in &declaration.interfaces {
            let interface = self.type_def_or_ref(interface);
            self.push(TableId::InterfaceImpl, vec![type_rid, interface]);
        }

        for field in &declaration.fields {
            let mut signature = vec![0x06];
            self.encode(&field.field_type, &mut signature);
            let row = vec![
                u32::from(field.flags),
                self.heaps.string(&field.name),
                self.heaps.blob(&signature),
            ];
            let rid = self.push(TableId::Field, row);
            if let Some(constant) = &field.constant {
                self.emit_constant(TableId::Field, rid, constant);
            }
            for attribute in &field.attributes {
                pending_attributes.push((TableId::Field, rid, attribute.clone()));
            }
        }

        let mut methods_by_name = HashMap::new();
        for method in &declaration.methods {
            let signature = self.method_signature(method);
            let row = vec![
                0,
                0,
                u32::from(method.flags),
                self.heaps.string(&method.name),
                self.heaps.blob(&signature),
                self.count(TableId::Param) + 1,
            ];
            let rid = self.push(TableId::MethodDef, row);
            methods_by_name.insert(method.name.clone(), rid);

            if !method.return_attributes.is_empty() {
                let param = self.push(TableId::Param, vec![0, 0, 0]);
                for attribute in &method.return_attributes {
                    pending_attributes.push((TableId::Param, param, attribute.clone()));
                }
            }
            for (position, parameter) in method.parameters.iter().enumerate() {
                let row = vec![
                    u32::from(parameter.flags),
                    position as u32 + 1,
                    self.heaps.string(&parameter.name),
                ];
                let param = self.push(TableId::Param, row);
                if let Some(constant) = &parameter.constant {
                    self.emit_constant(TableId::Param, param, constant);
                }
                for attribute in &parameter.attributes {
                    pending_attributes.push((TableId::Param, param, attribute.clone()));
                }
            }

            if method.explicit_override {
                let body = coded(CodedIndexType::MethodDefOrRef, TableId::MethodDef, rid);
                self.push(TableId::MethodImpl, vec![type_rid, body, body]);
            }
            for attribute in &method.attributes {
                pending_attributes.push((TableId::MethodDef, rid, attribute.clone()));
            }
        }

        if !declaration.properties.is_empty() {
            let first = self.count(TableId::Property) + 1;
            self.push(TableId::PropertyMap, vec![type_rid, first]);
        }
        for property in &declaration.properties {
            let mut signature = vec![if property.is_static { 0x08 } else { 0x28 }];
            compress(property.parameters.len() as u32, &mut signature);
            self.encode(&property.property_type, &mut signature);
            for parameter in &property.parameters {
                self.encode(parameter, &mut signature);
            }
            let row = vec![0, self.heaps.string(&property.name), self.heaps.blob(&signature)];
            let rid = self.push(TableId::Property, row);
            let association = coded(CodedIndexType::HasSemantics, TableId::Property, rid);
            for (accessor, semantics) in [
                (&property.getter, MethodSemanticsAttributes::GETTER),
                (&property.setter, MethodSemanticsAttributes::SETTER),
            ] {
                if let Some(accessor) = accessor {
                    let method = methods_by_name[accessor.as_str()];
                    self.push(
                        TableId::MethodSemantics,
                        vec![u32::from(semantics.bits()), method, association],
                    );
                }
            }
            for attribute in &property.attributes {
                pending_attributes.push((TableId::Property, rid, attribute.clone()));
            }
        }

        if !declaration.events.is_empty() {
            let first = self.count(TableId::Event) + 1;
            self.push(TableId::EventMap, vec![type_rid, first]);
        }
        for event in &declaration.events {
            let event_type = self.type_def_or_ref(&event.event_type);
            let row = vec![0, self.heaps.string(&event.name), event_type];
            let rid = self.push(TableId::Event, row);
            let association = coded(CodedIndexType::HasSemantics, TableId::Event, rid);
            for (accessor, semantics) in [
                (&event.adder, MethodSemanticsAttributes::ADD_ON),
                (&event.remover, MethodSemanticsAttributes::REMOVE_ON),
            ] {
                if let Some(accessor) = accessor {
                    let method = methods_by_name[accessor.as_str()];
                    self.push(
                        TableId::MethodSemantics,
                        vec![u32::from(semantics.bits()), method, association],
                    );
                }
            }
            for attribute in &event.attributes {
                pending_attributes.push((TableId::Event, rid, attribute.clone()));
            }
        }

        for attribute in &declaration.attributes {
            pending_attributes.push((TableId::TypeDef, type_rid, attribute.clone()));
        }
    }

    fn method_signature(&mut self, method: &MethodDecl) -> Vec<u8> {
        let mut calling_convention = if method.is_static() { 0x00 } else { 0x20 };
        if !method.generic_parameters.is_empty() {
            calling_convention |= 0x10;
        }
        let mut signature = vec![calling_convention];
        if !method.generic_parameters.is_empty() {
            compress(method.generic_parameters.len() as u32, &mut signature);
        }
        compress(method.parameters.len() as u32, &mut signature);
        self.encode(&method.return_type, &mut signature);
        for parameter in &method.parameters {
            self.encode(&parameter.param_type, &mut signature);
        }
        signature
    }

    fn emit_constant(&mut self, table: TableId, rid: u32, constant: &ConstantDecl) {
        let parent = coded(CodedIndexType::HasConstant, table, rid);
        let value = self.heaps.blob(&constant.value);
        self.push(TableId::Constant, vec![u32::from(constant.element_type), parent, value]);
    }

    fn emit_attribute(&mut self, table: TableId, rid: u32, attribute: &AttributeDecl) {
        let mut signature = vec![0x20];
        compress(attribute.parameters.len() as u32, &mut signature);
        signature.push(0x01);
        for parameter in &attribute.parameters {
            self.encode(parameter, &mut signature);
        }

        let class = match self.local_types.get(&attribute.type_name) {
            Some(rid) => coded(CodedIndexType::MemberRefParent, TableId::TypeDef, *rid),
            None => {
                let reference = self.type_ref(&attribute.type_name);
                coded(CodedIndexType::MemberRefParent, TableId::TypeRef, reference)
            }
        };

        let key = (class, signature.clone());
        let constructor = match self.member_refs.get(&key) {
            Some(rid) => *rid,
            None => {
                let row = vec![class, self.heaps.string(".ctor"), self.heaps.blob(&signature)];
                let rid = self.push(TableId::MemberRef, row);
                self.member_refs.insert(key, rid);
                rid
            }
        };

        let row = vec![
            coded(CodedIndexType::HasCustomAttribute, table, rid),
            coded(CodedIndexType::CustomAttributeType, TableId::MemberRef, constructor),
            self.heaps.blob(&attribute.blob),
        ];
        self.push(TableId::CustomAttribute, row);
    }

    fn type_ref(&mut self, full_name: &str) -> u32 {
        if let Some(rid) = self.type_refs.get(full_name) {
            return *rid;
        }

        let scope = match self.assembly_refs.get("mscorlib") {
            Some(rid) => *rid,
            None => self.add_assembly_reference("mscorlib", (4, 0, 0, 0), Some(MSCORLIB_TOKEN)),
        };
        let (namespace, name) = full_name.rsplit_once('.').unwrap_or(("", full_name));
        let row = vec![
            coded(CodedIndexType::ResolutionScope, TableId::AssemblyRef, scope),
            self.heaps.string(name),
            self.heaps.string(namespace),
        ];
        let rid = self.push(TableId::TypeRef, row);
        self.type_refs.insert(full_name.to_string(), rid);
        rid
    }

    // (table, row) of a named type as a TypeDefOrRef target
    fn named(&mut self, full_name: &str) -> (TableId, u32) {
        match self.local_types.get(full_name) {
            Some(rid) => (TableId::TypeDef, *rid),
            None => (TableId::TypeRef, self.type_ref(full_name)),
        }
    }

    fn type_def_or_ref(&mut self, sig_type: &SigType) -> u32 {
        match sig_type {
            SigType::Class(name) | SigType::ValueType(name) => {
                let (table, rid) = self.named(name);
                coded(CodedIndexType::TypeDefOrRef, table, rid)
            }
            other => {
                let mut blob = Vec::new();
                self.encode(other, &mut blob);
                let rid = match self.type_specs.get(&blob) {
                    Some(rid) => *rid,
                    None => {
                        let signature = self.heaps.blob(&blob);
                        let rid = self.push(TableId::TypeSpec, vec![signature]);
                        self.type_specs.insert(blob, rid);
                        rid
                    }
                };
                coded(CodedIndexType::TypeDefOrRef, TableId::TypeSpec, rid)
            }
        }
    }

    fn encode_named(&mut self, full_name: &str, out: &mut Vec<u8>) {
        let (table, rid) = self.named(full_name);
        let tag = match table {
            TableId::TypeDef => 0,
            _ => 1,
        };
        compress((rid << 2) | tag, out);
    }

    fn encode(&mut self, sig_type: &SigType, out: &mut Vec<u8>) {
        match sig_type {
            SigType::Void => out.push(0x01),
            SigType::Bool => out.push(0x02),
            SigType::Char => out.push(0x03),
            SigType::I1 => out.push(0x04),
            SigType::U1 => out.push(0x05),
            SigType::I2 => out.push(0x06),
            SigType::U2 => out.push(0x07),
            SigType::I4 => out.push(0x08),
            SigType::U4 => out.push(0x09),
            SigType::I8 => out.push(0x0A),
            SigType::U8 => out.push(0x0B),
            SigType::R4 => out.push(0x0C),
            SigType::R8 => out.push(0x0D),
            SigType::String => out.push(0x0E),
            SigType::Object => out.push(0x1C),
            SigType::IntPtr => out.push(0x18),
            SigType::UIntPtr => out.push(0x19),
            SigType::TypedRef => out.push(0x16),
            SigType::Class(name) => {
                out.push(0x12);
                self.encode_named(name, out);
            }
            SigType::ValueType(name) => {
                out.push(0x11);
                self.encode_named(name, out);
            }
            SigType::SzArray(element) => {
                out.push(0x1D);
                self.encode(element, out);
            }
            SigType::Array {
                element,
                rank,
                sizes,
                lower_bounds,
            } => {
                out.push(0x14);
                self.encode(element, out);
                compress(*rank, out);
                compress(sizes.len() as u32, out);
                for size in sizes {
                    compress(*size, out);
                }
                compress(lower_bounds.len() as u32, out);
                for bound in lower_bounds {
                    compress_signed(*bound, out);
                }
            }
            SigType::ByRef(element) => {
                out.push(0x10);
                self.encode(element, out);
            }
            SigType::Ptr(element) => {
                out.push(0x0F);
                self.encode(element, out);
            }
            SigType::Pinned(element) => {
                out.push(0x45);
                self.encode(element, out);
            }
            SigType::Generic(definition, arguments) => {
                out.push(0x15);
                self.encode(definition, out);
                compress(arguments.len() as u32, out);
                for argument in arguments {
                    self.encode(argument, out);
                }
            }
            SigType::Var(number) => {
                out.push(0x13);
                compress(*number, out);
            }
            SigType::MVar(number) => {
                out.push(0x1E);
                compress(*number, out);
            }
            SigType::ModReq(modifier, element) => {
                out.push(0x1F);
                self.encode_named(modifier, out);
                self.encode(element, out);
            }
            SigType::ModOpt(modifier, element) => {
                out.push(0x20);
                self.encode_named(modifier, out);
                self.encode(element, out);
            }
            SigType::FnPtr => out.extend_from_slice(&[0x1B, 0x00, 0x00, 0x01]),
        }
    }

    fn tables_stream(&self) -> Vec<u8> {
        let mut row_counts = [0_u32; TableId::COUNT];
        for table in TableId::iter() {
            row_counts[table as usize] = self.count(table);
        }
        let info = TableInfo::new(&row_counts, 0);

        let mut valid = 0_u64;
        for table in TableId::iter() {
            if self.count(table) > 0 {
                valid |= 1 << (table as u8);
            }
        }

        let mut out = Vec::new();
        out.extend_from_slice(&0_u32.to_le_bytes());
        out.extend_from_slice(&[2, 0, 0, 1]);
        out.extend_from_slice(&valid.to_le_bytes());
        out.extend_from_slice(&0x0000_1600_3301_FA00_u64.to_le_bytes());
        for table in TableId::iter() {
            if self.count(table) > 0 {
                out.extend_from_slice(&self.count(table).to_le_bytes());
            }
        }

        for table in TableId::iter() {
            for row in &self.rows[table as usize] {
                for (column, value) in table.columns().iter().zip(row) {
                    let width = match column {
                        Column::U16 => 2,
                        Column::U32 => 4,
                        Column::Str => info.str_bytes(),
                        Column::Guid => info.guid_bytes(),
                        Column::Blob => info.blob_bytes(),
                        Column::Table(target) => info.table_index_bytes(*target),
                        Column::Coded(kind) => info.coded_index_bytes(*kind),
                    };
                    out.extend_from_slice(&value.to_le_bytes()[..usize::from(width)]);
                }
            }
        }

        out
    }

    fn metadata_root(&self) -> Vec<u8> {
        let streams: [(&str, Vec<u8>); 5] = [
            ("#~", self.tables_stream()),
            ("#Strings", self.heaps.strings.clone()),
            ("#US", self.heaps.user_strings.clone()),
            ("#GUID", self.heaps.guids.clone()),
            ("#Blob", self.heaps.blobs.clone()),
        ];

        let version = b"v4.0.30319\0\0";
        let mut header_size = 16 + version.len() + 4;
        for (name, _) in &streams {
            header_size += 8 + align(name.len() + 1, 4);
        }

        let mut out = Vec::new();
        out.extend_from_slice(&0x424A_5342_u32.to_le_bytes());
        out.extend_from_slice(&1_u16.to_le_bytes());
        out.extend_from_slice(&1_u16.to_le_bytes());
        out.extend_from_slice(&0_u32.to_le_bytes());
        out.extend_from_slice(&(version.len() as u32).to_le_bytes());
        out.extend_from_slice(version);
        out.extend_from_slice(&0_u16.to_le_bytes());
        out.extend_from_slice(&(streams.len() as u16).to_le_bytes());

        let mut offset = header_size;
        for (name, data) in &streams {
            let size = align(data.len(), 4);
            out.extend_from_slice(&(offset as u32).to_le_bytes());
            out.extend_from_slice(&(size as u32).to_le_bytes());
            out.extend_from_slice(name.as_bytes());
            out.resize(out.len() + align(name.len() + 1, 4) - name.len(), 0);
            offset += size;
        }

        for (_, data) in &streams {
            out.extend_from_slice(data);
            out.resize(align(out.len(), 4), 0);
        }

        out
    }
}

fn align(value: usize, alignment: usize) -> usize {
    (value + alignment - 1) & !(alignment - 1)
}

/// Wrap `metadata` into a PE32 image with one section holding the CLI header and the metadata
fn pe_image(metadata: &[u8]) -> Vec<u8> {
    let mut section = Vec::with_capacity(CLI_HEADER_SIZE + metadata.len());
    section.extend_from_slice(&(CLI_HEADER_SIZE as u32).to_le_bytes());
    section.extend_from_slice(&2_u16.to_le_bytes());
    section.extend_from_slice(&5_u16.to_le_bytes());
    section.extend_from_slice(&(SECTION_RVA + CLI_HEADER_SIZE as u32).to_le_bytes());
    section.extend_from_slice(&(metadata.len() as u32).to_le_bytes());
    section.extend_from_slice(&1_u32.to_le_bytes());
    section.resize(CLI_HEADER_SIZE, 0);
    section.extend_from_slice(metadata);

    let virtual_size = section.len() as u32;
    let raw_size = align(section.len(), FILE_ALIGNMENT);
    section.resize(raw_size, 0);

    let mut image = vec![0_u8; FILE_ALIGNMENT];
    image[0] = b'M';
    image[1] = b'Z';
    image[0x3C..0x40].copy_from_slice(&0x80_u32.to_le_bytes());

    let mut headers = Vec::new();
    headers.extend_from_slice(b"PE\0\0");
    // COFF
    headers.extend_from_slice(&0x014C_u16.to_le_bytes());
    headers.extend_from_slice(&1_u16.to_le_bytes());
    headers.extend_from_slice(&[0; 12]);
    headers.extend_from_slice(&0x00E0_u16.to_le_bytes());
    headers.extend_from_slice(&0x2102_u16.to_le_bytes());
    // Optional header, standard fields
    headers.extend_from_slice(&0x010B_u16.to_le_bytes());
    headers.extend_from_slice(&[8, 0]);
    headers.extend_from_slice(&(raw_size as u32).to_le_bytes());
    headers.extend_from_slice(&0_u32.to_le_bytes());
    headers.extend_from_slice(&0_u32.to_le_bytes());
    headers.extend_from_slice(&0_u32.to_le_bytes());
    headers.extend_from_slice(&SECTION_RVA.to_le_bytes());
    headers.extend_from_slice(&0_u32.to_le_bytes());
    // Windows fields
    headers.extend_from_slice(&0x0040_0000_u32.to_le_bytes());
    headers.extend_from_slice(&0x2000_u32.to_le_bytes());
    headers.extend_from_slice(&(FILE_ALIGNMENT as u32).to_le_bytes());
    for version in [4_u16, 0, 0, 0, 4, 0] {
        headers.extend_from_slice(&version.to_le_bytes());
    }
    headers.extend_from_slice(&0_u32.to_le_bytes());
    let image_size = SECTION_RVA + align(virtual_size as usize, 0x2000) as u32;
    headers.extend_from_slice(&image_size.to_le_bytes());
    headers.extend_from_slice(&(FILE_ALIGNMENT as u32).to_le_bytes());
    headers.extend_from_slice(&0_u32.to_le_bytes());
    headers.extend_from_slice(&3_u16.to_le_bytes());
    headers.extend_from_slice(&0x8540_u16.to_le_bytes());
    for size in [0x0010_0000_u32, 0x1000, 0x0010_0000, 0x1000] {
        headers.extend_from_slice(&size.to_le_bytes());
    }
    headers.extend_from_slice(&0_u32.to_le_bytes());
    headers.extend_from_slice(&16_u32.to_le_bytes());
    for directory in 0..16 {
        if directory == 14 {
            headers.extend_from_slice(&SECTION_RVA.to_le_bytes());
            headers.extend_from_slice(&(CLI_HEADER_SIZE as u32).to_le_bytes());
        } else {
            headers.extend_from_slice(&[0; 8]);
        }
    }
    // Section table
    headers.extend_from_slice(b".text\0\0\0");
    headers.extend_from_slice(&virtual_size.to_le_bytes());
    headers.extend_from_slice(&SECTION_RVA.to_le_bytes());
    headers.extend_from_slice(&(raw_size as u32).to_le_bytes());
    headers.extend_from_slice(&(FILE_ALIGNMENT as u32).to_le_bytes());
    headers.extend_from_slice(&[0; 12]);
    headers.extend_from_slice(&0x6000_0020_u32.to_le_bytes());

    image[0x80..0x80 + headers.len()].copy_from_slice(&headers);
    image.extend_from_slice(&section);
    image
}
