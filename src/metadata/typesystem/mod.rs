//! The type graph.
//!
//! Every type a signature, base type list or attribute can name is a [`TypeWrapper`]: a closed
//! union over the shapes of ECMA-335 types. Named shapes point into the graph of lazily realized
//! wrappers ([`TypeDefinition`], [`TypeReference`], [`GenericParameter`]), composite shapes
//! (arrays, pointers, instantiations, ...) own their element types.
//!
//! Wrappers are realized on first access and cached by their owning [`crate::metadata::module::Module`]
//! for its lifetime, so asking twice for the same row yields the same `Arc`. Links between wrappers
//! are weak ([`TypeDefRef`], [`GenericParamRef`]); the module is the only strong owner.

mod accessibility;
mod generic;
mod semantics;
mod typedef;
mod typeref;

use std::{
    fmt,
    sync::{Arc, Weak},
};

pub use accessibility::Accessibility;
pub use generic::{GenericContext, GenericParamRc, GenericParameter, Variance};
pub use semantics::MethodSemanticsLookup;
pub use typedef::{TypeDefRc, TypeDefinition, TypeKind};
pub use typeref::{ResolutionScope, TypeReference, TypeReferenceRc};

use crate::{
    metadata::{
        knowntypes::KnownType, module::ModuleRc, repository::Repository,
        signatures::ArrayShape, token::Token,
    },
    Result,
};

/// Element type codes of signature blobs, ECMA-335 II.23.1.16
#[allow(non_snake_case, missing_docs)]
pub mod ELEMENT_TYPE {
    // Marks the end of a list
    pub const END: u8 = 0x00;
    pub const VOID: u8 = 0x01;
    pub const BOOLEAN: u8 = 0x02;
    pub const CHAR: u8 = 0x03;
    pub const I1: u8 = 0x04;
    pub const U1: u8 = 0x05;
    pub const I2: u8 = 0x06;
    pub const U2: u8 = 0x07;
    pub const I4: u8 = 0x08;
    pub const U4: u8 = 0x09;
    pub const I8: u8 = 0x0a;
    pub const U8: u8 = 0x0b;
    pub const R4: u8 = 0x0c;
    pub const R8: u8 = 0x0d;
    pub const STRING: u8 = 0x0e;
    // Followed by type
    pub const PTR: u8 = 0x0f;
    // Followed by type
    pub const BYREF: u8 = 0x10;
    // Followed by TypeDef or TypeRef token
    pub const VALUETYPE: u8 = 0x11;
    // Followed by TypeDef or TypeRef token
    pub const CLASS: u8 = 0x12;
    // Generic parameter of a type, followed by its number
    pub const VAR: u8 = 0x13;
    // type rank boundsCount bound1 … loCount lo1 …
    pub const ARRAY: u8 = 0x14;
    // Followed by type type-arg-count type-1 ... type-n
    pub const GENERICINST: u8 = 0x15;
    pub const TYPEDBYREF: u8 = 0x16;
    // System.IntPtr
    pub const I: u8 = 0x18;
    // System.UIntPtr
    pub const U: u8 = 0x19;
    // Followed by full method signature
    pub const FNPTR: u8 = 0x1b;
    // System.Object
    pub const OBJECT: u8 = 0x1c;
    // Single-dim array with 0 lower bound
    pub const SZARRAY: u8 = 0x1d;
    // Generic parameter of a method, followed by its number
    pub const MVAR: u8 = 0x1e;
    // Required modifier, followed by a TypeDef or TypeRef token
    pub const CMOD_REQD: u8 = 0x1f;
    // Optional modifier, followed by a TypeDef or TypeRef token
    pub const CMOD_OPT: u8 = 0x20;
    // Start of the vararg part of a call site signature
    pub const SENTINEL: u8 = 0x41;
    // Local is pinned
    pub const PINNED: u8 = 0x45;
}

/// A weak link to a realized [`TypeDefinition`].
#[derive(Clone)]
pub struct TypeDefRef {
    weak: Weak<TypeDefinition>,
    token: Token,
    full_name: Arc<str>,
}

impl TypeDefRef {
    /// Link to `definition`
    #[must_use]
    pub fn new(definition: &TypeDefRc) -> Self {
        TypeDefRef {
            weak: Arc::downgrade(definition),
            token: definition.token,
            full_name: definition.full_name_arc(),
        }
    }

    /// The definition, `None` once its module was released
    #[must_use]
    pub fn upgrade(&self) -> Option<TypeDefRc> {
        self.weak.upgrade()
    }

    /// The definition
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidOperation`] if the owning module was released.
    pub fn get(&self) -> Result<TypeDefRc> {
        self.weak
            .upgrade()
            .ok_or_else(|| invalid_operation!("Type {} used after its module was released", self.full_name))
    }

    /// Token of the definition in its module
    #[must_use]
    pub fn token(&self) -> Token {
        self.token
    }

    /// Full name, nested types joined with `.`
    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// True if both link the same definition
    #[must_use]
    pub fn ptr_eq(&self, other: &TypeDefRef) -> bool {
        Weak::ptr_eq(&self.weak, &other.weak)
    }
}

impl fmt::Debug for TypeDefRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeDef({} {})", self.full_name, self.token)
    }
}

/// A weak link to a realized [`GenericParameter`].
#[derive(Clone)]
pub struct GenericParamRef {
    weak: Weak<GenericParameter>,
    name: Arc<str>,
    number: u16,
    is_method: bool,
}

impl GenericParamRef {
    /// Link to `parameter`
    #[must_use]
    pub fn new(parameter: &GenericParamRc) -> Self {
        GenericParamRef {
            weak: Arc::downgrade(parameter),
            name: parameter.name_arc(),
            number: parameter.number,
            is_method: parameter.is_method(),
        }
    }

    /// The parameter, `None` once its module was released
    #[must_use]
    pub fn upgrade(&self) -> Option<GenericParamRc> {
        self.weak.upgrade()
    }

    /// Declared name, e.g. `T`
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ordinal within the owner's parameter list
    #[must_use]
    pub fn number(&self) -> u16 {
        self.number
    }

    /// True for a method type parameter
    #[must_use]
    pub fn is_method(&self) -> bool {
        self.is_method
    }
}

impl fmt::Debug for GenericParamRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = if self.is_method { "!!" } else { "!" };
        write!(f, "{}{} {}", prefix, self.number, self.name)
    }
}

/// Array of an element type.
#[derive(Clone, Debug)]
pub struct ArrayType {
    /// The element type
    pub element_type: TypeWrapper,
    /// `None` for a single dimensional, zero based array
    pub shape: Option<ArrayShape>,
}

impl ArrayType {
    /// Number of dimensions
    #[must_use]
    pub fn rank(&self) -> u32 {
        self.shape.as_ref().map_or(1, |shape| shape.rank)
    }
}

/// A type with a custom modifier attached.
#[derive(Clone, Debug)]
pub struct ModifiedType {
    /// The type without the modifier
    pub unmodified: TypeWrapper,
    /// The modifier type, e.g. `System.Runtime.CompilerServices.IsVolatile`
    pub modifier: TypeWrapper,
    /// `modreq` when true, `modopt` otherwise
    pub is_required: bool,
}

/// An instantiation of a generic type.
#[derive(Clone, Debug)]
pub struct GenericInstance {
    /// The generic type definition or reference
    pub generic_type: TypeWrapper,
    /// Arguments in declaration order, outer type arguments first
    pub type_arguments: Vec<TypeWrapper>,
}

/// Any type a signature, base type list or attribute can name.
#[derive(Clone, Debug)]
pub enum TypeWrapper {
    /// A type with its own element type code
    Primitive(KnownType),
    /// A type defined in a loaded module
    Definition(TypeDefRef),
    /// A reference to a type in another module
    Reference(TypeReferenceRc),
    /// `T[]`, `T[,]`, ...
    Array(Box<ArrayType>),
    /// `T*`
    Pointer(Box<TypeWrapper>),
    /// `ref T`
    ByReference(Box<TypeWrapper>),
    /// A pinned local
    Pinned(Box<TypeWrapper>),
    /// `modreq` or `modopt` applied to a type
    Modified(Box<ModifiedType>),
    /// `G<A, B>`
    Parameterized(Box<GenericInstance>),
    /// A type or method type parameter
    GenericParameter(GenericParamRef),
    /// A type that could not be located, carrying its raw name
    Unknown(Arc<str>),
}

impl TypeWrapper {
    /// Placeholder for a type that could not be located
    #[must_use]
    pub fn unknown(name: &str) -> TypeWrapper {
        TypeWrapper::Unknown(Arc::from(name))
    }

    /// Full name as it reads in source: nested types joined with `.`, generic arity markers
    /// replaced by the type arguments
    #[must_use]
    pub fn full_name(&self) -> String {
        match self {
            TypeWrapper::Primitive(known) => known.full_name().to_string(),
            TypeWrapper::Definition(definition) => definition.full_name().to_string(),
            TypeWrapper::Reference(reference) => reference.full_name().to_string(),
            TypeWrapper::Array(array) => match &array.shape {
                // A general array of rank one is not a vector
                Some(shape) if shape.rank == 1 => format!("{}[*]", array.element_type.full_name()),
                _ => {
                    let commas = ",".repeat(array.rank().saturating_sub(1) as usize);
                    format!("{}[{}]", array.element_type.full_name(), commas)
                }
            },
            TypeWrapper::Pointer(element) => format!("{}*", element.full_name()),
            TypeWrapper::ByReference(element) => format!("{}&", element.full_name()),
            TypeWrapper::Pinned(element) => element.full_name(),
            TypeWrapper::Modified(modified) => modified.unmodified.full_name(),
            TypeWrapper::Parameterized(instance) => {
                let arguments: Vec<String> = instance
                    .type_arguments
                    .iter()
                    .map(TypeWrapper::full_name)
                    .collect();
                apply_type_arguments(&instance.generic_type.full_name(), &arguments)
            }
            TypeWrapper::GenericParameter(parameter) => parameter.name().to_string(),
            TypeWrapper::Unknown(name) => name.to_string(),
        }
    }

    /// Simple name of a named type, the full name of composite shapes
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            TypeWrapper::Primitive(known) => known.name().to_string(),
            TypeWrapper::Definition(definition) => match definition.upgrade() {
                Some(definition) => definition.name().to_string(),
                None => definition.full_name().to_string(),
            },
            TypeWrapper::Reference(reference) => reference.name().to_string(),
            _ => self.full_name(),
        }
    }

    /// The module owning a named type. Composite shapes answer for their element type.
    #[must_use]
    pub fn module(&self) -> Option<ModuleRc> {
        match self {
            TypeWrapper::Definition(definition) => {
                definition.upgrade().and_then(|definition| definition.module().ok())
            }
            TypeWrapper::Reference(reference) => reference.module().ok(),
            TypeWrapper::GenericParameter(parameter) => parameter
                .upgrade()
                .and_then(|parameter| parameter.module().ok()),
            TypeWrapper::Primitive(_) | TypeWrapper::Unknown(_) => None,
            _ => self.element_type().and_then(TypeWrapper::module),
        }
    }

    /// The wrapped type of arrays, pointers, references, pinned and modified types
    #[must_use]
    pub fn element_type(&self) -> Option<&TypeWrapper> {
        match self {
            TypeWrapper::Array(array) => Some(&array.element_type),
            TypeWrapper::Pointer(element)
            | TypeWrapper::ByReference(element)
            | TypeWrapper::Pinned(element) => Some(element),
            TypeWrapper::Modified(modified) => Some(&modified.unmodified),
            _ => None,
        }
    }

    /// The well-known identity of a named type
    #[must_use]
    pub fn known_type(&self) -> Option<KnownType> {
        match self {
            TypeWrapper::Primitive(known) => Some(*known),
            TypeWrapper::Definition(definition) => KnownType::from_name(definition.full_name()),
            TypeWrapper::Reference(reference) => KnownType::from_name(reference.full_name()),
            TypeWrapper::Modified(modified) => modified.unmodified.known_type(),
            _ => None,
        }
    }

    /// True for value types.
    ///
    /// References answer with the `valuetype` marker of the signature that produced them.
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        match self {
            TypeWrapper::Primitive(known) => known.is_value_type(),
            TypeWrapper::Definition(definition) => definition
                .upgrade()
                .and_then(|definition| definition.kind().ok())
                .is_some_and(TypeKind::is_value_type),
            TypeWrapper::Reference(reference) => reference.is_value_type(),
            TypeWrapper::Modified(modified) => modified.unmodified.is_value_type(),
            TypeWrapper::Parameterized(instance) => instance.generic_type.is_value_type(),
            _ => false,
        }
    }

    /// True for `System.Void`
    #[must_use]
    pub fn is_void(&self) -> bool {
        matches!(self.known_type(), Some(KnownType::Void))
    }

    /// True for `ref T`
    #[must_use]
    pub fn is_by_reference(&self) -> bool {
        match self {
            TypeWrapper::ByReference(_) => true,
            TypeWrapper::Modified(modified) => modified.unmodified.is_by_reference(),
            _ => false,
        }
    }

    /// The type without any custom modifiers
    #[must_use]
    pub fn unmodified(&self) -> &TypeWrapper {
        match self {
            TypeWrapper::Modified(modified) => modified.unmodified.unmodified(),
            _ => self,
        }
    }

    /// True if a modifier of type `modifier` is applied at the top of this type
    #[must_use]
    pub fn has_modifier(&self, modifier: KnownType) -> bool {
        match self {
            TypeWrapper::Modified(modified) => {
                modified.modifier.known_type() == Some(modifier)
                    || modified.modifier.full_name() == modifier.full_name()
                    || modified.unmodified.has_modifier(modifier)
            }
            _ => false,
        }
    }

    /// Replace references and primitives by the definitions loaded in `repository`.
    ///
    /// References that cannot be located degrade to [`TypeWrapper::Unknown`]. Composite shapes are
    /// returned unchanged, their element types resolve on demand.
    ///
    /// # Errors
    /// Returns an error for a released module or an overlong forwarder chain.
    pub fn resolve(&self, repository: &Repository) -> Result<TypeWrapper> {
        match self {
            TypeWrapper::Reference(reference) => match reference.resolve(repository)? {
                Some(definition) => Ok(TypeWrapper::Definition(TypeDefRef::new(&definition))),
                None => Ok(TypeWrapper::Unknown(reference.full_name_arc())),
            },
            TypeWrapper::Primitive(known) => {
                match repository.get_type_by_name(known.full_name())? {
                    Some(definition) => Ok(definition),
                    None => Ok(self.clone()),
                }
            }
            _ => Ok(self.clone()),
        }
    }
}

impl fmt::Display for TypeWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

/// Replace each `` `N `` arity marker of `generic_name` by `<...>` over the next `N` arguments
fn apply_type_arguments(generic_name: &str, arguments: &[String]) -> String {
    let mut output = String::with_capacity(generic_name.len() + arguments.len() * 16);
    let mut remaining = arguments;
    let mut chars = generic_name.chars().peekable();

    while let Some(current) = chars.next() {
        if current != '`' {
            output.push(current);
            continue;
        }

        let mut arity = 0_usize;
        while let Some(digit) = chars.peek().and_then(|c| c.to_digit(10)) {
            arity = arity * 10 + digit as usize;
            chars.next();
        }

        let take = arity.min(remaining.len());
        let (current_args, rest) = remaining.split_at(take);
        output.push('<');
        output.push_str(&current_args.join(", "));
        output.push('>');
        remaining = rest;
    }

    if !remaining.is_empty() {
        output.push('<');
        output.push_str(&remaining.join(", "));
        output.push('>');
    }

    output
}
