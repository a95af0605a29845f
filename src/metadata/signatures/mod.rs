//! Signature blob decoding, ECMA-335 II.23.2.
//!
//! [`SignatureDecoder`] walks a blob and hands every type it meets to a
//! [`SignatureTypeProvider`], which decides what a type becomes. The module graph uses
//! [`WrapperProvider`] to produce [`crate::metadata::typesystem::TypeWrapper`] nodes directly;
//! [`TypeSignatureProvider`] keeps the raw, token level shape and needs no module at all.
//!
//! # Example
//!
//! ```rust
//! use cilsurface::metadata::signatures::{parse_method_signature, TypeSignature};
//! use cilsurface::metadata::knowntypes::KnownType;
//!
//! // instance void (int32, string)
//! let signature = parse_method_signature(&[0x20, 0x02, 0x01, 0x08, 0x0E])?;
//! assert!(signature.header.has_this());
//! assert_eq!(signature.parameter_types.len(), 2);
//! assert!(matches!(signature.return_type, TypeSignature::Primitive(KnownType::Void)));
//! # Ok::<(), cilsurface::Error>(())
//! ```

mod parser;
mod provider;
mod types;

pub use parser::SignatureDecoder;
pub use provider::{SignatureTypeProvider, WrapperProvider};
pub use types::{
    parse_field_signature, parse_method_signature, parse_property_signature,
    parse_type_spec_signature, TypeSignature, TypeSignatureProvider,
};

/// Shape of a general array: rank plus the sizes and lower bounds that were specified.
///
/// Either list may be shorter than `rank`; trailing dimensions then have no size or bound.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ArrayShape {
    /// Number of dimensions
    pub rank: u32,
    /// Sizes of the leading dimensions
    pub sizes: Vec<u32>,
    /// Lower bounds of the leading dimensions
    pub lower_bounds: Vec<i32>,
}

/// Calling convention of a method signature
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallingConvention {
    /// Managed default
    Default,
    /// `cdecl`
    CDecl,
    /// `stdcall`
    StdCall,
    /// `thiscall`
    ThisCall,
    /// `fastcall`
    FastCall,
    /// Variable arguments
    VarArgs,
    /// Unmanaged, the convention is carried in modifiers
    Unmanaged,
}

/// The leading byte of a signature blob
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignatureHeader(pub u8);

impl SignatureHeader {
    const KIND_MASK: u8 = 0x0F;
    const GENERIC: u8 = 0x10;
    const HAS_THIS: u8 = 0x20;
    const EXPLICIT_THIS: u8 = 0x40;

    /// Kind value of a field signature
    pub const FIELD: u8 = 0x06;
    /// Kind value of a local variable signature
    pub const LOCAL_SIG: u8 = 0x07;
    /// Kind value of a property signature
    pub const PROPERTY: u8 = 0x08;
    /// Kind value of a generic method instantiation
    pub const METHOD_SPEC: u8 = 0x0A;

    /// The kind nibble
    #[must_use]
    pub fn kind(self) -> u8 {
        self.0 & Self::KIND_MASK
    }

    /// True for a method (or function pointer) signature
    #[must_use]
    pub fn is_method(self) -> bool {
        self.kind() <= 0x05 || self.kind() == 0x09
    }

    /// Calling convention of a method signature
    #[must_use]
    pub fn calling_convention(self) -> CallingConvention {
        match self.kind() {
            0x01 => CallingConvention::CDecl,
            0x02 => CallingConvention::StdCall,
            0x03 => CallingConvention::ThisCall,
            0x04 => CallingConvention::FastCall,
            0x05 => CallingConvention::VarArgs,
            0x09 => CallingConvention::Unmanaged,
            _ => CallingConvention::Default,
        }
    }

    /// Generic method with a parameter count
    #[must_use]
    pub fn is_generic(self) -> bool {
        self.0 & Self::GENERIC != 0
    }

    /// Instance method or property
    #[must_use]
    pub fn has_this(self) -> bool {
        self.0 & Self::HAS_THIS != 0
    }

    /// `this` is passed as an explicit first parameter
    #[must_use]
    pub fn explicit_this(self) -> bool {
        self.0 & Self::EXPLICIT_THIS != 0
    }
}

/// A decoded `MethodDefSig`, `MethodRefSig` or function pointer signature.
#[derive(Clone, Debug, PartialEq)]
pub struct MethodSignature<T> {
    /// Convention byte
    pub header: SignatureHeader,
    /// Number of method type parameters
    pub generic_parameter_count: u32,
    /// Return type
    pub return_type: T,
    /// Parameter types, vararg extras after `required_parameter_count`
    pub parameter_types: Vec<T>,
    /// Parameters before the vararg sentinel, all of them without one
    pub required_parameter_count: usize,
}

/// A decoded `PropertySig`.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertySignature<T> {
    /// Instance property
    pub has_this: bool,
    /// Property type
    pub property_type: T,
    /// Indexer parameter types
    pub parameter_types: Vec<T>,
}
