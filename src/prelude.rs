//! # cilsurface Prelude
//!
//! The types needed to open a module, walk its public surface and inspect signatures and
//! attributes. Import it with `use cilsurface::prelude::*;`.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all cilsurface operations
pub use crate::Error;

/// The result type used throughout cilsurface
pub use crate::Result;

/// Low-level file parsing utilities
pub use crate::{File, Parser};

// ================================================================================================
// Entry Points
// ================================================================================================

/// A main module and everything loaded for it
pub use crate::metadata::repository::{Repository, RepositoryBuilder};

/// Locating and loading referenced assemblies
pub use crate::metadata::resolver::{AssemblyResolver, ResolverConfig};

/// One loaded metadata file
pub use crate::metadata::module::{Module, ModuleRc};

/// Namespace tree over the public types of a module
pub use crate::metadata::namespace::Namespace;

// ================================================================================================
// Type System
// ================================================================================================

/// Type definitions, references and the composite type wrapper
pub use crate::metadata::typesystem::{
    Accessibility, ArrayType, GenericContext, GenericInstance, GenericParamRc, GenericParameter,
    ModifiedType, ResolutionScope, TypeDefRc, TypeDefinition, TypeKind, TypeReference,
    TypeReferenceRc, TypeWrapper, Variance,
};

/// Members of a type definition
pub use crate::metadata::members::{
    EventDefinition, EventRc, FieldDefinition, FieldRc, Member, MemberFilter, MemberKind,
    MethodDefinition, MethodRc, Modifiers, ParamRc, ParameterDefinition, PropertyDefinition,
    PropertyRc, RefKind,
};

/// Well-known types and attributes
pub use crate::metadata::knowntypes::{KnownAttribute, KnownType};

// ================================================================================================
// Signatures, Constants and Attributes
// ================================================================================================

/// Signature decoding
pub use crate::metadata::signatures::{
    CallingConvention, MethodSignature, PropertySignature, SignatureDecoder, SignatureHeader,
    SignatureTypeProvider,
};

/// Constant values of fields and parameters
pub use crate::metadata::constants::ConstantValue;

/// Custom attributes and nullable reference type annotations
pub use crate::metadata::customattributes::{
    ArgumentValue, CustomAttribute, CustomAttributeRc, CustomAttributeValue, NamedArgument,
    Nullability, NullabilityInfo,
};

// ================================================================================================
// Identity and Tokens
// ================================================================================================

/// Assembly names, versions and public key tokens
pub use crate::metadata::identity::{AssemblyIdentity, AssemblyVersion, Identity, PublicKeyToken};

/// Metadata token type for referencing table entries
pub use crate::metadata::token::Token;

/// Metadata table identifiers
pub use crate::metadata::tables::TableId;
