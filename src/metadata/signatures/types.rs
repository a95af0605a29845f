use crate::{
    metadata::{
        knowntypes::KnownType,
        signatures::{
            ArrayShape, MethodSignature, PropertySignature, SignatureDecoder,
            SignatureTypeProvider,
        },
        token::Token,
    },
    Result,
};

/// A signature type at token level, independent of any module.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeSignature {
    /// A type with its own element type code
    Primitive(KnownType),
    /// `class` followed by a `TypeDef`, `TypeRef` or `TypeSpec` token
    Class(Token),
    /// `valuetype` followed by a `TypeDef`, `TypeRef` or `TypeSpec` token
    ValueType(Token),
    /// Single dimensional, zero based array
    SzArray(Box<TypeSignature>),
    /// General array
    Array(Box<TypeSignature>, ArrayShape),
    /// Unmanaged pointer
    Ptr(Box<TypeSignature>),
    /// Managed reference
    ByRef(Box<TypeSignature>),
    /// Pinned local
    Pinned(Box<TypeSignature>),
    /// Custom modifier applied to a type
    Modified {
        /// The modifier type
        modifier: Box<TypeSignature>,
        /// The modified type
        unmodified: Box<TypeSignature>,
        /// `modreq` when true
        is_required: bool,
    },
    /// Generic type and its arguments
    GenericInst(Box<TypeSignature>, Vec<TypeSignature>),
    /// Type parameter by number
    GenericParamType(u32),
    /// Method type parameter by number
    GenericParamMethod(u32),
    /// Function pointer
    FnPtr(Box<MethodSignature<TypeSignature>>),
}

/// Provider producing [`TypeSignature`]s; tokens are kept as they are.
pub struct TypeSignatureProvider;

impl SignatureTypeProvider for TypeSignatureProvider {
    type Type = TypeSignature;

    fn primitive(&self, element_type: u8) -> Result<TypeSignature> {
        KnownType::from_element_type(element_type)
            .map(TypeSignature::Primitive)
            .ok_or_else(|| invalid_operation!("No known type for element type {:#04x}", element_type))
    }

    fn type_from_token(&self, token: Token, is_value_type: bool) -> Result<TypeSignature> {
        Ok(if is_value_type {
            TypeSignature::ValueType(token)
        } else {
            TypeSignature::Class(token)
        })
    }

    fn sz_array(&self, element_type: TypeSignature) -> TypeSignature {
        TypeSignature::SzArray(Box::new(element_type))
    }

    fn array(&self, element_type: TypeSignature, shape: ArrayShape) -> TypeSignature {
        TypeSignature::Array(Box::new(element_type), shape)
    }

    fn pointer(&self, element_type: TypeSignature) -> TypeSignature {
        TypeSignature::Ptr(Box::new(element_type))
    }

    fn by_reference(&self, element_type: TypeSignature) -> TypeSignature {
        TypeSignature::ByRef(Box::new(element_type))
    }

    fn pinned(&self, element_type: TypeSignature) -> TypeSignature {
        TypeSignature::Pinned(Box::new(element_type))
    }

    fn modified(
        &self,
        modifier: TypeSignature,
        unmodified: TypeSignature,
        is_required: bool,
    ) -> TypeSignature {
        TypeSignature::Modified {
            modifier: Box::new(modifier),
            unmodified: Box::new(unmodified),
            is_required,
        }
    }

    fn generic_instantiation(
        &self,
        generic_type: TypeSignature,
        type_arguments: Vec<TypeSignature>,
    ) -> Result<TypeSignature> {
        Ok(TypeSignature::GenericInst(
            Box::new(generic_type),
            type_arguments,
        ))
    }

    fn generic_type_parameter(&self, index: u32) -> Result<TypeSignature> {
        Ok(TypeSignature::GenericParamType(index))
    }

    fn generic_method_parameter(&self, index: u32) -> Result<TypeSignature> {
        Ok(TypeSignature::GenericParamMethod(index))
    }

    fn function_pointer(
        &self,
        signature: MethodSignature<TypeSignature>,
    ) -> Result<TypeSignature> {
        Ok(TypeSignature::FnPtr(Box::new(signature)))
    }
}

/// Decode a method signature blob at token level
///
/// # Errors
/// Returns an error if the blob is not a valid method signature.
pub fn parse_method_signature(data: &[u8]) -> Result<MethodSignature<TypeSignature>> {
    SignatureDecoder::new(data, &TypeSignatureProvider).decode_method_signature()
}

/// Decode a field signature blob at token level
///
/// # Errors
/// Returns an error if the blob is not a valid field signature.
pub fn parse_field_signature(data: &[u8]) -> Result<TypeSignature> {
    SignatureDecoder::new(data, &TypeSignatureProvider).decode_field_signature()
}

/// Decode a property signature blob at token level
///
/// # Errors
/// Returns an error if the blob is not a valid property signature.
pub fn parse_property_signature(data: &[u8]) -> Result<PropertySignature<TypeSignature>> {
    SignatureDecoder::new(data, &TypeSignatureProvider).decode_property_signature()
}

/// Decode a type specification blob at token level
///
/// # Errors
/// Returns an error if the blob is not a valid type.
pub fn parse_type_spec_signature(data: &[u8]) -> Result<TypeSignature> {
    SignatureDecoder::new(data, &TypeSignatureProvider).decode_type_spec()
}
