use std::cell::Cell;

use crate::{
    metadata::{
        knowntypes::KnownType,
        module::Module,
        signatures::{ArrayShape, MethodSignature, SignatureDecoder},
        tables::TableId,
        token::Token,
        typesystem::{
            ArrayType, GenericContext, GenericInstance, ModifiedType, TypeDefRef, TypeWrapper,
        },
    },
    Error::RecursionLimit,
    Result,
};

/// Nesting limit of `TypeSpec` blobs referring to further `TypeSpec`s
const MAX_TYPE_SPEC_DEPTH: usize = 16;

/// Turns the pieces of a decoded signature into a caller chosen type representation.
pub trait SignatureTypeProvider {
    /// The type representation produced
    type Type;

    /// A primitive element type code
    ///
    /// # Errors
    /// Every primitive code must map; a code without a mapping is an invariant violation.
    fn primitive(&self, element_type: u8) -> Result<Self::Type>;

    /// A `TypeDef`, `TypeRef` or `TypeSpec` token
    ///
    /// # Errors
    /// Returns an error if the token cannot be decoded in the provider's module.
    fn type_from_token(&self, token: Token, is_value_type: bool) -> Result<Self::Type>;

    /// `T[]`
    fn sz_array(&self, element_type: Self::Type) -> Self::Type;

    /// `T[,]` and other general arrays
    fn array(&self, element_type: Self::Type, shape: ArrayShape) -> Self::Type;

    /// `T*`
    fn pointer(&self, element_type: Self::Type) -> Self::Type;

    /// `ref T`
    fn by_reference(&self, element_type: Self::Type) -> Self::Type;

    /// A pinned local
    fn pinned(&self, element_type: Self::Type) -> Self::Type;

    /// `modreq` / `modopt`
    fn modified(&self, modifier: Self::Type, unmodified: Self::Type, is_required: bool)
        -> Self::Type;

    /// `G<A, B>`
    ///
    /// # Errors
    /// Returns an error if the provider rejects the instantiation.
    fn generic_instantiation(
        &self,
        generic_type: Self::Type,
        type_arguments: Vec<Self::Type>,
    ) -> Result<Self::Type>;

    /// `!n`
    ///
    /// # Errors
    /// Returns an error if the provider rejects the index.
    fn generic_type_parameter(&self, index: u32) -> Result<Self::Type>;

    /// `!!n`
    ///
    /// # Errors
    /// Returns an error if the provider rejects the index.
    fn generic_method_parameter(&self, index: u32) -> Result<Self::Type>;

    /// A function pointer
    ///
    /// # Errors
    /// Returns an error if the provider rejects function pointers.
    fn function_pointer(&self, signature: MethodSignature<Self::Type>) -> Result<Self::Type>;
}

/// Provider producing [`TypeWrapper`]s within one module and generic context.
///
/// Tokens become links to the module's cached wrappers. Type parameters outside the context
/// degrade to `!n` / `!!n` placeholders. Function pointers decay to `System.IntPtr`, the type
/// graph has no function pointer shape.
pub struct WrapperProvider<'m> {
    module: &'m Module,
    context: &'m GenericContext,
    type_spec_depth: Cell<usize>,
}

impl<'m> WrapperProvider<'m> {
    /// Create a provider for signatures of `module`
    #[must_use]
    pub fn new(module: &'m Module, context: &'m GenericContext) -> Self {
        WrapperProvider {
            module,
            context,
            type_spec_depth: Cell::new(0),
        }
    }

    /// Decode the `TypeSpec` row `rid`
    ///
    /// # Errors
    /// Returns an error for a missing row, a malformed blob or `TypeSpec`s nested too deep.
    pub fn decode_type_spec(&self, rid: u32) -> Result<TypeWrapper> {
        let depth = self.type_spec_depth.get() + 1;
        if depth > MAX_TYPE_SPEC_DEPTH {
            return Err(RecursionLimit(MAX_TYPE_SPEC_DEPTH));
        }

        let blob = self.module.type_spec_blob(rid)?;

        self.type_spec_depth.set(depth);
        let decoded = SignatureDecoder::new(blob, self).decode_type_spec();
        self.type_spec_depth.set(depth - 1);

        decoded
    }
}

impl SignatureTypeProvider for WrapperProvider<'_> {
    type Type = TypeWrapper;

    fn primitive(&self, element_type: u8) -> Result<TypeWrapper> {
        KnownType::from_element_type(element_type)
            .map(TypeWrapper::Primitive)
            .ok_or_else(|| {
                invalid_operation!("No known type for element type {:#04x}", element_type)
            })
    }

    fn type_from_token(&self, token: Token, is_value_type: bool) -> Result<TypeWrapper> {
        match TableId::from_u8(token.table()) {
            Some(TableId::TypeDef) => {
                let definition = self.module.type_definition(token.row())?;
                Ok(TypeWrapper::Definition(TypeDefRef::new(&definition)))
            }
            Some(TableId::TypeRef) => {
                let reference = self.module.type_reference(token.row())?;
                reference.mark_value_type(is_value_type);
                Ok(TypeWrapper::Reference(reference))
            }
            Some(TableId::TypeSpec) => self.decode_type_spec(token.row()),
            _ => Err(malformed_error!(
                "Token {} does not name a type",
                token
            )),
        }
    }

    fn sz_array(&self, element_type: TypeWrapper) -> TypeWrapper {
        TypeWrapper::Array(Box::new(ArrayType {
            element_type,
            shape: None,
        }))
    }

    fn array(&self, element_type: TypeWrapper, shape: ArrayShape) -> TypeWrapper {
        TypeWrapper::Array(Box::new(ArrayType {
            element_type,
            shape: Some(shape),
        }))
    }

    fn pointer(&self, element_type: TypeWrapper) -> TypeWrapper {
        TypeWrapper::Pointer(Box::new(element_type))
    }

    fn by_reference(&self, element_type: TypeWrapper) -> TypeWrapper {
        TypeWrapper::ByReference(Box::new(element_type))
    }

    fn pinned(&self, element_type: TypeWrapper) -> TypeWrapper {
        TypeWrapper::Pinned(Box::new(element_type))
    }

    fn modified(&self, modifier: TypeWrapper, unmodified: TypeWrapper, is_required: bool) -> TypeWrapper {
        TypeWrapper::Modified(Box::new(ModifiedType {
            unmodified,
            modifier,
            is_required,
        }))
    }

    fn generic_instantiation(
        &self,
        generic_type: TypeWrapper,
        type_arguments: Vec<TypeWrapper>,
    ) -> Result<TypeWrapper> {
        Ok(TypeWrapper::Parameterized(Box::new(GenericInstance {
            generic_type,
            type_arguments,
        })))
    }

    fn generic_type_parameter(&self, index: u32) -> Result<TypeWrapper> {
        Ok(match self.context.type_parameters.get(index as usize) {
            Some(parameter) => TypeWrapper::GenericParameter(parameter.clone()),
            None => TypeWrapper::unknown(&format!("!{index}")),
        })
    }

    fn generic_method_parameter(&self, index: u32) -> Result<TypeWrapper> {
        Ok(match self.context.method_parameters.get(index as usize) {
            Some(parameter) => TypeWrapper::GenericParameter(parameter.clone()),
            None => TypeWrapper::unknown(&format!("!!{index}")),
        })
    }

    fn function_pointer(&self, _signature: MethodSignature<TypeWrapper>) -> Result<TypeWrapper> {
        Ok(TypeWrapper::Primitive(KnownType::IntPtr))
    }
}
