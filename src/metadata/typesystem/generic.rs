use std::sync::{Arc, OnceLock, Weak};

use crate::{
    metadata::{
        customattributes::{CustomAttributeRc, KnownAttributeSet},
        knowntypes::KnownAttribute,
        module::{Module, ModuleRc},
        tables::{GenericParamAttributes, GenericParamRaw, TableId},
        token::Token,
        typesystem::{GenericParamRef, TypeWrapper},
    },
    utils::get_or_try_init,
    Result,
};

/// A reference counted [`GenericParameter`]
pub type GenericParamRc = Arc<GenericParameter>;

/// Variance of a generic interface or delegate parameter
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Variance {
    /// Invariant
    None,
    /// `out T`
    Covariant,
    /// `in T`
    Contravariant,
}

/// The type parameters in scope while decoding a signature.
///
/// Signatures name type parameters by position only (`!0`, `!!1`); the context maps those
/// positions back to the declaring parameters. It lives for one decode operation.
#[derive(Clone, Debug, Default)]
pub struct GenericContext {
    /// Parameters of the declaring type, by number
    pub type_parameters: Vec<GenericParamRef>,
    /// Parameters of the method being decoded, by number
    pub method_parameters: Vec<GenericParamRef>,
}

impl GenericContext {
    /// Context of a type declaring `type_parameters`
    #[must_use]
    pub fn new(type_parameters: &[GenericParamRc]) -> Self {
        GenericContext {
            type_parameters: type_parameters.iter().map(GenericParamRef::new).collect(),
            method_parameters: Vec::new(),
        }
    }

    /// This context extended by a method declaring `method_parameters`
    #[must_use]
    pub fn with_method(&self, method_parameters: &[GenericParamRc]) -> Self {
        GenericContext {
            type_parameters: self.type_parameters.clone(),
            method_parameters: method_parameters.iter().map(GenericParamRef::new).collect(),
        }
    }

    /// True if no parameters are in scope
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.type_parameters.is_empty() && self.method_parameters.is_empty()
    }
}

/// A row of the `GenericParam` table.
pub struct GenericParameter {
    module: Weak<Module>,
    /// Row in the `GenericParam` table
    pub rid: u32,
    /// Token of the row
    pub token: Token,
    /// Position in the owner's parameter list
    pub number: u16,
    /// `GenericParamAttributes` bits
    pub flags: u16,
    name: Arc<str>,
    owner: Token,
    constraints: OnceLock<Vec<TypeWrapper>>,
    custom_attributes: OnceLock<Vec<CustomAttributeRc>>,
}

impl GenericParameter {
    pub(crate) fn new(module: &Module, row: &GenericParamRaw) -> Result<Self> {
        Ok(GenericParameter {
            module: module.weak(),
            rid: row.rid,
            token: row.token,
            number: row.number,
            flags: row.flags,
            name: module.string_of(row.name)?,
            owner: row.owner.token,
            constraints: OnceLock::new(),
            custom_attributes: OnceLock::new(),
        })
    }

    /// Declared name, e.g. `TKey`
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        self.name.clone()
    }

    /// `TypeDef` or `MethodDef` token of the declaring entity
    #[must_use]
    pub fn owner(&self) -> Token {
        self.owner
    }

    /// True if declared by a method
    #[must_use]
    pub fn is_method(&self) -> bool {
        self.owner.table() == TableId::MethodDef as u8
    }

    /// The owning module
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidOperation`] once the module was released.
    pub fn module(&self) -> Result<ModuleRc> {
        self.module
            .upgrade()
            .ok_or_else(|| invalid_operation!("Generic parameter {} used after its module was released", self.name))
    }

    /// Declared variance
    #[must_use]
    pub fn variance(&self) -> Variance {
        match self.flags & GenericParamAttributes::VARIANCE_MASK {
            GenericParamAttributes::COVARIANT => Variance::Covariant,
            GenericParamAttributes::CONTRAVARIANT => Variance::Contravariant,
            _ => Variance::None,
        }
    }

    /// `class` constraint
    #[must_use]
    pub fn has_reference_type_constraint(&self) -> bool {
        self.flags & GenericParamAttributes::REFERENCE_TYPE_CONSTRAINT != 0
    }

    /// `struct` constraint, also set for `unmanaged`
    #[must_use]
    pub fn has_value_type_constraint(&self) -> bool {
        self.flags & GenericParamAttributes::NOT_NULLABLE_VALUE_TYPE_CONSTRAINT != 0
    }

    /// `new()` constraint, implied by `struct`
    #[must_use]
    pub fn has_default_constructor_constraint(&self) -> bool {
        self.flags & GenericParamAttributes::DEFAULT_CONSTRUCTOR_CONSTRAINT != 0
    }

    /// `allows ref struct`
    #[must_use]
    pub fn allows_by_ref_like(&self) -> bool {
        self.flags & GenericParamAttributes::ALLOW_BY_REF_LIKE != 0
    }

    /// `unmanaged` constraint, marked by `IsUnmanagedAttribute`
    ///
    /// # Errors
    /// Returns an error if the parameter's attributes cannot be read.
    pub fn has_unmanaged_constraint(&self) -> Result<bool> {
        Ok(self.custom_attributes()?.has(KnownAttribute::IsUnmanaged))
    }

    /// Type constraints, decoded in the owner's generic context
    ///
    /// # Errors
    /// Returns an error for a released module or a malformed constraint.
    pub fn constraints(&self) -> Result<&[TypeWrapper]> {
        get_or_try_init(&self.constraints, || {
            let module = self.module()?;
            let context = module.generic_context_of(self.owner)?;

            let mut constraints = Vec::new();
            for constraint in module.index()?.constraints_of(self.rid) {
                constraints.push(module.decode_type_token(constraint, &context)?);
            }

            Ok(constraints)
        })
        .map(Vec::as_slice)
    }

    /// Attributes applied to the parameter
    ///
    /// # Errors
    /// Returns an error for a released module or an unreadable attribute row.
    pub fn custom_attributes(&self) -> Result<&[CustomAttributeRc]> {
        get_or_try_init(&self.custom_attributes, || {
            self.module()?.custom_attributes(self.token)
        })
        .map(Vec::as_slice)
    }
}

impl std::fmt::Debug for GenericParameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenericParameter")
            .field("name", &self.name)
            .field("number", &self.number)
            .field("owner", &self.owner)
            .field("flags", &format_args!("{:#06x}", self.flags))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::tables::MethodAttributes,
        test::{AttributeDecl, GenericParamDecl, ImageBuilder, MethodDecl, ParamDecl, SigType, TypeDecl},
    };

    fn map() -> ModuleRc {
        let image = ImageBuilder::new("Collections")
            .add_type(
                TypeDecl::interface("Acme", "IMap`2")
                    .public()
                    .generic_param(
                        GenericParamDecl::new("TKey")
                            .flags(GenericParamAttributes::CONTRAVARIANT)
                            .constraint(SigType::generic(
                                SigType::class("System.IComparable`1"),
                                vec![SigType::Var(0)],
                            )),
                    )
                    .generic_param(GenericParamDecl::new("TValue").flags(
                        GenericParamAttributes::COVARIANT
                            | GenericParamAttributes::REFERENCE_TYPE_CONSTRAINT
                            | GenericParamAttributes::DEFAULT_CONSTRUCTOR_CONSTRAINT,
                    ))
                    .method(
                        MethodDecl::new("Convert", SigType::MVar(0))
                            .flags(MethodAttributes::ABSTRACT | MethodAttributes::VIRTUAL | MethodAttributes::NEW_SLOT)
                            .generic_param(
                                GenericParamDecl::new("TOut")
                                    .flags(GenericParamAttributes::NOT_NULLABLE_VALUE_TYPE_CONSTRAINT)
                                    .constraint(SigType::Var(1))
                                    .attribute(AttributeDecl::marker(
                                        "System.Runtime.CompilerServices.IsUnmanagedAttribute",
                                    )),
                            )
                            .param(ParamDecl::new("key", SigType::Var(0))),
                    ),
            )
            .build();
        Module::from_bytes(image).unwrap()
    }


    #[test]
    fn type_parameters() {
        let module = map();
        let map = module.type_by_name("Acme.IMap`2").unwrap().unwrap();
        let parameters = map.generic_parameters().unwrap();
        let names: Vec<&str> = parameters.iter().map(|parameter| parameter.name()).collect();
        assert_eq!(names, ["TKey", "TValue"]);

        let key = &parameters[0];
        assert_eq!(key.number, 0);
        assert_eq!(key.owner(), map.token);
        assert!(!key.is_method());
        assert_eq!(key.variance(), Variance::Contravariant);
        let constraints: Vec<String> = key.constraints().unwrap().iter().map(TypeWrapper::full_name).collect();
        assert_eq!(constraints, ["System.IComparable<TKey>"]);

        let value = &parameters[1];
        assert_eq!(value.variance(), Variance::Covariant);
        assert!(value.has_reference_type_constraint());
        assert!(value.has_default_constructor_constraint());
        assert!(!value.has_value_type_constraint());
        assert!(value.constraints().unwrap().is_empty());
    }

    #[test]
    fn method_parameters_see_both_scopes() {
        let module = map();
        let map = module.type_by_name("Acme.IMap`2").unwrap().unwrap();
        let convert = &map.methods().unwrap()[0];

        let parameters = convert.generic_parameters().unwrap();
        assert_eq!(parameters.len(), 1);
        let output = &parameters[0];
        assert!(output.is_method());
        assert!(output.has_value_type_constraint());
        assert!(output.has_unmanaged_constraint().unwrap());
        assert_eq!(output.constraints().unwrap()[0].full_name(), "TValue");

        assert_eq!(convert.return_type().unwrap().full_name(), "TOut");
        assert_eq!(convert.parameters().unwrap()[0].parameter_type().full_name(), "TKey");
    }

    #[test]
    fn contexts() {
        let module = map();
        let map = module.type_by_name("Acme.IMap`2").unwrap().unwrap();
        let context = map.generic_context().unwrap();
        assert_eq!(context.type_parameters.len(), 2);
        assert!(context.method_parameters.is_empty());

        let convert = &map.methods().unwrap()[0];
        let context = context.with_method(convert.generic_parameters().unwrap());
        assert_eq!(context.method_parameters[0].name(), "TOut");
        assert!(GenericContext::default().is_empty());
    }
}
