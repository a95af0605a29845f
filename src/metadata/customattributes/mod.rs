//! Custom attributes and their decoded arguments.
//!
//! Attributes are indexed once per module by their parent token and realized on demand. The
//! attribute type name is known without decoding the blob, so lookups for well-known attributes
//! (`ParamArrayAttribute`, `NullableAttribute`, ...) stay cheap. Decoding happens on first access
//! to the arguments and is cached.
//!
//! Enum arguments need the enum's underlying type. [`CustomAttribute::decode`] can only answer
//! that for enums defined in the attribute's own module; [`CustomAttribute::value`] consults a
//! [`Repository`] for the rest. A failed decode caches nothing, so a later call with more context
//! can still succeed.
//!
//! # References
//!
//! - ECMA-335 6th Edition, Partition II, Section 23.3 - Custom Attributes

mod nullability;
mod parser;
mod types;

use std::{
    fmt,
    sync::{Arc, OnceLock, Weak},
};

pub use nullability::{Nullability, NullabilityInfo};
pub use parser::{normalize_type_name, AttributeDecoder, EnumResolver};
pub use types::{
    ArgumentValue, AttributeArgument, CustomAttributeValue, NamedArgument, SERIALIZATION_TYPE,
};

use crate::{
    metadata::{
        knowntypes::{KnownAttribute, KnownType},
        module::{Module, ModuleRc},
        repository::Repository,
        signatures::{SignatureDecoder, WrapperProvider},
        tables::{CodedIndex, CustomAttributeRaw, MemberRefRaw, TableId},
        token::Token,
        typesystem::{GenericContext, TypeWrapper},
    },
    utils::get_or_try_init,
    Error::UnresolvedType,
    Result,
};

/// A reference counted [`CustomAttribute`]
pub type CustomAttributeRc = Arc<CustomAttribute>;

/// One application of an attribute
pub struct CustomAttribute {
    module: Weak<Module>,
    /// Row in the `CustomAttribute` table
    pub rid: u32,
    /// Token of the row
    pub token: Token,
    /// The annotated entity
    pub parent: Token,
    constructor: CodedIndex,
    type_name: Arc<str>,
    known: Option<KnownAttribute>,
    blob_index: u32,
    value: OnceLock<CustomAttributeValue>,
}

impl CustomAttribute {
    pub(crate) fn new(module: &Module, row: &CustomAttributeRaw) -> Result<Self> {
        let type_name = attribute_type_name(module, &row.constructor)?;
        Ok(CustomAttribute {
            module: module.weak(),
            rid: row.rid,
            token: row.token,
            parent: row.parent.token,
            constructor: row.constructor,
            known: KnownAttribute::from_name(&type_name),
            type_name,
            blob_index: row.value,
            value: OnceLock::new(),
        })
    }

    /// Full name of the attribute type
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The well-known identity of the attribute type
    #[must_use]
    pub fn known(&self) -> Option<KnownAttribute> {
        self.known
    }

    /// True if this is an application of `known`
    #[must_use]
    pub fn is(&self, known: KnownAttribute) -> bool {
        self.known == Some(known)
    }

    /// Token of the constructor, a `MethodDef` or `MemberRef`
    #[must_use]
    pub fn constructor(&self) -> Token {
        self.constructor.token
    }

    /// The owning module
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidOperation`] once the module was released.
    pub fn module(&self) -> Result<ModuleRc> {
        self.module.upgrade().ok_or_else(|| {
            invalid_operation!("Attribute {} used after its module was released", self.type_name)
        })
    }

    /// The attribute type, a definition or a reference
    ///
    /// # Errors
    /// Returns an error for a released module or an unreadable constructor row.
    pub fn attribute_type(&self) -> Result<TypeWrapper> {
        let module = self.module()?;
        match self.constructor.tag {
            TableId::MethodDef => {
                let method = module.method_definition(self.constructor.row)?;
                Ok(TypeWrapper::Definition(method.declaring_type().clone()))
            }
            TableId::MemberRef => {
                let member = module.row::<MemberRefRaw>(self.constructor.row)?;
                module.decode_type_token(member.class.token, &GenericContext::default())
            }
            _ => Err(malformed_error!(
                "Attribute constructor {} is neither MethodDef nor MemberRef",
                self.constructor.token
            )),
        }
    }

    /// Parameter types of the constructor, in order
    ///
    /// # Errors
    /// Returns an error if the constructor signature cannot be decoded.
    pub fn constructor_parameter_types(&self) -> Result<Vec<TypeWrapper>> {
        let module = self.module()?;
        match self.constructor.tag {
            TableId::MethodDef => Ok(module
                .method_definition(self.constructor.row)?
                .signature()?
                .parameter_types
                .clone()),
            TableId::MemberRef => {
                let member = module.row::<MemberRefRaw>(self.constructor.row)?;
                let context = GenericContext::default();
                let provider = WrapperProvider::new(&module, &context);
                Ok(SignatureDecoder::new(module.blob_of(member.signature)?, &provider)
                    .decode_method_signature()?
                    .parameter_types)
            }
            _ => Err(malformed_error!(
                "Attribute constructor {} is neither MethodDef nor MemberRef",
                self.constructor.token
            )),
        }
    }

    /// Arguments, decoded with the enums of the attribute's own module
    ///
    /// # Errors
    /// Returns `Malformed` for an invalid blob and [`crate::Error::UnresolvedType`] for an enum
    /// defined in another module.
    pub fn decode(&self) -> Result<&CustomAttributeValue> {
        get_or_try_init(&self.value, || {
            let module = self.module()?;
            let resolver = ModuleEnums { module: &module };
            self.decode_with(&module, &resolver)
        })
    }

    /// Arguments, decoded with the enums loaded in `repository`
    ///
    /// # Errors
    /// Returns `Malformed` for an invalid blob and [`crate::Error::UnresolvedType`] for an enum
    /// the repository cannot locate.
    pub fn value(&self, repository: &Repository) -> Result<&CustomAttributeValue> {
        get_or_try_init(&self.value, || {
            let module = self.module()?;
            let resolver = RepositoryEnums {
                module: &module,
                repository,
            };
            self.decode_with(&module, &resolver)
        })
    }

    fn decode_with<R: EnumResolver>(
        &self,
        module: &Module,
        resolver: &R,
    ) -> Result<CustomAttributeValue> {
        let parameter_types = self.constructor_parameter_types()?;
        let blob = if self.blob_index == 0 {
            &[][..]
        } else {
            module.blob_of(self.blob_index)?
        };
        AttributeDecoder::new(blob, resolver).decode(&parameter_types)
    }
}

impl fmt::Debug for CustomAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomAttribute")
            .field("type_name", &self.type_name)
            .field("token", &self.token)
            .field("parent", &self.parent)
            .finish()
    }
}

/// Lookup of well-known attributes in an attribute list
pub trait KnownAttributeSet {
    /// The first application of `known`
    fn find(&self, known: KnownAttribute) -> Option<&CustomAttributeRc>;

    /// True if `known` is applied
    fn has(&self, known: KnownAttribute) -> bool {
        self.find(known).is_some()
    }
}

impl KnownAttributeSet for [CustomAttributeRc] {
    fn find(&self, known: KnownAttribute) -> Option<&CustomAttributeRc> {
        self.iter().find(|attribute| attribute.is(known))
    }
}

fn attribute_type_name(module: &Module, constructor: &CodedIndex) -> Result<Arc<str>> {
    match constructor.tag {
        TableId::MethodDef => {
            let owner = module
                .index()?
                .method_owner(constructor.row)
                .ok_or_else(|| {
                    malformed_error!("Attribute constructor {} has no owner", constructor.token)
                })?;
            Ok(module.type_definition(owner)?.full_name_arc())
        }
        TableId::MemberRef => {
            let member = module.row::<MemberRefRaw>(constructor.row)?;
            match member.class.tag {
                TableId::TypeRef => Ok(module.type_reference(member.class.row)?.full_name_arc()),
                TableId::TypeDef => Ok(module.type_definition(member.class.row)?.full_name_arc()),
                TableId::TypeSpec => {
                    let spec = module
                        .decode_type_token(member.class.token, &GenericContext::default())?;
                    let generic = match &spec {
                        TypeWrapper::Parameterized(instance) => &instance.generic_type,
                        other => other,
                    };
                    Ok(Arc::from(generic.full_name()))
                }
                _ => Err(malformed_error!(
                    "Attribute constructor {} is not declared on a type",
                    constructor.token
                )),
            }
        }
        _ => Err(malformed_error!(
            "Attribute constructor {} is neither MethodDef nor MemberRef",
            constructor.token
        )),
    }
}

// Enums of the attribute's own module
struct ModuleEnums<'m> {
    module: &'m Module,
}

impl EnumResolver for ModuleEnums<'_> {
    fn underlying_type(&self, enum_type: &TypeWrapper) -> Result<KnownType> {
        match enum_type.unmodified() {
            TypeWrapper::Definition(definition) => definition.get()?.enum_underlying_type(),
            other => self.underlying_type_by_name(&other.full_name()),
        }
    }

    fn underlying_type_by_name(&self, name: &str) -> Result<KnownType> {
        let name = normalize_type_name(name);
        match self.module.type_by_name(&name)? {
            Some(definition) => definition.enum_underlying_type(),
            None => Err(UnresolvedType(name)),
        }
    }
}

// Enums anywhere in a repository, the attribute's module first
struct RepositoryEnums<'m, 'r> {
    module: &'m Module,
    repository: &'r Repository,
}

impl EnumResolver for RepositoryEnums<'_, '_> {
    fn underlying_type(&self, enum_type: &TypeWrapper) -> Result<KnownType> {
        match enum_type.unmodified() {
            TypeWrapper::Definition(definition) => definition.get()?.enum_underlying_type(),
            TypeWrapper::Reference(reference) => match reference.resolve(self.repository)? {
                Some(definition) => definition.enum_underlying_type(),
                None => Err(UnresolvedType(reference.full_name().to_string())),
            },
            other => self.underlying_type_by_name(&other.full_name()),
        }
    }

    fn underlying_type_by_name(&self, name: &str) -> Result<KnownType> {
        let name = normalize_type_name(name);
        if let Some(definition) = self.module.type_by_name(&name)? {
            return definition.enum_underlying_type();
        }

        match self.repository.get_type_by_name(&name)? {
            Some(TypeWrapper::Definition(definition)) => definition.get()?.enum_underlying_type(),
            _ => Err(UnresolvedType(name)),
        }
    }
}
