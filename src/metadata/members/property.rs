use std::{
    fmt,
    sync::{Arc, OnceLock, Weak},
};

use crate::{
    metadata::{
        customattributes::{CustomAttributeRc, KnownAttributeSet, NullabilityInfo},
        knowntypes::{KnownAttribute, KnownType},
        members::{MemberKind, MethodRc, Modifiers},
        module::{Module, ModuleRc},
        signatures::{PropertySignature, SignatureDecoder, WrapperProvider},
        tables::{MethodSemanticsAttributes, PropertyRaw},
        token::Token,
        typesystem::{Accessibility, TypeDefRef, TypeWrapper},
    },
    utils::get_or_try_init,
    Result,
};

/// A reference counted [`PropertyDefinition`]
pub type PropertyRc = Arc<PropertyDefinition>;

/// A row of the `Property` table
pub struct PropertyDefinition {
    module: Weak<Module>,
    /// Row in the `Property` table
    pub rid: u32,
    /// Token of the row
    pub token: Token,
    /// `PropertyAttributes` bits
    pub flags: u16,
    name: Arc<str>,
    signature_index: u32,
    declaring_type: TypeDefRef,
    signature: OnceLock<PropertySignature<TypeWrapper>>,
    custom_attributes: OnceLock<Vec<CustomAttributeRc>>,
}

impl PropertyDefinition {
    pub(crate) fn new(
        module: &Module,
        row: &PropertyRaw,
        declaring_type: TypeDefRef,
    ) -> Result<Self> {
        Ok(PropertyDefinition {
            module: module.weak(),
            rid: row.rid,
            token: row.token,
            flags: row.flags,
            name: module.string_of(row.name)?,
            signature_index: row.signature,
            declaring_type,
            signature: OnceLock::new(),
            custom_attributes: OnceLock::new(),
        })
    }

    /// Declared name, `Item` for most indexers
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declaring type
    #[must_use]
    pub fn declaring_type(&self) -> &TypeDefRef {
        &self.declaring_type
    }

    /// The owning module
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidOperation`] once the module was released.
    pub fn module(&self) -> Result<ModuleRc> {
        self.module
            .upgrade()
            .ok_or_else(|| invalid_operation!("Property {} used after its module was released", self.name))
    }

    /// Decoded signature
    ///
    /// # Errors
    /// Returns an error for a released module or a malformed blob.
    pub fn signature(&self) -> Result<&PropertySignature<TypeWrapper>> {
        get_or_try_init(&self.signature, || {
            let module = self.module()?;
            let context = self.declaring_type.get()?.generic_context()?;
            let provider = WrapperProvider::new(&module, &context);
            SignatureDecoder::new(module.blob_of(self.signature_index)?, &provider)
                .decode_property_signature()
        })
    }

    /// Property type, modifiers included
    ///
    /// # Errors
    /// Returns an error if the signature cannot be decoded.
    pub fn property_type(&self) -> Result<&TypeWrapper> {
        Ok(&self.signature()?.property_type)
    }

    /// True for a property with parameters
    ///
    /// # Errors
    /// Returns an error if the signature cannot be decoded.
    pub fn is_indexer(&self) -> Result<bool> {
        Ok(!self.signature()?.parameter_types.is_empty())
    }

    /// Property or indexer
    ///
    /// # Errors
    /// Returns an error if the signature cannot be decoded.
    pub fn kind(&self) -> Result<MemberKind> {
        Ok(if self.is_indexer()? {
            MemberKind::Indexer
        } else {
            MemberKind::Property
        })
    }

    fn accessor(&self, role: MethodSemanticsAttributes) -> Result<Option<MethodRc>> {
        let module = self.module()?;
        match module.method_semantics()?.accessor(self.token, role) {
            Some(rid) => Ok(Some(module.method_definition(rid)?)),
            None => Ok(None),
        }
    }

    /// The `get` accessor
    ///
    /// # Errors
    /// Returns an error if the accessor cannot be realized.
    pub fn getter(&self) -> Result<Option<MethodRc>> {
        self.accessor(MethodSemanticsAttributes::GETTER)
    }

    /// The `set` or `init` accessor
    ///
    /// # Errors
    /// Returns an error if the accessor cannot be realized.
    pub fn setter(&self) -> Result<Option<MethodRc>> {
        self.accessor(MethodSemanticsAttributes::SETTER)
    }

    /// True if the setter is `init` only
    ///
    /// # Errors
    /// Returns an error if the setter's signature cannot be decoded.
    pub fn is_init_only(&self) -> Result<bool> {
        match self.setter()? {
            Some(setter) => Ok(setter
                .return_type()?
                .has_modifier(KnownType::IsExternalInit)),
            None => Ok(false),
        }
    }

    /// The widest accessibility of the accessors
    ///
    /// # Errors
    /// Returns an error if the accessors cannot be realized.
    pub fn accessibility(&self) -> Result<Accessibility> {
        let getter = self.getter()?.map(|method| method.accessibility());
        let setter = self.setter()?.map(|method| method.accessibility());
        Ok(getter
            .into_iter()
            .chain(setter)
            .max()
            .unwrap_or(Accessibility::CompilerControlled))
    }

    /// True if the accessors are static
    ///
    /// # Errors
    /// Returns an error if the accessors cannot be realized.
    pub fn is_static(&self) -> Result<bool> {
        Ok(self.representative()?.is_some_and(|method| method.is_static()))
    }

    // Getter, or the setter of a write-only property
    fn representative(&self) -> Result<Option<MethodRc>> {
        match self.getter()? {
            Some(getter) => Ok(Some(getter)),
            None => self.setter(),
        }
    }

    /// Attributes applied to the property
    ///
    /// # Errors
    /// Returns an error for a released module or an unreadable attribute row.
    pub fn custom_attributes(&self) -> Result<&[CustomAttributeRc]> {
        get_or_try_init(&self.custom_attributes, || {
            self.module()?.custom_attributes(self.token)
        })
        .map(Vec::as_slice)
    }

    /// Modifiers of the accessors, plus `required`
    ///
    /// # Errors
    /// Returns an error if the accessors or attributes cannot be realized.
    pub fn modifiers(&self) -> Result<Modifiers> {
        let mut modifiers = match self.representative()? {
            Some(method) => method.modifiers()?,
            None => Modifiers::empty(),
        };

        if self.custom_attributes()?.has(KnownAttribute::RequiredMember) {
            modifiers |= Modifiers::REQUIRED;
        }

        Ok(modifiers)
    }

    /// Nullability of the property type, falling back to the accessor's context
    ///
    /// # Errors
    /// Returns an error if a nullability attribute cannot be decoded.
    pub fn nullability(&self) -> Result<NullabilityInfo> {
        let context = match self.representative()? {
            Some(method) => method.nullable_context()?,
            None => self.declaring_type.get()?.nullable_context()?,
        };
        NullabilityInfo::decode(self.property_type()?, self.custom_attributes()?, context)
    }
}

impl fmt::Debug for PropertyDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDefinition")
            .field("name", &self.name)
            .field("token", &self.token)
            .field("declaring_type", &self.declaring_type)
            .finish()
    }
}
