use std::{
    fmt,
    sync::{Arc, OnceLock, Weak},
};

use crate::{
    metadata::{
        constants::ConstantValue,
        customattributes::{CustomAttributeRc, KnownAttributeSet, NullabilityInfo},
        knowntypes::{KnownAttribute, KnownType},
        members::Modifiers,
        module::{Module, ModuleRc},
        signatures::{SignatureDecoder, WrapperProvider},
        tables::{FieldAttributes, FieldRaw},
        token::Token,
        typesystem::{Accessibility, TypeDefRef, TypeWrapper},
    },
    utils::get_or_try_init,
    Result,
};

/// A reference counted [`FieldDefinition`]
pub type FieldRc = Arc<FieldDefinition>;

/// A row of the `Field` table
pub struct FieldDefinition {
    module: Weak<Module>,
    /// Row in the `Field` table
    pub rid: u32,
    /// Token of the row
    pub token: Token,
    /// `FieldAttributes` bits
    pub flags: u16,
    name: Arc<str>,
    signature: u32,
    declaring_type: TypeDefRef,
    field_type: OnceLock<TypeWrapper>,
    constant: OnceLock<Option<ConstantValue>>,
    custom_attributes: OnceLock<Vec<CustomAttributeRc>>,
}

impl FieldDefinition {
    pub(crate) fn new(module: &Module, row: &FieldRaw, declaring_type: TypeDefRef) -> Result<Self> {
        Ok(FieldDefinition {
            module: module.weak(),
            rid: row.rid,
            token: row.token,
            flags: row.flags,
            name: module.string_of(row.name)?,
            signature: row.signature,
            declaring_type,
            field_type: OnceLock::new(),
            constant: OnceLock::new(),
            custom_attributes: OnceLock::new(),
        })
    }

    /// Declared name
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
            .ok_or_else(|| invalid_operation!("Field {} used after its module was released", self.name))
    }

    /// Declared accessibility
    #[must_use]
    pub fn accessibility(&self) -> Accessibility {
        Accessibility::from_member_flags(self.flags)
    }

    /// `static`
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags & FieldAttributes::STATIC != 0
    }

    /// `readonly`
    #[must_use]
    pub fn is_init_only(&self) -> bool {
        self.flags & FieldAttributes::INIT_ONLY != 0
    }

    /// Compile time constant, `const` or an enum value
    #[must_use]
    pub fn is_literal(&self) -> bool {
        self.flags & FieldAttributes::LITERAL != 0
    }

    /// Special name, such as the `value__` field of an enum
    #[must_use]
    pub fn is_special_name(&self) -> bool {
        self.flags & FieldAttributes::RT_SPECIAL_NAME != 0
    }

    /// Declared type, modifiers included
    ///
    /// # Errors
    /// Returns an error for a released module or a malformed signature.
    pub fn field_type(&self) -> Result<&TypeWrapper> {
        get_or_try_init(&self.field_type, || {
            let module = self.module()?;
            let context = self.declaring_type.get()?.generic_context()?;
            let provider = WrapperProvider::new(&module, &context);
            SignatureDecoder::new(module.blob_of(self.signature)?, &provider).decode_field_signature()
        })
    }

    /// Value of a literal field, from the `Constant` table
    ///
    /// # Errors
    /// Returns `Malformed` if the constant blob cannot be decoded.
    pub fn constant(&self) -> Result<Option<&ConstantValue>> {
        get_or_try_init(&self.constant, || self.module()?.constant_of(self.token))
            .map(Option::as_ref)
    }

    /// Attributes applied to the field
    ///
    /// # Errors
    /// Returns an error for a released module or an unreadable attribute row.
    pub fn custom_attributes(&self) -> Result<&[CustomAttributeRc]> {
        get_or_try_init(&self.custom_attributes, || {
            self.module()?.custom_attributes(self.token)
        })
        .map(Vec::as_slice)
    }

    /// `volatile`, carried as a required `IsVolatile` modifier
    ///
    /// # Errors
    /// Returns an error if the signature cannot be decoded.
    pub fn is_volatile(&self) -> Result<bool> {
        Ok(self.field_type()?.has_modifier(KnownType::IsVolatile))
    }

    /// Source modifiers: `const`, `static`, `readonly`, `volatile`, `required`
    ///
    /// # Errors
    /// Returns an error if the signature or attributes cannot be realized.
    pub fn modifiers(&self) -> Result<Modifiers> {
        let mut modifiers = Modifiers::empty();

        if self.is_literal() {
            modifiers |= Modifiers::CONST;
        } else if self.is_static() {
            modifiers |= Modifiers::STATIC;
        }
        if self.is_init_only() {
            modifiers |= Modifiers::READONLY;
        }
        if self.is_volatile()? {
            modifiers |= Modifiers::VOLATILE;
        }
        if self.custom_attributes()?.has(KnownAttribute::RequiredMember) {
            modifiers |= Modifiers::REQUIRED;
        }

        Ok(modifiers)
    }

    /// Nullability of the field type, falling back to the declaring type's context
    ///
    /// # Errors
    /// Returns an error if the type or a nullability attribute cannot be decoded.
    pub fn nullability(&self) -> Result<NullabilityInfo> {
        let context = self.declaring_type.get()?.nullable_context()?;
        NullabilityInfo::decode(self.field_type()?, self.custom_attributes()?, context)
    }
}

impl fmt::Debug for FieldDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDefinition")
            .field("name", &self.name)
            .field("token", &self.token)
            .field("declaring_type", &self.declaring_type)
            .finish()
    }
}
