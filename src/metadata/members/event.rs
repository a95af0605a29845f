use std::{
    fmt,
    sync::{Arc, OnceLock, Weak},
};

use crate::{
    metadata::{
        customattributes::{CustomAttributeRc, NullabilityInfo},
        members::{MethodRc, Modifiers},
        module::{Module, ModuleRc},
        tables::{EventRaw, MethodSemanticsAttributes},
        token::Token,
        typesystem::{Accessibility, TypeDefRef, TypeWrapper},
    },
    utils::get_or_try_init,
    Result,
};

/// A reference counted [`EventDefinition`]
pub type EventRc = Arc<EventDefinition>;

/// A row of the `Event` table
pub struct EventDefinition {
    module: Weak<Module>,
    /// Row in the `Event` table
    pub rid: u32,
    /// Token of the row
    pub token: Token,
    /// `EventAttributes` bits
    pub flags: u16,
    name: Arc<str>,
    event_type_token: Token,
    declaring_type: TypeDefRef,
    event_type: OnceLock<TypeWrapper>,
    custom_attributes: OnceLock<Vec<CustomAttributeRc>>,
}

impl EventDefinition {
    pub(crate) fn new(module: &Module, row: &EventRaw, declaring_type: TypeDefRef) -> Result<Self> {
        Ok(EventDefinition {
            module: module.weak(),
            rid: row.rid,
            token: row.token,
            flags: row.flags,
            name: module.string_of(row.name)?,
            event_type_token: row.event_type.token,
            declaring_type,
            event_type: OnceLock::new(),
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
            .ok_or_else(|| invalid_operation!("Event {} used after its module was released", self.name))
    }

    /// Delegate type of the event
    ///
    /// # Errors
    /// Returns an error for a released module or an undecodable type token.
    pub fn event_type(&self) -> Result<&TypeWrapper> {
        get_or_try_init(&self.event_type, || {
            let module = self.module()?;
            let context = self.declaring_type.get()?.generic_context()?;
            module.decode_type_token(self.event_type_token, &context)
        })
    }

    fn accessor(&self, role: MethodSemanticsAttributes) -> Result<Option<MethodRc>> {
        let module = self.module()?;
        match module.method_semantics()?.accessor(self.token, role) {
            Some(rid) => Ok(Some(module.method_definition(rid)?)),
            None => Ok(None),
        }
    }

    /// The `add` accessor
    ///
    /// # Errors
    /// Returns an error if the accessor cannot be realized.
    pub fn adder(&self) -> Result<Option<MethodRc>> {
        self.accessor(MethodSemanticsAttributes::ADD_ON)
    }

    /// The `remove` accessor
    ///
    /// # Errors
    /// Returns an error if the accessor cannot be realized.
    pub fn remover(&self) -> Result<Option<MethodRc>> {
        self.accessor(MethodSemanticsAttributes::REMOVE_ON)
    }

    /// The raise accessor, which C# never emits
    ///
    /// # Errors
    /// Returns an error if the accessor cannot be realized.
    pub fn raiser(&self) -> Result<Option<MethodRc>> {
        self.accessor(MethodSemanticsAttributes::FIRE)
    }

    // Adder, else remover
    fn representative(&self) -> Result<Option<MethodRc>> {
        match self.adder()? {
            Some(adder) => Ok(Some(adder)),
            None => self.remover(),
        }
    }

    /// The widest accessibility of the accessors
    ///
    /// # Errors
    /// Returns an error if the accessors cannot be realized.
    pub fn accessibility(&self) -> Result<Accessibility> {
        let accessors = [self.adder()?, self.remover()?, self.raiser()?];
        Ok(accessors
            .iter()
            .flatten()
            .map(|method| method.accessibility())
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

    /// Modifiers of the accessors
    ///
    /// # Errors
    /// Returns an error if the accessors cannot be realized.
    pub fn modifiers(&self) -> Result<Modifiers> {
        match self.representative()? {
            Some(method) => method.modifiers(),
            None => Ok(Modifiers::empty()),
        }
    }

    /// Attributes applied to the event
    ///
    /// # Errors
    /// Returns an error for a released module or an unreadable attribute row.
    pub fn custom_attributes(&self) -> Result<&[CustomAttributeRc]> {
        get_or_try_init(&self.custom_attributes, || {
            self.module()?.custom_attributes(self.token)
        })
        .map(Vec::as_slice)
    }

    /// Nullability of the delegate type
    ///
    /// # Errors
    /// Returns an error if a nullability attribute cannot be decoded.
    pub fn nullability(&self) -> Result<NullabilityInfo> {
        let context = match self.representative()? {
            Some(method) => method.nullable_context()?,
            None => self.declaring_type.get()?.nullable_context()?,
        };
        NullabilityInfo::decode(self.event_type()?, self.custom_attributes()?, context)
    }
}

impl fmt::Debug for EventDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDefinition")
            .field("name", &self.name)
            .field("token", &self.token)
            .field("declaring_type", &self.declaring_type)
            .finish()
    }
}
