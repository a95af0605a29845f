use std::{
    fmt,
    sync::{Arc, OnceLock, Weak},
};

use crate::{
    metadata::{
        constants::ConstantValue,
        customattributes::{CustomAttributeRc, KnownAttributeSet, NullabilityInfo},
        knowntypes::KnownAttribute,
        module::{Module, ModuleRc},
        tables::{ParamAttributes, ParamRaw},
        token::Token,
        typesystem::TypeWrapper,
    },
    utils::get_or_try_init,
    Result,
};

/// A reference counted [`ParameterDefinition`]
pub type ParamRc = Arc<ParameterDefinition>;

/// How a parameter is passed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefKind {
    /// By value
    None,
    /// `ref`
    Ref,
    /// `out`
    Out,
    /// `in`
    In,
    /// `ref readonly`
    RefReadOnly,
}

impl RefKind {
    /// Source keyword, empty for by-value
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            RefKind::None => "",
            RefKind::Ref => "ref",
            RefKind::Out => "out",
            RefKind::In => "in",
            RefKind::RefReadOnly => "ref readonly",
        }
    }
}

/// A method parameter or the return value: its signature type joined with the `Param` row of
/// the same sequence number, if the method has one.
pub struct ParameterDefinition {
    module: Weak<Module>,
    method_rid: u32,
    /// 1-based position, 0 for the return value
    pub sequence: u16,
    /// `ParamAttributes` bits, 0 without a `Param` row
    pub flags: u16,
    /// Token of the `Param` row
    pub token: Option<Token>,
    name: Option<Arc<str>>,
    parameter_type: TypeWrapper,
    default_value: OnceLock<Option<ConstantValue>>,
    custom_attributes: OnceLock<Vec<CustomAttributeRc>>,
}

impl ParameterDefinition {
    pub(crate) fn new(
        module: &Module,
        method_rid: u32,
        sequence: u16,
        row: Option<&ParamRaw>,
        parameter_type: TypeWrapper,
    ) -> Result<Self> {
        let name = match row {
            Some(row) if row.name != 0 => Some(module.string_of(row.name)?),
            _ => None,
        };

        Ok(ParameterDefinition {
            module: module.weak(),
            method_rid,
            sequence,
            flags: row.map_or(0, |row| row.flags),
            token: row.map(|row| row.token),
            name,
            parameter_type,
            default_value: OnceLock::new(),
            custom_attributes: OnceLock::new(),
        })
    }

    /// Declared name, empty if the compiler did not record one
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    /// Type from the method signature, modifiers included
    #[must_use]
    pub fn parameter_type(&self) -> &TypeWrapper {
        &self.parameter_type
    }

    /// True for the return value pseudo parameter
    #[must_use]
    pub fn is_return(&self) -> bool {
        self.sequence == 0
    }

    /// The owning module
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidOperation`] once the module was released.
    pub fn module(&self) -> Result<ModuleRc> {
        self.module
            .upgrade()
            .ok_or_else(|| invalid_operation!("Parameter {} used after its module was released", self.name()))
    }

    /// `[In]`
    #[must_use]
    pub fn is_in(&self) -> bool {
        self.flags & ParamAttributes::IN != 0
    }

    /// `[Out]`
    #[must_use]
    pub fn is_out(&self) -> bool {
        self.flags & ParamAttributes::OUT != 0
    }

    /// `[Optional]`, set for parameters with a default value
    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.flags & ParamAttributes::OPTIONAL != 0
    }

    /// Attributes applied to the parameter
    ///
    /// # Errors
    /// Returns an error for a released module or an unreadable attribute row.
    pub fn custom_attributes(&self) -> Result<&[CustomAttributeRc]> {
        get_or_try_init(&self.custom_attributes, || match self.token {
            Some(token) => self.module()?.custom_attributes(token),
            None => Ok(Vec::new()),
        })
        .map(Vec::as_slice)
    }

    /// Passing mode.
    ///
    /// A by-reference parameter is `out` when flagged `[Out]` but not `[In]`, `in` when marked
    /// `IsReadOnly` or carrying a required `InAttribute` modifier, `ref readonly` when marked
    /// `RequiresLocation`, `ref` otherwise.
    ///
    /// # Errors
    /// Returns an error if the attributes cannot be realized.
    pub fn ref_kind(&self) -> Result<RefKind> {
        if !self.parameter_type.is_by_reference() {
            return Ok(RefKind::None);
        }

        if self.is_out() && !self.is_in() {
            return Ok(RefKind::Out);
        }

        let attributes = self.custom_attributes()?;
        if attributes.has(KnownAttribute::RequiresLocation) {
            return Ok(RefKind::RefReadOnly);
        }
        if attributes.has(KnownAttribute::IsReadOnly) || has_in_modifier(&self.parameter_type) {
            return Ok(RefKind::In);
        }

        Ok(RefKind::Ref)
    }

    /// `params` array
    ///
    /// # Errors
    /// Returns an error if the attributes cannot be realized.
    pub fn is_params(&self) -> Result<bool> {
        Ok(self.custom_attributes()?.has(KnownAttribute::ParamArray))
    }

    /// Default value from the `Constant` table
    ///
    /// # Errors
    /// Returns `Malformed` if the constant blob cannot be decoded.
    pub fn default_value(&self) -> Result<Option<&ConstantValue>> {
        get_or_try_init(&self.default_value, || {
            if self.flags & ParamAttributes::HAS_DEFAULT == 0 {
                return Ok(None);
            }
            match self.token {
                Some(token) => self.module()?.constant_of(token),
                None => Ok(None),
            }
        })
        .map(Option::as_ref)
    }

    /// Nullability of the parameter type, falling back to the method's context
    ///
    /// # Errors
    /// Returns an error if a nullability attribute cannot be decoded.
    pub fn nullability(&self) -> Result<NullabilityInfo> {
        let method = self.module()?.method_definition(self.method_rid)?;
        let context = method.nullable_context()?;
        NullabilityInfo::decode(&self.parameter_type, self.custom_attributes()?, context)
    }
}

fn has_in_modifier(parameter_type: &TypeWrapper) -> bool {
    let mut current = parameter_type;
    while let TypeWrapper::Modified(modified) = current {
        if modified.is_required
            && modified.modifier.full_name() == KnownAttribute::In.full_name()
        {
            return true;
        }
        current = &modified.unmodified;
    }
    false
}

impl fmt::Debug for ParameterDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterDefinition")
            .field("sequence", &self.sequence)
            .field("name", &self.name())
            .field("type", &self.parameter_type)
            .finish()
    }
}
