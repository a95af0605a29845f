use std::{
    fmt,
    ops::Range,
    sync::{Arc, OnceLock, Weak},
};

use crate::{
    metadata::{
        customattributes::{CustomAttributeRc, KnownAttributeSet, Nullability},
        knowntypes::KnownAttribute,
        members::{MemberKind, Modifiers, ParamRc, ParameterDefinition},
        module::{Module, ModuleRc},
        signatures::{MethodSignature, SignatureDecoder, WrapperProvider},
        tables::{MethodAttributes, MethodDefRaw, MethodSemanticsAttributes, ParamRaw, TableId},
        token::Token,
        typesystem::{Accessibility, GenericContext, GenericParamRc, TypeDefRef, TypeKind, TypeWrapper},
    },
    utils::get_or_try_init,
    Result,
};

/// A reference counted [`MethodDefinition`]
pub type MethodRc = Arc<MethodDefinition>;

// MethodImplAttributes: implemented by the runtime itself
const METHOD_IMPL_INTERNAL_CALL: u16 = 0x1000;

/// A row of the `MethodDef` table.
///
/// Methods are cached by the module, not the declaring type, so generic parameters and
/// attribute constructors can reach them by row.
pub struct MethodDefinition {
    module: Weak<Module>,
    /// Row in the `MethodDef` table
    pub rid: u32,
    /// Token of the row
    pub token: Token,
    /// `MethodAttributes` bits
    pub flags: u16,
    /// `MethodImplAttributes` bits
    pub impl_flags: u16,
    /// RVA of the body, 0 for abstract and extern methods
    pub rva: u32,
    name: Arc<str>,
    signature_index: u32,
    param_range: Range<u32>,
    declaring_type: TypeDefRef,
    signature: OnceLock<MethodSignature<TypeWrapper>>,
    parameters: OnceLock<Vec<ParamRc>>,
    return_parameter: OnceLock<ParamRc>,
    generic_parameters: OnceLock<Vec<GenericParamRc>>,
    custom_attributes: OnceLock<Vec<CustomAttributeRc>>,
}

impl MethodDefinition {
    pub(crate) fn new(
        module: &Module,
        row: &MethodDefRaw,
        declaring_type: TypeDefRef,
    ) -> Result<Self> {
        let param_end = module
            .table::<MethodDefRaw>()
            .get(row.rid + 1)
            .map_or_else(|| module.row_count(TableId::Param) + 1, |next| next.param_list);

        Ok(MethodDefinition {
            module: module.weak(),
            rid: row.rid,
            token: row.token,
            flags: row.flags,
            impl_flags: row.impl_flags,
            rva: row.rva,
            name: module.string_of(row.name)?,
            signature_index: row.signature,
            param_range: row.param_list..param_end.max(row.param_list),
            declaring_type,
            signature: OnceLock::new(),
            parameters: OnceLock::new(),
            return_parameter: OnceLock::new(),
            generic_parameters: OnceLock::new(),
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
            .ok_or_else(|| invalid_operation!("Method {} used after its module was released", self.name))
    }

    /// Declared accessibility
    #[must_use]
    pub fn accessibility(&self) -> Accessibility {
        Accessibility::from_member_flags(self.flags)
    }

    fn has_flag(&self, flag: u16) -> bool {
        self.flags & flag != 0
    }

    /// `static`
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.has_flag(MethodAttributes::STATIC)
    }

    /// Occupies a vtable slot
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.has_flag(MethodAttributes::VIRTUAL)
    }

    /// No body
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.has_flag(MethodAttributes::ABSTRACT)
    }

    /// Cannot be overridden further
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.has_flag(MethodAttributes::FINAL)
    }

    /// Starts a new vtable slot
    #[must_use]
    pub fn is_new_slot(&self) -> bool {
        self.has_flag(MethodAttributes::NEW_SLOT)
    }

    /// Special name, such as accessors and operators
    #[must_use]
    pub fn is_special_name(&self) -> bool {
        self.has_flag(MethodAttributes::SPECIAL_NAME)
    }

    /// `.ctor` or `.cctor`
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.has_flag(MethodAttributes::RT_SPECIAL_NAME)
            && (&*self.name == ".ctor" || &*self.name == ".cctor")
    }

    /// `.cctor`
    #[must_use]
    pub fn is_static_constructor(&self) -> bool {
        self.is_constructor() && self.is_static()
    }

    /// `op_Addition` and friends
    #[must_use]
    pub fn is_operator(&self) -> bool {
        self.is_special_name() && self.name.starts_with("op_")
    }

    /// A `Finalize` override with no parameters
    #[must_use]
    pub fn is_destructor(&self) -> bool {
        &*self.name == "Finalize"
            && self.is_virtual()
            && !self.is_static()
            && !self.is_new_slot()
            && self.param_range.is_empty()
    }

    /// Listing kind
    #[must_use]
    pub fn kind(&self) -> MemberKind {
        if self.is_constructor() {
            MemberKind::Constructor
        } else if self.is_destructor() {
            MemberKind::Destructor
        } else if self.is_operator() {
            MemberKind::Operator
        } else {
            MemberKind::Method
        }
    }

    /// Method type parameters, ordered by number
    ///
    /// # Errors
    /// Returns an error for a released module or an unreadable parameter row.
    pub fn generic_parameters(&self) -> Result<&[GenericParamRc]> {
        get_or_try_init(&self.generic_parameters, || {
            self.module()?.generic_parameters_of(self.token)
        })
        .map(Vec::as_slice)
    }

    /// Declaring type parameters plus this method's own
    ///
    /// # Errors
    /// Returns an error if either parameter list cannot be realized.
    pub fn generic_context(&self) -> Result<GenericContext> {
        let declaring = self.declaring_type.get()?.generic_context()?;
        Ok(declaring.with_method(self.generic_parameters()?))
    }

    /// Decoded signature
    ///
    /// # Errors
    /// Returns an error for a released module or a malformed blob.
    pub fn signature(&self) -> Result<&MethodSignature<TypeWrapper>> {
        get_or_try_init(&self.signature, || {
            let module = self.module()?;
            let context = self.generic_context()?;
            let provider = WrapperProvider::new(&module, &context);
            SignatureDecoder::new(module.blob_of(self.signature_index)?, &provider)
                .decode_method_signature()
        })
    }

    /// Return type, modifiers included
    ///
    /// # Errors
    /// Returns an error if the signature cannot be decoded.
    pub fn return_type(&self) -> Result<&TypeWrapper> {
        Ok(&self.signature()?.return_type)
    }

    // `Param` rows of this method by sequence number
    fn param_rows(&self, module: &Module) -> Vec<ParamRaw> {
        let table = module.table::<ParamRaw>();
        self.param_range
            .clone()
            .filter_map(|rid| table.get(rid))
            .collect()
    }

    /// Parameters in signature order
    ///
    /// # Errors
    /// Returns an error if the signature or a parameter name cannot be read.
    pub fn parameters(&self) -> Result<&[ParamRc]> {
        get_or_try_init(&self.parameters, || {
            let module = self.module()?;
            let rows = self.param_rows(&module);
            let signature = self.signature()?;

            let mut parameters = Vec::with_capacity(signature.parameter_types.len());
            for (position, parameter_type) in signature.parameter_types.iter().enumerate() {
                let sequence = u16::try_from(position + 1)
                    .map_err(|_| malformed_error!("Method {} has too many parameters", self.name))?;
                let row = rows.iter().find(|row| row.sequence == sequence);
                parameters.push(Arc::new(ParameterDefinition::new(
                    &module,
                    self.rid,
                    sequence,
                    row,
                    parameter_type.clone(),
                )?));
            }

            Ok(parameters)
        })
        .map(Vec::as_slice)
    }

    /// The return value as a parameter, carrying its attributes
    ///
    /// # Errors
    /// Returns an error if the signature cannot be decoded.
    pub fn return_parameter(&self) -> Result<&ParamRc> {
        get_or_try_init(&self.return_parameter, || {
            let module = self.module()?;
            let rows = self.param_rows(&module);
            let row = rows.iter().find(|row| row.sequence == 0);
            Ok(Arc::new(ParameterDefinition::new(
                &module,
                self.rid,
                0,
                row,
                self.return_type()?.clone(),
            )?))
        })
    }

    /// Attributes applied to the method
    ///
    /// # Errors
    /// Returns an error for a released module or an unreadable attribute row.
    pub fn custom_attributes(&self) -> Result<&[CustomAttributeRc]> {
        get_or_try_init(&self.custom_attributes, || {
            self.module()?.custom_attributes(self.token)
        })
        .map(Vec::as_slice)
    }

    /// Owning property or event and the accessor role, `None` for ordinary methods
    ///
    /// # Errors
    /// Returns an error if the semantics table cannot be read.
    pub fn semantics(&self) -> Result<Option<(Token, MethodSemanticsAttributes)>> {
        Ok(self.module()?.method_semantics()?.lookup(self.rid))
    }

    /// True for property and event accessors
    ///
    /// # Errors
    /// Returns an error if the semantics table cannot be read.
    pub fn is_accessor(&self) -> Result<bool> {
        Ok(self.semantics()?.is_some())
    }

    /// True if the method overrides an inherited one.
    ///
    /// A virtual method without `newslot` reuses its base's slot. A `newslot` method overrides
    /// only through an explicit `MethodImpl` record, and then only if it is not private; private
    /// ones are explicit interface implementations.
    ///
    /// # Errors
    /// Returns an error if the module index cannot be built.
    pub fn is_override(&self) -> Result<bool> {
        if !self.is_virtual() {
            return Ok(false);
        }
        if !self.is_new_slot() {
            return Ok(true);
        }

        Ok(self.module()?.index()?.is_method_impl_body(self.rid)
            && self.accessibility() != Accessibility::Private)
    }

    /// Static method marked with `ExtensionAttribute`
    ///
    /// # Errors
    /// Returns an error if the attributes cannot be realized.
    pub fn is_extension_method(&self) -> Result<bool> {
        Ok(self.is_static() && self.custom_attributes()?.has(KnownAttribute::Extension))
    }

    /// Implemented outside IL
    #[must_use]
    pub fn is_extern(&self) -> bool {
        self.has_flag(MethodAttributes::PINVOKE_IMPL)
            || self.impl_flags & METHOD_IMPL_INTERNAL_CALL != 0
    }

    /// Source modifiers
    ///
    /// # Errors
    /// Returns an error if the declaring type, index or attributes cannot be realized.
    pub fn modifiers(&self) -> Result<Modifiers> {
        let declaring = self.declaring_type.get()?;
        let mut modifiers = if declaring.kind()? == TypeKind::Interface {
            self.interface_modifiers()
        } else {
            self.class_modifiers()?
        };

        if self.is_extern() {
            modifiers |= Modifiers::EXTERN;
        }
        if declaring.kind()? == TypeKind::Struct
            && !self.is_static()
            && self.custom_attributes()?.has(KnownAttribute::IsReadOnly)
        {
            modifiers |= Modifiers::READONLY;
        }

        Ok(modifiers)
    }

    fn class_modifiers(&self) -> Result<Modifiers> {
        let mut modifiers = Modifiers::empty();

        if self.is_static() {
            modifiers |= Modifiers::STATIC;
        }

        if self.is_override()? {
            modifiers |= Modifiers::OVERRIDE;
            if self.is_abstract() {
                modifiers |= Modifiers::ABSTRACT;
            } else if self.is_final() {
                modifiers |= Modifiers::SEALED;
            }
        } else if self.is_abstract() {
            modifiers |= Modifiers::ABSTRACT;
        } else if self.is_virtual() && !self.is_final() {
            modifiers |= Modifiers::VIRTUAL;
        }

        Ok(modifiers)
    }

    fn interface_modifiers(&self) -> Modifiers {
        if self.is_static() {
            return if self.is_abstract() {
                Modifiers::STATIC | Modifiers::ABSTRACT
            } else if self.is_virtual() {
                Modifiers::STATIC | Modifiers::VIRTUAL
            } else {
                Modifiers::STATIC
            };
        }

        if !self.is_virtual() && self.accessibility() != Accessibility::Private {
            return Modifiers::SEALED;
        }

        Modifiers::empty()
    }

    /// Nullability applied to the signature without its own annotation: the method's
    /// `NullableContextAttribute`, else the declaring type's context
    ///
    /// # Errors
    /// Returns an error if an attribute blob is malformed.
    pub fn nullable_context(&self) -> Result<Nullability> {
        match Nullability::from_context(self.custom_attributes()?)? {
            Some(context) => Ok(context),
            None => self.declaring_type.get()?.nullable_context(),
        }
    }
}

impl fmt::Debug for MethodDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDefinition")
            .field("name", &self.name)
            .field("token", &self.token)
            .field("declaring_type", &self.declaring_type)
            .field("flags", &format_args!("{:#06x}", self.flags))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{AttributeDecl, ImageBuilder, MethodDecl, ParamDecl, SigType, TypeDecl};

    const VIRTUAL: u16 = MethodAttributes::VIRTUAL;
    const NEW_SLOT: u16 = MethodAttributes::NEW_SLOT;

    fn hierarchy() -> ModuleRc {
        let image = ImageBuilder::new("Hierarchy")
            .add_type(
                TypeDecl::class("Acme", "Base")
                    .public()
                    .flags(crate::metadata::tables::TypeAttributes::ABSTRACT)
                    .method(MethodDecl::new("Run", SigType::Void).flags(VIRTUAL | NEW_SLOT))
                    .method(MethodDecl::new("Area", SigType::R8).flags(VIRTUAL | NEW_SLOT | MethodAttributes::ABSTRACT)),
            )
            .add_type(
                TypeDecl::class("Acme", "Derived")
                    .public()
                    .extends(SigType::class("Acme.Base"))
                    .implements(SigType::class("System.IDisposable"))
                    .method(MethodDecl::new("Run", SigType::Void).flags(VIRTUAL))
                    .method(MethodDecl::new("Area", SigType::R8).flags(VIRTUAL | MethodAttributes::FINAL))
                    .method(
                        MethodDecl::new("System.IDisposable.Dispose", SigType::Void)
                            .access(0x0001)
                            .flags(VIRTUAL | NEW_SLOT | MethodAttributes::FINAL)
                            .explicit_override(),
                    )
                    .method(MethodDecl::new("Close", SigType::Void).flags(VIRTUAL | NEW_SLOT).explicit_override())
                    .method(MethodDecl::new("Finalize", SigType::Void).access(0x0004).flags(VIRTUAL))
                    .method(
                        MethodDecl::new("op_Addition", SigType::class("Acme.Derived"))
                            .flags(MethodAttributes::STATIC | MethodAttributes::SPECIAL_NAME)
                            .param(ParamDecl::new("left", SigType::class("Acme.Derived")))
                            .param(ParamDecl::new("right", SigType::class("Acme.Derived"))),
                    )
                    .method(MethodDecl::constructor())
                    .method(
                        MethodDecl::new(".cctor", SigType::Void)
                            .access(0x0001)
                            .flags(MethodAttributes::STATIC | MethodAttributes::SPECIAL_NAME | MethodAttributes::RT_SPECIAL_NAME),
                    )
                    .method(
                        MethodDecl::new("Beep", SigType::Void)
                            .flags(MethodAttributes::STATIC | MethodAttributes::PINVOKE_IMPL),
                    ),
            )
            .add_type(
                TypeDecl::interface("Acme", "IShape")
                    .public()
                    .method(MethodDecl::new("Draw", SigType::Void).flags(VIRTUAL | NEW_SLOT | MethodAttributes::ABSTRACT))
                    .method(MethodDecl::new("Describe", SigType::String))
                    .method(
                        MethodDecl::new("Create", SigType::class("Acme.IShape"))
                            .flags(MethodAttributes::STATIC | VIRTUAL | MethodAttributes::ABSTRACT),
                    ),
            )
            .add_type(
                TypeDecl::class("Acme", "Extensions")
                    .public()
                    .flags(crate::metadata::tables::TypeAttributes::ABSTRACT | crate::metadata::tables::TypeAttributes::SEALED)
                    .method(
                        MethodDecl::new("Twice", SigType::I4)
                            .flags(MethodAttributes::STATIC)
                            .param(ParamDecl::new("value", SigType::I4))
                            .attribute(AttributeDecl::marker("System.Runtime.CompilerServices.ExtensionAttribute"))
                            .attribute(AttributeDecl::nullable_context(1)),
                    ),
            )
            .add_type(
                TypeDecl::struct_("Acme", "Point").public().method(
                    MethodDecl::new("Length", SigType::R8)
                        .attribute(AttributeDecl::marker("System.Runtime.CompilerServices.IsReadOnlyAttribute")),
                ),
            )
            .build();
        Module::from_bytes(image).unwrap()
    }

    fn method(module: &Module, type_name: &str, name: &str) -> MethodRc {
        module
            .type_by_name(type_name)
            .unwrap()
            .unwrap()
            .methods()
            .unwrap()
            .iter()
            .find(|method| method.name() == name)
            .cloned()
            .unwrap()
    }

    #[test]
    fn overrides() {
        let module = hierarchy();
        assert!(!method(&module, "Acme.Base", "Run").is_override().unwrap());
        assert!(method(&module, "Acme.Derived", "Run").is_override().unwrap());
        assert!(method(&module, "Acme.Derived", "Close").is_override().unwrap());
        assert!(!method(&module, "Acme.Derived", "System.IDisposable.Dispose").is_override().unwrap());
        assert!(!method(&module, "Acme.Derived", "Beep").is_override().unwrap());
    }

    #[test]
    fn class_modifiers() {
        let module = hierarchy();
        assert_eq!(method(&module, "Acme.Base", "Run").modifiers().unwrap(), Modifiers::VIRTUAL);
        assert_eq!(method(&module, "Acme.Base", "Area").modifiers().unwrap(), Modifiers::ABSTRACT);
        assert_eq!(method(&module, "Acme.Derived", "Run").modifiers().unwrap(), Modifiers::OVERRIDE);
        assert_eq!(
            method(&module, "Acme.Derived", "Area").modifiers().unwrap(),
            Modifiers::OVERRIDE | Modifiers::SEALED
        );
        assert_eq!(
            method(&module, "Acme.Derived", "Beep").modifiers().unwrap(),
            Modifiers::STATIC | Modifiers::EXTERN
        );
        assert_eq!(method(&module, "Acme.Point", "Length").modifiers().unwrap(), Modifiers::READONLY);
    }

    #[test]
    fn interface_modifiers() {
        let module = hierarchy();
        assert!(method(&module, "Acme.IShape", "Draw").modifiers().unwrap().is_empty());
        assert_eq!(method(&module, "Acme.IShape", "Describe").modifiers().unwrap(), Modifiers::SEALED);
        assert_eq!(
            method(&module, "Acme.IShape", "Create").modifiers().unwrap(),
            Modifiers::STATIC | Modifiers::ABSTRACT
        );
    }

    #[test]
    fn kinds() {
        let module = hierarchy();
        assert_eq!(method(&module, "Acme.Derived", ".ctor").kind(), MemberKind::Constructor);
        let type_initializer = method(&module, "Acme.Derived", ".cctor");
        assert!(type_initializer.is_static_constructor());
        assert_eq!(method(&module, "Acme.Derived", "Finalize").kind(), MemberKind::Destructor);
        assert_eq!(method(&module, "Acme.Derived", "op_Addition").kind(), MemberKind::Operator);
        assert_eq!(method(&module, "Acme.Derived", "Run").kind(), MemberKind::Method);
    }

    #[test]
    fn signatures() {
        let module = hierarchy();
        let addition = method(&module, "Acme.Derived", "op_Addition");
        assert_eq!(addition.return_type().unwrap().full_name(), "Acme.Derived");
        let names: Vec<&str> = addition.parameters().unwrap().iter().map(|parameter| parameter.name()).collect();
        assert_eq!(names, ["left", "right"]);
        assert!(addition.return_parameter().unwrap().is_return());
        assert!(!addition.signature().unwrap().header.has_this());

        let run = method(&module, "Acme.Base", "Run");
        assert!(run.return_type().unwrap().is_void());
        assert!(run.parameters().unwrap().is_empty());
        assert_eq!(run.declaring_type().full_name(), "Acme.Base");
    }

    #[test]
    fn extension_methods_and_context() {
        let module = hierarchy();
        let twice = method(&module, "Acme.Extensions", "Twice");
        assert!(twice.is_extension_method().unwrap());
        assert_eq!(twice.nullable_context().unwrap(), Nullability::NotNull);
        assert!(!method(&module, "Acme.Derived", "Beep").is_extension_method().unwrap());
        assert_eq!(
            method(&module, "Acme.Derived", "Run").nullable_context().unwrap(),
            Nullability::Oblivious
        );
    }

    #[test]
    fn accessors_are_flagged() {
        let module = hierarchy();
        let run = method(&module, "Acme.Derived", "Run");
        assert!(!run.is_accessor().unwrap());
        assert!(run.semantics().unwrap().is_none());
    }
}
