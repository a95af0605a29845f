use std::{
    fmt,
    ops::Range,
    sync::{Arc, OnceLock, Weak},
};

use crate::{
    metadata::{
        customattributes::{CustomAttributeRc, KnownAttributeSet, Nullability},
        knowntypes::{KnownAttribute, KnownType},
        members::{
            EventDefinition, EventRc, FieldDefinition, FieldRc, Member, MemberFilter, MethodRc,
            Modifiers, PropertyDefinition, PropertyRc,
        },
        module::{Module, ModuleRc},
        tables::{CodedIndex, EventRaw, FieldRaw, MethodDefRaw, PropertyRaw, TableId, TypeAttributes, TypeDefRaw},
        token::Token,
        typesystem::{Accessibility, GenericContext, GenericParamRc, TypeDefRef, TypeWrapper},
    },
    utils::get_or_try_init,
    Error::RecursionLimit,
    Result,
};

/// A reference counted [`TypeDefinition`]
pub type TypeDefRc = Arc<TypeDefinition>;

/// Deepest nesting of types accepted when building full names
const MAX_NESTING_DEPTH: usize = 64;

/// What a type definition declares in source terms
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// `class`
    Class,
    /// `interface`
    Interface,
    /// `struct`
    Struct,
    /// `enum`
    Enum,
    /// `delegate`
    Delegate,
}

impl TypeKind {
    /// True for structs and enums
    #[must_use]
    pub fn is_value_type(self) -> bool {
        matches!(self, TypeKind::Struct | TypeKind::Enum)
    }

    /// Source keyword
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            TypeKind::Class => "class",
            TypeKind::Interface => "interface",
            TypeKind::Struct => "struct",
            TypeKind::Enum => "enum",
            TypeKind::Delegate => "delegate",
        }
    }
}

/// A row of the `TypeDef` table and everything hanging off it.
///
/// Names and member ranges are read when the wrapper is created. The rest (kind, base type,
/// members, attributes, ...) is realized on first access and kept for the module's lifetime.
pub struct TypeDefinition {
    module: Weak<Module>,
    /// Row in the `TypeDef` table
    pub rid: u32,
    /// Token of the row
    pub token: Token,
    /// `TypeAttributes` bits
    pub flags: u32,
    name: Arc<str>,
    namespace: Arc<str>,
    full_name: Arc<str>,
    extends: CodedIndex,
    field_range: Range<u32>,
    method_range: Range<u32>,
    enclosing: Option<u32>,
    kind: OnceLock<TypeKind>,
    base_type: OnceLock<Option<TypeWrapper>>,
    interfaces: OnceLock<Vec<TypeWrapper>>,
    nested_types: OnceLock<Vec<TypeDefRc>>,
    fields: OnceLock<Vec<FieldRc>>,
    methods: OnceLock<Vec<MethodRc>>,
    properties: OnceLock<Vec<PropertyRc>>,
    events: OnceLock<Vec<EventRc>>,
    generic_parameters: OnceLock<Vec<GenericParamRc>>,
    custom_attributes: OnceLock<Vec<CustomAttributeRc>>,
}

impl TypeDefinition {
    pub(crate) fn new(module: &Module, row: &TypeDefRaw) -> Result<Self> {
        let name = module.string_of(row.type_name)?;
        let namespace = module.string_of(row.type_namespace)?;
        let index = module.index()?;
        let enclosing = index.enclosing_of(row.rid);

        // Outermost first: `Namespace.Outer.Inner`
        let mut segments = vec![name.clone()];
        let mut outer_namespace = namespace.clone();
        let mut current = enclosing;
        while let Some(outer_rid) = current {
            if segments.len() > MAX_NESTING_DEPTH {
                return Err(RecursionLimit(MAX_NESTING_DEPTH));
            }

            let outer = module.row::<TypeDefRaw>(outer_rid)?;
            segments.push(module.string_of(outer.type_name)?);
            outer_namespace = module.string_of(outer.type_namespace)?;
            current = index.enclosing_of(outer_rid);
        }
        segments.reverse();

        let mut full_name = String::with_capacity(64);
        if !outer_namespace.is_empty() {
            full_name.push_str(&outer_namespace);
            full_name.push('.');
        }
        full_name.push_str(&segments.join("."));

        let next = module.table::<TypeDefRaw>().get(row.rid + 1);
        let field_end = next.as_ref().map_or_else(
            || module.row_count(TableId::Field) + 1,
            |next| next.field_list,
        );
        let method_end = next.as_ref().map_or_else(
            || module.row_count(TableId::MethodDef) + 1,
            |next| next.method_list,
        );

        Ok(TypeDefinition {
            module: module.weak(),
            rid: row.rid,
            token: row.token,
            flags: row.flags,
            name,
            namespace,
            full_name: Arc::from(full_name),
            extends: row.extends,
            field_range: row.field_list..field_end.max(row.field_list),
            method_range: row.method_list..method_end.max(row.method_list),
            enclosing,
            kind: OnceLock::new(),
            base_type: OnceLock::new(),
            interfaces: OnceLock::new(),
            nested_types: OnceLock::new(),
            fields: OnceLock::new(),
            methods: OnceLock::new(),
            properties: OnceLock::new(),
            events: OnceLock::new(),
            generic_parameters: OnceLock::new(),
            custom_attributes: OnceLock::new(),
        })
    }

    /// Simple name, including a generic arity marker such as `` `1 ``
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace as stored; empty for nested types
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Namespace qualified name, nested types joined with `.`
    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub(crate) fn full_name_arc(&self) -> Arc<str> {
        self.full_name.clone()
    }

    /// The owning module
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidOperation`] once the module was released.
    pub fn module(&self) -> Result<ModuleRc> {
        self.module
            .upgrade()
            .ok_or_else(|| invalid_operation!("Type {} used after its module was released", self.full_name))
    }

    /// True for a nested type
    #[must_use]
    pub fn is_nested(&self) -> bool {
        self.enclosing.is_some()
    }

    /// The enclosing type of a nested type
    ///
    /// # Errors
    /// Returns an error for a released module or a missing enclosing row.
    pub fn declaring_type(&self) -> Result<Option<TypeDefRc>> {
        match self.enclosing {
            Some(rid) => Ok(Some(self.module()?.type_definition(rid)?)),
            None => Ok(None),
        }
    }

    /// Accessibility as declared
    #[must_use]
    pub fn accessibility(&self) -> Accessibility {
        Accessibility::from_type_flags(self.flags)
    }

    /// Accessibility after intersecting with every enclosing type
    ///
    /// # Errors
    /// Returns an error for a released module or a missing enclosing row.
    pub fn effective_accessibility(&self) -> Result<Accessibility> {
        let mut accessibility = self.accessibility();
        let mut current = self.declaring_type()?;
        let mut depth = 0;
        while let Some(enclosing) = current {
            depth += 1;
            if depth > MAX_NESTING_DEPTH {
                return Err(RecursionLimit(MAX_NESTING_DEPTH));
            }

            accessibility = accessibility.within(enclosing.accessibility());
            current = enclosing.declaring_type()?;
        }

        Ok(accessibility)
    }

    /// Visible outside the module, directly or to derived types
    ///
    /// # Errors
    /// Returns an error for a released module or a missing enclosing row.
    pub fn is_public_surface(&self) -> Result<bool> {
        Ok(self.effective_accessibility()?.is_public_surface())
    }

    /// `abstract` flag
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.flags & TypeAttributes::ABSTRACT != 0
    }

    /// `sealed` flag
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.flags & TypeAttributes::SEALED != 0
    }

    /// `interface` flag
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.flags & TypeAttributes::INTERFACE != 0
    }

    /// `abstract sealed`, what a `static class` compiles to
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.is_abstract() && self.is_sealed()
    }

    /// Class, interface, struct, enum or delegate, judged by flags and base type
    ///
    /// # Errors
    /// Returns an error if the base type cannot be named.
    pub fn kind(&self) -> Result<TypeKind> {
        get_or_try_init(&self.kind, || {
            if self.is_interface() {
                return Ok(TypeKind::Interface);
            }

            let base = self.base_type_name()?;
            Ok(match base.as_deref() {
                Some("System.Enum") => TypeKind::Enum,
                Some("System.ValueType") if &*self.full_name != "System.Enum" => TypeKind::Struct,
                Some("System.MulticastDelegate") => TypeKind::Delegate,
                _ => TypeKind::Class,
            })
        })
        .copied()
    }

    /// True if the type is an enum
    ///
    /// # Errors
    /// Returns an error if the base type cannot be named.
    pub fn is_enum(&self) -> Result<bool> {
        Ok(self.kind()? == TypeKind::Enum)
    }

    // Full name of the `extends` target without decoding `TypeSpec`s
    fn base_type_name(&self) -> Result<Option<String>> {
        if self.extends.is_null() {
            return Ok(None);
        }

        let module = self.module()?;
        match self.extends.tag {
            TableId::TypeDef => Ok(Some(
                module.type_definition(self.extends.row)?.full_name().to_string(),
            )),
            TableId::TypeRef => Ok(Some(
                module.type_reference(self.extends.row)?.full_name().to_string(),
            )),
            _ => Ok(None),
        }
    }

    /// The `extends` type, `None` for interfaces and `System.Object`
    ///
    /// # Errors
    /// Returns an error for a released module or a malformed base type.
    pub fn base_type(&self) -> Result<Option<&TypeWrapper>> {
        get_or_try_init(&self.base_type, || {
            if self.extends.is_null() {
                return Ok(None);
            }

            let module = self.module()?;
            let context = self.generic_context()?;
            module.decode_type_token(self.extends.token, &context).map(Some)
        })
        .map(Option::as_ref)
    }

    /// Directly implemented interfaces in table order
    ///
    /// # Errors
    /// Returns an error for a released module or a malformed interface entry.
    pub fn interfaces(&self) -> Result<&[TypeWrapper]> {
        get_or_try_init(&self.interfaces, || {
            let module = self.module()?;
            let context = self.generic_context()?;

            let mut interfaces = Vec::new();
            for interface in module.index()?.interfaces_of(self.rid) {
                interfaces.push(module.decode_type_token(interface, &context)?);
            }

            Ok(interfaces)
        })
        .map(Vec::as_slice)
    }

    /// Types declared inside this one
    ///
    /// # Errors
    /// Returns an error for a released module or a missing nested row.
    pub fn nested_types(&self) -> Result<&[TypeDefRc]> {
        get_or_try_init(&self.nested_types, || {
            let module = self.module()?;
            module
                .index()?
                .nested_of(self.rid)
                .iter()
                .map(|rid| module.type_definition(*rid))
                .collect()
        })
        .map(Vec::as_slice)
    }

    /// Declared fields in table order
    ///
    /// # Errors
    /// Returns an error for a released module or an unreadable field row.
    pub fn fields(&self) -> Result<&[FieldRc]> {
        get_or_try_init(&self.fields, || {
            let module = self.module()?;
            let this = TypeDefRef::new(&module.type_definition(self.rid)?);
            let table = module.table::<FieldRaw>();

            let mut fields = Vec::with_capacity(self.field_range.len());
            for rid in self.field_range.clone() {
                let Some(row) = table.get(rid) else {
                    return Err(malformed_error!(
                        "Type {} lists missing field row {}",
                        self.full_name,
                        rid
                    ));
                };
                fields.push(Arc::new(FieldDefinition::new(&module, &row, this.clone())?));
            }

            Ok(fields)
        })
        .map(Vec::as_slice)
    }

    /// Declared methods in table order, accessors included
    ///
    /// # Errors
    /// Returns an error for a released module or an unreadable method row.
    pub fn methods(&self) -> Result<&[MethodRc]> {
        get_or_try_init(&self.methods, || {
            let module = self.module()?;
            let table = module.table::<MethodDefRaw>();
            if self.method_range.end > table.row_count() + 1 {
                return Err(malformed_error!(
                    "Type {} lists methods past the end of the table",
                    self.full_name
                ));
            }

            self.method_range
                .clone()
                .map(|rid| module.method_definition(rid))
                .collect()
        })
        .map(Vec::as_slice)
    }

    /// Declared properties in table order
    ///
    /// # Errors
    /// Returns an error for a released module or an unreadable property row.
    pub fn properties(&self) -> Result<&[PropertyRc]> {
        get_or_try_init(&self.properties, || {
            let module = self.module()?;
            let this = TypeDefRef::new(&module.type_definition(self.rid)?);
            let table = module.table::<PropertyRaw>();

            let mut properties = Vec::new();
            for rid in module.index()?.property_range(self.rid) {
                let Some(row) = table.get(rid) else {
                    return Err(malformed_error!("Missing property row {}", rid));
                };
                properties.push(Arc::new(PropertyDefinition::new(&module, &row, this.clone())?));
            }

            Ok(properties)
        })
        .map(Vec::as_slice)
    }

    /// Declared events in table order
    ///
    /// # Errors
    /// Returns an error for a released module or an unreadable event row.
    pub fn events(&self) -> Result<&[EventRc]> {
        get_or_try_init(&self.events, || {
            let module = self.module()?;
            let this = TypeDefRef::new(&module.type_definition(self.rid)?);
            let table = module.table::<EventRaw>();

            let mut events = Vec::new();
            for rid in module.index()?.event_range(self.rid) {
                let Some(row) = table.get(rid) else {
                    return Err(malformed_error!("Missing event row {}", rid));
                };
                events.push(Arc::new(EventDefinition::new(&module, &row, this.clone())?));
            }

            Ok(events)
        })
        .map(Vec::as_slice)
    }

    /// Fields, events, properties and methods admitted by `filter`.
    ///
    /// Property and event accessors are represented by their owner, not listed as methods.
    ///
    /// # Errors
    /// Returns an error if any member list cannot be realized.
    pub fn members(&self, filter: MemberFilter) -> Result<Vec<Member>> {
        let mut members = Vec::new();

        for field in self.fields()? {
            if filter.admits(field.accessibility()) {
                members.push(Member::Field(field.clone()));
            }
        }
        for event in self.events()? {
            if filter.admits(event.accessibility()?) {
                members.push(Member::Event(event.clone()));
            }
        }
        for property in self.properties()? {
            if filter.admits(property.accessibility()?) {
                members.push(Member::Property(property.clone()));
            }
        }
        for method in self.methods()? {
            if method.is_accessor()? {
                continue;
            }
            if filter.admits(method.accessibility()) {
                members.push(Member::Method(method.clone()));
            }
        }

        Ok(members)
    }

    /// Nested types admitted by `filter`, judged by their declared accessibility
    ///
    /// # Errors
    /// Returns an error if the nested types cannot be realized.
    pub fn nested_types_filtered(&self, filter: MemberFilter) -> Result<Vec<TypeDefRc>> {
        Ok(self
            .nested_types()?
            .iter()
            .filter(|nested| filter.admits(nested.accessibility()))
            .cloned()
            .collect())
    }

    /// Type parameters, ordered by number
    ///
    /// # Errors
    /// Returns an error for a released module or an unreadable parameter row.
    pub fn generic_parameters(&self) -> Result<&[GenericParamRc]> {
        get_or_try_init(&self.generic_parameters, || {
            self.module()?.generic_parameters_of(self.token)
        })
        .map(Vec::as_slice)
    }

    /// Context for decoding signatures of this type's members
    ///
    /// # Errors
    /// Returns an error if the type parameters cannot be realized.
    pub fn generic_context(&self) -> Result<GenericContext> {
        Ok(GenericContext::new(self.generic_parameters()?))
    }

    /// Attributes applied to the type
    ///
    /// # Errors
    /// Returns an error for a released module or an unreadable attribute row.
    pub fn custom_attributes(&self) -> Result<&[CustomAttributeRc]> {
        get_or_try_init(&self.custom_attributes, || {
            self.module()?.custom_attributes(self.token)
        })
        .map(Vec::as_slice)
    }

    /// Underlying integral type of an enum, read from its single instance field
    ///
    /// # Errors
    /// [`crate::Error::InvalidOperation`] if the type is not an enum, `Malformed` if the instance
    /// field is missing or not an integral primitive.
    pub fn enum_underlying_type(&self) -> Result<KnownType> {
        if !self.is_enum()? {
            return Err(invalid_operation!("{} is not an enum", self.full_name));
        }

        let field = self
            .fields()?
            .iter()
            .find(|field| !field.is_static())
            .ok_or_else(|| malformed_error!("Enum {} has no instance field", self.full_name))?;

        match field.field_type()?.unmodified().known_type() {
            Some(known) if known.is_integral() || known == KnownType::Boolean || known == KnownType::Char => {
                Ok(known)
            }
            _ => Err(malformed_error!(
                "Enum {} has unsupported underlying type {}",
                self.full_name,
                field.field_type()?
            )),
        }
    }

    /// The `Invoke` method of a delegate
    ///
    /// # Errors
    /// [`crate::Error::InvalidOperation`] if the type is not a delegate or has no `Invoke`.
    pub fn delegate_invoke(&self) -> Result<MethodRc> {
        if self.kind()? != TypeKind::Delegate {
            return Err(invalid_operation!("{} is not a delegate", self.full_name));
        }

        self.methods()?
            .iter()
            .find(|method| method.name() == "Invoke")
            .cloned()
            .ok_or_else(|| invalid_operation!("Delegate {} has no Invoke method", self.full_name))
    }

    /// Member named by `DefaultMemberAttribute`, the indexer name for most types
    ///
    /// # Errors
    /// Returns an error if the attribute blob is malformed.
    pub fn default_member_name(&self) -> Result<Option<String>> {
        match self.custom_attributes()?.find(KnownAttribute::DefaultMember) {
            Some(attribute) => Ok(attribute
                .decode()?
                .fixed_arguments
                .first()
                .and_then(|argument| argument.value.as_str())
                .map(ToString::to_string)),
            None => Ok(None),
        }
    }

    /// Nullability applied to members without their own annotation: the nearest
    /// `NullableContextAttribute` on this type or an enclosing one
    ///
    /// # Errors
    /// Returns an error if an attribute blob is malformed.
    pub fn nullable_context(&self) -> Result<Nullability> {
        if let Some(context) = Nullability::from_context(self.custom_attributes()?)? {
            return Ok(context);
        }

        match self.declaring_type()? {
            Some(enclosing) => enclosing.nullable_context(),
            None => Ok(Nullability::Oblivious),
        }
    }

    /// Source modifiers of the declaration: `static`, `abstract`, `sealed`, `readonly`, `ref`
    ///
    /// # Errors
    /// Returns an error if the kind or attributes cannot be realized.
    pub fn modifiers(&self) -> Result<Modifiers> {
        let mut modifiers = Modifiers::empty();

        match self.kind()? {
            TypeKind::Class => {
                if self.is_static() {
                    modifiers |= Modifiers::STATIC;
                } else if self.is_abstract() {
                    modifiers |= Modifiers::ABSTRACT;
                } else if self.is_sealed() {
                    modifiers |= Modifiers::SEALED;
                }
            }
            TypeKind::Struct => {
                let attributes = self.custom_attributes()?;
                if attributes.has(KnownAttribute::IsReadOnly) {
                    modifiers |= Modifiers::READONLY;
                }
                if attributes.has(KnownAttribute::IsByRefLike) {
                    modifiers |= Modifiers::REF;
                }
            }
            TypeKind::Interface | TypeKind::Enum | TypeKind::Delegate => {}
        }

        Ok(modifiers)
    }

    /// True for types a compiler emits on its own, such as closures and state machines
    #[must_use]
    pub fn is_compiler_generated(&self) -> bool {
        self.name.starts_with('<')
    }
}

impl fmt::Debug for TypeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDefinition")
            .field("full_name", &self.full_name)
            .field("token", &self.token)
            .field("flags", &format_args!("{:#010x}", self.flags))
            .finish()
    }
}
