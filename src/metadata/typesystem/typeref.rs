use std::{
    fmt,
    sync::{Arc, OnceLock, Weak},
};

use crate::{
    metadata::{
        knowntypes::KnownType,
        module::{Module, ModuleRc},
        repository::Repository,
        tables::{CodedIndex, TableId, TypeRefRaw},
        token::Token,
        typesystem::{TypeDefRc, TypeDefRef},
    },
    Error::RecursionLimit,
    Result,
};

/// A reference counted [`TypeReference`]
pub type TypeReferenceRc = Arc<TypeReference>;

/// Deepest chain of nested type references accepted
const MAX_SCOPE_DEPTH: usize = 64;

/// Where a type reference expects its target to live
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResolutionScope {
    /// The referencing module itself
    Module,
    /// Another module of the same assembly, by `ModuleRef` row
    ModuleRef(u32),
    /// Another assembly, by `AssemblyRef` row
    AssemblyRef(u32),
    /// Nested inside the type of another `TypeRef` row
    TypeRef(u32),
    /// Not recorded; the `ExportedType` table of this assembly says where the type went
    Null,
}

impl ResolutionScope {
    fn from_coded_index(index: CodedIndex) -> ResolutionScope {
        if index.is_null() {
            return ResolutionScope::Null;
        }

        match index.tag {
            TableId::ModuleRef => ResolutionScope::ModuleRef(index.row),
            TableId::AssemblyRef => ResolutionScope::AssemblyRef(index.row),
            TableId::TypeRef => ResolutionScope::TypeRef(index.row),
            _ => ResolutionScope::Module,
        }
    }
}

/// A row of the `TypeRef` table.
pub struct TypeReference {
    module: Weak<Module>,
    /// Row in the `TypeRef` table
    pub rid: u32,
    /// Token of the row
    pub token: Token,
    name: Arc<str>,
    namespace: Arc<str>,
    full_name: Arc<str>,
    scope: ResolutionScope,
    value_type_hint: OnceLock<bool>,
    resolved: OnceLock<Option<TypeDefRef>>,
}

impl TypeReference {
    pub(crate) fn new(module: &Module, row: &TypeRefRaw) -> Result<Self> {
        let name = module.string_of(row.type_name)?;
        let namespace = module.string_of(row.type_namespace)?;
        let scope = ResolutionScope::from_coded_index(row.resolution_scope);

        let mut segments = vec![name.clone()];
        let mut outer_namespace = namespace.clone();
        let mut current = scope;
        while let ResolutionScope::TypeRef(outer_rid) = current {
            if segments.len() > MAX_SCOPE_DEPTH {
                return Err(RecursionLimit(MAX_SCOPE_DEPTH));
            }

            let outer = module.row::<TypeRefRaw>(outer_rid)?;
            segments.push(module.string_of(outer.type_name)?);
            outer_namespace = module.string_of(outer.type_namespace)?;
            current = ResolutionScope::from_coded_index(outer.resolution_scope);
        }
        segments.reverse();

        let joined = segments.join(".");
        let full_name = if outer_namespace.is_empty() {
            joined
        } else {
            format!("{outer_namespace}.{joined}")
        };

        Ok(TypeReference {
            module: module.weak(),
            rid: row.rid,
            token: row.token,
            name,
            namespace,
            full_name: Arc::from(full_name),
            scope,
            value_type_hint: OnceLock::new(),
            resolved: OnceLock::new(),
        })
    }

    /// Simple name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace as stored; empty for nested references
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

    /// Where the target is expected
    #[must_use]
    pub fn resolution_scope(&self) -> ResolutionScope {
        self.scope
    }

    /// The referencing module
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidOperation`] once the module was released.
    pub fn module(&self) -> Result<ModuleRc> {
        self.module
            .upgrade()
            .ok_or_else(|| invalid_operation!("Type reference {} used after its module was released", self.full_name))
    }

    /// Record that a signature named this reference with `valuetype`
    pub(crate) fn mark_value_type(&self, is_value_type: bool) {
        if is_value_type {
            let _ = self.value_type_hint.set(true);
        }
    }

    /// True if a signature used the reference as a value type, or it names a well-known one
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        self.value_type_hint.get().copied().unwrap_or(false)
            || KnownType::from_name(&self.full_name).is_some_and(KnownType::is_value_type)
    }

    /// The definition this reference names, `None` if its assembly cannot be located.
    ///
    /// The answer is cached; a reference resolves once per module lifetime.
    ///
    /// # Errors
    /// Returns an error for a released module or an overlong forwarder chain.
    pub fn resolve(&self, repository: &Repository) -> Result<Option<TypeDefRc>> {
        if let Some(resolved) = self.resolved.get() {
            return resolved.as_ref().map(TypeDefRef::get).transpose();
        }

        let definition = repository.resolve_type_reference(self)?;
        let link = definition.as_ref().map(TypeDefRef::new);
        let _ = self.resolved.set(link);

        Ok(definition)
    }
}

impl fmt::Debug for TypeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeReference")
            .field("full_name", &self.full_name)
            .field("token", &self.token)
            .field("scope", &self.scope)
            .finish()
    }
}
