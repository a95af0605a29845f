//! The main module and every module it transitively references.
//!
//! A [`Repository`] is the context every cross-module question goes through: which definition a
//! type reference names, which module an assembly reference loads, what `System.String` is. It
//! opens the main module eagerly and everything else on demand. Whole-graph consumers call
//! [`Repository::resolve_all`] (or [`Repository::get_type_by_name`], which does it for them) to
//! walk the assembly references breadth first until no new module shows up.
//!
//! References that cannot be located are not errors. They are logged, recorded in
//! [`Repository::warnings`] and the type wrappers that needed them degrade to
//! [`TypeWrapper::Unknown`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use cilsurface::Repository;
//!
//! let repository = Repository::open("MyApp.dll", &[PathBuf::from("/opt/libs")])?;
//! if let Some(string) = repository.get_type_by_name("System.String")? {
//!     println!("found {string}");
//! }
//! for warning in repository.warnings() {
//!     eprintln!("{warning}");
//! }
//! # Ok::<(), cilsurface::Error>(())
//! ```

use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
};

use dashmap::DashSet;
use log::{debug, warn};

use crate::{
    metadata::{
        identity::AssemblyIdentity,
        module::{Module, ModuleRc},
        namespace::Namespace,
        resolver::{AssemblyResolver, ResolverConfig},
        tables::TableId,
        typesystem::{ResolutionScope, TypeDefRc, TypeDefRef, TypeReference, TypeWrapper},
    },
    utils::get_or_try_init,
    Error::{BadImageFormat, RecursionLimit},
    Result,
};

/// Longest chain of type forwarders followed
const MAX_FORWARDER_DEPTH: usize = 8;

/// Longest chain of nested type references followed to the outermost scope
const MAX_SCOPE_DEPTH: usize = 64;

/// Builder for a [`Repository`].
///
/// ```rust,no_run
/// use cilsurface::{metadata::resolver::ResolverConfig, RepositoryBuilder};
///
/// let repository = RepositoryBuilder::new()
///     .main_module("MyApp.dll")
///     .search_directory("/opt/libs")
///     .resolver_config(ResolverConfig::new().package_cache("/srv/packages"))
///     .build()?;
/// # Ok::<(), cilsurface::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct RepositoryBuilder {
    main_module: Option<PathBuf>,
    search_directories: Vec<PathBuf>,
    config: Option<ResolverConfig>,
}

impl RepositoryBuilder {
    /// A builder without a main module
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The module whose surface is being read
    #[must_use]
    pub fn main_module<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.main_module = Some(path.as_ref().to_path_buf());
        self
    }

    /// Add a directory probed for referenced assemblies, after those of the resolver config
    #[must_use]
    pub fn search_directory<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_directories.push(path.as_ref().to_path_buf());
        self
    }

    /// Replace the resolver configuration; [`ResolverConfig::from_env`] is used otherwise
    #[must_use]
    pub fn resolver_config(mut self, config: ResolverConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Open the main module
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidOperation`] without a main module, and
    /// [`crate::Error::FileNotFound`] or [`crate::Error::BadImageFormat`] if it cannot be opened.
    pub fn build(self) -> Result<Repository> {
        let Some(main_path) = self.main_module else {
            return Err(invalid_operation!("No main module specified"));
        };

        let mut config = self.config.unwrap_or_else(ResolverConfig::from_env);
        config.search_directories.extend(self.search_directories);

        let resolver = AssemblyResolver::new(config);
        let main = resolver.load(&main_path)?;
        debug!("Repository opened on {}", main.name());

        let repository = Repository {
            main: main.clone(),
            resolver,
            modules: boxcar::Vec::new(),
            loaded: DashSet::new(),
            warnings: boxcar::Vec::new(),
            reported: DashSet::new(),
            fully_resolved: OnceLock::new(),
            type_index: OnceLock::new(),
            root_namespace: OnceLock::new(),
        };
        repository.register(&main);

        Ok(repository)
    }
}

/// The main module and the modules it references.
pub struct Repository {
    main: ModuleRc,
    resolver: AssemblyResolver,
    /// Modules in resolution order, the main module first
    modules: boxcar::Vec<ModuleRc>,
    loaded: DashSet<usize>,
    warnings: boxcar::Vec<String>,
    reported: DashSet<String>,
    fully_resolved: OnceLock<()>,
    /// Full name to (position in `modules`, `TypeDef` row), first module wins
    type_index: OnceLock<HashMap<String, (usize, u32)>>,
    root_namespace: OnceLock<Namespace>,
}

impl Repository {
    /// Open `main` and probe `search_directories` for its references
    ///
    /// # Errors
    /// Returns [`crate::Error::FileNotFound`] or [`crate::Error::BadImageFormat`] if the main
    /// module cannot be opened.
    pub fn open<P: AsRef<Path>>(main: P, search_directories: &[PathBuf]) -> Result<Repository> {
        search_directories
            .iter()
            .fold(RepositoryBuilder::new().main_module(main), |builder, directory| {
                builder.search_directory(directory)
            })
            .build()
    }

    /// The module whose surface is being read
    #[must_use]
    pub fn main_module(&self) -> &ModuleRc {
        &self.main
    }

    /// Every module loaded so far, the main module first, then in resolution order
    pub fn modules(&self) -> impl Iterator<Item = &ModuleRc> {
        self.modules.iter().map(|(_, module)| module)
    }

    /// Unresolved references and unreadable modules met so far, each reported once
    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.warnings.iter().map(|(_, warning)| warning.as_str())
    }

    /// The resolver used for assembly references
    #[must_use]
    pub fn resolver(&self) -> &AssemblyResolver {
        &self.resolver
    }

    fn register(&self, module: &ModuleRc) {
        if self.loaded.insert(Arc::as_ptr(module) as usize) {
            self.modules.push(module.clone());
        }
    }

    fn report(&self, message: String) {
        if self.reported.insert(message.clone()) {
            warn!("{message}");
            self.warnings.push(message);
        }
    }

    /// The module `identity` names, as referenced from `parent`; `None` if it cannot be located.
    ///
    /// # Errors
    /// Returns [`crate::Error::BadImageFormat`] if the located file is not a managed module.
    pub fn resolve_assembly(
        &self,
        identity: &AssemblyIdentity,
        parent: &Module,
    ) -> Result<Option<ModuleRc>> {
        match self.resolver.resolve(identity, Some(parent))? {
            Some(module) => {
                self.register(&module);
                Ok(Some(module))
            }
            None => {
                self.report(format!(
                    "Unresolved reference to {} from {}",
                    identity.display_name(),
                    parent.name()
                ));
                Ok(None)
            }
        }
    }

    /// The module of the `AssemblyRef` row `rid` of `module`
    ///
    /// # Errors
    /// Returns an error if the row does not exist or the located file is not a managed module.
    pub fn resolve_assembly_reference(&self, module: &Module, rid: u32) -> Result<Option<ModuleRc>> {
        let identity = module.assembly_reference(rid)?;
        self.resolve_assembly(identity, module)
    }

    /// Load every module reachable through assembly references, breadth first.
    ///
    /// Runs once; modules that turn out not to be managed images, and dependencies whose
    /// `AssemblyRef` table cannot be read, are reported and skipped.
    ///
    /// # Errors
    /// Returns an error if the `AssemblyRef` table of the main module cannot be read.
    pub fn resolve_all(&self) -> Result<()> {
        get_or_try_init(&self.fully_resolved, || {
            let mut position = 0;
            while position < self.modules.count() {
                if let Some(module) = self.modules.get(position).cloned() {
                    let references = match module.assembly_references() {
                        Ok(references) => references,
                        Err(error) if position > 0 => {
                            self.report(format!(
                                "Assembly references of {} cannot be read - {error}",
                                module.name()
                            ));
                            position += 1;
                            continue;
                        }
                        Err(error) => return Err(error),
                    };
                    for identity in references {
                        match self.resolve_assembly(identity, &module) {
                            Ok(_) => {}
                            Err(BadImageFormat(reason)) => self.report(format!(
                                "Reference to {} from {} is not a managed module - {reason}",
                                identity.display_name(),
                                module.name()
                            )),
                            Err(error) => return Err(error),
                        }
                    }
                }
                position += 1;
            }
            debug!("Resolved {} modules", self.modules.count());
            Ok(())
        })
        .map(|_| ())
    }

    fn type_index(&self) -> Result<&HashMap<String, (usize, u32)>> {
        get_or_try_init(&self.type_index, || {
            self.resolve_all()?;

            let mut index = HashMap::new();
            for (position, module) in self.modules.iter() {
                for (name, rid) in module.index()?.type_names() {
                    index.entry(name.to_string()).or_insert((position, rid));
                }
            }
            Ok(index)
        })
    }

    /// The definition named `full_name` in any loaded module, the main module first.
    ///
    /// Forces [`Repository::resolve_all`] on first use. Nested types are joined with `.`.
    ///
    /// # Errors
    /// Returns an error if a module's tables cannot be indexed.
    pub fn get_type_by_name(&self, full_name: &str) -> Result<Option<TypeWrapper>> {
        let Some((position, rid)) = self.type_index()?.get(full_name).copied() else {
            return Ok(None);
        };
        let Some(module) = self.modules.get(position) else {
            return Ok(None);
        };

        let definition = module.type_definition(rid)?;
        Ok(Some(TypeWrapper::Definition(TypeDefRef::new(&definition))))
    }

    /// The definition `reference` names, following nested scopes and type forwarders
    ///
    /// # Errors
    /// Returns an error for a released module, a malformed scope or an overlong forwarder chain.
    pub fn resolve_type_reference(&self, reference: &TypeReference) -> Result<Option<TypeDefRc>> {
        let module = reference.module()?;
        let full_name = reference.full_name();

        let mut scope = reference.resolution_scope();
        let mut depth = 0;
        while let ResolutionScope::TypeRef(outer) = scope {
            depth += 1;
            if depth > MAX_SCOPE_DEPTH {
                return Err(RecursionLimit(MAX_SCOPE_DEPTH));
            }
            scope = module.type_reference(outer)?.resolution_scope();
        }

        match scope {
            ResolutionScope::Module | ResolutionScope::Null | ResolutionScope::TypeRef(_) => {
                self.find_in_module(&module, full_name, 0)
            }
            ResolutionScope::AssemblyRef(rid) => match self.resolve_assembly_reference(&module, rid)? {
                Some(target) => self.find_in_module(&target, full_name, 0),
                None => Ok(None),
            },
            ResolutionScope::ModuleRef(rid) => match self.module_of_assembly(&module, rid)? {
                Some(target) => self.find_in_module(&target, full_name, 0),
                None => Ok(None),
            },
        }
    }

    // Another module of the same assembly, looked up among the loaded ones, then beside `module`
    fn module_of_assembly(&self, module: &Module, rid: u32) -> Result<Option<ModuleRc>> {
        let name = module.module_reference_name(rid)?;
        if let Some(loaded) = self
            .modules()
            .find(|loaded| loaded.name().eq_ignore_ascii_case(&name))
        {
            return Ok(Some(loaded.clone()));
        }

        let sibling = module
            .path()
            .and_then(Path::parent)
            .map(|directory| directory.join(&*name))
            .filter(|path| path.is_file());

        match sibling {
            Some(path) => {
                let target = self.resolver.load(&path)?;
                self.register(&target);
                Ok(Some(target))
            }
            None => {
                self.report(format!("Unresolved module {} from {}", name, module.name()));
                Ok(None)
            }
        }
    }

    fn find_in_module(
        &self,
        module: &ModuleRc,
        full_name: &str,
        depth: usize,
    ) -> Result<Option<TypeDefRc>> {
        if depth > MAX_FORWARDER_DEPTH {
            return Err(RecursionLimit(MAX_FORWARDER_DEPTH));
        }

        if let Some(definition) = module.type_by_name(full_name)? {
            return Ok(Some(definition));
        }

        match module.index()?.exported_type(full_name) {
            Some(implementation) if implementation.tag == TableId::AssemblyRef => {
                debug!("{full_name} is forwarded from {}", module.name());
                match self.resolve_assembly_reference(module, implementation.row)? {
                    Some(target) => self.find_in_module(&target, full_name, depth + 1),
                    None => Ok(None),
                }
            }
            _ => Ok(None),
        }
    }

    /// Namespaces of the main module and the top-level public types in each
    ///
    /// # Errors
    /// Returns an error if the main module's types cannot be realized.
    pub fn root_namespace(&self) -> Result<&Namespace> {
        get_or_try_init(&self.root_namespace, || Namespace::build(&self.main))
    }
}

impl fmt::Debug for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("main", &self.main.name())
            .field("modules", &self.modules.count())
            .field("warnings", &self.warnings.count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::{
        metadata::{members::MemberFilter, typesystem::Accessibility},
        test::{FieldDecl, ImageBuilder, MethodDecl, SigType, TypeDecl},
        Error,
    };

    fn config() -> ResolverConfig {
        ResolverConfig::new()
    }

    #[test]
    fn open_errors_are_distinct() {
        let root = tempfile::tempdir().unwrap();
        let missing = root.path().join("Missing.dll");
        assert!(matches!(
            RepositoryBuilder::new().main_module(&missing).resolver_config(config()).build(),
            Err(Error::FileNotFound(_))
        ));

        let garbage = root.path().join("Garbage.dll");
        fs::write(&garbage, b"not a module").unwrap();
        assert!(matches!(
            RepositoryBuilder::new().main_module(&garbage).resolver_config(config()).build(),
            Err(Error::BadImageFormat(_))
        ));

        assert!(matches!(
            RepositoryBuilder::new().build(),
            Err(Error::InvalidOperation(_))
        ));
    }

    #[test]
    fn references_resolve_across_modules() {
        let root = tempfile::tempdir().unwrap();
        let core = ImageBuilder::new("Core")
            .add_type(TypeDecl::class("Core", "Widget").public())
            .add_type(TypeDecl::class("", "Part").nested_public().nested_in("Core.Widget"))
            .build();
        fs::write(root.path().join("Core.dll"), core).unwrap();

        let app = ImageBuilder::new("App")
            .assembly_reference("Core", (1, 0, 0, 0))
            .assembly_reference("Gone", (1, 0, 0, 0))
            .type_reference("Core", "Widget", "Core")
            .nested_type_reference("Part", "Core.Widget")
            .type_reference("Gone", "Lost", "Gone")
            .build();
        let app_path = root.path().join("App.dll");
        fs::write(&app_path, app).unwrap();

        let repository = RepositoryBuilder::new()
            .main_module(&app_path)
            .resolver_config(config())
            .build()
            .unwrap();
        let main = repository.main_module().clone();
        let references = main.type_references().unwrap();

        let widget = references[0].resolve(&repository).unwrap().unwrap();
        assert_eq!(widget.full_name(), "Core.Widget");
        let part = references[1].resolve(&repository).unwrap().unwrap();
        assert_eq!(part.full_name(), "Core.Widget.Part");
        assert!(references[2].resolve(&repository).unwrap().is_none());

        let unknown = TypeWrapper::Reference(references[2].clone()).resolve(&repository).unwrap();
        assert!(matches!(unknown, TypeWrapper::Unknown(name) if &*name == "Gone.Lost"));

        assert_eq!(repository.modules().count(), 2);
        let warnings: Vec<&str> = repository.warnings().collect();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Gone"));
    }

    #[test]
    fn missing_references_leave_lookups_intact() {
        let root = tempfile::tempdir().unwrap();
        let app = ImageBuilder::new("App")
            .assembly_reference("Gone", (1, 0, 0, 0))
            .type_reference("Gone", "Lost", "Gone")
            .add_type(TypeDecl::class("App", "Thing").public())
            .build();
        let app_path = root.path().join("App.dll");
        fs::write(&app_path, app).unwrap();

        let repository = Repository::open(&app_path, &[]).unwrap();

        assert!(repository.get_type_by_name("Gone.Lost").unwrap().is_none());
        let thing = repository.get_type_by_name("App.Thing").unwrap().unwrap();
        assert_eq!(thing.full_name(), "App.Thing");
        assert_eq!(repository.modules().count(), 1);
        assert!(repository.warnings().any(|warning| warning.contains("Gone")));
    }

    #[test]
    fn unreadable_dependency_is_skipped() {
        let root = tempfile::tempdir().unwrap();
        let mut dep = ImageBuilder::new("Dep")
            .assembly_reference("Unreadable", (1, 0, 0, 0))
            .add_type(TypeDecl::class("Dep", "Helper").public())
            .build();
        let name = b"Unreadable\0";
        let at = dep
            .windows(name.len())
            .position(|window| window == name)
            .unwrap();
        dep[at] = 0xFF;
        fs::write(root.path().join("Dep.dll"), dep).unwrap();

        let app = ImageBuilder::new("App")
            .assembly_reference("Dep", (1, 0, 0, 0))
            .add_type(TypeDecl::class("App", "Thing").public())
            .build();
        let app_path = root.path().join("App.dll");
        fs::write(&app_path, app).unwrap();

        let repository = Repository::open(&app_path, &[]).unwrap();

        let thing = repository.get_type_by_name("App.Thing").unwrap().unwrap();
        assert_eq!(thing.full_name(), "App.Thing");
        let helper = repository.get_type_by_name("Dep.Helper").unwrap().unwrap();
        assert_eq!(helper.full_name(), "Dep.Helper");
        assert_eq!(repository.modules().count(), 2);
        assert!(repository
            .warnings()
            .any(|warning| warning.contains("Dep.dll") && warning.contains("cannot be read")));
    }

    #[test]
    fn lookup_by_name_and_identity() {
        let root = tempfile::tempdir().unwrap();
        let shared = ImageBuilder::new("Shared")
            .add_type(TypeDecl::class("Shared", "Thing").public())
            .build();
        fs::write(root.path().join("Shared.dll"), shared).unwrap();

        let middle = ImageBuilder::new("Middle")
            .assembly_reference("Shared", (1, 0, 0, 0))
            .assembly_reference("App", (1, 0, 0, 0))
            .build();
        fs::write(root.path().join("Middle.dll"), middle).unwrap();

        let app = ImageBuilder::new("App")
            .assembly_reference("Middle", (1, 0, 0, 0))
            .add_type(TypeDecl::class("App", "Thing").public())
            .build();
        let app_path = root.path().join("App.dll");
        fs::write(&app_path, app).unwrap();

        let repository = Repository::open(&app_path, &[root.path().to_path_buf()]).unwrap();

        let thing = repository.get_type_by_name("Shared.Thing").unwrap().unwrap();
        assert_eq!(thing.full_name(), "Shared.Thing");
        assert!(repository.get_type_by_name("Shared.Nothing").unwrap().is_none());

        // App references itself through Middle; the cycle ends on the already loaded module
        let names: Vec<&str> = repository.modules().map(|module| module.name()).collect();
        assert_eq!(names, ["App.dll", "Middle.dll", "Shared.dll"]);

        let middle = repository.modules().nth(1).unwrap().clone();
        let first = repository.resolve_assembly_reference(&middle, 1).unwrap().unwrap();
        let second = repository.resolve_assembly_reference(&middle, 1).unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let back = repository.resolve_assembly_reference(&middle, 2).unwrap().unwrap();
        assert!(Arc::ptr_eq(&back, repository.main_module()));
    }

    fn surface(repository: &Repository) -> Vec<(String, Accessibility, Vec<String>)> {
        repository
            .main_module()
            .type_definitions()
            .unwrap()
            .iter()
            .map(|definition| {
                let members = definition
                    .members(MemberFilter::All)
                    .unwrap()
                    .iter()
                    .map(|member| member.name().to_string())
                    .collect();
                (
                    definition.full_name().to_string(),
                    definition.effective_accessibility().unwrap(),
                    members,
                )
            })
            .collect()
    }

    #[test]
    fn decoding_is_deterministic() {
        let root = tempfile::tempdir().unwrap();
        let image = ImageBuilder::new("Stable")
            .add_type(
                TypeDecl::class("Stable", "Outer")
                    .public()
                    .field(FieldDecl::new("count", SigType::I4))
                    .method(MethodDecl::new("Run", SigType::Void)),
            )
            .add_type(TypeDecl::class("", "Inner").nested_public().nested_in("Stable.Outer"))
            .add_type(TypeDecl::class("Stable", "Hidden"))
            .build();
        let path = root.path().join("Stable.dll");
        fs::write(&path, image).unwrap();

        let first = RepositoryBuilder::new().main_module(&path).resolver_config(config()).build().unwrap();
        let second = RepositoryBuilder::new().main_module(&path).resolver_config(config()).build().unwrap();
        assert!(!Arc::ptr_eq(first.main_module(), second.main_module()));

        let surface_of_first = surface(&first);
        assert_eq!(surface_of_first, surface(&second));
        assert_eq!(surface_of_first.len(), 4);
    }

    #[test]
    fn forwarded_types() {
        let root = tempfile::tempdir().unwrap();
        let target = ImageBuilder::new("Target")
            .add_type(TypeDecl::class("Moved", "Type").public())
            .build();
        fs::write(root.path().join("Target.dll"), target).unwrap();

        let facade = ImageBuilder::new("Facade")
            .assembly_reference("Target", (1, 0, 0, 0))
            .forwarded_type("Moved", "Type", "Target")
            .build();
        fs::write(root.path().join("Facade.dll"), facade).unwrap();

        let app = ImageBuilder::new("App")
            .assembly_reference("Facade", (1, 0, 0, 0))
            .type_reference("Moved", "Type", "Facade")
            .build();
        let app_path = root.path().join("App.dll");
        fs::write(&app_path, app).unwrap();

        let repository = RepositoryBuilder::new()
            .main_module(&app_path)
            .resolver_config(config())
            .build()
            .unwrap();
        let reference = repository.main_module().type_reference(1).unwrap();
        let definition = reference.resolve(&repository).unwrap().unwrap();

        assert_eq!(definition.full_name(), "Moved.Type");
        assert_eq!(definition.module().unwrap().name(), "Target.dll");
    }
}
