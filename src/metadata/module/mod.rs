//! One opened module image and the wrapper graph over its tables.
//!
//! A [`Module`] maps (or buffers) the whole image up front and keeps borrowed views of the table
//! stream and heaps next to it, so every later read is a slice operation. All derived state lives
//! in per-module caches:
//!
//! - heap decodes (`#Strings`, `#US`) keyed by heap offset,
//! - realized wrappers keyed by table row, so a row always maps to the same `Arc`,
//! - a [`ModuleIndex`] of parent to child lookups, built once on first use,
//! - the public types, the type references and the method semantics lookup.
//!
//! Wrappers hold a weak link back to their module; the module is their only strong owner and is
//! itself owned by whoever opened it, usually a [`crate::metadata::repository::Repository`].
//! Dropping the last `Arc<Module>` releases the image and every cached wrapper.
//!
//! # Examples
//!
//! ```rust,no_run
//! use cilsurface::metadata::module::Module;
//!
//! let module = Module::open("library.dll")?;
//! for definition in module.public_types()? {
//!     println!("{} ({:?})", definition.full_name(), definition.kind()?);
//! }
//! # Ok::<(), cilsurface::Error>(())
//! ```

mod index;

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::{Arc, OnceLock, Weak},
};

use dashmap::DashMap;
use log::{debug, warn};
use ouroboros::self_referencing;

pub use index::ModuleIndex;

use crate::{
    file::File,
    metadata::{
        constants::ConstantValue,
        cor20header::Cor20Header,
        customattributes::{CustomAttribute, CustomAttributeRc},
        identity::{AssemblyFlags, AssemblyHashAlgorithm, AssemblyIdentity, AssemblyVersion, Identity},
        members::{MethodDefinition, MethodRc},
        root::Root,
        signatures::{SignatureTypeProvider, WrapperProvider},
        streams::{Blob, Guid, Strings, TablesHeader, UserStrings},
        tables::{
            AssemblyRaw, AssemblyRefRaw, ConstantRaw, CustomAttributeRaw, GenericParamRaw,
            MetadataTable, MethodDefRaw, MethodSemanticsRaw, ModuleRaw, ModuleRefRaw, RowReadable,
            TableId, TypeDefRaw, TypeRefRaw, TypeSpecRaw,
        },
        token::Token,
        typesystem::{
            GenericContext, GenericParamRc, GenericParameter, MethodSemanticsLookup, TypeDefRc,
            TypeDefRef, TypeDefinition, TypeReference, TypeReferenceRc, TypeWrapper,
        },
    },
    utils::{cached, get_or_try_init},
    Error::{BadImageFormat, FileNotFound},
    Result,
};

/// A reference counted [`Module`]
pub type ModuleRc = Arc<Module>;

/// Borrowed views of the streams of one image
struct ModuleData<'a> {
    root: Root,
    tables: TablesHeader<'a>,
    strings: Option<Strings<'a>>,
    user_strings: Option<UserStrings<'a>>,
    guids: Option<Guid<'a>>,
    blobs: Option<Blob<'a>>,
}

impl<'a> ModuleData<'a> {
    fn from_file(file: &'a File) -> Result<Self> {
        let (clr_rva, clr_size) = file.clr()?;
        let cor20_header = Cor20Header::read(file.rva_slice(clr_rva, clr_size)?)?;

        let metadata = file.rva_slice(
            cor20_header.meta_data_rva as usize,
            cor20_header.meta_data_size as usize,
        )?;
        let root = Root::read(metadata)?;

        let mut tables = None;
        let mut strings = None;
        let mut user_strings = None;
        let mut guids = None;
        let mut blobs = None;

        for stream in &root.stream_headers {
            let start = stream.offset as usize;
            let stream_data = metadata
                .get(start..start + stream.size as usize)
                .ok_or(crate::Error::OutOfBounds)?;

            match stream.name.as_str() {
                "#~" | "#-" => tables = Some(TablesHeader::from(stream_data)?),
                "#Strings" => strings = Some(Strings::from(stream_data)?),
                "#US" => user_strings = Some(UserStrings::from(stream_data)?),
                "#GUID" => guids = Some(Guid::from(stream_data)?),
                "#Blob" => blobs = Some(Blob::from(stream_data)?),
                _ => {}
            }
        }

        let tables = tables.ok_or_else(|| malformed_error!("Metadata has no tables stream"))?;

        Ok(ModuleData {
            root,
            tables,
            strings,
            user_strings,
            guids,
            blobs,
        })
    }
}

#[self_referencing]
struct ModuleView {
    file: Arc<File>,
    #[borrows(file)]
    #[covariant]
    data: ModuleData<'this>,
}

/// One opened module image.
pub struct Module {
    view: ModuleView,
    this: Weak<Module>,
    path: Option<PathBuf>,
    name: String,
    strings: DashMap<u32, Arc<str>>,
    user_strings: DashMap<u32, Arc<str>>,
    index: OnceLock<ModuleIndex>,
    type_definitions: DashMap<u32, TypeDefRc>,
    type_references: DashMap<u32, TypeReferenceRc>,
    methods: DashMap<u32, MethodRc>,
    generic_parameters: DashMap<u32, GenericParamRc>,
    custom_attributes: DashMap<u32, CustomAttributeRc>,
    public_types: OnceLock<Vec<TypeDefRc>>,
    all_type_references: OnceLock<Vec<TypeReferenceRc>>,
    method_semantics: OnceLock<MethodSemanticsLookup>,
    identity: OnceLock<Option<AssemblyIdentity>>,
    assembly_references: OnceLock<Vec<AssemblyIdentity>>,
}

impl Module {
    /// Open the module at `path`
    ///
    /// # Errors
    /// Returns [`FileNotFound`] if nothing exists at `path` and [`BadImageFormat`] if the file is
    /// not a managed PE image.
    pub fn open(path: impl AsRef<Path>) -> Result<ModuleRc> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(FileNotFound(path.to_path_buf()));
        }

        let file = File::from_file(path).map_err(|error| match error {
            crate::Error::FileError(io) if io.kind() == std::io::ErrorKind::NotFound => {
                FileNotFound(path.to_path_buf())
            }
            other => BadImageFormat(format!("{} - {other}", path.display())),
        })?;

        let module = Self::load(Arc::new(file), Some(path.to_path_buf()))?;
        debug!("Opened module {} from {}", module.name, path.display());
        Ok(module)
    }

    /// Parse a module image held in memory
    ///
    /// # Errors
    /// Returns [`BadImageFormat`] if `data` is not a managed PE image.
    pub fn from_bytes(data: Vec<u8>) -> Result<ModuleRc> {
        let file = File::from_mem(data).map_err(|error| BadImageFormat(error.to_string()))?;
        Self::load(Arc::new(file), None)
    }

    fn load(file: Arc<File>, path: Option<PathBuf>) -> Result<ModuleRc> {
        let view = ModuleView::try_new(file, |file| ModuleData::from_file(file))
            .map_err(|error| match &path {
                Some(path) => BadImageFormat(format!("{} - {error}", path.display())),
                None => BadImageFormat(error.to_string()),
            })?;

        let name = Self::read_module_name(&view).unwrap_or_else(|| {
            path.as_deref()
                .and_then(Path::file_name)
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default()
        });

        Ok(Arc::new_cyclic(|this| Module {
            view,
            this: this.clone(),
            path,
            name,
            strings: DashMap::new(),
            user_strings: DashMap::new(),
            index: OnceLock::new(),
            type_definitions: DashMap::new(),
            type_references: DashMap::new(),
            methods: DashMap::new(),
            generic_parameters: DashMap::new(),
            custom_attributes: DashMap::new(),
            public_types: OnceLock::new(),
            all_type_references: OnceLock::new(),
            method_semantics: OnceLock::new(),
            identity: OnceLock::new(),
            assembly_references: OnceLock::new(),
        }))
    }

    fn read_module_name(view: &ModuleView) -> Option<String> {
        let data = view.borrow_data();
        let row = data.tables.table::<ModuleRaw>().get(1)?;
        let name = data.strings.as_ref()?.get(row.name as usize).ok()?;
        (!name.is_empty()).then(|| name.to_string())
    }

    fn data(&self) -> &ModuleData<'_> {
        self.view.borrow_data()
    }

    /// A weak link to this module, for wrappers
    #[must_use]
    pub fn weak(&self) -> Weak<Module> {
        self.this.clone()
    }

    /// Path the module was opened from, `None` for in-memory images
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Name from the `Module` table, e.g. `Library.dll`
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runtime version string of the metadata root, e.g. `v4.0.30319`
    #[must_use]
    pub fn runtime_version(&self) -> &str {
        &self.data().root.version
    }

    /// Module version id
    #[must_use]
    pub fn mvid(&self) -> Option<uguid::Guid> {
        let row = self.table::<ModuleRaw>().get(1)?;
        self.data().guids.as_ref()?.get(row.mvid as usize).ok()
    }

    /// The tables stream
    #[must_use]
    pub fn tables(&self) -> &TablesHeader<'_> {
        &self.data().tables
    }

    /// Typed view of the table holding `T` rows
    #[must_use]
    pub fn table<T: RowReadable>(&self) -> MetadataTable<'_, T> {
        self.data().tables.table::<T>()
    }

    /// Row `rid` of the table holding `T` rows
    ///
    /// # Errors
    /// Returns `Malformed` if the row does not exist or cannot be decoded.
    pub fn row<T: RowReadable>(&self, rid: u32) -> Result<T> {
        self.table::<T>().get(rid).ok_or_else(|| {
            malformed_error!("{:?} row {} does not exist", T::TABLE_ID, rid)
        })
    }

    /// Number of rows in `table`
    #[must_use]
    pub fn row_count(&self, table: TableId) -> u32 {
        self.data().tables.row_count(table)
    }

    /// The `#Strings` entry at `index`
    ///
    /// # Errors
    /// Returns an error for an index outside the heap or invalid UTF-8.
    pub fn string_of(&self, index: u32) -> Result<Arc<str>> {
        cached(&self.strings, index, || match &self.data().strings {
            Some(strings) => Ok(Arc::from(strings.get(index as usize)?)),
            None if index == 0 => Ok(Arc::from("")),
            None => Err(malformed_error!("String index {} without a #Strings heap", index)),
        })
    }

    /// The `#US` entry at `index`, the operand of `ldstr`
    ///
    /// # Errors
    /// Returns an error for an index outside the heap.
    pub fn user_string_of(&self, index: u32) -> Result<Arc<str>> {
        cached(&self.user_strings, index, || match &self.data().user_strings {
            Some(user_strings) => Ok(Arc::from(user_strings.get(index as usize)?)),
            None => Err(malformed_error!("User string index {} without a #US heap", index)),
        })
    }

    /// The `#GUID` entry at the 1-based `index`, `None` for index 0
    ///
    /// # Errors
    /// Returns an error for an index past the heap.
    pub fn guid_of(&self, index: u32) -> Result<Option<uguid::Guid>> {
        if index == 0 {
            return Ok(None);
        }
        match &self.data().guids {
            Some(guids) => guids.get(index as usize).map(Some),
            None => Err(malformed_error!("GUID index {} without a #GUID heap", index)),
        }
    }

    /// The `#Blob` entry at `index`
    ///
    /// # Errors
    /// Returns an error for an index or length outside the heap.
    pub fn blob_of(&self, index: u32) -> Result<&[u8]> {
        match &self.data().blobs {
            Some(blobs) => blobs.get(index as usize),
            None if index == 0 => Ok(&[]),
            None => Err(malformed_error!("Blob index {} without a #Blob heap", index)),
        }
    }

    /// Signature blob of the `TypeSpec` row `rid`
    ///
    /// # Errors
    /// Returns an error if the row or its blob cannot be read.
    pub fn type_spec_blob(&self, rid: u32) -> Result<&[u8]> {
        let row = self.row::<TypeSpecRaw>(rid)?;
        self.blob_of(row.signature)
    }

    /// Reverse lookups over the tables, built on first use
    ///
    /// # Errors
    /// Returns an error if one of the indexed tables is malformed.
    pub fn index(&self) -> Result<&ModuleIndex> {
        get_or_try_init(&self.index, || ModuleIndex::build(self))
    }

    /// Identity of the assembly this module is the manifest of, `None` for a netmodule
    ///
    /// # Errors
    /// Returns an error if the `Assembly` row cannot be decoded.
    pub fn assembly_identity(&self) -> Result<Option<&AssemblyIdentity>> {
        get_or_try_init(&self.identity, || {
            let Some(row) = self.table::<AssemblyRaw>().get(1) else {
                return Ok(None);
            };

            let public_key = self.blob_of(row.public_key)?;
            Ok(Some(AssemblyIdentity {
                name: self.string_of(row.name)?.to_string(),
                version: AssemblyVersion::new(
                    row.major_version,
                    row.minor_version,
                    row.build_number,
                    row.revision_number,
                ),
                culture: self.culture_of(row.culture)?,
                strong_name: if public_key.is_empty() {
                    None
                } else {
                    Some(Identity::from(public_key, true)?)
                },
                flags: AssemblyFlags::from_bits_retain(row.flags),
                hash_algorithm: row.hash_alg_id,
            }))
        })
        .map(Option::as_ref)
    }

    /// Identities of every `AssemblyRef` row, in row order
    ///
    /// # Errors
    /// Returns an error if a reference row or its blobs cannot be decoded.
    pub fn assembly_references(&self) -> Result<&[AssemblyIdentity]> {
        get_or_try_init(&self.assembly_references, || {
            let mut references = Vec::new();
            for row in &self.table::<AssemblyRefRaw>() {
                references.push(self.assembly_reference_identity(&row)?);
            }
            Ok(references)
        })
        .map(Vec::as_slice)
    }

    /// Identity of the `AssemblyRef` row `rid`
    ///
    /// # Errors
    /// Returns an error if the row does not exist or cannot be decoded.
    pub fn assembly_reference(&self, rid: u32) -> Result<&AssemblyIdentity> {
        let references = self.assembly_references()?;
        (rid as usize)
            .checked_sub(1)
            .and_then(|position| references.get(position))
            .ok_or_else(|| malformed_error!("AssemblyRef row {} does not exist", rid))
    }

    fn assembly_reference_identity(&self, row: &AssemblyRefRaw) -> Result<AssemblyIdentity> {
        let flags = AssemblyFlags::from_bits_retain(row.flags);
        let key_or_token = self.blob_of(row.public_key_or_token)?;

        Ok(AssemblyIdentity {
            name: self.string_of(row.name)?.to_string(),
            version: AssemblyVersion::new(
                row.major_version,
                row.minor_version,
                row.build_number,
                row.revision_number,
            ),
            culture: self.culture_of(row.culture)?,
            strong_name: if key_or_token.is_empty() {
                None
            } else {
                Some(Identity::from(
                    key_or_token,
                    flags.contains(AssemblyFlags::PUBLIC_KEY),
                )?)
            },
            flags,
            hash_algorithm: AssemblyHashAlgorithm::SHA1,
        })
    }

    fn culture_of(&self, index: u32) -> Result<Option<String>> {
        let culture = self.string_of(index)?;
        Ok(match &*culture {
            "" | "neutral" => None,
            other => Some(other.to_string()),
        })
    }

    /// File name of the `ModuleRef` row `rid`
    ///
    /// # Errors
    /// Returns an error if the row does not exist.
    pub fn module_reference_name(&self, rid: u32) -> Result<Arc<str>> {
        let row = self.row::<ModuleRefRaw>(rid)?;
        self.string_of(row.name)
    }

    /// The wrapper of the `TypeDef` row `rid`
    ///
    /// # Errors
    /// Returns an error if the row does not exist or its names cannot be read.
    pub fn type_definition(&self, rid: u32) -> Result<TypeDefRc> {
        cached(&self.type_definitions, rid, || {
            let row = self.row::<TypeDefRaw>(rid)?;
            Ok(Arc::new(TypeDefinition::new(self, &row)?))
        })
    }

    /// Every type definition in row order, including `<Module>` and nested types
    ///
    /// # Errors
    /// Returns an error if a row cannot be realized.
    pub fn type_definitions(&self) -> Result<Vec<TypeDefRc>> {
        (1..=self.row_count(TableId::TypeDef))
            .map(|rid| self.type_definition(rid))
            .collect()
    }

    /// Types visible outside the assembly, nested ones included, in row order
    ///
    /// # Errors
    /// Returns an error if a row cannot be realized.
    pub fn public_types(&self) -> Result<&[TypeDefRc]> {
        get_or_try_init(&self.public_types, || {
            let mut public_types = Vec::new();
            for definition in self.type_definitions()? {
                if definition.is_public_surface()? {
                    public_types.push(definition);
                }
            }
            Ok(public_types)
        })
        .map(Vec::as_slice)
    }

    /// The type defined in this module under `full_name`, nested types joined with `.`
    ///
    /// # Errors
    /// Returns an error if the index or the row cannot be realized.
    pub fn type_by_name(&self, full_name: &str) -> Result<Option<TypeDefRc>> {
        match self.index()?.type_by_name(full_name) {
            Some(rid) => self.type_definition(rid).map(Some),
            None => Ok(None),
        }
    }

    /// The wrapper of the `TypeRef` row `rid`
    ///
    /// # Errors
    /// Returns an error if the row does not exist or its names cannot be read.
    pub fn type_reference(&self, rid: u32) -> Result<TypeReferenceRc> {
        cached(&self.type_references, rid, || {
            let row = self.row::<TypeRefRaw>(rid)?;
            Ok(Arc::new(TypeReference::new(self, &row)?))
        })
    }

    /// Every type reference in row order
    ///
    /// # Errors
    /// Returns an error if a row cannot be realized.
    pub fn type_references(&self) -> Result<&[TypeReferenceRc]> {
        get_or_try_init(&self.all_type_references, || {
            (1..=self.row_count(TableId::TypeRef))
                .map(|rid| self.type_reference(rid))
                .collect()
        })
        .map(Vec::as_slice)
    }

    /// The wrapper of the `MethodDef` row `rid`
    ///
    /// # Errors
    /// Returns an error if the row does not exist or has no declaring type.
    pub fn method_definition(&self, rid: u32) -> Result<MethodRc> {
        cached(&self.methods, rid, || {
            let owner = self
                .index()?
                .method_owner(rid)
                .ok_or_else(|| malformed_error!("MethodDef row {} has no declaring type", rid))?;
            let declaring_type = TypeDefRef::new(&self.type_definition(owner)?);
            let row = self.row::<MethodDefRaw>(rid)?;
            Ok(Arc::new(MethodDefinition::new(self, &row, declaring_type)?))
        })
    }

    /// The wrapper of the `GenericParam` row `rid`
    ///
    /// # Errors
    /// Returns an error if the row does not exist.
    pub fn generic_parameter(&self, rid: u32) -> Result<GenericParamRc> {
        cached(&self.generic_parameters, rid, || {
            let row = self.row::<GenericParamRaw>(rid)?;
            Ok(Arc::new(GenericParameter::new(self, &row)?))
        })
    }

    /// Generic parameters of the `TypeDef` or `MethodDef` `owner`, ordered by number
    ///
    /// # Errors
    /// Returns an error if a parameter row cannot be realized.
    pub fn generic_parameters_of(&self, owner: Token) -> Result<Vec<GenericParamRc>> {
        let mut parameters = self
            .index()?
            .generic_parameters_of(owner)
            .iter()
            .map(|rid| self.generic_parameter(*rid))
            .collect::<Result<Vec<_>>>()?;
        parameters.sort_by_key(|parameter| parameter.number);
        Ok(parameters)
    }

    /// The generic context signatures of `owner` decode in
    ///
    /// # Errors
    /// Returns an error if the owner cannot be realized.
    pub fn generic_context_of(&self, owner: Token) -> Result<GenericContext> {
        match TableId::from_u8(owner.table()) {
            Some(TableId::TypeDef) => self.type_definition(owner.row())?.generic_context(),
            Some(TableId::MethodDef) => self.method_definition(owner.row())?.generic_context(),
            _ => Ok(GenericContext::default()),
        }
    }

    /// Decode the `TypeDefOrRef` or `TypeSpec` token `token` within `context`
    ///
    /// # Errors
    /// Returns an error for a token of another table or a malformed `TypeSpec` blob.
    pub fn decode_type_token(&self, token: Token, context: &GenericContext) -> Result<TypeWrapper> {
        WrapperProvider::new(self, context).type_from_token(token, false)
    }

    /// Attributes applied to `parent`, in row order.
    ///
    /// Attributes whose constructor cannot be decoded are logged and skipped.
    ///
    /// # Errors
    /// Returns an error if the index cannot be built or a row fails for a reason other than
    /// malformed content.
    pub fn custom_attributes(&self, parent: Token) -> Result<Vec<CustomAttributeRc>> {
        let rows = self.index()?.attributes_of(parent);
        let mut attributes = Vec::with_capacity(rows.len());

        for rid in rows {
            let attribute = cached(&self.custom_attributes, *rid, || {
                let row = self.row::<CustomAttributeRaw>(*rid)?;
                Ok(Arc::new(CustomAttribute::new(self, &row)?))
            });

            match attribute {
                Ok(attribute) => attributes.push(attribute),
                Err(error) if error.is_malformed() => {
                    warn!("Skipping attribute {rid} on {parent} in {} - {error}", self.name);
                }
                Err(error) => return Err(error),
            }
        }

        Ok(attributes)
    }

    /// The `Constant` row of `parent`, decoded
    ///
    /// # Errors
    /// Returns `Malformed` for an unsupported constant type or a blob of the wrong size.
    pub fn constant_of(&self, parent: Token) -> Result<Option<ConstantValue>> {
        let Some(rid) = self.index()?.constant_of(parent) else {
            return Ok(None);
        };

        let row = self.row::<ConstantRaw>(rid)?;
        ConstantValue::decode(row.base, self.blob_of(row.value)?).map(Some)
    }

    /// Accessor to property/event lookup, built on first use
    ///
    /// # Errors
    /// Currently infallible.
    pub fn method_semantics(&self) -> Result<&MethodSemanticsLookup> {
        get_or_try_init(&self.method_semantics, || {
            Ok(MethodSemanticsLookup::new(&self.table::<MethodSemanticsRaw>()))
        })
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::typesystem::{Accessibility, TypeKind},
        test::{ImageBuilder, TypeDecl},
        Error,
    };

    #[test]
    fn open_missing_and_garbage() {
        let directory = tempfile::tempdir().unwrap();

        let missing = directory.path().join("Missing.dll");
        assert!(matches!(Module::open(&missing), Err(Error::FileNotFound(path)) if path == missing));

        let garbage = directory.path().join("Garbage.dll");
        std::fs::write(&garbage, b"MZ not really a module").unwrap();
        assert!(matches!(Module::open(&garbage), Err(Error::BadImageFormat(_))));

        assert!(matches!(Module::from_bytes(vec![0; 64]), Err(Error::BadImageFormat(_))));
    }

    #[test]
    fn names_and_identity() {
        let image = ImageBuilder::new("Library")
            .version(1, 2, 3, 4)
            .assembly_reference("mscorlib", (4, 0, 0, 0))
            .build();
        let module = Module::from_bytes(image).unwrap();

        assert_eq!(module.name(), "Library.dll");
        assert_eq!(module.runtime_version(), "v4.0.30319");
        assert!(module.mvid().is_some());

        let identity = module.assembly_identity().unwrap().unwrap();
        assert_eq!(identity.name, "Library");
        assert_eq!(identity.version, AssemblyVersion::new(1, 2, 3, 4));

        let references = module.assembly_references().unwrap();
        assert_eq!(references.len(), 1);
        assert_eq!(references[0].name, "mscorlib");
        assert_eq!(module.assembly_reference(1).unwrap().version.major, 4);
        assert!(module.assembly_reference(2).is_err());
    }

    #[test]
    fn wrappers_are_memoized() {
        let image = ImageBuilder::new("Library")
            .add_type(TypeDecl::class("Acme", "Widget").public())
            .build();
        let module = Module::from_bytes(image).unwrap();

        let widget = module.type_by_name("Acme.Widget").unwrap().unwrap();
        let again = module.type_definition(widget.rid).unwrap();
        assert!(Arc::ptr_eq(&widget, &again));

        let first = module.string_of(1).unwrap();
        let second = module.string_of(1).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        assert!(module.type_by_name("Acme.Missing").unwrap().is_none());
    }

    #[test]
    fn public_types_exclude_hidden_nesting() {
        let image = ImageBuilder::new("Library")
            .add_type(TypeDecl::class("Acme", "Hidden"))
            .add_type(TypeDecl::class("", "Inner").nested_public().nested_in("Acme.Hidden"))
            .add_type(TypeDecl::class("Acme", "Shown").public())
            .add_type(TypeDecl::class("", "Inner").nested_public().nested_in("Acme.Shown"))
            .build();
        let module = Module::from_bytes(image).unwrap();

        let names: Vec<&str> = module
            .public_types()
            .unwrap()
            .iter()
            .map(|definition| definition.full_name())
            .collect();
        assert_eq!(names, ["Acme.Shown", "Acme.Shown.Inner"]);

        let hidden_inner = module.type_by_name("Acme.Hidden.Inner").unwrap().unwrap();
        assert_eq!(hidden_inner.accessibility(), Accessibility::Public);
        assert_eq!(
            hidden_inner.effective_accessibility().unwrap(),
            Accessibility::Internal
        );
        assert_eq!(hidden_inner.kind().unwrap(), TypeKind::Class);
    }
}
