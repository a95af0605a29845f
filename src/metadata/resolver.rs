//! Locating referenced assemblies on disk.
//!
//! The [`AssemblyResolver`] turns an [`AssemblyIdentity`] taken from an `AssemblyRef` row into an
//! opened [`Module`]. Locations are probed in a fixed order and the first hit wins:
//!
//! 1. Windows Runtime references: the platform metadata directory, then the system one.
//! 2. A strong-named `mscorlib`: the running runtime's directory, then a framework install keyed
//!    by version, then a Mono style install keyed by major version.
//! 3. The directory of the referencing module.
//! 4. Every configured search directory, in order.
//! 5. The package cache: the highest version folder of every package, searched recursively.
//!
//! Results are cached twice. The identity cache remembers where (or that nothing) was found for
//! each full identity, so a repeated lookup never touches the file system. The path cache makes
//! two identities that land on the same file share one [`ModuleRc`].

use std::{
    cmp::Ordering,
    fs,
    path::{Path, PathBuf},
};

use dashmap::DashMap;
use log::{debug, trace};

use crate::{
    metadata::{
        identity::{AssemblyIdentity, AssemblyVersion, PublicKeyToken},
        module::{Module, ModuleRc},
    },
    utils::cached,
    Result,
};

/// Deepest directory level searched inside a package version folder
const MAX_PACKAGE_DEPTH: usize = 8;

/// Where and how the resolver looks for assemblies.
///
/// ```rust
/// use cilsurface::metadata::resolver::ResolverConfig;
///
/// let config = ResolverConfig::new()
///     .search_directory("/opt/app/bin")
///     .package_cache("/home/user/.nuget/packages");
/// assert_eq!(config.search_directories.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Directories probed after the referencing module's own directory
    pub search_directories: Vec<PathBuf>,
    /// Root of a package cache laid out as `<package>/<version>/...`
    pub package_cache: Option<PathBuf>,
    /// Directory of the running runtime's core library
    pub runtime_directory: Option<PathBuf>,
    /// Root holding versioned framework folders such as `v4.0.30319`
    pub framework_root: Option<PathBuf>,
    /// Root holding Mono profile folders such as `4.5`
    pub mono_root: Option<PathBuf>,
    /// Versioned Windows Runtime metadata directory
    pub winmd_platform_directory: Option<PathBuf>,
    /// System Windows Runtime metadata directory
    pub winmd_system_directory: Option<PathBuf>,
    /// File extensions accepted in the package cache, without the dot
    pub accepted_extensions: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            search_directories: Vec::new(),
            package_cache: None,
            runtime_directory: None,
            framework_root: None,
            mono_root: None,
            winmd_platform_directory: None,
            winmd_system_directory: None,
            accepted_extensions: vec!["dll".to_string(), "exe".to_string(), "winmd".to_string()],
        }
    }
}

impl ResolverConfig {
    /// An empty configuration, only the referencing module's directory is probed
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A configuration with the package cache taken from the environment.
    ///
    /// `NUGET_PACKAGES` wins over `$HOME/.nuget/packages`; either is used only if the directory
    /// exists.
    #[must_use]
    pub fn from_env() -> Self {
        let package_cache = std::env::var_os("NUGET_PACKAGES")
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var_os("HOME")
                    .map(|home| PathBuf::from(home).join(".nuget").join("packages"))
            })
            .filter(|path| path.is_dir());

        ResolverConfig {
            package_cache,
            ..Self::default()
        }
    }

    /// Append a search directory
    #[must_use]
    pub fn search_directory<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_directories.push(path.as_ref().to_path_buf());
        self
    }

    /// Set the package cache root
    #[must_use]
    pub fn package_cache<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.package_cache = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the running runtime's directory
    #[must_use]
    pub fn runtime_directory<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.runtime_directory = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the framework install root
    #[must_use]
    pub fn framework_root<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.framework_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the Mono install root
    #[must_use]
    pub fn mono_root<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.mono_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set both Windows Runtime metadata directories
    #[must_use]
    pub fn winmd_directories<P: AsRef<Path>, S: AsRef<Path>>(mut self, platform: P, system: S) -> Self {
        self.winmd_platform_directory = Some(platform.as_ref().to_path_buf());
        self.winmd_system_directory = Some(system.as_ref().to_path_buf());
        self
    }

    /// Replace the extensions accepted in the package cache
    #[must_use]
    pub fn accepted_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accepted_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }
}

/// Everything that tells two assembly references apart
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ResolutionKey {
    name: String,
    version: AssemblyVersion,
    public_key_token: Option<PublicKeyToken>,
    is_windows_runtime: bool,
    is_retargetable: bool,
}

impl ResolutionKey {
    fn of(identity: &AssemblyIdentity) -> Self {
        ResolutionKey {
            name: identity.name.to_ascii_lowercase(),
            version: identity.version,
            public_key_token: identity.public_key_token(),
            is_windows_runtime: identity.is_windows_runtime(),
            is_retargetable: identity.is_retargetable(),
        }
    }
}

/// Finds and opens referenced assemblies, once per identity and once per file.
pub struct AssemblyResolver {
    config: ResolverConfig,
    by_identity: DashMap<ResolutionKey, Option<PathBuf>>,
    by_path: DashMap<String, ModuleRc>,
}

impl AssemblyResolver {
    /// A resolver probing the locations of `config`
    #[must_use]
    pub fn new(config: ResolverConfig) -> Self {
        AssemblyResolver {
            config,
            by_identity: DashMap::new(),
            by_path: DashMap::new(),
        }
    }

    /// The configuration in use
    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Open `path` through the path cache, returning the shared instance if it was opened before
    ///
    /// # Errors
    /// Returns [`crate::Error::FileNotFound`] or [`crate::Error::BadImageFormat`] from
    /// [`Module::open`].
    pub fn load(&self, path: &Path) -> Result<ModuleRc> {
        cached(&self.by_path, path_key(path), || Module::open(path))
    }

    /// The module `identity` names, opened on first use; `None` if no probed location has it.
    ///
    /// `parent` is the referencing module; its directory is probed before the configured ones.
    ///
    /// # Errors
    /// Returns [`crate::Error::BadImageFormat`] if the located file is not a managed module.
    pub fn resolve(
        &self,
        identity: &AssemblyIdentity,
        parent: Option<&Module>,
    ) -> Result<Option<ModuleRc>> {
        let key = ResolutionKey::of(identity);
        let located = match self.by_identity.get(&key) {
            Some(located) => {
                debug!("Resolver cache hit for {}", identity.name);
                located.clone()
            }
            None => {
                let parent_directory = parent.and_then(Module::path).and_then(Path::parent);
                let located = self.locate(identity, parent_directory);
                self.by_identity.entry(key).or_insert(located).clone()
            }
        };

        match located {
            Some(path) => self.load(&path).map(Some),
            None => Ok(None),
        }
    }

    /// Where `identity` would be loaded from, without opening it
    #[must_use]
    pub fn locate(&self, identity: &AssemblyIdentity, parent_directory: Option<&Path>) -> Option<PathBuf> {
        let located = self.locate_uncached(identity, parent_directory);
        match &located {
            Some(path) => debug!("Resolved {} to {}", identity.name, path.display()),
            None => debug!("Could not locate {}", identity.display_name()),
        }
        located
    }

    fn locate_uncached(
        &self,
        identity: &AssemblyIdentity,
        parent_directory: Option<&Path>,
    ) -> Option<PathBuf> {
        let name = identity.name.as_str();

        if identity.is_windows_runtime() {
            let file_name = format!("{name}.winmd");
            return [
                &self.config.winmd_platform_directory,
                &self.config.winmd_system_directory,
            ]
            .into_iter()
            .flatten()
            .find_map(|directory| probe(&directory.join(&file_name)));
        }

        if name.eq_ignore_ascii_case("mscorlib")
            && !identity.version.is_zero()
            && identity.strong_name.is_some()
        {
            if let Some(path) = self.locate_core_library(&identity.version) {
                return Some(path);
            }
        }

        if let Some(path) = parent_directory.and_then(|directory| probe_module(directory, name)) {
            return Some(path);
        }

        if let Some(path) = self
            .config
            .search_directories
            .iter()
            .find_map(|directory| probe_module(directory, name))
        {
            return Some(path);
        }

        self.config
            .package_cache
            .as_deref()
            .and_then(|cache| self.locate_in_package_cache(cache, name))
    }

    fn locate_core_library(&self, version: &AssemblyVersion) -> Option<PathBuf> {
        if let Some(path) = self
            .config
            .runtime_directory
            .as_deref()
            .and_then(|directory| probe(&directory.join("mscorlib.dll")))
        {
            return Some(path);
        }

        if let Some(root) = &self.config.framework_root {
            let folder = match (version.major, version.minor) {
                (1, 0) => Some("v1.0.3705"),
                (1, _) => Some("v1.1.4322"),
                (2, _) => Some("v2.0.50727"),
                (4, _) => Some("v4.0.30319"),
                _ => None,
            };
            if let Some(path) = folder.and_then(|folder| probe(&root.join(folder).join("mscorlib.dll"))) {
                return Some(path);
            }
        }

        let root = self.config.mono_root.as_deref()?;
        let folders: &[&str] = match version.major {
            1 => &["1.0"],
            2 => &["2.0"],
            4 => &["4.5", "4.0"],
            _ => &[],
        };
        folders
            .iter()
            .find_map(|folder| probe(&root.join(folder).join("mscorlib.dll")))
    }

    fn locate_in_package_cache(&self, cache: &Path, name: &str) -> Option<PathBuf> {
        for package in sorted_directories(cache) {
            let Some(latest) = sorted_directories(&package)
                .into_iter()
                .max_by(|left, right| compare_version_folders(left, right))
            else {
                continue;
            };

            if let Some(path) = self.search_tree(&latest, name, 0) {
                return Some(path);
            }
        }

        None
    }

    fn search_tree(&self, directory: &Path, name: &str, depth: usize) -> Option<PathBuf> {
        if depth > MAX_PACKAGE_DEPTH {
            return None;
        }
        trace!("Probing package folder {}", directory.display());

        let mut entries: Vec<PathBuf> = fs::read_dir(directory)
            .ok()?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .collect();
        entries.sort();

        let file = entries.iter().find(|path| {
            path.is_file()
                && path
                    .file_stem()
                    .is_some_and(|stem| stem.to_string_lossy().eq_ignore_ascii_case(name))
                && path.extension().is_some_and(|extension| {
                    self.config
                        .accepted_extensions
                        .iter()
                        .any(|accepted| extension.to_string_lossy().eq_ignore_ascii_case(accepted))
                })
        });
        if let Some(file) = file {
            return Some(file.clone());
        }

        entries
            .iter()
            .filter(|path| path.is_dir())
            .find_map(|path| self.search_tree(path, name, depth + 1))
    }
}

impl std::fmt::Debug for AssemblyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssemblyResolver")
            .field("config", &self.config)
            .field("identities", &self.by_identity.len())
            .field("modules", &self.by_path.len())
            .finish()
    }
}

fn probe(path: &Path) -> Option<PathBuf> {
    trace!("Probing {}", path.display());
    path.is_file().then(|| path.to_path_buf())
}

fn probe_module(directory: &Path, name: &str) -> Option<PathBuf> {
    ["dll", "exe"]
        .iter()
        .find_map(|extension| probe(&directory.join(format!("{name}.{extension}"))))
}

fn path_key(path: &Path) -> String {
    fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .to_lowercase()
}

fn sorted_directories(directory: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(directory) else {
        return Vec::new();
    };

    let mut directories: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_dir())
        .collect();
    directories.sort();
    directories
}

/// Order package version folders: numeric components first, a release above its prereleases
fn compare_version_folders(left: &Path, right: &Path) -> Ordering {
    let left = left.file_name().map(|name| name.to_string_lossy()).unwrap_or_default();
    let right = right.file_name().map(|name| name.to_string_lossy()).unwrap_or_default();
    compare_versions(&left, &right)
}

fn compare_versions(left: &str, right: &str) -> Ordering {
    fn split(version: &str) -> (Vec<u64>, Option<&str>) {
        let (release, prerelease) = match version.split_once('-') {
            Some((release, prerelease)) => (release, Some(prerelease)),
            None => (version, None),
        };
        let numbers = release
            .split('.')
            .map(|part| part.parse::<u64>().unwrap_or(0))
            .collect();
        (numbers, prerelease)
    }

    let (left_numbers, left_pre) = split(left);
    let (right_numbers, right_pre) = split(right);

    let length = left_numbers.len().max(right_numbers.len());
    for position in 0..length {
        let left_part = left_numbers.get(position).copied().unwrap_or(0);
        let right_part = right_numbers.get(position).copied().unwrap_or(0);
        match left_part.cmp(&right_part) {
            Ordering::Equal => {}
            other => return other,
        }
    }

    match (left_pre, right_pre) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(left), Some(right)) => left.cmp(right),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        metadata::identity::{AssemblyFlags, AssemblyHashAlgorithm, Identity},
        test::ImageBuilder,
    };

    fn identity(name: &str) -> AssemblyIdentity {
        AssemblyIdentity {
            name: name.to_string(),
            version: AssemblyVersion::new(1, 0, 0, 0),
            culture: None,
            strong_name: None,
            flags: AssemblyFlags::empty(),
            hash_algorithm: AssemblyHashAlgorithm::SHA1,
        }
    }

    fn write_module(directory: &Path, file_name: &str, assembly: &str) -> PathBuf {
        fs::create_dir_all(directory).unwrap();
        let path = directory.join(file_name);
        fs::write(&path, ImageBuilder::new(assembly).build()).unwrap();
        path
    }

    #[test]
    fn version_ordering() {
        assert_eq!(compare_versions("13.0.1", "9.0.0"), Ordering::Greater);
        assert_eq!(compare_versions("2.0.0-beta", "2.0.0"), Ordering::Less);
        assert_eq!(compare_versions("1.2", "1.2.0"), Ordering::Equal);
    }

    #[test]
    fn search_order_prefers_parent_directory() {
        let root = tempfile::tempdir().unwrap();
        let parent = root.path().join("a");
        let first = root.path().join("b");
        let second = root.path().join("c");
        let cache = root.path().join("packages");

        let in_parent = write_module(&parent, "Shared.dll", "Shared");
        let in_first = write_module(&first, "Shared.dll", "Shared");
        write_module(&second, "Shared.dll", "Shared");
        write_module(&cache.join("shared").join("1.0.0").join("lib"), "Shared.dll", "Shared");

        let resolver = AssemblyResolver::new(
            ResolverConfig::new()
                .search_directory(&first)
                .search_directory(&second)
                .package_cache(&cache),
        );

        assert_eq!(resolver.locate(&identity("Shared"), Some(parent.as_path())), Some(in_parent));
        assert_eq!(resolver.locate(&identity("Shared"), None), Some(in_first));
    }

    #[test]
    fn package_cache_uses_highest_version() {
        let root = tempfile::tempdir().unwrap();
        let cache = root.path().join("packages");
        write_module(&cache.join("tools").join("9.0.0").join("lib"), "Tools.dll", "Tools");
        let newest = write_module(
            &cache.join("tools").join("13.0.1").join("lib").join("net8.0"),
            "Tools.dll",
            "Tools",
        );

        let resolver = AssemblyResolver::new(ResolverConfig::new().package_cache(&cache));
        assert_eq!(resolver.locate(&identity("Tools"), None), Some(newest));
        assert_eq!(resolver.locate(&identity("Missing"), None), None);
    }

    #[test]
    fn windows_runtime_and_core_library() {
        let root = tempfile::tempdir().unwrap();
        let system = root.path().join("system");
        let winmd = write_module(&system, "Windows.Foundation.winmd", "Windows.Foundation");
        let framework = root.path().join("framework");
        let mscorlib = write_module(&framework.join("v4.0.30319"), "mscorlib.dll", "mscorlib");

        let resolver = AssemblyResolver::new(
            ResolverConfig::new()
                .winmd_directories(root.path().join("platform"), &system)
                .framework_root(&framework),
        );

        let mut foundation = identity("Windows.Foundation");
        foundation.flags = AssemblyFlags::WINDOWS_RUNTIME;
        assert_eq!(resolver.locate(&foundation, None), Some(winmd));

        let mut core = identity("mscorlib");
        core.version = AssemblyVersion::new(4, 0, 0, 0);
        core.strong_name = Some(Identity::Token(PublicKeyToken([
            0xb7, 0x7a, 0x5c, 0x56, 0x19, 0x34, 0xe0, 0x89,
        ])));
        assert_eq!(resolver.locate(&core, None), Some(mscorlib));

        // Without a strong name the regular search applies and finds nothing
        assert_eq!(resolver.locate(&identity("mscorlib"), None), None);
    }

    #[test]
    fn modules_are_shared() {
        let root = tempfile::tempdir().unwrap();
        let directory = root.path().join("bin");
        write_module(&directory, "Shared.dll", "Shared");

        let resolver = AssemblyResolver::new(ResolverConfig::new().search_directory(&directory));
        let first = resolver.resolve(&identity("Shared"), None).unwrap().unwrap();

        let mut other_version = identity("Shared");
        other_version.version = AssemblyVersion::new(2, 0, 0, 0);
        let second = resolver.resolve(&other_version, None).unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        assert!(resolver.resolve(&identity("Missing"), None).unwrap().is_none());
    }
}
