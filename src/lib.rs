// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

//! # cilsurface
//!
//! Reads the ECMA-335 metadata of .NET modules and reconstructs their public type surface as a
//! lazily realized graph of types and members. The graph spans every assembly a module
//! references, as far as they can be located.
//!
//! ## Layers
//!
//! - A binary module reader maps a PE file, locates the CLI header and the metadata root, and
//!   exposes the heaps and tables of one [`Module`].
//! - An [`AssemblyResolver`] turns assembly references into files: the referencing module's
//!   directory, configured search directories, the package cache, framework and Mono
//!   directories for the core library, and the Windows metadata directories for `.winmd`
//!   references. Every module is loaded once.
//! - A [`Repository`] owns the main module and everything loaded for it, resolves type
//!   references across modules and follows type forwarders.
//! - Type and member wrappers ([`TypeDefinition`], [`MethodDefinition`], ...) are created on
//!   demand and memoized per module. Signatures, constants and attribute blobs decode into
//!   [`TypeWrapper`]s, [`ConstantValue`]s and attribute values, and nullable reference type
//!   annotations into [`NullabilityInfo`] trees.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cilsurface::prelude::*;
//!
//! let repository = Repository::open("Library.dll", &[])?;
//!
//! for definition in repository.main_module().public_types()? {
//!     println!("{} {}", definition.kind()?.keyword(), definition.full_name());
//!     for member in definition.members(MemberFilter::PublicSurface)? {
//!         println!("    {:?} {}", member.kind()?, member.name());
//!     }
//! }
//!
//! for warning in repository.warnings() {
//!     eprintln!("{warning}");
//! }
//! # Ok::<(), cilsurface::Error>(())
//! ```
//!
//! ## Configuration
//!
//! ```rust,no_run
//! use cilsurface::{RepositoryBuilder, ResolverConfig};
//!
//! let config = ResolverConfig::from_env()
//!     .search_directory("lib/")
//!     .framework_root("/usr/lib/dotnet-framework");
//!
//! let repository = RepositoryBuilder::new()
//!     .main_module("bin/App.dll")
//!     .resolver_config(config)
//!     .build()?;
//!
//! let list = repository.get_type_by_name("System.Collections.Generic.List`1")?;
//! println!("{:?}", list.map(|list| list.full_name()));
//! # Ok::<(), cilsurface::Error>(())
//! ```
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade and never installs a logger. Unresolved assembly
//! references are reported at `warn` level and kept in [`Repository::warnings`].

#[macro_use]
pub(crate) mod error;
pub(crate) mod file;
mod utils;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// ```rust,no_run
/// use cilsurface::prelude::*;
///
/// let repository = Repository::open("Library.dll", &[])?;
/// let root: &Namespace = repository.root_namespace()?;
/// println!("{} public types", root.type_count());
/// # Ok::<(), cilsurface::Error>(())
/// ```
pub mod prelude;

/// Metadata decoding, the type graph and assembly resolution
pub mod metadata;

/// `cilsurface` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

pub use error::Error;
pub use file::{parser::Parser, File};
pub use metadata::{
    constants::ConstantValue,
    customattributes::{CustomAttribute, Nullability, NullabilityInfo},
    identity::AssemblyIdentity,
    members::{EventDefinition, FieldDefinition, MethodDefinition, ParameterDefinition, PropertyDefinition},
    module::{Module, ModuleRc},
    namespace::Namespace,
    repository::{Repository, RepositoryBuilder},
    resolver::{AssemblyResolver, ResolverConfig},
    typesystem::{TypeDefinition, TypeReference, TypeWrapper},
};
