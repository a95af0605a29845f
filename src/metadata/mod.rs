//! ECMA-335 metadata decoding and the type graph built on top of it.
//!
//! The layers, from bytes to types:
//!
//! - [`cor20header`], [`root`] and [`streams`] locate the metadata inside a PE image and expose
//!   its heaps and the table stream.
//! - [`tables`] reads typed rows and computes index widths, [`token`] names rows.
//! - [`signatures`], [`constants`] and [`customattributes`] decode blobs.
//! - [`module`] ties one file's metadata together and memoizes the wrappers of [`typesystem`] and
//!   [`members`].
//! - [`resolver`] and [`repository`] load the modules a main module depends on and resolve type
//!   references across them.
//!
//! # Examples
//!
//! ```rust,no_run
//! use cilsurface::Repository;
//!
//! let repository = Repository::open("library.dll", &[])?;
//! let root = repository.root_namespace()?;
//! for namespace in root.namespaces() {
//!     println!("{}: {} types", namespace.full_name(), namespace.type_count());
//! }
//! # Ok::<(), cilsurface::Error>(())
//! ```

pub mod constants;
pub mod cor20header;
pub mod customattributes;
pub mod identity;
pub mod knowntypes;
pub mod members;
pub mod module;
pub mod namespace;
pub mod repository;
pub mod resolver;
pub mod root;
pub mod signatures;
pub mod streams;
pub mod tables;
pub mod token;
pub mod typesystem;
