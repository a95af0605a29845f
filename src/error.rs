use std::path::PathBuf;

use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! invalid_operation {
    ($fmt:expr $(, $arg:expr)* $(,)?) => {
        crate::Error::InvalidOperation(format!($fmt $(, $arg)*))
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// The variants fall into four groups, which callers are expected to treat differently:
///
/// - Opening a module: [`Error::FileNotFound`] and [`Error::BadImageFormat`] are fatal for that
///   one module only, and are kept apart so a caller can decide whether to skip or abort.
/// - Decoding metadata: [`Error::Malformed`] and [`Error::OutOfBounds`] describe a structural
///   violation inside a heap, table, signature or attribute blob. They are recoverable, a consumer
///   may drop the offending attribute or constant and continue.
/// - Decoder invariants: [`Error::InvalidOperation`] signals a metadata shape the decoder does
///   not support, or a bug. It should not be swallowed.
/// - Lookups: [`Error::UnresolvedType`] is only produced when a caller explicitly demands a type
///   that cannot be located. Unresolved references encountered while walking the graph degrade to
///   placeholders instead.
///
/// # Examples
///
/// ```rust,no_run
/// use cilsurface::{Error, Repository};
///
/// match Repository::open("library.dll", &[]) {
///     Ok(repository) => println!("{} types", repository.main_module().public_types()?.len()),
///     Err(Error::FileNotFound(path)) => eprintln!("missing: {}", path.display()),
///     Err(Error::BadImageFormat(reason)) => eprintln!("not a managed module: {reason}"),
///     Err(e) => return Err(e),
/// }
/// # Ok::<(), Error>(())
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The requested module file does not exist.
    #[error("File not found - {}", .0.display())]
    FileNotFound(PathBuf),

    /// The image is not a PE file, carries no CLI header, or its metadata root can not be read.
    #[error("Bad image format - {0}")]
    BadImageFormat(String),

    /// The file is damaged and could not be parsed.
    ///
    /// The error includes the source location where the malformation was detected.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the file.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// A decoder invariant was violated.
    ///
    /// Raised for shapes the object model can not represent (a primitive code without a known
    /// type, a delegate without an `Invoke` method) and for use of a module after release.
    #[error("Invalid operation - {0}")]
    InvalidOperation(String),

    /// A type was explicitly requested but no loaded module defines it.
    #[error("Unresolved type - {0}")]
    UnresolvedType(String),

    /// Reached the maximum recursion level allowed.
    ///
    /// Guards nested signature decoding and type forwarder chains.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Error from the goblin crate during PE parsing.
    #[error("{0}")]
    GoblinErr(#[from] goblin::error::Error),
}

impl Error {
    /// Returns `true` for errors caused by malformed metadata content, which a consumer may skip.
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        matches!(self, Error::Malformed { .. } | Error::OutOfBounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_macro_captures_location() {
        let error = malformed_error!("bad blob at {}", 12);
        match error {
            Error::Malformed {
                message,
                file,
                line,
            } => {
                assert_eq!(message, "bad blob at 12");
                assert!(file.ends_with("error.rs"));
                assert!(line > 0);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn categories() {
        assert!(Error::OutOfBounds.is_malformed());
        assert!(malformed_error!("x").is_malformed());
        assert!(!invalid_operation!("delegate {} has no Invoke", "D").is_malformed());
        assert!(!Error::FileNotFound(PathBuf::from("a.dll")).is_malformed());
    }
}
