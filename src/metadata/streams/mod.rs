//! The streams of the metadata root.
//!
//! Heaps borrow the image bytes and decode entries on request. Entries are addressed by the byte
//! offset (or, for `#GUID`, the 1-based index) stored in table columns.

mod blob;
mod guid;
mod streamheader;
mod strings;
mod tablesheader;
mod userstrings;

pub use blob::Blob;
pub use guid::Guid;
pub use streamheader::StreamHeader;
pub use strings::Strings;
pub use tablesheader::TablesHeader;
pub use userstrings::UserStrings;
