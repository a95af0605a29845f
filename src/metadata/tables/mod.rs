//! Typed access to the rows of the metadata tables.
//!
//! Each table the engine consumes has a `*Raw` row type implementing [`RowReadable`]. Rows hold
//! heap offsets and indexes exactly as stored; resolving them into strings, blobs or other rows is
//! left to the layers above. [`MetadataTable`] decodes rows on demand from the table's byte range,
//! so nothing is copied until a row is actually requested.
//!
//! The pointer tables (`FieldPtr`, `MethodPtr`, ...) of unoptimized images are sized so the
//! tables after them can be located, but they are not followed.

mod assembly;
mod codedindex;
mod constant;
mod customattribute;
mod event;
mod exportedtype;
mod field;
mod genericparam;
mod interfaceimpl;
mod memberref;
mod methoddef;
mod methodimpl;
mod methodsemantics;
mod module;
mod nestedclass;
mod param;
mod property;
mod tableid;
mod tableinfo;
mod typedef;
mod typeref;
mod typespec;

use std::marker::PhantomData;

pub use assembly::{AssemblyRaw, AssemblyRefRaw};
pub use codedindex::{CodedIndex, CodedIndexType};
pub use constant::ConstantRaw;
pub use customattribute::CustomAttributeRaw;
pub use event::{EventMapRaw, EventRaw};
pub use exportedtype::ExportedTypeRaw;
pub use field::{FieldAttributes, FieldRaw};
pub use genericparam::{GenericParamAttributes, GenericParamConstraintRaw, GenericParamRaw};
pub use interfaceimpl::InterfaceImplRaw;
pub use memberref::MemberRefRaw;
pub use methoddef::{MethodAttributes, MethodDefRaw};
pub use methodimpl::MethodImplRaw;
pub use methodsemantics::{MethodSemanticsAttributes, MethodSemanticsRaw};
pub use module::{ModuleRaw, ModuleRefRaw};
pub use nestedclass::NestedClassRaw;
pub use param::{ParamAttributes, ParamRaw};
pub use property::{PropertyMapRaw, PropertyRaw};
pub use tableid::{Column, TableId};
pub use tableinfo::{TableInfo, TableInfoRef, TableRowInfo};
pub use typedef::{TypeAttributes, TypeDefRaw};
pub use typeref::TypeRefRaw;
pub use typespec::TypeSpecRaw;

use crate::{file::io::read_le_at_dyn, Result};

/// A row type that can be decoded from its table's bytes.
pub trait RowReadable: Sized + Send {
    /// The table holding rows of this type
    const TABLE_ID: TableId;

    /// Decode the row `rid` starting at `offset`, advancing `offset` past it
    ///
    /// # Errors
    /// Returns an error for truncated data or an invalid coded index.
    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self>;
}

/// A lazily decoded view over the rows of one table.
pub struct MetadataTable<'a, T> {
    data: &'a [u8],
    row_count: u32,
    row_size: u32,
    sizes: TableInfoRef,
    _phantom: PhantomData<T>,
}

impl<'a, T: RowReadable> MetadataTable<'a, T> {
    /// Create a view over `data`, which holds exactly `row_count` rows
    #[must_use]
    pub fn new(data: &'a [u8], row_count: u32, sizes: TableInfoRef) -> Self {
        MetadataTable {
            data,
            row_count,
            row_size: sizes.row_size(T::TABLE_ID),
            sizes,
            _phantom: PhantomData,
        }
    }

    /// Number of rows
    #[must_use]
    pub fn row_count(&self) -> u32 {
        self.row_count
    }

    /// Width of one row
    #[must_use]
    pub fn row_size(&self) -> u32 {
        self.row_size
    }

    /// True for an absent or empty table
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    /// Decode row `rid` (1-based)
    #[must_use]
    pub fn get(&self, rid: u32) -> Option<T> {
        if rid == 0 || rid > self.row_count {
            return None;
        }

        T::row_read(
            self.data,
            &mut ((rid as usize - 1) * self.row_size as usize),
            rid,
            &self.sizes,
        )
        .ok()
    }

    /// Iterate over all rows in table order
    #[must_use]
    pub fn iter(&self) -> TableIterator<'_, 'a, T> {
        TableIterator {
            table: self,
            current_row: 0,
            current_offset: 0,
        }
    }
}

impl<'t, 'a, T: RowReadable> IntoIterator for &'t MetadataTable<'a, T> {
    type Item = T;
    type IntoIter = TableIterator<'t, 'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the rows of a [`MetadataTable`]
pub struct TableIterator<'t, 'a, T> {
    table: &'t MetadataTable<'a, T>,
    current_row: u32,
    current_offset: usize,
}

impl<T: RowReadable> Iterator for TableIterator<'_, '_, T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_row >= self.table.row_count {
            return None;
        }

        match T::row_read(
            self.table.data,
            &mut self.current_offset,
            self.current_row + 1,
            &self.table.sizes,
        ) {
            Ok(row) => {
                self.current_row += 1;
                Some(row)
            }
            Err(error) => {
                log::warn!(
                    "Stopping at malformed {:?} row {} - {error}",
                    T::TABLE_ID,
                    self.current_row + 1
                );
                None
            }
        }
    }
}

/// Read a `#Strings` index column
pub(crate) fn read_str(data: &[u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<u32> {
    read_le_at_dyn(data, offset, sizes.is_large_str())
}

/// Read a `#GUID` index column
pub(crate) fn read_guid(data: &[u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<u32> {
    read_le_at_dyn(data, offset, sizes.is_large_guid())
}

/// Read a `#Blob` index column
pub(crate) fn read_blob(data: &[u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<u32> {
    read_le_at_dyn(data, offset, sizes.is_large_blob())
}

/// Read a simple index into `table`
pub(crate) fn read_index(
    data: &[u8],
    offset: &mut usize,
    sizes: &TableInfoRef,
    table: TableId,
) -> Result<u32> {
    read_le_at_dyn(data, offset, sizes.is_large(table))
}
