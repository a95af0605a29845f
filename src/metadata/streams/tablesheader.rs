use std::sync::Arc;

use strum::{EnumCount, IntoEnumIterator};

use crate::{
    file::parser::Parser,
    metadata::tables::{MetadataTable, RowReadable, TableId, TableInfo, TableInfoRef},
    Error::OutOfBounds,
    Result,
};

/// The `#~` (or uncompressed `#-`) tables stream.
///
/// Parsing the header locates every table of known layout; rows are decoded on demand through
/// [`TablesHeader::table`].
pub struct TablesHeader<'a> {
    /// Major schema version
    pub major_version: u8,
    /// Minor schema version
    pub minor_version: u8,
    /// Bit vector of present tables
    pub valid: u64,
    /// Bit vector of sorted tables
    pub sorted: u64,
    /// Bit vector of present tables whose layout is unknown and whose rows are ignored
    pub unknown: u64,
    info: TableInfoRef,
    tables: Vec<&'a [u8]>,
}

impl<'a> TablesHeader<'a> {
    /// Parse the stream header and locate each table
    ///
    /// # Errors
    /// Returns an error if the header is truncated or the declared tables exceed the stream.
    pub fn from(data: &'a [u8]) -> Result<TablesHeader<'a>> {
        let mut parser = Parser::new(data);

        let _reserved = parser.read_le::<u32>()?;
        let major_version = parser.read_le::<u8>()?;
        let minor_version = parser.read_le::<u8>()?;
        let heap_size_flags = parser.read_le::<u8>()?;
        let _reserved = parser.read_le::<u8>()?;
        let valid = parser.read_le::<u64>()?;
        let sorted = parser.read_le::<u64>()?;

        let mut row_counts = [0u32; TableId::COUNT];
        let mut unknown_tables = 0_u64;
        for table_number in 0..64_u8 {
            if valid & (1 << table_number) == 0 {
                continue;
            }

            let rows = parser.read_le::<u32>()?;
            match TableId::from_u8(table_number) {
                Some(table_id) => row_counts[table_id as usize] = rows,
                None if rows > 0 => unknown_tables |= 1 << table_number,
                None => {}
            }
        }

        // Every id past 0x2C has an unknown layout; its rows trail the known tables and are skipped
        if unknown_tables != 0 {
            log::warn!(
                "Tables stream carries tables of unknown layout - {:#x}",
                unknown_tables
            );
        }

        // Extra data present in some uncompressed streams
        if heap_size_flags & 0x40 != 0 {
            parser.advance_by(4)?;
        }

        let info = Arc::new(TableInfo::new(&row_counts, heap_size_flags));

        let mut tables = vec![&data[0..0]; TableId::COUNT];
        let mut offset = parser.pos();
        for table_id in TableId::iter() {
            let rows = row_counts[table_id as usize];
            if rows == 0 {
                continue;
            }

            let size = (rows as usize)
                .checked_mul(info.row_size(table_id) as usize)
                .ok_or(OutOfBounds)?;
            let end = offset.checked_add(size).ok_or(OutOfBounds)?;
            if end > data.len() {
                return Err(OutOfBounds);
            }

            tables[table_id as usize] = &data[offset..end];
            offset = end;
        }

        Ok(TablesHeader {
            major_version,
            minor_version,
            valid,
            sorted,
            unknown: unknown_tables,
            info,
            tables,
        })
    }

    /// Shared sizing information
    #[must_use]
    pub fn info(&self) -> &TableInfoRef {
        &self.info
    }

    /// Number of rows in `table`
    #[must_use]
    pub fn row_count(&self, table: TableId) -> u32 {
        self.info.rows(table)
    }

    /// Typed view over a table; empty if the image does not carry it
    #[must_use]
    pub fn table<T: RowReadable>(&self) -> MetadataTable<'a, T> {
        MetadataTable::new(
            self.tables[T::TABLE_ID as usize],
            self.info.rows(T::TABLE_ID),
            self.info.clone(),
        )
    }
}
