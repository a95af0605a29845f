use std::sync::Arc;

use strum::{EnumCount, IntoEnumIterator};

use crate::metadata::tables::{CodedIndexType, Column, TableId};

/// Row count of a table and the width of indexes into it.
#[derive(Clone, Copy, Default, PartialEq, Debug)]
pub struct TableRowInfo {
    /// Number of rows
    pub rows: u32,
    /// Bits needed to address every row
    pub bits: u8,
    /// Simple indexes into this table use 4 bytes
    pub is_large: bool,
}

impl TableRowInfo {
    /// Derive index widths from a row count
    #[must_use]
    pub fn new(rows: u32) -> Self {
        let bits = if rows == 0 {
            1
        } else {
            (32 - rows.leading_zeros()) as u8
        };

        Self {
            rows,
            bits,
            is_large: rows > u32::from(u16::MAX),
        }
    }
}

/// Sizing information for every table and heap index of one tables stream.
#[derive(Clone, Default)]
pub struct TableInfo {
    rows: Vec<TableRowInfo>,
    coded_indexes: Vec<u8>,
    is_large_index_str: bool,
    is_large_index_guid: bool,
    is_large_index_blob: bool,
}

/// Shared [`TableInfo`]
pub type TableInfoRef = Arc<TableInfo>;

impl TableInfo {
    /// Build from row counts indexed by table number and the heap size flags byte
    #[must_use]
    pub fn new(row_counts: &[u32; TableId::COUNT], heap_size_flags: u8) -> Self {
        let mut table_info = TableInfo {
            rows: row_counts.iter().map(|rows| TableRowInfo::new(*rows)).collect(),
            coded_indexes: vec![0; CodedIndexType::COUNT],
            is_large_index_str: heap_size_flags & 0x01 != 0,
            is_large_index_guid: heap_size_flags & 0x02 != 0,
            is_large_index_blob: heap_size_flags & 0x04 != 0,
        };

        table_info.calculate_coded_index_bits();
        table_info
    }

    /// Build from a sparse list of row counts, for crafted table tests
    #[cfg(test)]
    pub fn new_test(valid_tables: &[(TableId, u32)], large_str: bool, large_blob: bool) -> Self {
        let mut row_counts = [0u32; TableId::COUNT];
        for (table, rows) in valid_tables {
            row_counts[*table as usize] = *rows;
        }

        let mut flags = 0;
        if large_str {
            flags |= 0x01;
        }
        if large_blob {
            flags |= 0x04;
        }

        TableInfo::new(&row_counts, flags)
    }

    /// Row information of `table`
    #[must_use]
    pub fn get(&self, table: TableId) -> &TableRowInfo {
        &self.rows[table as usize]
    }

    /// Row count of `table`
    #[must_use]
    pub fn rows(&self, table: TableId) -> u32 {
        self.rows[table as usize].rows
    }

    /// True if simple indexes into `table` are 4 bytes
    #[must_use]
    pub fn is_large(&self, table: TableId) -> bool {
        self.rows[table as usize].is_large
    }

    /// True if `#Strings` indexes are 4 bytes
    #[must_use]
    pub fn is_large_str(&self) -> bool {
        self.is_large_index_str
    }

    /// True if `#GUID` indexes are 4 bytes
    #[must_use]
    pub fn is_large_guid(&self) -> bool {
        self.is_large_index_guid
    }

    /// True if `#Blob` indexes are 4 bytes
    #[must_use]
    pub fn is_large_blob(&self) -> bool {
        self.is_large_index_blob
    }

    /// Width of a `#Strings` index
    #[must_use]
    pub fn str_bytes(&self) -> u8 {
        if self.is_large_index_str {
            4
        } else {
            2
        }
    }

    /// Width of a `#GUID` index
    #[must_use]
    pub fn guid_bytes(&self) -> u8 {
        if self.is_large_index_guid {
            4
        } else {
            2
        }
    }

    /// Width of a `#Blob` index
    #[must_use]
    pub fn blob_bytes(&self) -> u8 {
        if self.is_large_index_blob {
            4
        } else {
            2
        }
    }

    /// Width of a simple index into `table`
    #[must_use]
    pub fn table_index_bytes(&self, table: TableId) -> u8 {
        if self.is_large(table) {
            4
        } else {
            2
        }
    }

    /// Width of a coded index of kind `coded_index_type`
    #[must_use]
    pub fn coded_index_bytes(&self, coded_index_type: CodedIndexType) -> u8 {
        if self.coded_indexes[coded_index_type as usize] > 16 {
            4
        } else {
            2
        }
    }

    /// Width of one row of `table`
    #[must_use]
    pub fn row_size(&self, table: TableId) -> u32 {
        table
            .columns()
            .iter()
            .map(|column| {
                u32::from(match column {
                    Column::U16 => 2,
                    Column::U32 => 4,
                    Column::Str => self.str_bytes(),
                    Column::Guid => self.guid_bytes(),
                    Column::Blob => self.blob_bytes(),
                    Column::Table(target) => self.table_index_bytes(*target),
                    Column::Coded(kind) => self.coded_index_bytes(*kind),
                })
            })
            .sum()
    }

    fn calculate_coded_index_bits(&mut self) {
        for coded_index in CodedIndexType::iter() {
            let max_bits = coded_index
                .tags()
                .iter()
                .flatten()
                .map(|table| self.rows[*table as usize].bits)
                .max()
                .unwrap_or(1);

            self.coded_indexes[coded_index as usize] = max_bits + coded_index.tag_bits();
        }
    }
}
