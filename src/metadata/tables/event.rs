use crate::{
    file::io::read_le_at,
    metadata::{
        tables::{read_index, read_str, CodedIndex, CodedIndexType, RowReadable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// A row of the `EventMap` table, linking a type to its first event
#[derive(Clone, Debug)]
pub struct EventMapRaw {
    /// Row id
    pub rid: u32,
    /// Owning `TypeDef` row
    pub parent: u32,
    /// First `Event` row owned by `parent`
    pub event_list: u32,
}

impl RowReadable for EventMapRaw {
    const TABLE_ID: TableId = TableId::EventMap;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(EventMapRaw {
            rid,
            parent: read_index(data, offset, sizes, TableId::TypeDef)?,
            event_list: read_index(data, offset, sizes, TableId::Event)?,
        })
    }
}

/// A row of the `Event` table
#[derive(Clone, Debug)]
pub struct EventRaw {
    /// Row id
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// `EventAttributes`
    pub flags: u16,
    /// `#Strings` index of the name
    pub name: u32,
    /// Delegate type of the event
    pub event_type: CodedIndex,
}

impl RowReadable for EventRaw {
    const TABLE_ID: TableId = TableId::Event;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(EventRaw {
            rid,
            token: Token::from_parts(Self::TABLE_ID as u8, rid),
            flags: read_le_at::<u16>(data, offset)?,
            name: read_str(data, offset, sizes)?,
            event_type: CodedIndex::read(data, offset, sizes, CodedIndexType::TypeDefOrRef)?,
        })
    }
}
