use bitflags::bitflags;

use crate::{
    file::io::read_le_at,
    metadata::{
        tables::{read_index, CodedIndex, CodedIndexType, RowReadable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

bitflags! {
    /// Role of an accessor method, ECMA-335 II.23.1.12
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct MethodSemanticsAttributes: u16 {
        /// Property setter
        const SETTER = 0x0001;
        /// Property getter
        const GETTER = 0x0002;
        /// Other accessor of a property or event
        const OTHER = 0x0004;
        /// Event `add`
        const ADD_ON = 0x0008;
        /// Event `remove`
        const REMOVE_ON = 0x0010;
        /// Event `raise`
        const FIRE = 0x0020;
    }
}

/// A row of the `MethodSemantics` table, tying an accessor method to its property or event
#[derive(Clone, Debug)]
pub struct MethodSemanticsRaw {
    /// Row id
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// `MethodSemanticsAttributes`
    pub semantics: u16,
    /// The accessor `MethodDef` row
    pub method: u32,
    /// The owning property or event
    pub association: CodedIndex,
}

impl RowReadable for MethodSemanticsRaw {
    const TABLE_ID: TableId = TableId::MethodSemantics;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(MethodSemanticsRaw {
            rid,
            token: Token::from_parts(Self::TABLE_ID as u8, rid),
            semantics: read_le_at::<u16>(data, offset)?,
            method: read_index(data, offset, sizes, TableId::MethodDef)?,
            association: CodedIndex::read(data, offset, sizes, CodedIndexType::HasSemantics)?,
        })
    }
}
