use crate::{
    metadata::{
        tables::{read_blob, CodedIndex, CodedIndexType, RowReadable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// A row of the `CustomAttribute` table
#[derive(Clone, Debug)]
pub struct CustomAttributeRaw {
    /// Row id
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// The decorated entity
    pub parent: CodedIndex,
    /// Attribute constructor, a `MethodDef` or `MemberRef`
    pub constructor: CodedIndex,
    /// `#Blob` index of the argument blob
    pub value: u32,
}

impl RowReadable for CustomAttributeRaw {
    const TABLE_ID: TableId = TableId::CustomAttribute;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(CustomAttributeRaw {
            rid,
            token: Token::from_parts(Self::TABLE_ID as u8, rid),
            parent: CodedIndex::read(data, offset, sizes, CodedIndexType::HasCustomAttribute)?,
            constructor: CodedIndex::read(data, offset, sizes, CodedIndexType::CustomAttributeType)?,
            value: read_blob(data, offset, sizes)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::metadata::tables::{MetadataTable, TableInfo};

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let data = vec![
            0x23, 0x00, // parent, TypeDef 1
            0x0B, 0x00, // constructor, MemberRef 1
            0x05, 0x00, // value

            0x23, 0x00,
            0x09, 0x00, // tag 1 is reserved
            0x06, 0x00,
        ];

        let sizes = Arc::new(TableInfo::new_test(&[(TableId::CustomAttribute, 2)], false, false));
        let table = MetadataTable::<CustomAttributeRaw>::new(&data, 2, sizes);

        let row = table.get(1).unwrap();
        assert_eq!(row.parent.tag, TableId::TypeDef);
        assert_eq!(row.parent.row, 1);
        assert_eq!(row.constructor.tag, TableId::MemberRef);
        assert_eq!(row.constructor.row, 1);
        assert_eq!(row.value, 5);

        assert!(table.get(2).is_none());
        assert_eq!(table.iter().count(), 1);
    }
}
