use std::collections::HashMap;

use crate::metadata::{
    tables::{MethodSemanticsAttributes, MethodSemanticsRaw},
    token::Token,
};

/// Accessor method to owning property or event, built once per module.
///
/// Entries are sorted by the accessor's `MethodDef` row so a method is looked up by binary
/// search. The reverse direction, owner to accessors, is kept in table order.
#[derive(Default)]
pub struct MethodSemanticsLookup {
    by_method: Vec<(u32, Token, MethodSemanticsAttributes)>,
    by_association: HashMap<Token, Vec<(MethodSemanticsAttributes, u32)>>,
}

impl MethodSemanticsLookup {
    /// Build from the rows of the `MethodSemantics` table
    pub fn new<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = MethodSemanticsRaw>,
    {
        let mut by_method = Vec::new();
        let mut by_association: HashMap<Token, Vec<(MethodSemanticsAttributes, u32)>> =
            HashMap::new();

        for row in rows {
            let semantics = MethodSemanticsAttributes::from_bits_truncate(row.semantics);
            // `.other` methods stay ordinary members
            if semantics.intersects(!MethodSemanticsAttributes::OTHER) {
                by_method.push((row.method, row.association.token, semantics));
            }
            by_association
                .entry(row.association.token)
                .or_default()
                .push((semantics, row.method));
        }

        by_method.sort_by_key(|(method, _, _)| *method);

        MethodSemanticsLookup {
            by_method,
            by_association,
        }
    }

    /// Owner and role of the accessor `method_rid`, `None` for ordinary methods
    #[must_use]
    pub fn lookup(&self, method_rid: u32) -> Option<(Token, MethodSemanticsAttributes)> {
        self.by_method
            .binary_search_by_key(&method_rid, |(method, _, _)| *method)
            .ok()
            .map(|index| {
                let (_, association, semantics) = self.by_method[index];
                (association, semantics)
            })
    }

    /// Accessors of the property or event `association`
    #[must_use]
    pub fn accessors(&self, association: Token) -> &[(MethodSemanticsAttributes, u32)] {
        self.by_association
            .get(&association)
            .map_or(&[], Vec::as_slice)
    }

    /// The first accessor of `association` with role `semantics`
    #[must_use]
    pub fn accessor(&self, association: Token, semantics: MethodSemanticsAttributes) -> Option<u32> {
        self.accessors(association)
            .iter()
            .find(|(role, _)| role.contains(semantics))
            .map(|(_, method)| *method)
    }

    /// Number of accessor entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_method.len()
    }

    /// True if the module has no properties or events with accessors
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_method.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tables::{CodedIndex, TableId};

    fn row(method: u32, semantics: MethodSemanticsAttributes, table: TableId, owner: u32) -> MethodSemanticsRaw {
        MethodSemanticsRaw {
            rid: 1,
            token: Token::from_parts(TableId::MethodSemantics as u8, 1),
            semantics: semantics.bits(),
            method,
            association: CodedIndex::new(table, owner),
        }
    }

    #[test]
    fn lookup_by_method() {
        let lookup = MethodSemanticsLookup::new(vec![
            row(9, MethodSemanticsAttributes::SETTER, TableId::Property, 1),
            row(3, MethodSemanticsAttributes::GETTER, TableId::Property, 1),
            row(5, MethodSemanticsAttributes::ADD_ON, TableId::Event, 1),
            row(6, MethodSemanticsAttributes::REMOVE_ON, TableId::Event, 1),
        ]);

        assert_eq!(lookup.len(), 4);
        let property = Token::from_parts(TableId::Property as u8, 1);
        let event = Token::from_parts(TableId::Event as u8, 1);

        assert_eq!(
            lookup.lookup(3),
            Some((property, MethodSemanticsAttributes::GETTER))
        );
        assert_eq!(
            lookup.lookup(6),
            Some((event, MethodSemanticsAttributes::REMOVE_ON))
        );
        assert_eq!(lookup.lookup(4), None);

        assert_eq!(
            lookup.accessor(property, MethodSemanticsAttributes::SETTER),
            Some(9)
        );
        assert_eq!(lookup.accessor(event, MethodSemanticsAttributes::FIRE), None);
        assert_eq!(lookup.accessors(event).len(), 2);
    }

    #[test]
    fn other_methods_are_not_accessors() {
        let lookup = MethodSemanticsLookup::new(vec![
            row(7, MethodSemanticsAttributes::OTHER, TableId::Property, 1),
            row(8, MethodSemanticsAttributes::GETTER, TableId::Property, 1),
        ]);

        let property = Token::from_parts(TableId::Property as u8, 1);
        assert_eq!(lookup.lookup(7), None);
        assert_eq!(
            lookup.lookup(8),
            Some((property, MethodSemanticsAttributes::GETTER))
        );
        assert_eq!(lookup.len(), 1);
        assert_eq!(
            lookup.accessor(property, MethodSemanticsAttributes::OTHER),
            Some(7)
        );
    }
}
