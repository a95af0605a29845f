//! Fields, methods, parameters, properties and events of a type definition.
//!
//! Member wrappers are created together with their declaring type's member list and hold a weak
//! link back to it. Signatures, constants and attributes are decoded on first access and
//! memoized in the wrapper.
//!
//! # Ordering
//!
//! [`MemberKind`] derives `Ord` in the precedence a declaration listing uses: fields, events,
//! properties, indexers, methods, operators, constructors, destructors. [`Member::sort_key`] adds
//! the name as a tie breaker. Enumerations themselves keep table order.

mod event;
mod field;
mod method;
mod modifiers;
mod param;
mod property;

pub use event::{EventDefinition, EventRc};
pub use field::{FieldDefinition, FieldRc};
pub use method::{MethodDefinition, MethodRc};
pub use modifiers::Modifiers;
pub use param::{ParamRc, ParameterDefinition, RefKind};
pub use property::{PropertyDefinition, PropertyRc};

use crate::{metadata::typesystem::Accessibility, Result};

/// Kind of a member, ordered by listing precedence
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemberKind {
    /// Field or enum value
    Field,
    /// Event
    Event,
    /// Property without parameters
    Property,
    /// Property with parameters
    Indexer,
    /// Ordinary method
    Method,
    /// `op_*` special name method
    Operator,
    /// Instance or static constructor
    Constructor,
    /// `Finalize` override
    Destructor,
}

/// Which members an enumeration yields
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum MemberFilter {
    /// Every member regardless of accessibility
    #[default]
    All,
    /// Public and protected members only
    PublicSurface,
}

impl MemberFilter {
    /// True if a member with `accessibility` passes the filter
    #[must_use]
    pub fn admits(self, accessibility: Accessibility) -> bool {
        match self {
            MemberFilter::All => true,
            MemberFilter::PublicSurface => accessibility.is_public_surface(),
        }
    }
}

/// One member of a type definition
#[derive(Clone, Debug)]
pub enum Member {
    /// A field
    Field(FieldRc),
    /// An event
    Event(EventRc),
    /// A property or indexer
    Property(PropertyRc),
    /// A method, operator, constructor or destructor
    Method(MethodRc),
}

impl Member {
    /// Declared name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Member::Field(field) => field.name(),
            Member::Event(event) => event.name(),
            Member::Property(property) => property.name(),
            Member::Method(method) => method.name(),
        }
    }

    /// Listing kind
    ///
    /// # Errors
    /// Returns an error if an indexer check needs a signature that cannot be decoded.
    pub fn kind(&self) -> Result<MemberKind> {
        match self {
            Member::Field(_) => Ok(MemberKind::Field),
            Member::Event(_) => Ok(MemberKind::Event),
            Member::Property(property) => property.kind(),
            Member::Method(method) => Ok(method.kind()),
        }
    }

    /// Accessibility; for properties and events the widest of their accessors
    ///
    /// # Errors
    /// Returns an error if accessors cannot be realized.
    pub fn accessibility(&self) -> Result<Accessibility> {
        match self {
            Member::Field(field) => Ok(field.accessibility()),
            Member::Event(event) => event.accessibility(),
            Member::Property(property) => property.accessibility(),
            Member::Method(method) => Ok(method.accessibility()),
        }
    }

    /// Source modifiers
    ///
    /// # Errors
    /// Returns an error if flags, accessors or attributes cannot be realized.
    pub fn modifiers(&self) -> Result<Modifiers> {
        match self {
            Member::Field(field) => field.modifiers(),
            Member::Event(event) => event.modifiers(),
            Member::Property(property) => property.modifiers(),
            Member::Method(method) => method.modifiers(),
        }
    }

    /// Stable listing key: kind, then name
    ///
    /// # Errors
    /// Returns an error if the kind cannot be determined.
    pub fn sort_key(&self) -> Result<(MemberKind, String)> {
        Ok((self.kind()?, self.name().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_precedence() {
        let mut kinds = vec![
            MemberKind::Destructor,
            MemberKind::Method,
            MemberKind::Field,
            MemberKind::Indexer,
            MemberKind::Constructor,
            MemberKind::Event,
            MemberKind::Operator,
            MemberKind::Property,
        ];
        kinds.sort();
        assert_eq!(
            kinds,
            [
                MemberKind::Field,
                MemberKind::Event,
                MemberKind::Property,
                MemberKind::Indexer,
                MemberKind::Method,
                MemberKind::Operator,
                MemberKind::Constructor,
                MemberKind::Destructor,
            ]
        );
    }

    #[test]
    fn public_surface_filter() {
        let admitted: Vec<_> = Accessibility::ALL
            .into_iter()
            .filter(|accessibility| MemberFilter::PublicSurface.admits(*accessibility))
            .collect();
        assert_eq!(
            admitted,
            [
                Accessibility::Protected,
                Accessibility::ProtectedInternal,
                Accessibility::Public
            ]
        );
        assert!(Accessibility::ALL
            .into_iter()
            .all(|accessibility| MemberFilter::All.admits(accessibility)));
    }
}
