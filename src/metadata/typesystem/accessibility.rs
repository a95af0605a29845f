use std::fmt;

use crate::metadata::tables::{FieldAttributes, MethodAttributes, TypeAttributes};

/// Who may access a type or member.
///
/// The seven values of the member access field (ECMA-335 II.23.1.10). Type visibility maps onto
/// the same scale; a nested type's effective accessibility is the intersection with its
/// declaring type's.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Accessibility {
    /// Not referenceable, only the compiler may use it
    CompilerControlled,
    /// `private`
    Private,
    /// `private protected`
    PrivateProtected,
    /// `internal`
    Internal,
    /// `protected`
    Protected,
    /// `protected internal`
    ProtectedInternal,
    /// `public`
    Public,
}

// Audiences an accessibility reaches, besides the declaring type itself
const SAME_ASSEMBLY: u8 = 0x1;
const DERIVED_SAME_ASSEMBLY: u8 = 0x2;
const DERIVED_OTHER_ASSEMBLY: u8 = 0x4;
const OTHER_ASSEMBLY: u8 = 0x8;

impl Accessibility {
    /// All values, least to most accessible
    pub const ALL: [Accessibility; 7] = [
        Accessibility::CompilerControlled,
        Accessibility::Private,
        Accessibility::PrivateProtected,
        Accessibility::Internal,
        Accessibility::Protected,
        Accessibility::ProtectedInternal,
        Accessibility::Public,
    ];

    /// Map the visibility bits of a `TypeDef` row
    #[must_use]
    pub fn from_type_flags(flags: u32) -> Accessibility {
        match flags & TypeAttributes::VISIBILITY_MASK {
            TypeAttributes::PUBLIC | TypeAttributes::NESTED_PUBLIC => Accessibility::Public,
            TypeAttributes::NESTED_PRIVATE => Accessibility::Private,
            TypeAttributes::NESTED_FAMILY => Accessibility::Protected,
            TypeAttributes::NESTED_FAM_AND_ASSEM => Accessibility::PrivateProtected,
            TypeAttributes::NESTED_FAM_OR_ASSEM => Accessibility::ProtectedInternal,
            // NOT_PUBLIC and NESTED_ASSEMBLY
            _ => Accessibility::Internal,
        }
    }

    /// Map the member access bits of a `Field` or `MethodDef` row
    #[must_use]
    pub fn from_member_flags(flags: u16) -> Accessibility {
        debug_assert_eq!(
            FieldAttributes::FIELD_ACCESS_MASK,
            MethodAttributes::MEMBER_ACCESS_MASK
        );

        match flags & MethodAttributes::MEMBER_ACCESS_MASK {
            1 => Accessibility::Private,
            2 => Accessibility::PrivateProtected,
            3 => Accessibility::Internal,
            4 => Accessibility::Protected,
            5 => Accessibility::ProtectedInternal,
            6 => Accessibility::Public,
            _ => Accessibility::CompilerControlled,
        }
    }

    fn reach(self) -> Option<u8> {
        match self {
            Accessibility::CompilerControlled => None,
            Accessibility::Private => Some(0),
            Accessibility::PrivateProtected => Some(DERIVED_SAME_ASSEMBLY),
            Accessibility::Internal => Some(SAME_ASSEMBLY | DERIVED_SAME_ASSEMBLY),
            Accessibility::Protected => Some(DERIVED_SAME_ASSEMBLY | DERIVED_OTHER_ASSEMBLY),
            Accessibility::ProtectedInternal => {
                Some(SAME_ASSEMBLY | DERIVED_SAME_ASSEMBLY | DERIVED_OTHER_ASSEMBLY)
            }
            Accessibility::Public => Some(
                SAME_ASSEMBLY | DERIVED_SAME_ASSEMBLY | DERIVED_OTHER_ASSEMBLY | OTHER_ASSEMBLY,
            ),
        }
    }

    fn from_reach(reach: u8) -> Accessibility {
        Accessibility::ALL
            .iter()
            .skip(1)
            .rev()
            .copied()
            .find(|candidate| candidate.reach().is_some_and(|bits| bits & reach == bits))
            .unwrap_or(Accessibility::Private)
    }

    /// Accessibility of a member declared with `self` inside a scope accessible as `enclosing`.
    ///
    /// Only code that can see the enclosing scope can see the member, so the result reaches the
    /// intersection of both audiences. `CompilerControlled` absorbs everything.
    #[must_use]
    pub fn within(self, enclosing: Accessibility) -> Accessibility {
        match (self.reach(), enclosing.reach()) {
            (Some(own), Some(outer)) => Accessibility::from_reach(own & outer),
            _ => Accessibility::CompilerControlled,
        }
    }

    /// True if code outside the assembly can see it, directly or through inheritance
    #[must_use]
    pub fn is_public_surface(self) -> bool {
        matches!(
            self,
            Accessibility::Public | Accessibility::Protected | Accessibility::ProtectedInternal
        )
    }

    /// Source keyword(s)
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Accessibility::CompilerControlled => "",
            Accessibility::Private => "private",
            Accessibility::PrivateProtected => "private protected",
            Accessibility::Internal => "internal",
            Accessibility::Protected => "protected",
            Accessibility::ProtectedInternal => "protected internal",
            Accessibility::Public => "public",
        }
    }
}

impl fmt::Display for Accessibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use Accessibility::{
        CompilerControlled as CC, Internal as In, Private as Pr, PrivateProtected as PP,
        Protected as Pt, ProtectedInternal as PI, Public as Pu,
    };

    #[test]
    fn type_visibility() {
        let expected = [In, Pu, Pu, Pr, Pt, In, PP, PI];
        for (flags, access) in expected.iter().enumerate() {
            assert_eq!(Accessibility::from_type_flags(flags as u32), *access);
        }
        // Other bits are ignored
        assert_eq!(
            Accessibility::from_type_flags(TypeAttributes::SEALED | TypeAttributes::NESTED_FAMILY),
            Pt
        );
    }

    #[test]
    fn member_access() {
        let expected = [CC, Pr, PP, In, Pt, PI, Pu, CC];
        for (flags, access) in expected.iter().enumerate() {
            assert_eq!(Accessibility::from_member_flags(flags as u16), *access);
        }
    }

    #[test]
    fn combination_table() {
        // Rows: declared accessibility, columns: enclosing accessibility, both in `ALL` order
        let table: [[Accessibility; 7]; 7] = [
            [CC, CC, CC, CC, CC, CC, CC],
            [CC, Pr, Pr, Pr, Pr, Pr, Pr],
            [CC, Pr, PP, PP, PP, PP, PP],
            [CC, Pr, PP, In, PP, In, In],
            [CC, Pr, PP, PP, Pt, Pt, Pt],
            [CC, Pr, PP, In, Pt, PI, PI],
            [CC, Pr, PP, In, Pt, PI, Pu],
        ];

        for (row, declared) in Accessibility::ALL.iter().enumerate() {
            for (column, enclosing) in Accessibility::ALL.iter().enumerate() {
                assert_eq!(
                    declared.within(*enclosing),
                    table[row][column],
                    "{declared:?} within {enclosing:?}"
                );
            }
        }
    }

    #[test]
    fn public_surface() {
        let surface: Vec<_> = Accessibility::ALL
            .iter()
            .filter(|access| access.is_public_surface())
            .collect();
        assert_eq!(surface, [&Pt, &PI, &Pu]);
        assert!(!Pu.within(In).is_public_surface());
    }
}
