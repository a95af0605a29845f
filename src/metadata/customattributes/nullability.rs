//! Nullable reference type annotations.
//!
//! The compiler encodes nullability in two attributes. `NullableAttribute` on a site carries
//! either one byte for every reference type position of the site's type or a byte array with one
//! entry per position, in depth-first order over the type's structure. `NullableContextAttribute`
//! on a type or member provides the value for sites without their own attribute.
//!
//! Value types consume no entry. Generic value types still contribute the positions of their
//! type arguments, and `ref`, pointer and modifier wrappers are transparent.

use crate::{
    metadata::{
        customattributes::{ArgumentValue, CustomAttributeRc, KnownAttributeSet},
        knowntypes::{KnownAttribute, KnownType},
        typesystem::TypeWrapper,
    },
    Result,
};

/// Nullability of one reference type position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Nullability {
    /// Compiled without annotations
    #[default]
    Oblivious,
    /// Declared without `?`
    NotNull,
    /// Declared with `?`
    Nullable,
}

impl Nullability {
    /// Map an attribute byte
    ///
    /// # Errors
    /// Returns `Malformed` for a byte other than 0, 1 or 2.
    pub fn from_byte(byte: u8) -> Result<Nullability> {
        match byte {
            0 => Ok(Nullability::Oblivious),
            1 => Ok(Nullability::NotNull),
            2 => Ok(Nullability::Nullable),
            other => Err(malformed_error!("Invalid nullability byte {}", other)),
        }
    }

    /// The value of a `NullableContextAttribute` among `attributes`, if there is one
    ///
    /// # Errors
    /// Returns an error if the attribute cannot be decoded.
    pub fn from_context(attributes: &[CustomAttributeRc]) -> Result<Option<Nullability>> {
        let Some(attribute) = attributes.find(KnownAttribute::NullableContext) else {
            return Ok(None);
        };

        match attribute
            .decode()?
            .fixed_arguments
            .first()
            .and_then(|argument| argument.value.as_u8())
        {
            Some(byte) => Nullability::from_byte(byte).map(Some),
            None => Err(malformed_error!("NullableContextAttribute without a byte argument")),
        }
    }

    /// `?` for nullable, empty otherwise
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Nullability::Nullable => "?",
            _ => "",
        }
    }
}

/// Nullability of a type and every type nested in it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NullabilityInfo {
    /// The type itself
    pub nullability: Nullability,
    /// Element of an array, pointer or `ref` type
    pub element: Option<Box<NullabilityInfo>>,
    /// Arguments of a generic instantiation, in order
    pub type_arguments: Vec<NullabilityInfo>,
}

impl NullabilityInfo {
    fn leaf(nullability: Nullability) -> Self {
        NullabilityInfo {
            nullability,
            element: None,
            type_arguments: Vec::new(),
        }
    }

    /// Decode the nullability of `site_type` from the `NullableAttribute` among `attributes`,
    /// falling back to `context` when the site has none
    ///
    /// # Errors
    /// Returns `Malformed` if the attribute cannot be decoded or has fewer entries than the type
    /// has positions.
    pub fn decode(
        site_type: &TypeWrapper,
        attributes: &[CustomAttributeRc],
        context: Nullability,
    ) -> Result<NullabilityInfo> {
        let mut source = match attributes.find(KnownAttribute::Nullable) {
            Some(attribute) => {
                let value = attribute.decode()?;
                match value.fixed_arguments.first().map(|argument| &argument.value) {
                    Some(ArgumentValue::U1(byte)) => {
                        ByteSource::Uniform(Nullability::from_byte(*byte)?)
                    }
                    Some(ArgumentValue::Array(values)) => {
                        let mut bytes = Vec::with_capacity(values.len());
                        for value in values {
                            bytes.push(value.as_u8().ok_or_else(|| {
                                malformed_error!("NullableAttribute array with a non-byte entry")
                            })?);
                        }
                        ByteSource::Sequence(bytes, 0)
                    }
                    _ => {
                        return Err(malformed_error!(
                            "NullableAttribute without a byte or byte array argument"
                        ))
                    }
                }
            }
            None => ByteSource::Uniform(context),
        };

        walk(site_type, &mut source)
    }

    /// Apply the same value to every position of `site_type`, value types stay not null
    #[must_use]
    pub fn uniform(site_type: &TypeWrapper, nullability: Nullability) -> NullabilityInfo {
        let mut source = ByteSource::Uniform(nullability);
        walk(site_type, &mut source).unwrap_or_else(|_| NullabilityInfo::leaf(nullability))
    }
}

enum ByteSource {
    Uniform(Nullability),
    Sequence(Vec<u8>, usize),
}

impl ByteSource {
    fn next(&mut self) -> Result<Nullability> {
        match self {
            ByteSource::Uniform(nullability) => Ok(*nullability),
            ByteSource::Sequence(bytes, position) => {
                let byte = *bytes.get(*position).ok_or_else(|| {
                    malformed_error!(
                        "NullableAttribute has {} entries, the type needs more",
                        bytes.len()
                    )
                })?;
                *position += 1;
                Nullability::from_byte(byte)
            }
        }
    }
}

fn walk(site_type: &TypeWrapper, source: &mut ByteSource) -> Result<NullabilityInfo> {
    match site_type {
        TypeWrapper::Modified(modified) => walk(&modified.unmodified, source),
        TypeWrapper::ByReference(element) | TypeWrapper::Pinned(element) => {
            let inner = walk(element, source)?;
            Ok(NullabilityInfo {
                nullability: inner.nullability,
                element: Some(Box::new(inner)),
                type_arguments: Vec::new(),
            })
        }
        TypeWrapper::Pointer(element) => Ok(NullabilityInfo {
            nullability: Nullability::NotNull,
            element: Some(Box::new(walk(element, source)?)),
            type_arguments: Vec::new(),
        }),
        TypeWrapper::Array(array) => {
            let nullability = source.next()?;
            Ok(NullabilityInfo {
                nullability,
                element: Some(Box::new(walk(&array.element_type, source)?)),
                type_arguments: Vec::new(),
            })
        }
        TypeWrapper::Parameterized(instance) => {
            let is_nullable_value =
                instance.generic_type.known_type() == Some(KnownType::Nullable);
            let nullability = if is_nullable_value {
                Nullability::Nullable
            } else if instance.generic_type.is_value_type() {
                Nullability::NotNull
            } else {
                source.next()?
            };

            let mut type_arguments = Vec::with_capacity(instance.type_arguments.len());
            for argument in &instance.type_arguments {
                type_arguments.push(walk(argument, source)?);
            }

            Ok(NullabilityInfo {
                nullability,
                element: None,
                type_arguments,
            })
        }
        TypeWrapper::GenericParameter(_) | TypeWrapper::Unknown(_) => {
            Ok(NullabilityInfo::leaf(source.next()?))
        }
        named => {
            if named.is_value_type() || named.is_void() {
                Ok(NullabilityInfo::leaf(Nullability::NotNull))
            } else {
                Ok(NullabilityInfo::leaf(source.next()?))
            }
        }
    }
}
