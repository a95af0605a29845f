//! Values of the `Constant` table: field literals, parameter defaults and property defaults.

use std::fmt;

use widestring::U16String;

use crate::{
    file::parser::Parser,
    metadata::{knowntypes::KnownType, typesystem::ELEMENT_TYPE},
    Result,
};

/// A decoded constant
#[derive(Clone, Debug, PartialEq)]
pub enum ConstantValue {
    /// `null`, stored as a `CLASS` constant with a zero value
    Null,
    /// `bool`
    Boolean(bool),
    /// `char` as its UTF-16 code unit
    Char(u16),
    /// `sbyte`
    I1(i8),
    /// `byte`
    U1(u8),
    /// `short`
    I2(i16),
    /// `ushort`
    U2(u16),
    /// `int`
    I4(i32),
    /// `uint`
    U4(u32),
    /// `long`
    I8(i64),
    /// `ulong`
    U8(u64),
    /// `float`
    R4(f32),
    /// `double`
    R8(f64),
    /// `string`
    String(String),
}

impl ConstantValue {
    /// Decode the value blob of a `Constant` row of type `element_type`
    ///
    /// # Errors
    /// Returns `Malformed` for an unsupported type code or a blob of the wrong size.
    pub fn decode(element_type: u8, blob: &[u8]) -> Result<ConstantValue> {
        let mut parser = Parser::new(blob);

        let value = match element_type {
            ELEMENT_TYPE::BOOLEAN => ConstantValue::Boolean(parser.read_le::<u8>()? != 0),
            ELEMENT_TYPE::CHAR => ConstantValue::Char(parser.read_le::<u16>()?),
            ELEMENT_TYPE::I1 => ConstantValue::I1(parser.read_le::<i8>()?),
            ELEMENT_TYPE::U1 => ConstantValue::U1(parser.read_le::<u8>()?),
            ELEMENT_TYPE::I2 => ConstantValue::I2(parser.read_le::<i16>()?),
            ELEMENT_TYPE::U2 => ConstantValue::U2(parser.read_le::<u16>()?),
            ELEMENT_TYPE::I4 => ConstantValue::I4(parser.read_le::<i32>()?),
            ELEMENT_TYPE::U4 => ConstantValue::U4(parser.read_le::<u32>()?),
            ELEMENT_TYPE::I8 => ConstantValue::I8(parser.read_le::<i64>()?),
            ELEMENT_TYPE::U8 => ConstantValue::U8(parser.read_le::<u64>()?),
            ELEMENT_TYPE::R4 => ConstantValue::R4(parser.read_le::<f32>()?),
            ELEMENT_TYPE::R8 => ConstantValue::R8(parser.read_le::<f64>()?),
            ELEMENT_TYPE::STRING => {
                if blob.len() % 2 != 0 {
                    return Err(malformed_error!(
                        "String constant has odd length {}",
                        blob.len()
                    ));
                }
                let units: Vec<u16> = blob
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                return Ok(ConstantValue::String(
                    U16String::from_vec(units).to_string_lossy(),
                ));
            }
            ELEMENT_TYPE::CLASS => {
                if blob.iter().any(|byte| *byte != 0) {
                    return Err(malformed_error!("Non-null reference constant"));
                }
                return Ok(ConstantValue::Null);
            }
            other => {
                return Err(malformed_error!(
                    "Unsupported constant type {:#04x}",
                    other
                ))
            }
        };

        if parser.has_more_data() {
            return Err(malformed_error!(
                "Constant of type {:#04x} has {} trailing bytes",
                element_type,
                parser.remaining()
            ));
        }

        Ok(value)
    }

    /// The primitive type of the value, `None` for `null`
    #[must_use]
    pub fn known_type(&self) -> Option<KnownType> {
        Some(match self {
            ConstantValue::Null => return None,
            ConstantValue::Boolean(_) => KnownType::Boolean,
            ConstantValue::Char(_) => KnownType::Char,
            ConstantValue::I1(_) => KnownType::SByte,
            ConstantValue::U1(_) => KnownType::Byte,
            ConstantValue::I2(_) => KnownType::Int16,
            ConstantValue::U2(_) => KnownType::UInt16,
            ConstantValue::I4(_) => KnownType::Int32,
            ConstantValue::U4(_) => KnownType::UInt32,
            ConstantValue::I8(_) => KnownType::Int64,
            ConstantValue::U8(_) => KnownType::UInt64,
            ConstantValue::R4(_) => KnownType::Single,
            ConstantValue::R8(_) => KnownType::Double,
            ConstantValue::String(_) => KnownType::String,
        })
    }

    /// Integral values widened to `i128`, for matching enum members
    #[must_use]
    pub fn as_integer(&self) -> Option<i128> {
        match *self {
            ConstantValue::Boolean(value) => Some(i128::from(value)),
            ConstantValue::Char(value) => Some(i128::from(value)),
            ConstantValue::I1(value) => Some(i128::from(value)),
            ConstantValue::U1(value) => Some(i128::from(value)),
            ConstantValue::I2(value) => Some(i128::from(value)),
            ConstantValue::U2(value) => Some(i128::from(value)),
            ConstantValue::I4(value) => Some(i128::from(value)),
            ConstantValue::U4(value) => Some(i128::from(value)),
            ConstantValue::I8(value) => Some(i128::from(value)),
            ConstantValue::U8(value) => Some(i128::from(value)),
            _ => None,
        }
    }
}

impl fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantValue::Null => f.write_str("null"),
            ConstantValue::Boolean(value) => write!(f, "{value}"),
            ConstantValue::Char(value) => match char::from_u32(u32::from(*value)) {
                Some(c) => write!(f, "'{}'", c.escape_default()),
                None => write!(f, "'\\u{value:04x}'"),
            },
            ConstantValue::I1(value) => write!(f, "{value}"),
            ConstantValue::U1(value) => write!(f, "{value}"),
            ConstantValue::I2(value) => write!(f, "{value}"),
            ConstantValue::U2(value) => write!(f, "{value}"),
            ConstantValue::I4(value) => write!(f, "{value}"),
            ConstantValue::U4(value) => write!(f, "{value}"),
            ConstantValue::I8(value) => write!(f, "{value}"),
            ConstantValue::U8(value) => write!(f, "{value}"),
            ConstantValue::R4(value) => write!(f, "{value}"),
            ConstantValue::R8(value) => write!(f, "{value}"),
            ConstantValue::String(value) => write!(f, "{value:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn integral_widths() {
        assert_eq!(
            ConstantValue::decode(ELEMENT_TYPE::I1, &[0xFF]).unwrap(),
            ConstantValue::I1(-1)
        );
        assert_eq!(
            ConstantValue::decode(ELEMENT_TYPE::U2, &[0xFF, 0xFF]).unwrap(),
            ConstantValue::U2(u16::MAX)
        );
        assert_eq!(
            ConstantValue::decode(ELEMENT_TYPE::I8, &[0xFE, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF])
                .unwrap(),
            ConstantValue::I8(-2)
        );
        assert_eq!(
            ConstantValue::decode(ELEMENT_TYPE::U4, &[0x01, 0, 0, 0x80]).unwrap(),
            ConstantValue::U4(0x8000_0001)
        );
    }

    #[test]
    fn strings_and_null() {
        assert_eq!(
            ConstantValue::decode(ELEMENT_TYPE::STRING, &[0x68, 0x00, 0x69, 0x00]).unwrap(),
            ConstantValue::String("hi".to_string())
        );
        assert_eq!(
            ConstantValue::decode(ELEMENT_TYPE::STRING, &[]).unwrap(),
            ConstantValue::String(String::new())
        );
        assert_eq!(
            ConstantValue::decode(ELEMENT_TYPE::CLASS, &[0, 0, 0, 0]).unwrap(),
            ConstantValue::Null
        );
    }

    #[test]
    fn rejects_bad_blobs() {
        assert!(matches!(
            ConstantValue::decode(ELEMENT_TYPE::OBJECT, &[0]),
            Err(Error::Malformed { .. })
        ));
        assert!(matches!(
            ConstantValue::decode(ELEMENT_TYPE::I4, &[0, 0, 0, 0, 0]),
            Err(Error::Malformed { .. })
        ));
        assert!(matches!(
            ConstantValue::decode(ELEMENT_TYPE::STRING, &[0x41]),
            Err(Error::Malformed { .. })
        ));
        assert!(ConstantValue::decode(ELEMENT_TYPE::I4, &[0, 0]).is_err());
    }

    #[test]
    fn display() {
        assert_eq!(ConstantValue::R8(1.5).to_string(), "1.5");
        assert_eq!(ConstantValue::String("a\"b".into()).to_string(), "\"a\\\"b\"");
        assert_eq!(ConstantValue::Char(u16::from(b'x')).to_string(), "'x'");
        assert_eq!(ConstantValue::Null.to_string(), "null");
    }
}
