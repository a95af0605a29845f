//! Custom attribute blob decoding, ECMA-335 II.23.3.
//!
//! Fixed arguments are typed by the constructor signature, named arguments carry their own
//! `SERIALIZATION_TYPE` tag. Enum values are stored in their underlying type without any tag, so
//! the decoder asks an [`EnumResolver`] for the width of every enum it meets.

use crate::{
    file::parser::Parser,
    metadata::{
        customattributes::types::{
            ArgumentValue, AttributeArgument, CustomAttributeValue, NamedArgument,
            SERIALIZATION_TYPE,
        },
        knowntypes::KnownType,
        typesystem::TypeWrapper,
    },
    Error::RecursionLimit,
    Result,
};

/// Nesting limit for arrays and boxed values
const MAX_NESTING_DEPTH: usize = 16;

/// Marks a `null` array in place of the element count
const NULL_ARRAY: u32 = 0xFFFF_FFFF;

/// Supplies the underlying type of enums named in attribute blobs
pub trait EnumResolver {
    /// Underlying type of the enum `enum_type` from a constructor signature
    ///
    /// # Errors
    /// Returns an error if the enum cannot be located or has no integral underlying type.
    fn underlying_type(&self, enum_type: &TypeWrapper) -> Result<KnownType>;

    /// Underlying type of the enum serialized as `name`, possibly assembly qualified
    ///
    /// # Errors
    /// Returns an error if the enum cannot be located or has no integral underlying type.
    fn underlying_type_by_name(&self, name: &str) -> Result<KnownType>;
}

/// The declared type of a value in the blob
#[derive(Debug, Clone, PartialEq)]
enum FieldType {
    Primitive(KnownType),
    String,
    Type,
    Object,
    Enum(String, KnownType),
    Array(Box<FieldType>),
}

impl FieldType {
    fn type_name(&self) -> String {
        match self {
            FieldType::Primitive(known) => known.full_name().to_string(),
            FieldType::String => KnownType::String.full_name().to_string(),
            FieldType::Type => KnownType::Type.full_name().to_string(),
            FieldType::Object => KnownType::Object.full_name().to_string(),
            FieldType::Enum(name, _) => name.clone(),
            FieldType::Array(element) => format!("{}[]", element.type_name()),
        }
    }
}

/// Decoder over one attribute blob
pub struct AttributeDecoder<'a, 'r, R: EnumResolver + ?Sized> {
    parser: Parser<'a>,
    resolver: &'r R,
    depth: usize,
}

impl<'a, 'r, R: EnumResolver + ?Sized> AttributeDecoder<'a, 'r, R> {
    /// Create a decoder for `data`
    #[must_use]
    pub fn new(data: &'a [u8], resolver: &'r R) -> Self {
        AttributeDecoder {
            parser: Parser::new(data),
            resolver,
            depth: 0,
        }
    }

    /// Decode the blob of a constructor taking `parameter_types`
    ///
    /// # Errors
    /// Returns `Malformed` for a bad prolog, truncated data or an unsupported type, and the
    /// resolver's error for an enum that cannot be located.
    pub fn decode(mut self, parameter_types: &[TypeWrapper]) -> Result<CustomAttributeValue> {
        if self.parser.is_empty() {
            if parameter_types.is_empty() {
                return Ok(CustomAttributeValue::default());
            }
            return Err(malformed_error!(
                "Empty attribute blob for a constructor with {} parameters",
                parameter_types.len()
            ));
        }

        let prolog = self.parser.read_le::<u16>()?;
        if prolog != 0x0001 {
            return Err(malformed_error!(
                "Invalid custom attribute prolog {:#06x}",
                prolog
            ));
        }

        let mut fixed_arguments = Vec::with_capacity(parameter_types.len());
        for parameter_type in parameter_types {
            let field_type = self.field_type_of(parameter_type)?;
            let value = self.read_value(&field_type)?;
            fixed_arguments.push(AttributeArgument {
                type_name: parameter_type.full_name(),
                value,
            });
        }

        // Some compilers omit the count when there are no named arguments
        let named_count = if self.parser.remaining() >= 2 {
            self.parser.read_le::<u16>()?
        } else {
            0
        };

        let mut named_arguments = Vec::with_capacity(usize::from(named_count));
        for _ in 0..named_count {
            named_arguments.push(self.read_named_argument()?);
        }

        Ok(CustomAttributeValue {
            fixed_arguments,
            named_arguments,
        })
    }

    // Blob shape of a constructor parameter type
    fn field_type_of(&self, parameter_type: &TypeWrapper) -> Result<FieldType> {
        let parameter_type = parameter_type.unmodified();

        if let TypeWrapper::Array(array) = parameter_type {
            if array.shape.is_some() {
                return Err(malformed_error!(
                    "Multi-dimensional array {} in attribute constructor",
                    parameter_type
                ));
            }
            return Ok(FieldType::Array(Box::new(
                self.field_type_of(&array.element_type)?,
            )));
        }

        match parameter_type.known_type() {
            Some(KnownType::String) => return Ok(FieldType::String),
            Some(KnownType::Type) => return Ok(FieldType::Type),
            Some(KnownType::Object) => return Ok(FieldType::Object),
            Some(known) if is_serializable_primitive(known) => {
                return Ok(FieldType::Primitive(known))
            }
            _ => {}
        }

        if parameter_type.is_value_type() {
            let underlying = self.resolver.underlying_type(parameter_type)?;
            return Ok(FieldType::Enum(parameter_type.full_name(), underlying));
        }

        Err(malformed_error!(
            "Unsupported attribute argument type {}",
            parameter_type
        ))
    }

    // Tagged type of a named argument, array element or boxed value
    fn read_field_type(&mut self) -> Result<FieldType> {
        let tag = self.parser.read_le::<u8>()?;
        match tag {
            SERIALIZATION_TYPE::STRING => Ok(FieldType::String),
            SERIALIZATION_TYPE::TYPE => Ok(FieldType::Type),
            SERIALIZATION_TYPE::TAGGED_OBJECT => Ok(FieldType::Object),
            SERIALIZATION_TYPE::ENUM => {
                let name = self
                    .parser
                    .read_ser_string()?
                    .ok_or_else(|| malformed_error!("Enum argument without a type name"))?;
                let underlying = self.resolver.underlying_type_by_name(&name)?;
                Ok(FieldType::Enum(name, underlying))
            }
            SERIALIZATION_TYPE::SZARRAY => {
                self.enter()?;
                let element = self.read_field_type();
                self.depth -= 1;
                Ok(FieldType::Array(Box::new(element?)))
            }
            _ => match KnownType::from_element_type(tag) {
                Some(known) if is_serializable_primitive(known) => Ok(FieldType::Primitive(known)),
                _ => Err(malformed_error!(
                    "Unsupported serialization type {:#04x}",
                    tag
                )),
            },
        }
    }

    fn read_value(&mut self, field_type: &FieldType) -> Result<ArgumentValue> {
        match field_type {
            FieldType::Primitive(known) => self.read_primitive(*known),
            FieldType::String => Ok(self
                .parser
                .read_ser_string()?
                .map_or(ArgumentValue::Null, ArgumentValue::String)),
            FieldType::Type => Ok(self
                .parser
                .read_ser_string()?
                .map_or(ArgumentValue::Null, ArgumentValue::Type)),
            FieldType::Enum(name, underlying) => Ok(ArgumentValue::Enum(
                name.clone(),
                Box::new(self.read_primitive(*underlying)?),
            )),
            FieldType::Object => {
                let boxed = self.read_field_type()?;
                if boxed == FieldType::Object {
                    return Err(malformed_error!("Boxed value tagged as object"));
                }
                self.enter()?;
                let value = self.read_value(&boxed);
                self.depth -= 1;
                value
            }
            FieldType::Array(element) => {
                let count = self.parser.read_le::<u32>()?;
                if count == NULL_ARRAY {
                    return Ok(ArgumentValue::Null);
                }
                if count as usize > self.parser.remaining() {
                    return Err(malformed_error!(
                        "Array of {} elements exceeds the attribute blob",
                        count
                    ));
                }

                self.enter()?;
                let mut values = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    match self.read_value(element) {
                        Ok(value) => values.push(value),
                        Err(error) => {
                            self.depth -= 1;
                            return Err(error);
                        }
                    }
                }
                self.depth -= 1;

                Ok(ArgumentValue::Array(values))
            }
        }
    }

    fn read_primitive(&mut self, known: KnownType) -> Result<ArgumentValue> {
        Ok(match known {
            KnownType::Boolean => ArgumentValue::Boolean(self.parser.read_le::<u8>()? != 0),
            KnownType::Char => ArgumentValue::Char(self.parser.read_le::<u16>()?),
            KnownType::SByte => ArgumentValue::I1(self.parser.read_le::<i8>()?),
            KnownType::Byte => ArgumentValue::U1(self.parser.read_le::<u8>()?),
            KnownType::Int16 => ArgumentValue::I2(self.parser.read_le::<i16>()?),
            KnownType::UInt16 => ArgumentValue::U2(self.parser.read_le::<u16>()?),
            KnownType::Int32 => ArgumentValue::I4(self.parser.read_le::<i32>()?),
            KnownType::UInt32 => ArgumentValue::U4(self.parser.read_le::<u32>()?),
            KnownType::Int64 => ArgumentValue::I8(self.parser.read_le::<i64>()?),
            KnownType::UInt64 => ArgumentValue::U8(self.parser.read_le::<u64>()?),
            KnownType::Single => ArgumentValue::R4(self.parser.read_le::<f32>()?),
            KnownType::Double => ArgumentValue::R8(self.parser.read_le::<f64>()?),
            other => {
                return Err(malformed_error!(
                    "{} cannot appear in an attribute blob",
                    other.full_name()
                ))
            }
        })
    }

    fn read_named_argument(&mut self) -> Result<NamedArgument> {
        let is_field = match self.parser.read_le::<u8>()? {
            SERIALIZATION_TYPE::FIELD => true,
            SERIALIZATION_TYPE::PROPERTY => false,
            other => {
                return Err(malformed_error!(
                    "Invalid field/property indicator {:#04x}",
                    other
                ))
            }
        };

        let field_type = self.read_field_type()?;
        let name = self
            .parser
            .read_ser_string()?
            .ok_or_else(|| malformed_error!("Named argument without a name"))?;
        let value = self.read_value(&field_type)?;

        Ok(NamedArgument {
            is_field,
            name,
            argument: AttributeArgument {
                type_name: field_type.type_name(),
                value,
            },
        })
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            self.depth -= 1;
            return Err(RecursionLimit(MAX_NESTING_DEPTH));
        }
        Ok(())
    }
}

fn is_serializable_primitive(known: KnownType) -> bool {
    matches!(
        known,
        KnownType::Boolean
            | KnownType::Char
            | KnownType::SByte
            | KnownType::Byte
            | KnownType::Int16
            | KnownType::UInt16
            | KnownType::Int32
            | KnownType::UInt32
            | KnownType::Int64
            | KnownType::UInt64
            | KnownType::Single
            | KnownType::Double
    )
}

/// Strip assembly qualification and turn the `+` nesting separator into `.`
#[must_use]
pub fn normalize_type_name(serialized: &str) -> String {
    let mut name = String::with_capacity(serialized.len());
    let mut brackets = 0_i32;
    for c in serialized.chars() {
        match c {
            '[' => brackets += 1,
            ']' => brackets -= 1,
            ',' if brackets == 0 => break,
            _ => {}
        }
        name.push(if c == '+' { '.' } else { c });
    }
    name.trim().to_string()
}
