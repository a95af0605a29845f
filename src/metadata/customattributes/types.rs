//! Decoded custom attribute values.

/// Fixed and named arguments of one attribute application
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CustomAttributeValue {
    /// Constructor arguments in parameter order
    pub fixed_arguments: Vec<AttributeArgument>,
    /// Field and property assignments in blob order
    pub named_arguments: Vec<NamedArgument>,
}

/// An argument with the full name of its declared type
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeArgument {
    /// Declared type, e.g. `System.Int32` or `System.Byte[]`
    pub type_name: String,
    /// Decoded value
    pub value: ArgumentValue,
}

/// A field or property assignment
#[derive(Debug, Clone, PartialEq)]
pub struct NamedArgument {
    /// Field when true, property otherwise
    pub is_field: bool,
    /// Name of the field or property
    pub name: String,
    /// Assigned value
    pub argument: AttributeArgument,
}

/// A value as it can appear in an attribute blob
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentValue {
    /// `null` string, type or array
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
    /// `typeof(...)`, the serialized type name
    Type(String),
    /// Enum value: enum type name and the value in its underlying type
    Enum(String, Box<ArgumentValue>),
    /// Single dimensional array
    Array(Vec<ArgumentValue>),
}

impl ArgumentValue {
    /// The string of a `String` value
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgumentValue::String(value) => Some(value),
            _ => None,
        }
    }

    /// The byte of a `U1` value
    #[must_use]
    pub fn as_u8(&self) -> Option<u8> {
        match self {
            ArgumentValue::U1(value) => Some(*value),
            _ => None,
        }
    }

    /// Integral values widened to `i128`, enums by their underlying value
    #[must_use]
    pub fn as_integer(&self) -> Option<i128> {
        match self {
            ArgumentValue::I1(value) => Some(i128::from(*value)),
            ArgumentValue::U1(value) => Some(i128::from(*value)),
            ArgumentValue::I2(value) => Some(i128::from(*value)),
            ArgumentValue::U2(value) => Some(i128::from(*value)),
            ArgumentValue::I4(value) => Some(i128::from(*value)),
            ArgumentValue::U4(value) => Some(i128::from(*value)),
            ArgumentValue::I8(value) => Some(i128::from(*value)),
            ArgumentValue::U8(value) => Some(i128::from(*value)),
            ArgumentValue::Char(value) => Some(i128::from(*value)),
            ArgumentValue::Boolean(value) => Some(i128::from(*value)),
            ArgumentValue::Enum(_, value) => value.as_integer(),
            _ => None,
        }
    }

    /// Elements of an `Array` value
    #[must_use]
    pub fn as_array(&self) -> Option<&[ArgumentValue]> {
        match self {
            ArgumentValue::Array(values) => Some(values),
            _ => None,
        }
    }
}

/// `CorSerializationType` tags of attribute blobs, ECMA-335 II.23.3
#[allow(non_snake_case, missing_docs)]
pub mod SERIALIZATION_TYPE {
    pub const BOOLEAN: u8 = 0x02;
    pub const CHAR: u8 = 0x03;
    pub const I1: u8 = 0x04;
    pub const U1: u8 = 0x05;
    pub const I2: u8 = 0x06;
    pub const U2: u8 = 0x07;
    pub const I4: u8 = 0x08;
    pub const U4: u8 = 0x09;
    pub const I8: u8 = 0x0A;
    pub const U8: u8 = 0x0B;
    pub const R4: u8 = 0x0C;
    pub const R8: u8 = 0x0D;
    pub const STRING: u8 = 0x0E;
    pub const SZARRAY: u8 = 0x1D;
    pub const TYPE: u8 = 0x50;
    pub const TAGGED_OBJECT: u8 = 0x51;
    pub const FIELD: u8 = 0x53;
    pub const PROPERTY: u8 = 0x54;
    pub const ENUM: u8 = 0x55;
}
