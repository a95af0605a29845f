use crate::{
    file::parser::Parser,
    metadata::{
        signatures::{
            ArrayShape, MethodSignature, PropertySignature, SignatureHeader, SignatureTypeProvider,
        },
        typesystem::ELEMENT_TYPE,
    },
    Error::RecursionLimit,
    Result,
};

/// Maximum nesting of types within one signature
const MAX_RECURSION_DEPTH: usize = 50;

/// Decodes one signature blob into the types of a [`SignatureTypeProvider`].
///
/// A decoder is good for a single signature; create a new one per blob.
pub struct SignatureDecoder<'a, 'p, P: SignatureTypeProvider + ?Sized> {
    parser: Parser<'a>,
    provider: &'p P,
    depth: usize,
}

impl<'a, 'p, P: SignatureTypeProvider + ?Sized> SignatureDecoder<'a, 'p, P> {
    /// Create a decoder over `data`
    #[must_use]
    pub fn new(data: &'a [u8], provider: &'p P) -> Self {
        SignatureDecoder {
            parser: Parser::new(data),
            provider,
            depth: 0,
        }
    }

    /// Decode one type
    ///
    /// # Errors
    /// Returns an error for malformed or truncated data, nesting deeper than the recursion limit,
    /// or whatever the provider rejects.
    pub fn decode_type(&mut self) -> Result<P::Type> {
        self.depth += 1;
        if self.depth > MAX_RECURSION_DEPTH {
            return Err(RecursionLimit(MAX_RECURSION_DEPTH));
        }

        let decoded = self.decode_type_inner();
        self.depth -= 1;
        decoded
    }

    fn decode_type_inner(&mut self) -> Result<P::Type> {
        let current_byte = self.parser.read_le::<u8>()?;
        match current_byte {
            ELEMENT_TYPE::VOID..=ELEMENT_TYPE::STRING
            | ELEMENT_TYPE::TYPEDBYREF
            | ELEMENT_TYPE::I
            | ELEMENT_TYPE::U
            | ELEMENT_TYPE::OBJECT => self.provider.primitive(current_byte),
            ELEMENT_TYPE::PTR => {
                let element_type = self.decode_type()?;
                Ok(self.provider.pointer(element_type))
            }
            ELEMENT_TYPE::BYREF => {
                let element_type = self.decode_type()?;
                Ok(self.provider.by_reference(element_type))
            }
            ELEMENT_TYPE::PINNED => {
                let element_type = self.decode_type()?;
                Ok(self.provider.pinned(element_type))
            }
            ELEMENT_TYPE::VALUETYPE | ELEMENT_TYPE::CLASS => {
                let token = self.parser.read_compressed_token()?;
                self.provider
                    .type_from_token(token, current_byte == ELEMENT_TYPE::VALUETYPE)
            }
            ELEMENT_TYPE::VAR => {
                let index = self.parser.read_compressed_uint()?;
                self.provider.generic_type_parameter(index)
            }
            ELEMENT_TYPE::MVAR => {
                let index = self.parser.read_compressed_uint()?;
                self.provider.generic_method_parameter(index)
            }
            ELEMENT_TYPE::SZARRAY => {
                let element_type = self.decode_type()?;
                Ok(self.provider.sz_array(element_type))
            }
            ELEMENT_TYPE::ARRAY => {
                let element_type = self.decode_type()?;
                let shape = self.decode_array_shape()?;
                Ok(self.provider.array(element_type, shape))
            }
            ELEMENT_TYPE::GENERICINST => {
                let peek_byte = self.parser.peek_byte()?;
                if peek_byte != ELEMENT_TYPE::CLASS && peek_byte != ELEMENT_TYPE::VALUETYPE {
                    return Err(malformed_error!(
                        "GENERICINST - Next byte is not TYPE_CLASS or TYPE_VALUE - {}",
                        peek_byte
                    ));
                }

                let generic_type = self.decode_type()?;
                let arg_count = self.parser.read_compressed_uint()?;
                if arg_count == 0 {
                    return Err(malformed_error!("GENERICINST without type arguments"));
                }

                let mut type_arguments = Vec::with_capacity(self.capacity(arg_count));
                for _ in 0..arg_count {
                    type_arguments.push(self.decode_type()?);
                }

                self.provider
                    .generic_instantiation(generic_type, type_arguments)
            }
            ELEMENT_TYPE::FNPTR => {
                let signature = self.decode_method_signature()?;
                self.provider.function_pointer(signature)
            }
            ELEMENT_TYPE::CMOD_REQD | ELEMENT_TYPE::CMOD_OPT => {
                let token = self.parser.read_compressed_token()?;
                let modifier = self.provider.type_from_token(token, false)?;
                let unmodified = self.decode_type()?;
                Ok(self.provider.modified(
                    modifier,
                    unmodified,
                    current_byte == ELEMENT_TYPE::CMOD_REQD,
                ))
            }
            _ => Err(malformed_error!(
                "Unsupported ELEMENT_TYPE - {}",
                current_byte
            )),
        }
    }

    /// `rank NumSizes Size* NumLoBounds LoBound*`, II.23.2.13
    fn decode_array_shape(&mut self) -> Result<ArrayShape> {
        let rank = self.parser.read_compressed_uint()?;
        if rank == 0 {
            return Err(malformed_error!("ARRAY with rank 0"));
        }

        let num_sizes = self.parser.read_compressed_uint()?;
        if num_sizes > rank {
            return Err(malformed_error!(
                "ARRAY declares {} sizes for rank {}",
                num_sizes,
                rank
            ));
        }

        let mut sizes = Vec::with_capacity(self.capacity(num_sizes));
        for _ in 0..num_sizes {
            sizes.push(self.parser.read_compressed_uint()?);
        }

        let num_lo_bounds = self.parser.read_compressed_uint()?;
        if num_lo_bounds > rank {
            return Err(malformed_error!(
                "ARRAY declares {} lower bounds for rank {}",
                num_lo_bounds,
                rank
            ));
        }

        let mut lower_bounds = Vec::with_capacity(self.capacity(num_lo_bounds));
        for _ in 0..num_lo_bounds {
            lower_bounds.push(self.parser.read_compressed_int()?);
        }

        Ok(ArrayShape {
            rank,
            sizes,
            lower_bounds,
        })
    }

    // Counts come from the blob, never reserve more than the bytes left could hold
    fn capacity(&self, count: u32) -> usize {
        (count as usize).min(self.parser.remaining())
    }

    /// Decode a `MethodDefSig`, `MethodRefSig` or `StandAloneMethodSig`
    ///
    /// # Errors
    /// Returns an error if the header is not a method header or the types cannot be decoded.
    pub fn decode_method_signature(&mut self) -> Result<MethodSignature<P::Type>> {
        let header = SignatureHeader(self.parser.read_le::<u8>()?);
        if !header.is_method() {
            return Err(malformed_error!(
                "Method signature - invalid start - {}",
                header.0
            ));
        }

        let generic_parameter_count = if header.is_generic() {
            self.parser.read_compressed_uint()?
        } else {
            0
        };

        let parameter_count = self.parser.read_compressed_uint()?;
        let return_type = self.decode_type()?;

        let mut parameter_types = Vec::with_capacity(self.capacity(parameter_count));
        let mut required_parameter_count = parameter_count as usize;
        for index in 0..parameter_count as usize {
            if self.parser.peek_byte()? == ELEMENT_TYPE::SENTINEL {
                if required_parameter_count != parameter_count as usize {
                    return Err(malformed_error!("Method signature with two sentinels"));
                }

                self.parser.advance_by(1)?;
                required_parameter_count = index;
            }

            parameter_types.push(self.decode_type()?);
        }

        Ok(MethodSignature {
            header,
            generic_parameter_count,
            return_type,
            parameter_types,
            required_parameter_count,
        })
    }

    /// Decode a `FieldSig`, II.23.2.4
    ///
    /// # Errors
    /// Returns an error if the header is not `FIELD` or the type cannot be decoded.
    pub fn decode_field_signature(&mut self) -> Result<P::Type> {
        let head_byte = self.parser.read_le::<u8>()?;
        if head_byte != SignatureHeader::FIELD {
            return Err(malformed_error!(
                "Field signature - invalid start - {}",
                head_byte
            ));
        }

        self.decode_type()
    }

    /// Decode a `PropertySig`, II.23.2.5
    ///
    /// # Errors
    /// Returns an error if the header is not `PROPERTY` or the types cannot be decoded.
    pub fn decode_property_signature(&mut self) -> Result<PropertySignature<P::Type>> {
        let header = SignatureHeader(self.parser.read_le::<u8>()?);
        if header.kind() != SignatureHeader::PROPERTY {
            return Err(malformed_error!(
                "Property signature - invalid start - {}",
                header.0
            ));
        }

        let parameter_count = self.parser.read_compressed_uint()?;
        let property_type = self.decode_type()?;

        let mut parameter_types = Vec::with_capacity(self.capacity(parameter_count));
        for _ in 0..parameter_count {
            parameter_types.push(self.decode_type()?);
        }

        Ok(PropertySignature {
            has_this: header.has_this(),
            property_type,
            parameter_types,
        })
    }

    /// Decode a `TypeSpec` blob, II.23.2.14
    ///
    /// # Errors
    /// Returns an error if the type cannot be decoded.
    pub fn decode_type_spec(&mut self) -> Result<P::Type> {
        self.decode_type()
    }

    /// Decode a `MethodSpec` blob into its type arguments, II.23.2.15
    ///
    /// # Errors
    /// Returns an error if the header is not `GENERICINST` or a type cannot be decoded.
    pub fn decode_method_spec(&mut self) -> Result<Vec<P::Type>> {
        let head_byte = self.parser.read_le::<u8>()?;
        if head_byte != SignatureHeader::METHOD_SPEC {
            return Err(malformed_error!(
                "MethodSpec signature - invalid start - {}",
                head_byte
            ));
        }

        let arg_count = self.parser.read_compressed_uint()?;
        let mut type_arguments = Vec::with_capacity(self.capacity(arg_count));
        for _ in 0..arg_count {
            type_arguments.push(self.decode_type()?);
        }

        Ok(type_arguments)
    }
}
