// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! `Variant`: the tagged-union value type carried by `DataValue`s and
//! attribute reads/writes (spec §3, §4.1). The encoding mask packs a 6-bit
//! built-in type id into the low bits, with bit 7 signaling an array body
//! and bit 6 signaling that array-dimensions follow.

use std::io::{Read, Write};

use crate::{
    array::Array,
    byte_string::ByteString,
    date_time::DateTime,
    diagnostic_info::DiagnosticInfo,
    encoding::*,
    expanded_node_id::ExpandedNodeId,
    extension_object::ExtensionObject,
    guid::Guid,
    localized_text::LocalizedText,
    node_id::NodeId,
    qualified_name::QualifiedName,
    status_code::StatusCode,
    string::UAString,
    variant_type_id::VariantScalarTypeId,
};

const ARRAY_VALUES_FLAG: u8 = 0x80;
const ARRAY_DIMENSIONS_FLAG: u8 = 0x40;
const TYPE_ID_MASK: u8 = 0x3F;

/// The `DataValue` is forward-declared here only through a boxed reference
/// in the `DataValue` variant; the actual struct lives in `data_value.rs`
/// to avoid a module cycle at the type level.
use crate::data_value::DataValue;

/// A dynamically-typed value: exactly one of the built-in scalar types, a
/// homogeneous array of one built-in type (optionally shaped as a matrix),
/// or nothing.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Variant {
    /// No value.
    #[default]
    Empty,
    /// `Boolean`
    Boolean(bool),
    /// `SByte`
    SByte(i8),
    /// `Byte`
    Byte(u8),
    /// `Int16`
    Int16(i16),
    /// `UInt16`
    UInt16(u16),
    /// `Int32`
    Int32(i32),
    /// `UInt32`
    UInt32(u32),
    /// `Int64`
    Int64(i64),
    /// `UInt64`
    UInt64(u64),
    /// `Float`
    Float(f32),
    /// `Double`
    Double(f64),
    /// `String`
    String(UAString),
    /// `DateTime`
    DateTime(Box<DateTime>),
    /// `Guid`
    Guid(Box<Guid>),
    /// `ByteString`
    ByteString(ByteString),
    /// `XmlElement`
    XmlElement(UAString),
    /// `NodeId`
    NodeId(Box<NodeId>),
    /// `ExpandedNodeId`
    ExpandedNodeId(Box<ExpandedNodeId>),
    /// `StatusCode`
    StatusCode(StatusCode),
    /// `QualifiedName`
    QualifiedName(Box<QualifiedName>),
    /// `LocalizedText`
    LocalizedText(Box<LocalizedText>),
    /// `ExtensionObject`
    ExtensionObject(Box<ExtensionObject>),
    /// `DataValue`
    DataValue(Box<DataValue>),
    /// A nested `Variant`. Recursion is bounded by the shared `DepthGauge`.
    Variant(Box<Variant>),
    /// `DiagnosticInfo`
    DiagnosticInfo(Box<DiagnosticInfo>),
    /// A homogeneous array, optionally shaped as a matrix.
    Array(Box<Array>),
}

impl Variant {
    /// The built-in scalar type id this value would encode as (the array
    /// element type, for `Variant::Array`).
    pub fn scalar_type_id(&self) -> VariantScalarTypeId {
        use VariantScalarTypeId as T;
        match self {
            Variant::Empty => T::Null,
            Variant::Boolean(_) => T::Boolean,
            Variant::SByte(_) => T::SByte,
            Variant::Byte(_) => T::Byte,
            Variant::Int16(_) => T::Int16,
            Variant::UInt16(_) => T::UInt16,
            Variant::Int32(_) => T::Int32,
            Variant::UInt32(_) => T::UInt32,
            Variant::Int64(_) => T::Int64,
            Variant::UInt64(_) => T::UInt64,
            Variant::Float(_) => T::Float,
            Variant::Double(_) => T::Double,
            Variant::String(_) => T::String,
            Variant::DateTime(_) => T::DateTime,
            Variant::Guid(_) => T::Guid,
            Variant::ByteString(_) => T::ByteString,
            Variant::XmlElement(_) => T::XmlElement,
            Variant::NodeId(_) => T::NodeId,
            Variant::ExpandedNodeId(_) => T::ExpandedNodeId,
            Variant::StatusCode(_) => T::StatusCode,
            Variant::QualifiedName(_) => T::QualifiedName,
            Variant::LocalizedText(_) => T::LocalizedText,
            Variant::ExtensionObject(_) => T::ExtensionObject,
            Variant::DataValue(_) => T::DataValue,
            Variant::Variant(_) => T::Variant,
            Variant::DiagnosticInfo(_) => T::DiagnosticInfo,
            Variant::Array(a) => a.value_type,
        }
    }

    /// `true` for `Variant::Empty`.
    pub fn is_empty(&self) -> bool {
        matches!(self, Variant::Empty)
    }

    fn encode_scalar<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        match self {
            Variant::Empty => Ok(0),
            Variant::Boolean(v) => Ok(write_u8(stream, *v as u8)?),
            Variant::SByte(v) => Ok(write_u8(stream, *v as u8)?),
            Variant::Byte(v) => Ok(write_u8(stream, *v)?),
            Variant::Int16(v) => write_i16(stream, *v),
            Variant::UInt16(v) => write_u16(stream, *v),
            Variant::Int32(v) => write_i32(stream, *v),
            Variant::UInt32(v) => write_u32(stream, *v),
            Variant::Int64(v) => write_i64(stream, *v),
            Variant::UInt64(v) => write_u64(stream, *v),
            Variant::Float(v) => write_f32(stream, *v),
            Variant::Double(v) => write_f64(stream, *v),
            Variant::String(v) => v.encode(stream),
            Variant::DateTime(v) => v.encode(stream),
            Variant::Guid(v) => v.encode(stream),
            Variant::ByteString(v) => v.encode(stream),
            Variant::XmlElement(v) => v.encode(stream),
            Variant::NodeId(v) => v.encode(stream),
            Variant::ExpandedNodeId(v) => v.encode(stream),
            Variant::StatusCode(v) => v.encode(stream),
            Variant::QualifiedName(v) => v.encode(stream),
            Variant::LocalizedText(v) => v.encode(stream),
            Variant::ExtensionObject(v) => v.encode(stream),
            Variant::DataValue(v) => v.encode(stream),
            Variant::Variant(v) => v.encode(stream),
            Variant::DiagnosticInfo(v) => v.encode(stream),
            Variant::Array(_) => unreachable!("arrays are encoded separately"),
        }
    }

    fn scalar_byte_len(&self) -> usize {
        match self {
            Variant::Empty => 0,
            Variant::Boolean(_) | Variant::SByte(_) | Variant::Byte(_) => 1,
            Variant::Int16(_) | Variant::UInt16(_) => 2,
            Variant::Int32(_) | Variant::UInt32(_) | Variant::Float(_) => 4,
            Variant::Int64(_) | Variant::UInt64(_) | Variant::Double(_) => 8,
            Variant::String(v) => v.byte_len(),
            Variant::DateTime(v) => v.byte_len(),
            Variant::Guid(v) => v.byte_len(),
            Variant::ByteString(v) => v.byte_len(),
            Variant::XmlElement(v) => v.byte_len(),
            Variant::NodeId(v) => v.byte_len(),
            Variant::ExpandedNodeId(v) => v.byte_len(),
            Variant::StatusCode(v) => v.byte_len(),
            Variant::QualifiedName(v) => v.byte_len(),
            Variant::LocalizedText(v) => v.byte_len(),
            Variant::ExtensionObject(v) => v.byte_len(),
            Variant::DataValue(v) => v.byte_len(),
            Variant::Variant(v) => v.byte_len(),
            Variant::DiagnosticInfo(v) => v.byte_len(),
            Variant::Array(_) => 0,
        }
    }

    fn decode_scalar<S: Read + ?Sized>(
        type_id: VariantScalarTypeId,
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Variant> {
        use VariantScalarTypeId as T;
        Ok(match type_id {
            T::Null => Variant::Empty,
            T::Boolean => Variant::Boolean(read_u8(stream)? != 0),
            T::SByte => Variant::SByte(read_u8(stream)? as i8),
            T::Byte => Variant::Byte(read_u8(stream)?),
            T::Int16 => Variant::Int16(read_i16(stream)?),
            T::UInt16 => Variant::UInt16(read_u16(stream)?),
            T::Int32 => Variant::Int32(read_i32(stream)?),
            T::UInt32 => Variant::UInt32(read_u32(stream)?),
            T::Int64 => Variant::Int64(read_i64(stream)?),
            T::UInt64 => Variant::UInt64(read_u64(stream)?),
            T::Float => Variant::Float(read_f32(stream)?),
            T::Double => Variant::Double(read_f64(stream)?),
            T::String => Variant::String(UAString::decode(stream, decoding_options)?),
            T::DateTime => Variant::DateTime(Box::new(DateTime::decode(stream, decoding_options)?)),
            T::Guid => Variant::Guid(Box::new(Guid::decode(stream, decoding_options)?)),
            T::ByteString => Variant::ByteString(ByteString::decode(stream, decoding_options)?),
            T::XmlElement => Variant::XmlElement(UAString::decode(stream, decoding_options)?),
            T::NodeId => Variant::NodeId(Box::new(NodeId::decode(stream, decoding_options)?)),
            T::ExpandedNodeId => Variant::ExpandedNodeId(Box::new(ExpandedNodeId::decode(
                stream,
                decoding_options,
            )?)),
            T::StatusCode => Variant::StatusCode(StatusCode::decode(stream, decoding_options)?),
            T::QualifiedName => {
                Variant::QualifiedName(Box::new(QualifiedName::decode(stream, decoding_options)?))
            }
            T::LocalizedText => {
                Variant::LocalizedText(Box::new(LocalizedText::decode(stream, decoding_options)?))
            }
            T::ExtensionObject => Variant::ExtensionObject(Box::new(ExtensionObject::decode(
                stream,
                decoding_options,
            )?)),
            T::DataValue => Variant::DataValue(Box::new(DataValue::decode(stream, decoding_options)?)),
            T::Variant => {
                let _lease = decoding_options.decoding_depth_gauge.enter()?;
                Variant::Variant(Box::new(Variant::decode(stream, decoding_options)?))
            }
            T::DiagnosticInfo => {
                Variant::DiagnosticInfo(Box::new(DiagnosticInfo::decode(stream, decoding_options)?))
            }
        })
    }
}

impl BinaryEncodable for Variant {
    fn byte_len(&self) -> usize {
        if let Variant::Array(array) = self {
            let mut size = 1 + 4; // mask + element count
            for v in &array.values {
                size += v.scalar_byte_len();
            }
            if let Some(dims) = &array.dimensions {
                size += 4 + dims.len() * 4;
            }
            size
        } else {
            1 + self.scalar_byte_len()
        }
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        match self {
            Variant::Array(array) => {
                let mut mask = array.value_type as u8 & TYPE_ID_MASK;
                mask |= ARRAY_VALUES_FLAG;
                let has_dims = array.dimensions.is_some();
                if has_dims {
                    mask |= ARRAY_DIMENSIONS_FLAG;
                }
                let mut size = write_u8(stream, mask)?;
                size += write_i32(stream, array.values.len() as i32)?;
                for v in &array.values {
                    size += v.encode_scalar(stream)?;
                }
                if let Some(dims) = &array.dimensions {
                    size += write_i32(stream, dims.len() as i32)?;
                    for d in dims {
                        size += write_u32(stream, *d)?;
                    }
                }
                Ok(size)
            }
            _ => {
                let mask = self.scalar_type_id() as u8 & TYPE_ID_MASK;
                let mut size = write_u8(stream, mask)?;
                size += self.encode_scalar(stream)?;
                Ok(size)
            }
        }
    }
}

impl BinaryDecodable for Variant {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let mask = read_u8(stream)?;
        let is_array = mask & ARRAY_VALUES_FLAG != 0;
        let has_dims = mask & ARRAY_DIMENSIONS_FLAG != 0;
        let type_id = VariantScalarTypeId::try_from(mask & TYPE_ID_MASK)?;

        if has_dims && !is_array {
            return Err(Error::decoding(
                "Variant encoding mask has dimensions flag set without the array flag",
            ));
        }

        if !is_array {
            return Variant::decode_scalar(type_id, stream, decoding_options);
        }

        let len = read_i32(stream)?;
        if len < 0 {
            return Err(Error::decoding(format!(
                "Variant array length {len} is negative"
            )));
        }
        let len = len as usize;
        if decoding_options.max_array_length > 0 && len > decoding_options.max_array_length {
            return Err(Error::decoding(format!(
                "Variant array length {len} exceeds configured max of {}",
                decoding_options.max_array_length
            )));
        }
        let mut values = Vec::with_capacity(len.min(4096));
        for _ in 0..len {
            values.push(Variant::decode_scalar(type_id, stream, decoding_options)?);
        }

        let dimensions = if has_dims {
            let dim_len = read_i32(stream)?;
            if dim_len < 0 {
                return Err(Error::decoding("Variant array dimensions length is negative"));
            }
            let dim_len = dim_len as usize;
            if decoding_options.max_array_length > 0 && dim_len > decoding_options.max_array_length
            {
                return Err(Error::decoding(
                    "Variant array dimensions length exceeds configured max",
                ));
            }
            let mut dims = Vec::with_capacity(dim_len.min(4096));
            for _ in 0..dim_len {
                dims.push(read_u32(stream)?);
            }
            Some(dims)
        } else {
            None
        };

        let array = match dimensions {
            Some(dims) => Array::new_multi(type_id, values, dims)
                .map_err(|e| Error::decoding(e.to_string()))?,
            None => Array::new(type_id, values).map_err(|e| Error::decoding(e.to_string()))?,
        };
        Ok(Variant::Array(Box::new(array)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_round_trip() {
        let v = Variant::Int32(-42);
        let bytes = v.encode_to_vec();
        assert_eq!(bytes[0], VariantScalarTypeId::Int32 as u8);
        let decoded = Variant::decode(&mut bytes.as_slice(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, v);
    }

    #[test]
    fn array_round_trip() {
        let array = Array::new(
            VariantScalarTypeId::UInt16,
            vec![Variant::UInt16(1), Variant::UInt16(2), Variant::UInt16(3)],
        )
        .unwrap();
        let v = Variant::Array(Box::new(array));
        let bytes = v.encode_to_vec();
        assert_eq!(
            bytes[0],
            VariantScalarTypeId::UInt16 as u8 | ARRAY_VALUES_FLAG
        );
        let decoded = Variant::decode(&mut bytes.as_slice(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, v);
    }

    #[test]
    fn matrix_round_trip() {
        let values = (0..6).map(Variant::Int32).collect::<Vec<_>>();
        let array = Array::new_multi(VariantScalarTypeId::Int32, values, vec![2, 3]).unwrap();
        let v = Variant::Array(Box::new(array));
        let bytes = v.encode_to_vec();
        assert_eq!(
            bytes[0],
            VariantScalarTypeId::Int32 as u8 | ARRAY_VALUES_FLAG | ARRAY_DIMENSIONS_FLAG
        );
        let decoded = Variant::decode(&mut bytes.as_slice(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, v);
    }

    #[test]
    fn dimensions_without_array_flag_rejected() {
        let mut buf = Vec::new();
        write_u8(&mut buf, VariantScalarTypeId::Int32 as u8 | ARRAY_DIMENSIONS_FLAG).unwrap();
        assert!(Variant::decode(&mut buf.as_slice(), &DecodingOptions::test()).is_err());
    }

    #[test]
    fn nested_variant_respects_depth_gauge() {
        let opts = DecodingOptions {
            decoding_depth_gauge: crate::encoding::DepthGauge::new(2),
            ..DecodingOptions::test()
        };
        // Variant(Variant(Variant(Int32))) nests the Variant tag 3 deep,
        // exceeding a limit of 2.
        let level1 = Variant::Variant(Box::new(Variant::Int32(7)));
        let level2 = Variant::Variant(Box::new(level1));
        let level3 = Variant::Variant(Box::new(level2));
        let bytes = level3.encode_to_vec();
        assert!(Variant::decode(&mut bytes.as_slice(), &opts).is_err());
    }
}
