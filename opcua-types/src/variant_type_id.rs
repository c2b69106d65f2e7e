// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! The built-in type ids used in the `Variant` encoding mask (spec §4.1).

use std::fmt;

use crate::encoding::Error;

/// Numeric id of a `Variant`'s scalar built-in type, as packed into the
/// low 6 bits of the encoding mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VariantScalarTypeId {
    /// No value.
    Null = 0,
    /// `Boolean`
    Boolean = 1,
    /// `SByte`
    SByte = 2,
    /// `Byte`
    Byte = 3,
    /// `Int16`
    Int16 = 4,
    /// `UInt16`
    UInt16 = 5,
    /// `Int32`
    Int32 = 6,
    /// `UInt32`
    UInt32 = 7,
    /// `Int64`
    Int64 = 8,
    /// `UInt64`
    UInt64 = 9,
    /// `Float`
    Float = 10,
    /// `Double`
    Double = 11,
    /// `String`
    String = 12,
    /// `DateTime`
    DateTime = 13,
    /// `Guid`
    Guid = 14,
    /// `ByteString`
    ByteString = 15,
    /// `XmlElement`
    XmlElement = 16,
    /// `NodeId`
    NodeId = 17,
    /// `ExpandedNodeId`
    ExpandedNodeId = 18,
    /// `StatusCode`
    StatusCode = 19,
    /// `QualifiedName`
    QualifiedName = 20,
    /// `LocalizedText`
    LocalizedText = 21,
    /// `ExtensionObject`
    ExtensionObject = 22,
    /// `DataValue`
    DataValue = 23,
    /// Nested `Variant`
    Variant = 24,
    /// `DiagnosticInfo`
    DiagnosticInfo = 25,
}

impl fmt::Display for VariantScalarTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl TryFrom<u8> for VariantScalarTypeId {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use VariantScalarTypeId::*;
        Ok(match value {
            0 => Null,
            1 => Boolean,
            2 => SByte,
            3 => Byte,
            4 => Int16,
            5 => UInt16,
            6 => Int32,
            7 => UInt32,
            8 => Int64,
            9 => UInt64,
            10 => Float,
            11 => Double,
            12 => String,
            13 => DateTime,
            14 => Guid,
            15 => ByteString,
            16 => XmlElement,
            17 => NodeId,
            18 => ExpandedNodeId,
            19 => StatusCode,
            20 => QualifiedName,
            21 => LocalizedText,
            22 => ExtensionObject,
            23 => DataValue,
            24 => Variant,
            25 => DiagnosticInfo,
            _ => {
                return Err(Error::decoding(format!(
                    "Unrecognized variant built-in type id {value}"
                )))
            }
        })
    }
}

/// Minimum number of bytes a single encoded element of this type can
/// possibly take, used to reject adversarial array-length prefixes before
/// allocating (spec §4.1).
pub fn min_encoded_size(type_id: VariantScalarTypeId) -> usize {
    use VariantScalarTypeId::*;
    match type_id {
        Null => 0,
        Boolean | SByte | Byte => 1,
        Int16 | UInt16 => 2,
        Int32 | UInt32 | Float | StatusCode => 4,
        Int64 | UInt64 | Double | DateTime => 8,
        Guid => 16,
        // Length-prefixed types: at minimum a 4-byte null/empty length.
        String | ByteString | XmlElement => 4,
        NodeId => 2,
        ExpandedNodeId => 3,
        QualifiedName => 6,
        LocalizedText => 1,
        ExtensionObject => 1 + 4,
        DataValue => 1,
        Variant => 1,
        DiagnosticInfo => 1,
    }
}
