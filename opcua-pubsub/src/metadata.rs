// OPC UA PubSub codec — SPDX-License-Identifier: MPL-2.0

//! Out-of-band field description a subscriber needs to decode a raw-encoded
//! `DataSetMessage` (spec §4.8: "Raw encoding requires an out-of-band
//! `DataSetMetaData`... decoding without metadata fails with
//! `BadDecodingError`"). This is not carried on the wire with every
//! message — it is published separately (e.g. on a metadata writer group)
//! and supplied to [`crate::dataset_message::DataSetMessage::decode_with_metadata`].

use opcua_types::{variant_type_id::VariantScalarTypeId, UAString};

/// One field's name, scalar type, and array shape, in the order its value
/// appears in the raw-encoded payload.
#[derive(Debug, Clone)]
pub struct FieldMetaData {
    pub name: UAString,
    pub built_in_type: VariantScalarTypeId,
    /// `None` for a scalar; `Some(dims)` for an array, `dims.len()` giving
    /// the rank and each entry the extent of that dimension (0 = unknown).
    pub array_dimensions: Option<Vec<u32>>,
}

impl FieldMetaData {
    pub fn scalar(name: impl Into<UAString>, built_in_type: VariantScalarTypeId) -> Self {
        FieldMetaData {
            name: name.into(),
            built_in_type,
            array_dimensions: None,
        }
    }
}

/// Describes every field of one DataSet, in order, for raw-encoding
/// decode (spec §4.8).
#[derive(Debug, Clone, Default)]
pub struct DataSetMetaData {
    pub name: UAString,
    pub fields: Vec<FieldMetaData>,
}

impl DataSetMetaData {
    pub fn new(name: impl Into<UAString>, fields: Vec<FieldMetaData>) -> Self {
        DataSetMetaData { name: name.into(), fields }
    }
}
