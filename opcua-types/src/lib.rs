// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! Built-in types and the binary codec they encode through (spec §3, §4.1).
//!
//! Every OPC UA built-in type lives in its own module and implements
//! [`encoding::BinaryEncodable`]/[`encoding::BinaryDecodable`]. `service_types`
//! builds the request/response structures used by the session and
//! subscription services on top of these.

pub mod array;
pub mod basic_types;
pub mod byte_string;
pub mod constants;
pub mod data_value;
pub mod date_time;
pub mod diagnostic_info;
pub mod encoding;
pub mod expanded_node_id;
pub mod extension_object;
pub mod guid;
pub mod localized_text;
pub mod namespaces;
pub mod node_id;
pub mod object_id;
pub mod qualified_name;
pub mod service_types;
pub mod status_code;
pub mod string;
pub mod variant;
pub mod variant_type_id;

#[cfg(feature = "json")]
pub mod variant_json;

pub use array::{Array, ArrayError};
pub use byte_string::ByteString;
pub use data_value::DataValue;
pub use date_time::DateTime;
pub use diagnostic_info::DiagnosticInfo;
pub use encoding::{
    BinaryDecodable, BinaryEncodable, DecodingOptions, DepthGauge, Error, EncodingResult,
};
pub use expanded_node_id::ExpandedNodeId;
pub use extension_object::{ExtensionObject, ExtensionObjectEncoding};
pub use guid::Guid;
pub use localized_text::LocalizedText;
pub use namespaces::NamespaceTable;
pub use node_id::{Identifier, NodeId};
pub use object_id::ObjectId;
pub use qualified_name::QualifiedName;
pub use status_code::StatusCode;
pub use string::UAString;
pub use variant::Variant;
pub use variant_type_id::VariantScalarTypeId;
